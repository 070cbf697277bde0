use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use orderkit_core::{AggregateRoot, DomainError, Money, OrderId, ProductId, UserId};

use crate::status::{InvalidStatusTransition, OrderStatus};

/// Owner contact details captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

/// Frozen line snapshot. Only `is_reviewed` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    /// Unit price at the moment the order was placed.
    pub price: Money,
    pub is_reviewed: bool,
}

impl OrderLine {
    pub fn new(
        product_id: ProductId,
        name: impl Into<String>,
        quantity: u32,
        price: Money,
    ) -> Result<Self, OrderError> {
        if quantity == 0 {
            return Err(DomainError::validation("line quantity must be at least 1").into());
        }
        Ok(Self {
            product_id,
            name: name.into(),
            quantity,
            price,
            is_reviewed: false,
        })
    }

    pub fn subtotal(&self) -> Result<Money, DomainError> {
        self.price.times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("cannot place an order without items")]
    EmptyOrder,

    #[error(transparent)]
    InvalidTransition(#[from] InvalidStatusTransition),

    #[error("order has no line for product {0}")]
    LineNotFound(ProductId),

    #[error("order line for product {0} is already reviewed")]
    AlreadyReviewed(ProductId),

    #[error("order line for product {0} has no review")]
    NotReviewed(ProductId),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Aggregate root: Order.
///
/// Immutable after placement except for `status` and per-line `is_reviewed`.
/// `total_price` is computed once from the line snapshots and never again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    contact: Contact,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    total_price: Money,
    created_at: DateTime<Utc>,
    version: u64,
}

impl Order {
    /// Place a new order in `Pending`.
    pub fn place(
        id: OrderId,
        user_id: UserId,
        contact: Contact,
        lines: Vec<OrderLine>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let mut total = Money::ZERO;
        for line in &lines {
            total = total.plus(line.subtotal()?)?;
        }

        Ok(Self {
            id,
            user_id,
            contact,
            status: OrderStatus::Pending,
            lines,
            total_price: total,
            created_at,
            version: 1,
        })
    }

    /// Rebuild an order from persisted state. The stored total is kept as is.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: OrderId,
        user_id: UserId,
        contact: Contact,
        status: OrderStatus,
        lines: Vec<OrderLine>,
        total_price: Money,
        created_at: DateTime<Utc>,
        version: u64,
    ) -> Self {
        Self {
            id,
            user_id,
            contact,
            status,
            lines,
            total_price,
            created_at,
            version,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn line(&self, product_id: ProductId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Move to `to` if the graph allows it; returns the previous status.
    pub fn transition(&mut self, to: OrderStatus) -> Result<OrderStatus, InvalidStatusTransition> {
        self.status.check_transition(to)?;
        let from = self.status;
        self.status = to;
        self.version += 1;
        Ok(from)
    }

    pub fn mark_line_reviewed(&mut self, product_id: ProductId) -> Result<(), OrderError> {
        let line = self.line_mut(product_id)?;
        if line.is_reviewed {
            return Err(OrderError::AlreadyReviewed(product_id));
        }
        line.is_reviewed = true;
        self.version += 1;
        Ok(())
    }

    pub fn clear_line_review(&mut self, product_id: ProductId) -> Result<(), OrderError> {
        let line = self.line_mut(product_id)?;
        if !line.is_reviewed {
            return Err(OrderError::NotReviewed(product_id));
        }
        line.is_reviewed = false;
        self.version += 1;
        Ok(())
    }

    fn line_mut(&mut self, product_id: ProductId) -> Result<&mut OrderLine, OrderError> {
        self.lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or(OrderError::LineNotFound(product_id))
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
