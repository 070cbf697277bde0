//! Service-level error taxonomy.
//!
//! Closed set of failures the order core reports to its callers. The HTTP
//! layer maps each variant to a status code exactly once.

use thiserror::Error;

use orderkit_core::{DomainError, OrderId, ProductId, ReviewId};
use orderkit_inventory::{InsufficientStock, ReservationError};
use orderkit_orders::{InvalidStatusTransition, OrderStatus};

use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: u32,
    },

    /// Compare-and-swap retries exhausted while stock was still sufficient.
    #[error("stock for product {product_id} is changing too quickly; retry")]
    StockContention { product_id: ProductId },

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("order could not be persisted: {0}")]
    OrderPersistence(String),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// A concurrent transition moved the order first.
    #[error("order status changed concurrently (expected {expected}, found {actual})")]
    TransitionConflict {
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("not authorized")]
    NotAuthorized,

    #[error("this order item has already been reviewed")]
    ReviewAlreadyExists,

    #[error("order is {status}; only completed orders can be reviewed")]
    ReviewNotEligible { status: OrderStatus },

    #[error("order has no item for product {0}")]
    OrderLineNotFound(ProductId),

    #[error("review {0} not found")]
    ReviewNotFound(ReviewId),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::EmptyCart => "empty_cart",
            ServiceError::InsufficientStock { .. } => "insufficient_stock",
            ServiceError::StockContention { .. } => "stock_contention",
            ServiceError::ProductNotFound(_) => "product_not_found",
            ServiceError::OrderPersistence(_) => "order_persistence",
            ServiceError::OrderNotFound(_) => "order_not_found",
            ServiceError::InvalidStatusTransition { .. } => "invalid_status_transition",
            ServiceError::TransitionConflict { .. } => "transition_conflict",
            ServiceError::NotAuthorized => "not_authorized",
            ServiceError::ReviewAlreadyExists => "review_already_exists",
            ServiceError::ReviewNotEligible { .. } => "review_not_eligible",
            ServiceError::OrderLineNotFound(_) => "order_line_not_found",
            ServiceError::ReviewNotFound(_) => "review_not_found",
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Store(_) => "store_error",
        }
    }
}

impl From<InsufficientStock> for ServiceError {
    fn from(e: InsufficientStock) -> Self {
        ServiceError::InsufficientStock {
            product_id: e.product_id,
            available: e.available,
            requested: e.requested,
        }
    }
}

impl From<ReservationError> for ServiceError {
    fn from(e: ReservationError) -> Self {
        match e {
            ReservationError::UnknownProduct(id) => ServiceError::ProductNotFound(id),
            ReservationError::Insufficient(s) => s.into(),
        }
    }
}

impl From<InvalidStatusTransition> for ServiceError {
    fn from(e: InvalidStatusTransition) -> Self {
        ServiceError::InvalidStatusTransition {
            from: e.from,
            to: e.to,
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            other => ServiceError::Validation(other.to_string()),
        }
    }
}
