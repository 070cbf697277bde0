use serde::{Deserialize, Serialize};

use orderkit_core::{AggregateRoot, DomainError, DomainResult, ProductId, UserId};

/// One pending selection in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A user's mutable, pre-checkout selection.
///
/// One cart per user, keyed by the user id. Lines keep insertion order and
/// hold at most one entry per product; every quantity is at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    user_id: UserId,
    lines: Vec<CartLine>,
    version: u64,
}

impl Cart {
    /// Empty cart, as created lazily on first access.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            lines: Vec::new(),
            version: 0,
        }
    }

    /// Rebuild a cart from persisted state.
    pub fn from_parts(user_id: UserId, lines: Vec<CartLine>, version: u64) -> Self {
        Self {
            user_id,
            lines,
            version,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.quantity)
    }

    /// Add `quantity` units, merging into an existing line for the product.
    pub fn add_item(&mut self, product_id: ProductId, quantity: u32) -> DomainResult<()> {
        ensure_positive(quantity)?;

        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| DomainError::validation("quantity too large"))?;
            }
            None => self.lines.push(CartLine {
                product_id,
                quantity,
            }),
        }

        self.version += 1;
        Ok(())
    }

    pub fn update_quantity(&mut self, product_id: ProductId, quantity: u32) -> DomainResult<()> {
        ensure_positive(quantity)?;

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or(DomainError::not_found("cart line"))?;
        line.quantity = quantity;

        self.version += 1;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: ProductId) -> DomainResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() == before {
            return Err(DomainError::not_found("cart line"));
        }

        self.version += 1;
        Ok(())
    }

    /// Empty the cart. The cart itself survives.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.version += 1;
    }
}

fn ensure_positive(quantity: u32) -> DomainResult<()> {
    if quantity == 0 {
        return Err(DomainError::validation("quantity must be at least 1"));
    }
    Ok(())
}

impl AggregateRoot for Cart {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.user_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
