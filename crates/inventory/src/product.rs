use serde::{Deserialize, Serialize};

use orderkit_core::{DomainError, DomainResult, Money, ProductId};

/// Catalog product as seen by the order core.
///
/// The catalog owns products; this core reads `price` and contracts against
/// `stock` only through compare-and-swap. `rating` and `num_reviews` are the
/// aggregate review figures the review gate recomputes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    pub rating: f64,
    pub num_reviews: u32,
}

impl Product {
    /// Register a new product with no reviews.
    pub fn new(id: ProductId, name: impl Into<String>, price: Money, stock: i64) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        Ok(Self {
            id,
            name,
            price,
            stock,
            rating: 0.0,
            num_reviews: 0,
        })
    }

    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock >= i64::from(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_initial_stock() {
        let err = Product::new(ProductId::new(), "Lamp", Money::from_cents(100), -1).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn stock_check_is_inclusive() {
        let p = Product::new(ProductId::new(), "Lamp", Money::from_cents(100), 2).unwrap();
        assert!(p.has_stock_for(2));
        assert!(!p.has_stock_for(3));
    }
}
