//! All-or-nothing stock reservation, pure half.
//!
//! The checkout runs in two passes:
//!
//! 1. **Validation** (`ReservationPlan::validate`): every requested line is
//!    checked against the stock read from the catalog. Nothing is mutated.
//! 2. **Reservation**: the caller applies each `PlannedDecrement` through the
//!    store's compare-and-swap and records it in a `ReservationLedger`. If a
//!    later decrement fails, the ledger yields the compensating increments in
//!    reverse order.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use orderkit_core::ProductId;

use crate::Product;

/// A requested quantity of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockRequest {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Stock shortfall for a single product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
pub struct InsufficientStock {
    pub product_id: ProductId,
    pub available: i64,
    pub requested: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationError {
    #[error("product {0} not found")]
    UnknownProduct(ProductId),

    #[error(transparent)]
    Insufficient(#[from] InsufficientStock),
}

/// One decrement the reservation pass must apply.
///
/// `observed_stock` is the value seen during validation; it is the first
/// `expected` value handed to compare-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedDecrement {
    pub product_id: ProductId,
    pub quantity: u32,
    pub observed_stock: i64,
}

/// Validated set of decrements, one per product, ordered by product id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationPlan {
    decrements: Vec<PlannedDecrement>,
}

impl ReservationPlan {
    /// Validate every request against the current stock of its product.
    ///
    /// Requests for the same product are summed before the check. The first
    /// shortfall (in product id order) is reported.
    pub fn validate(
        requests: &[StockRequest],
        products: &HashMap<ProductId, Product>,
    ) -> Result<Self, ReservationError> {
        let mut totals: BTreeMap<ProductId, u32> = BTreeMap::new();
        for request in requests {
            let entry = totals.entry(request.product_id).or_insert(0);
            *entry = entry.saturating_add(request.quantity);
        }

        let mut decrements = Vec::with_capacity(totals.len());
        for (product_id, quantity) in totals {
            let product = products
                .get(&product_id)
                .ok_or(ReservationError::UnknownProduct(product_id))?;

            if !product.has_stock_for(quantity) {
                return Err(InsufficientStock {
                    product_id,
                    available: product.stock,
                    requested: quantity,
                }
                .into());
            }

            decrements.push(PlannedDecrement {
                product_id,
                quantity,
                observed_stock: product.stock,
            });
        }

        Ok(Self { decrements })
    }

    pub fn decrements(&self) -> &[PlannedDecrement] {
        &self.decrements
    }

    pub fn is_empty(&self) -> bool {
        self.decrements.is_empty()
    }
}

/// Decrements applied so far in one reservation attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationLedger {
    applied: Vec<StockRequest>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, product_id: ProductId, quantity: u32) {
        self.applied.push(StockRequest::new(product_id, quantity));
    }

    pub fn applied(&self) -> &[StockRequest] {
        &self.applied
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// Increments that undo the applied decrements, most recent first.
    pub fn compensations(&self) -> impl Iterator<Item = StockRequest> + '_ {
        self.applied.iter().rev().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderkit_core::Money;
    use proptest::prelude::*;

    fn product(stock: i64) -> Product {
        Product::new(ProductId::new(), "Widget", Money::from_cents(1000), stock).unwrap()
    }

    fn catalog(products: &[Product]) -> HashMap<ProductId, Product> {
        products.iter().map(|p| (p.id, p.clone())).collect()
    }

    #[test]
    fn reports_product_and_shortfall() {
        let a = product(2);
        let products = catalog(&[a.clone()]);

        let err = ReservationPlan::validate(&[StockRequest::new(a.id, 3)], &products).unwrap_err();

        assert_eq!(
            err,
            ReservationError::Insufficient(InsufficientStock {
                product_id: a.id,
                available: 2,
                requested: 3,
            })
        );
    }

    #[test]
    fn duplicate_lines_are_summed() {
        let a = product(4);
        let products = catalog(&[a.clone()]);
        let requests = [StockRequest::new(a.id, 3), StockRequest::new(a.id, 2)];

        let err = ReservationPlan::validate(&requests, &products).unwrap_err();
        assert!(matches!(
            err,
            ReservationError::Insufficient(InsufficientStock { requested: 5, .. })
        ));
    }

    #[test]
    fn unknown_product_is_rejected() {
        let err = ReservationPlan::validate(&[StockRequest::new(ProductId::new(), 1)], &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, ReservationError::UnknownProduct(_)));
    }

    #[test]
    fn plan_is_sorted_and_carries_observed_stock() {
        let a = product(5);
        let b = product(7);
        let products = catalog(&[a.clone(), b.clone()]);

        let plan = ReservationPlan::validate(
            &[StockRequest::new(b.id, 1), StockRequest::new(a.id, 2)],
            &products,
        )
        .unwrap();

        let ids: Vec<_> = plan.decrements().iter().map(|d| d.product_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);

        let for_b = plan.decrements().iter().find(|d| d.product_id == b.id).unwrap();
        assert_eq!(for_b.observed_stock, 7);
        assert_eq!(for_b.quantity, 1);
    }

    #[test]
    fn compensations_run_in_reverse() {
        let (a, b) = (ProductId::new(), ProductId::new());
        let mut ledger = ReservationLedger::new();
        ledger.record(a, 2);
        ledger.record(b, 1);

        let undo: Vec<_> = ledger.compensations().collect();
        assert_eq!(undo, vec![StockRequest::new(b, 1), StockRequest::new(a, 2)]);
    }

    proptest! {
        #[test]
        fn validate_accepts_exactly_when_stock_covers_request(stock in 0i64..50, qty in 1u32..60) {
            let p = product(stock);
            let products = catalog(&[p.clone()]);
            let result = ReservationPlan::validate(&[StockRequest::new(p.id, qty)], &products);

            prop_assert_eq!(result.is_ok(), stock >= i64::from(qty));
        }
    }
}
