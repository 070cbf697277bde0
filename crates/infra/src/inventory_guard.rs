//! All-or-nothing stock reservation over a store without multi-row
//! transactions.
//!
//! Reservation is a small saga:
//!
//! 1. each planned decrement is applied with compare-and-swap, retrying on a
//!    stale read while the fresh value still covers the request
//! 2. every applied decrement is recorded in a `ReservationLedger`
//! 3. on the first failure the ledger is replayed backwards as compensating
//!    increments (also compare-and-swap) before the error is returned

use tracing::{debug, error, instrument, warn};

use orderkit_core::ProductId;
use orderkit_inventory::{PlannedDecrement, ReservationLedger, ReservationPlan};

use crate::config::DEFAULT_CAS_MAX_ATTEMPTS;
use crate::error::ServiceError;
use crate::store::{CasOutcome, ProductStock, StoreError};

#[derive(Debug, Clone)]
pub struct InventoryGuard<S> {
    stock: S,
    max_attempts: u32,
}

impl<S: ProductStock> InventoryGuard<S> {
    pub fn new(stock: S) -> Self {
        Self::with_max_attempts(stock, DEFAULT_CAS_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(stock: S, max_attempts: u32) -> Self {
        Self {
            stock,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Apply every decrement of `plan` or none of them.
    ///
    /// On success the returned ledger lists what was applied, so a later
    /// failure (e.g. persisting the order) can still be compensated.
    #[instrument(skip(self, plan), fields(lines = plan.decrements().len()), err)]
    pub async fn reserve(&self, plan: &ReservationPlan) -> Result<ReservationLedger, ServiceError> {
        let mut ledger = ReservationLedger::new();

        for decrement in plan.decrements() {
            match self.decrement(decrement).await {
                Ok(()) => ledger.record(decrement.product_id, decrement.quantity),
                Err(err) => {
                    if !ledger.is_empty() {
                        warn!(
                            product_id = %decrement.product_id,
                            error = %err,
                            applied = ledger.applied().len(),
                            "reservation failed partway; compensating"
                        );
                        self.compensate(&ledger).await;
                    }
                    return Err(err);
                }
            }
        }

        Ok(ledger)
    }

    /// Undo the decrements recorded in `ledger`, most recent first.
    ///
    /// Failures are logged; there is nothing left to roll back to.
    pub async fn compensate(&self, ledger: &ReservationLedger) {
        for undo in ledger.compensations() {
            if let Err(err) = self.release(undo.product_id, undo.quantity).await {
                error!(
                    product_id = %undo.product_id,
                    quantity = undo.quantity,
                    error = %err,
                    "compensating stock increment failed"
                );
            }
        }
    }

    /// Add `quantity` units back through compare-and-swap. Returns the new stock.
    #[instrument(skip(self), err)]
    pub async fn release(&self, product_id: ProductId, quantity: u32) -> Result<i64, ServiceError> {
        let mut expected = self.stock.read_stock(product_id).await.map_err(|e| not_found_as_product(e, product_id))?;

        for _ in 0..self.max_attempts {
            let new = expected
                .checked_add(i64::from(quantity))
                .ok_or_else(|| ServiceError::Validation("stock overflow".to_string()))?;

            match self
                .stock
                .compare_and_swap_stock(product_id, expected, new)
                .await
                .map_err(|e| not_found_as_product(e, product_id))?
            {
                CasOutcome::Applied(stock) => return Ok(stock),
                CasOutcome::Stale { actual } => {
                    debug!(product_id = %product_id, expected, actual, "stale stock read on increment");
                    expected = actual;
                }
            }
        }

        Err(ServiceError::StockContention { product_id })
    }

    async fn decrement(&self, planned: &PlannedDecrement) -> Result<(), ServiceError> {
        let product_id = planned.product_id;
        let requested = i64::from(planned.quantity);
        let mut expected = planned.observed_stock;

        for _ in 0..self.max_attempts {
            if expected < requested {
                return Err(ServiceError::InsufficientStock {
                    product_id,
                    available: expected,
                    requested: planned.quantity,
                });
            }

            match self
                .stock
                .compare_and_swap_stock(product_id, expected, expected - requested)
                .await
                .map_err(|e| not_found_as_product(e, product_id))?
            {
                CasOutcome::Applied(_) => return Ok(()),
                CasOutcome::Stale { actual } => {
                    debug!(product_id = %product_id, expected, actual, "lost stock race; retrying");
                    expected = actual;
                }
            }
        }

        if expected < requested {
            return Err(ServiceError::InsufficientStock {
                product_id,
                available: expected,
                requested: planned.quantity,
            });
        }
        Err(ServiceError::StockContention { product_id })
    }
}

fn not_found_as_product(err: StoreError, product_id: ProductId) -> ServiceError {
    match err {
        StoreError::NotFound(_) => ServiceError::ProductNotFound(product_id),
        other => ServiceError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use orderkit_core::Money;
    use orderkit_inventory::{Product, StockRequest};

    use crate::store::{InMemoryProductStore, ProductCatalog};

    async fn seeded(stocks: &[i64]) -> (Arc<InMemoryProductStore>, Vec<Product>) {
        let store = Arc::new(InMemoryProductStore::new());
        let mut products = Vec::new();
        for stock in stocks {
            let p = Product::new(ProductId::new(), "P", Money::from_cents(100), *stock).unwrap();
            store.insert_product(&p).await.unwrap();
            products.push(p);
        }
        (store, products)
    }

    fn plan(products: &[Product], quantities: &[u32]) -> ReservationPlan {
        let map: HashMap<_, _> = products.iter().map(|p| (p.id, p.clone())).collect();
        let requests: Vec<_> = products
            .iter()
            .zip(quantities)
            .map(|(p, q)| StockRequest::new(p.id, *q))
            .collect();
        ReservationPlan::validate(&requests, &map).unwrap()
    }

    /// Fails every compare-and-swap after the first `ok_calls`.
    struct FailAfter {
        inner: Arc<InMemoryProductStore>,
        ok_calls: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProductStock for FailAfter {
        async fn read_stock(&self, product_id: ProductId) -> Result<i64, StoreError> {
            self.inner.read_stock(product_id).await
        }

        async fn compare_and_swap_stock(
            &self,
            product_id: ProductId,
            expected: i64,
            new: i64,
        ) -> Result<CasOutcome<i64>, StoreError> {
            // Decrements only; increments (compensation) always pass through.
            if new < expected && self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_calls {
                return Err(StoreError::Unavailable("injected".to_string()));
            }
            self.inner.compare_and_swap_stock(product_id, expected, new).await
        }
    }

    #[tokio::test]
    async fn reserves_every_line() {
        let (store, products) = seeded(&[5, 3]).await;
        let guard = InventoryGuard::new(store.clone());

        let ledger = guard.reserve(&plan(&products, &[2, 3])).await.unwrap();

        assert_eq!(ledger.applied().len(), 2);
        assert_eq!(store.read_stock(products[0].id).await.unwrap(), 3);
        assert_eq!(store.read_stock(products[1].id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stale_read_is_retried_against_fresh_stock() {
        let (store, products) = seeded(&[5]).await;
        let stale_plan = plan(&products, &[2]);
        // Someone else takes 1 unit after validation.
        store.compare_and_swap_stock(products[0].id, 5, 4).await.unwrap();

        InventoryGuard::new(store.clone())
            .reserve(&stale_plan)
            .await
            .unwrap();

        assert_eq!(store.read_stock(products[0].id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn lost_race_reports_fresh_shortfall_and_compensates() {
        let (store, products) = seeded(&[4, 2]).await;
        let stale_plan = plan(&products, &[1, 2]);
        store.compare_and_swap_stock(products[1].id, 2, 1).await.unwrap();

        let err = InventoryGuard::new(store.clone())
            .reserve(&stale_plan)
            .await
            .unwrap_err();

        let second = products[1].id;
        let first_id = products[0].id;
        match err {
            ServiceError::InsufficientStock {
                product_id,
                available,
                requested,
            } => {
                assert_eq!(product_id, second);
                assert_eq!(available, 1);
                assert_eq!(requested, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Whichever line was applied first has been given back.
        assert_eq!(store.read_stock(first_id).await.unwrap(), 4);
        assert_eq!(store.read_stock(second).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn store_failure_mid_reservation_leaves_no_partial_decrement() {
        let (store, products) = seeded(&[10, 10, 10]).await;
        let faulty = FailAfter {
            inner: store.clone(),
            ok_calls: 2,
            calls: AtomicUsize::new(0),
        };

        let err = InventoryGuard::new(faulty)
            .reserve(&plan(&products, &[1, 2, 3]))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Store(StoreError::Unavailable(_))));
        for p in &products {
            assert_eq!(store.read_stock(p.id).await.unwrap(), 10);
        }
    }

    #[tokio::test]
    async fn release_adds_units_back() {
        let (store, products) = seeded(&[1]).await;
        let guard = InventoryGuard::new(store.clone());

        assert_eq!(guard.release(products[0].id, 4).await.unwrap(), 5);
        assert!(matches!(
            guard.release(ProductId::new(), 1).await,
            Err(ServiceError::ProductNotFound(_))
        ));
    }
}
