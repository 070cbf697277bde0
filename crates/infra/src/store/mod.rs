//! Store ports for the order core.
//!
//! Every shared mutable field is changed through a conditional write:
//!
//! - `ProductStock::compare_and_swap_stock` for stock counts
//! - `OrderStore::compare_and_set_status` for order status
//! - `OrderStore::set_line_reviewed` for the per-line review flag
//! - `CartStore::save_cart` with an `ExpectedVersion`
//!
//! A conditional write that finds a different current value reports
//! `CasOutcome::Stale` with that value instead of failing, so callers can
//! decide whether to retry or reject.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use orderkit_core::{ExpectedVersion, Money, OrderId, ProductId, ReviewId, UserId};
use orderkit_inventory::Product;
use orderkit_orders::{Cart, Order, OrderStatus};
use orderkit_reviews::{Review, ReviewSummary};

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::{InMemoryCartStore, InMemoryOrderStore, InMemoryProductStore, InMemoryReviewStore};
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Store operation error (infrastructure, not domain).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Unique constraint or version expectation violated.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(&'static str),
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome<T> {
    /// The write happened; carries the value now stored.
    Applied(T),
    /// The stored value differed from the expectation; nothing was written.
    Stale { actual: T },
}

impl<T> CasOutcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, CasOutcome::Applied(_))
    }
}

/// Per-product stock counter.
#[async_trait]
pub trait ProductStock: Send + Sync {
    async fn read_stock(&self, product_id: ProductId) -> Result<i64, StoreError>;

    /// Set stock to `new` only if it currently equals `expected`.
    ///
    /// Implementations reject a negative `new` with `StoreError::Conflict`.
    async fn compare_and_swap_stock(
        &self,
        product_id: ProductId,
        expected: i64,
        new: i64,
    ) -> Result<CasOutcome<i64>, StoreError>;
}

/// Narrow catalog interface: the core reads products and changes prices.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Products found among `ids`; missing ids are simply absent.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn update_price(&self, product_id: ProductId, price: Money) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn load_cart(&self, user_id: UserId) -> Result<Option<Cart>, StoreError>;

    /// Persist `cart`. `expected` is checked against the stored version; an
    /// absent cart counts as version 0.
    async fn save_cart(&self, cart: &Cart, expected: ExpectedVersion) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order. An existing id is a `Conflict`.
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Orders of one user, newest first.
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError>;

    /// Every order, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Orders with `from <= created_at < until`.
    async fn list_orders_created_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError>;

    /// Move the order from `expected` to `new` if its stored status is still
    /// `expected`. `Stale` carries the current order.
    async fn compare_and_set_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<CasOutcome<Order>, StoreError>;

    /// Flip one line's review flag from `expected` to `new`.
    async fn set_line_reviewed(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        expected: bool,
        new: bool,
    ) -> Result<CasOutcome<bool>, StoreError>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Insert a review; a second review for the same
    /// `(user_id, order_id, product_id)` is a `Conflict`.
    async fn insert_review(&self, review: &Review) -> Result<(), StoreError>;

    async fn get_review(&self, review_id: ReviewId) -> Result<Option<Review>, StoreError>;

    async fn update_review(&self, review: &Review) -> Result<(), StoreError>;

    /// Returns whether a review was removed.
    async fn delete_review(&self, review_id: ReviewId) -> Result<bool, StoreError>;

    /// Reviews of one product, oldest first.
    async fn reviews_for_product(&self, product_id: ProductId) -> Result<Vec<Review>, StoreError>;

    /// Recompute the product's mean rating and review count from the stored
    /// reviews and write them onto the product as one atomic step. Concurrent
    /// refreshes of the same product are serialized, so the last one to
    /// finish reflects every review committed before it started.
    async fn refresh_product_summary(&self, product_id: ProductId) -> Result<ReviewSummary, StoreError>;
}

#[async_trait]
impl<S> ProductStock for Arc<S>
where
    S: ProductStock + ?Sized,
{
    async fn read_stock(&self, product_id: ProductId) -> Result<i64, StoreError> {
        (**self).read_stock(product_id).await
    }

    async fn compare_and_swap_stock(
        &self,
        product_id: ProductId,
        expected: i64,
        new: i64,
    ) -> Result<CasOutcome<i64>, StoreError> {
        (**self).compare_and_swap_stock(product_id, expected, new).await
    }
}

/// All store ports an application instance needs.
#[derive(Clone)]
pub struct Stores {
    pub stock: Arc<dyn ProductStock>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
    pub reviews: Arc<dyn ReviewStore>,
}

impl Stores {
    /// Process-local stores (tests/dev).
    pub fn in_memory() -> Self {
        let products = Arc::new(InMemoryProductStore::new());
        Self {
            stock: products.clone(),
            catalog: products.clone(),
            carts: Arc::new(InMemoryCartStore::new()),
            orders: Arc::new(InMemoryOrderStore::new()),
            reviews: Arc::new(InMemoryReviewStore::new(products)),
        }
    }

    /// Postgres-backed stores sharing one pool.
    #[cfg(feature = "postgres")]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let store = Arc::new(PostgresStore::new(pool));
        Self {
            stock: store.clone(),
            catalog: store.clone(),
            carts: store.clone(),
            orders: store.clone(),
            reviews: store,
        }
    }
}

impl core::fmt::Debug for Stores {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
