//! In-memory store adapters (tests/dev).
//!
//! Each conditional write runs under the store's write lock, so the
//! compare and the swap are atomic with respect to every other writer.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use orderkit_core::{AggregateRoot, ExpectedVersion, Money, OrderId, ProductId, ReviewId, UserId};
use orderkit_inventory::Product;
use orderkit_orders::{Cart, Order, OrderError, OrderStatus};
use orderkit_reviews::{Review, ReviewSummary};

use super::{CartStore, CasOutcome, OrderStore, ProductCatalog, ProductStock, ReviewStore, StoreError};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
}

/// Products with their stock counters.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStock for InMemoryProductStore {
    async fn read_stock(&self, product_id: ProductId) -> Result<i64, StoreError> {
        read(&self.products)?
            .get(&product_id)
            .map(|p| p.stock)
            .ok_or(StoreError::NotFound("product"))
    }

    async fn compare_and_swap_stock(
        &self,
        product_id: ProductId,
        expected: i64,
        new: i64,
    ) -> Result<CasOutcome<i64>, StoreError> {
        if new < 0 {
            return Err(StoreError::Conflict(format!("stock cannot become {new}")));
        }

        let mut products = write(&self.products)?;
        let product = products
            .get_mut(&product_id)
            .ok_or(StoreError::NotFound("product"))?;

        if product.stock != expected {
            return Ok(CasOutcome::Stale {
                actual: product.stock,
            });
        }

        product.stock = new;
        Ok(CasOutcome::Applied(new))
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductStore {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(read(&self.products)?.get(&product_id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let products = read(&self.products)?;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut products = write(&self.products)?;
        if products.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!("product {} exists", product.id)));
        }
        products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_price(&self, product_id: ProductId, price: Money) -> Result<(), StoreError> {
        let mut products = write(&self.products)?;
        let product = products
            .get_mut(&product_id)
            .ok_or(StoreError::NotFound("product"))?;
        product.price = price;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    carts: RwLock<HashMap<UserId, Cart>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn load_cart(&self, user_id: UserId) -> Result<Option<Cart>, StoreError> {
        Ok(read(&self.carts)?.get(&user_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart, expected: ExpectedVersion) -> Result<(), StoreError> {
        let mut carts = write(&self.carts)?;
        let current = carts.get(&cart.user_id()).map(|c| c.version()).unwrap_or(0);

        expected
            .check(current)
            .map_err(|e| StoreError::Conflict(format!("cart {}: {e}", cart.user_id())))?;

        carts.insert(cart.user_id(), cart.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id_typed().cmp(&a.id_typed()))
    });
    orders
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = write(&self.orders)?;
        if orders.contains_key(&order.id_typed()) {
            return Err(StoreError::Conflict(format!("order {} exists", order.id_typed())));
        }
        orders.insert(order.id_typed(), order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(read(&self.orders)?.get(&order_id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let orders = read(&self.orders)?;
        Ok(newest_first(
            orders
                .values()
                .filter(|o| o.user_id() == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(newest_first(read(&self.orders)?.values().cloned().collect()))
    }

    async fn list_orders_created_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = read(&self.orders)?;
        Ok(orders
            .values()
            .filter(|o| from <= o.created_at() && o.created_at() < until)
            .cloned()
            .collect())
    }

    async fn compare_and_set_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<CasOutcome<Order>, StoreError> {
        let mut orders = write(&self.orders)?;
        let order = orders
            .get_mut(&order_id)
            .ok_or(StoreError::NotFound("order"))?;

        if order.status() != expected {
            return Ok(CasOutcome::Stale {
                actual: order.clone(),
            });
        }

        order
            .transition(new)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;
        Ok(CasOutcome::Applied(order.clone()))
    }

    async fn set_line_reviewed(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        expected: bool,
        new: bool,
    ) -> Result<CasOutcome<bool>, StoreError> {
        let mut orders = write(&self.orders)?;
        let order = orders
            .get_mut(&order_id)
            .ok_or(StoreError::NotFound("order"))?;
        let current = order
            .line(product_id)
            .map(|l| l.is_reviewed)
            .ok_or(StoreError::NotFound("order line"))?;

        if current != expected {
            return Ok(CasOutcome::Stale { actual: current });
        }
        if current == new {
            return Ok(CasOutcome::Applied(new));
        }

        let result = if new {
            order.mark_line_reviewed(product_id)
        } else {
            order.clear_line_review(product_id)
        };
        match result {
            Ok(()) => Ok(CasOutcome::Applied(new)),
            Err(OrderError::LineNotFound(_)) => Err(StoreError::NotFound("order line")),
            Err(e) => Err(StoreError::Conflict(e.to_string())),
        }
    }
}

/// Reviews, plus a handle on the products whose summaries they feed.
#[derive(Debug)]
pub struct InMemoryReviewStore {
    reviews: RwLock<HashMap<ReviewId, Review>>,
    products: Arc<InMemoryProductStore>,
}

impl InMemoryReviewStore {
    pub fn new(products: Arc<InMemoryProductStore>) -> Self {
        Self {
            reviews: RwLock::default(),
            products,
        }
    }
}

#[async_trait]
impl ReviewStore for InMemoryReviewStore {
    async fn insert_review(&self, review: &Review) -> Result<(), StoreError> {
        let mut reviews = write(&self.reviews)?;
        let duplicate = reviews.values().any(|r| {
            r.user_id() == review.user_id()
                && r.order_id() == review.order_id()
                && r.product_id() == review.product_id()
        });
        if duplicate || reviews.contains_key(&review.id_typed()) {
            return Err(StoreError::Conflict("review exists".to_string()));
        }
        reviews.insert(review.id_typed(), review.clone());
        Ok(())
    }

    async fn get_review(&self, review_id: ReviewId) -> Result<Option<Review>, StoreError> {
        Ok(read(&self.reviews)?.get(&review_id).cloned())
    }

    async fn update_review(&self, review: &Review) -> Result<(), StoreError> {
        let mut reviews = write(&self.reviews)?;
        let slot = reviews
            .get_mut(&review.id_typed())
            .ok_or(StoreError::NotFound("review"))?;
        *slot = review.clone();
        Ok(())
    }

    async fn delete_review(&self, review_id: ReviewId) -> Result<bool, StoreError> {
        Ok(write(&self.reviews)?.remove(&review_id).is_some())
    }

    async fn reviews_for_product(&self, product_id: ProductId) -> Result<Vec<Review>, StoreError> {
        let reviews = read(&self.reviews)?;
        let mut found: Vec<Review> = reviews
            .values()
            .filter(|r| r.product_id() == product_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id_typed().cmp(&b.id_typed()))
        });
        Ok(found)
    }

    async fn refresh_product_summary(&self, product_id: ProductId) -> Result<ReviewSummary, StoreError> {
        // The review write lock is held until the product is updated.
        let reviews = write(&self.reviews)?;
        let summary = ReviewSummary::from_ratings(
            reviews
                .values()
                .filter(|r| r.product_id() == product_id)
                .map(Review::rating),
        );

        let mut products = write(&self.products.products)?;
        let product = products
            .get_mut(&product_id)
            .ok_or(StoreError::NotFound("product"))?;
        product.rating = summary.rating;
        product.num_reviews = summary.num_reviews;
        Ok(summary)
    }
}
