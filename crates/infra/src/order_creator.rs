//! Checkout: cart → priced, persisted order.
//!
//! Steps, in order:
//!
//! 1. load the cart and the products it references
//! 2. validate every line against current stock (no mutation on failure)
//! 3. reserve stock through `InventoryGuard` (all or nothing)
//! 4. persist the order with prices frozen from step 1
//! 5. clear the cart if it is unchanged since step 1 (failure is logged, the
//!    order stands)
//! 6. publish `OrderPlaced`
//!
//! A persistence failure in step 4 compensates the reservation before the
//! error is returned, so stock is never left decremented without an order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use orderkit_core::{AggregateRoot, ExpectedVersion, OrderId, ProductId, UserId};
use orderkit_inventory::{Product, ReservationPlan, StockRequest};
use orderkit_orders::{Cart, Contact, Order, OrderError, OrderEvent, OrderLine, OrderPlaced};

use crate::error::ServiceError;
use crate::inventory_guard::InventoryGuard;
use crate::store::{CartStore, OrderStore, ProductCatalog, ProductStock, StoreError, Stores};
use crate::{OrderEventBus, publish_order_event};

#[derive(Clone)]
pub struct OrderCreator {
    catalog: Arc<dyn ProductCatalog>,
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
    guard: InventoryGuard<Arc<dyn ProductStock>>,
    bus: Arc<OrderEventBus>,
}

impl OrderCreator {
    pub fn new(stores: &Stores, bus: Arc<OrderEventBus>, cas_max_attempts: u32) -> Self {
        Self {
            catalog: stores.catalog.clone(),
            carts: stores.carts.clone(),
            orders: stores.orders.clone(),
            guard: InventoryGuard::with_max_attempts(stores.stock.clone(), cas_max_attempts),
            bus,
        }
    }

    /// Convert the user's cart into a `Pending` order.
    #[instrument(skip(self, contact), err)]
    pub async fn create_order(&self, user_id: UserId, contact: Contact) -> Result<Order, ServiceError> {
        let mut cart = self
            .carts
            .load_cart(user_id)
            .await?
            .unwrap_or_else(|| Cart::new(user_id));
        if cart.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let ids: Vec<_> = cart.lines().iter().map(|l| l.product_id).collect();
        let products: HashMap<_, Product> = self
            .catalog
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let requests: Vec<_> = cart
            .lines()
            .iter()
            .map(|l| StockRequest::new(l.product_id, l.quantity))
            .collect();
        let plan = ReservationPlan::validate(&requests, &products)?;

        // Prices are frozen from the same read the stock check used.
        let order = build_order(user_id, contact, &cart, &products)?;

        let ledger = self.guard.reserve(&plan).await?;

        if let Err(err) = self.orders.insert_order(&order).await {
            error!(
                order_id = %order.id_typed(),
                error = %err,
                "order insert failed after reservation; releasing stock"
            );
            self.guard.compensate(&ledger).await;
            return Err(ServiceError::OrderPersistence(err.to_string()));
        }

        // Only clear the cart that was checked out; lines added meanwhile stay.
        let loaded = cart.version();
        cart.clear();
        match self.carts.save_cart(&cart, ExpectedVersion::Exact(loaded)).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => warn!(
                order_id = %order.id_typed(),
                user_id = %user_id,
                "cart changed during checkout; left as is"
            ),
            Err(err) => warn!(
                order_id = %order.id_typed(),
                user_id = %user_id,
                error = %err,
                "order placed but cart could not be cleared"
            ),
        }

        info!(
            order_id = %order.id_typed(),
            total = %order.total_price(),
            lines = order.lines().len(),
            "order placed"
        );

        publish_order_event(
            &self.bus,
            &order,
            OrderEvent::OrderPlaced(OrderPlaced {
                order: order.clone(),
                occurred_at: Utc::now(),
            }),
        );

        Ok(order)
    }
}

fn build_order(
    user_id: UserId,
    contact: Contact,
    cart: &Cart,
    products: &HashMap<ProductId, Product>,
) -> Result<Order, ServiceError> {
    let mut lines = Vec::with_capacity(cart.lines().len());
    for line in cart.lines() {
        let product = products
            .get(&line.product_id)
            .ok_or(ServiceError::ProductNotFound(line.product_id))?;
        lines.push(
            OrderLine::new(product.id, product.name.clone(), line.quantity, product.price)
                .map_err(|e| ServiceError::Validation(e.to_string()))?,
        );
    }

    Order::place(OrderId::new(), user_id, contact, lines, Utc::now()).map_err(|e| match e {
        OrderError::EmptyOrder => ServiceError::EmptyCart,
        other => ServiceError::Validation(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderkit_core::Money;
    use orderkit_events::EventBus;
    use orderkit_orders::OrderStatus;

    struct Shop {
        stores: Stores,
        bus: Arc<OrderEventBus>,
        creator: OrderCreator,
    }

    fn shop() -> Shop {
        let stores = Stores::in_memory();
        let bus = Arc::new(OrderEventBus::new());
        let creator = OrderCreator::new(&stores, bus.clone(), 8);
        Shop { stores, bus, creator }
    }

    fn contact() -> Contact {
        Contact {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    async fn product(stores: &Stores, cents: u64, stock: i64) -> ProductId {
        let p = Product::new(ProductId::new(), "Lamp", Money::from_cents(cents), stock).unwrap();
        stores.catalog.insert_product(&p).await.unwrap();
        p.id
    }

    async fn fill_cart(stores: &Stores, user: UserId, lines: &[(ProductId, u32)]) {
        let mut cart = Cart::new(user);
        for (id, qty) in lines {
            cart.add_item(*id, *qty).unwrap();
        }
        stores.carts.save_cart(&cart, ExpectedVersion::Any).await.unwrap();
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let shop = shop();
        let err = shop
            .creator
            .create_order(UserId::new(), contact())
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::EmptyCart);
    }

    #[tokio::test]
    async fn checkout_prices_decrements_clears_and_publishes() {
        let shop = shop();
        let mut events = shop.bus.subscribe();
        let user = UserId::new();
        let a = product(&shop.stores, 1000, 5).await;
        let b = product(&shop.stores, 2500, 1).await;
        fill_cart(&shop.stores, user, &[(a, 2), (b, 1)]).await;

        let order = shop.creator.create_order(user, contact()).await.unwrap();

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total_price(), Money::from_cents(4500));
        assert_eq!(shop.stores.stock.read_stock(a).await.unwrap(), 3);
        assert_eq!(shop.stores.stock.read_stock(b).await.unwrap(), 0);
        let cart = shop.stores.carts.load_cart(user).await.unwrap().unwrap();
        assert!(cart.is_empty());

        let envelope = events.try_recv().unwrap();
        assert_eq!(envelope.event_type(), "orders.order.placed");
        assert_eq!(envelope.payload().order().id_typed(), order.id_typed());
    }

    #[tokio::test]
    async fn unknown_product_in_cart_is_reported() {
        let shop = shop();
        let user = UserId::new();
        let ghost = ProductId::new();
        fill_cart(&shop.stores, user, &[(ghost, 1)]).await;

        let err = shop.creator.create_order(user, contact()).await.unwrap_err();
        assert_eq!(err, ServiceError::ProductNotFound(ghost));
    }
}
