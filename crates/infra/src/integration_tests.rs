//! End-to-end tests for the order core over the in-memory stores.
//!
//! Verifies:
//! - concurrent checkouts never oversell
//! - a failed reservation or order insert leaves stock untouched
//! - placed orders keep their price snapshot
//! - checkout leaves a cart alone if it changed meanwhile
//! - concurrent transitions on one order are serialized
//! - a failed review delete keeps the review and its line flag together
//! - concurrent reviews of one product leave an accurate summary
//! - receipts follow committed transitions, one per status

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use orderkit_core::{AggregateRoot, ExpectedVersion, Money, OrderId, ProductId, ReviewId, UserId};
    use orderkit_events::EventBus;
    use orderkit_inventory::Product;
    use orderkit_orders::{Cart, Contact, Order, OrderStatus};
    use orderkit_reviews::{Review, ReviewSummary};

    use crate::catalog_service::CatalogService;
    use crate::error::ServiceError;
    use crate::notifications::{NotificationPipeline, NotificationWorker, RecordingMailer};
    use crate::order_creator::OrderCreator;
    use crate::order_lifecycle::OrderLifecycle;
    use crate::review_gate::{NewReview, ReviewGate};
    use crate::store::{
        CartStore, CasOutcome, InMemoryCartStore, InMemoryOrderStore, InMemoryProductStore,
        InMemoryReviewStore, OrderStore, ProductStock, ReviewStore, StoreError, Stores,
    };
    use crate::OrderEventBus;

    fn contact() -> Contact {
        Contact {
            name: "Ada".into(),
            email: "ada@example.com".into(),
        }
    }

    async fn add_product(stores: &Stores, cents: u64, stock: i64) -> ProductId {
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

    fn creator(stores: &Stores) -> OrderCreator {
        OrderCreator::new(stores, Arc::new(OrderEventBus::new()), 8)
    }

    async fn completed_order(stores: &Stores, buyer: UserId, product: ProductId) -> Order {
        fill_cart(stores, buyer, &[(product, 1)]).await;
        let order = creator(stores).create_order(buyer, contact()).await.unwrap();
        let lifecycle = OrderLifecycle::new(stores.orders.clone(), Arc::new(OrderEventBus::new()));
        lifecycle.transition(order.id_typed(), OrderStatus::Shipped).await.unwrap();
        lifecycle.transition(order.id_typed(), OrderStatus::Completed).await.unwrap();
        order
    }

    fn review_of(order: &Order, product_id: ProductId, rating: i64) -> NewReview {
        NewReview {
            product_id,
            order_id: order.id_typed(),
            user_id: order.user_id(),
            name: "Ada".into(),
            rating,
            comment: "fine".into(),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Failure-injecting stores
    // ─────────────────────────────────────────────────────────────

    /// Stock store that is unreachable for one product.
    struct UnreachableFor {
        inner: Arc<InMemoryProductStore>,
        broken: ProductId,
    }

    #[async_trait]
    impl ProductStock for UnreachableFor {
        async fn read_stock(&self, product_id: ProductId) -> Result<i64, StoreError> {
            self.inner.read_stock(product_id).await
        }

        async fn compare_and_swap_stock(
            &self,
            product_id: ProductId,
            expected: i64,
            new: i64,
        ) -> Result<CasOutcome<i64>, StoreError> {
            if product_id == self.broken {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            self.inner.compare_and_swap_stock(product_id, expected, new).await
        }
    }

    /// Order store that rejects every insert.
    struct RejectingOrders {
        inner: InMemoryOrderStore,
    }

    #[async_trait]
    impl OrderStore for RejectingOrders {
        async fn insert_order(&self, _order: &Order) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }

        async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
            self.inner.get_order(order_id).await
        }

        async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
            self.inner.list_orders_for_user(user_id).await
        }

        async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
            self.inner.list_orders().await
        }

        async fn list_orders_created_between(
            &self,
            from: DateTime<Utc>,
            until: DateTime<Utc>,
        ) -> Result<Vec<Order>, StoreError> {
            self.inner.list_orders_created_between(from, until).await
        }

        async fn compare_and_set_status(
            &self,
            order_id: OrderId,
            expected: OrderStatus,
            new: OrderStatus,
        ) -> Result<CasOutcome<Order>, StoreError> {
            self.inner.compare_and_set_status(order_id, expected, new).await
        }

        async fn set_line_reviewed(
            &self,
            order_id: OrderId,
            product_id: ProductId,
            expected: bool,
            new: bool,
        ) -> Result<CasOutcome<bool>, StoreError> {
            self.inner
                .set_line_reviewed(order_id, product_id, expected, new)
                .await
        }
    }

    /// Cart store whose saves fail once a cart exists.
    struct StickyCarts {
        inner: InMemoryCartStore,
    }

    #[async_trait]
    impl CartStore for StickyCarts {
        async fn load_cart(&self, user_id: UserId) -> Result<Option<Cart>, StoreError> {
            self.inner.load_cart(user_id).await
        }

        async fn save_cart(&self, cart: &Cart, expected: ExpectedVersion) -> Result<(), StoreError> {
            if self.inner.load_cart(cart.user_id()).await?.is_some() {
                return Err(StoreError::Unavailable("cart backend down".into()));
            }
            self.inner.save_cart(cart, expected).await
        }
    }

    /// Cart store where the user adds `extra` right before checkout clears
    /// the cart.
    struct EditedDuringCheckout {
        inner: InMemoryCartStore,
        extra: ProductId,
    }

    #[async_trait]
    impl CartStore for EditedDuringCheckout {
        async fn load_cart(&self, user_id: UserId) -> Result<Option<Cart>, StoreError> {
            self.inner.load_cart(user_id).await
        }

        async fn save_cart(&self, cart: &Cart, expected: ExpectedVersion) -> Result<(), StoreError> {
            if cart.is_empty() {
                if let Some(mut current) = self.inner.load_cart(cart.user_id()).await? {
                    let seen = current.version();
                    current.add_item(self.extra, 1).unwrap();
                    self.inner.save_cart(&current, ExpectedVersion::Exact(seen)).await?;
                }
            }
            self.inner.save_cart(cart, expected).await
        }
    }

    /// Order store that cannot clear review flags while `failing` is set.
    struct StuckFlags {
        inner: InMemoryOrderStore,
        failing: AtomicBool,
    }

    #[async_trait]
    impl OrderStore for StuckFlags {
        async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
            self.inner.insert_order(order).await
        }

        async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
            self.inner.get_order(order_id).await
        }

        async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
            self.inner.list_orders_for_user(user_id).await
        }

        async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
            self.inner.list_orders().await
        }

        async fn list_orders_created_between(
            &self,
            from: DateTime<Utc>,
            until: DateTime<Utc>,
        ) -> Result<Vec<Order>, StoreError> {
            self.inner.list_orders_created_between(from, until).await
        }

        async fn compare_and_set_status(
            &self,
            order_id: OrderId,
            expected: OrderStatus,
            new: OrderStatus,
        ) -> Result<CasOutcome<Order>, StoreError> {
            self.inner.compare_and_set_status(order_id, expected, new).await
        }

        async fn set_line_reviewed(
            &self,
            order_id: OrderId,
            product_id: ProductId,
            expected: bool,
            new: bool,
        ) -> Result<CasOutcome<bool>, StoreError> {
            if !new && self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            self.inner
                .set_line_reviewed(order_id, product_id, expected, new)
                .await
        }
    }

    /// Review store with switchable delete failures and a slow first
    /// summary refresh.
    struct ScriptedReviews {
        inner: InMemoryReviewStore,
        failing_deletes: AtomicBool,
        slow_refresh: AtomicBool,
    }

    impl ScriptedReviews {
        fn new(products: Arc<InMemoryProductStore>) -> Self {
            Self {
                inner: InMemoryReviewStore::new(products),
                failing_deletes: AtomicBool::new(false),
                slow_refresh: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ReviewStore for ScriptedReviews {
        async fn insert_review(&self, review: &Review) -> Result<(), StoreError> {
            self.inner.insert_review(review).await
        }

        async fn get_review(&self, review_id: ReviewId) -> Result<Option<Review>, StoreError> {
            self.inner.get_review(review_id).await
        }

        async fn update_review(&self, review: &Review) -> Result<(), StoreError> {
            self.inner.update_review(review).await
        }

        async fn delete_review(&self, review_id: ReviewId) -> Result<bool, StoreError> {
            if self.failing_deletes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            self.inner.delete_review(review_id).await
        }

        async fn reviews_for_product(&self, product_id: ProductId) -> Result<Vec<Review>, StoreError> {
            self.inner.reviews_for_product(product_id).await
        }

        async fn refresh_product_summary(&self, product_id: ProductId) -> Result<ReviewSummary, StoreError> {
            if self.slow_refresh.swap(false, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            self.inner.refresh_product_summary(product_id).await
        }
    }

    /// In-memory stores with the review store swapped for `ScriptedReviews`.
    fn stores_with_scripted_reviews() -> (Stores, Arc<ScriptedReviews>) {
        let products = Arc::new(InMemoryProductStore::new());
        let reviews = Arc::new(ScriptedReviews::new(products.clone()));
        let mut stores = Stores::in_memory();
        stores.stock = products.clone();
        stores.catalog = products;
        stores.reviews = reviews.clone();
        (stores, reviews)
    }

    // ─────────────────────────────────────────────────────────────
    // Checkout
    // ─────────────────────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_never_oversell() {
        let stores = Stores::in_memory();
        let product = add_product(&stores, 500, 10).await;
        let creator = creator(&stores);

        let mut handles = Vec::new();
        for i in 0..24u32 {
            let user = UserId::new();
            let qty = 1 + i % 3;
            fill_cart(&stores, user, &[(product, qty)]).await;
            let creator = creator.clone();
            handles.push(tokio::spawn(async move {
                (qty, creator.create_order(user, contact()).await)
            }));
        }

        let mut reserved = 0i64;
        for h in handles {
            let (qty, result) = h.await.unwrap();
            match result {
                Ok(order) => {
                    assert_eq!(order.lines()[0].quantity, qty);
                    reserved += i64::from(qty);
                }
                Err(ServiceError::InsufficientStock { .. }) | Err(ServiceError::StockContention { .. }) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        let left = stores.stock.read_stock(product).await.unwrap();
        assert!(reserved <= 10);
        assert!(left >= 0);
        assert_eq!(left, 10 - reserved);
    }

    #[tokio::test]
    async fn shortfall_scenario_names_product_and_leaves_stock() {
        let stores = Stores::in_memory();
        let a = add_product(&stores, 1000, 2).await;
        let user = UserId::new();
        fill_cart(&stores, user, &[(a, 3)]).await;

        let err = creator(&stores).create_order(user, contact()).await.unwrap_err();

        assert_eq!(
            err,
            ServiceError::InsufficientStock {
                product_id: a,
                available: 2,
                requested: 3,
            }
        );
        assert_eq!(stores.stock.read_stock(a).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unreachable_store_mid_reservation_leaves_no_partial_decrement() {
        let products = Arc::new(InMemoryProductStore::new());
        let mut stores = Stores::in_memory();
        stores.catalog = products.clone();
        stores.stock = products.clone();

        let ids = [
            add_product(&stores, 100, 5).await,
            add_product(&stores, 100, 5).await,
            add_product(&stores, 100, 5).await,
        ];
        // Break whichever product is reserved last.
        let last = *ids.iter().max().unwrap();
        stores.stock = Arc::new(UnreachableFor {
            inner: products.clone(),
            broken: last,
        });

        let user = UserId::new();
        fill_cart(&stores, user, &[(ids[0], 1), (ids[1], 2), (ids[2], 3)]).await;

        let err = creator(&stores).create_order(user, contact()).await.unwrap_err();

        assert!(matches!(err, ServiceError::Store(StoreError::Unavailable(_))));
        for id in ids {
            assert_eq!(products.read_stock(id).await.unwrap(), 5);
        }
        assert!(stores.orders.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_order_insert_releases_the_reservation() {
        let mut stores = Stores::in_memory();
        stores.orders = Arc::new(RejectingOrders {
            inner: InMemoryOrderStore::new(),
        });
        let a = add_product(&stores, 1000, 4).await;
        let b = add_product(&stores, 2500, 1).await;
        let user = UserId::new();
        fill_cart(&stores, user, &[(a, 2), (b, 1)]).await;

        let err = creator(&stores).create_order(user, contact()).await.unwrap_err();

        assert!(matches!(err, ServiceError::OrderPersistence(_)));
        assert_eq!(stores.stock.read_stock(a).await.unwrap(), 4);
        assert_eq!(stores.stock.read_stock(b).await.unwrap(), 1);
        let cart = stores.carts.load_cart(user).await.unwrap().unwrap();
        assert_eq!(cart.lines().len(), 2);
    }

    #[tokio::test]
    async fn cart_clear_failure_does_not_lose_the_order() {
        let mut stores = Stores::in_memory();
        stores.carts = Arc::new(StickyCarts {
            inner: InMemoryCartStore::new(),
        });
        let a = add_product(&stores, 1000, 4).await;
        let user = UserId::new();
        fill_cart(&stores, user, &[(a, 1)]).await;

        let order = creator(&stores).create_order(user, contact()).await.unwrap();

        let stored = stores.orders.get_order(order.id_typed()).await.unwrap();
        assert_eq!(stored, Some(order));
        assert_eq!(stores.stock.read_stock(a).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn items_added_during_checkout_survive_the_cart_clear() {
        let extra = ProductId::new();
        let mut stores = Stores::in_memory();
        stores.carts = Arc::new(EditedDuringCheckout {
            inner: InMemoryCartStore::new(),
            extra,
        });
        let a = add_product(&stores, 1000, 4).await;
        let user = UserId::new();
        fill_cart(&stores, user, &[(a, 1)]).await;

        let order = creator(&stores).create_order(user, contact()).await.unwrap();

        assert_eq!(order.lines().len(), 1);
        let cart = stores.carts.load_cart(user).await.unwrap().unwrap();
        assert!(cart.lines().iter().any(|l| l.product_id == extra));
    }

    #[tokio::test]
    async fn order_keeps_price_snapshot_after_repricing() {
        let stores = Stores::in_memory();
        let catalog = CatalogService::new(&stores, 8);
        let a = add_product(&stores, 1000, 5).await;
        let user = UserId::new();
        fill_cart(&stores, user, &[(a, 2)]).await;

        let order = creator(&stores).create_order(user, contact()).await.unwrap();
        catalog.update_price(a, Money::from_cents(9900)).await.unwrap();

        let stored = stores.orders.get_order(order.id_typed()).await.unwrap().unwrap();
        assert_eq!(stored.total_price(), Money::from_cents(2000));
        assert_eq!(stored.lines()[0].price, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn cancelling_does_not_restock() {
        let stores = Stores::in_memory();
        let a = add_product(&stores, 1000, 5).await;
        let user = UserId::new();
        fill_cart(&stores, user, &[(a, 2)]).await;
        let order = creator(&stores).create_order(user, contact()).await.unwrap();

        OrderLifecycle::new(stores.orders.clone(), Arc::new(OrderEventBus::new()))
            .transition(order.id_typed(), OrderStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(stores.stock.read_stock(a).await.unwrap(), 3);
    }

    // ─────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_transitions_apply_once() {
        let stores = Stores::in_memory();
        let a = add_product(&stores, 1000, 5).await;
        let user = UserId::new();
        fill_cart(&stores, user, &[(a, 1)]).await;
        let order = creator(&stores).create_order(user, contact()).await.unwrap();

        let bus = Arc::new(OrderEventBus::new());
        let mut events = bus.subscribe();
        let lifecycle = OrderLifecycle::new(stores.orders.clone(), bus);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let lifecycle = lifecycle.clone();
            let id = order.id_typed();
            handles.push(tokio::spawn(async move {
                lifecycle.transition(id, OrderStatus::Shipped).await
            }));
        }

        let mut applied = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => applied += 1,
                Err(ServiceError::InvalidStatusTransition { from, to }) => {
                    assert_eq!(from, OrderStatus::Shipped);
                    assert_eq!(to, OrderStatus::Shipped);
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(applied, 1);
        assert!(events.try_recv().is_some());
        assert!(events.try_recv().is_none());
    }

    // ─────────────────────────────────────────────────────────────
    // Reviews
    // ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn completed_order_unlocks_review_and_rating() {
        let stores = Stores::in_memory();
        let a = add_product(&stores, 1000, 5).await;
        let buyer = UserId::new();
        fill_cart(&stores, buyer, &[(a, 1)]).await;
        let order = creator(&stores).create_order(buyer, contact()).await.unwrap();

        let lifecycle = OrderLifecycle::new(stores.orders.clone(), Arc::new(OrderEventBus::new()));
        lifecycle.transition(order.id_typed(), OrderStatus::Shipped).await.unwrap();
        lifecycle.transition(order.id_typed(), OrderStatus::Completed).await.unwrap();

        let gate = ReviewGate::new(&stores);
        let review = |user: UserId, rating: i64| NewReview {
            product_id: a,
            order_id: order.id_typed(),
            user_id: user,
            name: "Ada".into(),
            rating,
            comment: "good".into(),
        };

        gate.create_review(review(buyer, 4)).await.unwrap();
        assert_eq!(
            gate.create_review(review(buyer, 5)).await.unwrap_err(),
            ServiceError::ReviewAlreadyExists
        );

        let stored = stores.orders.get_order(order.id_typed()).await.unwrap().unwrap();
        assert!(stored.line(a).unwrap().is_reviewed);
        let product = stores.catalog.get_product(a).await.unwrap().unwrap();
        assert_eq!(product.num_reviews, 1);
        assert!((product.rating - 4.0).abs() < f64::EPSILON);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reviews_of_one_line_create_exactly_one() {
        let stores = Stores::in_memory();
        let a = add_product(&stores, 1000, 5).await;
        let buyer = UserId::new();
        fill_cart(&stores, buyer, &[(a, 1)]).await;
        let order = creator(&stores).create_order(buyer, contact()).await.unwrap();
        let lifecycle = OrderLifecycle::new(stores.orders.clone(), Arc::new(OrderEventBus::new()));
        lifecycle.transition(order.id_typed(), OrderStatus::Shipped).await.unwrap();
        lifecycle.transition(order.id_typed(), OrderStatus::Completed).await.unwrap();

        let gate = ReviewGate::new(&stores);
        let mut handles = Vec::new();
        for rating in 1..=5 {
            let gate = gate.clone();
            let input = NewReview {
                product_id: a,
                order_id: order.id_typed(),
                user_id: buyer,
                name: "Ada".into(),
                rating,
                comment: "same line".into(),
            };
            handles.push(tokio::spawn(async move { gate.create_review(input).await }));
        }

        let mut created = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => created += 1,
                Err(ServiceError::ReviewAlreadyExists) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(stores.reviews.reviews_for_product(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_flag_clear_keeps_the_review_and_allows_retry() {
        let orders = Arc::new(StuckFlags {
            inner: InMemoryOrderStore::new(),
            failing: AtomicBool::new(false),
        });
        let mut stores = Stores::in_memory();
        stores.orders = orders.clone();
        let a = add_product(&stores, 1000, 5).await;
        let buyer = UserId::new();
        let order = completed_order(&stores, buyer, a).await;
        let gate = ReviewGate::new(&stores);
        let review = gate.create_review(review_of(&order, a, 4)).await.unwrap();

        orders.failing.store(true, Ordering::SeqCst);
        let err = gate.delete_review(review.id_typed(), buyer).await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Unavailable(_))));

        assert!(stores.reviews.get_review(review.id_typed()).await.unwrap().is_some());
        let stored = stores.orders.get_order(order.id_typed()).await.unwrap().unwrap();
        assert!(stored.line(a).unwrap().is_reviewed);

        orders.failing.store(false, Ordering::SeqCst);
        gate.delete_review(review.id_typed(), buyer).await.unwrap();
        let stored = stores.orders.get_order(order.id_typed()).await.unwrap().unwrap();
        assert!(!stored.line(a).unwrap().is_reviewed);
        gate.create_review(review_of(&order, a, 2)).await.unwrap();
    }

    #[tokio::test]
    async fn failed_review_delete_restores_the_line_flag() {
        let (stores, reviews) = stores_with_scripted_reviews();
        let a = add_product(&stores, 1000, 5).await;
        let buyer = UserId::new();
        let order = completed_order(&stores, buyer, a).await;
        let gate = ReviewGate::new(&stores);
        let review = gate.create_review(review_of(&order, a, 4)).await.unwrap();

        reviews.failing_deletes.store(true, Ordering::SeqCst);
        assert!(gate.admin_delete_review(review.id_typed()).await.is_err());

        assert!(stores.reviews.get_review(review.id_typed()).await.unwrap().is_some());
        let stored = stores.orders.get_order(order.id_typed()).await.unwrap().unwrap();
        assert!(stored.line(a).unwrap().is_reviewed);
        assert_eq!(
            gate.create_review(review_of(&order, a, 5)).await.unwrap_err(),
            ServiceError::ReviewAlreadyExists
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reviews_of_one_product_leave_an_accurate_summary() {
        let (stores, reviews) = stores_with_scripted_reviews();
        let a = add_product(&stores, 1000, 5).await;
        let first = completed_order(&stores, UserId::new(), a).await;
        let second = completed_order(&stores, UserId::new(), a).await;
        let gate = ReviewGate::new(&stores);

        reviews.slow_refresh.store(true, Ordering::SeqCst);
        let handles = [(first, 5), (second, 1)].map(|(order, rating)| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.create_review(review_of(&order, a, rating)).await })
        });
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let stored = stores.reviews.reviews_for_product(a).await.unwrap();
        let product = stores.catalog.get_product(a).await.unwrap().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(product.num_reviews, 2);
        assert!((product.rating - 3.0).abs() < f64::EPSILON);
    }

    // ─────────────────────────────────────────────────────────────
    // Notifications
    // ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn receipts_follow_committed_transitions() {
        let stores = Stores::in_memory();
        let bus = Arc::new(OrderEventBus::new());
        let mailer = Arc::new(RecordingMailer::new());
        let pipeline = Arc::new(NotificationPipeline::new(mailer.clone(), "Orderkit"));
        let worker = NotificationWorker::spawn(&bus, pipeline);

        let a = add_product(&stores, 1000, 5).await;
        let user = UserId::new();
        fill_cart(&stores, user, &[(a, 1)]).await;
        let order = OrderCreator::new(&stores, bus.clone(), 8)
            .create_order(user, contact())
            .await
            .unwrap();

        let lifecycle = OrderLifecycle::new(stores.orders.clone(), bus.clone());
        lifecycle.transition(order.id_typed(), OrderStatus::Shipped).await.unwrap();
        // Rejected transitions send nothing.
        assert!(lifecycle.transition(order.id_typed(), OrderStatus::Pending).await.is_err());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while mailer.sent().len() < 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        worker.shutdown().await;

        let subjects: HashSet<_> = mailer.sent().into_iter().map(|m| m.subject).collect();
        assert_eq!(subjects.len(), 2);
        assert!(subjects.iter().any(|s| s.ends_with("is Pending")));
        assert!(subjects.iter().any(|s| s.ends_with("is Shipped")));
    }
}
