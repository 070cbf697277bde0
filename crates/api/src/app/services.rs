use std::sync::Arc;

use orderkit_infra::{
    OrderEventBus,
    cart_service::CartService,
    catalog_service::CatalogService,
    config::AppConfig,
    notifications::{LogMailer, Mailer, NotificationPipeline, NotificationWorker, SmtpMailer, WorkerHandle},
    order_creator::OrderCreator,
    order_lifecycle::OrderLifecycle,
    order_queries::OrderQueries,
    review_gate::ReviewGate,
    store::Stores,
};

#[cfg(feature = "postgres")]
use orderkit_infra::store::PostgresStore;
#[cfg(feature = "postgres")]
use secrecy::ExposeSecret;
#[cfg(feature = "postgres")]
use sqlx::PgPool;

/// Everything the handlers need, shared behind one `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub creator: OrderCreator,
    pub lifecycle: OrderLifecycle,
    pub queries: OrderQueries,
    pub carts: CartService,
    pub catalog: CatalogService,
    pub reviews: ReviewGate,
    pub bus: Arc<OrderEventBus>,
}

impl AppServices {
    /// Wire the order services over `stores` and start the notification
    /// worker. The returned handle stops the worker.
    pub fn new(
        stores: Stores,
        mailer: Arc<dyn Mailer>,
        store_name: &str,
        cas_max_attempts: u32,
    ) -> (Self, WorkerHandle) {
        let bus = Arc::new(OrderEventBus::new());
        let pipeline = Arc::new(NotificationPipeline::new(mailer, store_name));
        let worker = NotificationWorker::spawn(&bus, pipeline);

        let services = Self {
            creator: OrderCreator::new(&stores, bus.clone(), cas_max_attempts),
            lifecycle: OrderLifecycle::new(stores.orders.clone(), bus.clone()),
            queries: OrderQueries::new(stores.orders.clone()),
            carts: CartService::new(stores.catalog.clone(), stores.carts.clone()),
            catalog: CatalogService::new(&stores, cas_max_attempts),
            reviews: ReviewGate::new(&stores),
            bus,
        };
        (services, worker)
    }
}

/// Build services from process configuration.
///
/// Postgres is used when `DATABASE_URL` is set and the `postgres` feature is
/// compiled in; otherwise stores live in memory. Receipts go over SMTP when a
/// relay is configured and to the log otherwise.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<(Arc<AppServices>, WorkerHandle)> {
    let stores = build_stores(config).await?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "receipts delivered over SMTP");
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            tracing::info!("SMTP_HOST not set; receipts are logged, not sent");
            Arc::new(LogMailer)
        }
    };

    let (services, worker) = AppServices::new(
        stores,
        mailer,
        &config.store_name,
        config.cas_max_attempts,
    );
    Ok((Arc::new(services), worker))
}

async fn build_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match &config.database_url {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let pool = PgPool::connect(url.expose_secret()).await?;
            PostgresStore::new(pool.clone()).migrate().await?;
            tracing::info!("using postgres stores");
            Ok(Stores::postgres(pool))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            tracing::warn!("DATABASE_URL set but postgres feature not enabled, falling back to in-memory");
            Ok(Stores::in_memory())
        }
        None => Ok(Stores::in_memory()),
    }
}
