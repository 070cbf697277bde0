//! Receipt notifications for committed order transitions.
//!
//! ```text
//! OrderCreator / OrderLifecycle → OrderEventBus → NotificationWorker → NotificationPipeline → Mailer
//! ```
//!
//! The worker runs on its own tokio task and holds no lock the order services
//! use. Every failure ends at the pipeline boundary as a log line; nothing
//! travels back to the transition that triggered it.

pub mod mailer;
pub mod receipt;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use orderkit_core::OrderId;
use orderkit_events::{Event, EventBus, EventEnvelope, Subscription};
use orderkit_orders::{Order, OrderEvent, OrderStatus};

pub use mailer::{LogMailer, Mailer, OutgoingMail, RecordingMailer, SmtpMailer};
pub use receipt::{Receipt, ReceiptLine, render_receipt};

use crate::OrderEventBus;

/// Why a receipt did not go out. Logged only.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("receipt rendering failed: {0}")]
    Render(String),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl From<askama::Error> for NotificationError {
    fn from(e: askama::Error) -> Self {
        NotificationError::Render(e.to_string())
    }
}

/// What happened to one `on_transition` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// This `(order, status)` pair was already delivered.
    Duplicate,
    Failed,
}

/// Renders and sends one receipt per `(order id, status)`.
pub struct NotificationPipeline {
    mailer: Arc<dyn Mailer>,
    store_name: String,
    delivered: Mutex<HashSet<(OrderId, OrderStatus)>>,
}

impl NotificationPipeline {
    pub fn new(mailer: Arc<dyn Mailer>, store_name: impl Into<String>) -> Self {
        Self {
            mailer,
            store_name: store_name.into(),
            delivered: Mutex::new(HashSet::new()),
        }
    }

    /// Send the receipt for `order` in its current status.
    ///
    /// Safe to call again for the same pair; only the first successful
    /// delivery sends mail. A failed attempt is not recorded, so a later
    /// replay may try again.
    pub async fn on_transition(&self, order: &Order) -> Delivery {
        let key = (order.id_typed(), order.status());
        if self.already_delivered(&key) {
            debug!(order_id = %key.0, status = %key.1, "receipt already delivered");
            return Delivery::Duplicate;
        }

        match self.deliver(order).await {
            Ok(()) => {
                if let Ok(mut delivered) = self.delivered.lock() {
                    delivered.insert(key);
                }
                info!(order_id = %key.0, status = %key.1, "receipt delivered");
                Delivery::Sent
            }
            Err(err) => {
                warn!(
                    order_id = %key.0,
                    status = %key.1,
                    error = %err,
                    "receipt notification failed"
                );
                Delivery::Failed
            }
        }
    }

    async fn deliver(&self, order: &Order) -> Result<(), NotificationError> {
        let receipt = render_receipt(&self.store_name, order)?;
        let contact = order.contact();
        let mail = OutgoingMail {
            to_name: contact.name.clone(),
            to_address: contact.email.clone(),
            subject: receipt.subject,
            text: receipt.text,
            html: receipt.html,
        };
        self.mailer.send(&mail).await
    }

    fn already_delivered(&self, key: &(OrderId, OrderStatus)) -> bool {
        self.delivered
            .lock()
            .map(|d| d.contains(key))
            .unwrap_or(false)
    }
}

/// Handle to stop a running notification worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Request shutdown and wait for the worker task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = self.join.await {
            warn!(error = %err, "notification worker ended abnormally");
        }
    }
}

/// Consumes order events and feeds them to the pipeline.
#[derive(Debug)]
pub struct NotificationWorker;

impl NotificationWorker {
    /// Subscribe to `bus` and start the worker task.
    ///
    /// The subscription exists before this returns, so nothing published
    /// afterwards is missed.
    pub fn spawn(bus: &OrderEventBus, pipeline: Arc<NotificationPipeline>) -> WorkerHandle {
        let subscription = bus.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let join = tokio::spawn(worker_loop(subscription, shutdown_rx, pipeline));

        WorkerHandle {
            shutdown: Some(shutdown_tx),
            join,
        }
    }
}

async fn worker_loop(
    mut subscription: Subscription<EventEnvelope<OrderEvent>>,
    mut shutdown: oneshot::Receiver<()>,
    pipeline: Arc<NotificationPipeline>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            message = subscription.recv() => match message {
                Some(envelope) => {
                    debug!(
                        event_type = envelope.event_type(),
                        sequence = envelope.sequence_number(),
                        occurred_at = %envelope.payload().occurred_at(),
                        "notification worker received event"
                    );
                    pipeline.on_transition(envelope.payload().order()).await;
                }
                None => break,
            },
        }
    }
    debug!("notification worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use orderkit_core::{AggregateRoot, Money, ProductId, UserId};
    use orderkit_orders::{Contact, OrderLine, OrderPlaced};

    fn order() -> Order {
        Order::place(
            OrderId::new(),
            UserId::new(),
            Contact {
                name: "Ada".into(),
                email: "ada@example.com".into(),
            },
            vec![OrderLine::new(ProductId::new(), "Lamp", 1, Money::from_cents(1000)).unwrap()],
            Utc::now(),
        )
        .unwrap()
    }

    /// Fails the first `failures` sends, then records.
    struct Flaky {
        failures: AtomicUsize,
        inner: RecordingMailer,
    }

    #[async_trait]
    impl Mailer for Flaky {
        async fn send(&self, mail: &OutgoingMail) -> Result<(), NotificationError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(NotificationError::Delivery("relay down".into()));
            }
            self.inner.send(mail).await
        }
    }

    #[tokio::test]
    async fn same_order_and_status_is_sent_once() {
        let mailer = Arc::new(RecordingMailer::new());
        let pipeline = NotificationPipeline::new(mailer.clone(), "Orderkit");
        let order = order();

        assert_eq!(pipeline.on_transition(&order).await, Delivery::Sent);
        assert_eq!(pipeline.on_transition(&order).await, Delivery::Duplicate);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_address, "ada@example.com");
        assert!(sent[0].text.contains("Total: 10.00"));
    }

    #[tokio::test]
    async fn failed_delivery_is_swallowed_and_can_be_retried() {
        let mailer = Arc::new(Flaky {
            failures: AtomicUsize::new(1),
            inner: RecordingMailer::new(),
        });
        let pipeline = NotificationPipeline::new(mailer.clone(), "Orderkit");
        let order = order();

        assert_eq!(pipeline.on_transition(&order).await, Delivery::Failed);
        assert_eq!(pipeline.on_transition(&order).await, Delivery::Sent);
        assert_eq!(mailer.inner.sent().len(), 1);
    }

    #[tokio::test]
    async fn worker_delivers_published_events_until_shutdown() {
        let bus = OrderEventBus::new();
        let mailer = Arc::new(RecordingMailer::new());
        let pipeline = Arc::new(NotificationPipeline::new(mailer.clone(), "Orderkit"));
        let handle = NotificationWorker::spawn(&bus, pipeline);

        let order = order();
        bus.publish(EventEnvelope::wrap(
            *order.id_typed().as_uuid(),
            "orders.order",
            order.version(),
            OrderEvent::OrderPlaced(OrderPlaced {
                order: order.clone(),
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while mailer.sent().is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(mailer.sent().len(), 1);

        handle.shutdown().await;
        assert_eq!(bus.subscriber_count(), 0);
    }
}
