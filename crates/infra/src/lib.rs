//! Infrastructure layer: store adapters, order services, notifications and
//! configuration.
//!
//! The domain crates stay pure; everything that touches a store, the clock,
//! the event bus or the network lives here.

pub mod cart_service;
pub mod catalog_service;
pub mod config;
pub mod error;
pub mod inventory_guard;
pub mod notifications;
pub mod order_creator;
pub mod order_lifecycle;
pub mod order_queries;
pub mod review_gate;
pub mod store;

mod integration_tests;

use tracing::warn;

use orderkit_core::AggregateRoot;
use orderkit_events::{EventBus, EventEnvelope, InMemoryEventBus};
use orderkit_orders::{Order, OrderEvent};

pub use error::ServiceError;

/// Aggregate type tag on order event envelopes.
pub const ORDER_AGGREGATE_TYPE: &str = "orders.order";

/// In-process bus carrying committed order events.
pub type OrderEventBus = InMemoryEventBus<EventEnvelope<OrderEvent>>;

/// Publish an order event after its state change has committed.
///
/// A publish failure is logged; the change itself stands.
pub(crate) fn publish_order_event(bus: &OrderEventBus, order: &Order, event: OrderEvent) {
    let envelope = EventEnvelope::wrap(
        *order.id_typed().as_uuid(),
        ORDER_AGGREGATE_TYPE,
        order.version(),
        event,
    );
    let event_type = envelope.event_type();

    if let Err(err) = bus.publish(envelope) {
        warn!(
            order_id = %order.id_typed(),
            event_type,
            error = ?err,
            "order event not published"
        );
    }
}
