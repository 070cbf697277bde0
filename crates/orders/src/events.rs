use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderkit_events::Event;

use crate::order::Order;
use crate::status::OrderStatus;

/// Event: a new order was persisted in `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order: Order,
    pub occurred_at: DateTime<Utc>,
}

/// Event: an order's status changed. `order` is the committed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub order: Order,
    pub from: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Committed order facts, published after the store write succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    StatusChanged(StatusChanged),
}

impl OrderEvent {
    /// The order as it stood right after the event.
    pub fn order(&self) -> &Order {
        match self {
            OrderEvent::OrderPlaced(e) => &e.order,
            OrderEvent::StatusChanged(e) => &e.order,
        }
    }
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::StatusChanged(_) => "orders.order.status_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::StatusChanged(e) => e.occurred_at,
        }
    }
}
