//! Order status state machine over the store.
//!
//! Transitions are serialized per order with a conditional update keyed on
//! the status the caller read. A caller that loses the race sees either
//! `InvalidStatusTransition` (the new status has no edge to the target) or
//! `TransitionConflict` (the edge still exists; re-reading and retrying is
//! meaningful).

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use orderkit_core::OrderId;
use orderkit_orders::{Order, OrderEvent, OrderStatus, StatusChanged};

use crate::error::ServiceError;
use crate::store::{CasOutcome, OrderStore};
use crate::{OrderEventBus, publish_order_event};

#[derive(Clone)]
pub struct OrderLifecycle {
    orders: Arc<dyn OrderStore>,
    bus: Arc<OrderEventBus>,
}

impl OrderLifecycle {
    pub fn new(orders: Arc<dyn OrderStore>, bus: Arc<OrderEventBus>) -> Self {
        Self { orders, bus }
    }

    /// Move `order_id` to `target`.
    ///
    /// Notification is published after the store write and never awaited.
    #[instrument(skip(self), err)]
    pub async fn transition(&self, order_id: OrderId, target: OrderStatus) -> Result<Order, ServiceError> {
        let current = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;

        let from = current.status();
        from.check_transition(target)?;

        let order = match self.orders.compare_and_set_status(order_id, from, target).await? {
            CasOutcome::Applied(order) => order,
            CasOutcome::Stale { actual } => {
                let actual_status = actual.status();
                return Err(if actual_status.can_transition_to(target) {
                    ServiceError::TransitionConflict {
                        expected: from,
                        actual: actual_status,
                    }
                } else {
                    ServiceError::InvalidStatusTransition {
                        from: actual_status,
                        to: target,
                    }
                });
            }
        };

        info!(order_id = %order_id, from = %from, to = %target, "order status changed");

        publish_order_event(
            &self.bus,
            &order,
            OrderEvent::StatusChanged(StatusChanged {
                order: order.clone(),
                from,
                occurred_at: Utc::now(),
            }),
        );

        Ok(order)
    }
}
