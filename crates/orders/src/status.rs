//! Order status state machine.
//!
//! ```text
//! Pending ──► Shipped ──► Completed
//!    │           │
//!    └───────────┴──────► Cancelled
//! ```
//!
//! `Completed` and `Cancelled` are terminal. Self-transitions are not edges.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use orderkit_core::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Shipped,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Shipped) | (Pending, Cancelled) | (Shipped, Completed) | (Shipped, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Check the edge `self -> to`.
    pub fn check_transition(self, to: OrderStatus) -> Result<(), InvalidStatusTransition> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(InvalidStatusTransition { from: self, to })
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown order status: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid status transition from {from} to {to}")]
pub struct InvalidStatusTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EDGES: [(OrderStatus, OrderStatus); 4] = [
        (OrderStatus::Pending, OrderStatus::Shipped),
        (OrderStatus::Pending, OrderStatus::Cancelled),
        (OrderStatus::Shipped, OrderStatus::Completed),
        (OrderStatus::Shipped, OrderStatus::Cancelled),
    ];

    fn status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::ALL.to_vec())
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in [OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(from.is_terminal());
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn pending_cannot_skip_to_completed() {
        let err = OrderStatus::Pending
            .check_transition(OrderStatus::Completed)
            .unwrap_err();
        assert_eq!(err.from, OrderStatus::Pending);
        assert_eq!(err.to, OrderStatus::Completed);
        assert_eq!(
            err.to_string(),
            "invalid status transition from Pending to Completed"
        );
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!(" Completed ".parse::<OrderStatus>().unwrap(), OrderStatus::Completed);
        assert!("delivered".parse::<OrderStatus>().is_err());
    }

    proptest! {
        #[test]
        fn only_listed_edges_are_accepted(from in status(), to in status()) {
            let listed = EDGES.contains(&(from, to));
            prop_assert_eq!(from.check_transition(to).is_ok(), listed);
        }
    }
}
