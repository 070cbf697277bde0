//! Orders domain module.
//!
//! Carts, the order aggregate with its status state machine, the committed
//! order events and daily sales aggregation. Deterministic domain logic only
//! (no IO, no HTTP, no storage).

pub mod cart;
pub mod events;
pub mod order;
pub mod sales;
pub mod status;

pub use cart::{Cart, CartLine};
pub use events::{OrderEvent, OrderPlaced, StatusChanged};
pub use order::{Contact, Order, OrderError, OrderLine};
pub use sales::{DailySales, DateRange, daily_sales};
pub use status::{InvalidStatusTransition, OrderStatus};
