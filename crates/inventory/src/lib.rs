//! Inventory domain module.
//!
//! Pure stock logic (no IO, no async): the product snapshot the checkout reads,
//! the validation pass over a prospective order and the reservation ledger
//! used to compensate partially applied decrements.

pub mod product;
pub mod reservation;

pub use product::Product;
pub use reservation::{
    InsufficientStock, PlannedDecrement, ReservationError, ReservationLedger, ReservationPlan,
    StockRequest,
};
