//! Reviews domain module.
//!
//! A review is its own aggregate referencing the order, product and author by
//! id. Eligibility (order completed, line not yet reviewed) is owned by the
//! order aggregate and enforced by the service layer.

pub mod rating;
pub mod review;

pub use rating::{Rating, ReviewSummary};
pub use review::Review;
