//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic failures raised by the pure domain crates.
///
/// Store, transport and authorization failures are modelled by the layers
/// that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input rejected (quantity, rating, comment length, date range, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A money computation left the representable range.
    #[error("amount overflows: {0}")]
    Overflow(&'static str),

    #[error("invalid {kind}: {reason}")]
    InvalidId { kind: &'static str, reason: String },

    /// Something referenced inside an aggregate (e.g. a cart line) is absent.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Optimistic concurrency check failed.
    #[error("stale version: expected {expected}, found {actual}")]
    StaleVersion { expected: u64, actual: u64 },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound(what)
    }
}
