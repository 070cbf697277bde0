//! Process-wide tracing setup shared by the binaries and black-box tests.

/// Subscriber installation (filters, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, init, init_with};
