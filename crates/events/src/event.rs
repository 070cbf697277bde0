use chrono::{DateTime, Utc};

/// A fact about a committed state change, fit for fan-out on a bus.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, `<context>.<aggregate>.<what happened>`.
    fn event_type(&self) -> &'static str;

    /// When the change committed.
    fn occurred_at(&self) -> DateTime<Utc>;
}
