//! HTTP API: router, request context and error mapping over the order core.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
