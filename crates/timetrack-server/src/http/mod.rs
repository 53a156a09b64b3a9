//! HTTP surface of the tracker.

pub mod error;
pub mod handlers;
pub mod health;
mod middleware;

pub(crate) use middleware::{cors_middleware, request_tracing_middleware};
