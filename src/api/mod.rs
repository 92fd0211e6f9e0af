//! HTTP surface: routing, extractors, handlers and the middleware stack.

pub mod client;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod openapi;
pub mod rate_limiter;
pub mod routes;
pub mod usage;

pub use routes::{create_router, AppState};
