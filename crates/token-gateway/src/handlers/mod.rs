//! HTTP request handlers for the Token Gateway.

pub mod health;
pub mod metrics;
pub mod resource;

pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use resource::get_resource;
