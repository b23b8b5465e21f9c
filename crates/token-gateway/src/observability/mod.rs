//! Observability module for the Token Gateway.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
