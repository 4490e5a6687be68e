//! # Middleware Stack
//!
//! - [`metrics`]: Prometheus request metrics and admission counters.

pub mod metrics;
