//! Observability for the Research Analyst service.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
