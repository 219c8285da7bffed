//! Metrics and instrumentation for the coordinator.
//!
//! This module defines Prometheus-compatible metrics for the coordination
//! engine and exposes a small HTTP exporter that serves `/metrics` in
//! Prometheus text format.
//!
//! Typical usage in a node:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use fedchain::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9898".parse()?;
//!
//! // Spawn the HTTP exporter in the background:
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! // Hand the coordinator metrics to the engine:
//! let builder = builder.metrics(registry.coordinator.clone());
//! ```

pub mod prometheus;

pub use prometheus::{CoordinatorMetrics, MetricsRegistry, run_prometheus_http_server};
