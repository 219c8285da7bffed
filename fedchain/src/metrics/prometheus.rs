//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed coordinator metrics, and an
//! async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, warn};

use prometheus::{
    self, Counter, Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::types::TokenAmount;

/// Coordinator-related Prometheus metrics.
///
/// Registered into a [`Registry`] and updated by the coordination engine
/// after every submission.
#[derive(Clone)]
pub struct CoordinatorMetrics {
    /// Submissions by outcome (`accepted` or a rejection code).
    pub submissions_total: IntCounterVec,
    /// Reward tokens minted, in base units.
    ///
    /// Stored as a float counter: base-unit amounts exceed `u64`.
    pub rewards_minted_base_units: Counter,
    /// End-to-end latency of `submit`, in seconds.
    pub submission_seconds: Histogram,
    /// Version of the current canonical model.
    pub model_version: IntGauge,
}

impl CoordinatorMetrics {
    /// Registers coordinator metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let submissions_total = IntCounterVec::new(
            Opts::new(
                "submissions_total",
                "Total number of contribution submissions by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(submissions_total.clone()))?;

        let rewards_minted_base_units = Counter::with_opts(Opts::new(
            "rewards_minted_base_units",
            "Reward tokens minted for accepted contributions, in base units",
        ))?;
        registry.register(Box::new(rewards_minted_base_units.clone()))?;

        // Proof verification dominates; remote verifiers push the tail out.
        let submission_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "submission_seconds",
                "Time to judge and commit one submission in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )?;
        registry.register(Box::new(submission_seconds.clone()))?;

        let model_version = IntGauge::with_opts(Opts::new(
            "model_version",
            "Version of the current canonical model",
        ))?;
        registry.register(Box::new(model_version.clone()))?;

        Ok(Self {
            submissions_total,
            rewards_minted_base_units,
            submission_seconds,
            model_version,
        })
    }

    /// Records one judged submission.
    pub fn observe_submission(&self, outcome: &str, seconds: f64) {
        self.submissions_total.with_label_values(&[outcome]).inc();
        self.submission_seconds.observe(seconds);
    }

    pub fn observe_reward(&self, amount: TokenAmount) {
        self.rewards_minted_base_units.inc_by(amount as f64);
    }

    pub fn set_model_version(&self, version: u64) {
        self.model_version
            .set(i64::try_from(version).unwrap_or(i64::MAX));
    }
}

/// Wrapper around a Prometheus registry and the coordinator metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub coordinator: CoordinatorMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// (namespace `fedchain`) and registers the coordinator metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("fedchain".to_string()), None)?;
        let coordinator = CoordinatorMetrics::register(&registry)?;
        Ok(Self {
            registry,
            coordinator,
        })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                warn!(error = %err, "prometheus HTTP connection failed");
            }
        });
    }
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body)));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    resp
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => Ok(text_response(
            StatusCode::OK,
            "text/plain; version=0.0.4",
            metrics.gather_text(),
        )),
        _ => Ok(text_response(
            StatusCode::NOT_FOUND,
            "text/plain",
            "not found".to_string(),
        )),
    }
}
