use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use common_http_errors::register_http_error_metrics;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Prometheus registry-backed counters for the gateway binary, in the
/// shape of the teacher's `integration-gateway::metrics::GatewayMetrics`:
/// webhook/assignment outcomes plus the shared `http_errors_total` counter.
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    webhook_total: IntCounterVec,
    rate_checks: IntCounterVec,
    assignment_total: IntCounterVec,
    cursor_cas_retries: IntCounterVec,
    batch_distribute_queue_depth: IntGauge,
    notification_total: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        register_http_error_metrics(&registry);

        let webhook_total = IntCounterVec::new(
            Opts::new("lead_webhook_total", "Inbound webhook requests by portal and outcome"),
            &["portal", "result"],
        )?;
        let rate_checks = IntCounterVec::new(
            Opts::new("gateway_rate_limit_checks_total", "Rate limiter decisions by identity and outcome"),
            &["identity", "allowed"],
        )?;
        let assignment_total = IntCounterVec::new(
            Opts::new("lead_assignment_total", "Distribution attempts by result"),
            &["result"],
        )?;
        let cursor_cas_retries = IntCounterVec::new(
            Opts::new("lead_cursor_cas_retries_total", "Sequence cursor compare-and-set retries by territory"),
            &["territory"],
        )?;
        let batch_distribute_queue_depth = IntGauge::with_opts(Opts::new(
            "lead_batch_distribute_queue_depth",
            "Undistributed leads observed on the last batch-distribute tick",
        ))?;
        let notification_total = IntCounterVec::new(
            Opts::new("lead_notification_total", "Notification sink enqueue attempts by outcome"),
            &["result"],
        )?;

        registry.register(Box::new(webhook_total.clone()))?;
        registry.register(Box::new(rate_checks.clone()))?;
        registry.register(Box::new(assignment_total.clone()))?;
        registry.register(Box::new(cursor_cas_retries.clone()))?;
        registry.register(Box::new(batch_distribute_queue_depth.clone()))?;
        registry.register(Box::new(notification_total.clone()))?;

        Ok(Self {
            registry,
            webhook_total,
            rate_checks,
            assignment_total,
            cursor_cas_retries,
            batch_distribute_queue_depth,
            notification_total,
        })
    }

    pub fn record_webhook(&self, portal: &str, result: &str) {
        self.webhook_total.with_label_values(&[portal, result]).inc();
    }

    pub fn record_rate_check(&self, identity: &str, allowed: bool) {
        self.rate_checks.with_label_values(&[identity, if allowed { "true" } else { "false" }]).inc();
    }

    pub fn record_assignment(&self, result: &str) {
        self.assignment_total.with_label_values(&[result]).inc();
    }

    pub fn record_cursor_cas_retry(&self, territory: &str) {
        self.cursor_cas_retries.with_label_values(&[territory]).inc();
    }

    pub fn set_batch_distribute_queue_depth(&self, depth: usize) {
        self.batch_distribute_queue_depth.set(depth as i64);
    }

    pub fn record_notification(&self, result: &str) {
        self.notification_total.with_label_values(&[result]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"))
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
