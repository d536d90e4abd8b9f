use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common_auth::JwtVerifier;
use common_http_errors::ApiError;
use lead_broker_core::capability::{AuditRecorder, Notifier, SystemClock};
use lead_broker_core::pipeline::PipelineConfig;
use lead_broker_core::store::LeadStore;

use crate::config::GatewayConfig;
use crate::metrics::GatewayMetrics;
use crate::rate_limiter::InMemoryRateLimiter;

/// Everything a handler needs, threaded through `axum::extract::State`. Shape
/// mirrors the teacher's `integration-gateway::AppState`: one `Arc`-wrapped
/// value cloned per request, holding the store handle, the injected
/// capabilities, and the ambient observability stack.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LeadStore>,
    pub notifier: Arc<dyn Notifier>,
    pub audit: Arc<dyn AuditRecorder>,
    pub clock: Arc<SystemClock>,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub metrics: Arc<GatewayMetrics>,
    pub rate_limiter: Arc<InMemoryRateLimiter>,
    pub config: Arc<GatewayConfig>,
    /// Direct pool handle backing the admin audit-log read. Kept
    /// alongside `store` rather than behind the `LeadStore` trait since
    /// reading the append-only log is a Postgres-specific admin surface,
    /// not a routing invariant every store implementation must support.
    pub pg_pool: sqlx::PgPool,
}

impl AppState {
    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.config.pipeline
    }

    /// Enforces §5's pipeline deadline around a single core invocation,
    /// the `tokio::time::timeout` wrapper `PipelineConfig::pipeline_deadline_ms`
    /// promises. Surfaces an elapsed deadline as a 500 rather than letting
    /// the request hang past the configured bound.
    pub async fn with_pipeline_deadline<F, T>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = T>,
    {
        let deadline = Duration::from_millis(self.pipeline_config().pipeline_deadline_ms);
        tokio::time::timeout(deadline, fut).await.map_err(|_| ApiError::Internal {
            trace_id: None,
            message: Some("pipeline deadline exceeded".to_string()),
        })
    }
}

/// Lets `common_auth::AuthContext` pull its dependency straight out of
/// `AppState` via `FromRef`, the same wiring the teacher uses for
/// `Arc<JwtVerifier>` in `integration-gateway`.
impl axum::extract::FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}
