use std::env;

use anyhow::{Context, Result};
use lead_broker_core::pipeline::PipelineConfig;

/// Runtime configuration for the gateway binary, assembled from the
/// environment the same way the teacher's `GatewayConfig::from_env` is:
/// required vars get `.context(...)`, optional ones fall back to a
/// documented default.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub rate_limit_rpm: u32,
    pub rate_limit_window_secs: u64,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub notification_topic: String,
    pub audit_topic: String,
    pub batch_distribute_interval_secs: u64,
    pub batch_distribute_limit: u32,
    pub pipeline: PipelineConfig,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8090);

        let rate_limit_rpm = env::var("GATEWAY_RATE_LIMIT_RPM")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(60);
        let rate_limit_window_secs = env::var("GATEWAY_RATE_LIMIT_WINDOW_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        let jwt_issuer = env::var("JWT_ISSUER").context("JWT_ISSUER must be set")?;
        let jwt_audience = env::var("JWT_AUDIENCE").context("JWT_AUDIENCE must be set")?;

        let notification_topic =
            env::var("NOTIFICATION_TOPIC").unwrap_or_else(|_| "lead.notifications.v1".to_string());
        let audit_topic = env::var("AUDIT_TOPIC").unwrap_or_else(|_| "audit.events.v1".to_string());

        let batch_distribute_interval_secs = env::var("BATCH_DISTRIBUTE_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);
        let batch_distribute_limit = env::var("BATCH_DISTRIBUTE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(100);

        let dedup_window_seconds = env::var("DEDUP_WINDOW_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(86_400);
        let distribution_retry_max = env::var("DISTRIBUTION_RETRY_MAX")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);
        let pipeline_deadline_ms = env::var("PIPELINE_DEADLINE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10_000);

        Ok(Self {
            database_url,
            host,
            port,
            rate_limit_rpm,
            rate_limit_window_secs: rate_limit_window_secs.max(1),
            jwt_issuer,
            jwt_audience,
            notification_topic,
            audit_topic,
            batch_distribute_interval_secs: batch_distribute_interval_secs.max(5),
            batch_distribute_limit,
            pipeline: PipelineConfig {
                dedup_window: chrono::Duration::seconds(dedup_window_seconds),
                distribution_retry_max,
                pipeline_deadline_ms,
            },
        })
    }
}
