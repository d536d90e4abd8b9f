use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use common_http_errors::{ApiError, ApiResult};
use lead_broker_core::error::CoreError;
use lead_broker_core::pipeline::{ingest_webhook, IngestOutcome};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error_map::to_api_error;

#[derive(Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub lead_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
}

/// `POST /api/webhooks/{portal_code}` (spec §6). Auth header is
/// `x-api-key`; the portal code comes off the URL, never the body, so a
/// leaked payload can't be replayed against a different portal's mapping.
pub async fn ingest(
    State(state): State<AppState>,
    Path(portal_code): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ApiResult<Json<WebhookResponse>> {
    let presented_secret = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let rate_decision = state
        .rate_limiter
        .check(&format!("portal:{portal_code}"), state.config.rate_limit_rpm)
        .await;
    state.metrics.record_rate_check(&portal_code, rate_decision.allowed);
    if !rate_decision.allowed {
        state.metrics.record_webhook(&portal_code, "rate_limited");
        return Err(ApiError::Forbidden { code: "rate_limited", trace_id: None });
    }

    let outcome = state
        .with_pipeline_deadline(ingest_webhook(
            state.store.as_ref(),
            state.clock.as_ref(),
            state.notifier.as_ref(),
            state.audit.as_ref(),
            state.pipeline_config(),
            &portal_code,
            presented_secret,
            &payload,
        ))
        .await?;

    match outcome {
        Ok(IngestOutcome::Created { lead_id }) => {
            state.metrics.record_webhook(&portal_code, "created");
            state.metrics.record_assignment("assigned");
            Ok(Json(WebhookResponse { success: true, lead_id, duplicate: None }))
        }
        Ok(IngestOutcome::Unassigned { lead_id }) => {
            state.metrics.record_webhook(&portal_code, "unassigned");
            state.metrics.record_assignment("unassigned");
            Ok(Json(WebhookResponse { success: true, lead_id, duplicate: None }))
        }
        Err(CoreError::DuplicateSuppressed { existing_id }) => {
            state.metrics.record_webhook(&portal_code, "duplicate");
            Ok(Json(WebhookResponse { success: true, lead_id: existing_id, duplicate: Some(true) }))
        }
        Err(err) => {
            let result = match &err {
                CoreError::PortalUnknown | CoreError::PortalInactive | CoreError::PortalAuthFailed => "auth_rejected",
                CoreError::ValidationFailed(_) => "validation_failed",
                _ => "error",
            };
            state.metrics.record_webhook(&portal_code, result);
            Err(to_api_error(err, None))
        }
    }
}
