use axum::extract::{Path, State};
use axum::Json;
use common_http_errors::{ApiError, ApiResult};
use common_security::policy::{ensure_capability, Capability};
use common_security::SecurityCtxExtractor;
use lead_broker_core::lifecycle::{accept, reject};
use lead_broker_core::model::{Assignment, Lead};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error_map::to_api_error;

#[derive(Serialize)]
pub struct AssignedLead {
    pub assignment: Assignment,
    pub lead: Lead,
}

fn require_agency(sec: &common_security::SecurityContext, trace_id: Option<Uuid>) -> ApiResult<Uuid> {
    sec.agency_id.ok_or(ApiError::Forbidden { code: "missing_agency_context", trace_id })
}

/// `GET /leads` (spec §6, supplemented): the caller's own assignments
/// with their nested lead payloads, most recent first. Not part of the
/// invariant set — a thin read projection for the mobile client.
pub async fn list_assigned(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
) -> ApiResult<Json<Vec<AssignedLead>>> {
    ensure_capability(&sec, Capability::ViewLeads).map_err(|_| ApiError::Forbidden {
        code: "missing_role",
        trace_id: sec.trace_id,
    })?;
    let agency_id = require_agency(&sec, sec.trace_id)?;

    let rows = state
        .store
        .read_assignments_for_agency(agency_id)
        .await
        .map_err(|err| to_api_error(err, sec.trace_id))?;

    Ok(Json(rows.into_iter().map(|(assignment, lead)| AssignedLead { assignment, lead }).collect()))
}

/// `PUT /leads/{id}/accept` (spec §4.10/C10).
pub async fn accept_lead(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Path(lead_id): Path<Uuid>,
) -> ApiResult<Json<Assignment>> {
    ensure_capability(&sec, Capability::AcceptLead).map_err(|_| ApiError::Forbidden {
        code: "missing_role",
        trace_id: sec.trace_id,
    })?;
    let agency_id = require_agency(&sec, sec.trace_id)?;

    let assignment = state
        .with_pipeline_deadline(accept(state.store.as_ref(), state.audit.as_ref(), lead_id, agency_id, state.clock.now()))
        .await?
        .map_err(|err| to_api_error(err, sec.trace_id))?;

    state.metrics.record_assignment("accepted");
    Ok(Json(assignment))
}

#[derive(Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Serialize)]
pub struct RejectResponse {
    pub reassigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_agency_id: Option<Uuid>,
}

/// `PUT /leads/{id}/reject` (spec §4.10/C10): rejects, then the core
/// synchronously re-routes (C6-C9) excluding the rejecting agency.
pub async fn reject_lead(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Path(lead_id): Path<Uuid>,
    Json(body): Json<RejectRequest>,
) -> ApiResult<Json<RejectResponse>> {
    ensure_capability(&sec, Capability::RejectLead).map_err(|_| ApiError::Forbidden {
        code: "missing_role",
        trace_id: sec.trace_id,
    })?;
    let agency_id = require_agency(&sec, sec.trace_id)?;

    let outcome = state
        .with_pipeline_deadline(reject(
            state.store.as_ref(),
            state.notifier.as_ref(),
            state.audit.as_ref(),
            lead_id,
            agency_id,
            body.reason,
            state.pipeline_config().distribution_retry_max,
            state.clock.now(),
        ))
        .await?
        .map_err(|err| to_api_error(err, sec.trace_id))?;

    use lead_broker_core::coordinator::DistributeOutcome;
    let response = match outcome {
        DistributeOutcome::Assigned(assignment) => {
            state.metrics.record_assignment("reassigned");
            RejectResponse { reassigned: true, new_agency_id: Some(assignment.agency_id) }
        }
        DistributeOutcome::Unassigned => {
            state.metrics.record_assignment("unassigned");
            RejectResponse { reassigned: false, new_agency_id: None }
        }
    };
    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct DetailStatusRequest {
    pub status: String,
}

/// `PUT /leads/{id}/status` (supplemented, not part of the invariant
/// set): a free-form device-reported status ping, recorded to the
/// audit trail rather than mutating the canonical lifecycle state.
pub async fn set_detail_status(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Path(lead_id): Path<Uuid>,
    Json(body): Json<DetailStatusRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    ensure_capability(&sec, Capability::AcceptLead).map_err(|_| ApiError::Forbidden {
        code: "missing_role",
        trace_id: sec.trace_id,
    })?;
    let agency_id = require_agency(&sec, sec.trace_id)?;

    let lead = state.store.read_lead(lead_id).await.map_err(|err| to_api_error(err, sec.trace_id))?;
    if lead.assigned_agency_id != Some(agency_id) {
        return Err(ApiError::Forbidden { code: "agency_mismatch", trace_id: sec.trace_id });
    }

    state
        .audit
        .record(
            "lead_detail_status_reported",
            Some(lead_id),
            serde_json::json!({ "agency_id": agency_id, "status": body.status }),
        )
        .await;

    Ok(Json(serde_json::json!({ "accepted": true })))
}
