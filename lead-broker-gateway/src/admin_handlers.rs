use axum::extract::{Path, Query, State};
use axum::Json;
use common_http_errors::{ApiError, ApiResult};
use common_security::policy::{ensure_capability, Capability};
use common_security::SecurityCtxExtractor;
use lead_broker_core::lifecycle::manual_reassign;
use lead_broker_core::model::Assignment;
use lead_broker_core::pipeline::{batch_distribute, distribute_single, IngestOutcome};
use lead_broker_store::read_audit_log_for_entity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error_map::to_api_error;

fn require_forbidden(sec: &common_security::SecurityContext, cap: Capability) -> ApiResult<()> {
    ensure_capability(sec, cap).map_err(|_| ApiError::Forbidden { code: "missing_role", trace_id: sec.trace_id })
}

#[derive(Serialize)]
pub struct DistributeResponse {
    pub lead_id: Uuid,
    pub assigned: bool,
}

/// `POST /admin/leads/{id}/distribute` (spec §4.11, supplemented admin
/// trigger for C9 on a single lead that never got picked up).
pub async fn distribute_one(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Path(lead_id): Path<Uuid>,
) -> ApiResult<Json<DistributeResponse>> {
    require_forbidden(&sec, Capability::Distribute)?;

    let outcome = state
        .with_pipeline_deadline(distribute_single(
            state.store.as_ref(),
            state.clock.as_ref(),
            state.notifier.as_ref(),
            state.audit.as_ref(),
            state.pipeline_config(),
            lead_id,
        ))
        .await?
        .map_err(|err| to_api_error(err, sec.trace_id))?;

    let assigned = matches!(outcome, IngestOutcome::Created { .. });
    state.metrics.record_assignment(if assigned { "assigned" } else { "unassigned" });
    Ok(Json(DistributeResponse { lead_id, assigned }))
}

#[derive(Deserialize)]
pub struct BatchDistributeRequest {
    #[serde(default = "default_batch_limit")]
    pub limit: u32,
}

fn default_batch_limit() -> u32 {
    100
}

#[derive(Serialize)]
pub struct BatchDistributeResponse {
    pub attempted: usize,
    pub assigned: usize,
    pub unassigned: usize,
}

/// `POST /admin/leads/batch-distribute` (spec §6 supplement): the same
/// loop the background batch-distribute task runs, exposed so an
/// operator can drain the undistributed queue on demand.
pub async fn batch_distribute_now(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Json(body): Json<BatchDistributeRequest>,
) -> ApiResult<Json<BatchDistributeResponse>> {
    require_forbidden(&sec, Capability::BatchDistribute)?;

    let outcomes = state
        .with_pipeline_deadline(batch_distribute(
            state.store.as_ref(),
            state.clock.as_ref(),
            state.notifier.as_ref(),
            state.audit.as_ref(),
            state.pipeline_config(),
            body.limit,
        ))
        .await?
        .map_err(|err| to_api_error(err, sec.trace_id))?;

    let attempted = outcomes.len();
    let assigned = outcomes.iter().filter(|o| matches!(o, IngestOutcome::Created { .. })).count();
    let unassigned = attempted - assigned;
    state.metrics.record_assignment("batch_assigned");
    Ok(Json(BatchDistributeResponse { attempted, assigned, unassigned }))
}

#[derive(Deserialize)]
pub struct ReassignRequest {
    pub agency_id: Uuid,
}

/// `PUT /admin/leads/{id}/reassign` (spec §4.10, admin-initiated
/// override; skips C6-C8 entirely per `manual_reassign`).
pub async fn reassign(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Path(lead_id): Path<Uuid>,
    Json(body): Json<ReassignRequest>,
) -> ApiResult<Json<Assignment>> {
    require_forbidden(&sec, Capability::Reassign)?;

    let assignment = state
        .with_pipeline_deadline(manual_reassign(
            state.store.as_ref(),
            state.audit.as_ref(),
            lead_id,
            body.agency_id,
            state.clock.now(),
        ))
        .await?
        .map_err(|err| to_api_error(err, sec.trace_id))?;

    state.metrics.record_assignment("manual_reassigned");
    Ok(Json(assignment))
}

#[derive(Deserialize)]
pub struct AuditLogQuery {
    #[serde(default = "default_audit_limit")]
    pub limit: u32,
}

fn default_audit_limit() -> u32 {
    50
}

/// `GET /admin/leads/{id}/audit-log` (spec §3's append-only audit
/// trail, surfaced read-only for operators).
pub async fn audit_log_for_lead(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Path(lead_id): Path<Uuid>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<Vec<common_audit::AuditEvent>>> {
    require_forbidden(&sec, Capability::ViewAuditLog)?;

    let events = read_audit_log_for_entity(&state.pg_pool, lead_id, query.limit)
        .await
        .map_err(|err| to_api_error(err, sec.trace_id))?;
    Ok(Json(events))
}
