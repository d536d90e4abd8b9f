use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::capability::{AuditRecorder, Notifier};
use crate::coordinator::{distribute, DistributeOutcome};
use crate::error::{CoreError, CoreResult};
use crate::model::{Assignment, AssignmentMethod, AssignmentStatus, Lead, LeadStatus};
use crate::store::{AssignmentCreate, LeadStore};

/// `Accept`: the caller's agency id must match the pending assignment's
/// agency id. Marks the assignment accepted, the lead accepted, and
/// stamps `accepted_at`.
pub async fn accept(
    store: &dyn LeadStore,
    audit: &dyn AuditRecorder,
    lead_id: Uuid,
    acting_agency_id: Uuid,
    now: DateTime<Utc>,
) -> CoreResult<Assignment> {
    let pending = pending_assignment_for(store, lead_id, acting_agency_id).await?;

    store
        .update_assignment_status(pending.id, AssignmentStatus::Accepted, None, now)
        .await?;
    store.update_lead_status(lead_id, LeadStatus::Accepted, Some(acting_agency_id)).await?;
    audit
        .record("lead_accepted", Some(lead_id), json!({ "agency_id": acting_agency_id }))
        .await;

    Ok(Assignment { status: AssignmentStatus::Accepted, accepted_at: Some(now), ..pending })
}

/// `Reject`: same authorization as accept. Marks the assignment
/// rejected with a reason, the lead `pending_reassignment`, then
/// synchronously re-routes excluding the rejecting agency. The original
/// lead record is never mutated except for its status/assignment
/// pointer.
#[allow(clippy::too_many_arguments)]
pub async fn reject(
    store: &dyn LeadStore,
    notifier: &dyn Notifier,
    audit: &dyn AuditRecorder,
    lead_id: Uuid,
    acting_agency_id: Uuid,
    reason: String,
    retry_max: u32,
    now: DateTime<Utc>,
) -> CoreResult<DistributeOutcome> {
    let pending = pending_assignment_for(store, lead_id, acting_agency_id).await?;

    store
        .update_assignment_status(pending.id, AssignmentStatus::Rejected, Some(reason.clone()), now)
        .await?;
    store.update_lead_status(lead_id, LeadStatus::PendingReassignment, None).await?;
    audit
        .record("lead_rejected", Some(lead_id), json!({ "agency_id": acting_agency_id, "reason": reason }))
        .await;

    let lead = store.read_lead(lead_id).await?;
    let mut exclude = HashSet::new();
    exclude.insert(acting_agency_id);

    distribute(store, notifier, audit, &lead, &exclude, AssignmentMethod::Reassignment, now, retry_max).await
}

/// Admin-initiated: marks the current assignment `reassigned`, then
/// creates a fresh one to `target_agency_id`, skipping C6-C8 entirely.
pub async fn manual_reassign(
    store: &dyn LeadStore,
    audit: &dyn AuditRecorder,
    lead_id: Uuid,
    target_agency_id: Uuid,
    now: DateTime<Utc>,
) -> CoreResult<Assignment> {
    let lead = store.read_lead(lead_id).await?;

    if let Some(current) = store.read_pending_assignment(lead_id).await? {
        store
            .update_assignment_status(current.id, AssignmentStatus::Reassigned, None, now)
            .await?;
    }

    let cursor = store.read_sequence_cursor(&lead.territory_key).await?;
    let req = AssignmentCreate {
        lead_id,
        agency_id: target_agency_id,
        territory_key: lead.territory_key.clone(),
        method: AssignmentMethod::Manual,
        expected_last_assigned_agency_id: cursor.and_then(|c| c.last_assigned_agency_id),
        assigned_at: now,
    };
    let assignment = store.create_assignment(req).await?;
    audit
        .record("lead_manually_reassigned", Some(lead_id), json!({ "agency_id": target_agency_id }))
        .await;

    Ok(assignment)
}

async fn pending_assignment_for(store: &dyn LeadStore, lead_id: Uuid, agency_id: Uuid) -> CoreResult<Assignment> {
    let lead = store.read_lead(lead_id).await?;
    let _ = lead; // confirms the lead exists; LeadNotFound surfaces from read_lead otherwise

    let pending = store
        .read_pending_assignment(lead_id)
        .await?
        .ok_or(CoreError::AssignmentNotPending)?;

    if pending.status != AssignmentStatus::Pending {
        return Err(CoreError::AssignmentNotPending);
    }
    if pending.agency_id != agency_id {
        return Err(CoreError::AgencyMismatch);
    }

    Ok(pending)
}
