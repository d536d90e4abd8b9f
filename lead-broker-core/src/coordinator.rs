use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::capability::{AuditRecorder, NotificationEvent, Notifier};
use crate::capacity::filter_by_capacity;
use crate::eligibility::order_candidates;
use crate::error::{CoreError, CoreResult};
use crate::model::{Assignment, AssignmentMethod, Lead, LeadStatus};
use crate::selector::select_next;
use crate::store::{AssignmentCreate, LeadStore};

/// Outcome of a distribution attempt. `Assigned` and `Unassigned` are
/// both successful pipeline runs from the caller's perspective; only
/// store/infrastructure failures are errors.
#[derive(Debug)]
pub enum DistributeOutcome {
    Assigned(Assignment),
    Unassigned,
}

/// Attempts to commit a single candidate. `Ok(None)` means the cursor
/// CAS lost the race and the caller should try the next candidate;
/// `Ok(Some(_))` is a terminal outcome (assigned, or resolved to an
/// existing/absent assignment); `Err` is an infrastructure failure.
#[allow(clippy::too_many_arguments)]
async fn attempt_assignment(
    store: &dyn LeadStore,
    notifier: &dyn Notifier,
    audit: &dyn AuditRecorder,
    lead: &Lead,
    agency_id: Uuid,
    method: AssignmentMethod,
    now: DateTime<Utc>,
    expected_last_assigned_agency_id: Option<Uuid>,
) -> CoreResult<Option<DistributeOutcome>> {
    let req = AssignmentCreate {
        lead_id: lead.id,
        agency_id,
        territory_key: lead.territory_key.clone(),
        method,
        expected_last_assigned_agency_id,
        assigned_at: now,
    };

    match store.create_assignment(req).await {
        Ok(assignment) => {
            audit
                .record(
                    "lead_assigned",
                    Some(lead.id),
                    json!({ "agency_id": agency_id, "method": format!("{:?}", method) }),
                )
                .await;
            notifier.enqueue(NotificationEvent { lead: lead.clone(), agency_id });
            Ok(Some(DistributeOutcome::Assigned(assignment)))
        }
        Err(CoreError::AssignmentConflict { lead_id }) => {
            audit.record("assignment_conflict", Some(lead_id), json!({})).await;
            if let Some(existing) = store.read_pending_assignment(lead.id).await? {
                Ok(Some(DistributeOutcome::Assigned(existing)))
            } else {
                Ok(Some(DistributeOutcome::Unassigned))
            }
        }
        Err(CoreError::CursorConflict { .. }) => Ok(None),
        Err(other) => Err(other),
    }
}

/// Runs C6 -> C7 -> C8 -> create-assignment for a single lead, retrying
/// the selector on cursor contention up to `retry_max` times before
/// falling through to the next candidate in the current ordering.
/// `CursorConflict` is an internal retry signal only; it never escapes
/// this function (§7: "recovered locally by re-selection", not
/// surfaced to the webhook/lifecycle boundary).
#[allow(clippy::too_many_arguments)]
pub async fn distribute(
    store: &dyn LeadStore,
    notifier: &dyn Notifier,
    audit: &dyn AuditRecorder,
    lead: &Lead,
    exclude: &HashSet<Uuid>,
    method: AssignmentMethod,
    now: DateTime<Utc>,
    retry_max: u32,
) -> CoreResult<DistributeOutcome> {
    let rows = store.read_eligible_agencies(&lead.territory_key).await?;
    let ordered = order_candidates(&rows, &lead.industry);

    if ordered.is_empty() {
        return unassign(store, audit, lead).await;
    }

    let candidates = filter_by_capacity(store, &rows, now).await?;
    let candidates: Vec<Uuid> = ordered.into_iter().filter(|id| candidates.contains(id)).collect();

    if candidates.is_empty() {
        return unassign(store, audit, lead).await;
    }

    for _ in 0..=retry_max {
        let cursor = store.read_sequence_cursor(&lead.territory_key).await?;
        let chosen = match select_next(&candidates, cursor.as_ref(), exclude) {
            Ok(agency_id) => agency_id,
            Err(CoreError::NoEligibleAfterExclusion) => {
                return unassign(store, audit, lead).await;
            }
            Err(other) => return Err(other),
        };

        let expected = cursor.as_ref().and_then(|c| c.last_assigned_agency_id);
        if let Some(outcome) = attempt_assignment(store, notifier, audit, lead, chosen, method, now, expected).await? {
            return Ok(outcome);
        }
        // Cursor CAS lost the race; loop and re-read the cursor for the next attempt.
    }

    // Retries exhausted: fall through to the next candidate in the
    // current ordering directly (§4.9.4), bypassing the cursor-based
    // selector so sustained contention on one candidate doesn't starve
    // the whole lead.
    let filtered: Vec<Uuid> = candidates.iter().copied().filter(|id| !exclude.contains(id)).collect();
    for agency_id in filtered {
        let cursor = store.read_sequence_cursor(&lead.territory_key).await?;
        let expected = cursor.and_then(|c| c.last_assigned_agency_id);
        if let Some(outcome) = attempt_assignment(store, notifier, audit, lead, agency_id, method, now, expected).await? {
            return Ok(outcome);
        }
    }

    // Every candidate lost the cursor race; treat this lead like no
    // agency was eligible rather than surfacing the internal conflict.
    unassign(store, audit, lead).await
}

async fn unassign(store: &dyn LeadStore, audit: &dyn AuditRecorder, lead: &Lead) -> CoreResult<DistributeOutcome> {
    store.update_lead_status(lead.id, LeadStatus::Unassigned, None).await?;
    audit.record("lead_unassigned", Some(lead.id), json!({})).await;
    Ok(DistributeOutcome::Unassigned)
}
