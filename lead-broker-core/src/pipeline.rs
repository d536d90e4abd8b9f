use std::collections::HashSet;

use chrono::Duration;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::capability::{AuditRecorder, Clock, Notifier};
use crate::coordinator::{distribute, DistributeOutcome};
use crate::dedup::{find_duplicate, suppress_as_duplicate};
use crate::error::{CoreError, CoreResult};
use crate::mapper::Mapper;
use crate::model::AssignmentMethod;
use crate::portal_auth::authenticate_portal;
use crate::store::{LeadStore, NewLead};
use crate::validator::validate;

/// Tunables surfaced to the hosting binary as environment controls.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dedup_window: Duration,
    pub distribution_retry_max: u32,
    /// Propagated by the hosting binary as a `tokio::time::timeout` around
    /// the whole pipeline invocation; not enforced inside this crate.
    pub pipeline_deadline_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::seconds(86_400),
            distribution_retry_max: 3,
            pipeline_deadline_ms: 10_000,
        }
    }
}

#[derive(Debug)]
pub enum IngestOutcome {
    Created { lead_id: Uuid },
    Duplicate { existing_id: Uuid },
    Unassigned { lead_id: Uuid },
}

/// Runs the full webhook-to-assignment pipeline: C1 -> C2 -> C3 -> C4 ->
/// C5(create) -> C6 -> C7 -> C8 -> C9. Every rejection along the way
/// produces an audit entry before the typed error is returned.
#[allow(clippy::too_many_arguments)]
pub async fn ingest_webhook(
    store: &dyn LeadStore,
    clock: &dyn Clock,
    notifier: &dyn Notifier,
    audit: &dyn AuditRecorder,
    config: &PipelineConfig,
    portal_code: &str,
    presented_secret: &str,
    raw_payload: &Value,
) -> CoreResult<IngestOutcome> {
    let portal = match authenticate_portal(store, portal_code, presented_secret).await {
        Ok(portal) => portal,
        Err(err) => {
            audit
                .record(
                    "webhook_rejected",
                    None,
                    json!({ "portal_code": portal_code, "reason": err.to_string() }),
                )
                .await;
            return Err(err);
        }
    };

    let mapper = Mapper::new(portal.field_mapping_override.as_ref());
    let mapped = mapper.map(raw_payload);

    let valid = match validate(&mapped) {
        Ok(valid) => valid,
        Err(violations) => {
            audit
                .record(
                    "webhook_rejected",
                    None,
                    json!({ "portal_code": portal_code, "violations": violations }),
                )
                .await;
            return Err(CoreError::ValidationFailed(violations));
        }
    };

    let now = clock.now();
    if let Some(existing) = find_duplicate(
        store,
        valid.email.as_deref(),
        valid.phone.as_deref(),
        now,
        config.dedup_window,
    )
    .await?
    {
        audit
            .record("duplicate_suppressed", Some(existing.id), json!({ "portal_code": portal_code }))
            .await;
        return Err(suppress_as_duplicate(&existing));
    }

    let industry = mapped.industry.clone().unwrap_or_else(|| portal.industry.clone());
    let new_lead = NewLead {
        portal_id: portal.id,
        name: valid.name,
        email: valid.email,
        phone: valid.phone,
        city: valid.city,
        state: valid.state,
        zipcode: valid.zipcode,
        territory_key: valid.territory_key,
        industry,
        extra_fields: mapped.extras,
    };

    let lead = store.create_lead(new_lead, now).await?;

    let outcome = distribute(
        store,
        notifier,
        audit,
        &lead,
        &HashSet::new(),
        AssignmentMethod::Auto,
        now,
        config.distribution_retry_max,
    )
    .await?;

    Ok(match outcome {
        DistributeOutcome::Assigned(_) => IngestOutcome::Created { lead_id: lead.id },
        DistributeOutcome::Unassigned => IngestOutcome::Unassigned { lead_id: lead.id },
    })
}

/// Bounded loop over leads currently `new` with no assignment, used by
/// the soft batch-distribute background job and the admin-triggered
/// single-lead distribute endpoint.
pub async fn batch_distribute(
    store: &dyn LeadStore,
    clock: &dyn Clock,
    notifier: &dyn Notifier,
    audit: &dyn AuditRecorder,
    config: &PipelineConfig,
    limit: u32,
) -> CoreResult<Vec<IngestOutcome>> {
    let leads = store.read_undistributed_leads(limit).await?;
    let now = clock.now();
    let mut outcomes = Vec::with_capacity(leads.len());

    for lead in leads {
        let outcome = distribute(
            store,
            notifier,
            audit,
            &lead,
            &HashSet::new(),
            AssignmentMethod::Auto,
            now,
            config.distribution_retry_max,
        )
        .await?;

        outcomes.push(match outcome {
            DistributeOutcome::Assigned(_) => IngestOutcome::Created { lead_id: lead.id },
            DistributeOutcome::Unassigned => IngestOutcome::Unassigned { lead_id: lead.id },
        });
    }

    Ok(outcomes)
}

/// Admin-triggered manual distribution of a single lead.
pub async fn distribute_single(
    store: &dyn LeadStore,
    clock: &dyn Clock,
    notifier: &dyn Notifier,
    audit: &dyn AuditRecorder,
    config: &PipelineConfig,
    lead_id: Uuid,
) -> CoreResult<IngestOutcome> {
    let lead = store.read_lead(lead_id).await?;
    let now = clock.now();
    let outcome = distribute(
        store,
        notifier,
        audit,
        &lead,
        &HashSet::new(),
        AssignmentMethod::Manual,
        now,
        config.distribution_retry_max,
    )
    .await?;

    Ok(match outcome {
        DistributeOutcome::Assigned(_) => IngestOutcome::Created { lead_id },
        DistributeOutcome::Unassigned => IngestOutcome::Unassigned { lead_id },
    })
}

