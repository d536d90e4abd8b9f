//! Postgres-backed [`LeadStore`] implementation. This is the durable
//! transactional boundary described in spec §4.5: every write that must be
//! atomic with respect to other pipeline invocations (assignment creation,
//! lead status, sequence cursor advance) happens inside a single `sqlx`
//! transaction here, never split across calls.
mod rows;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use lead_broker_core::error::{CoreError, CoreResult};
use lead_broker_core::model::{Agency, Assignment, AssignmentStatus, Lead, LeadStatus, Portal, SequenceCursor, Subscription, TerritoryCoverage};
use lead_broker_core::store::{AssignmentCreate, EligibleAgencyRow, LeadStore, NewLead};

use rows::{
    assignment_method_str, assignment_status_str, lead_status_str, AssignmentRow, AssignmentWithLeadRow,
    EligibleAgencyRowDb, LeadRow, PortalRow, SequenceCursorRow,
};

fn db_err(err: sqlx::Error) -> CoreError {
    CoreError::StoreUnavailable(err.to_string())
}

/// The durable `LeadStore`. Cloning is cheap: `sqlx::PgPool` is itself a
/// handle around a connection pool.
#[derive(Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Seeds a portal record. Exposed for integration tests and
    /// operational scripts; the admin CRUD surface this ultimately backs
    /// is a non-goal of the core itself (spec §1).
    pub async fn seed_portal(&self, portal: &Portal) -> CoreResult<()> {
        let status = match portal.status {
            lead_broker_core::model::PortalStatus::Active => "active",
            lead_broker_core::model::PortalStatus::Inactive => "inactive",
            lead_broker_core::model::PortalStatus::Maintenance => "maintenance",
        };
        let override_json = portal
            .field_mapping_override
            .as_ref()
            .map(|m| serde_json::to_value(m).unwrap_or(serde_json::Value::Null));
        sqlx::query(
            "INSERT INTO portals (id, code, status, industry, secret, field_mapping_override)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, secret = EXCLUDED.secret",
        )
        .bind(portal.id)
        .bind(&portal.code)
        .bind(status)
        .bind(&portal.industry)
        .bind(&portal.secret)
        .bind(override_json)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Seeds an agency plus one subscription row for it. Same rationale as
    /// `seed_portal`: a thin write path for tests/ops, not the admin API.
    pub async fn seed_agency(&self, agency: &Agency, subscription: &Subscription) -> CoreResult<()> {
        sqlx::query("INSERT INTO agencies (id, name, industry, active) VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING")
            .bind(agency.id)
            .bind(&agency.name)
            .bind(&agency.industry)
            .bind(agency.active)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        let status = match subscription.status {
            lead_broker_core::model::SubscriptionStatus::Active => "active",
            lead_broker_core::model::SubscriptionStatus::Trial => "trial",
            lead_broker_core::model::SubscriptionStatus::Cancelled => "cancelled",
            lead_broker_core::model::SubscriptionStatus::Expired => "expired",
        };
        let (wildcard, codes) = match &subscription.territory_coverage {
            TerritoryCoverage::Wildcard => (true, None),
            TerritoryCoverage::Codes(codes) => (false, Some(codes.clone())),
        };
        sqlx::query(
            "INSERT INTO subscriptions (id, agency_id, status, territory_wildcard, territory_codes, monthly_lead_quota, billing_anchor_day)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(subscription.agency_id)
        .bind(status)
        .bind(wildcard)
        .bind(codes)
        .bind(subscription.monthly_lead_quota.map(|v| v as i32))
        .bind(subscription.billing_anchor_day.map(|v| v as i16))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn read_portal_by_code(&self, code: &str) -> CoreResult<Option<Portal>> {
        let row: Option<PortalRow> = sqlx::query_as(
            "SELECT id, code, status, industry, secret, field_mapping_override FROM portals WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(PortalRow::into_domain))
    }

    async fn create_lead(&self, lead: NewLead, created_at: DateTime<Utc>) -> CoreResult<Lead> {
        let id = Uuid::new_v4();
        let row: LeadRow = sqlx::query_as(
            "INSERT INTO leads (id, portal_id, name, email, phone, city, state, zipcode, territory_key, industry, status, created_at, extra_fields)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'new', $11, $12)
             RETURNING id, portal_id, name, email, phone, city, state, zipcode, territory_key, industry, status, created_at, extra_fields, assigned_agency_id",
        )
        .bind(id)
        .bind(lead.portal_id)
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.city)
        .bind(&lead.state)
        .bind(&lead.zipcode)
        .bind(&lead.territory_key)
        .bind(&lead.industry)
        .bind(created_at)
        .bind(sqlx::types::Json(lead.extra_fields))
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.into_domain())
    }

    async fn find_recent_duplicate(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        since: DateTime<Utc>,
    ) -> CoreResult<Option<Lead>> {
        let row: Option<LeadRow> = sqlx::query_as(
            "SELECT id, portal_id, name, email, phone, city, state, zipcode, territory_key, industry, status, created_at, extra_fields, assigned_agency_id
             FROM leads
             WHERE created_at >= $1
               AND (($2::text IS NOT NULL AND email = $2) OR ($3::text IS NOT NULL AND phone = $3))
             ORDER BY created_at ASC
             LIMIT 1",
        )
        .bind(since)
        .bind(email)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(LeadRow::into_domain))
    }

    async fn read_lead(&self, lead_id: Uuid) -> CoreResult<Lead> {
        let row: Option<LeadRow> = sqlx::query_as(
            "SELECT id, portal_id, name, email, phone, city, state, zipcode, territory_key, industry, status, created_at, extra_fields, assigned_agency_id
             FROM leads WHERE id = $1",
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(LeadRow::into_domain).ok_or(CoreError::LeadNotFound)
    }

    async fn read_eligible_agencies(&self, territory_key: &str) -> CoreResult<Vec<EligibleAgencyRow>> {
        // DISTINCT ON picks, per agency, the subscription with the largest
        // quota among those covering this territory; an agency holding
        // several qualifying plans gets the most generous one.
        let rows: Vec<EligibleAgencyRowDb> = sqlx::query_as(
            "SELECT DISTINCT ON (a.id) a.id AS agency_id, a.industry AS agency_industry,
                    s.monthly_lead_quota, s.billing_anchor_day
             FROM agencies a
             JOIN subscriptions s ON s.agency_id = a.id
             WHERE a.active = true
               AND s.status IN ('active', 'trial')
               AND (s.territory_wildcard = true OR s.territory_codes @> ARRAY[$1]::text[])
             ORDER BY a.id, s.monthly_lead_quota DESC NULLS LAST",
        )
        .bind(territory_key)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(EligibleAgencyRowDb::into_domain).collect())
    }

    async fn read_assignment_count_in_window(&self, agency_id: Uuid, window_start: DateTime<Utc>) -> CoreResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lead_assignments
             WHERE agency_id = $1 AND status IN ('pending', 'accepted') AND assigned_at >= $2",
        )
        .bind(agency_id)
        .bind(window_start)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(count as u32)
    }

    async fn read_sequence_cursor(&self, territory_key: &str) -> CoreResult<Option<SequenceCursor>> {
        let row: Option<SequenceCursorRow> = sqlx::query_as(
            "SELECT territory_key, last_assigned_agency_id, last_assigned_at, counter
             FROM lead_distribution_sequence WHERE territory_key = $1",
        )
        .bind(territory_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(SequenceCursorRow::into_domain))
    }

    async fn create_assignment(&self, req: AssignmentCreate) -> CoreResult<Assignment> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let assignment_id = Uuid::new_v4();
        let insert_result = sqlx::query_as::<_, AssignmentRow>(
            "INSERT INTO lead_assignments (id, lead_id, agency_id, status, method, assigned_at)
             VALUES ($1, $2, $3, 'pending', $4, $5)
             RETURNING id, lead_id, agency_id, status, method, assigned_at, accepted_at, rejected_at, rejection_reason",
        )
        .bind(assignment_id)
        .bind(req.lead_id)
        .bind(req.agency_id)
        .bind(assignment_method_str(req.method))
        .bind(req.assigned_at)
        .fetch_one(&mut *tx)
        .await;

        let assignment_row = match insert_result {
            Ok(row) => row,
            Err(sqlx::Error::Database(db)) if db.kind() == ErrorKind::UniqueViolation => {
                tx.rollback().await.ok();
                return Err(CoreError::AssignmentConflict { lead_id: req.lead_id });
            }
            Err(err) => return Err(db_err(err)),
        };

        // Compare-and-set: the cursor only advances if nobody else has
        // moved it past what this caller observed (§4.5, §5).
        let cas_row = sqlx::query(
            "INSERT INTO lead_distribution_sequence (territory_key, last_assigned_agency_id, last_assigned_at, counter)
             VALUES ($1, $2, $3, 1)
             ON CONFLICT (territory_key) DO UPDATE
             SET last_assigned_agency_id = EXCLUDED.last_assigned_agency_id,
                 last_assigned_at = EXCLUDED.last_assigned_at,
                 counter = lead_distribution_sequence.counter + 1
             WHERE lead_distribution_sequence.last_assigned_agency_id IS NOT DISTINCT FROM $4
             RETURNING territory_key",
        )
        .bind(&req.territory_key)
        .bind(req.agency_id)
        .bind(req.assigned_at)
        .bind(req.expected_last_assigned_agency_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        if cas_row.is_none() {
            tx.rollback().await.ok();
            return Err(CoreError::CursorConflict { territory_key: req.territory_key });
        }

        let updated = sqlx::query("UPDATE leads SET status = 'assigned', assigned_agency_id = $2 WHERE id = $1")
            .bind(req.lead_id)
            .bind(req.agency_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(CoreError::LeadNotFound);
        }

        tx.commit().await.map_err(db_err)?;
        Ok(assignment_row.into_domain())
    }

    async fn update_lead_status(
        &self,
        lead_id: Uuid,
        status: LeadStatus,
        assigned_agency_id: Option<Uuid>,
    ) -> CoreResult<()> {
        let result = sqlx::query("UPDATE leads SET status = $2, assigned_agency_id = $3 WHERE id = $1")
            .bind(lead_id)
            .bind(lead_status_str(status))
            .bind(assigned_agency_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::LeadNotFound);
        }
        Ok(())
    }

    async fn update_assignment_status(
        &self,
        assignment_id: Uuid,
        status: AssignmentStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE lead_assignments
             SET status = $2,
                 accepted_at = CASE WHEN $2 = 'accepted' THEN $4 ELSE accepted_at END,
                 rejected_at = CASE WHEN $2 = 'rejected' THEN $4 ELSE rejected_at END,
                 rejection_reason = CASE WHEN $2 = 'rejected' THEN $3 ELSE rejection_reason END
             WHERE id = $1",
        )
        .bind(assignment_id)
        .bind(assignment_status_str(status))
        .bind(reason)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::AssignmentNotPending);
        }
        Ok(())
    }

    async fn read_pending_assignment(&self, lead_id: Uuid) -> CoreResult<Option<Assignment>> {
        let row: Option<AssignmentRow> = sqlx::query_as(
            "SELECT id, lead_id, agency_id, status, method, assigned_at, accepted_at, rejected_at, rejection_reason
             FROM lead_assignments
             WHERE lead_id = $1 AND status IN ('pending', 'accepted')
             LIMIT 1",
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(AssignmentRow::into_domain))
    }

    async fn read_undistributed_leads(&self, limit: u32) -> CoreResult<Vec<Lead>> {
        let rows: Vec<LeadRow> = sqlx::query_as(
            "SELECT id, portal_id, name, email, phone, city, state, zipcode, territory_key, industry, status, created_at, extra_fields, assigned_agency_id
             FROM leads
             WHERE status = 'new' AND assigned_agency_id IS NULL
             ORDER BY created_at ASC
             LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(LeadRow::into_domain).collect())
    }

    async fn read_assignments_for_agency(&self, agency_id: Uuid) -> CoreResult<Vec<(Assignment, Lead)>> {
        let rows: Vec<AssignmentWithLeadRow> = sqlx::query_as(
            "SELECT
                a.id AS assignment_id, a.lead_id, a.agency_id, a.status AS assignment_status, a.method,
                a.assigned_at, a.accepted_at, a.rejected_at, a.rejection_reason,
                l.id AS lead_id_dup, l.portal_id, l.name, l.email, l.phone, l.city, l.state, l.zipcode,
                l.territory_key, l.industry, l.status AS lead_status, l.created_at, l.extra_fields, l.assigned_agency_id
             FROM lead_assignments a
             JOIN leads l ON l.id = a.lead_id
             WHERE a.agency_id = $1
             ORDER BY a.assigned_at DESC",
        )
        .bind(agency_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(AssignmentWithLeadRow::into_domain).collect())
    }
}

/// Durable [`common_audit::AuditSink`] writing straight to `audit_log`.
/// Used instead of (or in front of) a Kafka sink when the deployment has
/// no message bus, keeping the append-only audit trail spec §3 requires
/// even without the event-streaming ambient stack.
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl common_audit::AuditSink for PgAuditSink {
    async fn send(&self, event: &common_audit::AuditEvent) -> common_audit::AuditResult<()> {
        let severity = match event.severity {
            common_audit::AuditSeverity::Info => "info",
            common_audit::AuditSeverity::Warning => "warning",
            common_audit::AuditSeverity::Error => "error",
        };
        sqlx::query(
            "INSERT INTO audit_log (id, actor_id, actor_name, actor_email, entity_type, entity_id, action, occurred_at, source_service, severity, trace_id, payload, meta)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(event.event_id)
        .bind(event.actor.id)
        .bind(&event.actor.name)
        .bind(&event.actor.email)
        .bind(&event.entity_type)
        .bind(event.entity_id)
        .bind(&event.action)
        .bind(event.occurred_at)
        .bind(&event.source_service)
        .bind(severity)
        .bind(event.trace_id)
        .bind(sqlx::types::Json(&event.payload))
        .bind(sqlx::types::Json(&event.meta))
        .execute(&self.pool)
        .await
        .map_err(|err| common_audit::AuditError::Sink(err.to_string()))?;
        Ok(())
    }
}

/// Returns a row for every webhook-reception/state-transition event
/// recorded for `entity_id`, newest first. Backs the admin audit-log
/// surface (`ViewAuditLog` capability); not part of the pipeline itself.
pub async fn read_audit_log_for_entity(
    pool: &PgPool,
    entity_id: Uuid,
    limit: u32,
) -> CoreResult<Vec<common_audit::AuditEvent>> {
    let records = sqlx::query(
        "SELECT id, actor_id, actor_name, actor_email, entity_type, entity_id, action, occurred_at, source_service, severity, trace_id, payload, meta
         FROM audit_log WHERE entity_id = $1 ORDER BY occurred_at DESC LIMIT $2",
    )
    .bind(entity_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    Ok(records
        .into_iter()
        .map(|row| common_audit::AuditEvent {
            event_id: row.get("id"),
            event_version: common_audit::AUDIT_EVENT_VERSION,
            actor: common_audit::AuditActor {
                id: row.get("actor_id"),
                name: row.get("actor_name"),
                email: row.get("actor_email"),
            },
            entity_type: row.get("entity_type"),
            entity_id: row.get("entity_id"),
            action: row.get("action"),
            occurred_at: row.get("occurred_at"),
            source_service: row.get("source_service"),
            severity: match row.get::<String, _>("severity").as_str() {
                "warning" => common_audit::AuditSeverity::Warning,
                "error" => common_audit::AuditSeverity::Error,
                _ => common_audit::AuditSeverity::Info,
            },
            trace_id: row.get("trace_id"),
            payload: row.get::<sqlx::types::Json<serde_json::Value>, _>("payload").0,
            meta: row.get::<sqlx::types::Json<serde_json::Value>, _>("meta").0,
        })
        .collect())
}
