use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreResult;
use crate::model::{Assignment, AssignmentMethod, AssignmentStatus, Lead, LeadStatus, Portal, SequenceCursor};

/// Fields the pipeline has already normalized and validated; everything
/// the store needs to persist a new canonical lead.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub portal_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub territory_key: String,
    pub industry: String,
    pub extra_fields: serde_json::Value,
}

/// One row of the eligibility join: an agency whose active subscription
/// covers the lead's territory, together with the fields the capacity
/// filter and industry partitioning need.
#[derive(Debug, Clone)]
pub struct EligibleAgencyRow {
    pub agency_id: Uuid,
    pub agency_industry: String,
    pub quota: u32,
    pub billing_anchor_day: Option<u8>,
}

/// Everything `create-assignment` needs to commit atomically: the new
/// assignment, the lead status transition, and the sequence cursor
/// advance, all inside one transaction.
#[derive(Debug, Clone)]
pub struct AssignmentCreate {
    pub lead_id: Uuid,
    pub agency_id: Uuid,
    pub territory_key: String,
    pub method: AssignmentMethod,
    pub expected_last_assigned_agency_id: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
}

/// The durable boundary for every entity in the data model. All other
/// components are stateless transformers parameterized by a handle to
/// this trait plus the injected capabilities.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn read_portal_by_code(&self, code: &str) -> CoreResult<Option<Portal>>;

    async fn create_lead(&self, lead: NewLead, created_at: DateTime<Utc>) -> CoreResult<Lead>;

    async fn find_recent_duplicate(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        since: DateTime<Utc>,
    ) -> CoreResult<Option<Lead>>;

    async fn read_lead(&self, lead_id: Uuid) -> CoreResult<Lead>;

    async fn read_eligible_agencies(
        &self,
        territory_key: &str,
    ) -> CoreResult<Vec<EligibleAgencyRow>>;

    async fn read_assignment_count_in_window(
        &self,
        agency_id: Uuid,
        window_start: DateTime<Utc>,
    ) -> CoreResult<u32>;

    async fn read_sequence_cursor(&self, territory_key: &str) -> CoreResult<Option<SequenceCursor>>;

    /// Creates the assignment, sets `lead.status = assigned` with the
    /// chosen agency, and advances the sequence cursor, all within one
    /// transaction. Fails with `AssignmentConflict` if a pending/accepted
    /// assignment already exists for the lead, or `CursorConflict` if
    /// `expected_last_assigned_agency_id` no longer matches the stored
    /// cursor (another distributor won the race).
    async fn create_assignment(&self, req: AssignmentCreate) -> CoreResult<Assignment>;

    async fn update_lead_status(
        &self,
        lead_id: Uuid,
        status: LeadStatus,
        assigned_agency_id: Option<Uuid>,
    ) -> CoreResult<()>;

    async fn update_assignment_status(
        &self,
        assignment_id: Uuid,
        status: AssignmentStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<()>;

    async fn read_pending_assignment(&self, lead_id: Uuid) -> CoreResult<Option<Assignment>>;

    /// Leads in `new` with no current assignment, oldest first, bounded
    /// by `limit`. Backs the soft batch-distribute loop.
    async fn read_undistributed_leads(&self, limit: u32) -> CoreResult<Vec<Lead>>;

    /// An agency's assignments with their nested leads, most recent
    /// first. Backs the mobile `GET /leads` surface; not part of the
    /// distribution invariant set.
    async fn read_assignments_for_agency(&self, agency_id: Uuid) -> CoreResult<Vec<(Assignment, Lead)>>;
}
