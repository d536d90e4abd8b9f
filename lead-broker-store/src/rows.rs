use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

use lead_broker_core::model::{
    Assignment, AssignmentMethod, AssignmentStatus, Lead, LeadStatus, Portal, PortalStatus, SequenceCursor,
};
use lead_broker_core::store::EligibleAgencyRow;

#[derive(sqlx::FromRow)]
pub(crate) struct PortalRow {
    pub id: Uuid,
    pub code: String,
    pub status: String,
    pub industry: String,
    pub secret: String,
    pub field_mapping_override: Option<Json<std::collections::HashMap<String, Vec<String>>>>,
}

impl PortalRow {
    pub(crate) fn into_domain(self) -> Portal {
        Portal {
            id: self.id,
            code: self.code,
            status: parse_portal_status(&self.status),
            industry: self.industry,
            secret: self.secret,
            field_mapping_override: self.field_mapping_override.map(|j| j.0),
        }
    }
}

fn parse_portal_status(raw: &str) -> PortalStatus {
    match raw {
        "active" => PortalStatus::Active,
        "maintenance" => PortalStatus::Maintenance,
        _ => PortalStatus::Inactive,
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct LeadRow {
    pub id: Uuid,
    pub portal_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub territory_key: String,
    pub industry: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub extra_fields: Json<Value>,
    pub assigned_agency_id: Option<Uuid>,
}

impl LeadRow {
    pub(crate) fn into_domain(self) -> Lead {
        Lead {
            id: self.id,
            portal_id: self.portal_id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            city: self.city,
            state: self.state,
            zipcode: self.zipcode,
            territory_key: self.territory_key,
            industry: self.industry,
            status: parse_lead_status(&self.status),
            created_at: self.created_at,
            extra_fields: self.extra_fields.0,
            assigned_agency_id: self.assigned_agency_id,
        }
    }
}

pub(crate) fn lead_status_str(status: LeadStatus) -> &'static str {
    match status {
        LeadStatus::New => "new",
        LeadStatus::Assigned => "assigned",
        LeadStatus::Accepted => "accepted",
        LeadStatus::Rejected => "rejected",
        LeadStatus::PendingReassignment => "pending_reassignment",
        LeadStatus::Unassigned => "unassigned",
        LeadStatus::Archived => "archived",
    }
}

fn parse_lead_status(raw: &str) -> LeadStatus {
    match raw {
        "assigned" => LeadStatus::Assigned,
        "accepted" => LeadStatus::Accepted,
        "rejected" => LeadStatus::Rejected,
        "pending_reassignment" => LeadStatus::PendingReassignment,
        "unassigned" => LeadStatus::Unassigned,
        "archived" => LeadStatus::Archived,
        _ => LeadStatus::New,
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AssignmentRow {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub agency_id: Uuid,
    pub status: String,
    pub method: String,
    pub assigned_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl AssignmentRow {
    pub(crate) fn into_domain(self) -> Assignment {
        Assignment {
            id: self.id,
            lead_id: self.lead_id,
            agency_id: self.agency_id,
            status: parse_assignment_status(&self.status),
            method: parse_assignment_method(&self.method),
            assigned_at: self.assigned_at,
            accepted_at: self.accepted_at,
            rejected_at: self.rejected_at,
            rejection_reason: self.rejection_reason,
        }
    }
}

pub(crate) fn assignment_status_str(status: AssignmentStatus) -> &'static str {
    match status {
        AssignmentStatus::Pending => "pending",
        AssignmentStatus::Accepted => "accepted",
        AssignmentStatus::Rejected => "rejected",
        AssignmentStatus::Reassigned => "reassigned",
    }
}

fn parse_assignment_status(raw: &str) -> AssignmentStatus {
    match raw {
        "accepted" => AssignmentStatus::Accepted,
        "rejected" => AssignmentStatus::Rejected,
        "reassigned" => AssignmentStatus::Reassigned,
        _ => AssignmentStatus::Pending,
    }
}

pub(crate) fn assignment_method_str(method: AssignmentMethod) -> &'static str {
    match method {
        AssignmentMethod::Auto => "auto",
        AssignmentMethod::Manual => "manual",
        AssignmentMethod::Reassignment => "reassignment",
    }
}

fn parse_assignment_method(raw: &str) -> AssignmentMethod {
    match raw {
        "manual" => AssignmentMethod::Manual,
        "reassignment" => AssignmentMethod::Reassignment,
        _ => AssignmentMethod::Auto,
    }
}

/// One row of the `lead_assignments JOIN leads` query backing
/// `read_assignments_for_agency`. Column names are aliased in the query
/// to dodge the `id`/`status` collisions between the two tables.
#[derive(sqlx::FromRow)]
pub(crate) struct AssignmentWithLeadRow {
    pub assignment_id: Uuid,
    pub lead_id: Uuid,
    pub agency_id: Uuid,
    pub assignment_status: String,
    pub method: String,
    pub assigned_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub lead_id_dup: Uuid,
    pub portal_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub territory_key: String,
    pub industry: String,
    pub lead_status: String,
    pub created_at: DateTime<Utc>,
    pub extra_fields: Json<Value>,
    pub assigned_agency_id: Option<Uuid>,
}

impl AssignmentWithLeadRow {
    pub(crate) fn into_domain(self) -> (Assignment, Lead) {
        let assignment = Assignment {
            id: self.assignment_id,
            lead_id: self.lead_id,
            agency_id: self.agency_id,
            status: parse_assignment_status(&self.assignment_status),
            method: parse_assignment_method(&self.method),
            assigned_at: self.assigned_at,
            accepted_at: self.accepted_at,
            rejected_at: self.rejected_at,
            rejection_reason: self.rejection_reason,
        };
        let lead = Lead {
            id: self.lead_id_dup,
            portal_id: self.portal_id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            city: self.city,
            state: self.state,
            zipcode: self.zipcode,
            territory_key: self.territory_key,
            industry: self.industry,
            status: parse_lead_status(&self.lead_status),
            created_at: self.created_at,
            extra_fields: self.extra_fields.0,
            assigned_agency_id: self.assigned_agency_id,
        };
        (assignment, lead)
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct EligibleAgencyRowDb {
    pub agency_id: Uuid,
    pub agency_industry: String,
    pub monthly_lead_quota: Option<i32>,
    pub billing_anchor_day: Option<i16>,
}

impl EligibleAgencyRowDb {
    pub(crate) fn into_domain(self) -> EligibleAgencyRow {
        EligibleAgencyRow {
            agency_id: self.agency_id,
            agency_industry: self.agency_industry,
            quota: self.monthly_lead_quota.map(|v| v as u32).unwrap_or(100),
            billing_anchor_day: self.billing_anchor_day.map(|v| v as u8),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SequenceCursorRow {
    pub territory_key: String,
    pub last_assigned_agency_id: Option<Uuid>,
    pub last_assigned_at: DateTime<Utc>,
    pub counter: i64,
}

impl SequenceCursorRow {
    pub(crate) fn into_domain(self) -> SequenceCursor {
        SequenceCursor {
            territory_key: self.territory_key,
            last_assigned_agency_id: self.last_assigned_agency_id,
            last_assigned_at: self.last_assigned_at,
            counter: self.counter as u64,
        }
    }
}

