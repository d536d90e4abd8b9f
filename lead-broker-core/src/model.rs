use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalStatus {
    Active,
    Inactive,
    Maintenance,
}

/// An external lead source, administered out of band and consumed
/// read-only by the routing core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portal {
    pub id: Uuid,
    pub code: String,
    pub status: PortalStatus,
    pub industry: String,
    pub secret: String,
    pub field_mapping_override: Option<std::collections::HashMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Assigned,
    Accepted,
    Rejected,
    PendingReassignment,
    Unassigned,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
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
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub extra_fields: Value,
    pub assigned_agency_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agency {
    pub id: Uuid,
    pub name: String,
    pub industry: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trial,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TerritoryCoverage {
    Wildcard,
    Codes(Vec<String>),
}

impl TerritoryCoverage {
    pub fn covers(&self, territory_key: &str) -> bool {
        match self {
            TerritoryCoverage::Wildcard => true,
            TerritoryCoverage::Codes(codes) => codes.iter().any(|c| c == territory_key),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub agency_id: Uuid,
    pub status: SubscriptionStatus,
    pub territory_coverage: TerritoryCoverage,
    pub monthly_lead_quota: Option<u32>,
    pub billing_anchor_day: Option<u8>,
}

impl Subscription {
    pub fn quota(&self) -> u32 {
        self.monthly_lead_quota.unwrap_or(100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Accepted,
    Rejected,
    Reassigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMethod {
    Auto,
    Manual,
    Reassignment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub agency_id: Uuid,
    pub status: AssignmentStatus,
    pub method: AssignmentMethod,
    pub assigned_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceCursor {
    pub territory_key: String,
    pub last_assigned_agency_id: Option<Uuid>,
    pub last_assigned_at: DateTime<Utc>,
    pub counter: u64,
}

/// An eligible agency as seen by the selector: just the id, in the
/// deterministic ordering C6/C7 produced.
pub type CandidateSet = Vec<Uuid>;
