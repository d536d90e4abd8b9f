use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const AUDIT_EVENT_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditActor {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Append-only record of every webhook reception and state transition.
/// Never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub event_version: u16,
    pub actor: AuditActor,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub action: String,
    pub occurred_at: DateTime<Utc>,
    pub source_service: String,
    pub severity: AuditSeverity,
    pub trace_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub meta: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink not configured")]
    NotConfigured,
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("sink error: {0}")]
    Sink(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
