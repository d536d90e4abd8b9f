use thiserror::Error;
use uuid::Uuid;

/// The typed error taxonomy the pipeline and lifecycle controller return.
/// Each variant corresponds to exactly one row in the error taxonomy; the
/// hosting binary is the only place that knows how these map to HTTP codes.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown portal code")]
    PortalUnknown,
    #[error("portal is not active")]
    PortalInactive,
    #[error("portal authentication failed")]
    PortalAuthFailed,

    #[error("validation failed: {0:?}")]
    ValidationFailed(Vec<String>),

    #[error("duplicate suppressed, existing lead {existing_id}")]
    DuplicateSuppressed { existing_id: Uuid },

    #[error("no eligible agency for this lead")]
    NoEligibleAgency,
    #[error("no eligible agency remains after exclusion")]
    NoEligibleAfterExclusion,

    #[error("assignment conflict for lead {lead_id}")]
    AssignmentConflict { lead_id: Uuid },
    #[error("sequence cursor contention for territory {territory_key}")]
    CursorConflict { territory_key: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("notification sink unavailable: {0}")]
    NotificationSinkUnavailable(String),

    #[error("assignment is not pending for this agency")]
    AssignmentNotPending,
    #[error("agency does not match the pending assignment")]
    AgencyMismatch,
    #[error("lead not found")]
    LeadNotFound,
}

pub type CoreResult<T> = Result<T, CoreError>;
