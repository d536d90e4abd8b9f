use crate::context::SecurityContext;
use crate::SecurityError;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    AgencyOwner,
    AgencyAgent,
    Unknown(String),
}

impl Role {
    pub fn parse_role(s: &str) -> Self {
        match s {
            "admin" | "Admin" => Role::Admin,
            "agency_owner" | "AgencyOwner" => Role::AgencyOwner,
            "agency_agent" | "AgencyAgent" => Role::AgencyAgent,
            other => Role::Unknown(other.to_string()),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::parse_role(s))
    }
}

pub fn ensure_role(ctx: &SecurityContext, required: Role) -> Result<(), SecurityError> {
    if ctx.roles.contains(&required) {
        return Ok(());
    }
    warn!(agency_id = ?ctx.agency_id, ?required, roles = ?ctx.roles, "role_check_failed");
    Err(SecurityError::Forbidden)
}

pub fn ensure_any_role(ctx: &SecurityContext, required: &[Role]) -> Result<(), SecurityError> {
    if ctx.roles.iter().any(|r| required.iter().any(|x| x == r)) {
        return Ok(());
    }
    warn!(agency_id = ?ctx.agency_id, ?required, roles = ?ctx.roles, "any_role_check_failed");
    Err(SecurityError::Forbidden)
}
