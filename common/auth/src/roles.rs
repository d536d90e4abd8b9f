pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_AGENCY_OWNER: &str = "agency_owner";
pub const ROLE_AGENCY_AGENT: &str = "agency_agent";

pub const ROLE_HIERARCHY: &[&str] = &[ROLE_ADMIN, ROLE_AGENCY_OWNER, ROLE_AGENCY_AGENT];
