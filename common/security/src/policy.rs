use crate::{roles::Role, SecurityContext, SecurityError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ViewLeads,
    AcceptLead,
    RejectLead,
    Distribute,
    BatchDistribute,
    Reassign,
    ViewAuditLog,
}

fn allowed_roles(cap: Capability) -> &'static [Role] {
    use Capability::*;
    use Role::*;
    match cap {
        ViewLeads => &[Admin, AgencyOwner, AgencyAgent],
        AcceptLead => &[Admin, AgencyOwner, AgencyAgent],
        RejectLead => &[Admin, AgencyOwner, AgencyAgent],
        Distribute => &[Admin],
        BatchDistribute => &[Admin],
        Reassign => &[Admin, AgencyOwner],
        ViewAuditLog => &[Admin],
    }
}

pub fn ensure_capability(ctx: &SecurityContext, cap: Capability) -> Result<(), SecurityError> {
    let allowed = allowed_roles(cap);
    if ctx.roles.iter().any(|r| allowed.iter().any(|a| a == r)) {
        return Ok(());
    }
    Err(SecurityError::Forbidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_audit::AuditActor;
    use uuid::Uuid;

    fn mk_ctx(roles: Vec<Role>) -> SecurityContext {
        SecurityContext {
            agency_id: Some(Uuid::new_v4()),
            actor: AuditActor { id: Some(Uuid::new_v4()), name: None, email: None },
            roles,
            trace_id: None,
        }
    }

    #[test]
    fn agency_agent_cannot_batch_distribute() {
        let ctx = mk_ctx(vec![Role::AgencyAgent]);
        assert!(ensure_capability(&ctx, Capability::BatchDistribute).is_err());
    }

    #[test]
    fn agency_owner_can_reassign_within_agency() {
        let ctx = mk_ctx(vec![Role::AgencyOwner]);
        assert!(ensure_capability(&ctx, Capability::Reassign).is_ok());
    }

    #[test]
    fn admin_has_all_capabilities() {
        let ctx = mk_ctx(vec![Role::Admin]);
        for cap in [
            Capability::ViewLeads,
            Capability::AcceptLead,
            Capability::RejectLead,
            Capability::Distribute,
            Capability::BatchDistribute,
            Capability::Reassign,
            Capability::ViewAuditLog,
        ] {
            assert!(ensure_capability(&ctx, cap).is_ok(), "Admin missing {:?}", cap);
        }
    }

    #[test]
    fn agency_agent_cannot_view_audit_log() {
        let ctx = mk_ctx(vec![Role::AgencyAgent]);
        assert!(ensure_capability(&ctx, Capability::ViewAuditLog).is_err());
    }
}
