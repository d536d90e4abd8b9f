use crate::error::{CoreError, CoreResult};
use crate::model::{Portal, PortalStatus};
use crate::store::LeadStore;

/// Validates the portal code routed from the URL against the presented
/// shared secret. Returns the portal record on success for downstream
/// use by the schema mapper.
pub async fn authenticate_portal(
    store: &dyn LeadStore,
    portal_code: &str,
    presented_secret: &str,
) -> CoreResult<Portal> {
    let portal = store
        .read_portal_by_code(portal_code)
        .await?
        .ok_or(CoreError::PortalUnknown)?;

    if portal.status != PortalStatus::Active {
        return Err(CoreError::PortalInactive);
    }

    if !constant_time_eq(portal.secret.as_bytes(), presented_secret.as_bytes()) {
        return Err(CoreError::PortalAuthFailed);
    }

    Ok(portal)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equal_secrets() {
        assert!(constant_time_eq(b"abc123", b"abc123"));
    }

    #[test]
    fn constant_time_eq_rejects_different_lengths() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn constant_time_eq_rejects_mismatch() {
        assert!(!constant_time_eq(b"abc123", b"abc124"));
    }
}
