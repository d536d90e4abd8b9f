use chrono::{DateTime, Duration, Utc};

use crate::error::{CoreError, CoreResult};
use crate::model::Lead;
use crate::store::LeadStore;

/// Looks for a lead with the same normalized email or phone created
/// within `window` of `now`. Either match suppresses (OR semantics; see
/// design notes on dedup ambiguity). Returns the existing lead if found.
pub async fn find_duplicate(
    store: &dyn LeadStore,
    email: Option<&str>,
    phone: Option<&str>,
    now: DateTime<Utc>,
    window: Duration,
) -> CoreResult<Option<Lead>> {
    if email.is_none() && phone.is_none() {
        return Ok(None);
    }
    let since = now - window;
    store.find_recent_duplicate(email, phone, since).await
}

pub fn suppress_as_duplicate(existing: &Lead) -> CoreError {
    CoreError::DuplicateSuppressed { existing_id: existing.id }
}
