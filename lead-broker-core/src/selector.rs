use std::collections::HashSet;

use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::model::SequenceCursor;

/// Picks exactly one agency from `candidates` (already ordered by C6/C7)
/// given the territory's sequence cursor and an optional exclusion set
/// used for reject-triggered re-routing.
pub fn select_next(
    candidates: &[Uuid],
    cursor: Option<&SequenceCursor>,
    exclude: &HashSet<Uuid>,
) -> CoreResult<Uuid> {
    let filtered: Vec<Uuid> = candidates.iter().copied().filter(|id| !exclude.contains(id)).collect();

    if filtered.is_empty() {
        return Err(CoreError::NoEligibleAfterExclusion);
    }

    let last_assigned = cursor.and_then(|c| c.last_assigned_agency_id);
    let index = match last_assigned.and_then(|id| filtered.iter().position(|candidate| *candidate == id)) {
        Some(i) => (i + 1) % filtered.len(),
        None => 0,
    };

    Ok(filtered[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cursor(last: Uuid) -> SequenceCursor {
        SequenceCursor {
            territory_key: "10001".to_string(),
            last_assigned_agency_id: Some(last),
            last_assigned_at: Utc::now(),
            counter: 1,
        }
    }

    #[test]
    fn no_cursor_picks_first_candidate() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let picked = select_next(&[a, b], None, &HashSet::new()).unwrap();
        assert_eq!(picked, a);
    }

    #[test]
    fn rotates_to_next_after_cursor() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let picked = select_next(&[a, b], Some(&cursor(a)), &HashSet::new()).unwrap();
        assert_eq!(picked, b);
    }

    #[test]
    fn wraps_around_after_last_candidate() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let picked = select_next(&[a, b], Some(&cursor(b)), &HashSet::new()).unwrap();
        assert_eq!(picked, a);
    }

    #[test]
    fn cursor_holder_absent_from_candidates_picks_index_zero() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let lost = Uuid::from_u128(99);
        let picked = select_next(&[a, b], Some(&cursor(lost)), &HashSet::new()).unwrap();
        assert_eq!(picked, a);
    }

    #[test]
    fn exclusion_set_removes_candidate_before_rotation() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let mut exclude = HashSet::new();
        exclude.insert(a);
        let picked = select_next(&[a, b], None, &exclude).unwrap();
        assert_eq!(picked, b);
    }

    #[test]
    fn exclusion_emptying_candidates_fails() {
        let a = Uuid::from_u128(1);
        let mut exclude = HashSet::new();
        exclude.insert(a);
        let err = select_next(&[a], None, &exclude).unwrap_err();
        assert!(matches!(err, CoreError::NoEligibleAfterExclusion));
    }
}
