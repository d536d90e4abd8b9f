use chrono::{DateTime, Datelike, TimeZone, Utc};
use uuid::Uuid;

use crate::error::CoreResult;
use crate::store::{EligibleAgencyRow, LeadStore};

/// `[start_of_month, now)` unless the subscription names a
/// `billing_anchor_day`, in which case `[most_recent_anchor, now)`.
pub fn billing_window_start(now: DateTime<Utc>, billing_anchor_day: Option<u8>) -> DateTime<Utc> {
    match billing_anchor_day {
        None => Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now),
        Some(day) => {
            let day = day.max(1) as u32;
            let this_month_anchor = Utc
                .with_ymd_and_hms(now.year(), now.month(), day.min(days_in_month(now.year(), now.month())), 0, 0, 0)
                .single();
            match this_month_anchor {
                Some(anchor) if anchor <= now => anchor,
                _ => {
                    let (prev_year, prev_month) = if now.month() == 1 { (now.year() - 1, 12) } else { (now.year(), now.month() - 1) };
                    Utc.with_ymd_and_hms(prev_year, prev_month, day.min(days_in_month(prev_year, prev_month)), 0, 0, 0)
                        .single()
                        .unwrap_or(now)
                }
            }
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).single().expect("valid date");
    let first_of_this = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single().expect("valid date");
    (first_of_next - first_of_this).num_days() as u32
}

/// Keeps candidates whose current-window assignment count is strictly
/// below their quota, preserving the input ordering from the
/// eligibility resolver.
pub async fn filter_by_capacity(
    store: &dyn LeadStore,
    candidates: &[EligibleAgencyRow],
    now: DateTime<Utc>,
) -> CoreResult<Vec<Uuid>> {
    let mut retained = Vec::with_capacity(candidates.len());
    for row in candidates {
        let window_start = billing_window_start(now, row.billing_anchor_day);
        let current_count = store.read_assignment_count_in_window(row.agency_id, window_start).await?;
        if current_count < row.quota {
            retained.push(row.agency_id);
        }
    }
    Ok(retained)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_month_start_with_no_anchor() {
        let now = Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap();
        let start = billing_window_start(now, None);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn anchor_day_in_this_month_when_already_passed() {
        let now = Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap();
        let start = billing_window_start(now, Some(10));
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 7, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn anchor_day_falls_back_to_previous_month() {
        let now = Utc.with_ymd_and_hms(2026, 7, 5, 12, 0, 0).unwrap();
        let start = billing_window_start(now, Some(20));
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 6, 20, 0, 0, 0).unwrap());
    }
}
