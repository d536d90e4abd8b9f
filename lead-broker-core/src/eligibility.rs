use uuid::Uuid;

use crate::store::EligibleAgencyRow;

/// Partitions the store's territory-filtered rows into industry-match
/// and industry-agnostic agencies, preferring the matched partition
/// when non-empty. Within each partition, orders by agency id ascending
/// so ties are deterministic. This ordering is the only input ordering
/// the selector relies on.
pub fn order_candidates(rows: &[EligibleAgencyRow], lead_industry: &str) -> Vec<Uuid> {
    let mut matched: Vec<&EligibleAgencyRow> = rows.iter().filter(|r| r.agency_industry == lead_industry).collect();
    let mut agnostic: Vec<&EligibleAgencyRow> = rows.iter().filter(|r| r.agency_industry != lead_industry).collect();

    matched.sort_by_key(|r| r.agency_id);
    agnostic.sort_by_key(|r| r.agency_id);

    let chosen = if !matched.is_empty() { matched } else { agnostic };
    chosen.into_iter().map(|r| r.agency_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: Uuid, industry: &str) -> EligibleAgencyRow {
        EligibleAgencyRow { agency_id: id, agency_industry: industry.to_string(), quota: 100, billing_anchor_day: None }
    }

    #[test]
    fn prefers_industry_match_partition() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let rows = vec![row(a, "non_healthcare"), row(b, "healthcare")];
        let ordered = order_candidates(&rows, "healthcare");
        assert_eq!(ordered, vec![b]);
    }

    #[test]
    fn falls_back_to_agnostic_when_no_match() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let rows = vec![row(a, "retail"), row(b, "logistics")];
        let mut ordered = order_candidates(&rows, "healthcare");
        ordered.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(ordered, expected);
    }

    #[test]
    fn orders_by_agency_id_ascending() {
        let a = Uuid::from_u128(2);
        let b = Uuid::from_u128(1);
        let rows = vec![row(a, "retail"), row(b, "retail")];
        let ordered = order_candidates(&rows, "retail");
        assert_eq!(ordered, vec![b, a]);
    }

    #[test]
    fn empty_rows_yields_empty_set() {
        let ordered = order_candidates(&[], "retail");
        assert!(ordered.is_empty());
    }
}
