//! Route reconstruction for consumers that draw or summarize the trail.

use serde::Serialize;

use super::types::PositionRecord;
use crate::geo;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub points: usize,
    pub start: Option<i64>,
    pub end: Option<i64>,
    /// Sum of consecutive great-circle legs, in meters.
    pub length_m: f64,
}

/// Records in chronological order (stable for equal timestamps).
pub fn chronological(mut records: Vec<PositionRecord>) -> Vec<PositionRecord> {
    records.sort_by_key(|r| r.captured_at);
    records
}

/// Records newest first, as a list view shows them.
pub fn newest_first(mut records: Vec<PositionRecord>) -> Vec<PositionRecord> {
    records.sort_by_key(|r| std::cmp::Reverse(r.captured_at));
    records
}

pub fn summarize(records: &[PositionRecord]) -> RouteSummary {
    let length_m = records
        .windows(2)
        .map(|pair| geo::distance(pair[0].coordinate(), pair[1].coordinate()))
        .sum();

    RouteSummary {
        points: records.len(),
        start: records.first().map(|r| r.captured_at),
        end: records.last().map(|r| r.captured_at),
        length_m,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, lon: f64, ts: i64) -> PositionRecord {
        PositionRecord {
            id: id.into(),
            latitude: 0.0,
            longitude: lon,
            captured_at: ts,
        }
    }

    #[test]
    fn orders_both_ways() {
        let records = vec![rec("c", 0.0, 3), rec("a", 0.0, 1), rec("b", 0.0, 2)];
        let ids = |rs: Vec<PositionRecord>| rs.into_iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids(chronological(records.clone())), ["a", "b", "c"]);
        assert_eq!(ids(newest_first(records)), ["c", "b", "a"]);
    }

    #[test]
    fn summary_sums_legs() {
        let records = vec![rec("a", 0.0, 1), rec("b", 0.001, 2), rec("c", 0.002, 3)];
        let summary = summarize(&records);
        assert_eq!(summary.points, 3);
        assert_eq!(summary.start, Some(1));
        assert_eq!(summary.end, Some(3));
        assert!((summary.length_m - 222.39).abs() < 0.1, "got {}", summary.length_m);
    }

    #[test]
    fn empty_route() {
        let summary = summarize(&[]);
        assert_eq!(summary.points, 0);
        assert_eq!(summary.start, None);
        assert_eq!(summary.length_m, 0.0);
    }
}
