//! Score aggregation and ranking.
//!
//! Every view that summarises a list of records goes through
//! [`compute_stats`]; the leaderboard additionally uses [`rank_by_total`].

use crate::models::{AggregateStats, GradeBand, ScoreRecord};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Reduce a list of records to summary statistics.
///
/// Records without a usable total are counted in `count` but excluded from
/// the mean, the extremes and the grade distribution.
pub fn compute_stats(records: &[ScoreRecord]) -> AggregateStats {
    stats_over(records)
}

fn stats_over<'a, I>(records: I) -> AggregateStats
where
    I: IntoIterator<Item = &'a ScoreRecord>,
{
    let mut stats = AggregateStats::default();
    let mut sum = 0.0;

    for record in records {
        stats.count += 1;
        let Some(total) = record.total_score else {
            continue;
        };
        stats.scored += 1;
        sum += total;
        stats.max = Some(stats.max.map_or(total, |max| max.max(total)));
        stats.min = Some(stats.min.map_or(total, |min| min.min(total)));
        stats.distribution.record(GradeBand::classify(total));
    }

    if stats.scored > 0 {
        stats.mean = Some(round2(sum / stats.scored as f64));
    }

    stats
}

/// Round to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Number of records whose total is at least `threshold`.
pub fn count_at_or_above(records: &[ScoreRecord], threshold: f64) -> usize {
    records
        .iter()
        .filter_map(|r| r.total_score)
        .filter(|total| *total >= threshold)
        .count()
}

/// A record with its leaderboard position.
#[derive(Debug, Clone, Serialize)]
pub struct RankedRecord<'a> {
    /// 1-based rank; tied totals share a rank.
    pub rank: usize,
    #[serde(flatten)]
    pub record: &'a ScoreRecord,
}

/// Order records by total, highest first, and assign competition ranks.
///
/// The sort is stable, so equal totals keep the server's order. Records
/// without a total go last.
pub fn rank_by_total(records: &[ScoreRecord]) -> Vec<RankedRecord<'_>> {
    let mut sorted: Vec<&ScoreRecord> = records.iter().collect();
    sorted.sort_by(|a, b| compare_totals_desc(a.total_score, b.total_score));

    let mut ranked: Vec<RankedRecord<'_>> = Vec::with_capacity(sorted.len());
    for (index, record) in sorted.into_iter().enumerate() {
        let rank = match ranked.last() {
            Some(prev) if prev.record.total_score == record.total_score => prev.rank,
            _ => index + 1,
        };
        ranked.push(RankedRecord { rank, record });
    }

    ranked
}

fn compare_totals_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Summary statistics per examination council, keyed by council code.
///
/// Records without a council code are grouped under an empty key.
pub fn stats_by_council(records: &[ScoreRecord]) -> BTreeMap<String, AggregateStats> {
    let mut grouped: BTreeMap<&str, Vec<&ScoreRecord>> = BTreeMap::new();

    for record in records {
        grouped
            .entry(record.council_code.as_str())
            .or_default()
            .push(record);
    }

    grouped
        .into_iter()
        .map(|(code, group)| (code.to_string(), stats_over(group)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_record(sbd: &str, total: Option<f64>) -> ScoreRecord {
        ScoreRecord {
            registration_number: sbd.to_string(),
            full_name: None,
            math_score: None,
            literature_score: None,
            foreign_language_score: None,
            total_score: total,
            council_code: "14".to_string(),
            date_of_birth: None,
        }
    }

    fn records_with_totals(totals: &[f64]) -> Vec<ScoreRecord> {
        totals
            .iter()
            .enumerate()
            .map(|(i, t)| create_test_record(&format!("{:07}", i + 1), Some(*t)))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let stats = compute_stats(&[]);

        assert_eq!(stats.count, 0);
        assert_eq!(stats.mean, None);
        assert_eq!(stats.max, None);
        assert_eq!(stats.min, None);
        for (_, count) in stats.distribution.iter() {
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn test_mixed_bands() {
        let records = records_with_totals(&[28.0, 25.0, 16.0, 5.0]);
        let stats = compute_stats(&records);

        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, Some(18.5));
        assert_eq!(stats.max, Some(28.0));
        assert_eq!(stats.min, Some(5.0));
        assert_eq!(stats.distribution.excellent, 2);
        assert_eq!(stats.distribution.good, 0);
        assert_eq!(stats.distribution.average, 1);
        assert_eq!(stats.distribution.weak, 1);
    }

    #[test]
    fn test_identical_totals() {
        let records = records_with_totals(&[17.0, 17.0, 17.0]);
        let stats = compute_stats(&records);

        assert_eq!(stats.mean, Some(17.0));
        assert_eq!(stats.max, Some(17.0));
        assert_eq!(stats.min, Some(17.0));
        assert_eq!(stats.distribution.good, 3);
        assert_eq!(stats.distribution.total(), 3);
    }

    #[test]
    fn test_unparseable_total_is_counted_but_excluded() {
        let records: Vec<ScoreRecord> = serde_json::from_str(
            r#"[
                {"sbd": "0100001", "tong_diem": 20},
                {"sbd": "0100002", "tong_diem": "N/A"},
                {"sbd": "0100003", "tong_diem": "12.5"},
                {"sbd": "0100004", "tong_diem": 26}
            ]"#,
        )
        .unwrap();

        let stats = compute_stats(&records);

        assert_eq!(stats.count, 4);
        assert_eq!(stats.scored, 3);
        assert_eq!(stats.unscored(), 1);
        assert_eq!(stats.mean, Some(19.5));
        assert_eq!(stats.max, Some(26.0));
        assert_eq!(stats.min, Some(12.5));
        assert_eq!(stats.distribution.total(), 3);
    }

    #[test]
    fn test_only_unparseable_totals() {
        let records = vec![create_test_record("0100001", None)];
        let stats = compute_stats(&records);

        assert_eq!(stats.count, 1);
        assert_eq!(stats.mean, None);
        assert_eq!(stats.max, None);
        assert_eq!(stats.distribution.total(), 0);
    }

    #[test]
    fn test_mean_is_rounded() {
        let records = records_with_totals(&[10.0, 10.0, 11.0]);
        let stats = compute_stats(&records);
        assert_eq!(stats.mean, Some(10.33));
    }

    #[test]
    fn test_compute_stats_is_idempotent() {
        let records = records_with_totals(&[29.25, 3.5, 18.0, 11.0]);
        assert_eq!(compute_stats(&records), compute_stats(&records));
    }

    #[test]
    fn test_count_at_or_above() {
        let mut records = records_with_totals(&[28.0, 25.0, 21.0, 20.0, 19.75]);
        records.push(create_test_record("0100099", None));

        assert_eq!(count_at_or_above(&records, 25.0), 2);
        assert_eq!(count_at_or_above(&records, 20.0), 4);
    }

    #[test]
    fn test_rank_by_total_shares_ties() {
        let mut records = records_with_totals(&[20.0, 27.5, 27.5, 15.0]);
        records.insert(0, create_test_record("0100099", None));

        let ranked = rank_by_total(&records);
        let ranks: Vec<usize> = ranked.iter().map(|r| r.rank).collect();
        let numbers: Vec<&str> = ranked
            .iter()
            .map(|r| r.record.registration_number.as_str())
            .collect();

        assert_eq!(ranks, vec![1, 1, 3, 4, 5]);
        assert_eq!(
            numbers,
            vec!["0000002", "0000003", "0000001", "0000004", "0100099"]
        );
    }

    #[test]
    fn test_stats_by_council() {
        let mut records = records_with_totals(&[20.0, 10.0]);
        let mut other = create_test_record("0200001", Some(26.0));
        other.council_code = "02".to_string();
        records.push(other);

        let grouped = stats_by_council(&records);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["14"].count, 2);
        assert_eq!(grouped["14"].mean, Some(15.0));
        assert_eq!(grouped["02"].distribution.excellent, 1);
    }

    #[test]
    fn test_stats_by_council_matches_compute_stats() {
        let mut records = records_with_totals(&[24.5, 8.0]);
        records.push(create_test_record("0100098", None));
        let mut other = create_test_record("0300001", Some(17.0));
        other.council_code = "03".to_string();
        records.insert(1, other.clone());

        let grouped = stats_by_council(&records);
        let council_14: Vec<ScoreRecord> = records
            .iter()
            .filter(|r| r.council_code == "14")
            .cloned()
            .collect();

        assert_eq!(grouped["14"], compute_stats(&council_14));
        assert_eq!(grouped["14"].count, 3);
        assert_eq!(grouped["14"].unscored(), 1);
        assert_eq!(grouped["03"], compute_stats(&[other]));
    }
}
