//! Data models for exam score lookups.
//!
//! This module contains the candidate record as served by the score API,
//! the grade bands used to classify totals, and the response payloads of
//! the aggregate endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Grade band of a total score, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeBand {
    /// Total of 25 or more
    Excellent,
    /// Total in [17, 25)
    Good,
    /// Total in [11, 17)
    Average,
    /// Total below 11
    Weak,
}

impl fmt::Display for GradeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeBand::Excellent => write!(f, "Excellent"),
            GradeBand::Good => write!(f, "Good"),
            GradeBand::Average => write!(f, "Average"),
            GradeBand::Weak => write!(f, "Weak"),
        }
    }
}

impl GradeBand {
    /// All bands, in the order they are checked.
    pub const ALL: [GradeBand; 4] = [
        GradeBand::Excellent,
        GradeBand::Good,
        GradeBand::Average,
        GradeBand::Weak,
    ];

    /// Classify a total score.
    ///
    /// Thresholds are checked from the top down, so a score sitting exactly
    /// on a boundary belongs to the higher band.
    pub fn classify(score: f64) -> Self {
        if score >= 25.0 {
            GradeBand::Excellent
        } else if score >= 17.0 {
            GradeBand::Good
        } else if score >= 11.0 {
            GradeBand::Average
        } else {
            GradeBand::Weak
        }
    }

    /// Vietnamese label used on score reports.
    pub fn label(&self) -> &'static str {
        match self {
            GradeBand::Excellent => "Giỏi",
            GradeBand::Good => "Khá",
            GradeBand::Average => "Trung bình",
            GradeBand::Weak => "Yếu",
        }
    }

    /// Score interval covered by the band.
    pub fn range_label(&self) -> &'static str {
        match self {
            GradeBand::Excellent => "[25, 30]",
            GradeBand::Good => "[17, 25)",
            GradeBand::Average => "[11, 17)",
            GradeBand::Weak => "< 11",
        }
    }
}

/// Highlight tier used on the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTier {
    Standard,
    Strong,
    High,
    Outstanding,
}

impl ScoreTier {
    pub fn for_score(score: f64) -> Self {
        if score >= 28.0 {
            ScoreTier::Outstanding
        } else if score >= 25.0 {
            ScoreTier::High
        } else if score >= 20.0 {
            ScoreTier::Strong
        } else {
            ScoreTier::Standard
        }
    }

    /// Returns an emoji representation of the tier.
    pub fn emoji(&self) -> &'static str {
        match self {
            ScoreTier::Outstanding => "🟣",
            ScoreTier::High => "🟢",
            ScoreTier::Strong => "🔵",
            ScoreTier::Standard => "⚪",
        }
    }
}

/// Podium position on the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
}

impl Medal {
    pub fn for_rank(rank: usize) -> Option<Self> {
        match rank {
            1 => Some(Medal::Gold),
            2 => Some(Medal::Silver),
            3 => Some(Medal::Bronze),
            _ => None,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Medal::Gold => "🥇",
            Medal::Silver => "🥈",
            Medal::Bronze => "🥉",
        }
    }
}

/// One candidate's exam result.
///
/// Field aliases match the wire names used by the score API. Scores are
/// parsed once here: anything that is not a finite number becomes `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Registration number (SBD), the primary lookup key.
    #[serde(alias = "sbd", deserialize_with = "lenient_string")]
    pub registration_number: String,
    /// Candidate's full name.
    #[serde(default, alias = "ho_ten", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Mathematics score (0-10).
    #[serde(default, alias = "diem_toan", deserialize_with = "lenient_score")]
    pub math_score: Option<f64>,
    /// Literature score (0-10).
    #[serde(default, alias = "diem_van", deserialize_with = "lenient_score")]
    pub literature_score: Option<f64>,
    /// Foreign language score (0-10).
    #[serde(default, alias = "diem_nn", deserialize_with = "lenient_score")]
    pub foreign_language_score: Option<f64>,
    /// Total score (0-30), as supplied by the server.
    #[serde(default, alias = "tong_diem", deserialize_with = "lenient_score")]
    pub total_score: Option<f64>,
    /// Examination council code.
    #[serde(default, alias = "ma_hd", deserialize_with = "lenient_string")]
    pub council_code: String,
    /// Date of birth, display only.
    #[serde(default, alias = "ngay_sinh", skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
}

impl ScoreRecord {
    /// Grade band of the total, if the total is known.
    pub fn grade_band(&self) -> Option<GradeBand> {
        self.total_score.map(GradeBand::classify)
    }

    /// Display name, falling back to the registration number.
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.registration_number,
        }
    }
}

/// Parse a score from its textual representation.
pub fn parse_score(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|score| score.is_finite())
}

/// Parse a score from a JSON value (number or numeric string).
pub fn parse_score_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|score| score.is_finite()),
        Value::String(s) => parse_score(s),
        _ => None,
    }
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_score_value))
}

/// Parse a count from a JSON value (non-negative integer or numeric string).
pub fn parse_count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_count_value))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {}",
            other
        ))),
    }
}

/// Count of records per grade band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GradeDistribution {
    pub excellent: usize,
    pub good: usize,
    pub average: usize,
    pub weak: usize,
}

impl GradeDistribution {
    /// Count one record in the given band.
    pub fn record(&mut self, band: GradeBand) {
        match band {
            GradeBand::Excellent => self.excellent += 1,
            GradeBand::Good => self.good += 1,
            GradeBand::Average => self.average += 1,
            GradeBand::Weak => self.weak += 1,
        }
    }

    pub fn get(&self, band: GradeBand) -> usize {
        match band {
            GradeBand::Excellent => self.excellent,
            GradeBand::Good => self.good,
            GradeBand::Average => self.average,
            GradeBand::Weak => self.weak,
        }
    }

    /// Number of classified records.
    pub fn total(&self) -> usize {
        self.excellent + self.good + self.average + self.weak
    }

    /// Bands with their counts, highest band first.
    pub fn iter(&self) -> impl Iterator<Item = (GradeBand, usize)> + '_ {
        GradeBand::ALL.into_iter().map(move |band| (band, self.get(band)))
    }
}

/// Summary statistics over a list of records.
///
/// `mean`, `max` and `min` are `None` when no record carries a usable total.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    /// Number of records, including those without a usable total.
    pub count: usize,
    /// Number of records with a usable total.
    pub scored: usize,
    /// Mean total, rounded to 2 decimal places.
    pub mean: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub distribution: GradeDistribution,
}

impl AggregateStats {
    /// Records that were excluded from the numeric aggregates.
    pub fn unscored(&self) -> usize {
        self.count - self.scored
    }
}

/// Headline figures of the whole exam session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_students: Option<u64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub avg_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub max_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub min_score: Option<f64>,
}

/// Result of a bulk lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkSearchResult {
    #[serde(default)]
    pub found: Vec<ScoreRecord>,
    /// Registration numbers the server did not recognise.
    #[serde(default, rename(deserialize = "notFound"), alias = "not_found")]
    pub not_found: Vec<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total: Option<u64>,
}

/// Candidates whose totals fall within a score range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRangeResult {
    /// Range description as reported by the server.
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub count: Option<u64>,
    #[serde(default)]
    pub students: Vec<ScoreRecord>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub max_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub min_score: Option<f64>,
}

/// Candidates of one examination council.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CouncilResult {
    #[serde(alias = "ma_hd", default, deserialize_with = "lenient_string")]
    pub council_code: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_students: Option<u64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub avg_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub max_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub students: Vec<ScoreRecord>,
}

/// Highest-scoring candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopScoresResult {
    #[serde(default)]
    pub students: Vec<ScoreRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_grade_band_boundaries() {
        assert_eq!(GradeBand::classify(25.0), GradeBand::Excellent);
        assert_eq!(GradeBand::classify(24.999), GradeBand::Good);
        assert_eq!(GradeBand::classify(17.0), GradeBand::Good);
        assert_eq!(GradeBand::classify(16.999), GradeBand::Average);
        assert_eq!(GradeBand::classify(11.0), GradeBand::Average);
        assert_eq!(GradeBand::classify(10.999), GradeBand::Weak);
        assert_eq!(GradeBand::classify(0.0), GradeBand::Weak);
        assert_eq!(GradeBand::classify(30.0), GradeBand::Excellent);
    }

    #[test]
    fn test_grade_band_labels() {
        assert_eq!(GradeBand::Excellent.label(), "Giỏi");
        assert_eq!(GradeBand::Good.label(), "Khá");
        assert_eq!(GradeBand::Average.label(), "Trung bình");
        assert_eq!(GradeBand::Weak.label(), "Yếu");
    }

    #[test]
    fn test_score_tier() {
        assert_eq!(ScoreTier::for_score(28.0), ScoreTier::Outstanding);
        assert_eq!(ScoreTier::for_score(27.9), ScoreTier::High);
        assert_eq!(ScoreTier::for_score(20.0), ScoreTier::Strong);
        assert_eq!(ScoreTier::for_score(19.5), ScoreTier::Standard);
    }

    #[test]
    fn test_medal_for_rank() {
        assert_eq!(Medal::for_rank(1), Some(Medal::Gold));
        assert_eq!(Medal::for_rank(3), Some(Medal::Bronze));
        assert_eq!(Medal::for_rank(4), None);
        assert_eq!(Medal::for_rank(0), None);
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("8.75"), Some(8.75));
        assert_eq!(parse_score(" 25 "), Some(25.0));
        assert_eq!(parse_score("N/A"), None);
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("NaN"), None);
        assert_eq!(parse_score("inf"), None);
    }

    #[test]
    fn test_record_from_api_payload() {
        let record: ScoreRecord = serde_json::from_value(json!({
            "sbd": "0100001",
            "ho_ten": "Nguyễn Văn A",
            "diem_toan": 8.5,
            "diem_van": "7.25",
            "diem_nn": null,
            "tong_diem": "24.5",
            "ma_hd": "14",
            "ngay_sinh": "01/02/2009"
        }))
        .unwrap();

        assert_eq!(record.registration_number, "0100001");
        assert_eq!(record.full_name.as_deref(), Some("Nguyễn Văn A"));
        assert_eq!(record.math_score, Some(8.5));
        assert_eq!(record.literature_score, Some(7.25));
        assert_eq!(record.foreign_language_score, None);
        assert_eq!(record.total_score, Some(24.5));
        assert_eq!(record.council_code, "14");
        assert_eq!(record.grade_band(), Some(GradeBand::Good));
    }

    #[test]
    fn test_record_with_unparseable_total() {
        let record: ScoreRecord = serde_json::from_value(json!({
            "sbd": 100002,
            "tong_diem": "N/A"
        }))
        .unwrap();

        assert_eq!(record.registration_number, "100002");
        assert_eq!(record.total_score, None);
        assert_eq!(record.grade_band(), None);
        assert_eq!(record.council_code, "");
        assert_eq!(record.display_name(), "100002");
    }

    #[test]
    fn test_record_requires_registration_number() {
        let result = serde_json::from_value::<ScoreRecord>(json!({ "tong_diem": 20 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_bulk_result_not_found_field() {
        let result: BulkSearchResult = serde_json::from_value(json!({
            "found": [{ "sbd": "0100001", "tong_diem": 20 }],
            "notFound": ["0999999"],
            "total": 1
        }))
        .unwrap();

        assert_eq!(result.found.len(), 1);
        assert_eq!(result.not_found, vec!["0999999"]);
        assert_eq!(result.total, Some(1));
    }

    #[test]
    fn test_counts_accept_numeric_strings() {
        let council: CouncilResult = serde_json::from_str(
            r#"{"ma_hd":"14","total_students":"2","avg_score":"20.5","students":[]}"#,
        )
        .unwrap();
        assert_eq!(council.total_students, Some(2));

        let range: ScoreRangeResult =
            serde_json::from_str(r#"{"count":" 3 ","students":[]}"#).unwrap();
        assert_eq!(range.count, Some(3));

        let overview: Overview =
            serde_json::from_str(r#"{"total_students":"N/A","avg_score":18}"#).unwrap();
        assert_eq!(overview.total_students, None);

        let bulk: BulkSearchResult =
            serde_json::from_str(r#"{"found":[],"notFound":[],"total":null}"#).unwrap();
        assert_eq!(bulk.total, None);
    }

    #[test]
    fn test_distribution_iter_order() {
        let mut distribution = GradeDistribution::default();
        distribution.record(GradeBand::Weak);
        distribution.record(GradeBand::Excellent);
        distribution.record(GradeBand::Excellent);

        let bands: Vec<_> = distribution.iter().collect();
        assert_eq!(bands[0], (GradeBand::Excellent, 2));
        assert_eq!(bands[3], (GradeBand::Weak, 1));
        assert_eq!(distribution.total(), 3);
    }
}
