//! Result rendering.
//!
//! Each lookup has one renderer producing plain text, Markdown or JSON.
//! Statistics shown by every view come from
//! [`compute_stats`](crate::analysis::compute_stats); figures reported by
//! the server are only mentioned when they disagree with the records.

use crate::analysis::{compute_stats, count_at_or_above, rank_by_total, stats_by_council, RankedRecord};
use crate::cli::OutputFormat;
use crate::models::{
    AggregateStats, BulkSearchResult, CouncilResult, GradeBand, Medal, Overview, ScoreRangeResult,
    ScoreRecord, ScoreTier, TopScoresResult,
};
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;

/// Placeholder for missing values.
const NOT_AVAILABLE: &str = "N/A";

/// Format a score as supplied: shortest exact form, no trailing zeros.
pub fn format_score(score: Option<f64>) -> String {
    score
        .map(|s| s.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Format a mean with two decimals.
pub fn format_mean(mean: Option<f64>) -> String {
    mean.map(|m| format!("{:.2}", m))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn format_band(band: Option<GradeBand>) -> String {
    match band {
        Some(band) => format!("{} ({})", band, band.label()),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn or_na(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => NOT_AVAILABLE,
    }
}

/// Markup used by the text and Markdown renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Text,
    Markdown,
}

/// Small document builder shared by the text and Markdown renderers.
struct Document {
    style: Style,
    out: String,
}

impl Document {
    fn new(style: Style) -> Self {
        Self {
            style,
            out: String::new(),
        }
    }

    fn heading(&mut self, level: usize, title: &str) {
        match self.style {
            Style::Markdown => {
                self.out.push_str(&"#".repeat(level));
                self.out.push(' ');
                self.out.push_str(title);
                self.out.push_str("\n\n");
            }
            Style::Text => {
                let underline = if level == 1 { '=' } else { '-' };
                self.out.push_str(title);
                self.out.push('\n');
                self.out
                    .push_str(&underline.to_string().repeat(title.chars().count()));
                self.out.push_str("\n\n");
            }
        }
    }

    fn field(&mut self, label: &str, value: impl Display) {
        match self.style {
            Style::Markdown => self.out.push_str(&format!("- **{}:** {}\n", label, value)),
            Style::Text => self.out.push_str(&format!("  {:<16} {}\n", format!("{}:", label), value)),
        }
    }

    fn paragraph(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push_str("\n\n");
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        match self.style {
            Style::Markdown => {
                self.out.push_str(&format!("| {} |\n", headers.join(" | ")));
                let align: Vec<&str> = headers.iter().map(|_| ":---").collect();
                self.out.push_str(&format!("|{}|\n", align.join("|")));
                for row in rows {
                    self.out.push_str(&format!("| {} |\n", row.join(" | ")));
                }
            }
            Style::Text => {
                let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
                for row in rows {
                    for (i, cell) in row.iter().enumerate() {
                        if let Some(width) = widths.get_mut(i) {
                            *width = (*width).max(cell.chars().count());
                        }
                    }
                }

                let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
                self.out.push_str(&text_row(&header, &widths));
                let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
                self.out.push_str(&text_row(&rule, &widths));
                for row in rows {
                    self.out.push_str(&text_row(row, &widths));
                }
            }
        }
        self.out.push('\n');
    }

    fn footer(&mut self) {
        if self.style == Style::Markdown {
            self.out.push_str("---\n\n");
            self.out.push_str(&format!(
                "*Generated by exam-lookup on {}*\n",
                chrono::Local::now().format("%Y-%m-%d %H:%M")
            ));
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

fn text_row(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect();
    format!("  {}\n", padded.join("  ").trim_end())
}

fn style_for(format: OutputFormat) -> Style {
    match format {
        OutputFormat::Markdown => Style::Markdown,
        _ => Style::Text,
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

/// Summary figures and grade distribution.
fn write_stats(doc: &mut Document, stats: &AggregateStats) {
    doc.field("Candidates", stats.count);
    doc.field("Average", format_mean(stats.mean));
    doc.field("Highest", format_score(stats.max));
    doc.field("Lowest", format_score(stats.min));
    if stats.unscored() > 0 {
        doc.field("Without total", stats.unscored());
    }
    doc.blank();

    if stats.scored > 0 {
        doc.heading(3, "Grade distribution");
        let rows: Vec<Vec<String>> = stats
            .distribution
            .iter()
            .map(|(band, count)| {
                vec![
                    format!("{} ({})", band, band.label()),
                    band.range_label().to_string(),
                    count.to_string(),
                ]
            })
            .collect();
        doc.table(&["Grade", "Total", "Candidates"], &rows);
    }
}

fn record_row(record: &ScoreRecord) -> Vec<String> {
    vec![
        record.registration_number.clone(),
        or_na(record.full_name.as_deref()).to_string(),
        format_score(record.math_score),
        format_score(record.literature_score),
        format_score(record.foreign_language_score),
        format_score(record.total_score),
        format_band(record.grade_band()),
        or_na(Some(record.council_code.as_str())).to_string(),
    ]
}

const RECORD_HEADERS: [&str; 8] = [
    "SBD", "Name", "Math", "Literature", "Language", "Total", "Grade", "Council",
];

fn write_records(doc: &mut Document, title: &str, records: &[ScoreRecord]) {
    if records.is_empty() {
        return;
    }
    doc.heading(2, &format!("{} ({})", title, records.len()));
    let rows: Vec<Vec<String>> = records.iter().map(record_row).collect();
    doc.table(&RECORD_HEADERS, &rows);
}

fn write_reported_total(doc: &mut Document, reported: Option<u64>, stats: &AggregateStats) {
    if let Some(reported) = reported {
        if reported as usize != stats.count {
            doc.paragraph(&format!(
                "The server reports {} candidates; {} were returned.",
                reported, stats.count
            ));
        }
    }
}

#[derive(Serialize)]
struct StudentJson<'a> {
    #[serde(flatten)]
    record: &'a ScoreRecord,
    grade_band: Option<GradeBand>,
}

/// Render a single candidate's result card.
pub fn render_student(record: &ScoreRecord, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(&StudentJson {
            record,
            grade_band: record.grade_band(),
        });
    }

    let mut doc = Document::new(style_for(format));
    doc.heading(1, &format!("Exam result: {}", record.display_name()));
    doc.field("SBD", &record.registration_number);
    if let Some(ref name) = record.full_name {
        doc.field("Name", name);
    }
    doc.field("Math", format_score(record.math_score));
    doc.field("Literature", format_score(record.literature_score));
    doc.field("Language", format_score(record.foreign_language_score));
    doc.field("Total", format_score(record.total_score));
    doc.field("Grade", format_band(record.grade_band()));
    if !record.council_code.is_empty() {
        doc.field("Council", &record.council_code);
    }
    if let Some(ref dob) = record.date_of_birth {
        doc.field("Date of birth", dob);
    }
    doc.blank();
    doc.footer();

    Ok(doc.finish())
}

#[derive(Serialize)]
struct BulkJson<'a> {
    requested: usize,
    found: usize,
    not_found: usize,
    stats: AggregateStats,
    by_council: std::collections::BTreeMap<String, AggregateStats>,
    records: &'a [ScoreRecord],
    missing: &'a [String],
}

/// Render the outcome of a bulk lookup.
pub fn render_bulk(result: &BulkSearchResult, format: OutputFormat) -> Result<String> {
    let stats = compute_stats(&result.found);
    let requested = result.found.len() + result.not_found.len();

    if format == OutputFormat::Json {
        return to_json(&BulkJson {
            requested,
            found: result.found.len(),
            not_found: result.not_found.len(),
            stats,
            by_council: stats_by_council(&result.found),
            records: &result.found,
            missing: &result.not_found,
        });
    }

    let mut doc = Document::new(style_for(format));
    doc.heading(1, "Bulk lookup");
    doc.field("Found", result.found.len());
    doc.field("Not found", result.not_found.len());
    doc.field("Total", result.total.map_or(requested, |t| t as usize));
    doc.blank();

    if !result.found.is_empty() {
        doc.heading(2, "Statistics");
        write_stats(&mut doc, &stats);

        let by_council = stats_by_council(&result.found);
        if by_council.len() > 1 {
            doc.heading(3, "By council");
            let rows: Vec<Vec<String>> = by_council
                .iter()
                .map(|(code, stats)| {
                    vec![
                        or_na(Some(code.as_str())).to_string(),
                        stats.count.to_string(),
                        format_mean(stats.mean),
                        format_score(stats.max),
                    ]
                })
                .collect();
            doc.table(&["Council", "Candidates", "Average", "Highest"], &rows);
        }
    }

    write_records(&mut doc, "Candidates found", &result.found);

    if !result.not_found.is_empty() {
        doc.heading(2, &format!("Not found ({})", result.not_found.len()));
        doc.paragraph(&result.not_found.join(", "));
        doc.paragraph("Check these registration numbers and try again.");
    }

    doc.footer();
    Ok(doc.finish())
}

#[derive(Serialize)]
struct RangeJson<'a> {
    min: f64,
    max: f64,
    reported_count: Option<u64>,
    stats: AggregateStats,
    records: &'a [ScoreRecord],
}

/// Render statistics for a score range.
pub fn render_score_range(
    min: f64,
    max: f64,
    result: &ScoreRangeResult,
    format: OutputFormat,
) -> Result<String> {
    let stats = compute_stats(&result.students);

    if format == OutputFormat::Json {
        return to_json(&RangeJson {
            min,
            max,
            reported_count: result.count,
            stats,
            records: &result.students,
        });
    }

    let range = result
        .range
        .clone()
        .unwrap_or_else(|| format!("{}-{}", format_score(Some(min)), format_score(Some(max))));

    let mut doc = Document::new(style_for(format));
    doc.heading(1, &format!("Score range {}", range));
    write_stats(&mut doc, &stats);
    write_reported_total(&mut doc, result.count, &stats);

    if result.students.is_empty() {
        doc.paragraph("No candidates in this range.");
    }
    write_records(&mut doc, "Candidates", &result.students);

    doc.footer();
    Ok(doc.finish())
}

#[derive(Serialize)]
struct CouncilJson<'a> {
    council_code: &'a str,
    reported_total: Option<u64>,
    stats: AggregateStats,
    records: &'a [ScoreRecord],
}

/// Render statistics for one examination council.
pub fn render_council(result: &CouncilResult, format: OutputFormat) -> Result<String> {
    let stats = compute_stats(&result.students);

    if format == OutputFormat::Json {
        return to_json(&CouncilJson {
            council_code: &result.council_code,
            reported_total: result.total_students,
            stats,
            records: &result.students,
        });
    }

    let mut doc = Document::new(style_for(format));
    doc.heading(1, &format!("Council {}", result.council_code));
    write_stats(&mut doc, &stats);
    write_reported_total(&mut doc, result.total_students, &stats);
    write_records(&mut doc, "Candidates", &result.students);

    doc.footer();
    Ok(doc.finish())
}

#[derive(Serialize)]
struct LeaderboardEntry<'a> {
    #[serde(flatten)]
    ranked: RankedRecord<'a>,
    medal: Option<Medal>,
    tier: Option<ScoreTier>,
}

#[derive(Serialize)]
struct LeaderboardJson<'a> {
    limit: usize,
    highest: Option<f64>,
    mean: Option<f64>,
    at_or_above_25: usize,
    at_or_above_20: usize,
    ranking: Vec<LeaderboardEntry<'a>>,
}

/// Render the leaderboard of the highest totals.
pub fn render_leaderboard(
    limit: usize,
    result: &TopScoresResult,
    format: OutputFormat,
) -> Result<String> {
    let stats = compute_stats(&result.students);
    let ranking: Vec<LeaderboardEntry<'_>> = rank_by_total(&result.students)
        .into_iter()
        .map(|ranked| LeaderboardEntry {
            medal: Medal::for_rank(ranked.rank),
            tier: ranked.record.total_score.map(ScoreTier::for_score),
            ranked,
        })
        .collect();
    let at_or_above_25 = count_at_or_above(&result.students, 25.0);
    let at_or_above_20 = count_at_or_above(&result.students, 20.0);

    if format == OutputFormat::Json {
        return to_json(&LeaderboardJson {
            limit,
            highest: stats.max,
            mean: stats.mean,
            at_or_above_25,
            at_or_above_20,
            ranking,
        });
    }

    let mut doc = Document::new(style_for(format));
    doc.heading(1, &format!("Top {} totals", limit));

    if ranking.is_empty() {
        doc.paragraph("No results yet.");
        doc.footer();
        return Ok(doc.finish());
    }

    let rows: Vec<Vec<String>> = ranking
        .iter()
        .map(|entry| {
            let position = match entry.medal {
                Some(medal) => format!("{} {}", medal.emoji(), entry.ranked.rank),
                None => entry.ranked.rank.to_string(),
            };
            let total = match entry.tier {
                Some(tier) => format!(
                    "{} {}",
                    tier.emoji(),
                    format_score(entry.ranked.record.total_score)
                ),
                None => format_score(entry.ranked.record.total_score),
            };
            vec![
                position,
                entry.ranked.record.registration_number.clone(),
                or_na(entry.ranked.record.full_name.as_deref()).to_string(),
                total,
                or_na(Some(entry.ranked.record.council_code.as_str())).to_string(),
            ]
        })
        .collect();
    doc.table(&["Rank", "SBD", "Name", "Total", "Council"], &rows);

    doc.heading(2, &format!("Top {} summary", limit));
    doc.field("Highest", format_score(stats.max));
    doc.field("Average", format_mean(stats.mean));
    doc.field("Total >= 25", at_or_above_25);
    doc.field("Total >= 20", at_or_above_20);
    doc.blank();

    doc.footer();
    Ok(doc.finish())
}

#[derive(Serialize)]
struct OverviewJson<'a> {
    api_url: &'a str,
    overview: &'a Overview,
    health: Option<&'a Value>,
}

/// Render headline figures and API health.
pub fn render_overview(
    api_url: &str,
    overview: &Overview,
    health: Option<&Value>,
    format: OutputFormat,
) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(&OverviewJson {
            api_url,
            overview,
            health,
        });
    }

    let mut doc = Document::new(style_for(format));
    doc.heading(1, "Exam overview");
    doc.field(
        "Candidates",
        overview
            .total_students
            .map_or_else(|| NOT_AVAILABLE.to_string(), |n| n.to_string()),
    );
    doc.field("Average", format_mean(overview.avg_score));
    doc.field("Highest", format_score(overview.max_score));
    doc.field("Lowest", format_score(overview.min_score));
    doc.field("API", api_url);
    doc.field("API status", health_summary(health));
    doc.blank();

    doc.footer();
    Ok(doc.finish())
}

/// Render a health check response.
pub fn render_health(api_url: &str, health: &Value, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(health);
    }

    let mut doc = Document::new(style_for(format));
    doc.heading(1, "Score API health");
    doc.field("API", api_url);
    doc.field("Status", health_summary(Some(health)));
    if let Value::Object(map) = health {
        for (key, value) in map {
            if key == "status" {
                continue;
            }
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            doc.field(key, shown);
        }
    }
    doc.blank();

    Ok(doc.finish())
}

fn health_summary(health: Option<&Value>) -> String {
    match health {
        None => "unreachable".to_string(),
        Some(value) => match value.get("status").and_then(Value::as_str) {
            Some(status) => status.to_string(),
            None => "ok".to_string(),
        },
    }
}
