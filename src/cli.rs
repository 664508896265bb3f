//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation of lookup inputs before any request is sent.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Highest total score on the exam scale.
pub const MAX_TOTAL_SCORE: f64 = 30.0;

/// Largest leaderboard the API serves.
pub const MAX_TOP_LIMIT: usize = 100;

/// Exam Lookup - entrance exam results from the command line
///
/// Look up a candidate by registration number (SBD), search many at once,
/// or run statistics by score range or examination council.
///
/// Examples:
///   exam-lookup lookup 0100001
///   exam-lookup bulk 0100001,0100002 0100003 --export-csv
///   exam-lookup range --min 25 --max 30 --format markdown
///   exam-lookup council 14
///   exam-lookup top --limit 10
///   exam-lookup --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Base URL of the score API
    ///
    /// Can also be set via EXAM_API_URL env var or .examlookup.toml config.
    #[arg(long, value_name = "URL", env = "EXAM_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .examlookup.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text, markdown, json)
    #[arg(short, long, value_name = "FORMAT", global = true)]
    pub format: Option<OutputFormat>,

    /// Write the result to a file instead of stdout
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .examlookup.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Lookup to perform.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Look up one candidate by registration number
    Lookup {
        /// Registration number (SBD), e.g. 0100001
        registration_number: String,
    },

    /// Look up many candidates at once
    Bulk {
        /// Registration numbers, separated by spaces, commas or newlines
        registration_numbers: Vec<String>,

        /// Read registration numbers from a file
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Export found candidates to CSV (default: ket-qua-tra-cuu-<date>.csv)
        #[arg(long, value_name = "FILE", num_args = 0..=1)]
        export_csv: Option<Option<PathBuf>>,
    },

    /// Statistics for candidates within a total-score range
    Range {
        /// Lowest total score
        #[arg(long, default_value_t = 0.0)]
        min: f64,

        /// Highest total score
        #[arg(long, default_value_t = MAX_TOTAL_SCORE)]
        max: f64,
    },

    /// Statistics for one examination council
    Council {
        /// Council code (mã hội đồng), e.g. 14
        code: String,
    },

    /// Leaderboard of the highest totals
    Top {
        /// Number of candidates to show (1-100, default from config)
        #[arg(short = 'n', long, value_name = "COUNT")]
        limit: Option<usize>,
    },

    /// Headline figures for the whole exam session
    Overview,

    /// Check that the score API is reachable
    Health,
}

/// Output format for results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain terminal text (default)
    #[default]
    Text,
    /// Markdown format
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match &self.command {
            None => Err("A command is required (try --help)".to_string()),
            Some(Command::Lookup {
                registration_number,
            }) => validate_registration_number(registration_number).map(|_| ()),
            Some(Command::Bulk {
                registration_numbers,
                file,
                ..
            }) => {
                if registration_numbers.is_empty() && file.is_none() {
                    return Err(
                        "Provide registration numbers as arguments or with --file".to_string()
                    );
                }
                Ok(())
            }
            Some(Command::Range { min, max }) => validate_score_range(*min, *max),
            Some(Command::Council { code }) => validate_council_code(code).map(|_| ()),
            Some(Command::Top { limit }) => match limit {
                Some(limit) => validate_top_limit(*limit),
                None => Ok(()),
            },
            Some(Command::Overview) | Some(Command::Health) => Ok(()),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

/// Trim a registration number and reject an empty one.
pub fn validate_registration_number(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Registration number must not be empty".to_string());
    }
    Ok(trimmed.to_string())
}

/// Trim a council code and reject an empty one.
pub fn validate_council_code(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Council code must not be empty".to_string());
    }
    Ok(trimmed.to_string())
}

/// A score range must satisfy `0 <= min <= max <= 30`.
pub fn validate_score_range(min: f64, max: f64) -> Result<(), String> {
    if !min.is_finite() || !max.is_finite() || min < 0.0 || max > MAX_TOTAL_SCORE || min > max {
        return Err(format!(
            "Invalid score range {}-{}: use values from 0 to {} with min <= max",
            min, max, MAX_TOTAL_SCORE
        ));
    }
    Ok(())
}

pub fn validate_top_limit(limit: usize) -> Result<(), String> {
    if limit == 0 || limit > MAX_TOP_LIMIT {
        return Err(format!("Limit must be between 1 and {}", MAX_TOP_LIMIT));
    }
    Ok(())
}

/// Split raw bulk input into registration numbers.
///
/// Entries may be separated by newlines, commas or whitespace. Empty entries
/// are dropped and duplicates keep their first position.
pub fn parse_registration_numbers<S: AsRef<str>>(inputs: &[S]) -> Vec<String> {
    let mut numbers: Vec<String> = Vec::new();

    for input in inputs {
        for entry in input
            .as_ref()
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
        {
            if !numbers.iter().any(|n| n == entry) {
                numbers.push(entry.to_string());
            }
        }
    }

    numbers
}

/// Check the size of a bulk lookup.
pub fn validate_bulk_count(count: usize, max_bulk: usize) -> Result<(), String> {
    if count == 0 {
        return Err("Enter at least one registration number".to_string());
    }
    if count > max_bulk {
        return Err(format!(
            "Too many registration numbers ({}): at most {} per lookup",
            count, max_bulk
        ));
    }
    Ok(())
}
