//! Exam Lookup - entrance exam results from the command line
//!
//! A CLI client for the exam score API: look up candidates by registration
//! number, run score-range and council statistics, and show the leaderboard.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid input, connection, API error, etc.)
//!   2 - The queried candidate or council was not found

mod analysis;
mod cli;
mod client;
mod config;
mod models;
mod report;

use anyhow::{anyhow, Context, Result};
use cli::{Args, Command, OutputFormat};
use client::{ApiClient, ApiError};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOT_FOUND: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(EXIT_ERROR);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_ERROR);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("Exam Lookup v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match source {
        ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
        ConfigSource::Defaults => debug!("No config file found, using defaults"),
        ConfigSource::Invalid(e) => warn!("Failed to load config, using defaults: {:#}", e),
    }

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Lookup failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(exit_code_for(&e));
        }
    }
}

/// Map a failed run to its exit code.
fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<ApiError>() {
        Some(api_error) if api_error.is_not_found() => EXIT_NOT_FOUND,
        _ => EXIT_ERROR,
    }
}

/// Handle --init-config: generate a default .examlookup.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(EXIT_ERROR);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the API URL, timeout and lookup limits.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Where the effective configuration came from.
enum ConfigSource {
    File(PathBuf),
    Defaults,
    Invalid(anyhow::Error),
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` file must load; a broken file in the working
/// directory only produces a warning.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::File(config_path.clone())));
    }

    match Config::load_from_dir(Path::new(".")) {
        Ok(Some(config)) => Ok((config, ConfigSource::File(PathBuf::from(CONFIG_FILE_NAME)))),
        Ok(None) => Ok((Config::default(), ConfigSource::Defaults)),
        Err(e) => Ok((Config::default(), ConfigSource::Invalid(e))),
    }
}

/// Run one lookup and print or save its result. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let format = config.general.format;
    let show_progress = !args.quiet && format != OutputFormat::Json;
    let command = args
        .command
        .clone()
        .ok_or_else(|| anyhow!("A command is required (try --help)"))?;

    let client = ApiClient::new(&config.api)?;
    let mut exit_code = EXIT_OK;

    let rendered = match command {
        Command::Lookup {
            registration_number,
        } => {
            let sbd = cli::validate_registration_number(&registration_number)
                .map_err(|e| anyhow!(e))?;
            let record = with_spinner(
                show_progress,
                format!("Looking up candidate {}...", sbd),
                client.student(&sbd),
            )
            .await?;
            report::render_student(&record, format)?
        }

        Command::Bulk {
            registration_numbers,
            file,
            export_csv,
        } => {
            let mut inputs = registration_numbers;
            if let Some(ref path) = file {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                inputs.push(content);
            }

            let numbers = cli::parse_registration_numbers(&inputs);
            cli::validate_bulk_count(numbers.len(), config.lookup.max_bulk)
                .map_err(|e| anyhow!(e))?;
            info!("Looking up {} registration numbers", numbers.len());

            let result = with_spinner(
                show_progress,
                format!("Looking up {} candidates...", numbers.len()),
                client.search_students(&numbers),
            )
            .await?;

            if let Some(path) = export_csv {
                save_csv(&result.found, path, args.quiet)?;
            }
            if !result.not_found.is_empty() {
                warn!(
                    "{} registration numbers were not found",
                    result.not_found.len()
                );
                exit_code = EXIT_NOT_FOUND;
            }

            report::render_bulk(&result, format)?
        }

        Command::Range { min, max } => {
            cli::validate_score_range(min, max).map_err(|e| anyhow!(e))?;
            let result = with_spinner(
                show_progress,
                "Computing score range statistics...".to_string(),
                client.score_range(min, max),
            )
            .await?;
            report::render_score_range(min, max, &result, format)?
        }

        Command::Council { code } => {
            let code = cli::validate_council_code(&code).map_err(|e| anyhow!(e))?;
            let result = with_spinner(
                show_progress,
                format!("Loading council {}...", code),
                client.council(&code),
            )
            .await?;
            report::render_council(&result, format)?
        }

        Command::Top { limit } => {
            let limit = limit.unwrap_or(config.lookup.top_limit);
            cli::validate_top_limit(limit).map_err(|e| anyhow!(e))?;
            let result = with_spinner(
                show_progress,
                format!("Loading top {}...", limit),
                client.top_scores(limit),
            )
            .await?;
            report::render_leaderboard(limit, &result, format)?
        }

        Command::Overview => {
            let (overview, health) = with_spinner(
                show_progress,
                "Loading overview...".to_string(),
                futures::future::join(client.overview(), client.health()),
            )
            .await;
            let overview = overview?;
            let health = match health {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Health check failed: {}", e);
                    None
                }
            };
            report::render_overview(
                client.base_url().as_str(),
                &overview,
                health.as_ref(),
                format,
            )?
        }

        Command::Health => {
            let health = with_spinner(
                show_progress,
                "Checking score API...".to_string(),
                client.health(),
            )
            .await?;
            report::render_health(client.base_url().as_str(), &health, format)?
        }
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write result to {}", path.display()))?;
            if !args.quiet {
                eprintln!("✅ Result saved to: {}", path.display());
            }
        }
        None => print!("{}", rendered),
    }

    Ok(exit_code)
}

/// Export found candidates to CSV, defaulting to a dated file name.
fn save_csv(records: &[models::ScoreRecord], path: Option<PathBuf>, quiet: bool) -> Result<()> {
    if records.is_empty() {
        warn!("No candidates found, skipping CSV export");
        return Ok(());
    }

    let path =
        path.unwrap_or_else(|| report::default_export_path(chrono::Local::now().date_naive()));
    report::export_csv(records, &path)?;
    info!("Exported {} candidates to {}", records.len(), path.display());

    if !quiet {
        eprintln!("📄 CSV saved to: {}", path.display());
    }
    Ok(())
}

/// Await `future` while showing a spinner on stderr.
async fn with_spinner<F: Future>(show: bool, message: String, future: F) -> F::Output {
    if !show {
        return future.await;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));

    let output = future.await;
    spinner.finish_and_clear();
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::serve_once;
    use tempfile::TempDir;

    fn make_args(command: Command) -> Args {
        Args {
            api_url: None,
            timeout: None,
            config: None,
            format: None,
            output: None,
            verbose: false,
            quiet: true,
            init_config: false,
            command: Some(command),
        }
    }

    fn config_for(base_url: &str) -> Config {
        let mut config = Config::default();
        config.api.base_url = base_url.to_string();
        config.api.timeout_seconds = 5;
        config.general.format = OutputFormat::Json;
        config
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_exit_code_for_not_found() {
        let err = anyhow::Error::new(ApiError::NotFound {
            what: "candidate 0100001".to_string(),
        });
        assert_eq!(exit_code_for(&err), EXIT_NOT_FOUND);

        let wrapped = anyhow::Error::new(ApiError::NotFound {
            what: "council 99".to_string(),
        })
        .context("Council statistics failed");
        assert_eq!(exit_code_for(&wrapped), EXIT_NOT_FOUND);
    }

    #[test]
    fn test_exit_code_for_other_errors() {
        let err = anyhow::Error::new(ApiError::Timeout { seconds: 10 });
        assert_eq!(exit_code_for(&err), EXIT_ERROR);
        assert_eq!(exit_code_for(&anyhow!("boom")), EXIT_ERROR);
    }

    #[test]
    fn test_with_spinner_hidden_returns_output() {
        let value = tokio_test::block_on(with_spinner(false, "x".to_string(), async { 42 }));
        assert_eq!(value, 42);
    }

    #[test]
    fn test_run_bulk_with_missing_numbers() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"success":true,"data":{"found":[{"sbd":"0100001","ho_ten":"Nguyen Van A","tong_diem":"21.5","ma_hd":"14"}],"notFound":["0100002"],"total":1}}"#,
        );
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("bulk.json");
        let csv_path = temp_dir.path().join("bulk.csv");

        let mut args = make_args(Command::Bulk {
            registration_numbers: vec!["0100001, 0100002".to_string()],
            file: None,
            export_csv: Some(Some(csv_path.clone())),
        });
        args.output = Some(output.clone());

        let exit_code = tokio_test::block_on(run(args, config_for(&url))).unwrap();
        let request = server.join().unwrap();

        assert_eq!(exit_code, EXIT_NOT_FOUND);
        assert!(request.contains(r#"{"sbds":["0100001","0100002"]}"#));

        let rendered = read_json(&output);
        assert_eq!(rendered["found"], 1);
        assert_eq!(rendered["missing"][0], "0100002");

        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert!(csv.contains("0100001,Nguyen Van A,,,,21.5,14"));
    }

    #[test]
    fn test_run_bulk_all_found() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"success":true,"data":{"found":[{"sbd":"0100001","tong_diem":20}],"notFound":[],"total":1}}"#,
        );
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("bulk.json");

        let mut args = make_args(Command::Bulk {
            registration_numbers: vec!["0100001".to_string()],
            file: None,
            export_csv: None,
        });
        args.output = Some(output.clone());

        let exit_code = tokio_test::block_on(run(args, config_for(&url))).unwrap();
        server.join().unwrap();

        assert_eq!(exit_code, EXIT_OK);
        assert_eq!(read_json(&output)["not_found"], 0);
    }

    #[test]
    fn test_run_top_uses_configured_limit() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"success":true,"data":{"students":[{"sbd":"0100001","tong_diem":28.5},{"sbd":"0100002","tong_diem":"26"}]}}"#,
        );
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("top.json");

        let mut config = config_for(&url);
        config.lookup.top_limit = 3;
        let mut args = make_args(Command::Top { limit: None });
        args.output = Some(output.clone());

        let exit_code = tokio_test::block_on(run(args, config)).unwrap();
        let request = server.join().unwrap();

        assert_eq!(exit_code, EXIT_OK);
        assert!(request.starts_with("GET /api/top-scores?limit=3 "));

        let rendered = read_json(&output);
        assert_eq!(rendered["limit"], 3);
        assert_eq!(rendered["at_or_above_25"], 2);
    }

    #[test]
    fn test_run_rejects_configured_top_limit_out_of_range() {
        let mut config = config_for("http://127.0.0.1:9");
        config.lookup.top_limit = 0;

        let err = tokio_test::block_on(run(make_args(Command::Top { limit: None }), config))
            .unwrap_err();

        assert!(err.to_string().contains("Limit must be between 1 and 100"));
        assert_eq!(exit_code_for(&err), EXIT_ERROR);
    }

    #[test]
    fn test_run_lookup_unknown_candidate_exits_not_found() {
        let (url, server) = serve_once("404 Not Found", r#"{"success":false}"#);

        let err = tokio_test::block_on(run(
            make_args(Command::Lookup {
                registration_number: " 0999999 ".to_string(),
            }),
            config_for(&url),
        ))
        .unwrap_err();
        let request = server.join().unwrap();

        assert!(request.starts_with("GET /api/student/0999999 "));
        assert_eq!(exit_code_for(&err), EXIT_NOT_FOUND);
    }

    #[test]
    fn test_run_missing_route_exits_with_error() {
        let (url, server) = serve_once("404 Not Found", "Cannot GET /api/top-scores");

        let err = tokio_test::block_on(run(
            make_args(Command::Top { limit: Some(10) }),
            config_for(&url),
        ))
        .unwrap_err();
        server.join().unwrap();

        assert_eq!(exit_code_for(&err), EXIT_ERROR);
    }
}
