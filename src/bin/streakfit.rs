//! Streakfit CLI - Command-line interface for the Streakfit engine
//!
//! Commands:
//! - add / set / remove: log, edit or delete today's exercise actions
//! - status / stats / summary / history / records: inspect state
//! - settings / check-goal / next: manage and preview the adaptive goal
//! - replay: run a timestamped NDJSON action stream in one session
//! - catalog: list known exercises

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use streakfit::stats::{exercise_totals, period_summary, streak_summary};
use streakfit::types::parse_date;
use streakfit::{FileStore, TrackerConfig, TrackerError, WorkoutTracker, STREAKFIT_VERSION};

/// Streakfit - adaptive workout goals, records and streaks
#[derive(Parser)]
#[command(name = "streakfit")]
#[command(version = STREAKFIT_VERSION)]
#[command(about = "Track workout points against an adaptive daily goal", long_about = None)]
struct Cli {
    /// Directory holding the stored state
    #[arg(long, global = true, default_value = "streakfit-data")]
    data_dir: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Evaluate at this instant instead of the current time (RFC 3339)
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Log engine decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add exercise units to today
    Add {
        /// Exercise id (see `catalog`)
        exercise: String,
        /// Units to add
        count: u32,
    },

    /// Set today's count for an exercise
    Set {
        exercise: String,
        count: u32,
    },

    /// Remove a history entry dated today
    Remove {
        /// History entry id
        entry_id: String,
    },

    /// Show today's progress
    Status,

    /// Per-day statistics ending today
    Stats {
        /// Number of days
        #[arg(long, default_value = "14")]
        days: usize,
    },

    /// Period totals, goal streak and per-exercise totals
    Summary {
        /// Number of days
        #[arg(long, default_value = "14")]
        days: usize,
    },

    /// Show exercise history
    History {
        /// Only entries for this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Show per-exercise records
    Records,

    /// Show or change settings
    Settings {
        /// Days between training days
        #[arg(long)]
        frequency: Option<u32>,
        /// Current goal in points
        #[arg(long)]
        goal: Option<u32>,
        /// Cadence start date (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,
    },

    /// Apply the goal adjustment for the latest day transition
    CheckGoal,

    /// Next training day and its expected goal
    Next,

    /// Replay a timestamped NDJSON action stream
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Flush output after each action
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// List known exercises
    Catalog,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), StreakfitCliError> {
    let config = load_config(cli.config.as_deref())?;
    let now = cli.now.unwrap_or_else(Utc::now);
    let store = FileStore::open(&cli.data_dir)?;
    let mut tracker = WorkoutTracker::with_config(store, config.clone(), config.local_date(now))?;
    let pretty = cli.pretty;

    match cli.command {
        Commands::Add { exercise, count } => {
            check_exercise(&tracker, &exercise)?;
            emit(&tracker.add_exercise(&exercise, count, now)?, pretty)
        }

        Commands::Set { exercise, count } => {
            check_exercise(&tracker, &exercise)?;
            tracker.set_exercise_count(&exercise, count, now)?;
            emit(&tracker.status(now), pretty)
        }

        Commands::Remove { entry_id } => {
            emit(&tracker.remove_history_entry(&entry_id, now)?, pretty)
        }

        Commands::Status => emit(&tracker.status(now), pretty),

        Commands::Stats { days } => emit(&tracker.stats(days, now), pretty),

        Commands::Summary { days } => {
            let stats = tracker.stats(days, now);
            let report = SummaryReport {
                period: period_summary(&stats),
                streak: streak_summary(&stats),
                exercises: exercise_totals(&stats, tracker.daily_records(), tracker.catalog()),
            };
            emit(&report, pretty)
        }

        Commands::History { date } => match date {
            Some(date) => {
                let date = parse_date(&date)?;
                emit(&tracker.history().entries_for_date(date), pretty)
            }
            None => emit(tracker.history().entries(), pretty),
        },

        Commands::Records => emit(tracker.exercise_records().records(), pretty),

        Commands::Settings {
            frequency,
            goal,
            start_date,
        } => {
            if frequency.is_some() || goal.is_some() || start_date.is_some() {
                let mut settings = tracker.settings().clone();
                if let Some(frequency) = frequency {
                    settings.training_frequency = frequency;
                }
                if let Some(goal) = goal {
                    settings.current_goal = goal;
                }
                if let Some(start_date) = start_date {
                    settings.start_date = parse_date(&start_date)?;
                }
                tracker.update_settings(settings)?;
            }
            emit(tracker.settings(), pretty)
        }

        Commands::CheckGoal => emit(&tracker.check_goal_adjustment(now)?, pretty),

        Commands::Next => emit(&tracker.next_training(now), pretty),

        Commands::Replay { input, flush } => cmd_replay(&mut tracker, &input, flush),

        Commands::Catalog => emit(tracker.catalog(), pretty),
    }
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig, StreakfitCliError> {
    match path {
        Some(path) => Ok(TrackerConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(TrackerConfig::default()),
    }
}

fn check_exercise(
    tracker: &WorkoutTracker<FileStore>,
    exercise_id: &str,
) -> Result<(), StreakfitCliError> {
    if tracker.catalog().iter().any(|e| e.id == exercise_id) {
        Ok(())
    } else {
        Err(StreakfitCliError::UnknownExercise(exercise_id.to_string()))
    }
}

fn emit<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<(), StreakfitCliError> {
    let json = if pretty || atty::is(atty::Stream::Stdout) {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct SummaryReport {
    period: streakfit::stats::PeriodSummary,
    streak: streakfit::stats::StreakSummary,
    exercises: Vec<streakfit::stats::ExerciseTotal>,
}

// Replay

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ReplayAction {
    Add { exercise_id: String, count: u32 },
    Set { exercise_id: String, count: u32 },
    Remove { entry_id: String },
    EndSeries,
    Poll,
    CheckGoal,
}

#[derive(Debug, Deserialize)]
struct ReplayLine {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    action: ReplayAction,
}

fn cmd_replay(
    tracker: &mut WorkoutTracker<FileStore>,
    input: &Path,
    flush: bool,
) -> Result<(), StreakfitCliError> {
    let reader: Box<dyn BufRead> = if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(StreakfitCliError::NoInput);
        }
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(fs::File::open(input)?))
    };

    let mut stdout = io::stdout();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let ReplayLine { timestamp, action } = serde_json::from_str(trimmed).map_err(|e| {
            StreakfitCliError::ParseError(format!("line {}: {}", index + 1, e))
        })?;

        let result = match action {
            ReplayAction::Add { exercise_id, count } => {
                serde_json::to_value(tracker.add_exercise(&exercise_id, count, timestamp)?)?
            }
            ReplayAction::Set { exercise_id, count } => serde_json::to_value(
                tracker.set_exercise_count(&exercise_id, count, timestamp)?,
            )?,
            ReplayAction::Remove { entry_id } => {
                serde_json::to_value(tracker.remove_history_entry(&entry_id, timestamp)?)?
            }
            ReplayAction::EndSeries => serde_json::to_value(tracker.end_series())?,
            ReplayAction::Poll => serde_json::to_value(tracker.poll_series(timestamp))?,
            ReplayAction::CheckGoal => {
                serde_json::to_value(tracker.check_goal_adjustment(timestamp)?)?
            }
        };

        let record = serde_json::json!({ "timestamp": timestamp, "result": result });
        writeln!(stdout, "{}", serde_json::to_string(&record)?)?;
        if flush {
            stdout.flush()?;
        }
    }

    stdout.flush()?;
    Ok(())
}

// Error types

#[derive(Debug)]
enum StreakfitCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Json(serde_json::Error),
    UnknownExercise(String),
    NoInput,
    ParseError(String),
}

impl From<io::Error> for StreakfitCliError {
    fn from(e: io::Error) -> Self {
        StreakfitCliError::Io(e)
    }
}

impl From<TrackerError> for StreakfitCliError {
    fn from(e: TrackerError) -> Self {
        StreakfitCliError::Tracker(e)
    }
}

impl From<serde_json::Error> for StreakfitCliError {
    fn from(e: serde_json::Error) -> Self {
        StreakfitCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StreakfitCliError> for CliError {
    fn from(e: StreakfitCliError) -> Self {
        match e {
            StreakfitCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StreakfitCliError::Tracker(e) => {
                let (code, hint) = match &e {
                    TrackerError::DeleteNotAllowed(_) => (
                        "DELETE_NOT_ALLOWED",
                        "Only entries dated today can be removed",
                    ),
                    TrackerError::EntryNotFound(_) => {
                        ("ENTRY_NOT_FOUND", "Run 'streakfit history' to list entry ids")
                    }
                    TrackerError::InvalidSettings(_) => {
                        ("INVALID_SETTINGS", "Frequency and goal must be positive")
                    }
                    TrackerError::DateParse(_) => {
                        ("DATE_PARSE_ERROR", "Dates use the YYYY-MM-DD format")
                    }
                    _ => ("TRACKER_ERROR", "Check the data directory"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            StreakfitCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StreakfitCliError::UnknownExercise(id) => CliError {
                code: "UNKNOWN_EXERCISE".to_string(),
                message: format!("Unknown exercise: {id}"),
                hint: Some("Run 'streakfit catalog' to list exercise ids".to_string()),
            },
            StreakfitCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "No input piped to stdin".to_string(),
                hint: Some("Pipe NDJSON actions in or pass --input <file>".to_string()),
            },
            StreakfitCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some(
                    "Each line needs a timestamp and an action (add, set, remove, end_series, poll, check_goal)"
                        .to_string(),
                ),
            },
        }
    }
}
