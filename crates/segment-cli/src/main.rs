//! `segments`: administer a time segment schedule stored as JSON.
//!
//! ## Usage
//!
//! ```sh
//! # Create an hourly segment starting at epoch second 1000
//! segments create --name hourly --start 1000 --period 3600
//!
//! # Pin a range to segment 2
//! segments override add 2 2000 2500
//!
//! # Which segment governs an instant? (epoch seconds or RFC 3339)
//! segments resolve 2200
//! segments resolve 2026-03-16T09:00:00Z
//!
//! # Timetable for a window, as JSON
//! segments --json timetable 0 20000
//!
//! # Audit for overlapping recurrences
//! segments check
//! ```
//!
//! Every mutating subcommand loads the schedule file, applies one operation
//! and saves it back. A missing file starts an empty schedule.

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand, ValueEnum};
use segment_engine::{
    ConflictPolicy, EngineConfig, JsonFileStore, Resolution, Schedule, SegmentId, SnapshotStore,
    SpanResolution, Timestamp,
};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "segments", version, about = "Time segment schedule administration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Schedule snapshot file
    #[arg(short, long, default_value = "schedule.json", global = true)]
    file: String,

    /// What to do when recurrences of two segments overlap
    #[arg(long, value_enum, default_value_t = Policy::Reject, global = true)]
    policy: Policy,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    Reject,
    Defer,
}

impl From<Policy> for ConflictPolicy {
    fn from(p: Policy) -> Self {
        match p {
            Policy::Reject => ConflictPolicy::Reject,
            Policy::Defer => ConflictPolicy::Defer,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a recurring segment
    Create {
        #[arg(long)]
        name: String,
        /// Recurrence origin (epoch seconds or RFC 3339)
        #[arg(long, allow_hyphen_values = true)]
        start: String,
        /// Recurrence period in seconds
        #[arg(long, allow_hyphen_values = true)]
        period: i64,
    },
    /// Start a new recurrence version of a segment
    Redefine {
        id: i64,
        #[arg(long, allow_hyphen_values = true)]
        start: String,
        #[arg(long, allow_hyphen_values = true)]
        period: i64,
    },
    /// Stop a segment's recurrence at an instant
    Retire {
        id: i64,
        #[arg(allow_hyphen_values = true)]
        at: String,
    },
    /// Delete a segment with no dependents
    Delete {
        id: i64,
        /// Comma-separated time_segment_id values of existing tasks
        #[arg(long)]
        bound: Option<String>,
    },
    /// Manage override ranges
    Override {
        #[command(subcommand)]
        action: OverrideAction,
    },
    /// Resolve the segment governing an instant
    Resolve {
        #[arg(allow_hyphen_values = true)]
        instant: String,
    },
    /// Partition a window into spans of constant resolution
    Timetable {
        #[arg(allow_hyphen_values = true)]
        lo: String,
        #[arg(allow_hyphen_values = true)]
        hi: String,
    },
    /// List recurrence instances of a segment within a window
    Instances {
        id: i64,
        #[arg(allow_hyphen_values = true)]
        lo: String,
        #[arg(allow_hyphen_values = true)]
        hi: String,
        /// Maximum number of instances to print
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Check a task's time_segment_id
    Validate {
        #[arg(allow_hyphen_values = true)]
        time_segment_id: i64,
    },
    /// Report every pair of segments with overlapping recurrences
    Check,
    /// List segments and override ranges
    List,
}

#[derive(Subcommand)]
enum OverrideAction {
    /// Pin [start, end) to a segment
    Add {
        segment_id: i64,
        #[arg(allow_hyphen_values = true)]
        start: String,
        #[arg(allow_hyphen_values = true)]
        end: String,
    },
    /// Carve [start, end) out of a segment's overrides
    Remove {
        segment_id: i64,
        #[arg(allow_hyphen_values = true)]
        start: String,
        #[arg(allow_hyphen_values = true)]
        end: String,
    },
    /// Remove all override ranges of a segment
    Clear { segment_id: i64 },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = JsonFileStore::new(&cli.file);
    let config = EngineConfig::with_policy(cli.policy.into());
    let snapshot = store
        .load()
        .with_context(|| format!("Failed to load schedule: {}", cli.file))?;
    let mut schedule = Schedule::from_snapshot(&snapshot, config)
        .with_context(|| format!("Schedule file is inconsistent: {}", cli.file))?;
    debug!(
        file = %cli.file,
        segments = snapshot.segments.len(),
        ranges = snapshot.ranges.len(),
        "schedule loaded"
    );

    let mutated = run(&mut schedule, cli.command, cli.json)?;
    if mutated {
        store
            .save(&schedule.snapshot())
            .with_context(|| format!("Failed to save schedule: {}", cli.file))?;
        debug!(file = %cli.file, "schedule saved");
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Execute one subcommand. Returns whether the schedule changed.
fn run(schedule: &mut Schedule, command: Commands, json: bool) -> Result<bool> {
    match command {
        Commands::Create {
            name,
            start,
            period,
        } => {
            let id = schedule.create_segment(&name, parse_instant(&start)?, period)?;
            emit(json, &serde_json::json!({ "id": id }), || {
                format!("created segment {}", id)
            })?;
            Ok(true)
        }
        Commands::Redefine { id, start, period } => {
            let id = parse_id(id)?;
            schedule.redefine_segment(id, parse_instant(&start)?, period)?;
            Ok(true)
        }
        Commands::Retire { id, at } => {
            schedule.retire_segment(parse_id(id)?, parse_instant(&at)?)?;
            Ok(true)
        }
        Commands::Delete { id, bound } => {
            let bindings = parse_bindings(bound.as_deref())?;
            schedule.delete_segment(parse_id(id)?, &bindings)?;
            Ok(true)
        }
        Commands::Override { action } => run_override(schedule, action, json),
        Commands::Resolve { instant } => {
            let t = parse_instant(&instant)?;
            let resolution = schedule.resolve(t)?;
            emit(json, &resolution, || match resolution {
                Resolution::Segment(id) => id.to_string(),
                Resolution::Unassigned => "unassigned".to_string(),
            })?;
            Ok(false)
        }
        Commands::Timetable { lo, hi } => {
            let spans = schedule.resolve_range(parse_instant(&lo)?, parse_instant(&hi)?)?;
            emit(json, &spans, || {
                spans
                    .iter()
                    .map(|s| format!("{}\t{}", s.interval, describe_span(&s.resolution)))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            Ok(false)
        }
        Commands::Instances { id, lo, hi, limit } => {
            let instances: Vec<_> = schedule
                .instances(parse_id(id)?, parse_instant(&lo)?, parse_instant(&hi)?)?
                .take(limit)
                .collect();
            emit(json, &instances, || {
                instances
                    .iter()
                    .map(|i| format!("#{}\t{}", i.index, i.interval))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            Ok(false)
        }
        Commands::Validate { time_segment_id } => {
            schedule.validate_binding(time_segment_id)?;
            emit(json, &serde_json::json!({ "valid": true }), || "ok".to_string())?;
            Ok(false)
        }
        Commands::Check => {
            let ambiguities = schedule.find_ambiguities();
            emit(json, &ambiguities, || {
                if ambiguities.is_empty() {
                    return "no ambiguities".to_string();
                }
                ambiguities
                    .iter()
                    .map(|a| format!("{} and {} overlap on {}", a.segment_a, a.segment_b, a.overlap))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            if !ambiguities.is_empty() {
                bail!("{} ambiguous segment pair(s) found", ambiguities.len());
            }
            Ok(false)
        }
        Commands::List => {
            let segments: Vec<_> = schedule.segments().collect();
            let ranges: Vec<_> = schedule.overrides().iter().collect();
            emit(
                json,
                &serde_json::json!({ "segments": segments, "ranges": ranges }),
                || {
                    let mut lines: Vec<String> = segments
                        .iter()
                        .map(|s| {
                            let status = if s.is_retired() { " (retired)" } else { "" };
                            format!(
                                "{}\t{}\tstart={}\tperiod={}\tversions={}{}",
                                s.id,
                                s.name,
                                s.start(),
                                s.period(),
                                s.versions().len(),
                                status
                            )
                        })
                        .collect();
                    lines.extend(
                        ranges
                            .iter()
                            .map(|r| format!("override\t{}\t{}", r.segment_id, r.interval)),
                    );
                    lines.join("\n")
                },
            )?;
            Ok(false)
        }
    }
}

fn run_override(schedule: &mut Schedule, action: OverrideAction, json: bool) -> Result<bool> {
    match action {
        OverrideAction::Add {
            segment_id,
            start,
            end,
        } => {
            let stored = schedule.add_override_range(
                parse_id(segment_id)?,
                parse_instant(&start)?,
                parse_instant(&end)?,
            )?;
            emit(json, &stored, || {
                format!("segment {} overrides {}", stored.segment_id, stored.interval)
            })?;
        }
        OverrideAction::Remove {
            segment_id,
            start,
            end,
        } => {
            schedule.remove_override_range(
                parse_id(segment_id)?,
                parse_instant(&start)?,
                parse_instant(&end)?,
            )?;
        }
        OverrideAction::Clear { segment_id } => {
            let removed = schedule.clear_overrides(parse_id(segment_id)?)?;
            emit(json, &serde_json::json!({ "removed": removed }), || {
                format!("removed {} override range(s)", removed)
            })?;
        }
    }
    Ok(true)
}

fn emit<T, F>(json: bool, value: &T, text: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce() -> String,
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn describe_span(resolution: &SpanResolution) -> String {
    match resolution {
        SpanResolution::Segment(id) => id.to_string(),
        SpanResolution::Unassigned => "unassigned".to_string(),
        SpanResolution::Ambiguous(ids) => format!(
            "ambiguous({})",
            ids.iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",")
        ),
    }
}

/// Accept integer epoch seconds or an RFC 3339 datetime.
fn parse_instant(raw: &str) -> Result<Timestamp> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Ok(secs);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp())
        .with_context(|| format!("Not an epoch second count or RFC 3339 datetime: '{}'", raw))
}

fn parse_id(raw: i64) -> Result<SegmentId> {
    SegmentId::new(raw).with_context(|| format!("Segment ids are positive integers (got {})", raw))
}

/// `--bound 1,1,3` lists the time_segment_id of each known task.
fn parse_bindings(raw: Option<&str>) -> Result<Vec<i64>> {
    let mut ids = Vec::new();
    if let Some(raw) = raw {
        for part in raw.split(',') {
            let trimmed = part.trim();
            if !trimmed.is_empty() {
                ids.push(
                    trimmed
                        .parse::<i64>()
                        .with_context(|| format!("Invalid task binding '{}'", trimmed))?,
                );
            }
        }
    }
    Ok(ids)
}
