mod config;
mod metrics;
mod sources;
mod timeline;

use chrono::{DateTime, Datelike, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use config::TraceConfig;
use metrics::{duration, scan, MetricEnvelope, MetricSink};
use sources::{CorpusPlan, LogSource};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use timeline::patterns::PatternSet;
use tracing_subscriber::EnvFilter;

type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

/// Test-run diagnostics for a cluster: reconstruct pod startup timelines
/// from component logs and emit or decode structured metric records.
#[derive(Parser, Debug)]
#[command(name = "clustertrace", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "clustertrace.toml", global = true)]
    config: PathBuf,

    /// Debug logging (absent milestones, per-source byte counts)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract milestone timestamps from logs and print the intervals between them
    Timeline {
        /// Log files or glob patterns ("-" for stdin), read before configured sources
        #[arg(value_name = "LOGS")]
        logs: Vec<String>,

        /// Year for year-less log stamps (overrides config; default: current year)
        #[arg(long)]
        year: Option<i32>,

        /// Start of the test window (RFC3339), substituted into command source arguments
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Also write each interval as a metric record
        #[arg(long)]
        emit_metrics: bool,

        /// Metric name prefix (overrides config)
        #[arg(long)]
        metric_prefix: Option<String>,
    },

    /// Write one TestDuration metric record to stdout
    Emit {
        /// Metric name
        #[arg(long)]
        name: String,

        /// Measurement start time (RFC3339; default: now)
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Elapsed time, e.g. 1.5s or 2m3.25s
        #[arg(long, value_parser = duration::decode)]
        duration: TimeDelta,
    },

    /// Scan output for metric records and decode them
    Decode {
        /// File to scan (default: stdin)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// List the built-in milestone table in order
    Patterns,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries report lines and metric records only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let result = match cli.command {
        Commands::Timeline {
            logs,
            year,
            since,
            emit_metrics,
            metric_prefix,
        } => {
            run_timeline(
                &cli.config,
                logs,
                year,
                since,
                emit_metrics,
                metric_prefix,
            )
            .await
        }
        Commands::Emit {
            name,
            start,
            duration,
        } => run_emit(name, start.unwrap_or_else(Utc::now), duration),
        Commands::Decode { file } => run_decode(file),
        Commands::Patterns => run_patterns(),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "clustertrace failed");
            ExitCode::FAILURE
        }
    }
}

async fn run_timeline(
    config_path: &std::path::Path,
    logs: Vec<String>,
    year: Option<i32>,
    since: Option<DateTime<Utc>>,
    emit_metrics: bool,
    metric_prefix: Option<String>,
) -> CliResult {
    let config = TraceConfig::load(config_path)?;

    let mut file_args = logs;
    file_args.extend(config.sources.files.iter().cloned());
    let mut log_sources = sources::expand_files(&file_args)?;
    log_sources.extend(
        config
            .sources
            .commands
            .iter()
            .cloned()
            .map(LogSource::Command),
    );
    if log_sources.is_empty() {
        log_sources.push(LogSource::Stdin);
    }

    let plan = CorpusPlan {
        sources: log_sources,
        command_timeout: Duration::from_secs(config.sources.command_timeout_secs),
        since,
    };
    let corpus = plan.assemble().await?;

    let reference_year = year
        .or(config.timeline.reference_year)
        .unwrap_or_else(|| Utc::now().year());
    let patterns = PatternSet::pod_startup();
    let timeline = timeline::build(&corpus, patterns, reference_year);

    for event in timeline.events.iter().flatten() {
        tracing::debug!(
            index = event.pattern_index,
            month = event.month,
            fragment = %event.raw_fragment,
            time = %event.normalized_time,
            "milestone found"
        );
    }
    for failure in &timeline.errors {
        tracing::warn!(
            index = failure.pattern_index,
            label = %failure.label,
            error = %failure.error,
            "discarded milestone with unparsable timestamp"
        );
    }
    for delta in timeline.deltas.iter().filter(|d| d.bridges_gap()) {
        tracing::info!(
            label = %delta.label,
            from = delta.from,
            to = delta.to,
            "interval spans missing milestones"
        );
    }
    tracing::info!(
        corpus_bytes = corpus.len(),
        milestones = patterns.len(),
        missing = timeline.absent().count(),
        unparsable = timeline.errors.len(),
        reference_year,
        "timeline extracted"
    );

    let mut out = std::io::stdout().lock();
    for line in timeline.report_lines() {
        writeln!(out, "{line}")?;
    }

    if emit_metrics || config.timeline.emit_metrics {
        let prefix = metric_prefix.unwrap_or(config.timeline.metric_prefix);
        MetricSink::new(&mut out).emit_all(&timeline.to_metrics(&prefix))?;
    }
    out.flush()?;

    Ok(ExitCode::SUCCESS)
}

fn run_emit(name: String, start: DateTime<Utc>, elapsed: TimeDelta) -> CliResult {
    let record = MetricEnvelope::test_duration(name, start, elapsed);
    MetricSink::new(std::io::stdout().lock()).emit_all(&[record])?;
    Ok(ExitCode::SUCCESS)
}

fn run_decode(file: Option<PathBuf>) -> CliResult {
    let text = match &file {
        Some(path) => std::fs::read_to_string(path)?,
        None => std::io::read_to_string(std::io::stdin())?,
    };

    let records = scan::scan_records(&text);
    let mut out = std::io::stdout().lock();
    let mut malformed = 0usize;
    for record in &records {
        match &record.result {
            Ok(env) => writeln!(out, "{}", describe_record(env))?,
            Err(e) => {
                malformed += 1;
                writeln!(out, "line {}: {e}", record.line)?;
            }
        }
    }
    out.flush()?;

    tracing::info!(
        records = records.len(),
        malformed,
        "metric records decoded"
    );
    Ok(if malformed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// One-line summary of a decoded record.
fn describe_record(env: &MetricEnvelope) -> String {
    match env.test_duration_payload() {
        Some(td) => format!(
            "{}\t{}\tstart={}\tduration={}",
            env.name(),
            env.payload_type().as_str(),
            td.start_time.to_rfc3339(),
            duration::encode(td.duration)
        ),
        None => format!(
            "{}\t{}\t(payload not decoded)",
            env.name(),
            env.payload_type().as_str()
        ),
    }
}

fn run_patterns() -> CliResult {
    let mut out = std::io::stdout().lock();
    for (index, milestone) in PatternSet::pod_startup().iter().enumerate() {
        writeln!(
            out,
            "{index}\t{}\t{}",
            milestone.label(),
            milestone.pattern().as_str()
        )?;
    }
    Ok(ExitCode::SUCCESS)
}
