//! Binary entrypoint: replay a captured pipeline log, print latency percentiles.
//!
//! Reads `<epoch ms>:<payload>` lines from a file or stdin. Results go to
//! stdout (text or JSON); diagnostics and logs go to stderr. Any parse or I/O
//! failure exits with status 1.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use chrono::DateTime;
use clap::{Parser, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use perf_stats::{Config, Percentile, RankRule, SeriesKind, StatsEngine, StatsError, UseCase};

const USAGE: &str = "USAGE: perf-stats -p <percentile> [-s <start offset timestamp>] [-f <file>]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
  Text,
  Json,
}

/// Percentile latency statistics from a captured stream-processing log
#[derive(Parser, Debug)]
#[command(name = "perf-stats", version)]
struct Cli {
  /// Percentile to report, within (0,1]
  #[arg(short, long, allow_negative_numbers = true)]
  percentile: f64,

  /// Captured log file (default: standard input)
  #[arg(short, long)]
  file: Option<PathBuf>,

  /// Ignore records captured before this time (epoch millis or RFC 3339)
  #[arg(short, long, value_parser = parse_start, allow_negative_numbers = true)]
  start: Option<i64>,

  /// Raw input encoding and event identity scheme
  #[arg(short = 'c', long, value_enum, default_value_t = UseCase::Fraud)]
  use_case: UseCase,

  /// Write the reconstructed per-event latency log (CSV) to this path
  #[arg(short = 'l', long)]
  dump_log: Option<PathBuf>,

  /// Omit the header line from the dumped event log
  #[arg(long)]
  no_header: bool,

  #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
  format: OutputFormat,

  /// JSON config file; flags override its values
  #[arg(long)]
  config: Option<PathBuf>,

  /// Percentile index rule (overrides the config file)
  #[arg(long, value_enum)]
  rank_rule: Option<RankRule>,

  /// Log verbosity on stderr (-v info, -vv debug, -vvv trace)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

fn parse_start(raw: &str) -> Result<i64, String> {
  if let Ok(ms) = raw.trim().parse::<i64>() {
    return Ok(ms);
  }
  DateTime::parse_from_rfc3339(raw.trim())
    .map(|dt| dt.timestamp_millis())
    .map_err(|e| format!("expected epoch millis or RFC 3339: {}", e))
}

fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .with_target(verbose >= 2)
    .init();
}

fn main() {
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    Err(e) => {
      let code = if e.use_stderr() { 1 } else { 0 };
      let _ = e.print();
      process::exit(code);
    }
  };
  init_logging(cli.verbose);
  debug!(?cli, "parsed arguments");

  if let Err(e) = run(&cli) {
    let _ = writeln!(io::stderr(), "perf-stats error: {:#}", e);
    if let Some(StatsError::InvalidPercentile(_)) = e.downcast_ref::<StatsError>() {
      let _ = writeln!(io::stderr(), "{}", USAGE);
    }
    process::exit(1);
  }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
  let percentile = Percentile::new(cli.percentile)?;

  let mut config = match &cli.config {
    Some(path) => Config::from_json_file(path)
      .with_context(|| format!("loading config {}", path.display()))?,
    None => Config::default(),
  };
  if let Some(rule) = cli.rank_rule {
    config.rank_rule = rule;
  }
  if cli.dump_log.is_some() {
    config.include_event_log = true;
  }

  let start = cli.start.unwrap_or(i64::MIN);
  let engine = StatsEngine::for_use_case(config, cli.use_case);
  info!(use_case = ?cli.use_case, start, "analyzing captured log");

  let stats = match &cli.file {
    Some(path) => {
      let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
      engine.analyze(BufReader::new(file), start)?
    }
    None => engine.analyze(io::stdin().lock(), start)?,
  };

  for kind in SeriesKind::ALL {
    if stats.series(kind).is_empty() {
      warn!(series = kind.label(), "no samples");
    }
  }

  let summary = stats.summary(percentile);
  let stdout = io::stdout();
  let mut out = BufWriter::new(stdout.lock());
  match cli.format {
    OutputFormat::Text => out.write_all(summary.render_text().as_bytes())?,
    OutputFormat::Json => {
      serde_json::to_writer(&mut out, &summary)?;
      writeln!(out)?;
    }
  }
  out.flush()?;

  if let Some(path) = &cli.dump_log {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    stats.dump_log(BufWriter::new(file), !cli.no_header)?;
    info!(
      rows = stats.event_log().map_or(0, |log| log.len()),
      path = %path.display(),
      "event log written"
    );
  }

  Ok(())
}
