//! Top-level CLI definition and dispatch.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use parking_lot::Mutex;
use serde_json::{Value, json};
use thiserror::Error;

use scenario_sampler::core::config::Config;
use scenario_sampler::core::errors::ScsError;
use scenario_sampler::diversity::candidate::Candidate;
use scenario_sampler::diversity::selector::DiversitySelector;
use scenario_sampler::diversity::similarity::render_path;
use scenario_sampler::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use scenario_sampler::monitor::event::{Overlay, TelemetryEvent};
use scenario_sampler::monitor::rare_event::{
    ConfidenceLevel, confidence_interval, theoretical_probability,
};
use scenario_sampler::monitor::realtime::{MonitorNotification, RealTimeMonitor};
use scenario_sampler::monitor::store::JsonlTelemetryStore;
use scenario_sampler::rng::lcg::DeterministicRandom;
use scenario_sampler::stress::bench::run_standard_suite;
use scenario_sampler::stress::harness::StressTestHarness;

/// Scenario sampler: deterministic randomness, diversity selection and
/// rare-event monitoring.
#[derive(Debug, Parser)]
#[command(
    name = "scs",
    author,
    version,
    about = "Scenario sampler - deterministic diverse selection",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Do not write to the activity log.
    #[arg(long, global = true)]
    no_log: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Select a diverse subset of candidates.
    Select(SelectArgs),
    /// Run the selector stress test over a ladder of pool sizes.
    Stress(StressArgs),
    /// Show the theoretical rare-event probability.
    Theory(TheoryArgs),
    /// Record and analyze rare-event telemetry.
    Monitor(MonitorArgs),
    /// Benchmark RNG draws and selection.
    Bench(BenchArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
}

#[derive(Debug, Clone, Args)]
struct SelectArgs {
    /// JSON file holding an array of candidates.
    #[arg(long, value_name = "FILE", conflicts_with = "synthesize")]
    input: Option<PathBuf>,
    /// Synthesize this many candidates instead of reading a file.
    #[arg(long, value_name = "N", default_value_t = 20)]
    synthesize: usize,
    /// Items to select (defaults to selector.target_count).
    #[arg(long, value_name = "N")]
    count: Option<usize>,
    /// Seed for synthesized candidates (defaults to rng.seed).
    #[arg(long)]
    seed: Option<u32>,
}

#[derive(Debug, Clone, Args, Default)]
struct StressArgs {
    /// Comma-separated pool sizes.
    #[arg(long, value_delimiter = ',', value_name = "SIZES")]
    pool_sizes: Vec<usize>,
    /// Maximum selections per pool size.
    #[arg(long)]
    test_cases: Option<usize>,
    /// Selection budget shared by each pool size.
    #[arg(long)]
    iteration_budget: Option<usize>,
    /// Worker threads.
    #[arg(long)]
    parallelism: Option<usize>,
    #[arg(long)]
    seed: Option<u32>,
    /// Print the markdown report instead of the summary.
    #[arg(long)]
    markdown: bool,
}

#[derive(Debug, Clone, Args)]
struct TheoryArgs {
    /// Observed rare events for an interval estimate.
    #[arg(long, requires = "total")]
    count: Option<u64>,
    /// Total readings for an interval estimate.
    #[arg(long, requires = "count")]
    total: Option<u64>,
    /// Interval confidence: 0.95, 0.99 or 0.999.
    #[arg(long, default_value_t = 0.95)]
    confidence: f64,
}

#[derive(Debug, Clone, Args)]
struct MonitorArgs {
    #[command(subcommand)]
    command: MonitorCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum MonitorCommand {
    /// Record telemetry events and print the resulting analysis.
    Record(RecordArgs),
    /// Print the monitor report.
    Report,
    /// Delete all recorded telemetry.
    Clear,
}

#[derive(Debug, Clone, Args)]
struct RecordArgs {
    /// Overlay tag: use-nine, use-six (or the glyphs 用九/用六), or none.
    #[arg(long, default_value = "none")]
    overlay: String,
    /// Record the same event this many times.
    #[arg(long, default_value_t = 1)]
    repeat: usize,
}

#[derive(Debug, Clone, Args)]
struct BenchArgs {
    /// Timed calls per operation.
    #[arg(long, default_value_t = 1_000)]
    iterations: usize,
    #[arg(long)]
    seed: Option<u32>,
    /// Also write all measurements to this CSV file.
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Args, Default)]
struct VersionArgs {
    /// Include additional build metadata fields.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<ScsError> for CliError {
    fn from(err: ScsError) -> Self {
        let message = err.to_string();
        match err {
            ScsError::InvalidConfig { .. }
            | ScsError::MissingConfig { .. }
            | ScsError::ConfigParse { .. }
            | ScsError::InvalidInput { .. } => Self::User(message),
            ScsError::Serialization { .. } => Self::Internal(message),
            ScsError::Io { .. } | ScsError::Runtime { .. } => Self::Runtime(message),
        }
    }
}

/// Loaded config plus the activity log for one invocation.
struct Session {
    config: Config,
    log: Arc<Mutex<JsonlWriter>>,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self, CliError> {
        let config = Config::load(cli.config.as_deref())?;
        let writer = if cli.no_log {
            JsonlWriter::disabled()
        } else {
            JsonlWriter::open(JsonlConfig::at(&config.paths.activity_log))
        };
        let session = Self {
            config,
            log: Arc::new(Mutex::new(writer)),
        };
        if cli.verbose {
            let hash = session.config.stable_hash()?;
            session.log(
                &LogEntry::new(EventType::ConfigLoaded, Severity::Info)
                    .with_details(format!("hash={hash}")),
            );
        }
        Ok(session)
    }

    fn log(&self, entry: &LogEntry) {
        self.log.lock().write_entry(entry);
    }

    /// Log `err` and convert it for the exit path.
    fn fail(&self, err: ScsError) -> CliError {
        self.log(&LogEntry::error(&err));
        CliError::from(err)
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Select(args) => run_select(cli, args),
        Command::Stress(args) => run_stress(cli, args),
        Command::Theory(args) => run_theory(cli, args),
        Command::Monitor(args) => run_monitor(cli, args),
        Command::Bench(args) => run_bench(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
        Command::Version(args) => emit_version(cli, args),
    }
}

// ---------------------------------------------------------------------------
// select
// ---------------------------------------------------------------------------

fn run_select(cli: &Cli, args: &SelectArgs) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let target = args.count.unwrap_or(session.config.selector.target_count);

    let candidates = match &args.input {
        Some(path) => read_candidates(path).map_err(|e| session.fail(e))?,
        None => {
            let mut rng = DeterministicRandom::new(args.seed.unwrap_or(session.config.rng.seed));
            Candidate::synthesize_pool(&mut rng, args.synthesize).map_err(|e| session.fail(e))?
        }
    };

    let selector = DiversitySelector::new(session.config.selector.clone());
    let result = selector
        .select_diverse(&candidates, target)
        .map_err(|e| session.fail(e))?;
    session.log(&LogEntry::selection(&result, target));

    match output_mode(cli) {
        OutputMode::Human => {
            let m = &result.metrics;
            let status = if m.success { "ok".green() } else { "short".yellow() };
            println!(
                "Selected {} of {} candidates [{status}] (ladder steps {}, threshold {:.3}, {:.2}ms)",
                result.selected.len(),
                m.candidate_count,
                m.iterations,
                m.final_threshold,
                m.selection_time_ms
            );
            for (rank, c) in result.selected.iter().enumerate() {
                let path = c.path.as_deref().map(render_path).unwrap_or_default();
                println!(
                    "  {:>2}. {:<16} score {:>7.2}  path {}",
                    rank + 1,
                    c.sort_key(),
                    c.total_score,
                    path
                );
            }
            for w in &m.warnings {
                println!("  {} {w}", "warning:".yellow());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "select",
                "target_count": target,
                "result": result,
                "warnings": result.metrics.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

/// Read a JSON array of candidates, numbering them by position.
fn read_candidates(path: &Path) -> Result<Vec<Candidate>, ScsError> {
    let raw = fs::read_to_string(path).map_err(|source| ScsError::io(path, source))?;
    let mut candidates: Vec<Candidate> = serde_json::from_str(&raw)?;
    for (index, c) in candidates.iter_mut().enumerate() {
        c.index = index;
    }
    Ok(candidates)
}

// ---------------------------------------------------------------------------
// stress
// ---------------------------------------------------------------------------

fn run_stress(cli: &Cli, args: &StressArgs) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let mut stress = session.config.stress.clone();
    if !args.pool_sizes.is_empty() {
        stress.pool_sizes.clone_from(&args.pool_sizes);
    }
    if let Some(v) = args.test_cases {
        stress.test_cases = v;
    }
    if let Some(v) = args.iteration_budget {
        stress.iteration_budget = v;
    }
    if let Some(v) = args.parallelism {
        stress.parallelism = v;
    }
    if let Some(v) = args.seed {
        stress.seed = v;
    }
    if stress.pool_sizes.contains(&0) {
        return Err(session.fail(ScsError::invalid_input(
            "stress",
            "pool sizes must be at least 1",
        )));
    }

    session.log(
        &LogEntry::new(EventType::StressStart, Severity::Info).with_details(format!(
            "seed={} pool_sizes={:?} parallelism={}",
            stress.seed, stress.pool_sizes, stress.parallelism
        )),
    );
    let harness = StressTestHarness::new(stress, &session.config.selector);
    let report = harness.run_full_stress_test().map_err(|e| session.fail(e))?;

    let summary = &report.summary;
    let mut done = LogEntry::new(
        EventType::StressComplete,
        if report.recommendations.is_empty() {
            Severity::Info
        } else {
            Severity::Warning
        },
    )
    .with_details(format!("complexity={}", report.scalability.complexity));
    done.duration_ms = Some(summary.total_test_time_ms);
    done.ok = Some(summary.overall_success_rate >= 0.95);
    done.target_count = Some(report.target_count);
    session.log(&done);

    match output_mode(cli) {
        OutputMode::Human if args.markdown => print!("{}", report.render_markdown()),
        OutputMode::Human => {
            println!(
                "Stress test: {} selections across {} pool sizes in {:.0}ms",
                summary.total_selections,
                report.cases.len(),
                summary.total_test_time_ms
            );
            let rate = format!("{:.1}%", summary.overall_success_rate * 100.0);
            println!(
                "  success rate: {}",
                if summary.overall_success_rate >= 0.95 {
                    rate.green()
                } else {
                    rate.red()
                }
            );
            println!(
                "  selection time: avg {:.2}ms (min {:.2}, max {:.2})",
                summary.average_selection_time_ms,
                summary.min_selection_time_ms,
                summary.max_selection_time_ms
            );
            println!("  complexity: {}", report.scalability.complexity);
            println!(
                "  diversity: avg {:.3}; perfect {}, partial {}, failures {}",
                report.quality.diversity.avg,
                report.quality.perfect,
                report.quality.partial,
                report.quality.failures
            );
            if !cli.quiet {
                for case in &report.cases {
                    println!(
                        "    n={:<6} runs={:<4} avg={:.3}ms success={:.1}%",
                        case.candidate_count,
                        case.iterations,
                        case.avg_time_ms,
                        case.success_rate * 100.0
                    );
                }
            }
            for r in &report.recommendations {
                println!("  {} {}", "recommendation:".yellow(), r.message);
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "stress",
                "report": report,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// theory
// ---------------------------------------------------------------------------

fn run_theory(cli: &Cli, args: &TheoryArgs) -> Result<(), CliError> {
    let theory = theoretical_probability();
    let interval = match (args.count, args.total) {
        (Some(count), Some(total)) => {
            let level = ConfidenceLevel::try_from(args.confidence)?;
            Some(confidence_interval(count, total, level)?)
        }
        _ => None,
    };

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "P(用九 or 用六) = {:e} ({}, ~{} per million)",
                theory.theoretical, theory.percentage, theory.per_million
            );
            let c = &theory.components;
            println!(
                "  = ({}/{}) x {}^{}",
                c.qualifying_hexagrams, c.total_hexagrams, c.line_change_probability, c.lines
            );
            if let Some(ci) = &interval {
                println!(
                    "  {:.1}% Wilson interval: [{:.6e}, {:.6e}] (width {:.6e})",
                    ci.confidence * 100.0,
                    ci.lower,
                    ci.upper,
                    ci.width
                );
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "theory",
                "theoretical": theory,
                "interval": interval,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// monitor
// ---------------------------------------------------------------------------

fn open_monitor(session: &Session) -> RealTimeMonitor {
    let store = JsonlTelemetryStore::new(
        &session.config.paths.telemetry_store,
        session.config.monitor.max_events,
    );
    let monitor = RealTimeMonitor::new(session.config.monitor.clone(), Box::new(store));
    let log = Arc::clone(&session.log);
    monitor.subscribe(move |notification| match notification {
        MonitorNotification::AnalysisUpdate { analysis, .. } => {
            if analysis.observed.combined > 0 {
                let mut entry = LogEntry::new(EventType::TelemetryRecorded, Severity::Info);
                entry.p_value = analysis.test.p_value;
                entry.z_score = analysis.test.z_score;
                entry.details = Some(format!(
                    "total={} combined={}",
                    analysis.observed.total, analysis.observed.combined
                ));
                log.lock().write_entry(&entry);
            }
        }
        MonitorNotification::Alert { alert, .. } => {
            log.lock().write_entry(&LogEntry::alert(alert));
        }
    });
    monitor
}

fn run_monitor(cli: &Cli, args: &MonitorArgs) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let monitor = open_monitor(&session);

    match &args.command {
        MonitorCommand::Record(record) => {
            let overlay = match record.overlay.trim() {
                "none" | "" => None,
                raw => Some(Overlay::parse(raw).ok_or_else(|| {
                    session.fail(ScsError::invalid_input(
                        "monitor record",
                        format!("unknown overlay {raw:?}; use use-nine, use-six or none"),
                    ))
                })?),
            };
            let mut last = None;
            for _ in 0..record.repeat.max(1) {
                let event = TelemetryEvent::now(overlay).with_field("source", "scs");
                last = Some(monitor.record_and_analyze(event));
            }
            let Some(analysis) = last else {
                return Err(CliError::Internal("no event recorded".to_string()));
            };

            match output_mode(cli) {
                OutputMode::Human => {
                    println!(
                        "Recorded {} event(s); window holds {} ({} rare: {} 用九, {} 用六)",
                        record.repeat.max(1),
                        analysis.observed.total,
                        analysis.observed.combined,
                        analysis.observed.use_nine,
                        analysis.observed.use_six
                    );
                    println!("  {}", analysis.test.message);
                    if let Some(alert) = &analysis.alert {
                        println!("  {} {}", format!("[{} alert]", alert.severity).red(), alert.message);
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "monitor record",
                        "recorded": record.repeat.max(1),
                        "analysis": analysis,
                    });
                    write_json_line(&payload)?;
                }
            }
        }
        MonitorCommand::Report => {
            let report = monitor.generate_report();
            match output_mode(cli) {
                OutputMode::Human => {
                    let a = &report.analysis;
                    println!("Rare-event monitor report ({})", report.generated_at);
                    println!(
                        "  events: {} (rare {}, rate {} vs theory {})",
                        report.total_events,
                        a.observed.combined,
                        a.observed.percentage,
                        a.theoretical.percentage
                    );
                    println!("  test: {}", a.test.message);
                    println!(
                        "  95% interval: [{:.3e}, {:.3e}]",
                        a.interval.lower, a.interval.upper
                    );
                    for alert in &report.alerts {
                        println!("  {} {}", format!("[{}]", alert.severity).red(), alert.message);
                    }
                    for r in &report.recommendations {
                        println!("  - {r}");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "monitor report",
                        "report": report,
                    });
                    write_json_line(&payload)?;
                }
            }
        }
        MonitorCommand::Clear => {
            let cleared = monitor.event_count();
            monitor.clear();
            match output_mode(cli) {
                OutputMode::Human => println!("Cleared {cleared} telemetry event(s)."),
                OutputMode::Json => write_json_line(&json!({
                    "command": "monitor clear",
                    "cleared": cleared,
                }))?,
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// bench
// ---------------------------------------------------------------------------

fn run_bench(cli: &Cli, args: &BenchArgs) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let seed = args.seed.unwrap_or(session.config.rng.seed);
    let measurer = run_standard_suite(seed, args.iterations, &session.config.selector)
        .map_err(|e| session.fail(e))?;

    if let Some(path) = &args.csv {
        fs::write(path, measurer.export_csv() + "\n")
            .map_err(|source| session.fail(ScsError::io(path, source)))?;
    }
    let mut entry = LogEntry::new(EventType::BenchmarkComplete, Severity::Info)
        .with_details(format!("seed={seed} iterations={}", args.iterations));
    entry.ok = Some(measurer.measurements().iter().all(|m| m.errors == 0));
    session.log(&entry);

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "{:<20} {:>10} {:>10} {:>10} {:>10} {:>10} {:>14}",
                "operation", "mean µs", "median µs", "p95 µs", "p99 µs", "stddev", "ops/sec"
            );
            for m in measurer.measurements() {
                println!(
                    "{:<20} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>14.0}",
                    m.name, m.mean_us, m.median_us, m.p95_us, m.p99_us, m.std_dev_us, m.ops_per_sec
                );
            }
            if let Some(path) = &args.csv {
                println!("CSV written to {}", path.display());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "bench",
                "seed": seed,
                "measurements": measurer.measurements(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;
            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("{}", "Configuration is valid.".green());
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("{} {e}", "Configuration is INVALID:".red());
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error_code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ---------------------------------------------------------------------------
// version and output helpers
// ---------------------------------------------------------------------------

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let git_sha = option_env!("GIT_SHA").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("scs {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
                println!("git_sha: {git_sha}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "scs",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                    "git_sha": git_sha,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("SCS_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_before_and_after_subcommand() {
        let before = Cli::try_parse_from([
            "scs",
            "--config",
            "/tmp/scs.toml",
            "--json",
            "--no-color",
            "-v",
            "theory",
        ]);
        assert!(before.is_ok());

        let after = Cli::try_parse_from(["scs", "theory", "--json", "--no-log", "-q"]);
        assert!(after.is_ok());
        assert!(Cli::try_parse_from(["scs", "theory", "-v", "-q"]).is_err());
    }

    #[test]
    fn parses_all_subcommands() {
        let cases = [
            vec!["scs", "select", "--synthesize", "50", "--count", "6", "--seed", "7"],
            vec!["scs", "select", "--input", "pool.json"],
            vec!["scs", "stress", "--pool-sizes", "10,50,100", "--parallelism", "2"],
            vec!["scs", "stress", "--markdown", "--test-cases", "5"],
            vec!["scs", "theory", "--count", "3", "--total", "100000", "--confidence", "0.99"],
            vec!["scs", "monitor", "record", "--overlay", "use-nine", "--repeat", "10"],
            vec!["scs", "monitor", "report"],
            vec!["scs", "monitor", "clear"],
            vec!["scs", "bench", "--iterations", "100", "--csv", "out.csv"],
            vec!["scs", "config", "path"],
            vec!["scs", "config", "show"],
            vec!["scs", "config", "validate"],
            vec!["scs", "version", "--verbose"],
        ];
        for case in cases {
            let parsed = Cli::try_parse_from(case.clone());
            assert!(parsed.is_ok(), "failed to parse case: {case:?}");
        }
    }

    #[test]
    fn theory_interval_needs_both_counts() {
        assert!(Cli::try_parse_from(["scs", "theory", "--count", "3"]).is_err());
        assert!(Cli::try_parse_from(["scs", "theory", "--total", "3"]).is_err());
    }

    #[test]
    fn select_input_conflicts_with_synthesize() {
        let parsed =
            Cli::try_parse_from(["scs", "select", "--input", "a.json", "--synthesize", "5"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn completions_support_bash_zsh_and_fish() {
        for shell in ["bash", "zsh", "fish"] {
            let parsed = Cli::try_parse_from(["scs", "completions", shell]);
            assert!(parsed.is_ok(), "failed shell parse for {shell}");
        }
    }

    #[test]
    fn output_mode_resolution() {
        assert_eq!(resolve_output_mode(true, Some("human"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("json"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some(" HUMAN "), false), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, None, true), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("bogus"), true), OutputMode::Human);
    }

    #[test]
    fn scs_errors_map_to_exit_codes() {
        let user = CliError::from(ScsError::invalid_input("next_int", "min > max"));
        assert_eq!(user.exit_code(), 1);
        let missing = CliError::from(ScsError::MissingConfig {
            path: PathBuf::from("/nope.toml"),
        });
        assert_eq!(missing.exit_code(), 1);
        let io_err = CliError::from(ScsError::io(
            "/tmp/x",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        ));
        assert_eq!(io_err.exit_code(), 2);
        let runtime = CliError::from(ScsError::Runtime {
            details: "worker died".to_string(),
        });
        assert_eq!(runtime.exit_code(), 2);
    }

    #[test]
    fn candidates_are_renumbered_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");
        fs::write(
            &path,
            r#"[{"totalScore": 3.0}, {"id": "b", "totalScore": 2.0, "path": [{"hex": 1, "line": 2}]}]"#,
        )
        .unwrap();
        let candidates = read_candidates(&path).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].index, 0);
        assert_eq!(candidates[1].index, 1);
        assert_eq!(candidates[1].id.as_deref(), Some("b"));
        assert!(read_candidates(&dir.path().join("missing.json")).is_err());
    }
}
