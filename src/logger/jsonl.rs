//! JSONL activity log: one self-contained JSON object per line.
//!
//! Lines are assembled in memory and written with a single `write_all` so a
//! concurrent reader tailing the file never sees a partial line.
//!
//! Four-level fallback chain:
//! 1. Primary file path
//! 2. Fallback path (defaults to the system temp directory)
//! 3. stderr with `[SCS-JSONL]` prefix
//! 4. Silent discard (callers never fail because logging failed)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, ScsError};
use crate::core::paths::ensure_parent_dir;
use crate::diversity::selector::SelectionResult;
use crate::monitor::realtime::Alert;

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine.
    Info,
    /// Degraded but completed.
    Warning,
    /// Failed or anomalous.
    Critical,
}

/// Activity event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A selection finished.
    SelectionComplete,
    /// A stress run began.
    StressStart,
    /// A stress run finished.
    StressComplete,
    /// Telemetry was recorded.
    TelemetryRecorded,
    /// The monitor raised an alert.
    AnomalyAlert,
    /// A benchmark suite finished.
    BenchmarkComplete,
    /// Config loaded.
    ConfigLoaded,
    /// A command failed.
    Error,
}

/// A single JSONL log entry; all fields optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// What happened.
    pub event: EventType,
    /// How bad it was.
    pub severity: Severity,
    /// Candidates offered to a selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<usize>,
    /// Candidates requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_count: Option<usize>,
    /// Candidates actually selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<usize>,
    /// Final ladder threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Wall time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Whether the action succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// Rendered warnings, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    /// Test p-value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    /// Test z statistic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    /// SCS error code if the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Rendered error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            candidate_count: None,
            target_count: None,
            selected: None,
            threshold: None,
            duration_ms: None,
            ok: None,
            warnings: None,
            p_value: None,
            z_score: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    /// `selection_complete` entry summarizing `result`.
    pub fn selection(result: &SelectionResult, target_count: usize) -> Self {
        let m = &result.metrics;
        let severity = if m.warnings.is_empty() {
            Severity::Info
        } else {
            Severity::Warning
        };
        let mut entry = Self::new(EventType::SelectionComplete, severity);
        entry.candidate_count = Some(m.candidate_count);
        entry.target_count = Some(target_count);
        entry.selected = Some(result.selected.len());
        entry.threshold = Some(m.final_threshold);
        entry.duration_ms = Some(m.selection_time_ms);
        entry.ok = Some(m.success);
        if !m.warnings.is_empty() {
            entry.warnings = Some(m.warnings.iter().map(ToString::to_string).collect());
        }
        entry
    }

    /// `anomaly_alert` entry for a monitor alert.
    pub fn alert(alert: &Alert) -> Self {
        let mut entry = Self::new(EventType::AnomalyAlert, Severity::Critical);
        entry.p_value = alert.p_value;
        entry.z_score = alert.z_score;
        entry.details = Some(alert.message.clone());
        entry
    }

    /// `error` entry carrying the error's code.
    pub fn error(err: &ScsError) -> Self {
        let mut entry = Self::new(EventType::Error, Severity::Warning);
        entry.ok = Some(false);
        entry.error_code = Some(err.code().to_string());
        entry.error_message = Some(err.to_string());
        entry
    }

    /// Attach free-form details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Where entries currently go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    /// Configured log file.
    Primary,
    /// Fallback file under the temp dir.
    Fallback,
    /// Standard error.
    Stderr,
    /// Nothing is written.
    Discard,
}

impl Sink {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
            Self::Stderr => "stderr",
            Self::Discard => "discard",
        }
    }
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Primary log file.
    pub path: PathBuf,
    /// Used when `path` cannot be opened or written.
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the current file would exceed this many bytes.
    pub max_size_bytes: u64,
    /// Rotated generations kept as `<path>.1` .. `<path>.N`.
    pub max_rotated_files: u32,
}

impl JsonlConfig {
    /// Defaults with a custom primary path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("activity.jsonl"),
            fallback_path: Some(std::env::temp_dir().join("scs-activity.jsonl")),
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

/// Append-only activity log with rotation and fallback.
///
/// Every entry is flushed immediately; the CLI is short-lived and a crash
/// must not lose the last lines.
#[derive(Debug)]
pub struct JsonlWriter {
    config: JsonlConfig,
    file: Option<File>,
    sink: Sink,
    bytes_written: u64,
    entries_written: u64,
}

impl JsonlWriter {
    /// Open the primary path, degrading through the fallback chain on failure.
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            file: None,
            sink: Sink::Discard,
            bytes_written: 0,
            entries_written: 0,
        };
        writer.attach(Sink::Primary);
        writer
    }

    /// A writer that drops everything.
    pub fn disabled() -> Self {
        Self {
            config: JsonlConfig {
                fallback_path: None,
                ..JsonlConfig::default()
            },
            file: None,
            sink: Sink::Discard,
            bytes_written: 0,
            entries_written: 0,
        }
    }

    /// Serialize `entry` and append it as one line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => {
                self.write_line(&format!("{json}\n"));
                self.entries_written += 1;
            }
            Err(e) => {
                let _ = writeln!(io::stderr(), "[SCS-JSONL] serialize error: {e}");
            }
        }
    }

    /// Sink currently in use.
    pub fn sink(&self) -> Sink {
        self.sink
    }

    /// Bytes written to the current file.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Entries written since open.
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Return to the primary path if it has become writable again.
    pub fn try_recover(&mut self) {
        if self.sink != Sink::Primary && self.attach_file(Sink::Primary) {
            let _ = writeln!(
                io::stderr(),
                "[SCS-JSONL] recovered to primary path: {}",
                self.config.path.display()
            );
        }
    }

    fn current_path(&self) -> Option<&Path> {
        match self.sink {
            Sink::Primary => Some(&self.config.path),
            Sink::Fallback => self.config.fallback_path.as_deref(),
            Sink::Stderr | Sink::Discard => None,
        }
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.file.is_some() && self.bytes_written + len > self.config.max_size_bytes {
            self.rotate();
        }

        loop {
            match self.sink {
                Sink::Primary | Sink::Fallback => {
                    let written = self.file.as_mut().is_some_and(|f| {
                        f.write_all(line.as_bytes()).is_ok() && f.flush().is_ok()
                    });
                    if written {
                        self.bytes_written += len;
                        return;
                    }
                    self.degrade();
                }
                Sink::Stderr => {
                    let _ = write!(io::stderr(), "[SCS-JSONL] {line}");
                    return;
                }
                Sink::Discard => return,
            }
        }
    }

    /// Walk the chain starting at `sink` until something accepts entries.
    fn attach(&mut self, sink: Sink) {
        let mut next = Some(sink);
        while let Some(candidate) = next {
            match candidate {
                Sink::Primary | Sink::Fallback => {
                    if self.attach_file(candidate) {
                        if candidate == Sink::Fallback {
                            let _ = writeln!(
                                io::stderr(),
                                "[SCS-JSONL] primary path failed, using fallback: {}",
                                self.current_path().map_or_else(String::new, |p| p.display().to_string())
                            );
                        }
                        return;
                    }
                    next = Some(if candidate == Sink::Primary {
                        Sink::Fallback
                    } else {
                        Sink::Stderr
                    });
                }
                Sink::Stderr => {
                    let _ = writeln!(io::stderr(), "[SCS-JSONL] log files unavailable, using stderr");
                    self.sink = Sink::Stderr;
                    self.file = None;
                    next = None;
                }
                Sink::Discard => {
                    self.sink = Sink::Discard;
                    self.file = None;
                    next = None;
                }
            }
        }
    }

    fn attach_file(&mut self, sink: Sink) -> bool {
        let path = match sink {
            Sink::Primary => self.config.path.clone(),
            Sink::Fallback => match &self.config.fallback_path {
                Some(p) => p.clone(),
                None => return false,
            },
            Sink::Stderr | Sink::Discard => return false,
        };
        match open_append(&path) {
            Ok((file, size)) => {
                self.file = Some(file);
                self.sink = sink;
                self.bytes_written = size;
                true
            }
            Err(_) => false,
        }
    }

    fn degrade(&mut self) {
        self.file = None;
        match self.sink {
            Sink::Primary => self.attach(Sink::Fallback),
            Sink::Fallback => self.attach(Sink::Stderr),
            Sink::Stderr | Sink::Discard => self.attach(Sink::Discard),
        }
    }

    /// `<path>` becomes `<path>.1`, older generations shift up, the oldest drops.
    fn rotate(&mut self) {
        let Some(base) = self.current_path().map(Path::to_path_buf) else {
            return;
        };
        self.file = None;

        let keep = self.config.max_rotated_files;
        if keep == 0 {
            let _ = fs::remove_file(&base);
        } else {
            let _ = fs::remove_file(rotated_name(&base, keep));
            for generation in (1..keep).rev() {
                let _ = rename(rotated_name(&base, generation), rotated_name(&base, generation + 1));
            }
            let _ = rename(&base, rotated_name(&base, 1));
        }

        let sink = self.sink;
        if !self.attach_file(sink) {
            self.degrade();
        }
    }
}

/// Open or create a file for appending. Returns `(File, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    ensure_parent_dir(path)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ScsError::io(path, source))?;
    let size = file.metadata().map_or(0, |m| m.len());
    Ok((file, size))
}

/// `foo.jsonl` -> `foo.jsonl.3`.
fn rotated_name(base: &Path, generation: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diversity::candidate::{Candidate, PathStep};
    use crate::diversity::selector::DiversitySelector;

    fn config(path: PathBuf) -> JsonlConfig {
        JsonlConfig {
            path,
            fallback_path: None,
            max_size_bytes: 1024 * 1024,
            max_rotated_files: 3,
        }
    }

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn entries_are_single_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone()));
        assert_eq!(writer.sink(), Sink::Primary);

        writer.write_entry(&LogEntry::new(EventType::StressStart, Severity::Info));
        writer.write_entry(
            &LogEntry::new(EventType::ConfigLoaded, Severity::Info).with_details("hash=abc"),
        );

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "stress_start");
        assert_eq!(lines[0]["severity"], "info");
        assert_eq!(lines[1]["details"], "hash=abc");
        assert_eq!(writer.entries_written(), 2);
    }

    #[test]
    fn unset_fields_are_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone()));
        writer.write_entry(&LogEntry::new(EventType::BenchmarkComplete, Severity::Info));

        let line = fs::read_to_string(&path).unwrap();
        assert!(!line.contains("\"threshold\""));
        assert!(!line.contains("\"warnings\""));
        assert!(!line.contains("\"p_value\""));
    }

    #[test]
    fn selection_entry_carries_metrics() {
        let pool: Vec<Candidate> = (0..3)
            .map(|i| Candidate::new(format!("c{i}"), i, 10.0, vec![PathStep::new(1, 1)]))
            .collect();
        let result = DiversitySelector::default().select_diverse(&pool, 8).unwrap();
        let entry = LogEntry::selection(&result, 8);
        assert_eq!(entry.severity, Severity::Warning);
        assert_eq!(entry.selected, Some(3));
        assert_eq!(entry.ok, Some(true));
        assert_eq!(entry.warnings.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn error_entry_uses_code() {
        let err = ScsError::invalid_input("next_int", "min > max");
        let entry = LogEntry::error(&err);
        assert_eq!(entry.error_code.as_deref(), Some("SCS-1101"));
        assert_eq!(entry.ok, Some(false));
    }

    #[test]
    fn rotation_keeps_generations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rot.jsonl");
        let mut writer = JsonlWriter::open(JsonlConfig {
            max_size_bytes: 100,
            max_rotated_files: 2,
            ..config(path.clone())
        });
        for _ in 0..10 {
            writer.write_entry(&LogEntry::new(EventType::TelemetryRecorded, Severity::Info));
        }
        assert!(path.exists());
        assert!(rotated_name(&path, 1).exists());
        assert!(rotated_name(&path, 2).exists());
        assert!(!rotated_name(&path, 3).exists());
    }

    #[test]
    fn falls_back_when_primary_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "file").unwrap();
        let fallback = dir.path().join("fallback.jsonl");
        let mut writer = JsonlWriter::open(JsonlConfig {
            fallback_path: Some(fallback.clone()),
            ..config(blocker.join("primary.jsonl"))
        });
        assert_eq!(writer.sink(), Sink::Fallback);
        writer.write_entry(&LogEntry::new(EventType::Error, Severity::Warning));
        assert_eq!(read_lines(&fallback).len(), 1);
    }

    #[test]
    fn no_fallback_degrades_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("plain");
        fs::write(&blocker, "file").unwrap();
        let writer = JsonlWriter::open(config(blocker.join("x.jsonl")));
        assert_eq!(writer.sink(), Sink::Stderr);
        assert_eq!(JsonlWriter::disabled().sink().as_str(), "discard");
    }
}
