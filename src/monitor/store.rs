//! Telemetry persistence.
//!
//! The monitor owns a boxed [`TelemetryStore`]. Storage failures never
//! propagate into analysis: the JSONL store reports them on stderr with an
//! `[SCS-TELEMETRY]` prefix and carries on with what it could read.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::event::TelemetryEvent;
use crate::core::errors::{Result, ScsError};
use crate::core::paths::ensure_parent_dir;

/// Append-only sink for telemetry events.
pub trait TelemetryStore: Send {
    /// All retained events, oldest first.
    fn load(&self) -> Vec<TelemetryEvent>;
    /// Persist one event.
    fn append(&mut self, event: &TelemetryEvent);
    /// Drop all retained events.
    fn clear(&mut self);
}

/// In-memory store keeping the newest `capacity` events.
#[derive(Debug, Clone)]
pub struct MemoryTelemetryStore {
    events: VecDeque<TelemetryEvent>,
    capacity: usize,
}

impl MemoryTelemetryStore {
    /// Ring holding at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }
}

impl TelemetryStore for MemoryTelemetryStore {
    fn load(&self) -> Vec<TelemetryEvent> {
        self.events.iter().cloned().collect()
    }

    fn append(&mut self, event: &TelemetryEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());
    }

    fn clear(&mut self) {
        self.events.clear();
    }
}

/// One JSON object per line, compacted to the newest `max_events` once the
/// file holds 10% more than that.
#[derive(Debug)]
pub struct JsonlTelemetryStore {
    path: PathBuf,
    max_events: usize,
    line_count: Option<usize>,
}

impl JsonlTelemetryStore {
    /// Store at `path`, compacted to `max_events`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_events: usize) -> Self {
        Self {
            path: path.into(),
            max_events: max_events.max(1),
            line_count: None,
        }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn compaction_threshold(&self) -> usize {
        self.max_events + self.max_events / 10
    }

    fn try_append(&self, event: &TelemetryEvent) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        let line = format!("{}\n", serde_json::to_string(event)?);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| ScsError::io(&self.path, source))?;
        file.write_all(line.as_bytes())
            .map_err(|source| ScsError::io(&self.path, source))
    }

    /// Rewrite the file with only the newest `max_events` events.
    fn compact(&mut self) -> Result<()> {
        let events = read_events(&self.path)?;
        let skip = events.len().saturating_sub(self.max_events);
        let tmp = tmp_path(&self.path);
        {
            let file = File::create(&tmp).map_err(|source| ScsError::io(&tmp, source))?;
            let mut writer = BufWriter::new(file);
            for event in &events[skip..] {
                serde_json::to_writer(&mut writer, event)?;
                writer
                    .write_all(b"\n")
                    .map_err(|source| ScsError::io(&tmp, source))?;
            }
            writer.flush().map_err(|source| ScsError::io(&tmp, source))?;
        }
        fs::rename(&tmp, &self.path).map_err(|source| ScsError::io(&self.path, source))?;
        self.line_count = Some(events.len() - skip);
        Ok(())
    }

    fn current_line_count(&mut self) -> usize {
        if let Some(count) = self.line_count {
            return count;
        }
        let count = read_events(&self.path).map_or(0, |events| events.len());
        self.line_count = Some(count);
        count
    }
}

impl TelemetryStore for JsonlTelemetryStore {
    fn load(&self) -> Vec<TelemetryEvent> {
        match read_events(&self.path) {
            Ok(events) => events,
            Err(e) => {
                report(&format!("load failed: {e}"));
                Vec::new()
            }
        }
    }

    fn append(&mut self, event: &TelemetryEvent) {
        let count = self.current_line_count();
        if let Err(e) = self.try_append(event) {
            report(&format!("append failed: {e}"));
            return;
        }
        self.line_count = Some(count + 1);
        if count + 1 > self.compaction_threshold() {
            if let Err(e) = self.compact() {
                report(&format!("compaction failed: {e}"));
                self.line_count = None;
            }
        }
    }

    fn clear(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => report(&format!("clear failed for {}: {e}", self.path.display())),
        }
        self.line_count = Some(0);
    }
}

/// Parse a telemetry file. A missing file is empty; corrupt lines are skipped.
/// A file holding a single JSON array is accepted as well.
fn read_events(path: &Path) -> Result<Vec<TelemetryEvent>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(ScsError::io(path, source)),
    };

    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| ScsError::io(path, source))?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }

    if lines.first().is_some_and(|l| l.starts_with('[')) {
        let joined = lines.join("\n");
        if let Ok(events) = serde_json::from_str::<Vec<TelemetryEvent>>(&joined) {
            return Ok(events);
        }
    }

    let mut events = Vec::with_capacity(lines.len());
    let mut skipped = 0_usize;
    for line in &lines {
        match serde_json::from_str::<TelemetryEvent>(line) {
            Ok(event) => events.push(event),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        report(&format!(
            "skipped {skipped} unreadable line(s) in {}",
            path.display()
        ));
    }
    Ok(events)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn report(message: &str) {
    let _ = writeln!(io::stderr(), "[SCS-TELEMETRY] {message}");
}
