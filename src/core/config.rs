//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, ScsError};
use crate::core::paths::resolve_absolute_path;

/// Full sampler configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Generator seed.
    pub rng: RngConfig,
    /// Selection ladder and fill tuning.
    pub selector: SelectorConfig,
    /// Stress harness sizing.
    pub stress: StressConfig,
    /// Rare-event monitor thresholds.
    pub monitor: MonitorConfig,
    /// File locations.
    pub paths: PathsConfig,
}

/// Generator seeding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RngConfig {
    /// Seed the generator starts from.
    pub seed: u32,
}

/// Diversity selector knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectorConfig {
    /// Items requested when the caller does not pass a count.
    pub target_count: usize,
    /// Wall-clock budget for the threshold ladder, polled once per step.
    pub timeout_ms: u64,
    /// Neighbouring scores at most this far apart tie and sort by identity.
    pub tie_epsilon: f64,
}

/// Stress-harness workload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StressConfig {
    /// Base seed; each pool size mixes in its own.
    pub seed: u32,
    /// Upper bound on selections per pool size.
    pub test_cases: usize,
    /// Selections per pool size are `min(test_cases, ceil(iteration_budget / size))`.
    pub iteration_budget: usize,
    /// Pool sizes to exercise, in order.
    pub pool_sizes: Vec<usize>,
    /// Items requested per selection.
    pub target_count: usize,
    /// Selector timeout used while stressing.
    pub timeout_ms: u64,
    /// Worker threads; pool sizes are distributed across them.
    pub parallelism: usize,
}

/// Rare-event monitor thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Telemetry events retained; the oldest are evicted first.
    pub max_events: usize,
    /// Below this the binomial test reports insufficient data.
    pub min_samples_for_test: u64,
    /// Alerts are only evaluated at or above this many events.
    pub min_samples_for_alert: u64,
    /// p-value below which a statistical anomaly is raised.
    pub alert_significance: f64,
    /// |z| above which a high-deviation alert is raised.
    pub max_deviation_sigma: f64,
    /// Raised alerts kept for reports.
    pub max_alert_history: usize,
}

/// Filesystem paths used by scs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Config file path.
    pub config_file: PathBuf,
    /// JSONL telemetry store.
    pub telemetry_store: PathBuf,
    /// JSONL activity log.
    pub activity_log: PathBuf,
}

impl Default for RngConfig {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            target_count: 8,
            timeout_ms: 5_000,
            tie_epsilon: 0.001,
        }
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_cases: 100,
            iteration_budget: 1_000,
            pool_sizes: vec![10, 50, 100, 500, 1_000, 2_000, 5_000, 10_000],
            target_count: 8,
            timeout_ms: 10_000,
            parallelism: std::thread::available_parallelism()
                .map_or(2, |n| n.get().saturating_div(2).max(1)),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            min_samples_for_test: 100,
            min_samples_for_alert: 1_000,
            alert_significance: 0.01,
            max_deviation_sigma: 5.0,
            max_alert_history: 100,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[SCS-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("scs").join("config.toml");
        let data = home_dir.join(".local").join("share").join("scs");
        Self {
            config_file: cfg,
            telemetry_store: data.join("telemetry.jsonl"),
            activity_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| ScsError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(ScsError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging/telemetry.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut get = |name: &str| lookup(name).map(|raw| (name.to_string(), raw));

        // rng
        if let Some((name, raw)) = get("SCS_RNG_SEED") {
            self.rng.seed = parse_env(&name, &raw)?;
        }

        // selector
        if let Some((name, raw)) = get("SCS_SELECTOR_TARGET_COUNT") {
            self.selector.target_count = parse_env(&name, &raw)?;
        }
        if let Some((name, raw)) = get("SCS_SELECTOR_TIMEOUT_MS") {
            self.selector.timeout_ms = parse_env(&name, &raw)?;
        }
        if let Some((name, raw)) = get("SCS_SELECTOR_TIE_EPSILON") {
            self.selector.tie_epsilon = parse_env(&name, &raw)?;
        }

        // stress
        if let Some((name, raw)) = get("SCS_STRESS_SEED") {
            self.stress.seed = parse_env(&name, &raw)?;
        }
        if let Some((name, raw)) = get("SCS_STRESS_TEST_CASES") {
            self.stress.test_cases = parse_env(&name, &raw)?;
        }
        if let Some((name, raw)) = get("SCS_STRESS_ITERATION_BUDGET") {
            self.stress.iteration_budget = parse_env(&name, &raw)?;
        }
        if let Some((name, raw)) = get("SCS_STRESS_POOL_SIZES") {
            self.stress.pool_sizes = parse_env_list(&name, &raw)?;
        }
        if let Some((name, raw)) = get("SCS_STRESS_TARGET_COUNT") {
            self.stress.target_count = parse_env(&name, &raw)?;
        }
        if let Some((name, raw)) = get("SCS_STRESS_TIMEOUT_MS") {
            self.stress.timeout_ms = parse_env(&name, &raw)?;
        }
        if let Some((name, raw)) = get("SCS_STRESS_PARALLELISM") {
            self.stress.parallelism = parse_env(&name, &raw)?;
        }

        // monitor
        if let Some((name, raw)) = get("SCS_MONITOR_MAX_EVENTS") {
            self.monitor.max_events = parse_env(&name, &raw)?;
        }
        if let Some((name, raw)) = get("SCS_MONITOR_MIN_SAMPLES_FOR_TEST") {
            self.monitor.min_samples_for_test = parse_env(&name, &raw)?;
        }
        if let Some((name, raw)) = get("SCS_MONITOR_MIN_SAMPLES_FOR_ALERT") {
            self.monitor.min_samples_for_alert = parse_env(&name, &raw)?;
        }
        if let Some((name, raw)) = get("SCS_MONITOR_ALERT_SIGNIFICANCE") {
            self.monitor.alert_significance = parse_env(&name, &raw)?;
        }
        if let Some((name, raw)) = get("SCS_MONITOR_MAX_DEVIATION_SIGMA") {
            self.monitor.max_deviation_sigma = parse_env(&name, &raw)?;
        }

        // paths
        if let Some((_, raw)) = get("SCS_PATHS_TELEMETRY_STORE") {
            self.paths.telemetry_store = PathBuf::from(raw);
        }
        if let Some((_, raw)) = get("SCS_PATHS_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        Ok(())
    }

    /// Make data paths absolute so log lines and reports are unambiguous.
    fn normalize_paths(&mut self) {
        self.paths.telemetry_store = resolve_absolute_path(&self.paths.telemetry_store);
        self.paths.activity_log = resolve_absolute_path(&self.paths.activity_log);
    }

    fn validate(&self) -> Result<()> {
        if self.selector.target_count == 0 {
            return Err(ScsError::InvalidConfig {
                details: "selector.target_count must be >= 1".to_string(),
            });
        }
        if !(self.selector.tie_epsilon > 0.0 && self.selector.tie_epsilon.is_finite()) {
            return Err(ScsError::InvalidConfig {
                details: format!(
                    "selector.tie_epsilon must be a positive finite number, got {}",
                    self.selector.tie_epsilon
                ),
            });
        }

        if self.stress.pool_sizes.is_empty() || self.stress.pool_sizes.contains(&0) {
            return Err(ScsError::InvalidConfig {
                details: "stress.pool_sizes must be non-empty and contain no zero sizes"
                    .to_string(),
            });
        }
        if self.stress.test_cases == 0 || self.stress.iteration_budget == 0 {
            return Err(ScsError::InvalidConfig {
                details: "stress.test_cases and stress.iteration_budget must be >= 1".to_string(),
            });
        }
        if self.stress.target_count == 0 {
            return Err(ScsError::InvalidConfig {
                details: "stress.target_count must be >= 1".to_string(),
            });
        }
        if self.stress.parallelism == 0 {
            return Err(ScsError::InvalidConfig {
                details: "stress.parallelism must be >= 1".to_string(),
            });
        }

        if self.monitor.max_events == 0 {
            return Err(ScsError::InvalidConfig {
                details: "monitor.max_events must be >= 1".to_string(),
            });
        }
        validate_open_prob("monitor.alert_significance", self.monitor.alert_significance)?;
        if !(self.monitor.max_deviation_sigma > 0.0) {
            return Err(ScsError::InvalidConfig {
                details: format!(
                    "monitor.max_deviation_sigma must be > 0, got {}",
                    self.monitor.max_deviation_sigma
                ),
            });
        }
        if self.monitor.min_samples_for_alert < self.monitor.min_samples_for_test {
            return Err(ScsError::InvalidConfig {
                details: "monitor.min_samples_for_alert must be >= min_samples_for_test"
                    .to_string(),
            });
        }

        Ok(())
    }
}

fn validate_open_prob(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value < 1.0) {
        return Err(ScsError::InvalidConfig {
            details: format!("{name} must be in (0,1), got {value}"),
        });
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| ScsError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_list(name: &str, raw: &str) -> Result<Vec<usize>> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| parse_env(name, part))
        .collect()
}
