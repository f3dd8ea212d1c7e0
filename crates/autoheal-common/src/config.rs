//! ---
//! ah_section: "01-core-functionality"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Shared primitives and utilities for the healing pipeline."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::{debug, warn};

use crate::logging::LogFormat;

/// Threshold key for the deployment latency ceiling in milliseconds.
pub const LATENCY_MS: &str = "latency_ms";
/// Threshold key for the minimum acceptable mean score.
pub const LOW_SCORE_AVG: &str = "low_score_avg";
/// Threshold key for the maximum acceptable heart rate.
pub const HIGH_HEART_RATE: &str = "high_heart_rate";
/// Threshold key for the minimum acceptable oxygen level.
pub const LOW_OXYGEN_LEVEL: &str = "low_oxygen_level";

const DEFAULT_LATENCY_MS: f64 = 24_000.0;
const DEFAULT_LOW_SCORE_AVG: f64 = 40.0;
const DEFAULT_HIGH_HEART_RATE: f64 = 120.0;
const DEFAULT_LOW_OXYGEN_LEVEL: f64 = 95.0;

fn default_thresholds() -> IndexMap<String, f64> {
    let mut map = IndexMap::new();
    map.insert(LATENCY_MS.to_owned(), DEFAULT_LATENCY_MS);
    map.insert(LOW_SCORE_AVG.to_owned(), DEFAULT_LOW_SCORE_AVG);
    map.insert(HIGH_HEART_RATE.to_owned(), DEFAULT_HIGH_HEART_RATE);
    map.insert(LOW_OXYGEN_LEVEL.to_owned(), DEFAULT_LOW_OXYGEN_LEVEL);
    map
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_tracing_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("dataset/student_scores.csv")
}

fn default_epsilon() -> f64 {
    0.1
}

fn default_training_epsilon() -> f64 {
    0.2
}

fn default_alpha() -> f64 {
    0.1
}

fn default_workers() -> usize {
    3
}

fn default_success_probability() -> f64 {
    0.85
}

fn default_min_latency_ms() -> u64 {
    1_000
}

fn default_max_latency_ms() -> u64 {
    5_000
}

fn default_min_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_max_interval() -> Duration {
    Duration::from_secs(8)
}

fn default_simulation_seed() -> u64 {
    0xA11CE_u64
}

/// Primary configuration object for the healing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub paths: LogPaths,
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// Named detector thresholds. Keys missing from a file fall back to defaults.
    #[serde(default = "default_thresholds")]
    pub thresholds: IndexMap<String, f64>,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "AUTOHEAL_CONFIG";

    /// Load configuration from disk, respecting the `AUTOHEAL_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Self::load_with_source(candidates)?
            .map(|loaded| loaded.config)
            .ok_or_else(|| {
                anyhow!(
                    "no configuration files found. inspected: {}",
                    candidates
                        .iter()
                        .map(|p| p.as_ref().display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }

    /// Load configuration together with the effective source path.
    ///
    /// Returns `Ok(None)` when neither the environment override nor any
    /// candidate exists, leaving the caller to decide whether defaults apply.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<Option<LoadedAppConfig>> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(Some(LoadedAppConfig {
                    config,
                    source: Some(path),
                }));
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(Some(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                }));
            }
        }
        Ok(None)
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the named threshold table into detector thresholds.
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::from_named(&self.thresholds)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        self.simulator.validate()?;
        for (name, value) in &self.thresholds {
            if !value.is_finite() {
                return Err(anyhow!("threshold '{}' must be a finite number", name));
            }
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            paths: LogPaths::default(),
            dataset: DatasetConfig::default(),
            thresholds: default_thresholds(),
            policy: PolicyConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Detector thresholds resolved from the named configuration table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub latency_ms: f64,
    pub low_score_avg: f64,
    pub high_heart_rate: f64,
    pub low_oxygen_level: f64,
}

impl Thresholds {
    /// Build thresholds from named values, warning once for every absent key.
    pub fn from_named(named: &IndexMap<String, f64>) -> Self {
        let lookup = |key: &str, default: f64| match named.get(key) {
            Some(value) => *value,
            None => {
                warn!(threshold = key, default, "threshold not configured; using default");
                default
            }
        };
        Self {
            latency_ms: lookup(LATENCY_MS, DEFAULT_LATENCY_MS),
            low_score_avg: lookup(LOW_SCORE_AVG, DEFAULT_LOW_SCORE_AVG),
            high_heart_rate: lookup(HIGH_HEART_RATE, DEFAULT_HIGH_HEART_RATE),
            low_oxygen_level: lookup(LOW_OXYGEN_LEVEL, DEFAULT_LOW_OXYGEN_LEVEL),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            latency_ms: DEFAULT_LATENCY_MS,
            low_score_avg: DEFAULT_LOW_SCORE_AVG,
            high_heart_rate: DEFAULT_HIGH_HEART_RATE,
            low_oxygen_level: DEFAULT_LOW_OXYGEN_LEVEL,
        }
    }
}

/// Locations of every append-only log and the persisted value table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPaths {
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    #[serde(default = "LogPaths::default_deployment")]
    pub deployment_log: String,
    #[serde(default = "LogPaths::default_uptime")]
    pub uptime_log: String,
    #[serde(default = "LogPaths::default_healing")]
    pub healing_log: String,
    #[serde(default = "LogPaths::default_issue")]
    pub issue_log: String,
    #[serde(default = "LogPaths::default_value_table")]
    pub value_table: String,
    #[serde(default = "LogPaths::default_performance")]
    pub performance_log: String,
    #[serde(default = "LogPaths::default_feedback")]
    pub feedback_log: String,
    #[serde(default = "LogPaths::default_fleet")]
    pub fleet_log: String,
}

impl LogPaths {
    fn default_deployment() -> String {
        "deployment_log.csv".to_owned()
    }

    fn default_uptime() -> String {
        "uptime_log.csv".to_owned()
    }

    fn default_healing() -> String {
        "healing_log.csv".to_owned()
    }

    fn default_issue() -> String {
        "issue_log.csv".to_owned()
    }

    fn default_value_table() -> String {
        "rl_log.csv".to_owned()
    }

    fn default_performance() -> String {
        "rl_performance_log.csv".to_owned()
    }

    fn default_feedback() -> String {
        "user_feedback_log.csv".to_owned()
    }

    fn default_fleet() -> String {
        "fleet_deployment_log.csv".to_owned()
    }

    /// Root every log file under `directory`.
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn deployment_log(&self) -> PathBuf {
        self.directory.join(&self.deployment_log)
    }

    pub fn uptime_log(&self) -> PathBuf {
        self.directory.join(&self.uptime_log)
    }

    pub fn healing_log(&self) -> PathBuf {
        self.directory.join(&self.healing_log)
    }

    pub fn issue_log(&self) -> PathBuf {
        self.directory.join(&self.issue_log)
    }

    pub fn value_table(&self) -> PathBuf {
        self.directory.join(&self.value_table)
    }

    pub fn performance_log(&self) -> PathBuf {
        self.directory.join(&self.performance_log)
    }

    pub fn feedback_log(&self) -> PathBuf {
        self.directory.join(&self.feedback_log)
    }

    pub fn fleet_log(&self) -> PathBuf {
        self.directory.join(&self.fleet_log)
    }
}

impl Default for LogPaths {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            deployment_log: Self::default_deployment(),
            uptime_log: Self::default_uptime(),
            healing_log: Self::default_healing(),
            issue_log: Self::default_issue(),
            value_table: Self::default_value_table(),
            performance_log: Self::default_performance(),
            feedback_log: Self::default_feedback(),
            fleet_log: Self::default_fleet(),
        }
    }
}

/// Kind of data the monitored dataset holds; selects the anomaly check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Tabular scores with a `score` column; checked against the mean.
    #[default]
    Scores,
    /// Vital signs with `heart_rate` and `oxygen_level`; last record checked.
    Health,
    /// No data-quality check; only deployment telemetry is classified.
    Unmonitored,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Scores => "scores",
            DatasetKind::Health => "health",
            DatasetKind::Unmonitored => "unmonitored",
        }
    }
}

impl std::str::FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scores" => Ok(DatasetKind::Scores),
            "health" => Ok(DatasetKind::Health),
            "unmonitored" => Ok(DatasetKind::Unmonitored),
            other => Err(format!("unknown dataset kind: {}", other)),
        }
    }
}

/// Monitored dataset and its classification tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub kind: DatasetKind,
}

impl DatasetConfig {
    pub fn new(path: impl Into<PathBuf>, kind: DatasetKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Backup artifact used by the restore action: `<path>.bak`.
    pub fn backup_path(&self) -> PathBuf {
        let mut raw: OsString = self.path.as_os_str().to_owned();
        raw.push(".bak");
        PathBuf::from(raw)
    }

    /// Path rendered for log records and bus payloads.
    pub fn label(&self) -> String {
        self.path.display().to_string()
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            kind: DatasetKind::default(),
        }
    }
}

/// Healing strategy selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Random,
    Adaptive,
}

/// Tunables for the adaptive healing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub kind: PolicyKind,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_training_epsilon")]
    pub training_epsilon: f64,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub training: bool,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl PolicyConfig {
    /// Exploration rate in effect for the configured mode.
    pub fn effective_epsilon(&self) -> f64 {
        if self.training {
            self.training_epsilon
        } else {
            self.epsilon
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("epsilon", self.epsilon),
            ("training_epsilon", self.training_epsilon),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("policy {} must lie in [0, 1], got {}", name, value));
            }
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(anyhow!("policy alpha must lie in (0, 1], got {}", self.alpha));
        }
        Ok(())
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            kind: PolicyKind::default(),
            epsilon: default_epsilon(),
            training_epsilon: default_training_epsilon(),
            alpha: default_alpha(),
            training: false,
            seed: None,
        }
    }
}

/// Parameters for the concurrent deployment fleet.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_success_probability")]
    pub success_probability: f64,
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
    #[serde(default = "default_min_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub min_interval: Duration,
    #[serde(default = "default_max_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub max_interval: Duration,
    #[serde(default = "default_simulation_seed")]
    pub random_seed: u64,
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow!("simulator requires at least one worker"));
        }
        if !(0.0..=1.0).contains(&self.success_probability) {
            return Err(anyhow!(
                "simulator success_probability must lie in [0, 1], got {}",
                self.success_probability
            ));
        }
        if self.min_latency_ms > self.max_latency_ms {
            return Err(anyhow!("simulator min_latency_ms exceeds max_latency_ms"));
        }
        if self.min_interval > self.max_interval {
            return Err(anyhow!("simulator min_interval exceeds max_interval"));
        }
        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            success_probability: default_success_probability(),
            min_latency_ms: default_min_latency_ms(),
            max_latency_ms: default_max_latency_ms(),
            min_interval: default_min_interval(),
            max_interval: default_max_interval(),
            random_seed: default_simulation_seed(),
        }
    }
}

/// Tracing output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_tracing_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_tracing_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
