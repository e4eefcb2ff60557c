//! Configuration loading and storage root resolution
//!
//! Evaluation parameters travel as an explicit [`EvaluationConfig`] value
//! handed to the aggregator and metrics engine at call time. Nothing here is
//! global or mutable.
//!
//! Storage root resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `PHBENCH_STORAGE_ROOT`
//! 3. TOML config file (`storage_root`)
//! 4. OS-dependent compiled default (fallback)
//!
//! An empty string at any tier is kept as-is: it means "persistence disabled".

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Environment variable consulted for the storage root
pub const STORAGE_ROOT_ENV: &str = "PHBENCH_STORAGE_ROOT";

/// Sources a material needs by default: the reference plus three models
pub const DEFAULT_COVERAGE_K: usize = 4;

/// Confusion matrix normalization policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizePolicy {
    /// Each true-condition row sums to 1
    #[default]
    True,
    /// Each predicted column sums to 1
    Pred,
    /// Whole matrix sums to 1
    All,
}

impl NormalizePolicy {
    /// Parse policy name (`true`, `pred`, `all`)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "true" | "by-true-row" => Some(NormalizePolicy::True),
            "pred" | "by-predicted-column" => Some(NormalizePolicy::Pred),
            "all" | "by-total" => Some(NormalizePolicy::All),
            _ => None,
        }
    }

    /// Canonical config value
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizePolicy::True => "true",
            NormalizePolicy::Pred => "pred",
            NormalizePolicy::All => "all",
        }
    }
}

impl std::fmt::Display for NormalizePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters controlling summary extraction and scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Frequencies above `-imaginary_freq_tol` (THz) count as zero
    pub imaginary_freq_tol: f64,
    /// Number of sources a material needs to enter the comparison
    pub coverage_k: usize,
    /// Confusion matrix normalization
    pub normalize_policy: NormalizePolicy,
    /// Minimum relative density for a DOS maximum to count as a peak
    pub last_peak_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            imaginary_freq_tol: 0.01,
            coverage_k: DEFAULT_COVERAGE_K,
            normalize_policy: NormalizePolicy::True,
            last_peak_threshold: 0.05,
        }
    }
}

impl EvaluationConfig {
    /// Reject parameter combinations the scoring code cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.imaginary_freq_tol.is_finite() || self.imaginary_freq_tol < 0.0 {
            return Err(Error::Config(format!(
                "imaginary_freq_tol must be finite and >= 0, got {}",
                self.imaginary_freq_tol
            )));
        }
        if self.coverage_k == 0 {
            return Err(Error::Config("coverage_k must be >= 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.last_peak_threshold) {
            return Err(Error::Config(format!(
                "last_peak_threshold must be within [0, 1], got {}",
                self.last_peak_threshold
            )));
        }
        Ok(())
    }
}

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Full TOML configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Cache storage root (empty string disables persistence)
    pub storage_root: Option<String>,
    pub logging: LoggingConfig,
    pub evaluation: EvaluationConfig,
}

/// Get default configuration file path for the platform
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("phbench").join("config.toml"))
        .ok_or_else(|| Error::NotFound("Could not determine config directory".to_string()))
}

/// Get OS-dependent default storage root
pub fn default_storage_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("phbench"))
        .unwrap_or_else(|| PathBuf::from("./phbench_data"))
}

/// Load TOML config
///
/// A missing file is not an error: defaults are returned and a warning is
/// logged. A file that exists but does not parse or validate is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    config.evaluation.validate()?;

    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }

    Ok(())
}

/// Storage root resolver
///
/// Walks the priority tiers in order and returns the first value found.
pub struct StorageRootResolver {
    cli_arg: Option<String>,
    toml_value: Option<String>,
}

impl StorageRootResolver {
    /// Create resolver with no overrides
    pub fn new() -> Self {
        Self {
            cli_arg: None,
            toml_value: None,
        }
    }

    /// Set the command-line value (priority 1)
    pub fn with_cli_arg(mut self, value: Option<String>) -> Self {
        self.cli_arg = value;
        self
    }

    /// Set the TOML value (priority 3)
    pub fn with_toml_value(mut self, value: Option<String>) -> Self {
        self.toml_value = value;
        self
    }

    /// Resolve the storage root string
    pub fn resolve(&self) -> String {
        // Priority 1: Command-line argument
        if let Some(value) = &self.cli_arg {
            debug!("Storage root from command line: {:?}", value);
            return value.clone();
        }

        // Priority 2: Environment variable
        if let Ok(value) = std::env::var(STORAGE_ROOT_ENV) {
            debug!("Storage root from {}: {:?}", STORAGE_ROOT_ENV, value);
            return value;
        }

        // Priority 3: TOML config file
        if let Some(value) = &self.toml_value {
            debug!("Storage root from TOML: {:?}", value);
            return value.clone();
        }

        // Priority 4: OS-dependent compiled default
        default_storage_root().to_string_lossy().into_owned()
    }
}

impl Default for StorageRootResolver {
    fn default() -> Self {
        Self::new()
    }
}
