//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `FRAMEGEN_*`
//! 2. Project-local: `.framegen/config.toml`
//! 3. Global: `~/.framegen/config.toml`

use framegen_asset::{
    convert::default_strategies, ConversionOptions, ExportOptions, StrategyConfig,
    DEFAULT_MAX_ASSET_BYTES,
};
use framegen_core::{FrameGenError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Worker pool, retry and start-rate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub workers: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Job starts allowed per window, 0 disables the limiter
    pub rate_limit_starts: u32,
    pub rate_limit_window_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            rate_limit_starts: 10,
            rate_limit_window_ms: 1_000,
        }
    }
}

impl QueueConfig {
    /// Delay before attempt `attempt + 1`, i.e. `base * 2^(attempt-1)` capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        let ms = self.backoff_base_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(ms.min(self.backoff_max_ms))
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub max_asset_bytes: u64,
    pub quantize: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_asset_bytes: DEFAULT_MAX_ASSET_BYTES,
            quantize: true,
        }
    }
}

impl ExportConfig {
    pub fn options(&self) -> ExportOptions {
        ExportOptions {
            quantize: self.quantize,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub timeout_secs: u64,
    pub allow_fallback: bool,
    /// Tried in order
    pub strategies: Vec<StrategyConfig>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            allow_fallback: true,
            strategies: default_strategies(),
        }
    }
}

impl ConversionConfig {
    pub fn options(&self) -> ConversionOptions {
        ConversionOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            allow_fallback: self.allow_fallback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    /// Base of returned URLs; `file://` URLs when unset
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".framegen/storage"),
            public_base_url: None,
        }
    }
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameGenConfig {
    pub queue: QueueConfig,
    pub export: ExportConfig,
    pub conversion: ConversionConfig,
    pub storage: StorageConfig,
    /// Parent of per-job scratch directories, system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
}

impl FrameGenConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut merged = toml::Table::new();

        // Layer 1: Global config (~/.framegen/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                merge_tables(&mut merged, Self::load_table(&global_path)?);
            }
        }

        // Layer 2: Project-local config (.framegen/config.toml)
        let local_path = PathBuf::from(".framegen/config.toml");
        if local_path.exists() {
            merge_tables(&mut merged, Self::load_table(&local_path)?);
        }

        let mut config = Self::from_table(merged)?;

        // Layer 3: Environment variable overrides
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config from a specific file path only, still honoring env overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::from_table(Self::load_table(path)?)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".framegen").join("config.toml"))
    }

    fn load_table(path: &Path) -> Result<toml::Table> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            FrameGenError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    fn from_table(table: toml::Table) -> Result<Self> {
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| FrameGenError::Config(e.to_string()))
    }

    /// Apply `FRAMEGEN_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
            match raw {
                Some(value) => value
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| FrameGenError::Config(format!("{} has invalid value '{}'", key, value))),
                None => Ok(None),
            }
        }

        if let Some(v) = parsed("FRAMEGEN_WORKERS", lookup("FRAMEGEN_WORKERS"))? {
            self.queue.workers = v;
        }
        if let Some(v) = parsed("FRAMEGEN_MAX_ATTEMPTS", lookup("FRAMEGEN_MAX_ATTEMPTS"))? {
            self.queue.max_attempts = v;
        }
        if let Some(v) = parsed("FRAMEGEN_MAX_ASSET_BYTES", lookup("FRAMEGEN_MAX_ASSET_BYTES"))? {
            self.export.max_asset_bytes = v;
        }
        if let Some(v) = parsed("FRAMEGEN_CONVERT_TIMEOUT_SECS", lookup("FRAMEGEN_CONVERT_TIMEOUT_SECS"))? {
            self.conversion.timeout_secs = v;
        }
        if let Some(root) = lookup("FRAMEGEN_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(url) = lookup("FRAMEGEN_PUBLIC_BASE_URL") {
            self.storage.public_base_url = Some(url);
        }
        self.check()
    }

    /// Reject settings the orchestrator cannot run with
    pub fn check(&self) -> Result<()> {
        if self.queue.workers == 0 {
            return Err(FrameGenError::Config("queue.workers must be at least 1".into()));
        }
        if self.queue.max_attempts == 0 {
            return Err(FrameGenError::Config("queue.max_attempts must be at least 1".into()));
        }
        if self.queue.rate_limit_starts > 0 && self.queue.rate_limit_window_ms == 0 {
            return Err(FrameGenError::Config(
                "queue.rate_limit_window_ms must be positive when rate limiting".into(),
            ));
        }
        Ok(())
    }
}

/// Recursively overlay `overlay` onto `base`; tables merge, everything else replaces
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
