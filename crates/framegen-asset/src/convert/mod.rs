//! Secondary-format (USDZ) conversion
//!
//! An ordered list of strategies is tried until one produces a file. When
//! every strategy fails the adapter can fall back to copying the primary
//! asset under the secondary extension, and says so in the result.

mod adapter;
mod command;

pub use adapter::{ConversionAdapter, ConversionOptions};
pub use command::{default_strategies, find_program, CommandStrategy, StrategyConfig};

use async_trait::async_trait;
use framegen_core::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Availability reported by a strategy health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyStatus {
    Available,
    Unavailable(String),
}

/// One external conversion tool
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    /// Strategy name (e.g. "usd_from_gltf", "usdzconvert", "blender")
    fn name(&self) -> &str;

    /// Check that the tool can be invoked
    async fn health_check(&self) -> Result<StrategyStatus>;

    /// Convert `input` into `output`. Bounded in time by the adapter.
    async fn convert(&self, input: &Path, output: &Path) -> Result<()>;
}

/// How a single strategy attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Unavailable,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionAttempt {
    pub strategy: String,
    pub outcome: AttemptOutcome,
    pub detail: String,
    pub duration_ms: u64,
}

/// The secondary asset on disk.
///
/// `genuine` is false when the file is a renamed copy of the primary asset
/// rather than the output of a format-aware converter.
#[must_use = "check `genuine` before trusting the secondary asset"]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub path: PathBuf,
    pub byte_size: u64,
    pub genuine: bool,
    /// Winning strategy, `None` on fallback
    pub strategy: Option<String>,
    pub fallback_reason: Option<String>,
    pub attempts: Vec<ConversionAttempt>,
}

impl ConversionResult {
    pub fn is_fallback(&self) -> bool {
        !self.genuine
    }
}
