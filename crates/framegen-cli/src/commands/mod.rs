//! CLI command implementations

pub mod frames;
pub mod jobs;
pub mod model;

use anyhow::{Context as _, Result};
use framegen_jobs::{FilePersistence, FrameGenConfig};
use std::path::{Path, PathBuf};

/// Resolved configuration shared by every command
pub struct Context {
    pub config: FrameGenConfig,
    pub frames: PathBuf,
}

impl Context {
    pub fn load(config_path: Option<&str>, frames: &str) -> Result<Self> {
        let config = match config_path {
            Some(path) => FrameGenConfig::load_from_file(Path::new(path))
                .with_context(|| format!("loading config {}", path))?,
            None => FrameGenConfig::load()?,
        };
        tracing::debug!(
            workers = config.queue.workers,
            storage = %config.storage.root.display(),
            "configuration loaded"
        );
        Ok(Self {
            config,
            frames: PathBuf::from(frames),
        })
    }

    pub async fn persistence(&self) -> Result<FilePersistence> {
        FilePersistence::open(&self.frames, FilePersistence::default_jobs_dir())
            .await
            .with_context(|| format!("opening frame catalog {}", self.frames.display()))
    }
}
