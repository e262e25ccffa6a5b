//! Pipeline stage events

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::job::GenerationJob;

/// Capacity of the stage event channel; slow subscribers see `Lagged`
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Checkpoints a job passes through, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Queued,
    FetchingSpec,
    CheckingExisting,
    RecordCreated,
    Synthesizing,
    Exporting,
    Validating,
    Converting,
    Uploading,
    Persisting,
    Completed,
    Skipped,
    RetryScheduled,
    Failed,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 14] = [
        PipelineStage::Queued,
        PipelineStage::FetchingSpec,
        PipelineStage::CheckingExisting,
        PipelineStage::RecordCreated,
        PipelineStage::Synthesizing,
        PipelineStage::Exporting,
        PipelineStage::Validating,
        PipelineStage::Converting,
        PipelineStage::Uploading,
        PipelineStage::Persisting,
        PipelineStage::Completed,
        PipelineStage::Skipped,
        PipelineStage::RetryScheduled,
        PipelineStage::Failed,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Coarse progress for status displays
    pub fn percent(&self) -> u8 {
        match self {
            PipelineStage::Queued | PipelineStage::RetryScheduled => 0,
            PipelineStage::FetchingSpec => 5,
            PipelineStage::CheckingExisting => 10,
            PipelineStage::RecordCreated => 20,
            PipelineStage::Synthesizing => 30,
            PipelineStage::Exporting => 45,
            PipelineStage::Validating => 55,
            PipelineStage::Converting => 65,
            PipelineStage::Uploading => 80,
            PipelineStage::Persisting => 90,
            PipelineStage::Completed | PipelineStage::Skipped | PipelineStage::Failed => 100,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStage::Completed | PipelineStage::Skipped | PipelineStage::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Queued => "queued",
            PipelineStage::FetchingSpec => "fetching_spec",
            PipelineStage::CheckingExisting => "checking_existing",
            PipelineStage::RecordCreated => "record_created",
            PipelineStage::Synthesizing => "synthesizing",
            PipelineStage::Exporting => "exporting",
            PipelineStage::Validating => "validating",
            PipelineStage::Converting => "converting",
            PipelineStage::Uploading => "uploading",
            PipelineStage::Persisting => "persisting",
            PipelineStage::Completed => "completed",
            PipelineStage::Skipped => "skipped",
            PipelineStage::RetryScheduled => "retry_scheduled",
            PipelineStage::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    pub job_id: String,
    pub frame_id: String,
    pub attempt: u32,
    pub stage: PipelineStage,
}

/// Handle a running attempt uses to announce stage changes.
///
/// Updates the job's visible stage and broadcasts a `StageEvent`.
#[derive(Clone)]
pub struct StageReporter {
    job_id: String,
    frame_id: String,
    attempt: u32,
    events: Option<broadcast::Sender<StageEvent>>,
    jobs: Option<Arc<DashMap<String, GenerationJob>>>,
}

impl StageReporter {
    pub(crate) fn new(
        job_id: &str,
        frame_id: &str,
        attempt: u32,
        events: broadcast::Sender<StageEvent>,
        jobs: Arc<DashMap<String, GenerationJob>>,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            frame_id: frame_id.to_string(),
            attempt,
            events: Some(events),
            jobs: Some(jobs),
        }
    }

    /// A reporter that goes nowhere, for running a pipeline outside the orchestrator
    pub fn detached(frame_id: &str) -> Self {
        Self {
            job_id: String::new(),
            frame_id: frame_id.to_string(),
            attempt: 1,
            events: None,
            jobs: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn report(&self, stage: PipelineStage) {
        if let Some(jobs) = &self.jobs {
            if let Some(mut job) = jobs.get_mut(&self.job_id) {
                job.stage = stage;
            }
        }
        tracing::debug!(
            job_id = %self.job_id,
            frame_id = %self.frame_id,
            attempt = self.attempt,
            stage = %stage,
            "stage"
        );
        if let Some(events) = &self.events {
            // No subscribers is fine
            let _ = events.send(StageEvent {
                job_id: self.job_id.clone(),
                frame_id: self.frame_id.clone(),
                attempt: self.attempt,
                stage,
            });
        }
    }
}
