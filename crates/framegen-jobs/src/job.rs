//! Generation jobs and their persisted records
//!
//! `GenerationJob` is the orchestrator's live view of a unit of work.
//! `JobRecord` is what the persistence gateway stores.

use framegen_core::{FrameGenError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use crate::events::PipelineStage;

/// Status of a generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Forward-only transitions. `Processing -> Processing` is a retry.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a terminal job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    Skipped,
    NotFound,
    Failed,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Skipped => "skipped",
            JobOutcome::NotFound => "not_found",
            JobOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked generation job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Unique job ID (UUID)
    pub id: String,
    /// Trimmed frame identifier, also the dedup key
    pub frame_id: String,
    /// ID of the persisted job record, once created
    #[serde(default)]
    pub record_id: Option<String>,
    /// Regenerate even when both artifacts exist
    pub force: bool,
    pub status: JobStatus,
    #[serde(default)]
    pub outcome: Option<JobOutcome>,
    pub stage: PipelineStage,
    pub attempts: u32,
    /// Waiting out a retry backoff
    #[serde(default)]
    pub delayed: bool,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub usdz_url: Option<String>,
    /// False when the USDZ is a renamed copy of the GLB
    #[serde(default)]
    pub usdz_genuine: Option<bool>,
    #[serde(default)]
    pub byte_size: Option<u64>,
    #[serde(default)]
    pub elapsed_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl GenerationJob {
    /// Create a new pending job
    pub fn new(frame_id: &str, force: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            frame_id: frame_id.to_string(),
            record_id: None,
            force,
            status: JobStatus::Pending,
            outcome: None,
            stage: PipelineStage::Queued,
            attempts: 0,
            delayed: false,
            model_url: None,
            usdz_url: None,
            usdz_genuine: None,
            byte_size: None,
            elapsed_ms: None,
            error: None,
            created_at: OffsetDateTime::now_utc(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, refusing any backward step
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(FrameGenError::Queue(format!(
                "job {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        let now = OffsetDateTime::now_utc();
        if next == JobStatus::Processing && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.completed_at = Some(now);
            self.delayed = false;
        }
        self.status = next;
        Ok(())
    }
}

/// Job record as stored by the persistence gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub frame_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub usdz_url: Option<String>,
    #[serde(default)]
    pub byte_size: Option<u64>,
    #[serde(default)]
    pub elapsed_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl JobRecord {
    pub fn new(frame_id: &str) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            frame_id: frame_id.to_string(),
            status: JobStatus::Pending,
            model_url: None,
            usdz_url: None,
            byte_size: None,
            elapsed_ms: None,
            error: None,
            created_at: OffsetDateTime::now_utc(),
            completed_at: None,
        }
    }

    /// Apply a status change and any result fields
    pub fn apply(&mut self, status: JobStatus, update: Option<JobRecordUpdate>) {
        self.status = status;
        if status.is_terminal() {
            self.completed_at = Some(OffsetDateTime::now_utc());
        }
        if let Some(update) = update {
            if update.model_url.is_some() {
                self.model_url = update.model_url;
            }
            if update.usdz_url.is_some() {
                self.usdz_url = update.usdz_url;
            }
            if update.byte_size.is_some() {
                self.byte_size = update.byte_size;
            }
            if update.elapsed_ms.is_some() {
                self.elapsed_ms = update.elapsed_ms;
            }
            if update.error.is_some() {
                self.error = update.error;
            }
        }
    }
}

/// Result fields written alongside a status change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRecordUpdate {
    pub model_url: Option<String>,
    pub usdz_url: Option<String>,
    pub byte_size: Option<u64>,
    pub elapsed_ms: Option<u64>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = GenerationJob::new("frame-7", false);
        assert_eq!(job.frame_id, "frame-7");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.stage, PipelineStage::Queued);
        assert_eq!(job.attempts, 0);
        assert!(!job.id.is_empty());
    }

    #[test]
    fn test_transitions_never_go_backward() {
        let mut job = GenerationJob::new("frame-7", false);
        job.transition(JobStatus::Processing).unwrap();
        assert!(job.started_at.is_some());
        job.transition(JobStatus::Processing).unwrap();
        job.transition(JobStatus::Completed).unwrap();
        assert!(job.completed_at.is_some());

        assert!(job.transition(JobStatus::Processing).is_err());
        assert!(job.transition(JobStatus::Pending).is_err());
        assert!(job.transition(JobStatus::Failed).is_err());
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_job_serializes_rfc3339() {
        let job = GenerationJob::new("frame-7", true);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["stage"], "queued");
        let created = json["created_at"].as_str().unwrap();
        assert!(created.contains('T'));

        let back: GenerationJob = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, job.id);
        assert!(back.force);
    }

    #[test]
    fn test_record_toml_roundtrip() {
        let mut record = JobRecord::new("frame-7");
        record.apply(
            JobStatus::Completed,
            Some(JobRecordUpdate {
                model_url: Some("https://cdn/frame-7.glb".into()),
                byte_size: Some(4096),
                ..JobRecordUpdate::default()
            }),
        );
        let text = toml::to_string_pretty(&record).unwrap();
        assert!(text.contains("status = \"completed\""));
        let back: JobRecord = toml::from_str(&text).unwrap();
        assert_eq!(back.job_id, record.job_id);
        assert_eq!(back.status, JobStatus::Completed);
        assert_eq!(back.model_url, record.model_url);
        assert_eq!(back.byte_size, Some(4096));
        assert!(back.usdz_url.is_none());
        assert!(back.completed_at.is_some());
    }
}
