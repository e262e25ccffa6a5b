//! Batch runs
//!
//! A batch is one independent job per frame id. Outcomes are collected in
//! submission order and a failing frame never aborts its siblings.

use serde::{Deserialize, Serialize};

use crate::job::{GenerationJob, JobOutcome};

/// Outcome of one frame within a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub frame_id: String,
    /// Absent when the frame could not even be submitted
    pub job_id: Option<String>,
    pub outcome: JobOutcome,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub usdz_url: Option<String>,
    #[serde(default)]
    pub usdz_genuine: Option<bool>,
    #[serde(default)]
    pub byte_size: Option<u64>,
    #[serde(default)]
    pub elapsed_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BatchEntry {
    pub fn from_job(frame_id: &str, job: &GenerationJob) -> Self {
        Self {
            frame_id: frame_id.to_string(),
            job_id: Some(job.id.clone()),
            outcome: job.outcome.unwrap_or(JobOutcome::Failed),
            model_url: job.model_url.clone(),
            usdz_url: job.usdz_url.clone(),
            usdz_genuine: job.usdz_genuine,
            byte_size: job.byte_size,
            elapsed_ms: job.elapsed_ms,
            error: job.error.clone(),
        }
    }

    pub fn failed(frame_id: &str, job_id: Option<String>, error: String) -> Self {
        Self {
            frame_id: frame_id.to_string(),
            job_id,
            outcome: JobOutcome::Failed,
            model_url: None,
            usdz_url: None,
            usdz_genuine: None,
            byte_size: None,
            elapsed_ms: None,
            error: Some(error),
        }
    }
}

/// Result of a batch operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRun {
    pub entries: Vec<BatchEntry>,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub not_found: usize,
}

impl BatchRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: BatchEntry) {
        match entry.outcome {
            JobOutcome::Completed => self.completed += 1,
            JobOutcome::Failed => self.failed += 1,
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::NotFound => self.not_found += 1,
        }
        self.entries.push(entry);
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Frames whose USDZ is a fallback copy
    pub fn fallback_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.usdz_genuine == Some(false))
            .count()
    }

    /// Print a per-frame listing and the totals
    pub fn print_summary(&self) {
        for entry in &self.entries {
            print!("  {}  -> {}", entry.frame_id, entry.outcome);
            match entry.outcome {
                JobOutcome::Completed => {
                    let size = entry.byte_size.unwrap_or(0);
                    let secs = entry.elapsed_ms.unwrap_or(0) as f64 / 1000.0;
                    print!(" ({} bytes, {:.1}s)", size, secs);
                    if entry.usdz_genuine == Some(false) {
                        print!(" [usdz fallback]");
                    }
                    println!();
                }
                JobOutcome::Failed | JobOutcome::NotFound => {
                    println!(": {}", entry.error.as_deref().unwrap_or("unknown error"));
                }
                JobOutcome::Skipped => println!(),
            }
        }
        println!(
            "\nBatch: {} frames, {} completed, {} skipped, {} not found, {} failed",
            self.total(),
            self.completed,
            self.skipped,
            self.not_found,
            self.failed
        );
    }
}

impl FromIterator<BatchEntry> for BatchRun {
    fn from_iter<I: IntoIterator<Item = BatchEntry>>(iter: I) -> Self {
        let mut run = BatchRun::new();
        for entry in iter {
            run.push(entry);
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    #[test]
    fn test_counts_follow_outcomes() {
        let mut done = GenerationJob::new("a", false);
        done.transition(JobStatus::Processing).unwrap();
        done.transition(JobStatus::Completed).unwrap();
        done.outcome = Some(JobOutcome::Completed);
        done.usdz_genuine = Some(false);

        let mut skipped = GenerationJob::new("b", false);
        skipped.outcome = Some(JobOutcome::Skipped);

        let run: BatchRun = vec![
            BatchEntry::from_job("a", &done),
            BatchEntry::from_job("b", &skipped),
            BatchEntry::failed("c", None, "queue closed".into()),
        ]
        .into_iter()
        .collect();

        assert_eq!(run.total(), 3);
        assert_eq!(run.completed, 1);
        assert_eq!(run.skipped, 1);
        assert_eq!(run.failed, 1);
        assert_eq!(run.not_found, 0);
        assert_eq!(run.fallback_count(), 1);
        assert_eq!(run.entries[2].frame_id, "c");
    }

    #[test]
    fn test_job_without_outcome_counts_as_failed() {
        let job = GenerationJob::new("a", false);
        assert_eq!(BatchEntry::from_job("a", &job).outcome, JobOutcome::Failed);
    }
}
