//! JobOrchestrator
//!
//! Jobs flow through an unbounded intake queue to a single dispatcher task.
//! The dispatcher honors pause, takes a start permit from the sliding-window
//! limiter and a worker permit from the pool, then spawns the attempt. A
//! failed attempt is re-queued after its backoff; the job stays `processing`
//! until it lands in a terminal state and counts as delayed while it waits
//! out the backoff. An artifact pair is published together or not at all.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use framegen_core::{ContentHash, FrameGenError, FrameSpec, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, watch, Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use crate::batch::{BatchEntry, BatchRun};
use crate::config::{FrameGenConfig, QueueConfig};
use crate::events::{PipelineStage, StageEvent, StageReporter, EVENT_CHANNEL_CAPACITY};
use crate::gateway::{PersistenceGateway, StorageGateway};
use crate::job::{GenerationJob, JobOutcome, JobRecordUpdate, JobStatus};
use crate::limiter::StartLimiter;
use crate::pipeline::AssetPipeline;
use crate::storage::artifact_key;

const GLB_CONTENT_TYPE: &str = "model/gltf-binary";
const USDZ_CONTENT_TYPE: &str = "model/vnd.usdz+zip";

/// Result of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub job_id: String,
    /// True when an in-flight job for the same frame absorbed this request
    pub coalesced: bool,
}

/// Aggregate queue counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMetrics {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub delayed: usize,
    pub paused: bool,
}

/// What a successful attempt produced
enum Finished {
    /// The frame id is unknown to persistence
    Missing,
    Skipped {
        model_url: Option<String>,
        usdz_url: Option<String>,
        byte_size: Option<u64>,
    },
    Delivered {
        model_url: String,
        usdz_url: String,
        byte_size: u64,
        usdz_genuine: bool,
        elapsed_ms: u64,
    },
}

pub struct Orchestrator {
    inner: Arc<Inner>,
    dispatcher: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    queue: QueueConfig,
    scratch_dir: Option<PathBuf>,
    persistence: Arc<dyn PersistenceGateway>,
    storage: Arc<dyn StorageGateway>,
    pipeline: Arc<dyn AssetPipeline>,
    jobs: Arc<DashMap<String, GenerationJob>>,
    /// Dedup key to the job currently holding it
    active: DashMap<String, String>,
    sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
    accepting: AtomicBool,
    paused: watch::Sender<bool>,
    workers: Arc<Semaphore>,
    limiter: StartLimiter,
    events: broadcast::Sender<StageEvent>,
    /// Signalled whenever a job reaches a terminal state
    settled: Notify,
}

impl Orchestrator {
    /// Start the dispatcher. Must be called from within a tokio runtime.
    pub fn start(
        config: &FrameGenConfig,
        persistence: Arc<dyn PersistenceGateway>,
        storage: Arc<dyn StorageGateway>,
        pipeline: Arc<dyn AssetPipeline>,
    ) -> Result<Self> {
        config.check()?;
        let queue = config.queue.clone();
        let (sender, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (paused, _) = watch::channel(false);

        let inner = Arc::new(Inner {
            limiter: StartLimiter::new(queue.rate_limit_starts, queue.rate_limit_window()),
            workers: Arc::new(Semaphore::new(queue.workers)),
            queue,
            scratch_dir: config.scratch_dir.clone(),
            persistence,
            storage,
            pipeline,
            jobs: Arc::new(DashMap::new()),
            active: DashMap::new(),
            sender: Mutex::new(Some(sender)),
            accepting: AtomicBool::new(true),
            paused,
            events,
            settled: Notify::new(),
        });

        let handle = tokio::spawn(Inner::dispatch(Arc::clone(&inner), receiver));
        tracing::info!(
            workers = inner.queue.workers,
            max_attempts = inner.queue.max_attempts,
            rate_limit_starts = inner.queue.rate_limit_starts,
            "orchestrator started"
        );
        Ok(Self {
            inner,
            dispatcher: tokio::sync::Mutex::new(Some(handle)),
        })
    }

    /// Submit one frame. In-flight work for the same frame is reused.
    pub fn submit(&self, frame_id: &str, force: bool) -> Result<Submission> {
        self.inner.submit(frame_id, force)
    }

    /// Submit one job per frame id, in order
    pub fn submit_batch<S: AsRef<str>>(&self, frame_ids: &[S], force: bool) -> Vec<Result<Submission>> {
        frame_ids
            .iter()
            .map(|id| self.inner.submit(id.as_ref(), force))
            .collect()
    }

    /// Submit every frame missing at least one artifact
    pub async fn submit_missing(&self, force: bool) -> Result<Vec<Submission>> {
        let frames = self.inner.persistence.get_frames_missing_models().await?;
        tracing::info!(count = frames.len(), "submitting frames missing models");
        frames
            .iter()
            .map(|frame| self.inner.submit(&frame.id, force))
            .collect()
    }

    /// Submit a batch and wait for every job; per-frame failures become entries
    pub async fn run_batch<S: AsRef<str>>(&self, frame_ids: &[S], force: bool) -> BatchRun {
        let submissions = self.submit_batch(frame_ids, force);
        let mut run = BatchRun::new();
        for (frame_id, submission) in frame_ids.iter().zip(submissions) {
            let frame_id = frame_id.as_ref();
            let entry = match submission {
                Ok(sub) => match self.wait(&sub.job_id).await {
                    Ok(job) => BatchEntry::from_job(frame_id, &job),
                    Err(e) => BatchEntry::failed(frame_id, Some(sub.job_id), e.to_string()),
                },
                Err(e) => BatchEntry::failed(frame_id, None, e.to_string()),
            };
            run.push(entry);
        }
        tracing::info!(
            total = run.total(),
            completed = run.completed,
            skipped = run.skipped,
            not_found = run.not_found,
            failed = run.failed,
            "batch finished"
        );
        run
    }

    /// Run every frame missing at least one artifact as a batch
    pub async fn run_missing(&self, force: bool) -> Result<BatchRun> {
        let ids: Vec<String> = self
            .inner
            .persistence
            .get_frames_missing_models()
            .await?
            .into_iter()
            .map(|f| f.id)
            .collect();
        Ok(self.run_batch(&ids, force).await)
    }

    /// Snapshot of a job
    pub fn status(&self, job_id: &str) -> Result<GenerationJob> {
        self.inner.snapshot(job_id)
    }

    /// Wait until the job is terminal
    pub async fn wait(&self, job_id: &str) -> Result<GenerationJob> {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let job = self.inner.snapshot(job_id)?;
            if job.is_terminal() {
                return Ok(job);
            }
            notified.await;
        }
    }

    pub fn metrics(&self) -> QueueMetrics {
        let mut metrics = QueueMetrics {
            paused: *self.inner.paused.borrow(),
            ..QueueMetrics::default()
        };
        for job in self.inner.jobs.iter() {
            match job.status {
                JobStatus::Pending => metrics.waiting += 1,
                JobStatus::Processing if job.delayed => metrics.delayed += 1,
                JobStatus::Processing => metrics.active += 1,
                JobStatus::Completed => metrics.completed += 1,
                JobStatus::Failed => metrics.failed += 1,
            }
        }
        metrics
    }

    /// Stop starting jobs; running attempts continue
    pub fn pause(&self) {
        self.inner.paused.send_replace(true);
        tracing::info!("intake paused");
    }

    pub fn resume(&self) {
        if self.inner.paused.send_replace(false) {
            tracing::info!("intake resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    /// Drop terminal jobs from the status table, returning how many went
    pub fn purge_terminal(&self) -> usize {
        let mut removed = 0;
        self.inner.jobs.retain(|_, job| {
            let keep = !job.is_terminal();
            if !keep {
                removed += 1;
            }
            keep
        });
        tracing::debug!(removed, "purged terminal jobs");
        removed
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.inner.events.subscribe()
    }

    /// Close intake, drain queued, running and retrying jobs, stop the dispatcher
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.accepting.store(false, Ordering::SeqCst);
        // Queued jobs cannot drain while paused
        self.resume();
        self.inner.wait_idle().await;
        self.inner.close_queue();

        if let Some(handle) = self.dispatcher.lock().await.take() {
            handle
                .await
                .map_err(|e| FrameGenError::Queue(format!("dispatcher task failed: {}", e)))?;
        }
        tracing::info!("orchestrator stopped");
        Ok(())
    }
}

impl Inner {
    fn submit(&self, frame_id: &str, force: bool) -> Result<Submission> {
        let key = frame_id.trim();
        if key.is_empty() {
            return Err(FrameGenError::Queue("frame id must not be empty".into()));
        }
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(FrameGenError::Queue("orchestrator is shutting down".into()));
        }

        let job_id = match self.active.entry(key.to_string()) {
            Entry::Occupied(existing) => {
                let job_id = existing.get().clone();
                // Later attempts read the flag, so a queued or retrying job picks it up
                if force {
                    if let Some(mut job) = self.jobs.get_mut(&job_id) {
                        job.force = true;
                    }
                }
                tracing::info!(job_id = %job_id, frame_id = key, force, "coalesced into in-flight job");
                return Ok(Submission {
                    job_id,
                    coalesced: true,
                });
            }
            Entry::Vacant(slot) => {
                let job = GenerationJob::new(key, force);
                let job_id = job.id.clone();
                self.jobs.insert(job_id.clone(), job);
                slot.insert(job_id.clone());
                job_id
            }
        };

        if let Err(e) = self.enqueue(&job_id) {
            self.jobs.remove(&job_id);
            self.active.remove_if(key, |_, id| *id == job_id);
            return Err(e);
        }
        tracing::info!(job_id = %job_id, frame_id = key, force, "job submitted");
        Ok(Submission {
            job_id,
            coalesced: false,
        })
    }

    fn enqueue(&self, job_id: &str) -> Result<()> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender
                .send(job_id.to_string())
                .map_err(|_| FrameGenError::Queue("job queue is closed".into())),
            None => Err(FrameGenError::Queue("job queue is closed".into())),
        }
    }

    fn close_queue(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn snapshot(&self, job_id: &str) -> Result<GenerationJob> {
        self.jobs
            .get(job_id)
            .map(|job| job.value().clone())
            .ok_or_else(|| FrameGenError::NotFound(format!("job {}", job_id)))
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.active.is_empty() {
                return;
            }
            notified.await;
        }
    }

    async fn wait_while_paused(&self) {
        let mut paused = self.paused.subscribe();
        let _ = paused.wait_for(|p| !*p).await;
    }

    async fn dispatch(inner: Arc<Inner>, mut receiver: mpsc::UnboundedReceiver<String>) {
        let mut running = JoinSet::new();
        loop {
            tokio::select! {
                Some(joined) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "job task aborted");
                    }
                }
                next = receiver.recv() => {
                    let Some(job_id) = next else { break };
                    inner.wait_while_paused().await;
                    inner.limiter.acquire().await;
                    let permit = match Arc::clone(&inner.workers).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let job_inner = Arc::clone(&inner);
                    running.spawn(async move {
                        let _permit = permit;
                        let attempt = tokio::spawn(Arc::clone(&job_inner).run_attempt(job_id.clone()));
                        if let Err(e) = attempt.await {
                            job_inner.abandon(&job_id, format!("attempt task failed: {}", e));
                        }
                    });
                }
            }
        }
        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "job task aborted");
            }
        }
        tracing::debug!("dispatcher drained");
    }

    /// Mark the job processing and return what the attempt needs
    fn begin_attempt(&self, job_id: &str) -> Option<(String, bool, u32)> {
        let mut job = self.jobs.get_mut(job_id)?;
        if let Err(e) = job.transition(JobStatus::Processing) {
            tracing::error!(job_id, error = %e, "refusing to run job");
            return None;
        }
        job.attempts += 1;
        job.delayed = false;
        Some((job.frame_id.clone(), job.force, job.attempts))
    }

    async fn run_attempt(self: Arc<Self>, job_id: String) {
        let Some((frame_id, force, attempt)) = self.begin_attempt(&job_id) else {
            return;
        };
        let reporter = StageReporter::new(
            &job_id,
            &frame_id,
            attempt,
            self.events.clone(),
            Arc::clone(&self.jobs),
        );
        tracing::info!(job_id = %job_id, frame_id = %frame_id, attempt, "attempt started");

        let started = Instant::now();
        match self.execute(&job_id, &frame_id, force, started, &reporter).await {
            Ok(finished) => self.complete(&job_id, &frame_id, finished, &reporter),
            Err(e) => self.handle_failure(&job_id, &frame_id, attempt, e, started, &reporter).await,
        }
    }

    async fn execute(
        &self,
        job_id: &str,
        frame_id: &str,
        force: bool,
        started: Instant,
        reporter: &StageReporter,
    ) -> Result<Finished> {
        reporter.report(PipelineStage::FetchingSpec);
        let Some(spec) = self.persistence.get_frame(frame_id).await? else {
            return Ok(Finished::Missing);
        };

        reporter.report(PipelineStage::CheckingExisting);
        if !force && spec.has_models() {
            return Ok(Finished::Skipped {
                model_url: spec.model_url,
                usdz_url: spec.usdz_url,
                byte_size: spec.model_size_bytes,
            });
        }

        let record_id = self.ensure_record(job_id, frame_id).await?;
        reporter.report(PipelineStage::RecordCreated);

        // Removed on drop, whichever way this attempt ends
        let scratch = self.scratch()?;
        let built = self.pipeline.build(&spec, scratch.path(), reporter).await?;

        reporter.report(PipelineStage::Uploading);
        let glb_key = stored_key(&spec, &built.primary.path, "glb").await?;
        let usdz_key = stored_key(&spec, &built.secondary.path, "usdz").await?;
        let model_url = self
            .storage
            .upload(&built.primary.path, &glb_key, GLB_CONTENT_TYPE)
            .await?;
        let usdz_url = match self
            .storage
            .upload(&built.secondary.path, &usdz_key, USDZ_CONTENT_TYPE)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                self.discard(&spec, &[&glb_key, &usdz_key]).await;
                return Err(e);
            }
        };

        reporter.report(PipelineStage::Persisting);
        let byte_size = built.primary.byte_size;
        if let Err(e) = self
            .persistence
            .update_frame_models(frame_id, &model_url, &usdz_url, byte_size)
            .await
        {
            self.discard(&spec, &[&glb_key, &usdz_key]).await;
            return Err(e);
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.persistence
            .update_job_record(
                &record_id,
                JobStatus::Completed,
                Some(JobRecordUpdate {
                    model_url: Some(model_url.clone()),
                    usdz_url: Some(usdz_url.clone()),
                    byte_size: Some(byte_size),
                    elapsed_ms: Some(elapsed_ms),
                    error: None,
                }),
            )
            .await?;

        Ok(Finished::Delivered {
            model_url,
            usdz_url,
            byte_size,
            usdz_genuine: built.secondary.genuine,
            elapsed_ms,
        })
    }

    /// Create the persisted record on the first attempt, advance it on retries
    async fn ensure_record(&self, job_id: &str, frame_id: &str) -> Result<String> {
        let existing = self.jobs.get(job_id).and_then(|job| job.record_id.clone());
        let record_id = match existing {
            Some(id) => id,
            None => {
                let id = self.persistence.create_job_record(frame_id).await?;
                if let Some(mut job) = self.jobs.get_mut(job_id) {
                    job.record_id = Some(id.clone());
                }
                id
            }
        };
        self.persistence
            .update_job_record(&record_id, JobStatus::Processing, None)
            .await?;
        Ok(record_id)
    }

    fn scratch(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("framegen-");
        let dir = match &self.scratch_dir {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    /// Best effort removal of artifacts no frame points at; the pair is
    /// published together or not at all
    async fn discard(&self, spec: &FrameSpec, keys: &[&str]) {
        for key in keys {
            let url = self.storage.public_url(key);
            let referenced = spec.model_url.as_deref() == Some(url.as_str())
                || spec.usdz_url.as_deref() == Some(url.as_str());
            if referenced {
                continue;
            }
            match self.storage.delete(key).await {
                Ok(()) => tracing::debug!(frame_id = %spec.id, key = *key, "discarded unpublished artifact"),
                Err(e) => tracing::warn!(frame_id = %spec.id, key = *key, error = %e, "failed to discard artifact"),
            }
        }
    }

    fn complete(&self, job_id: &str, frame_id: &str, finished: Finished, reporter: &StageReporter) {
        match finished {
            Finished::Missing => {
                reporter.report(PipelineStage::Failed);
                tracing::warn!(job_id, frame_id, "frame not found");
                let message = FrameGenError::NotFound(format!("frame {}", frame_id)).to_string();
                self.settle(job_id, JobStatus::Failed, JobOutcome::NotFound, |job| {
                    job.error = Some(message);
                });
            }
            Finished::Skipped {
                model_url,
                usdz_url,
                byte_size,
            } => {
                reporter.report(PipelineStage::Skipped);
                tracing::info!(job_id, frame_id, "artifacts already exist, skipped");
                self.settle(job_id, JobStatus::Completed, JobOutcome::Skipped, |job| {
                    job.model_url = model_url;
                    job.usdz_url = usdz_url;
                    job.byte_size = byte_size;
                    job.error = None;
                });
            }
            Finished::Delivered {
                model_url,
                usdz_url,
                byte_size,
                usdz_genuine,
                elapsed_ms,
            } => {
                reporter.report(PipelineStage::Completed);
                tracing::info!(job_id, frame_id, byte_size, elapsed_ms, usdz_genuine, "job completed");
                self.settle(job_id, JobStatus::Completed, JobOutcome::Completed, |job| {
                    job.model_url = Some(model_url);
                    job.usdz_url = Some(usdz_url);
                    job.byte_size = Some(byte_size);
                    job.usdz_genuine = Some(usdz_genuine);
                    job.elapsed_ms = Some(elapsed_ms);
                    job.error = None;
                });
            }
        }
    }

    async fn handle_failure(
        self: &Arc<Self>,
        job_id: &str,
        frame_id: &str,
        attempt: u32,
        error: FrameGenError,
        started: Instant,
        reporter: &StageReporter,
    ) {
        let message = error.to_string();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if error.is_retryable() && attempt < self.queue.max_attempts {
            let delay = self.queue.backoff(attempt);
            reporter.report(PipelineStage::RetryScheduled);
            tracing::warn!(
                job_id,
                frame_id,
                attempt,
                kind = error.kind(),
                delay_ms = delay.as_millis() as u64,
                error = %message,
                "attempt failed, retry scheduled"
            );
            self.record_failure(job_id, JobStatus::Processing, &message, elapsed_ms).await;
            if let Some(mut job) = self.jobs.get_mut(job_id) {
                job.delayed = true;
                job.error = Some(message);
            }

            let inner = Arc::clone(self);
            let job_id = job_id.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // Back in the queue, no longer waiting out a backoff
                if let Some(mut job) = inner.jobs.get_mut(&job_id) {
                    job.delayed = false;
                }
                if let Err(e) = inner.enqueue(&job_id) {
                    inner.abandon(&job_id, e.to_string());
                }
            });
            return;
        }

        reporter.report(PipelineStage::Failed);
        tracing::error!(job_id, frame_id, attempts = attempt, kind = error.kind(), error = %message, "job failed");
        self.record_failure(job_id, JobStatus::Failed, &message, elapsed_ms).await;
        self.settle(job_id, JobStatus::Failed, JobOutcome::Failed, |job| {
            job.error = Some(message);
        });
    }

    /// Best effort; a broken persistence layer must not wedge the job
    async fn record_failure(&self, job_id: &str, status: JobStatus, message: &str, elapsed_ms: u64) {
        let record_id = self.jobs.get(job_id).and_then(|job| job.record_id.clone());
        let Some(record_id) = record_id else {
            return;
        };
        let update = JobRecordUpdate {
            elapsed_ms: Some(elapsed_ms),
            error: Some(message.to_string()),
            ..JobRecordUpdate::default()
        };
        if let Err(e) = self
            .persistence
            .update_job_record(&record_id, status, Some(update))
            .await
        {
            tracing::warn!(job_id, record_id = %record_id, error = %e, "failed to update job record");
        }
    }

    /// Terminal failure outside the normal attempt path
    fn abandon(&self, job_id: &str, message: String) {
        tracing::error!(job_id, error = %message, "job abandoned");
        self.settle(job_id, JobStatus::Failed, JobOutcome::Failed, |job| {
            job.stage = PipelineStage::Failed;
            job.error = Some(message);
        });
    }

    /// Move a job to a terminal state, release its dedup key and wake waiters
    fn settle<F>(&self, job_id: &str, status: JobStatus, outcome: JobOutcome, fill: F)
    where
        F: FnOnce(&mut GenerationJob),
    {
        let frame_id = match self.jobs.get_mut(job_id) {
            Some(mut job) => {
                if job.is_terminal() {
                    return;
                }
                if let Err(e) = job.transition(status) {
                    tracing::error!(job_id, error = %e, "invalid terminal transition");
                    return;
                }
                job.outcome = Some(outcome);
                fill(job.value_mut());
                job.frame_id.clone()
            }
            None => return,
        };
        self.active.remove_if(&frame_id, |_, id| id == job_id);
        self.settled.notify_waiters();
    }
}

async fn stored_key(spec: &FrameSpec, path: &Path, extension: &str) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(artifact_key(&spec.id, &ContentHash::from_bytes(&bytes), extension))
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.dispatcher.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
