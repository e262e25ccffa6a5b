//! FrameGen Jobs - Background orchestration of frame model generation
//!
//! Schedules, dedups, retries and tracks generation work across single and
//! batch requests. Each job fetches a frame spec through a
//! `PersistenceGateway`, builds both artifacts with an `AssetPipeline`, and
//! publishes them through a `StorageGateway`.

pub mod batch;
pub mod config;
pub mod events;
pub mod gateway;
pub mod job;
mod limiter;
mod orchestrator;
pub mod pipeline;
pub mod storage;

pub use batch::{BatchEntry, BatchRun};
pub use config::FrameGenConfig;
pub use events::{PipelineStage, StageEvent, StageReporter};
pub use gateway::{FilePersistence, InMemoryPersistence, PersistenceGateway, StorageGateway};
pub use job::{GenerationJob, JobOutcome, JobRecord, JobRecordUpdate, JobStatus};
pub use limiter::StartLimiter;
pub use orchestrator::{Orchestrator, QueueMetrics, Submission};
pub use pipeline::{AssetPipeline, BuiltAssets, FrameModelPipeline};
pub use storage::LocalStorage;
