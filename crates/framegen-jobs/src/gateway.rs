//! Persistence and storage collaborators
//!
//! The orchestrator only talks to these traits. `InMemoryPersistence` backs
//! tests and embedding; `FilePersistence` keeps frames in a TOML catalog and
//! job records as `.job.toml` files.

use async_trait::async_trait;
use dashmap::DashMap;
use framegen_core::{FrameGenError, FrameSpec, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::job::{JobRecord, JobRecordUpdate, JobStatus};

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn get_frame(&self, id: &str) -> Result<Option<FrameSpec>>;

    async fn list_frames(&self) -> Result<Vec<FrameSpec>>;

    /// Frames lacking at least one of the two artifact URLs
    async fn get_frames_missing_models(&self) -> Result<Vec<FrameSpec>> {
        Ok(self
            .list_frames()
            .await?
            .into_iter()
            .filter(|f| !f.has_models())
            .collect())
    }

    async fn update_frame_models(&self, id: &str, model_url: &str, usdz_url: &str, size: u64) -> Result<()>;

    /// Returns the new record's id
    async fn create_job_record(&self, frame_id: &str) -> Result<String>;

    async fn update_job_record(
        &self,
        job_id: &str,
        status: JobStatus,
        update: Option<JobRecordUpdate>,
    ) -> Result<()>;

    async fn get_job_record(&self, job_id: &str) -> Result<Option<JobRecord>>;
}

#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Store the file at `local` under `key` and return its public URL
    async fn upload(&self, local: &Path, key: &str, content_type: &str) -> Result<String>;

    /// Remove a stored object. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    fn public_url(&self, key: &str) -> String;
}

/// Process-local persistence
#[derive(Default)]
pub struct InMemoryPersistence {
    frames: DashMap<String, FrameSpec>,
    jobs: DashMap<String, JobRecord>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frames<I: IntoIterator<Item = FrameSpec>>(frames: I) -> Self {
        let store = Self::new();
        for frame in frames {
            store.insert_frame(frame);
        }
        store
    }

    pub fn insert_frame(&self, frame: FrameSpec) {
        self.frames.insert(frame.id.clone(), frame);
    }

    pub fn remove_frame(&self, id: &str) -> Option<FrameSpec> {
        self.frames.remove(id).map(|(_, frame)| frame)
    }

    pub fn job_records(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.jobs.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryPersistence {
    async fn get_frame(&self, id: &str) -> Result<Option<FrameSpec>> {
        Ok(self.frames.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_frames(&self) -> Result<Vec<FrameSpec>> {
        let mut frames: Vec<FrameSpec> = self.frames.iter().map(|e| e.value().clone()).collect();
        frames.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(frames)
    }

    async fn update_frame_models(&self, id: &str, model_url: &str, usdz_url: &str, size: u64) -> Result<()> {
        let mut frame = self
            .frames
            .get_mut(id)
            .ok_or_else(|| FrameGenError::NotFound(format!("frame {}", id)))?;
        frame.model_url = Some(model_url.to_string());
        frame.usdz_url = Some(usdz_url.to_string());
        frame.model_size_bytes = Some(size);
        Ok(())
    }

    async fn create_job_record(&self, frame_id: &str) -> Result<String> {
        let record = JobRecord::new(frame_id);
        let id = record.job_id.clone();
        self.jobs.insert(id.clone(), record);
        Ok(id)
    }

    async fn update_job_record(
        &self,
        job_id: &str,
        status: JobStatus,
        update: Option<JobRecordUpdate>,
    ) -> Result<()> {
        let mut record = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| FrameGenError::NotFound(format!("job record {}", job_id)))?;
        record.apply(status, update);
        Ok(())
    }

    async fn get_job_record(&self, job_id: &str) -> Result<Option<JobRecord>> {
        Ok(self.jobs.get(job_id).map(|entry| entry.value().clone()))
    }
}

/// On-disk frame catalog
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FrameCatalog {
    #[serde(default)]
    pub frames: Vec<FrameSpec>,
}

#[derive(Serialize, Deserialize)]
struct JobFile {
    job: JobRecord,
}

/// File-based persistence: a frame catalog TOML plus a job record directory
pub struct FilePersistence {
    catalog_path: PathBuf,
    jobs_dir: PathBuf,
    catalog: Mutex<FrameCatalog>,
}

impl FilePersistence {
    /// Open `catalog_path` (created empty on first write when missing)
    pub async fn open<P: AsRef<Path>, Q: AsRef<Path>>(catalog_path: P, jobs_dir: Q) -> Result<Self> {
        let catalog_path = catalog_path.as_ref().to_path_buf();
        let catalog = if tokio::fs::try_exists(&catalog_path).await? {
            let content = tokio::fs::read_to_string(&catalog_path).await?;
            toml::from_str(&content).map_err(|e| {
                FrameGenError::Persistence(format!(
                    "Failed to parse frame catalog {}: {}",
                    catalog_path.display(),
                    e
                ))
            })?
        } else {
            FrameCatalog::default()
        };
        Ok(Self {
            catalog_path,
            jobs_dir: jobs_dir.as_ref().to_path_buf(),
            catalog: Mutex::new(catalog),
        })
    }

    /// Default job record location
    pub fn default_jobs_dir() -> PathBuf {
        PathBuf::from(".framegen/jobs")
    }

    fn job_path(&self, job_id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{}.job.toml", job_id))
    }

    async fn save_catalog(&self, catalog: &FrameCatalog) -> Result<()> {
        if let Some(parent) = self.catalog_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = toml::to_string_pretty(catalog)?;
        tokio::fs::write(&self.catalog_path, content).await?;
        Ok(())
    }

    async fn save_job(&self, record: &JobRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.jobs_dir).await?;
        let wrapper = JobFile { job: record.clone() };
        let content = toml::to_string_pretty(&wrapper)?;
        tokio::fs::write(self.job_path(&record.job_id), content).await?;
        Ok(())
    }

    async fn load_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let path = self.job_path(job_id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let file: JobFile = toml::from_str(&content).map_err(|e| {
            FrameGenError::Persistence(format!("Failed to parse job file {}: {}", path.display(), e))
        })?;
        Ok(Some(file.job))
    }
}

#[async_trait]
impl PersistenceGateway for FilePersistence {
    async fn get_frame(&self, id: &str) -> Result<Option<FrameSpec>> {
        let catalog = self.catalog.lock().await;
        Ok(catalog.frames.iter().find(|f| f.id == id).cloned())
    }

    async fn list_frames(&self) -> Result<Vec<FrameSpec>> {
        Ok(self.catalog.lock().await.frames.clone())
    }

    #[tracing::instrument(name = "persistence.update_frame_models", skip(self, model_url, usdz_url))]
    async fn update_frame_models(&self, id: &str, model_url: &str, usdz_url: &str, size: u64) -> Result<()> {
        let mut catalog = self.catalog.lock().await;
        let frame = catalog
            .frames
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| FrameGenError::NotFound(format!("frame {}", id)))?;
        frame.model_url = Some(model_url.to_string());
        frame.usdz_url = Some(usdz_url.to_string());
        frame.model_size_bytes = Some(size);
        self.save_catalog(&catalog).await
    }

    async fn create_job_record(&self, frame_id: &str) -> Result<String> {
        let record = JobRecord::new(frame_id);
        self.save_job(&record).await?;
        Ok(record.job_id)
    }

    #[tracing::instrument(name = "persistence.update_job_record", skip(self, update))]
    async fn update_job_record(
        &self,
        job_id: &str,
        status: JobStatus,
        update: Option<JobRecordUpdate>,
    ) -> Result<()> {
        let mut record = self
            .load_job(job_id)
            .await?
            .ok_or_else(|| FrameGenError::NotFound(format!("job record {}", job_id)))?;
        record.apply(status, update);
        self.save_job(&record).await
    }

    async fn get_job_record(&self, job_id: &str) -> Result<Option<JobRecord>> {
        self.load_job(job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames() -> Vec<FrameSpec> {
        let mut done = FrameSpec::new("frame-b", 8.0, 10.0);
        done.model_url = Some("https://cdn/b.glb".into());
        done.usdz_url = Some("https://cdn/b.usdz".into());
        vec![FrameSpec::new("frame-a", 30.0, 40.0), done, FrameSpec::new("frame-c", 11.0, 14.0)]
    }

    #[tokio::test]
    async fn test_in_memory_missing_models() {
        let store = InMemoryPersistence::with_frames(frames());
        let missing: Vec<String> = store
            .get_frames_missing_models()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(missing, vec!["frame-a", "frame-c"]);

        store.update_frame_models("frame-a", "u1", "u2", 10).await.unwrap();
        assert!(store.get_frame("frame-a").await.unwrap().unwrap().has_models());
        assert!(matches!(
            store.update_frame_models("nope", "u1", "u2", 1).await,
            Err(FrameGenError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_in_memory_job_records() {
        let store = InMemoryPersistence::new();
        let id = store.create_job_record("frame-a").await.unwrap();
        store
            .update_job_record(
                &id,
                JobStatus::Failed,
                Some(JobRecordUpdate {
                    error: Some("boom".into()),
                    ..JobRecordUpdate::default()
                }),
            )
            .await
            .unwrap();
        let record = store.get_job_record(&id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("boom"));
        assert!(store.get_job_record("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("frames.toml");
        let jobs_dir = dir.path().join("jobs");
        let catalog = FrameCatalog { frames: frames() };
        std::fs::write(&catalog_path, toml::to_string_pretty(&catalog).unwrap()).unwrap();

        let store = FilePersistence::open(&catalog_path, &jobs_dir).await.unwrap();
        assert_eq!(store.list_frames().await.unwrap().len(), 3);
        assert_eq!(store.get_frames_missing_models().await.unwrap().len(), 2);

        store
            .update_frame_models("frame-c", "https://cdn/c.glb", "https://cdn/c.usdz", 2048)
            .await
            .unwrap();
        let id = store.create_job_record("frame-c").await.unwrap();
        store.update_job_record(&id, JobStatus::Completed, None).await.unwrap();

        // Reopen from disk
        let reopened = FilePersistence::open(&catalog_path, &jobs_dir).await.unwrap();
        let frame = reopened.get_frame("frame-c").await.unwrap().unwrap();
        assert_eq!(frame.model_size_bytes, Some(2048));
        assert!(frame.has_models());
        let record = reopened.get_job_record(&id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert!(jobs_dir.join(format!("{}.job.toml", id)).exists());
    }

    #[tokio::test]
    async fn test_missing_catalog_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePersistence::open(dir.path().join("none.toml"), dir.path().join("jobs"))
            .await
            .unwrap();
        assert!(store.list_frames().await.unwrap().is_empty());
        assert!(store.get_frame("x").await.unwrap().is_none());
    }
}
