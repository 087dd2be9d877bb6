use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use super::{JobCounts, JobStore, StoreError, UpdateOutcome, sort_recent};
use crate::state_machine::{Job, JobStatus, Payload};

/// Job store keeping one pretty-printed JSON file per job in `dir`.
///
/// Writes go to a temporary file that is renamed over the record, so readers
/// never observe a half-written job. Conditional updates are serialized by an
/// in-process lock; two processes sharing one directory are not coordinated.
#[derive(Debug)]
pub struct FileJobStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileJobStore {
    /// Open (and create if needed) the data directory.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        match fs::read(self.record_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, job: &Job) -> Result<(), StoreError> {
        let path = self.record_path(job.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(job)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Job>, StoreError> {
        let mut jobs = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<Job>(&bytes) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable job record")
                }
            }
        }
        Ok(jobs)
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create(&self) -> Result<Job, StoreError> {
        let job = Job::new();
        let _guard = self.write_lock.lock().await;
        self.write(&job).await?;
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        self.read(id).await
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected: JobStatus,
        new_status: JobStatus,
        payload: Option<Payload>,
    ) -> Result<UpdateOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;
        let Some(mut job) = self.read(id).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        if job.status != expected {
            return Ok(UpdateOutcome::Conflict(job.status));
        }
        job.apply(new_status, payload);
        self.write(&job).await?;
        Ok(UpdateOutcome::Updated(job))
    }

    async fn count_by_status(&self) -> Result<JobCounts, StoreError> {
        let jobs = self.load_all().await?;
        Ok(jobs.iter().collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        let mut jobs = self.load_all().await?;
        sort_recent(&mut jobs);
        jobs.truncate(limit);
        Ok(jobs)
    }
}
