use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Completed and failed jobs accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three texts produced by a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    pub summary: String,
    pub checklist: String,
    pub diagram: String,
}

/// Data written together with a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Completed(Artifacts),
    Failed { error: String },
}

/// Client-facing view of a finished job's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResult {
    Completed {
        summary: String,
        checklist: String,
        diagram: String,
    },
    Failed {
        error: String,
    },
}

/// A single guideline ingestion job as persisted by the job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub checklist: Option<String>,
    pub diagram: Option<String>,
    pub error_message: Option<String>,
}

impl Job {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            summary: None,
            checklist: None,
            diagram: None,
            error_message: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == JobStatus::Pending
    }

    pub fn is_processing(&self) -> bool {
        self.status == JobStatus::Processing
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }

    /// Project the stored payload fields into the client-facing result.
    /// Pending and processing jobs have no result yet.
    pub fn result(&self) -> Option<JobResult> {
        match self.status {
            JobStatus::Completed => Some(JobResult::Completed {
                summary: self.summary.clone().unwrap_or_default(),
                checklist: self.checklist.clone().unwrap_or_default(),
                diagram: self.diagram.clone().unwrap_or_default(),
            }),
            JobStatus::Failed => Some(JobResult::Failed {
                error: self.error_message.clone().unwrap_or_default(),
            }),
            JobStatus::Pending | JobStatus::Processing => None,
        }
    }

    /// Write a status change and its payload in place, refreshing `updated_at`.
    ///
    /// No legality check happens here; callers go through
    /// [`StateMachine`](super::StateMachine) or a store's conditional update.
    pub(crate) fn apply(&mut self, status: JobStatus, payload: Option<Payload>) {
        self.status = status;
        match payload {
            Some(Payload::Completed(artifacts)) => {
                self.summary = Some(artifacts.summary);
                self.checklist = Some(artifacts.checklist);
                self.diagram = Some(artifacts.diagram);
                self.error_message = None;
            }
            Some(Payload::Failed { error }) => {
                self.summary = None;
                self.checklist = None;
                self.diagram = None;
                self.error_message = Some(error);
            }
            None => {}
        }
        self.updated_at = Utc::now();
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job {} - {}", self.id, self.status)
    }
}
