//! In-memory job-state store for background pipeline runs.
//!
//! The HTTP surface accepts a request, creates a job, and runs the pipeline in a spawned
//! task; clients poll the job until it settles. The store is a narrow interface over a
//! guarded map, deliberately decoupled from the pipeline itself, which stays a pure
//! function from inputs to a result.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Identifier handed back when a job is created.
pub type JobId = Uuid;

/// Lifecycle state of one background pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    /// Created but not yet started.
    Pending,
    /// Pipeline is executing.
    Running,
    /// Pipeline finished; the serialized result is attached.
    Completed {
        /// The serialized [`crate::pipeline::PipelineResult`].
        result: serde_json::Value,
    },
    /// Pipeline or serialization failed.
    Failed {
        /// Human-readable failure description.
        error: String,
    },
}

/// Thread-safe registry of background jobs.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, JobState>>,
}

impl JobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job and return its id.
    pub async fn create(&self) -> JobId {
        let id = Uuid::new_v4();
        self.jobs.write().await.insert(id, JobState::Pending);
        tracing::debug!(job_id = %id, "Job created");
        id
    }

    /// Replace a job's state. Returns `false` when the id is unknown.
    pub async fn update(&self, id: JobId, state: JobState) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => {
                tracing::warn!(job_id = %id, "Attempted to update unknown job");
                false
            }
        }
    }

    /// Look up a job's current state.
    pub async fn get(&self, id: JobId) -> Option<JobState> {
        self.jobs.read().await.get(&id).cloned()
    }
}
