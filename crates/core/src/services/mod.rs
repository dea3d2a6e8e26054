//! Remote collaborators of the publish pipeline.
//!
//! Each collaborator is a trait so the orchestrator can be driven by the
//! recording mocks in [`crate::testing`]. The real implementations talk to
//! Taskcluster (index and queue), Treeherder and hg.mozilla.org.

mod hg;
mod taskcluster;
mod treeherder;

pub use self::taskcluster::{TaskclusterIndex, TaskclusterQueue};
pub use hg::{pluck_push_id, HgPushLog};
pub use treeherder::{TreeherderClient, TreeherderJob, TreeherderResultSet};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{PublishError, ServiceError};
use crate::payload::TaskPayload;
use crate::types::{Artifact, TaskDefinition};

/// Taskcluster index: namespace -> task id
#[async_trait]
pub trait BuildIndex: Send + Sync {
    /// Task indexed at `namespace`.
    ///
    /// Fails with [`ServiceError::IndexEntryNotFound`] when nothing is
    /// indexed there.
    async fn find_task(&self, namespace: &str) -> Result<String, ServiceError>;
}

/// Taskcluster queue
#[async_trait]
pub trait BuildQueue: Send + Sync {
    async fn task_definition(&self, task_id: &str) -> Result<TaskDefinition, ServiceError>;

    /// Every latest artifact of a task, across all result pages.
    async fn list_latest_artifacts(&self, task_id: &str) -> Result<Vec<Artifact>, ServiceError>;

    /// Submit a new task. Returns the queue's task status response.
    async fn create_task(
        &self,
        task_id: &str,
        payload: &TaskPayload,
    ) -> Result<Value, ServiceError>;
}

/// Treeherder
#[async_trait]
pub trait JobDashboard: Send + Sync {
    /// Whether a job named `job_name` already exists for this revision.
    ///
    /// A revision that does not map to exactly one result set is reported
    /// as a dashboard inconsistency.
    async fn job_exists(
        &self,
        repository: &str,
        revision: &str,
        job_name: &str,
        tier: u32,
    ) -> Result<bool, PublishError>;
}

/// hg push log
#[async_trait]
pub trait PushLog: Send + Sync {
    /// Id of the single push that introduced `revision`.
    async fn push_id(&self, repository: &str, revision: &str) -> Result<String, PublishError>;
}
