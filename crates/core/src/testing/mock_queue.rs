//! Mock build queue for testing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::ServiceError;
use crate::payload::TaskPayload;
use crate::services::BuildQueue;
use crate::types::{Artifact, TaskDefinition};

/// A task submitted through [`BuildQueue::create_task`].
#[derive(Debug, Clone)]
pub struct CreatedTask {
    pub task_id: String,
    pub payload: TaskPayload,
}

/// Mock implementation of the BuildQueue trait.
///
/// Provides controllable behavior for testing:
/// - Serve task definitions and artifact lists per task id
/// - Record artifact listings and created tasks
/// - Fail the next call
#[derive(Debug)]
pub struct MockBuildQueue {
    definitions: Arc<RwLock<HashMap<String, TaskDefinition>>>,
    artifacts: Arc<RwLock<HashMap<String, Vec<Artifact>>>>,
    /// Task ids whose artifacts were listed, in order.
    artifact_listings: Arc<RwLock<Vec<String>>>,
    created: Arc<RwLock<Vec<CreatedTask>>>,
    /// If set, the next call fails with this error.
    next_error: Arc<RwLock<Option<ServiceError>>>,
}

impl Default for MockBuildQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBuildQueue {
    pub fn new() -> Self {
        Self {
            definitions: Arc::new(RwLock::new(HashMap::new())),
            artifacts: Arc::new(RwLock::new(HashMap::new())),
            artifact_listings: Arc::new(RwLock::new(Vec::new())),
            created: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn add_task_definition(&self, task_id: &str, definition: TaskDefinition) {
        self.definitions
            .write()
            .await
            .insert(task_id.to_string(), definition);
    }

    pub async fn set_artifacts(&self, task_id: &str, artifacts: Vec<Artifact>) {
        self.artifacts
            .write()
            .await
            .insert(task_id.to_string(), artifacts);
    }

    /// Get the task ids whose artifacts were listed.
    pub async fn recorded_artifact_listings(&self) -> Vec<String> {
        self.artifact_listings.read().await.clone()
    }

    /// Get all created tasks.
    pub async fn created_tasks(&self) -> Vec<CreatedTask> {
        self.created.read().await.clone()
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: ServiceError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Result<(), ServiceError> {
        match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BuildQueue for MockBuildQueue {
    async fn task_definition(&self, task_id: &str) -> Result<TaskDefinition, ServiceError> {
        self.take_error().await?;

        self.definitions
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| ServiceError::UnexpectedStatus {
                service: "taskcluster",
                status: 404,
                message: format!("task {} not found", task_id),
            })
    }

    async fn list_latest_artifacts(&self, task_id: &str) -> Result<Vec<Artifact>, ServiceError> {
        self.artifact_listings
            .write()
            .await
            .push(task_id.to_string());
        self.take_error().await?;

        Ok(self
            .artifacts
            .read()
            .await
            .get(task_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_task(
        &self,
        task_id: &str,
        payload: &TaskPayload,
    ) -> Result<Value, ServiceError> {
        self.take_error().await?;

        self.created.write().await.push(CreatedTask {
            task_id: task_id.to_string(),
            payload: payload.clone(),
        });

        Ok(json!({
            "status": {
                "taskId": task_id,
                "provisionerId": payload.provisioner_id,
                "workerType": payload.worker_type,
                "state": "unscheduled",
                "retriesLeft": payload.retries,
                "runs": []
            }
        }))
    }
}
