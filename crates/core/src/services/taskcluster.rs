//! Taskcluster index and queue clients.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use taskcluster::{err_status_code, ClientBuilder, Credentials, Index, Queue, StatusCode};
use tracing::debug;

use super::{BuildIndex, BuildQueue};
use crate::config::Config;
use crate::error::ServiceError;
use crate::metrics;
use crate::payload::TaskPayload;
use crate::types::{Artifact, TaskDefinition};

fn client_builder(config: &Config) -> ClientBuilder {
    ClientBuilder::new(&config.services.taskcluster_root_url).credentials(Credentials::new(
        config.credentials.client_id.clone(),
        config.credentials.access_token.clone(),
    ))
}

fn decode<T: for<'de> Deserialize<'de>>(value: Value, what: &str) -> Result<T, ServiceError> {
    serde_json::from_value(value).map_err(|e| ServiceError::Decode {
        service: "taskcluster",
        message: format!("{}: {}", what, e),
    })
}

/// Index service client
pub struct TaskclusterIndex {
    index: Index,
}

impl TaskclusterIndex {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let index = Index::new(client_builder(config)).map_err(ServiceError::taskcluster)?;
        Ok(Self { index })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexedTask {
    task_id: String,
}

#[async_trait]
impl BuildIndex for TaskclusterIndex {
    async fn find_task(&self, namespace: &str) -> Result<String, ServiceError> {
        debug!(namespace = namespace, "Looking up index namespace");

        let response = match self.index.findTask(namespace).await {
            Ok(response) => response,
            Err(err) if err_status_code(&err) == Some(StatusCode::NOT_FOUND) => {
                metrics::record_external_request("taskcluster_index", "not_found");
                return Err(ServiceError::IndexEntryNotFound {
                    namespace: namespace.to_string(),
                });
            }
            Err(err) => {
                metrics::record_external_request("taskcluster_index", "error");
                return Err(ServiceError::taskcluster(err));
            }
        };
        metrics::record_external_request("taskcluster_index", "success");

        let indexed: IndexedTask = decode(response, "index.findTask")?;
        Ok(indexed.task_id)
    }
}

/// Queue service client
pub struct TaskclusterQueue {
    queue: Queue,
}

impl TaskclusterQueue {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let queue = Queue::new(client_builder(config)).map_err(ServiceError::taskcluster)?;
        Ok(Self { queue })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactPage {
    #[serde(default)]
    artifacts: Vec<Artifact>,
    #[serde(default)]
    continuation_token: Option<String>,
}

#[async_trait]
impl BuildQueue for TaskclusterQueue {
    async fn task_definition(&self, task_id: &str) -> Result<TaskDefinition, ServiceError> {
        let response = self.queue.task(task_id).await.map_err(|e| {
            metrics::record_external_request("taskcluster_queue", "error");
            ServiceError::taskcluster(e)
        })?;
        metrics::record_external_request("taskcluster_queue", "success");

        decode(response, "queue.task")
    }

    async fn list_latest_artifacts(&self, task_id: &str) -> Result<Vec<Artifact>, ServiceError> {
        let mut artifacts = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .queue
                .listLatestArtifacts(task_id, continuation_token.as_deref(), None)
                .await
                .map_err(|e| {
                    metrics::record_external_request("taskcluster_queue", "error");
                    ServiceError::taskcluster(e)
                })?;
            metrics::record_external_request("taskcluster_queue", "success");

            let page: ArtifactPage = decode(response, "queue.listLatestArtifacts")?;
            artifacts.extend(page.artifacts);

            match page.continuation_token {
                Some(token) if !token.is_empty() => continuation_token = Some(token),
                _ => break,
            }
        }

        debug!(
            task_id = task_id,
            count = artifacts.len(),
            "Fetched latest artifacts"
        );
        Ok(artifacts)
    }

    async fn create_task(
        &self,
        task_id: &str,
        payload: &TaskPayload,
    ) -> Result<Value, ServiceError> {
        let body = serde_json::to_value(payload).map_err(|e| ServiceError::Decode {
            service: "taskcluster",
            message: format!("task payload: {}", e),
        })?;

        let response = self.queue.createTask(task_id, &body).await.map_err(|e| {
            metrics::record_external_request("taskcluster_queue", "error");
            ServiceError::taskcluster(e)
        })?;
        metrics::record_external_request("taskcluster_queue", "success");

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_artifact_page_with_token() {
        let page: ArtifactPage = decode(
            json!({
                "artifacts": [{
                    "storageType": "s3",
                    "name": "public/build/fennec-51.0a2.multi.android-arm.apk",
                    "expires": "2017-09-20T01:08:15.766Z",
                    "contentType": "application/vnd.android.package-archive"
                }],
                "continuationToken": "next-page"
            }),
            "page",
        )
        .unwrap();

        assert_eq!(page.artifacts.len(), 1);
        assert_eq!(page.continuation_token.as_deref(), Some("next-page"));
    }

    #[test]
    fn test_decode_last_artifact_page() {
        let page: ArtifactPage = decode(json!({"artifacts": []}), "page").unwrap();
        assert!(page.artifacts.is_empty());
        assert!(page.continuation_token.is_none());
    }

    #[test]
    fn test_decode_indexed_task() {
        let indexed: IndexedTask = decode(
            json!({
                "namespace": "gecko.v2.mozilla-aurora.revision.abc.mobile-l10n.android-x86-opt.multi",
                "taskId": "NtEQavvdQRaYQGryyJMPnA",
                "rank": 0,
                "data": {},
                "expires": "2017-09-20T01:08:15.766Z"
            }),
            "index.findTask",
        )
        .unwrap();
        assert_eq!(indexed.task_id, "NtEQavvdQRaYQGryyJMPnA");
    }

    #[test]
    fn test_decode_failure_is_reported() {
        let err = decode::<IndexedTask>(json!({"rank": 0}), "index.findTask").unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Decode {
                service: "taskcluster",
                ..
            }
        ));
    }
}
