//! hg.mozilla.org push log.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::PushLog;
use crate::config::ServicesConfig;
use crate::error::{PublishError, ServiceError};
use crate::metrics;

/// `json-pushes` client
pub struct HgPushLog {
    client: Client,
    base_url: String,
    repository_path: String,
}

impl HgPushLog {
    pub fn new(services: &ServicesConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(services.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: services.hg_url.trim_end_matches('/').to_string(),
            repository_path: services.hg_repository_path.trim_matches('/').to_string(),
        })
    }

    fn pushes_url(&self, repository: &str) -> String {
        format!(
            "{}/{}/json-pushes",
            self.base_url,
            self.repository_path.replace("{repository}", repository)
        )
    }

    async fn pushes(&self, repository: &str, revision: &str) -> Result<Value, ServiceError> {
        let url = self.pushes_url(repository);
        debug!("hg request: url='{}', changeset={}", url, revision);

        let response = self
            .client
            .get(&url)
            .query(&[("changeset", revision)])
            .send()
            .await
            .inspect_err(|_| metrics::record_external_request("hg", "error"))?;

        let status = response.status();
        if !status.is_success() {
            metrics::record_external_request("hg", "error");
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::UnexpectedStatus {
                service: "hg",
                status: status.as_u16(),
                message: body,
            });
        }
        metrics::record_external_request("hg", "success");

        response.json().await.map_err(|e| ServiceError::Decode {
            service: "hg",
            message: e.to_string(),
        })
    }
}

/// The single push id of a `json-pushes` response.
///
/// The response is an object keyed by push id.
pub fn pluck_push_id(revision: &str, pushes: &Value) -> Result<String, PublishError> {
    let pushes = pushes.as_object().ok_or_else(|| ServiceError::Decode {
        service: "hg",
        message: format!("json-pushes for {} is not an object", revision),
    })?;
    let mut push_ids: Vec<String> = pushes.keys().cloned().collect();

    match push_ids.len() {
        0 => Err(PublishError::NoPushId {
            revision: revision.to_string(),
        }),
        1 => Ok(push_ids.remove(0)),
        _ => Err(PublishError::TooManyPushIds {
            revision: revision.to_string(),
            push_ids,
        }),
    }
}

#[async_trait]
impl PushLog for HgPushLog {
    async fn push_id(&self, repository: &str, revision: &str) -> Result<String, PublishError> {
        let pushes = self.pushes(repository, revision).await?;
        pluck_push_id(revision, &pushes)
    }
}
