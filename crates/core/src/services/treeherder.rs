//! Treeherder client, used to find out whether a revision was already published.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use super::JobDashboard;
use crate::config::ServicesConfig;
use crate::error::{PublishError, ServiceError};
use crate::metrics;

/// Treeherder limits how many jobs one page returns
const JOBS_PAGE_SIZE: u32 = 2000;

/// A Treeherder result set (one push)
#[derive(Debug, Clone, Deserialize)]
pub struct TreeherderResultSet {
    pub id: u64,
}

/// A Treeherder job, only the fields the publisher looks at
#[derive(Debug, Clone, Deserialize)]
pub struct TreeherderJob {
    pub job_type_name: String,
}

#[derive(Debug, Deserialize)]
struct Results<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

/// Treeherder REST API client
pub struct TreeherderClient {
    client: Client,
    base_url: String,
}

impl TreeherderClient {
    pub fn new(services: &ServicesConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .user_agent(concat!("aurora-publisher/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(services.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: services.treeherder_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Treeherder request: url='{}', query={:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .inspect_err(|_| metrics::record_external_request("treeherder", "error"))?;

        let status = response.status();
        if !status.is_success() {
            metrics::record_external_request("treeherder", "error");
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::UnexpectedStatus {
                service: "treeherder",
                status: status.as_u16(),
                message: body,
            });
        }
        metrics::record_external_request("treeherder", "success");

        response.json().await.map_err(|e| ServiceError::Decode {
            service: "treeherder",
            message: e.to_string(),
        })
    }

    /// Result sets of `revision`
    pub async fn result_sets(
        &self,
        repository: &str,
        revision: &str,
    ) -> Result<Vec<TreeherderResultSet>, ServiceError> {
        let page: Results<TreeherderResultSet> = self
            .get(
                &format!("/api/project/{}/resultset/", repository),
                &[("revision", revision.to_string())],
            )
            .await?;
        Ok(page.results)
    }

    /// Jobs of one result set at the given tier
    pub async fn jobs(
        &self,
        repository: &str,
        result_set_id: u64,
        tier: u32,
    ) -> Result<Vec<TreeherderJob>, ServiceError> {
        let page: Results<TreeherderJob> = self
            .get(
                &format!("/api/project/{}/jobs/", repository),
                &[
                    ("count", JOBS_PAGE_SIZE.to_string()),
                    ("result_set_id", result_set_id.to_string()),
                    ("tier", tier.to_string()),
                ],
            )
            .await?;
        Ok(page.results)
    }
}

/// The only result set of a revision
fn single_result_set(
    repository: &str,
    revision: &str,
    result_sets: Vec<TreeherderResultSet>,
) -> Result<TreeherderResultSet, PublishError> {
    let count = result_sets.len();
    let mut result_sets = result_sets.into_iter();

    match (result_sets.next(), count) {
        (Some(result_set), 1) => Ok(result_set),
        (None, _) => Err(PublishError::NoTreeherderResultSet {
            repository: repository.to_string(),
            revision: revision.to_string(),
        }),
        (Some(_), count) => Err(PublishError::TooManyTreeherderResultSets {
            repository: repository.to_string(),
            revision: revision.to_string(),
            count,
        }),
    }
}

fn contains_job(jobs: &[TreeherderJob], job_name: &str) -> bool {
    jobs.iter().any(|job| job.job_type_name == job_name)
}

#[async_trait]
impl JobDashboard for TreeherderClient {
    async fn job_exists(
        &self,
        repository: &str,
        revision: &str,
        job_name: &str,
        tier: u32,
    ) -> Result<bool, PublishError> {
        let result_sets = self.result_sets(repository, revision).await?;
        let result_set = single_result_set(repository, revision, result_sets)?;

        let jobs = self.jobs(repository, result_set.id, tier).await?;
        let exists = contains_job(&jobs, job_name);

        debug!(
            repository = repository,
            revision = revision,
            result_set_id = result_set.id,
            jobs = jobs.len(),
            exists = exists,
            "Checked Treeherder for job \"{}\"",
            job_name
        );
        Ok(exists)
    }
}
