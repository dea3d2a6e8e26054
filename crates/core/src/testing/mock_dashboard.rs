//! Mock job dashboard for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::PublishError;
use crate::services::JobDashboard;

/// A recorded `job_exists` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedJobQuery {
    pub repository: String,
    pub revision: String,
    pub job_name: String,
    pub tier: u32,
}

/// Mock implementation of the JobDashboard trait.
///
/// A job exists once registered with [`MockJobDashboard::add_job`].
#[derive(Debug)]
pub struct MockJobDashboard {
    /// (repository, revision, job name)
    jobs: Arc<RwLock<HashSet<(String, String, String)>>>,
    queries: Arc<RwLock<Vec<RecordedJobQuery>>>,
    next_error: Arc<RwLock<Option<PublishError>>>,
}

impl Default for MockJobDashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl MockJobDashboard {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashSet::new())),
            queries: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn add_job(&self, repository: &str, revision: &str, job_name: &str) {
        self.jobs.write().await.insert((
            repository.to_string(),
            revision.to_string(),
            job_name.to_string(),
        ));
    }

    /// Get all recorded queries.
    pub async fn recorded_queries(&self) -> Vec<RecordedJobQuery> {
        self.queries.read().await.clone()
    }

    /// Configure the next query to fail with the given error.
    pub async fn set_next_error(&self, error: PublishError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl JobDashboard for MockJobDashboard {
    async fn job_exists(
        &self,
        repository: &str,
        revision: &str,
        job_name: &str,
        tier: u32,
    ) -> Result<bool, PublishError> {
        self.queries.write().await.push(RecordedJobQuery {
            repository: repository.to_string(),
            revision: revision.to_string(),
            job_name: job_name.to_string(),
            tier,
        });

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        Ok(self.jobs.read().await.contains(&(
            repository.to_string(),
            revision.to_string(),
            job_name.to_string(),
        )))
    }
}
