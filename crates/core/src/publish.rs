//! Publish orchestrator.
//!
//! Decides whether a revision can be published and, if so, creates the
//! Google Play task. The pipeline is linear and stops at the first error:
//!
//! ```text
//! CheckDuplicate -> ResolveArchitectures -> FetchArtifacts -> FilterArtifacts
//!   -> CraftURLs -> ResolvePushId -> BuildPayload -> CreateTask
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::artifacts::{artifact_url, resolve_target_artifact, ApkMatcher};
use crate::config::Config;
use crate::error::PublishError;
use crate::fanout::resolve_task_ids;
use crate::metrics;
use crate::payload::{build_payload, TaskPayload};
use crate::routes::{PatternCache, RoutePattern};
use crate::services::{BuildIndex, BuildQueue, JobDashboard, PushLog};
use crate::types::{FetchedArtifacts, LocatedArtifact, ResolvedTask, SelectedArtifact};

/// The remote services a publisher talks to
#[derive(Clone)]
pub struct Collaborators {
    pub index: Arc<dyn BuildIndex>,
    pub queue: Arc<dyn BuildQueue>,
    pub dashboard: Arc<dyn JobDashboard>,
    pub push_log: Arc<dyn PushLog>,
}

/// A task created by a successful publish attempt
#[derive(Debug, Clone)]
pub struct PublishedTask {
    pub task_id: String,
    pub payload: TaskPayload,
}

pub struct Publisher {
    config: Arc<Config>,
    collaborators: Collaborators,
    namespace_pattern: Arc<RoutePattern>,
    route_pattern: Arc<RoutePattern>,
    apk_matcher: ApkMatcher,
}

impl Publisher {
    /// Compiles the configured patterns up front.
    pub fn new(
        config: Arc<Config>,
        collaborators: Collaborators,
        patterns: &PatternCache,
    ) -> Result<Self, PublishError> {
        let namespace_pattern = patterns.get_or_compile(&config.taskcluster_index_pattern)?;
        let route_pattern = patterns.index_routes(&config.taskcluster_index_pattern)?;
        let apk_matcher = ApkMatcher::new(&config.apk_artifact_pattern)?;

        Ok(Self {
            config,
            collaborators,
            namespace_pattern,
            route_pattern,
            apk_matcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &dyn BuildQueue {
        self.collaborators.queue.as_ref()
    }

    /// Pattern matching the index routes of build tasks
    pub fn route_pattern(&self) -> &RoutePattern {
        &self.route_pattern
    }

    /// Publish `revision` now, under a fresh task id.
    pub async fn publish_if_possible(
        &self,
        repository: &str,
        revision: &str,
    ) -> Result<PublishedTask, PublishError> {
        let task_id = slugid::nice();
        self.publish_at(repository, revision, Utc::now(), &task_id)
            .await
    }

    /// Publish `revision` with a fixed clock and task id.
    pub async fn publish_at(
        &self,
        repository: &str,
        revision: &str,
        now: DateTime<Utc>,
        new_task_id: &str,
    ) -> Result<PublishedTask, PublishError> {
        let started = Instant::now();
        let result = self.run(repository, revision, now, new_task_id).await;

        let label = match &result {
            Ok(_) => "published",
            Err(err) => err.kind().as_str(),
        };
        metrics::observe_publish(label, started.elapsed());

        result
    }

    async fn run(
        &self,
        repository: &str,
        revision: &str,
        now: DateTime<Utc>,
        new_task_id: &str,
    ) -> Result<PublishedTask, PublishError> {
        self.check_duplicate(repository, revision).await?;

        info!(
            "Resolving build tasks of {} at {} for {} architectures",
            repository,
            revision,
            self.config.architectures_to_watch.len()
        );
        let resolved = resolve_task_ids(
            self.collaborators.index.as_ref(),
            &self.namespace_pattern,
            repository,
            revision,
            &self.config.architectures_to_watch,
        )
        .await?;

        let fetched = self.fetch_artifacts(resolved).await?;
        let selected = self.filter_artifacts(fetched)?;
        let located = craft_urls(selected);

        let push_id = self
            .collaborators
            .push_log
            .push_id(repository, revision)
            .await?;
        info!("Revision {} belongs to push {}", revision, push_id);

        let payload = build_payload(&self.config, repository, revision, &push_id, &located, now);
        debug!(
            task_id = new_task_id,
            payload = %serde_json::to_string(&payload).unwrap_or_default(),
            "Built publishing task"
        );

        let response = self
            .collaborators
            .queue
            .create_task(new_task_id, &payload)
            .await?;
        metrics::record_task_created();
        info!(
            "Created publishing task {} for {} at {}",
            new_task_id, repository, revision
        );
        debug!(response = %response, "Queue answered");

        Ok(PublishedTask {
            task_id: new_task_id.to_string(),
            payload,
        })
    }

    async fn check_duplicate(&self, repository: &str, revision: &str) -> Result<(), PublishError> {
        let job_name = &self.config.task.name;
        let exists = self
            .collaborators
            .dashboard
            .job_exists(
                repository,
                revision,
                job_name,
                self.config.task.treeherder.tier,
            )
            .await?;

        if exists {
            return Err(PublishError::TreeherderJobAlreadyExists {
                repository: repository.to_string(),
                revision: revision.to_string(),
                job_name: job_name.clone(),
            });
        }
        Ok(())
    }

    async fn fetch_artifacts(
        &self,
        resolved: BTreeMap<String, ResolvedTask>,
    ) -> Result<BTreeMap<String, FetchedArtifacts>, PublishError> {
        let mut fetched = BTreeMap::new();

        for (architecture, ResolvedTask { task_id }) in resolved {
            let all_artifacts = self
                .collaborators
                .queue
                .list_latest_artifacts(&task_id)
                .await?;
            debug!(
                architecture = architecture.as_str(),
                task_id = task_id.as_str(),
                artifacts = ?all_artifacts.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
                "Fetched artifacts"
            );
            fetched.insert(
                architecture,
                FetchedArtifacts {
                    task_id,
                    all_artifacts,
                },
            );
        }

        Ok(fetched)
    }

    fn filter_artifacts(
        &self,
        fetched: BTreeMap<String, FetchedArtifacts>,
    ) -> Result<BTreeMap<String, SelectedArtifact>, PublishError> {
        fetched
            .into_iter()
            .map(|(architecture, data)| -> Result<_, PublishError> {
                let target_artifact =
                    resolve_target_artifact(&data.task_id, &data.all_artifacts, &self.apk_matcher)?;
                Ok((
                    architecture,
                    SelectedArtifact {
                        task_id: data.task_id,
                        target_artifact,
                    },
                ))
            })
            .collect()
    }
}

fn craft_urls(selected: BTreeMap<String, SelectedArtifact>) -> BTreeMap<String, LocatedArtifact> {
    selected
        .into_iter()
        .map(|(architecture, data)| {
            let artifact_url = artifact_url(&data.task_id, &data.target_artifact);
            (
                architecture,
                LocatedArtifact {
                    task_id: data.task_id,
                    artifact_url,
                },
            )
        })
        .collect()
}
