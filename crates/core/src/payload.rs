//! Definition of the Google Play publishing task.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::types::LocatedArtifact;

/// How long the queue keeps the task pending before giving up
const TASK_DEADLINE_HOURS: i64 = 1;

/// Every dependency must succeed
pub const REQUIRES_ALL_COMPLETED: &str = "all-completed";

/// Never let the queue re-run a publication
pub const TASK_RETRIES: u32 = 0;

/// The task submitted to the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    #[serde(with = "rfc3339_millis")]
    pub created: DateTime<Utc>,
    #[serde(with = "rfc3339_millis")]
    pub deadline: DateTime<Utc>,
    pub dependencies: Vec<String>,
    pub extra: TaskExtra,
    pub metadata: TaskMetadata,
    pub payload: PublishPayload,
    pub provisioner_id: String,
    pub requires: String,
    pub retries: u32,
    pub routes: Vec<String>,
    pub scopes: Vec<String>,
    pub worker_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExtra {
    pub treeherder: TreeherderExtra,
}

/// Treeherder job description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeherderExtra {
    pub reason: String,
    pub tier: u32,
    pub group_name: String,
    pub group_symbol: String,
    pub symbol: String,
    pub collection: BTreeMap<String, bool>,
    pub machine: TreeherderMachine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeherderMachine {
    pub platform: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub name: String,
    pub description: String,
    pub owner: String,
    pub source: String,
}

/// What the publishing worker acts on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishPayload {
    /// Logical architecture -> APK URL
    pub apks: BTreeMap<String, String>,
    pub google_play_track: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

/// Treeherder routes of the task, production and staging
pub fn treeherder_routes(repository: &str, revision: &str, push_id: &str) -> Vec<String> {
    ["tc-treeherder", "tc-treeherder-stage"]
        .iter()
        .map(|prefix| format!("{}.v2.{}.{}.{}", prefix, repository, revision, push_id))
        .collect()
}

/// Assemble the publishing task. Pure: the same inputs give the same payload.
pub fn build_payload(
    config: &Config,
    repository: &str,
    revision: &str,
    push_id: &str,
    located: &BTreeMap<String, LocatedArtifact>,
    now: DateTime<Utc>,
) -> TaskPayload {
    let task = &config.task;
    let treeherder = &task.treeherder;

    let mut dependencies: Vec<String> = located.values().map(|a| a.task_id.clone()).collect();
    dependencies.sort();
    dependencies.dedup();

    let apks = located
        .iter()
        .map(|(architecture, artifact)| (architecture.clone(), artifact.artifact_url.clone()))
        .collect();

    TaskPayload {
        created: now,
        deadline: now + Duration::hours(TASK_DEADLINE_HOURS),
        dependencies,
        extra: TaskExtra {
            treeherder: TreeherderExtra {
                reason: treeherder.reason.clone(),
                tier: treeherder.tier,
                group_name: treeherder.group_name.clone(),
                group_symbol: treeherder.group_symbol.clone(),
                symbol: treeherder.symbol.clone(),
                collection: BTreeMap::from([("opt".to_string(), treeherder.is_opt)]),
                machine: TreeherderMachine {
                    platform: treeherder.platform.clone(),
                },
            },
        },
        metadata: TaskMetadata {
            name: task.name.clone(),
            description: task.description.clone(),
            owner: task.owner.clone(),
            source: task.source_url.clone(),
        },
        payload: PublishPayload {
            apks,
            google_play_track: task.google_play_track.clone(),
            dry_run: task.dry_run,
        },
        provisioner_id: task.provisioner_id.clone(),
        requires: REQUIRES_ALL_COMPLETED.to_string(),
        retries: TASK_RETRIES,
        routes: treeherder_routes(repository, revision, push_id),
        scopes: task.scopes.clone(),
        worker_type: task.worker_type.clone(),
    }
}

/// RFC 3339 UTC timestamps with millisecond precision, as the queue expects
mod rfc3339_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
