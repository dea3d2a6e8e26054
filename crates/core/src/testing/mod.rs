//! Testing utilities and mock implementations.
//!
//! Every collaborator trait of the publish pipeline has a recording mock
//! here, so the publisher and the dispatcher can be exercised end to end
//! without Taskcluster, Treeherder or hg.
//!
//! # Example
//!
//! ```rust,ignore
//! use aurora_publisher_core::testing::{fixtures, MockBuildIndex, MockBuildQueue};
//!
//! let index = MockBuildIndex::new();
//! let queue = MockBuildQueue::new();
//! fixtures::seed_aurora_builds(&index, &queue).await;
//! ```

mod mock_dashboard;
mod mock_index;
mod mock_push_log;
mod mock_queue;

pub use mock_dashboard::{MockJobDashboard, RecordedJobQuery};
pub use mock_index::MockBuildIndex;
pub use mock_push_log::MockPushLog;
pub use mock_queue::{CreatedTask, MockBuildQueue};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::{MockBuildIndex, MockBuildQueue};
    use crate::config::Config;
    use crate::routes::RoutePattern;
    use crate::types::{Artifact, TaskDefinition};

    pub const INDEX_PATTERN: &str =
        "gecko.v2.{repository}.revision.{revision}.mobile-l10n.{architecture}.multi";
    pub const APK_PATTERN: &str = r"^public/build/fennec-\d+\.0a2\.multi\.android-[^/]+\.apk$";

    pub const REPOSITORY: &str = "mozilla-aurora";
    pub const REVISION: &str = "ae3b6bfb810476141647ad681b796ed118062412";
    pub const PUSH_ID: &str = "10259";
    pub const X86_TASK_ID: &str = "NtEQavvdQRaYQGryyJMPnA";
    pub const ARM_TASK_ID: &str = "TJtktGqCRmyyWKH_YJ4sBQ";
    pub const X86_APK: &str = "public/build/fennec-51.0a2.multi.android-i386.apk";
    pub const ARM_APK: &str = "public/build/fennec-51.0a2.multi.android-arm.apk";

    /// Logical architecture -> index architecture, as configured by default
    pub fn architectures() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("armv7_v15".to_string(), "android-api-15-opt".to_string()),
            ("x86".to_string(), "android-x86-opt".to_string()),
        ])
    }

    /// A complete configuration with dummy credentials.
    pub fn test_config() -> Config {
        serde_json::from_value(json!({
            "credentials": {"client_id": "dummy-client-id", "access_token": "dummy-token"},
            "architectures_to_watch": architectures(),
            "taskcluster_index_pattern": INDEX_PATTERN,
            "apk_artifact_pattern": APK_PATTERN,
            "task": {
                "owner": "r@m.c",
                "provisioner_id": "dummy-provisioner",
                "worker_type": "dummy-worker",
                "scopes": ["project:releng:googleplay:aurora"],
                "treeherder": {"reason": "Dummy reason"}
            },
            "pulse": {"user": "dummy-user", "password": "dummy-password"}
        }))
        .unwrap_or_else(|e| panic!("invalid test config: {e}"))
    }

    /// Artifacts of a multi-locale Android build
    pub fn build_artifacts(apk: &str) -> Vec<Artifact> {
        vec![
            Artifact::named("public/build/buildbot_properties.json"),
            Artifact::named(apk),
            Artifact::named("public/build/en-US/mozinfo.json"),
            Artifact::named("public/logs/live_backing.log"),
        ]
    }

    /// Definition of a build task as indexed for `architecture`
    pub fn build_task_definition(
        repository: &str,
        revision: &str,
        architecture: &str,
    ) -> TaskDefinition {
        let namespace = RoutePattern::compile(INDEX_PATTERN)
            .map(|pattern| pattern.render(repository, revision, architecture))
            .unwrap_or_else(|e| panic!("invalid index pattern: {e}"));

        TaskDefinition::with_routes([
            format!("index.{}", namespace),
            format!(
                "index.gecko.v2.{}.latest.mobile-l10n.{}.multi",
                repository, architecture
            ),
            format!("tc-treeherder.v2.{}.{}.{}", repository, revision, PUSH_ID),
        ])
    }

    /// Index and queue contents of the two finished Aurora builds
    pub async fn seed_aurora_builds(index: &MockBuildIndex, queue: &MockBuildQueue) {
        let pattern = RoutePattern::compile(INDEX_PATTERN)
            .unwrap_or_else(|e| panic!("invalid index pattern: {e}"));

        for (architecture, task_id, apk) in [
            ("android-x86-opt", X86_TASK_ID, X86_APK),
            ("android-api-15-opt", ARM_TASK_ID, ARM_APK),
        ] {
            index
                .add_task(&pattern.render(REPOSITORY, REVISION, architecture), task_id)
                .await;
            queue
                .add_task_definition(
                    task_id,
                    build_task_definition(REPOSITORY, REVISION, architecture),
                )
                .await;
            queue.set_artifacts(task_id, build_artifacts(apk)).await;
        }
    }

    /// A Pulse `task-completed` message body
    pub fn task_completed_message(task_id: &str) -> Vec<u8> {
        json!({
            "status": {
                "taskId": task_id,
                "provisionerId": "aws-provisioner-v1",
                "workerType": "gecko-3-b-android",
                "state": "completed",
                "runs": [{"runId": 0, "state": "completed"}]
            },
            "runId": 0,
            "workerGroup": "us-west-2",
            "workerId": "i-0123456789",
            "version": 1
        })
        .to_string()
        .into_bytes()
    }
}
