//! One build task per watched architecture.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{PublishError, ServiceError};
use crate::routes::RoutePattern;
use crate::services::BuildIndex;
use crate::types::ResolvedTask;

/// Look up the build task of every architecture, one after the other.
///
/// `architectures` maps logical architectures to the names used in index
/// namespaces. The first architecture that is not indexed aborts the lookup.
pub async fn resolve_task_ids(
    index: &dyn BuildIndex,
    namespace_pattern: &RoutePattern,
    repository: &str,
    revision: &str,
    architectures: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, ResolvedTask>, PublishError> {
    let mut resolved = BTreeMap::new();

    for (logical, index_architecture) in architectures {
        let namespace = namespace_pattern.render(repository, revision, index_architecture);

        let task_id = match index.find_task(&namespace).await {
            Ok(task_id) => task_id,
            Err(ServiceError::IndexEntryNotFound { .. }) => {
                return Err(PublishError::TaskNotFound {
                    repository: repository.to_string(),
                    revision: revision.to_string(),
                    architecture: index_architecture.clone(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        debug!(
            architecture = logical.as_str(),
            task_id = task_id.as_str(),
            "Resolved build task"
        );
        resolved.insert(logical.clone(), ResolvedTask { task_id });
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockBuildIndex};

    fn pattern() -> RoutePattern {
        RoutePattern::compile(fixtures::INDEX_PATTERN).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_every_architecture() {
        let index = MockBuildIndex::new();
        let pattern = pattern();
        let architectures = fixtures::architectures();
        for (logical, index_arch) in &architectures {
            let namespace = pattern.render("mozilla-aurora", "abc", index_arch);
            index
                .add_task(&namespace, &format!("task-{}", logical))
                .await;
        }

        let resolved =
            resolve_task_ids(&index, &pattern, "mozilla-aurora", "abc", &architectures)
                .await
                .unwrap();

        assert_eq!(
            resolved.keys().collect::<Vec<_>>(),
            architectures.keys().collect::<Vec<_>>()
        );
        assert_eq!(resolved["x86"].task_id, "task-x86");
        assert_eq!(resolved["armv7_v15"].task_id, "task-armv7_v15");
        assert_eq!(index.recorded_lookups().await.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_architecture_names_index_architecture() {
        let index = MockBuildIndex::new();
        let pattern = pattern();
        let namespace = pattern.render("mozilla-aurora", "abc", "android-api-15-opt");
        index.add_task(&namespace, "arm-task").await;

        let err = resolve_task_ids(
            &index,
            &pattern,
            "mozilla-aurora",
            "abc",
            &fixtures::architectures(),
        )
        .await
        .unwrap_err();

        match err {
            PublishError::TaskNotFound { architecture, .. } => {
                assert_eq!(architecture, "android-x86-opt");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stops_at_first_missing_architecture() {
        let index = MockBuildIndex::new();

        let result = resolve_task_ids(
            &index,
            &pattern(),
            "mozilla-aurora",
            "abc",
            &fixtures::architectures(),
        )
        .await;

        assert!(result.is_err());
        // armv7_v15 sorts first and fails, x86 is never queried
        assert_eq!(index.recorded_lookups().await.len(), 1);
    }

    #[tokio::test]
    async fn test_service_errors_propagate() {
        let index = MockBuildIndex::new();
        index
            .set_next_error(ServiceError::UnexpectedStatus {
                service: "taskcluster",
                status: 500,
                message: "boom".to_string(),
            })
            .await;

        let err = resolve_task_ids(
            &index,
            &pattern(),
            "mozilla-aurora",
            "abc",
            &fixtures::architectures(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PublishError::Service(_)));
    }
}
