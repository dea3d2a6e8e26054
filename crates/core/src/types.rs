//! Values flowing through one publish attempt.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A Taskcluster task definition, as returned by `queue.task`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    #[serde(default)]
    pub routes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskDefinition {
    pub fn with_routes<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            routes: routes.into_iter().map(Into::into).collect(),
            extra: Map::new(),
        }
    }

    /// JSON form, used in error reports
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// An artifact entry of `queue.listLatestArtifacts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub storage_type: String,
    #[serde(default)]
    pub expires: String,
}

impl Artifact {
    /// Artifact with only a name, for fixtures
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: "application/octet-stream".to_string(),
            storage_type: "s3".to_string(),
            expires: String::new(),
        }
    }
}

/// Build task found in the index for one architecture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifacts {
    pub task_id: String,
    pub all_artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedArtifact {
    pub task_id: String,
    pub target_artifact: String,
}

/// Final per-architecture state: the APK's public URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedArtifact {
    pub task_id: String,
    pub artifact_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_definition_keeps_unknown_fields() {
        let raw = json!({
            "provisionerId": "aws-provisioner-v1",
            "routes": ["index.a.b", "tc-treeherder.v2.x"],
            "metadata": {"name": "build"}
        });

        let definition: TaskDefinition = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(definition.routes.len(), 2);
        assert_eq!(definition.extra["provisionerId"], "aws-provisioner-v1");
        assert_eq!(definition.to_json(), raw);
    }

    #[test]
    fn test_task_definition_without_routes() {
        let definition: TaskDefinition = serde_json::from_value(json!({"a": 1})).unwrap();
        assert!(definition.routes.is_empty());
    }

    #[test]
    fn test_artifact_camel_case() {
        let artifact: Artifact = serde_json::from_value(json!({
            "storageType": "s3",
            "name": "public/build/fennec-51.0a2.multi.android-i386.apk",
            "expires": "2017-09-20T01:08:15.766Z",
            "contentType": "application/vnd.android.package-archive"
        }))
        .unwrap();

        assert_eq!(artifact.storage_type, "s3");
        assert_eq!(
            artifact.content_type,
            "application/vnd.android.package-archive"
        );
    }
}
