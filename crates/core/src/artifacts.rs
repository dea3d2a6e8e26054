//! APK selection among a build task's artifacts.

use regex_lite::Regex;

use crate::error::PublishError;
use crate::types::Artifact;

const QUEUE_ARTIFACT_BASE_URL: &str = "https://queue.taskcluster.net/v1/task";

/// Compiled APK artifact name pattern
#[derive(Debug, Clone)]
pub struct ApkMatcher {
    regex: Regex,
}

impl ApkMatcher {
    pub fn new(pattern: &str) -> Result<Self, PublishError> {
        let regex = Regex::new(pattern).map_err(|e| PublishError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Name of the single artifact matching `matcher`.
///
/// Zero or several matches are an error listing every matching name.
pub fn resolve_target_artifact(
    task_id: &str,
    artifacts: &[Artifact],
    matcher: &ApkMatcher,
) -> Result<String, PublishError> {
    let mut candidates: Vec<String> = artifacts
        .iter()
        .filter(|artifact| matcher.is_match(&artifact.name))
        .map(|artifact| artifact.name.clone())
        .collect();

    if candidates.len() == 1 {
        return Ok(candidates.remove(0));
    }

    Err(PublishError::NotExactlyOneArtifact {
        task_id: task_id.to_string(),
        candidates,
    })
}

/// Public download URL of an artifact
pub fn artifact_url(task_id: &str, artifact_name: &str) -> String {
    format!(
        "{}/{}/artifacts/{}",
        QUEUE_ARTIFACT_BASE_URL, task_id, artifact_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const APK_PATTERN: &str = r"^public/build/fennec-\d+\.0a2\.multi\.android-[^/]+\.apk$";

    fn build_artifacts(names: &[&str]) -> Vec<Artifact> {
        names.iter().map(|name| Artifact::named(*name)).collect()
    }

    #[test]
    fn test_single_apk_selected() {
        let matcher = ApkMatcher::new(APK_PATTERN).unwrap();
        let artifacts = build_artifacts(&[
            "public/build/buildbot_properties.json",
            "public/build/fennec-51.0a2.multi.android-arm.apk",
            "public/build/fennec-51.0a2.multi.android-arm.checksums",
            "public/logs/live_backing.log",
        ]);

        assert_eq!(
            resolve_target_artifact("TJtktGqCRmyyWKH_YJ4sBQ", &artifacts, &matcher).unwrap(),
            "public/build/fennec-51.0a2.multi.android-arm.apk"
        );
    }

    #[test]
    fn test_no_apk() {
        let matcher = ApkMatcher::new(APK_PATTERN).unwrap();
        let artifacts = build_artifacts(&["public/logs/live_backing.log"]);

        let err = resolve_target_artifact("task", &artifacts, &matcher).unwrap_err();
        match err {
            PublishError::NotExactlyOneArtifact {
                task_id,
                candidates,
            } => {
                assert_eq!(task_id, "task");
                assert!(candidates.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_several_apks_reports_all_candidates() {
        let matcher = ApkMatcher::new(APK_PATTERN).unwrap();
        let artifacts = build_artifacts(&[
            "public/build/fennec-51.0a2.multi.android-arm.apk",
            "public/build/fennec-51.0a2.multi.android-i386.apk",
        ]);

        let err = resolve_target_artifact("task", &artifacts, &matcher).unwrap_err();
        match err {
            PublishError::NotExactlyOneArtifact { candidates, .. } => {
                assert_eq!(
                    candidates,
                    vec![
                        "public/build/fennec-51.0a2.multi.android-arm.apk",
                        "public/build/fennec-51.0a2.multi.android-i386.apk",
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_en_us_only_apk_does_not_match_multi_pattern() {
        let matcher = ApkMatcher::new(APK_PATTERN).unwrap();
        assert!(!matcher.is_match("public/build/fennec-51.0a2.en-US.android-arm.apk"));
        assert!(!matcher.is_match("public/build/nested/fennec-51.0a2.multi.android-arm.apk"));
        assert!(matcher.is_match("public/build/fennec-52.0a2.multi.android-i386.apk"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = ApkMatcher::new("fennec-(").unwrap_err();
        assert!(matches!(err, PublishError::InvalidPattern { .. }));
    }

    #[test]
    fn test_artifact_url() {
        assert_eq!(
            artifact_url(
                "NtEQavvdQRaYQGryyJMPnA",
                "public/build/fennec-51.0a2.multi.android-i386.apk"
            ),
            "https://queue.taskcluster.net/v1/task/NtEQavvdQRaYQGryyJMPnA/artifacts/public/build/fennec-51.0a2.multi.android-i386.apk"
        );
    }
}
