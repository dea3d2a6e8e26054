//! Error taxonomy of the publish pipeline.
//!
//! Every failure a publish attempt can end with is a [`PublishError`]. The
//! dispatcher never inspects variants directly; it matches on
//! [`PublishError::kind`] to decide how to log and acknowledge.

use thiserror::Error;

use crate::routes::RouteField;

/// Failures talking to a remote collaborator
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Taskcluster request failed: {message}")]
    Taskcluster { message: String },

    #[error("No task indexed at {namespace}")]
    IndexEntryNotFound { namespace: String },

    #[error("{service} returned HTTP {status}: {message}")]
    UnexpectedStatus {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Failed to decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl ServiceError {
    /// Wrap an error coming out of the taskcluster client
    pub fn taskcluster(err: anyhow::Error) -> Self {
        ServiceError::Taskcluster {
            message: format!("{:#}", err),
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Build task for {repository} at {revision} is not yet indexed for architecture {architecture}")]
    TaskNotFound {
        repository: String,
        revision: String,
        architecture: String,
    },

    #[error("Treeherder job \"{job_name}\" already exists for {repository} at {revision}")]
    TreeherderJobAlreadyExists {
        repository: String,
        revision: String,
        job_name: String,
    },

    #[error("No route carries the {field} of task definition {task_definition}")]
    UnmatchedRoute {
        field: RouteField,
        task_definition: serde_json::Value,
    },

    #[error("Task {task_id} does not have exactly one matching artifact: {candidates:?}")]
    NotExactlyOneArtifact {
        task_id: String,
        candidates: Vec<String>,
    },

    #[error("No push id found for revision {revision}")]
    NoPushId { revision: String },

    #[error("Too many push ids found for revision {revision}: {push_ids:?}")]
    TooManyPushIds {
        revision: String,
        push_ids: Vec<String>,
    },

    #[error("No Treeherder result set for {repository} at {revision}")]
    NoTreeherderResultSet { repository: String, revision: String },

    #[error("{count} Treeherder result sets for {repository} at {revision}, expected one")]
    TooManyTreeherderResultSets {
        repository: String,
        revision: String,
        count: usize,
    },

    #[error("Invalid pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid queue message: {0}")]
    InvalidMessage(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Coarse classification used by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Some architecture is not built yet; a later message will retry.
    NotYetReady,
    AlreadyPublished,
    UnexpectedRoutes,
    AmbiguousArtifact,
    PushLogInconsistency,
    DashboardInconsistency,
    Unclassified,
}

impl ErrorKind {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotYetReady => "not_yet_ready",
            ErrorKind::AlreadyPublished => "already_published",
            ErrorKind::UnexpectedRoutes => "unexpected_routes",
            ErrorKind::AmbiguousArtifact => "ambiguous_artifact",
            ErrorKind::PushLogInconsistency => "push_log_inconsistency",
            ErrorKind::DashboardInconsistency => "dashboard_inconsistency",
            ErrorKind::Unclassified => "unclassified",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PublishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::TaskNotFound { .. } => ErrorKind::NotYetReady,
            PublishError::TreeherderJobAlreadyExists { .. } => ErrorKind::AlreadyPublished,
            PublishError::UnmatchedRoute { .. } => ErrorKind::UnexpectedRoutes,
            PublishError::NotExactlyOneArtifact { .. } => ErrorKind::AmbiguousArtifact,
            PublishError::NoPushId { .. } | PublishError::TooManyPushIds { .. } => {
                ErrorKind::PushLogInconsistency
            }
            PublishError::NoTreeherderResultSet { .. }
            | PublishError::TooManyTreeherderResultSets { .. } => {
                ErrorKind::DashboardInconsistency
            }
            PublishError::InvalidPattern { .. }
            | PublishError::InvalidMessage(_)
            | PublishError::Service(_) => ErrorKind::Unclassified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let not_found = PublishError::TaskNotFound {
            repository: "mozilla-aurora".into(),
            revision: "abc".into(),
            architecture: "android-x86-opt".into(),
        };
        assert_eq!(not_found.kind(), ErrorKind::NotYetReady);

        let duplicate = PublishError::TreeherderJobAlreadyExists {
            repository: "mozilla-aurora".into(),
            revision: "abc".into(),
            job_name: "Google Play Publisher".into(),
        };
        assert_eq!(duplicate.kind(), ErrorKind::AlreadyPublished);

        let push = PublishError::TooManyPushIds {
            revision: "abc".into(),
            push_ids: vec!["1".into(), "2".into()],
        };
        assert_eq!(push.kind(), ErrorKind::PushLogInconsistency);

        let dashboard = PublishError::NoTreeherderResultSet {
            repository: "mozilla-aurora".into(),
            revision: "abc".into(),
        };
        assert_eq!(dashboard.kind(), ErrorKind::DashboardInconsistency);

        let service = PublishError::from(ServiceError::Taskcluster {
            message: "boom".into(),
        });
        assert_eq!(service.kind(), ErrorKind::Unclassified);
    }

    #[test]
    fn test_artifact_error_lists_candidates() {
        let err = PublishError::NotExactlyOneArtifact {
            task_id: "NtEQavvdQRaYQGryyJMPnA".into(),
            candidates: vec!["a.apk".into(), "b.apk".into()],
        };
        let message = err.to_string();
        assert!(message.contains("a.apk"));
        assert!(message.contains("b.apk"));
        assert_eq!(err.kind(), ErrorKind::AmbiguousArtifact);
    }

    #[test]
    fn test_taskcluster_error_keeps_context() {
        let err = anyhow::anyhow!("404 Not Found").context("calling queue.task");
        let service = ServiceError::taskcluster(err);
        let message = service.to_string();
        assert!(message.contains("calling queue.task"));
        assert!(message.contains("404 Not Found"));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ErrorKind::NotYetReady.to_string(), "not_yet_ready");
        assert_eq!(ErrorKind::Unclassified.as_str(), "unclassified");
    }
}
