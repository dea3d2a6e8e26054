//! Queue message handling.
//!
//! One `task-completed` message triggers one publish attempt for the
//! revision the completed build task was indexed under. The outcome decides
//! whether the message is acknowledged or put back in the queue.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::error::{ErrorKind, PublishError};
use crate::metrics;
use crate::publish::{PublishedTask, Publisher};
use crate::routes::{pluck_architecture, pluck_repository, pluck_revision};

/// What to tell the broker about a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    Ack,
    Requeue,
}

/// Result of handling one message
#[derive(Debug)]
pub struct DispatchOutcome {
    pub acknowledgement: Acknowledgement,
    pub result: Result<PublishedTask, PublishError>,
}

impl DispatchOutcome {
    /// Label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match (&self.result, self.acknowledgement) {
            (Ok(_), _) => "published",
            (Err(_), Acknowledgement::Requeue) => "requeued",
            (Err(err), Acknowledgement::Ack) => err.kind().as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaskCompletedMessage {
    status: TaskStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskStatus {
    task_id: String,
}

/// Id of the task a `task-completed` message is about
pub fn parse_task_id(body: &[u8]) -> Result<String, PublishError> {
    let message: TaskCompletedMessage = serde_json::from_slice(body)
        .map_err(|e| PublishError::InvalidMessage(e.to_string()))?;
    Ok(message.status.task_id)
}

/// Whether a failed attempt's message is acknowledged
pub fn acknowledgement_for(kind: ErrorKind, requeue_unclassified: bool) -> Acknowledgement {
    match kind {
        ErrorKind::Unclassified if requeue_unclassified => Acknowledgement::Requeue,
        _ => Acknowledgement::Ack,
    }
}

pub struct Dispatcher {
    publisher: Arc<Publisher>,
    requeue_unclassified: bool,
}

impl Dispatcher {
    pub fn new(publisher: Arc<Publisher>) -> Self {
        let requeue_unclassified = publisher.config().pulse.requeue_unclassified;
        Self {
            publisher,
            requeue_unclassified,
        }
    }

    /// Handle one message body. Never fails: errors are logged and classified.
    pub async fn handle_message(&self, body: &[u8]) -> DispatchOutcome {
        let result = self.process(body).await;

        let acknowledgement = match &result {
            Ok(published) => {
                info!("Published through task {}", published.task_id);
                Acknowledgement::Ack
            }
            Err(err) => {
                let kind = err.kind();
                log_failure(err, kind);
                acknowledgement_for(kind, self.requeue_unclassified)
            }
        };

        let outcome = DispatchOutcome {
            acknowledgement,
            result,
        };
        metrics::record_message(outcome.label());
        outcome
    }

    async fn process(&self, body: &[u8]) -> Result<PublishedTask, PublishError> {
        let task_id = parse_task_id(body)?;
        debug!(task_id = task_id.as_str(), "Received task-completed message");

        let definition = self.publisher.queue().task_definition(&task_id).await?;
        let pattern = self.publisher.route_pattern();
        let revision = pluck_revision(&definition, pattern)?;
        let repository = pluck_repository(&definition, pattern)?;

        match pluck_architecture(&definition, pattern) {
            Ok(architecture) => info!(
                "Task {} built {} at {} for {}",
                task_id, repository, revision, architecture
            ),
            Err(_) => info!("Task {} built {} at {}", task_id, repository, revision),
        }

        self.publisher
            .publish_if_possible(&repository, &revision)
            .await
    }
}

fn log_failure(err: &PublishError, kind: ErrorKind) {
    match kind {
        ErrorKind::AlreadyPublished => warn!(kind = kind.as_str(), "{}", err),
        ErrorKind::NotYetReady => info!(kind = kind.as_str(), "{}", err),
        _ => error!(kind = kind.as_str(), "{}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;

    #[test]
    fn test_parse_task_id() {
        let body = br#"{"status": {"taskId": "NtEQavvdQRaYQGryyJMPnA", "state": "completed"}, "runId": 0}"#;
        assert_eq!(parse_task_id(body).unwrap(), "NtEQavvdQRaYQGryyJMPnA");
    }

    #[test]
    fn test_parse_task_id_rejects_garbage() {
        assert!(matches!(
            parse_task_id(b"not json"),
            Err(PublishError::InvalidMessage(_))
        ));
        assert!(matches!(
            parse_task_id(br#"{"status": {}}"#),
            Err(PublishError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_classified_errors_are_acknowledged() {
        for kind in [
            ErrorKind::NotYetReady,
            ErrorKind::AlreadyPublished,
            ErrorKind::UnexpectedRoutes,
            ErrorKind::AmbiguousArtifact,
            ErrorKind::PushLogInconsistency,
            ErrorKind::DashboardInconsistency,
        ] {
            assert_eq!(acknowledgement_for(kind, true), Acknowledgement::Ack);
            assert_eq!(acknowledgement_for(kind, false), Acknowledgement::Ack);
        }
    }

    #[test]
    fn test_unclassified_follows_requeue_setting() {
        assert_eq!(
            acknowledgement_for(ErrorKind::Unclassified, false),
            Acknowledgement::Ack
        );
        assert_eq!(
            acknowledgement_for(ErrorKind::Unclassified, true),
            Acknowledgement::Requeue
        );
    }

    #[test]
    fn test_outcome_labels() {
        let requeued = DispatchOutcome {
            acknowledgement: Acknowledgement::Requeue,
            result: Err(PublishError::Service(ServiceError::Taskcluster {
                message: "boom".to_string(),
            })),
        };
        assert_eq!(requeued.label(), "requeued");

        let not_ready = DispatchOutcome {
            acknowledgement: Acknowledgement::Ack,
            result: Err(PublishError::NoPushId {
                revision: "abc".to_string(),
            }),
        };
        assert_eq!(not_ready.label(), "push_log_inconsistency");
    }
}
