//! Mock push log for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::PublishError;
use crate::services::PushLog;

/// Mock implementation of the PushLog trait.
///
/// Unknown revisions answer [`PublishError::NoPushId`].
#[derive(Debug)]
pub struct MockPushLog {
    /// Revision -> push id
    pushes: Arc<RwLock<HashMap<String, String>>>,
    lookups: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<PublishError>>>,
}

impl Default for MockPushLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPushLog {
    pub fn new() -> Self {
        Self {
            pushes: Arc::new(RwLock::new(HashMap::new())),
            lookups: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn add_push(&self, revision: &str, push_id: &str) {
        self.pushes
            .write()
            .await
            .insert(revision.to_string(), push_id.to_string());
    }

    /// Get all looked up revisions.
    pub async fn recorded_lookups(&self) -> Vec<String> {
        self.lookups.read().await.clone()
    }

    /// Configure the next lookup to fail with the given error.
    pub async fn set_next_error(&self, error: PublishError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl PushLog for MockPushLog {
    async fn push_id(&self, _repository: &str, revision: &str) -> Result<String, PublishError> {
        self.lookups.write().await.push(revision.to_string());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        self.pushes
            .read()
            .await
            .get(revision)
            .cloned()
            .ok_or_else(|| PublishError::NoPushId {
                revision: revision.to_string(),
            })
    }
}
