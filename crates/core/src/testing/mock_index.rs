//! Mock build index for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::ServiceError;
use crate::services::BuildIndex;

/// Mock implementation of the BuildIndex trait.
///
/// Namespaces that were not registered with [`MockBuildIndex::add_task`]
/// answer [`ServiceError::IndexEntryNotFound`], like the real index does.
///
/// # Example
///
/// ```rust,ignore
/// use aurora_publisher_core::testing::MockBuildIndex;
///
/// let index = MockBuildIndex::new();
/// index.add_task("gecko.v2.mozilla-aurora.revision.abc.mobile-l10n.android-x86-opt.multi", "NtEQavvdQRaYQGryyJMPnA").await;
///
/// // ... run the publisher ...
///
/// assert_eq!(index.recorded_lookups().await.len(), 2);
/// ```
#[derive(Debug)]
pub struct MockBuildIndex {
    /// Namespace -> task id
    tasks: Arc<RwLock<HashMap<String, String>>>,
    /// Every namespace looked up, in order.
    lookups: Arc<RwLock<Vec<String>>>,
    /// If set, the next lookup fails with this error.
    next_error: Arc<RwLock<Option<ServiceError>>>,
}

impl Default for MockBuildIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBuildIndex {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            lookups: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Index `task_id` at `namespace`.
    pub async fn add_task(&self, namespace: &str, task_id: &str) {
        self.tasks
            .write()
            .await
            .insert(namespace.to_string(), task_id.to_string());
    }

    /// Get all looked up namespaces.
    pub async fn recorded_lookups(&self) -> Vec<String> {
        self.lookups.read().await.clone()
    }

    /// Configure the next lookup to fail with the given error.
    pub async fn set_next_error(&self, error: ServiceError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl BuildIndex for MockBuildIndex {
    async fn find_task(&self, namespace: &str) -> Result<String, ServiceError> {
        self.lookups.write().await.push(namespace.to_string());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        self.tasks
            .read()
            .await
            .get(namespace)
            .cloned()
            .ok_or_else(|| ServiceError::IndexEntryNotFound {
                namespace: namespace.to_string(),
            })
    }
}
