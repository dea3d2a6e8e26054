pub mod artifacts;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod metrics;
pub mod payload;
pub mod publish;
pub mod routes;
pub mod services;
pub mod testing;
pub mod types;

pub use artifacts::{artifact_url, resolve_target_artifact, ApkMatcher};
pub use config::{
    load_config, load_config_from_str, load_config_with_env, validate_config, Config, ConfigError,
    SanitizedConfig,
};
pub use dispatch::{parse_task_id, Acknowledgement, DispatchOutcome, Dispatcher};
pub use error::{ErrorKind, PublishError, ServiceError};
pub use fanout::resolve_task_ids;
pub use payload::{build_payload, TaskPayload};
pub use publish::{Collaborators, PublishedTask, Publisher};
pub use routes::{
    extract, pluck_architecture, pluck_repository, pluck_revision, PatternCache, RouteField,
    RoutePattern,
};
pub use services::{
    BuildIndex, BuildQueue, HgPushLog, JobDashboard, PushLog, TaskclusterIndex, TaskclusterQueue,
    TreeherderClient,
};
pub use types::{
    Artifact, FetchedArtifacts, LocatedArtifact, ResolvedTask, SelectedArtifact, TaskDefinition,
};
