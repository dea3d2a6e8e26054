use super::{types::Config, ConfigError};
use crate::artifacts::ApkMatcher;
use crate::routes::{RouteField, RoutePattern};

/// Validate configuration
/// Currently validates:
/// - At least one architecture is watched
/// - The index pattern compiles and carries every route field
/// - The APK pattern compiles
/// - Pulse port is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.architectures_to_watch.is_empty() {
        return Err(ConfigError::ValidationError(
            "architectures_to_watch cannot be empty".to_string(),
        ));
    }

    let pattern = RoutePattern::compile(&config.taskcluster_index_pattern)
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    for field in RouteField::ALL {
        if !pattern.has_field(field) {
            return Err(ConfigError::ValidationError(format!(
                "taskcluster_index_pattern must contain {{{}}}",
                field
            )));
        }
    }

    ApkMatcher::new(&config.apk_artifact_pattern)
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    if config.pulse.port == 0 {
        return Err(ConfigError::ValidationError(
            "pulse.port cannot be 0".to_string(),
        ));
    }

    Ok(())
}
