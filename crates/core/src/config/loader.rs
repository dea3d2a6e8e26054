use figment::{
    providers::{Format, Json, Serialized},
    value::Value as FigmentValue,
    Figment, Provider,
};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

use super::{types::Config, ConfigError};

/// How an environment variable's raw string is turned into a config value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Integer,
    Boolean,
    /// Lists and maps, given as JSON documents
    Json,
}

impl ValueKind {
    fn parse(self, env_key: &'static str, raw: &str) -> Result<Value, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidEnvironmentValue { env_key, message };

        match self {
            ValueKind::String => Ok(Value::String(raw.to_string())),
            ValueKind::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| invalid(e.to_string())),
            ValueKind::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
                "0" | "false" | "no" | "off" | "" => Ok(Value::Bool(false)),
                other => Err(invalid(format!("`{}` is not a boolean", other))),
            },
            ValueKind::Json => serde_json::from_str(raw).map_err(|e| invalid(e.to_string())),
        }
    }
}

/// A configuration key reachable both from the file and the environment
#[derive(Debug, Clone, Copy)]
pub struct ConfigKey {
    pub path: &'static str,
    pub env_key: &'static str,
    pub kind: ValueKind,
    pub required: bool,
}

const fn key(path: &'static str, env_key: &'static str, kind: ValueKind) -> ConfigKey {
    ConfigKey {
        path,
        env_key,
        kind,
        required: false,
    }
}

const fn required(path: &'static str, env_key: &'static str, kind: ValueKind) -> ConfigKey {
    ConfigKey {
        path,
        env_key,
        kind,
        required: true,
    }
}

/// Every known key. Defaults live on the config types.
pub const CONFIG_KEYS: &[ConfigKey] = &[
    required("credentials.client_id", "TASKCLUSTER_CLIENT_ID", ValueKind::String),
    required("credentials.access_token", "TASKCLUSTER_ACCESS_TOKEN", ValueKind::String),
    key("architectures_to_watch", "ARCHITECTURES_TO_WATCH", ValueKind::Json),
    key("taskcluster_index_pattern", "TASKCLUSTER_INDEX_PATTERN", ValueKind::String),
    key("apk_artifact_pattern", "APK_ARTIFACT_PATTERN", ValueKind::String),
    key("task.name", "TASK_NAME", ValueKind::String),
    key("task.description", "TASK_DESCRIPTION", ValueKind::String),
    required("task.owner", "TASK_OWNER_EMAIL", ValueKind::String),
    key("task.source_url", "TASK_SOURCE_URL", ValueKind::String),
    required("task.provisioner_id", "TASK_PROVISIONER_ID", ValueKind::String),
    required("task.worker_type", "TASK_WORKER_TYPE", ValueKind::String),
    required("task.scopes", "TASK_SCOPES", ValueKind::Json),
    key("task.google_play_track", "TASK_GOOGLE_PLAY_TRACK", ValueKind::String),
    key("task.dry_run", "TASK_DRY_RUN", ValueKind::Boolean),
    key("task.treeherder.platform", "TREEHERDER_PLATFORM", ValueKind::String),
    key("task.treeherder.group_name", "TREEHERDER_GROUP_NAME", ValueKind::String),
    key("task.treeherder.group_symbol", "TREEHERDER_GROUP_SYMBOL", ValueKind::String),
    key("task.treeherder.symbol", "TREEHERDER_JOB_SYMBOL", ValueKind::String),
    required("task.treeherder.reason", "TREEHERDER_JOB_REASON", ValueKind::String),
    key("task.treeherder.tier", "TREEHERDER_TIER", ValueKind::Integer),
    key("task.treeherder.is_opt", "TREEHERDER_IS_OPT", ValueKind::Boolean),
    key("pulse.host", "PULSE_HOST", ValueKind::String),
    key("pulse.port", "PULSE_PORT", ValueKind::Integer),
    required("pulse.user", "PULSE_USER", ValueKind::String),
    required("pulse.password", "PULSE_PASSWORD", ValueKind::String),
    key("pulse.queue", "PULSE_QUEUE_NAME", ValueKind::String),
    key("pulse.exchanges", "PULSE_EXCHANGES", ValueKind::Json),
    key("pulse.requeue_unclassified", "PULSE_REQUEUE_UNCLASSIFIED", ValueKind::Boolean),
    key("services.taskcluster_root_url", "TASKCLUSTER_ROOT_URL", ValueKind::String),
    key("services.treeherder_url", "TREEHERDER_URL", ValueKind::String),
    key("services.hg_url", "HG_URL", ValueKind::String),
    key("services.hg_repository_path", "HG_REPOSITORY_PATH", ValueKind::String),
    key("services.request_timeout_secs", "REQUEST_TIMEOUT_SECS", ValueKind::Integer),
    key("metrics.enabled", "METRICS_ENABLED", ValueKind::Boolean),
    key("metrics.port", "METRICS_PORT", ValueKind::Integer),
    key("verbose", "VERBOSE_MODE", ValueKind::Boolean),
];

/// Load configuration from an optional JSON file with environment variable overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_with_env(path, |name| std::env::var(name).ok())
}

/// Same as [`load_config`] with a custom environment lookup
pub fn load_config_with_env<F>(path: Option<&Path>, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut root = match path {
        Some(path) => file_values(path)?,
        None => Map::new(),
    };

    // An environment value replaces the whole file value at its path,
    // maps and lists included.
    apply_environment_overrides(&mut root, &env)?;
    extract(Figment::from(Serialized::defaults(Value::Object(root))))
}

fn file_values(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    debug!(path = %path.display(), "Reading configuration file");

    let value: Value = Figment::from(Json::file(path))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Load configuration from a JSON string, without environment overrides
pub fn load_config_from_str(json: &str) -> Result<Config, ConfigError> {
    extract(Figment::new().merge(Json::string(json)))
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    figment
        .data()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    for key in CONFIG_KEYS.iter().filter(|k| k.required) {
        let present = matches!(
            figment.find_value(key.path),
            Ok(value) if !matches!(value, FigmentValue::Empty(..))
        );
        if !present {
            return Err(ConfigError::MissingConfiguration {
                env_key: key.env_key,
                path: key.path,
            });
        }
    }

    figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn apply_environment_overrides<F>(
    root: &mut Map<String, Value>,
    env: &F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for key in CONFIG_KEYS {
        if let Some(raw) = env(key.env_key) {
            let value = key.kind.parse(key.env_key, &raw)?;
            debug!(env_key = key.env_key, path = key.path, "Config overridden by environment");
            let segments: Vec<&str> = key.path.split('.').collect();
            insert_path(root, &segments, value);
        }
    }

    Ok(())
}

fn insert_path(target: &mut Map<String, Value>, path: &[&str], value: Value) {
    match path {
        [] => {}
        [last] => {
            target.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let child = target
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_CONFIG: &str = r#"{
        "credentials": {"client_id": "file-client", "access_token": "file-token"},
        "task": {
            "owner": "r@m.c",
            "provisioner_id": "dummy-provisioner",
            "worker_type": "dummy-worker",
            "scopes": ["project:releng:googleplay:aurora"],
            "treeherder": {"reason": "Dummy reason", "tier": 2}
        },
        "pulse": {"user": "dummy-user", "password": "dummy-password"}
    }"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn config_file(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", contents).unwrap();
        temp_file
    }

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(FULL_CONFIG).unwrap();
        assert_eq!(config.credentials.client_id, "file-client");
        assert_eq!(config.task.treeherder.tier, 2);
        assert_eq!(config.task.name, "Google Play Publisher");
    }

    #[test]
    fn test_load_config_from_str_missing_reason() {
        let json = r#"{
            "credentials": {"client_id": "c", "access_token": "t"},
            "task": {"owner": "o", "provisioner_id": "p", "worker_type": "w", "scopes": []},
            "pulse": {"user": "u", "password": "p"}
        }"#;
        let err = load_config_from_str(json).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingConfiguration {
                env_key: "TREEHERDER_JOB_REASON",
                path: "task.treeherder.reason",
            }
        ));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let json = FULL_CONFIG.replace("\"dummy-user\"", "null");
        let err = load_config_from_str(&json).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingConfiguration {
                env_key: "PULSE_USER",
                ..
            }
        ));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config_with_env(Some(Path::new("/nonexistent/config.json")), no_env);
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let file = config_file(FULL_CONFIG);
        let config = load_config_with_env(Some(file.path()), no_env).unwrap();
        assert_eq!(config.credentials.access_token, "file-token");
        assert_eq!(config.pulse.queue, "fennec-auroras-to-process");
    }

    #[test]
    fn test_environment_beats_file_beats_default() {
        let file = config_file(FULL_CONFIG);
        let env = env_from(&[
            ("TASKCLUSTER_CLIENT_ID", "env-client"),
            ("TREEHERDER_TIER", "1"),
            ("TASK_DRY_RUN", "true"),
        ]);

        let config = load_config_with_env(Some(file.path()), env).unwrap();

        // env over file
        assert_eq!(config.credentials.client_id, "env-client");
        assert_eq!(config.task.treeherder.tier, 1);
        // env over default
        assert!(config.task.dry_run);
        // file untouched by env
        assert_eq!(config.credentials.access_token, "file-token");
        assert_eq!(config.task.treeherder.reason, "Dummy reason");
        // default
        assert_eq!(config.task.treeherder.symbol, "gp");
    }

    #[test]
    fn test_environment_map_replaces_file_map() {
        let mut contents: Value = serde_json::from_str(FULL_CONFIG).unwrap();
        contents["architectures_to_watch"] = serde_json::json!({
            "x86": "android-x86-opt",
            "armv7_v15": "android-api-15-opt"
        });
        let file = config_file(&contents.to_string());
        let env = env_from(&[("ARCHITECTURES_TO_WATCH", r#"{"x86": "android-x86-opt"}"#)]);

        let config = load_config_with_env(Some(file.path()), env).unwrap();
        assert_eq!(config.architectures_to_watch.len(), 1);
        assert_eq!(
            config.architectures_to_watch.get("x86").map(String::as_str),
            Some("android-x86-opt")
        );
    }

    #[test]
    fn test_environment_list_replaces_file_list() {
        let file = config_file(FULL_CONFIG);
        let env = env_from(&[("TASK_SCOPES", r#"["scope:env"]"#)]);

        let config = load_config_with_env(Some(file.path()), env).unwrap();
        assert_eq!(config.task.scopes, vec!["scope:env"]);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let file = config_file("{ not json");
        let err = load_config_with_env(Some(file.path()), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_environment_only() {
        let env = env_from(&[
            ("TASKCLUSTER_CLIENT_ID", "c"),
            ("TASKCLUSTER_ACCESS_TOKEN", "t"),
            ("TASK_OWNER_EMAIL", "r@m.c"),
            ("TASK_PROVISIONER_ID", "p"),
            ("TASK_WORKER_TYPE", "w"),
            ("TASK_SCOPES", r#"["scope:a", "scope:b"]"#),
            ("TREEHERDER_JOB_REASON", "reason"),
            ("PULSE_USER", "u"),
            ("PULSE_PASSWORD", "pw"),
            ("ARCHITECTURES_TO_WATCH", r#"{"x86": "android-x86-opt"}"#),
            ("PULSE_PORT", "5672"),
        ]);

        let config = load_config_with_env(None, env).unwrap();
        assert_eq!(config.task.scopes, vec!["scope:a", "scope:b"]);
        assert_eq!(config.architectures_to_watch.len(), 1);
        assert_eq!(config.pulse.port, 5672);
    }

    #[test]
    fn test_missing_everything_names_first_required_key() {
        let err = load_config_with_env(None, no_env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingConfiguration {
                env_key: "TASKCLUSTER_CLIENT_ID",
                path: "credentials.client_id",
            }
        ));
        assert!(err.to_string().contains("TASKCLUSTER_CLIENT_ID"));
    }

    #[test]
    fn test_invalid_json_environment_value() {
        let file = config_file(FULL_CONFIG);
        let env = env_from(&[("TASK_SCOPES", "not json")]);
        let err = load_config_with_env(Some(file.path()), env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnvironmentValue {
                env_key: "TASK_SCOPES",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_boolean_environment_value() {
        let file = config_file(FULL_CONFIG);
        let env = env_from(&[("VERBOSE_MODE", "maybe")]);
        let err = load_config_with_env(Some(file.path()), env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnvironmentValue {
                env_key: "VERBOSE_MODE",
                ..
            }
        ));
    }

    #[test]
    fn test_insert_path_nests_objects() {
        let mut root = Map::new();
        insert_path(&mut root, &["task", "treeherder", "tier"], Value::from(1));
        insert_path(&mut root, &["task", "name"], Value::from("n"));
        assert_eq!(
            Value::Object(root),
            serde_json::json!({"task": {"treeherder": {"tier": 1}, "name": "n"}})
        );
    }

    #[test]
    fn test_every_env_key_is_unique() {
        let mut keys: Vec<&str> = CONFIG_KEYS.iter().map(|k| k.env_key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), CONFIG_KEYS.len());
    }
}
