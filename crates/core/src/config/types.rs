use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub credentials: CredentialsConfig,
    /// Logical architecture (as published to Google Play) -> architecture
    /// name used in the Taskcluster index namespace.
    #[serde(default = "default_architectures")]
    pub architectures_to_watch: BTreeMap<String, String>,
    /// Index namespace template with `{repository}`, `{revision}` and
    /// `{architecture}` placeholders.
    #[serde(default = "default_index_pattern")]
    pub taskcluster_index_pattern: String,
    /// Regex selecting the APK among a build task's artifacts.
    #[serde(default = "default_apk_pattern")]
    pub apk_artifact_pattern: String,
    pub task: TaskConfig,
    pub pulse: PulseConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub verbose: bool,
}

fn default_architectures() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("armv7_v15".to_string(), "android-api-15-opt".to_string()),
        ("x86".to_string(), "android-x86-opt".to_string()),
    ])
}

fn default_index_pattern() -> String {
    "gecko.v2.{repository}.revision.{revision}.mobile-l10n.{architecture}.multi".to_string()
}

fn default_apk_pattern() -> String {
    r"^public/build/fennec-\d+\.0a2\.multi\.android-[^/]+\.apk$".to_string()
}

/// Taskcluster credentials
#[derive(Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    pub client_id: String,
    pub access_token: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Definition of the task created for each publishable revision
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskConfig {
    /// Task name; also the Treeherder job name used for de-duplication.
    #[serde(default = "default_task_name")]
    pub name: String,
    #[serde(default = "default_task_description")]
    pub description: String,
    pub owner: String,
    #[serde(default = "default_source_url")]
    pub source_url: String,
    pub provisioner_id: String,
    pub worker_type: String,
    pub scopes: Vec<String>,
    #[serde(default = "default_google_play_track")]
    pub google_play_track: String,
    #[serde(default)]
    pub dry_run: bool,
    pub treeherder: TreeherderConfig,
}

fn default_task_name() -> String {
    "Google Play Publisher".to_string()
}

fn default_task_description() -> String {
    "Publishes Aurora builds to Google Play Store".to_string()
}

fn default_source_url() -> String {
    "https://github.com/mozilla-releng/fennec-aurora-task-creator".to_string()
}

fn default_google_play_track() -> String {
    "alpha".to_string()
}

/// How the created task shows up in Treeherder
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TreeherderConfig {
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_group_name")]
    pub group_name: String,
    #[serde(default = "default_group_symbol")]
    pub group_symbol: String,
    #[serde(default = "default_job_symbol")]
    pub symbol: String,
    pub reason: String,
    #[serde(default = "default_tier")]
    pub tier: u32,
    #[serde(default = "default_is_opt")]
    pub is_opt: bool,
}

fn default_platform() -> String {
    "Android".to_string()
}

fn default_group_name() -> String {
    "Publisher".to_string()
}

fn default_group_symbol() -> String {
    "pub".to_string()
}

fn default_job_symbol() -> String {
    "gp".to_string()
}

fn default_tier() -> u32 {
    3
}

fn default_is_opt() -> bool {
    true
}

/// Pulse (AMQP) connection and bindings
#[derive(Clone, Deserialize, Serialize)]
pub struct PulseConfig {
    #[serde(default = "default_pulse_host")]
    pub host: String,
    #[serde(default = "default_pulse_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(default = "default_queue")]
    pub queue: String,
    #[serde(default = "default_exchanges")]
    pub exchanges: Vec<ExchangeBinding>,
    /// Leave messages whose processing failed for an unclassified reason in
    /// the queue instead of acknowledging them.
    #[serde(default)]
    pub requeue_unclassified: bool,
}

impl std::fmt::Debug for PulseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("queue", &self.queue)
            .field("exchanges", &self.exchanges)
            .field("requeue_unclassified", &self.requeue_unclassified)
            .finish()
    }
}

fn default_pulse_host() -> String {
    "pulse.mozilla.org".to_string()
}

fn default_pulse_port() -> u16 {
    5671
}

fn default_queue() -> String {
    "fennec-auroras-to-process".to_string()
}

fn default_exchanges() -> Vec<ExchangeBinding> {
    vec![ExchangeBinding {
        path: "exchange/taskcluster-queue/v1/task-completed".to_string(),
        routing_keys: vec![
            "route.index.gecko.v2.mozilla-aurora.nightly.latest.mobile.#".to_string(),
        ],
    }]
}

/// An exchange and the routing keys the queue is bound with
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExchangeBinding {
    pub path: String,
    pub routing_keys: Vec<String>,
}

/// Remote service locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesConfig {
    #[serde(default = "default_taskcluster_root_url")]
    pub taskcluster_root_url: String,
    #[serde(default = "default_treeherder_url")]
    pub treeherder_url: String,
    #[serde(default = "default_hg_url")]
    pub hg_url: String,
    /// Path of a repository on the hg server, `{repository}` is replaced by
    /// the repository name found in the task routes.
    #[serde(default = "default_hg_repository_path")]
    pub hg_repository_path: String,
    /// Timeout applied to Treeherder and hg requests (default: 10)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            taskcluster_root_url: default_taskcluster_root_url(),
            treeherder_url: default_treeherder_url(),
            hg_url: default_hg_url(),
            hg_repository_path: default_hg_repository_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_taskcluster_root_url() -> String {
    "https://taskcluster.net".to_string()
}

fn default_treeherder_url() -> String {
    "https://treeherder.mozilla.org".to_string()
}

fn default_hg_url() -> String {
    "https://hg.mozilla.org".to_string()
}

fn default_hg_repository_path() -> String {
    "releases/{repository}".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

/// Prometheus endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9464
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub client_id: String,
    pub access_token_configured: bool,
    pub architectures_to_watch: BTreeMap<String, String>,
    pub taskcluster_index_pattern: String,
    pub apk_artifact_pattern: String,
    pub task: TaskConfig,
    pub pulse: SanitizedPulseConfig,
    pub services: ServicesConfig,
    pub metrics: MetricsConfig,
    pub verbose: bool,
}

/// Sanitized Pulse config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPulseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password_configured: bool,
    pub queue: String,
    pub exchanges: Vec<ExchangeBinding>,
    pub requeue_unclassified: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            client_id: config.credentials.client_id.clone(),
            access_token_configured: !config.credentials.access_token.is_empty(),
            architectures_to_watch: config.architectures_to_watch.clone(),
            taskcluster_index_pattern: config.taskcluster_index_pattern.clone(),
            apk_artifact_pattern: config.apk_artifact_pattern.clone(),
            task: config.task.clone(),
            pulse: SanitizedPulseConfig {
                host: config.pulse.host.clone(),
                port: config.pulse.port,
                user: config.pulse.user.clone(),
                password_configured: !config.pulse.password.is_empty(),
                queue: config.pulse.queue.clone(),
                exchanges: config.pulse.exchanges.clone(),
                requeue_unclassified: config.pulse.requeue_unclassified,
            },
            services: config.services.clone(),
            metrics: config.metrics.clone(),
            verbose: config.verbose,
        }
    }
}
