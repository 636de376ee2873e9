/// `load_config` module: Loads a static YAML config and injects the server secret from the environment.
///
/// This module is the only place where untrusted YAML is parsed and mapped to strongly-typed
/// structs for the CLI.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into [`CliConfig`]
/// - Inject `LIGHT_SERVER_PASSWORD` (required) and the optional `LIGHT_SERVER_URL` /
///   `LIGHT_SERVER_USER` overrides
/// - Reject combinations the core cannot honour (a document store on a page job)
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich diagnostics, and are surfaced at
/// the CLI boundary.
use anyhow::{bail, Result};
use light_sync_core::collect::{
    ArtifactPredicate, ConflictPolicy, DEFAULT_ENCODING, DEFAULT_INTERFACE,
};
use light_sync_core::synchronise::{RetryPolicy, SyncOptions};
use light_sync_core::ArtifactKind;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

pub const PASSWORD_ENV: &str = "LIGHT_SERVER_PASSWORD";
pub const URL_ENV: &str = "LIGHT_SERVER_URL";
pub const USER_ENV: &str = "LIGHT_SERVER_USER";

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub server: ServerSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub jobs: Vec<JobSection>,
}

#[derive(Deserialize)]
pub struct ServerSection {
    pub url: String,
    pub user: String,
    pub client_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Never read from the file; filled from [`PASSWORD_ENV`].
    #[serde(skip)]
    pub password: String,
}

impl fmt::Debug for ServerSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSection")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("client_id", &self.client_id)
            .field("timeout_secs", &self.timeout_secs)
            .field("password", &"***")
            .finish()
    }
}

impl ServerSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct SyncSection {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl SyncSection {
    pub fn options(&self, dry_run: bool) -> SyncOptions {
        SyncOptions {
            concurrency: self.concurrency.max(1),
            retry: RetryPolicy {
                max_attempts: self.retry_attempts.max(1),
                initial_backoff: Duration::from_millis(self.retry_backoff_ms),
            },
            dry_run,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobSection {
    pub kind: ArtifactKind,
    pub roots: Vec<PathBuf>,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default)]
    pub on_duplicate: ConflictPolicy,
    pub sql_output: Option<PathBuf>,
    pub document_store: Option<PathBuf>,
}

impl JobSection {
    pub fn predicate(&self) -> ArtifactPredicate {
        ArtifactPredicate {
            kind: self.kind,
            encoding: self.encoding.clone(),
            interface: self.interface.clone(),
            on_duplicate: self.on_duplicate,
        }
    }
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_concurrency() -> usize {
    1
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

fn default_interface() -> String {
    DEFAULT_INTERFACE.to_string()
}

/// Loads a static YAML config file (no secrets) and injects required env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Ok(url) = std::env::var(URL_ENV) {
        info!(url = %url, "Server URL overridden from environment");
        config.server.url = url;
    }
    if let Ok(user) = std::env::var(USER_ENV) {
        config.server.user = user;
    }
    config.server.password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(e) => {
            error!(error = ?e, "{PASSWORD_ENV} missing in environment");
            bail!("{PASSWORD_ENV} must be set to log in to the server");
        }
    };

    if config.server.timeout_secs == 0 {
        bail!("server.timeout_secs must be at least 1; 0 would time out every request");
    }
    for job in &config.jobs {
        if job.document_store.is_some() && job.kind != ArtifactKind::Rule {
            bail!("document_store is only supported for rule jobs (found on a {} job)", job.kind);
        }
        if job.roots.is_empty() {
            warn!(kind = %job.kind, "Job has no source roots");
        }
    }
    if config.jobs.is_empty() {
        warn!(config_path = ?path_ref, "Config declares no jobs");
    }

    info!(
        server = %config.server.url,
        jobs = config.jobs.len(),
        "Loaded config"
    );
    Ok(config)
}
