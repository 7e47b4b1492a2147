//! Run configuration
//!
//! A [`Config`] is assembled once from the command line and an optional TOML
//! file, then handed by reference to every component.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::auth::redact_token;
use crate::connectors::ToolFilter;
use crate::jobs::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_TIMEOUT_SECS, PollSchedule};
use crate::model::ProjectRef;

/// Everything one invocation needs
#[derive(Clone)]
pub struct Config {
    /// Central platform URL
    pub url: String,
    /// Central platform API key
    pub api_key: String,
    pub project: ProjectRef,
    pub collector_types: ToolFilter,
    /// Only trigger the connector with this name
    pub collector_name: Option<String>,
    /// Block until each started job has completed
    pub wait_for_analysis: bool,
    /// Upload this report instead of triggering connectors
    pub file: Option<PathBuf>,
    pub create_project_if_missing: bool,
    pub create_connectors_if_missing: bool,
    pub connector: ConnectorSettings,
    pub poll: PollConfig,
}

impl Config {
    /// Logs every setting at debug level, secrets redacted.
    pub fn log_settings(&self) {
        tracing::debug!("All settings used:");
        tracing::debug!("url: {}", self.url);
        tracing::debug!("apikey: {}", redact_token(&self.api_key));
        tracing::debug!("repository: {}", self.project.name);
        tracing::debug!("tag: {}", self.project.tag_key);
        tracing::debug!("collector_type: {}", self.collector_types);
        tracing::debug!(
            "collector_name: {}",
            self.collector_name.as_deref().unwrap_or("")
        );
        tracing::debug!("wait_analysis: {}", self.wait_for_analysis);
        tracing::debug!(
            "filename: {}",
            self.file
                .as_ref()
                .map(|f| f.display().to_string())
                .unwrap_or_default()
        );
        tracing::debug!(
            "create_project_if_not_exists: {}",
            self.create_project_if_missing
        );
        tracing::debug!(
            "create_connector_if_not_exists: {}",
            self.create_connectors_if_missing
        );
        tracing::debug!("connector: {:?}", self.connector);
        tracing::debug!(
            "poll: every {}s, timeout {}s",
            self.poll.interval_secs,
            self.poll.timeout_secs
        );
    }
}

/// Settings read from `--config`
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub poll: PollConfig,
    pub connector: ConnectorSettings,
}

impl FileConfig {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}

/// Status polling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between status checks
    pub interval_secs: u64,
    /// Seconds before a wait is abandoned
    pub timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
        }
    }
}

impl PollConfig {
    pub fn schedule(&self) -> PollSchedule {
        PollSchedule {
            interval: Duration::from_secs(self.interval_secs.max(1)),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Credentials and targets for connectors created by the run
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectorSettings {
    /// Server URL of the tool the connector talks to
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_token: Option<String>,
    pub email: Option<String>,
    /// Branch (or stream) in the tool
    pub branch: Option<String>,
    /// Application label
    pub application: Option<String>,
}

impl ConnectorSettings {
    /// Values set in `overrides` replace the ones in `self`.
    pub fn merge(self, overrides: ConnectorSettings) -> Self {
        Self {
            server_url: overrides.server_url.or(self.server_url),
            username: overrides.username.or(self.username),
            password: overrides.password.or(self.password),
            api_token: overrides.api_token.or(self.api_token),
            email: overrides.email.or(self.email),
            branch: overrides.branch.or(self.branch),
            application: overrides.application.or(self.application),
        }
    }
}

impl fmt::Debug for ConnectorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = |v: &Option<String>| v.as_deref().map(redact_token);
        f.debug_struct("ConnectorSettings")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("api_token", &secret(&self.api_token))
            .field("email", &self.email)
            .field("branch", &self.branch)
            .field("application", &self.application)
            .finish()
    }
}

/// Lenient boolean used by the yes/no flags: `yes`, `true`, `t` and `1` are
/// true, anything else is false.
pub fn parse_flag(value: &str) -> Result<bool, String> {
    Ok(matches!(
        value.trim().to_lowercase().as_str(),
        "yes" | "true" | "t" | "1"
    ))
}

/// Maps the `--log-level` value to a tracing filter directive. The numeric
/// levels `9` (debug) and `0` (info) are still accepted.
pub fn log_level_directive(level: &str) -> String {
    match level.trim() {
        "9" => "debug".to_string(),
        "0" | "" => "info".to_string(),
        other => other.to_lowercase(),
    }
}
