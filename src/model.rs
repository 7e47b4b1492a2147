//! Identifiers and records exchanged with the central platform.

use std::fmt;

use serde::{Deserialize, Deserializer};

/// Default metadata key used for tag-based project lookup
pub const DEFAULT_TAG_KEY: &str = "integration_name";

/// Job status reported once an analysis has finished
pub const STATUS_COMPLETED: &str = "completed";

/// A project reference as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    /// Exact project name, also the value looked up under `tag_key`
    pub name: String,
    /// Metadata key for the tag fallback
    pub tag_key: String,
}

impl ProjectRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag_key: DEFAULT_TAG_KEY.to_string(),
        }
    }

    pub fn with_tag_key(mut self, tag_key: impl Into<String>) -> Self {
        self.tag_key = tag_key.into();
        self
    }
}

/// The platform answers ids as JSON numbers on some endpoints and as strings
/// on others; both are kept as text.
fn id_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

/// Platform-internal project identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId(String);

/// Platform-internal connector identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectorId(String);

/// Identifier of an asynchronous analysis job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ConnectorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        id_from_json(deserializer).map(Self)
    }
}

impl<'de> Deserialize<'de> for ConnectorId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        id_from_json(deserializer).map(Self)
    }
}

impl<'de> Deserialize<'de> for JobHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        id_from_json(deserializer).map(Self)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tool connector configured on a project
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectorDescriptor {
    pub name: String,
    pub id: ConnectorId,
    /// Platform tool name, e.g. `Black Duck Hub`
    pub tool: String,
}

/// Current state of a job
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobStatus {
    pub status: String,
}

impl JobStatus {
    /// Only `completed` ends the wait; every other status is still running.
    pub fn is_terminal(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}
