//! Creation of missing connectors.
//!
//! Three tool kinds can be provisioned. Each goes through the same steps:
//!
//! 1. register a bare connector entry of the tool type on the project (201)
//! 2. build the tool-specific settings, looking up foreign ids where needed
//! 3. store the settings on the connector (200)
//!
//! A failure at any step abandons that connector only.

use serde::Serialize;

use crate::auth::PolarisAuth;
use crate::blackduck::BlackDuckClient;
use crate::config::ConnectorSettings;
use crate::cvms::CvmsClient;
use crate::error::{ApiError, ApiResult};
use crate::model::{ConnectorDescriptor, ProjectId};
use crate::polaris::PolarisLocator;

/// Branch id stored on a Polaris connector when no branch was resolved
pub const DEFAULT_BRANCH_ID: &str = "default";

/// Tool kinds that can be provisioned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    /// Black Duck Hub (software composition analysis)
    BlackDuckHub,
    /// Polaris (static analysis as a service)
    Polaris,
    /// Coverity Connect (SAST)
    Coverity,
}

impl ConnectorKind {
    pub const ALL: [ConnectorKind; 3] = [
        ConnectorKind::BlackDuckHub,
        ConnectorKind::Polaris,
        ConnectorKind::Coverity,
    ];

    /// Tool name as used by the central platform
    pub fn tool_name(&self) -> &'static str {
        match self {
            ConnectorKind::BlackDuckHub => "Black Duck Hub",
            ConnectorKind::Polaris => "Polaris",
            ConnectorKind::Coverity => "Coverity",
        }
    }

    /// Case-insensitive lookup by tool name
    pub fn from_tool_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.tool_name().eq_ignore_ascii_case(name))
    }
}

/// What a new connector should point at
#[derive(Debug, Clone, Copy, Default)]
pub struct ProvisionTarget<'a> {
    /// Project name in the foreign tool
    pub project_name: &'a str,
    pub branch_name: Option<&'a str>,
    /// Application label, used for the Coverity component
    pub application: Option<&'a str>,
    /// Name for the new connector; defaults to the tool name
    pub connector_name: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubConfig {
    pub server_url: String,
    pub api_token: String,
    pub project: ForeignRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolarisConfig {
    pub server_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub project: ForeignRef,
    pub branch: ForeignRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverityConfig {
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub project: String,
    pub stream: String,
    pub component: String,
}

/// Settings payload stored on a connector, one shape per kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConnectorConfig {
    BlackDuckHub(HubConfig),
    Polaris(PolarisConfig),
    Coverity(CoverityConfig),
}

fn required<'s>(value: &'s Option<String>, setting: &'static str) -> ApiResult<&'s str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingSetting(setting))
}

impl ConnectorConfig {
    pub fn coverity(settings: &ConnectorSettings, target: &ProvisionTarget<'_>) -> ApiResult<Self> {
        let server_url = required(&settings.server_url, "connector server URL")?;
        let username = required(&settings.username, "connector username")?;
        let password = required(&settings.password, "connector password")?;
        Ok(Self::Coverity(CoverityConfig {
            server_url: server_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            project: target.project_name.to_string(),
            stream: target.branch_name.unwrap_or(target.project_name).to_string(),
            component: target
                .application
                .filter(|a| !a.is_empty())
                .unwrap_or(target.project_name)
                .to_string(),
        }))
    }

    pub fn hub(
        settings: &ConnectorSettings,
        target: &ProvisionTarget<'_>,
        hub_project_id: String,
    ) -> ApiResult<Self> {
        Ok(Self::BlackDuckHub(HubConfig {
            server_url: required(&settings.server_url, "connector server URL")?.to_string(),
            api_token: required(&settings.api_token, "connector API token")?.to_string(),
            project: ForeignRef {
                id: hub_project_id,
                name: target.project_name.to_string(),
            },
            version: target.branch_name.map(str::to_string),
        }))
    }

    pub fn polaris(
        settings: &ConnectorSettings,
        target: &ProvisionTarget<'_>,
        project_id: String,
        branch_id: Option<String>,
    ) -> ApiResult<Self> {
        let server_url = required(&settings.server_url, "connector server URL")?;
        let token = settings.api_token.clone().filter(|t| !t.is_empty());
        let (email, password) = match token {
            Some(_) => (None, None),
            None => (settings.email.clone(), settings.password.clone()),
        };
        Ok(Self::Polaris(PolarisConfig {
            server_url: server_url.to_string(),
            api_token: token,
            email,
            password,
            project: ForeignRef {
                id: project_id,
                name: target.project_name.to_string(),
            },
            branch: ForeignRef {
                id: branch_id.unwrap_or_else(|| DEFAULT_BRANCH_ID.to_string()),
                name: target.branch_name.unwrap_or_default().to_string(),
            },
        }))
    }
}

/// Creates and configures connectors on a project
pub struct Provisioner<'a> {
    cvms: &'a CvmsClient,
    settings: &'a ConnectorSettings,
    polaris: Option<PolarisLocator>,
}

impl<'a> Provisioner<'a> {
    pub fn new(cvms: &'a CvmsClient, settings: &'a ConnectorSettings) -> Self {
        let polaris = settings.server_url.as_deref().and_then(|url| {
            let auth = PolarisAuth::from_parts(
                settings.api_token.as_deref(),
                settings.email.as_deref(),
                settings.password.as_deref(),
            )?;
            Some(PolarisLocator::new(cvms.http_client(), url, auth))
        });
        Self {
            cvms,
            settings,
            polaris,
        }
    }

    /// Provisions one connector for every requested tool name, in order.
    pub async fn provision_all(
        &self,
        project: &ProjectId,
        kinds: &[String],
        target: &ProvisionTarget<'_>,
    ) -> Vec<ConnectorDescriptor> {
        let mut created = Vec::new();
        for kind in kinds {
            if let Some(connector) = self.provision(project, kind, target).await {
                created.push(connector);
            }
        }
        created
    }

    /// Provisions a connector of the tool named `kind`. Unsupported kinds are
    /// skipped without any request.
    pub async fn provision(
        &self,
        project: &ProjectId,
        kind: &str,
        target: &ProvisionTarget<'_>,
    ) -> Option<ConnectorDescriptor> {
        let Some(kind) = ConnectorKind::from_tool_name(kind) else {
            tracing::info!("Connector type {} cannot be created automatically, skipping", kind);
            return None;
        };

        match self.try_provision(project, kind, target).await {
            Ok(connector) => {
                tracing::info!(
                    "{} connector {} created for project {}",
                    kind.tool_name(),
                    connector.name,
                    project
                );
                Some(connector)
            }
            Err(e) => {
                tracing::error!("Creating {} connector failed: {}", kind.tool_name(), e);
                None
            }
        }
    }

    async fn try_provision(
        &self,
        project: &ProjectId,
        kind: ConnectorKind,
        target: &ProvisionTarget<'_>,
    ) -> ApiResult<ConnectorDescriptor> {
        self.check_settings(kind)?;

        let name = target
            .connector_name
            .filter(|n| !n.is_empty())
            .unwrap_or(kind.tool_name());
        let id = self
            .cvms
            .create_connector(project, kind.tool_name(), name)
            .await?;
        tracing::debug!("Registered {} connector entry {}", kind.tool_name(), id);

        let config = self.build_config(kind, target).await?;
        self.cvms.put_connector_values(&id, &config).await?;

        Ok(ConnectorDescriptor {
            name: name.to_string(),
            id,
            tool: kind.tool_name().to_string(),
        })
    }

    /// Fails before any request when the kind's credentials are missing.
    fn check_settings(&self, kind: ConnectorKind) -> ApiResult<()> {
        required(&self.settings.server_url, "connector server URL")?;
        match kind {
            ConnectorKind::Coverity => {
                required(&self.settings.username, "connector username")?;
                required(&self.settings.password, "connector password")?;
            }
            ConnectorKind::BlackDuckHub => {
                required(&self.settings.api_token, "connector API token")?;
            }
            ConnectorKind::Polaris => {
                if self.polaris.is_none() {
                    return Err(ApiError::MissingSetting(
                        "connector API token or email and password",
                    ));
                }
            }
        }
        Ok(())
    }

    async fn build_config(
        &self,
        kind: ConnectorKind,
        target: &ProvisionTarget<'_>,
    ) -> ApiResult<ConnectorConfig> {
        match kind {
            ConnectorKind::Coverity => ConnectorConfig::coverity(self.settings, target),
            ConnectorKind::BlackDuckHub => {
                let server_url = required(&self.settings.server_url, "connector server URL")?;
                let token = required(&self.settings.api_token, "connector API token")?;
                let hub = BlackDuckClient::new(self.cvms.http_client(), server_url, token);
                let hub_project_id = hub.project_id(target.project_name).await?;
                ConnectorConfig::hub(self.settings, target, hub_project_id)
            }
            ConnectorKind::Polaris => {
                let locator = self.polaris.as_ref().ok_or(ApiError::MissingSetting(
                    "connector API token or email and password",
                ))?;
                let found = locator
                    .locate(target.project_name, target.branch_name)
                    .await?;
                ConnectorConfig::polaris(self.settings, target, found.project_id, found.branch_id)
            }
        }
    }
}
