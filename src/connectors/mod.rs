//! Tool connectors configured on a project
//!
//! Listing and filtering live here; creating missing connectors is in
//! [`provision`].

pub mod provision;

use std::fmt;

use crate::cvms::CvmsClient;
use crate::model::{ConnectorDescriptor, ProjectId};

/// Collector type selecting every connector regardless of tool
pub const ALL_TOOLS: &str = "ALL";

/// Which connector tool types a run targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolFilter {
    /// Every connector on the project
    All,
    /// Connectors whose tool is one of these names (compared case-insensitively)
    Tools(Vec<String>),
}

impl ToolFilter {
    /// Parses the comma separated collector type list, or the `ALL` sentinel.
    pub fn parse(types: &str) -> Self {
        if types.trim() == ALL_TOOLS {
            return Self::All;
        }
        Self::Tools(
            types.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn matches(&self, tool: &str) -> bool {
        match self {
            Self::All => true,
            Self::Tools(tools) => {
                let tool = tool.trim().to_lowercase();
                tools.iter().any(|t| t.to_lowercase() == tool)
            }
        }
    }

    /// Tool names explicitly requested; empty for `ALL`
    pub fn requested(&self) -> &[String] {
        match self {
            Self::All => &[],
            Self::Tools(tools) => tools,
        }
    }
}

impl fmt::Display for ToolFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL_TOOLS),
            Self::Tools(tools) => f.write_str(&tools.join(",")),
        }
    }
}

/// Applies the tool filter and, outside `ALL`, the optional connector name.
///
/// With a name only the first connector of a wanted tool whose name matches
/// case-insensitively is returned; the rest of the listing is not examined.
pub fn select_connectors(
    connectors: Vec<ConnectorDescriptor>,
    filter: &ToolFilter,
    name: Option<&str>,
) -> Vec<ConnectorDescriptor> {
    if *filter == ToolFilter::All {
        return connectors;
    }

    let mut wanted = connectors.into_iter().filter(|c| filter.matches(&c.tool));
    match name.filter(|n| !n.is_empty()) {
        Some(name) => {
            let name = name.to_lowercase();
            wanted
                .find(|c| c.name.to_lowercase() == name)
                .into_iter()
                .collect()
        }
        None => wanted.collect(),
    }
}

/// Lists connectors of a project
pub struct ConnectorRegistry<'a> {
    cvms: &'a CvmsClient,
}

impl<'a> ConnectorRegistry<'a> {
    pub fn new(cvms: &'a CvmsClient) -> Self {
        Self { cvms }
    }

    /// Connectors on `project` selected by `filter` and `name`. A failed
    /// listing is logged and yields no connectors.
    pub async fn list(
        &self,
        project: &ProjectId,
        filter: &ToolFilter,
        name: Option<&str>,
    ) -> Vec<ConnectorDescriptor> {
        match self.cvms.list_connectors(project).await {
            Ok(connectors) => {
                tracing::debug!(
                    "Project {} has {} connectors configured",
                    project,
                    connectors.len()
                );
                select_connectors(connectors, filter, name)
            }
            Err(e) => {
                tracing::error!("Listing connectors of project {} failed: {}", project, e);
                Vec::new()
            }
        }
    }
}
