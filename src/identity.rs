//! Resolution of a [`ProjectRef`] to a [`ProjectId`].
//!
//! Strategies run in order and stop at the first hit:
//!
//! 1. exact project name
//! 2. metadata tag `tag_key` whose trimmed value equals the reference
//! 3. creation, when the caller allows it
//!
//! A failed query is logged and counts as "no match" for that strategy.

use crate::cvms::{CvmsClient, ProjectQuery, ProjectRecord};
use crate::error::ApiResult;
use crate::model::{ProjectId, ProjectRef};

/// Resolves projects against the central platform
pub struct ProjectResolver<'a> {
    cvms: &'a CvmsClient,
}

impl<'a> ProjectResolver<'a> {
    pub fn new(cvms: &'a CvmsClient) -> Self {
        Self { cvms }
    }

    /// Resolves `project`, creating it when `create_if_missing` is set and
    /// neither lookup matched.
    pub async fn resolve(&self, project: &ProjectRef, create_if_missing: bool) -> Option<ProjectId> {
        if let Some(id) = self.find_by_name(project).await {
            return Some(id);
        }

        tracing::debug!(
            "Project was not found with project name -> trying to find project with tag \"{}\"..",
            project.tag_key
        );
        if let Some(id) = self.find_by_tag(project).await {
            return Some(id);
        }

        if create_if_missing {
            tracing::debug!(
                "Project with name {} was not found and creation is allowed -> will create the project.",
                project.name
            );
            return self.create(&project.name).await;
        }
        None
    }

    pub async fn find_by_name(&self, project: &ProjectRef) -> Option<ProjectId> {
        let records = self.query(&ProjectQuery::Name(&project.name)).await?;
        let found = match_by_name(&records, &project.name);
        self.report(project, found)
    }

    pub async fn find_by_tag(&self, project: &ProjectRef) -> Option<ProjectId> {
        let query = ProjectQuery::Tag {
            key: &project.tag_key,
            value: &project.name,
        };
        let records = self.query(&query).await?;
        let found = match_by_tag(&records, &project.tag_key, &project.name);
        self.report(project, found)
    }

    /// Creates a project named `name`. A failure is logged, not returned.
    pub async fn create(&self, name: &str) -> Option<ProjectId> {
        match self.cvms.create_project(name).await {
            Ok(id) => {
                tracing::info!("Project: {} created!", name);
                Some(id)
            }
            Err(e) => {
                tracing::error!("Project: {} creation failed! {}", name, e);
                None
            }
        }
    }

    async fn query(&self, query: &ProjectQuery<'_>) -> Option<Vec<ProjectRecord>> {
        log_failure(self.cvms.query_projects(query).await)
    }

    fn report(&self, project: &ProjectRef, found: Option<&ProjectRecord>) -> Option<ProjectId> {
        match found {
            Some(record) => {
                tracing::debug!("Matched project {:?}", record);
                Some(record.id.clone())
            }
            None => {
                tracing::error!("Project: {} not found!", project.name);
                None
            }
        }
    }
}

fn log_failure<T>(result: ApiResult<T>) -> Option<T> {
    result
        .map_err(|e| tracing::error!("Project query failed: {}", e))
        .ok()
}

/// The query endpoint filters loosely, so the name is compared exactly here.
fn match_by_name<'r>(records: &'r [ProjectRecord], name: &str) -> Option<&'r ProjectRecord> {
    records.iter().find(|r| r.name == name)
}

fn match_by_tag<'r>(
    records: &'r [ProjectRecord],
    tag_key: &str,
    value: &str,
) -> Option<&'r ProjectRecord> {
    records.iter().find(|r| {
        r.metadata
            .iter()
            .any(|m| m.name == tag_key && m.text().is_some_and(|v| v.trim() == value))
    })
}
