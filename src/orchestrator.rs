//! The fixed run pipeline:
//!
//! 1. resolve the project (by name, by tag, optionally create it)
//! 2. stop quietly when no project was resolved
//! 3. with a report file: upload it and optionally wait for the ingestion
//! 4. otherwise: list matching connectors, create missing ones when allowed,
//!    then trigger each in turn and optionally wait for it
//!
//! Everything runs one step after another. Only a poll timeout is returned
//! as an error; every other failure has already been logged by the component
//! that hit it.

use std::path::Path;
use std::sync::Arc;

use reqwest::Client;

use crate::config::Config;
use crate::connectors::ConnectorRegistry;
use crate::connectors::provision::{ProvisionTarget, Provisioner};
use crate::cvms::CvmsClient;
use crate::error::PollTimeout;
use crate::http_client::create_shared_client;
use crate::identity::ProjectResolver;
use crate::jobs::{JobKind, JobRunner, await_completion};
use crate::model::{JobHandle, ProjectId};

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Resolved (or created) project
    pub project: Option<ProjectId>,
    /// Jobs started, in order
    pub jobs: Vec<JobHandle>,
}

pub struct Orchestrator {
    config: Config,
    cvms: CvmsClient,
}

impl Orchestrator {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Ok(Self::with_client(config, create_shared_client()?))
    }

    pub fn with_client(config: Config, client: Arc<Client>) -> Self {
        let cvms = CvmsClient::new(client, &config.url, config.api_key.clone());
        Self { config, cvms }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&self) -> Result<RunSummary, PollTimeout> {
        let project = &self.config.project;
        let resolver = ProjectResolver::new(&self.cvms);
        let Some(project_id) = resolver
            .resolve(project, self.config.create_project_if_missing)
            .await
        else {
            tracing::info!("Project with name: {} was not found!", project.name);
            return Ok(RunSummary::default());
        };

        let mut summary = RunSummary {
            project: Some(project_id.clone()),
            jobs: Vec::new(),
        };

        match &self.config.file {
            Some(file) => {
                if let Some(job) = self.analyze_file(&project_id, file).await? {
                    summary.jobs.push(job);
                }
            }
            None => {
                summary.jobs = self.run_connectors(&project_id).await?;
            }
        }
        Ok(summary)
    }

    async fn analyze_file(
        &self,
        project: &ProjectId,
        file: &Path,
    ) -> Result<Option<JobHandle>, PollTimeout> {
        let runner = JobRunner::new(&self.cvms);
        let Some(job) = runner.upload_for_analysis(project, file).await else {
            tracing::debug!("No job_id -> something has went wrong!");
            return Ok(None);
        };

        if self.config.wait_for_analysis {
            await_completion(
                &self.cvms,
                &job,
                JobKind::FileAnalysis,
                self.config.poll.schedule(),
            )
            .await?;
            tracing::info!("File: {} has been analyzed!", file.display());
        }
        Ok(Some(job))
    }

    async fn run_connectors(&self, project: &ProjectId) -> Result<Vec<JobHandle>, PollTimeout> {
        let registry = ConnectorRegistry::new(&self.cvms);
        let filter = &self.config.collector_types;
        let name = self.config.collector_name.as_deref();

        let mut connectors = registry.list(project, filter, name).await;
        if connectors.is_empty() && self.config.create_connectors_if_missing {
            let settings = &self.config.connector;
            let target = ProvisionTarget {
                project_name: &self.config.project.name,
                branch_name: settings.branch.as_deref(),
                application: settings.application.as_deref(),
                connector_name: name,
            };
            let provisioner = Provisioner::new(&self.cvms, settings);
            let created = provisioner
                .provision_all(project, filter.requested(), &target)
                .await;
            if !created.is_empty() {
                connectors = registry.list(project, filter, name).await;
            }
        }

        if connectors.is_empty() {
            tracing::info!(
                "There was no collectors configured for project: {}",
                self.config.project.name
            );
            return Ok(Vec::new());
        }

        let runner = JobRunner::new(&self.cvms);
        let mut jobs = Vec::new();
        for connector in &connectors {
            let Some(job) = runner.trigger(project, connector).await else {
                tracing::debug!("No job_id -> something has went wrong!");
                continue;
            };
            if self.config.wait_for_analysis {
                await_completion(
                    &self.cvms,
                    &job,
                    JobKind::ConnectorAnalysis,
                    self.config.poll.schedule(),
                )
                .await?;
            }
            tracing::info!("CVMS collector {} triggering done!", connector.name);
            jobs.push(job);
        }
        Ok(jobs)
    }
}
