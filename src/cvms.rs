//! # Central platform (CVMS) API client
//!
//! Typed wrappers around the REST endpoints the orchestrator needs. Every
//! endpoint hangs off `{url}/codedx` and is authenticated with the static
//! `API-Key` header.
//!
//! ## Endpoints
//!
//! - `POST /api/projects/query` - search projects by name or metadata
//! - `PUT /api/projects` - create a project (201)
//! - `GET /api/tool-connector-config/entries/{project}` - list connectors
//! - `POST /api/tool-connector-config/entries/{project}` - register a connector (201)
//! - `PUT /api/tool-connector-config/values/{connector}` - store connector settings
//! - `POST /api/tool-connector-config/entries/{project}/{connector}/analysis` - trigger
//! - `POST /api/projects/{project}/analysis` - multipart report upload (200 or 202)
//! - `GET /api/jobs/{job}` - job status
//!
//! The methods here report every failure as an [`ApiError`]; deciding what a
//! failure means for the run is left to the calling component.

use std::path::Path;
use std::sync::Arc;

use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::API_KEY_HEADER;
use crate::error::{ApiError, ApiResult};
use crate::http_client::trim_base_url;
use crate::jobs::JobStatusSource;
use crate::model::{ConnectorDescriptor, ConnectorId, JobHandle, JobStatus, ProjectId};

/// Context path every central platform endpoint lives under
const CONTEXT_PATH: &str = "/codedx";

/// A project as returned by the query endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

/// One metadata field attached to a project
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataEntry {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl MetadataEntry {
    /// Metadata value as text, if it is a string
    pub fn text(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// Search filter for `POST /api/projects/query`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectQuery<'a> {
    Name(&'a str),
    Tag { key: &'a str, value: &'a str },
}

impl ProjectQuery<'_> {
    fn body(&self) -> serde_json::Value {
        match self {
            ProjectQuery::Name(name) => json!({ "filter": { "name": name } }),
            ProjectQuery::Tag { key, value } => {
                let mut metadata = serde_json::Map::new();
                metadata.insert(key.to_string(), json!(value));
                json!({ "filter": { "metadata": metadata } })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedId<T> {
    id: T,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    #[serde(rename = "jobId")]
    job_id: JobHandle,
}

#[derive(Debug, Serialize)]
struct NewConnector<'a> {
    tool: &'a str,
    name: &'a str,
}

/// Client for the central platform REST API
pub struct CvmsClient {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
}

impl CvmsClient {
    /// Creates a client rooted at `url`, normalised to end in `/codedx`.
    pub fn new(client: Arc<Client>, url: &str, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: normalize_base_url(url),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http_client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(API_KEY_HEADER, &self.api_key)
            .header(ACCEPT, "*/*")
    }

    /// Sends `request`, returning the response only when its status is one
    /// of `expected`.
    async fn send(
        &self,
        endpoint: &str,
        request: RequestBuilder,
        expected: &[StatusCode],
    ) -> ApiResult<reqwest::Response> {
        let response = self.authorized(request).send().await?;
        if expected.contains(&response.status()) {
            Ok(response)
        } else {
            Err(ApiError::from_response(endpoint, response).await)
        }
    }

    pub async fn query_projects(&self, query: &ProjectQuery<'_>) -> ApiResult<Vec<ProjectRecord>> {
        let url = self.endpoint("/api/projects/query");
        let request = self.client.post(&url).json(&query.body());
        let response = self.send(&url, request, &[StatusCode::OK]).await?;
        Ok(response.json().await?)
    }

    pub async fn create_project(&self, name: &str) -> ApiResult<ProjectId> {
        let url = self.endpoint("/api/projects");
        let request = self.client.put(&url).json(&json!({ "name": name }));
        let response = self.send(&url, request, &[StatusCode::CREATED]).await?;
        let created: CreatedId<ProjectId> = response.json().await?;
        Ok(created.id)
    }

    pub async fn list_connectors(&self, project: &ProjectId) -> ApiResult<Vec<ConnectorDescriptor>> {
        let url = self.endpoint(&format!("/api/tool-connector-config/entries/{project}"));
        let response = self
            .send(&url, self.client.get(&url), &[StatusCode::OK])
            .await?;
        Ok(response.json().await?)
    }

    /// Registers a bare connector entry of type `tool` on `project`.
    pub async fn create_connector(
        &self,
        project: &ProjectId,
        tool: &str,
        name: &str,
    ) -> ApiResult<ConnectorId> {
        let url = self.endpoint(&format!("/api/tool-connector-config/entries/{project}"));
        let request = self.client.post(&url).json(&NewConnector { tool, name });
        let response = self.send(&url, request, &[StatusCode::CREATED]).await?;
        let created: CreatedId<ConnectorId> = response.json().await?;
        Ok(created.id)
    }

    /// Stores the tool-specific settings of a connector.
    pub async fn put_connector_values<T: Serialize + ?Sized>(
        &self,
        connector: &ConnectorId,
        values: &T,
    ) -> ApiResult<()> {
        let url = self.endpoint(&format!("/api/tool-connector-config/values/{connector}"));
        let request = self.client.put(&url).json(values);
        self.send(&url, request, &[StatusCode::OK]).await?;
        Ok(())
    }

    pub async fn trigger_analysis(
        &self,
        project: &ProjectId,
        connector: &ConnectorId,
    ) -> ApiResult<JobHandle> {
        let url = self.endpoint(&format!(
            "/api/tool-connector-config/entries/{project}/{connector}/analysis"
        ));
        let response = self
            .send(&url, self.client.post(&url), &[StatusCode::OK])
            .await?;
        let job: JobResponse = response.json().await?;
        Ok(job.job_id)
    }

    /// Uploads a report file for ingestion into `project`.
    pub async fn upload_analysis(&self, project: &ProjectId, file: &Path) -> ApiResult<JobHandle> {
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("report")
            .to_string();
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));

        let url = self.endpoint(&format!("/api/projects/{project}/analysis"));
        let request = self.client.post(&url).multipart(form);
        let response = self
            .send(&url, request, &[StatusCode::OK, StatusCode::ACCEPTED])
            .await?;
        let job: JobResponse = response.json().await?;
        Ok(job.job_id)
    }

    pub async fn job_status(&self, job: &JobHandle) -> ApiResult<JobStatus> {
        let url = self.endpoint(&format!("/api/jobs/{job}"));
        let response = self
            .send(&url, self.client.get(&url), &[StatusCode::OK])
            .await?;
        Ok(response.json().await?)
    }
}

impl JobStatusSource for CvmsClient {
    async fn job_status(&self, job: &JobHandle) -> ApiResult<JobStatus> {
        CvmsClient::job_status(self, job).await
    }
}

/// Normalise a user supplied platform URL to `{url}/codedx`.
pub fn normalize_base_url(url: &str) -> String {
    let url = trim_base_url(url);
    if url.ends_with(CONTEXT_PATH) {
        url
    } else {
        format!("{url}{CONTEXT_PATH}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://cvms.example.com"),
            "https://cvms.example.com/codedx"
        );
        assert_eq!(
            normalize_base_url("https://cvms.example.com/"),
            "https://cvms.example.com/codedx"
        );
        assert_eq!(
            normalize_base_url("https://cvms.example.com/codedx/"),
            "https://cvms.example.com/codedx"
        );
    }

    #[test]
    fn test_name_query_body() {
        assert_eq!(
            ProjectQuery::Name("app-1").body(),
            json!({ "filter": { "name": "app-1" } })
        );
    }

    #[test]
    fn test_tag_query_body() {
        let query = ProjectQuery::Tag {
            key: "integration_name",
            value: "app-1",
        };
        assert_eq!(
            query.body(),
            json!({ "filter": { "metadata": { "integration_name": "app-1" } } })
        );
    }

    #[test]
    fn test_project_record_without_metadata() {
        let record: ProjectRecord =
            serde_json::from_value(json!({ "id": 3, "name": "app-1" })).unwrap();
        assert_eq!(record.id.as_str(), "3");
        assert!(record.metadata.is_empty());
    }

    #[test]
    fn test_metadata_text_ignores_non_strings() {
        let entry: MetadataEntry =
            serde_json::from_value(json!({ "name": "integration_name", "value": 5 })).unwrap();
        assert_eq!(entry.text(), None);

        let entry: MetadataEntry =
            serde_json::from_value(json!({ "name": "integration_name", "value": " app-1 " }))
                .unwrap();
        assert_eq!(entry.text(), Some(" app-1 "));
    }
}
