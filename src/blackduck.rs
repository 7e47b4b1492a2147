//! Client for the Black Duck Hub REST API.
//!
//! Only one lookup is needed: the hub's internal id for a project name, which
//! a Black Duck Hub connector must be configured with.

use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::{ApiError, ApiResult};
use crate::http_client::trim_base_url;

const AUTH_MEDIA_TYPE: &str = "application/vnd.blackducksoftware.user-4+json";
const PROJECT_MEDIA_TYPE: &str = "application/vnd.blackducksoftware.project-detail-4+json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    bearer_token: String,
}

#[derive(Debug, Deserialize)]
struct ProjectPage {
    #[serde(default)]
    items: Vec<HubProject>,
}

#[derive(Debug, Deserialize)]
struct HubProject {
    name: String,
    #[serde(rename = "_meta")]
    meta: HubMeta,
}

#[derive(Debug, Deserialize)]
struct HubMeta {
    href: String,
}

/// Client for a Black Duck Hub server
pub struct BlackDuckClient {
    client: Arc<Client>,
    base_url: String,
    api_token: String,
}

impl BlackDuckClient {
    pub fn new(client: Arc<Client>, base_url: &str, api_token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base_url(base_url),
            api_token: api_token.into(),
        }
    }

    async fn bearer_token(&self) -> ApiResult<String> {
        let endpoint = format!("{}/api/tokens/authenticate", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .header(AUTHORIZATION, format!("token {}", self.api_token))
            .header(ACCEPT, AUTH_MEDIA_TYPE)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(ApiError::from_response(&endpoint, response).await);
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.bearer_token)
    }

    /// Returns the hub's id for the project named exactly `name`.
    pub async fn project_id(&self, name: &str) -> ApiResult<String> {
        let bearer = self.bearer_token().await?;

        let mut url = Url::parse(&format!("{}/api/projects", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("q", &format!("name:{name}"))
            .append_pair("limit", "100");

        let response = self
            .client
            .get(url.as_str())
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .header(ACCEPT, PROJECT_MEDIA_TYPE)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(ApiError::from_response("/api/projects", response).await);
        }

        let page: ProjectPage = response.json().await?;
        page.items
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| id_from_href(&p.meta.href))
            .ok_or_else(|| ApiError::NotFound(format!("Black Duck project {name}")))
    }
}

/// The hub addresses resources by URL; the id is the last path segment.
fn id_from_href(href: &str) -> Option<String> {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .map(str::to_string)
}
