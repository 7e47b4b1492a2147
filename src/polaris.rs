//! # Polaris project locator
//!
//! Resolves a project name (and optionally a branch name) to the internal
//! ids Polaris uses, so a Polaris connector can be pointed at them.
//!
//! ## Authentication
//!
//! 1. `POST /api/auth/v1/authenticate` with a form body holding either
//!    `accesstoken` or `email` + `password`; the answer carries a `jwt`.
//! 2. Every later call sends `Authorization: Bearer <jwt>`.
//!
//! The JWT is fetched on first use and kept for the lifetime of the
//! [`PolarisLocator`]; nothing is persisted across runs.
//!
//! ## Lookup
//!
//! - `GET /api/common/v0/projects?page[limit]=10&filter[project][name][eq]=NAME`
//! - `GET /api/common/v0/branches?page[limit]=10&filter[branch][project][id][eq]=ID&filter[branch][name][eq]=NAME`
//!
//! The first match wins. A missing project is an error; a missing branch is
//! reported as `None` so the caller can fall back to the default branch.

use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::OnceCell;
use url::Url;

use crate::auth::PolarisAuth;
use crate::error::{ApiError, ApiResult};
use crate::http_client::trim_base_url;

const JSON_API: &str = "application/vnd.api+json";
const PAGE_LIMIT: &str = "10";

/// Polaris ids of a project and, when found, one of its branches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProject {
    pub project_id: String,
    pub branch_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    jwt: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Page {
    meta: PageMeta,
    #[serde(default)]
    data: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct Resource {
    id: String,
}

impl Page {
    fn first_id(self) -> Option<String> {
        if self.meta.total == 0 {
            return None;
        }
        self.data.into_iter().next().map(|r| r.id)
    }
}

/// Looks up project and branch ids in Polaris
pub struct PolarisLocator {
    client: Arc<Client>,
    base_url: String,
    auth: PolarisAuth,
    jwt: OnceCell<String>,
}

impl PolarisLocator {
    pub fn new(client: Arc<Client>, base_url: &str, auth: PolarisAuth) -> Self {
        Self {
            client,
            base_url: trim_base_url(base_url),
            auth,
            jwt: OnceCell::new(),
        }
    }

    /// Whether the session token has already been obtained
    pub fn is_authenticated(&self) -> bool {
        self.jwt.initialized()
    }

    async fn authenticate(&self) -> ApiResult<String> {
        let endpoint = format!("{}/api/auth/v1/authenticate", self.base_url);
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.auth.form_fields())
            .finish();

        tracing::debug!("Authenticating against Polaris at {}", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let err = ApiError::from_response(&endpoint, response).await;
            if let ApiError::Status { body, .. } = &err
                && let Ok(details) = serde_json::from_str::<ErrorResponse>(body)
                && let Some(first) = details.errors.first()
            {
                tracing::error!("Polaris authentication failed: {}", first);
            }
            return Err(err);
        }

        let auth: AuthResponse = response.json().await?;
        Ok(auth.jwt)
    }

    async fn session_token(&self) -> ApiResult<&str> {
        let jwt = self.jwt.get_or_try_init(|| self.authenticate()).await?;
        Ok(jwt.as_str())
    }

    async fn get_page(&self, path: &str, params: &[(&str, &str)]) -> ApiResult<Page> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        url.query_pairs_mut().extend_pairs(params);

        let jwt = self.session_token().await?;
        let response = self
            .client
            .get(url.as_str())
            .header(AUTHORIZATION, format!("Bearer {jwt}"))
            .header(CONTENT_TYPE, JSON_API)
            .header(ACCEPT, JSON_API)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(ApiError::from_response(path, response).await);
        }
        Ok(response.json().await?)
    }

    /// Resolves `project_name` and, when given, `branch_name` to Polaris ids.
    pub async fn locate(
        &self,
        project_name: &str,
        branch_name: Option<&str>,
    ) -> ApiResult<ExternalProject> {
        let page = self
            .get_page(
                "/api/common/v0/projects",
                &[
                    ("page[limit]", PAGE_LIMIT),
                    ("filter[project][name][eq]", project_name),
                ],
            )
            .await?;
        let project_id = page
            .first_id()
            .ok_or_else(|| ApiError::NotFound(format!("Polaris project {project_name}")))?;

        let branch_id = match branch_name {
            Some(branch) => {
                let page = self
                    .get_page(
                        "/api/common/v0/branches",
                        &[
                            ("page[limit]", PAGE_LIMIT),
                            ("filter[branch][project][id][eq]", project_id.as_str()),
                            ("filter[branch][name][eq]", branch),
                        ],
                    )
                    .await?;
                let id = page.first_id();
                if id.is_none() {
                    tracing::error!("Polaris branch {} not found in {}", branch, project_name);
                }
                id
            }
            None => None,
        };

        Ok(ExternalProject {
            project_id,
            branch_id,
        })
    }
}
