//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cvms_trigger::config::{Config, ConnectorSettings, PollConfig};
use cvms_trigger::connectors::ToolFilter;
use cvms_trigger::cvms::CvmsClient;
use cvms_trigger::http_client::create_shared_client;
use cvms_trigger::model::ProjectRef;

pub const API_KEY: &str = "test-api-key";

pub fn http_client() -> Arc<reqwest::Client> {
    create_shared_client().expect("client should build")
}

pub fn cvms_client(server: &MockServer) -> CvmsClient {
    CvmsClient::new(http_client(), &server.uri(), API_KEY)
}

pub fn test_config(server: &MockServer, collector_types: &str) -> Config {
    Config {
        url: server.uri(),
        api_key: API_KEY.to_string(),
        project: ProjectRef::new("app-1"),
        collector_types: ToolFilter::parse(collector_types),
        collector_name: None,
        wait_for_analysis: false,
        file: None,
        create_project_if_missing: false,
        create_connectors_if_missing: false,
        connector: ConnectorSettings::default(),
        poll: PollConfig {
            interval_secs: 1,
            timeout_secs: 5,
        },
    }
}

/// Answers the by-name project query for `app-1` with project `id`.
pub async fn mount_project(server: &MockServer, id: u64) {
    Mock::given(method("POST"))
        .and(path("/codedx/api/projects/query"))
        .and(body_partial_json(json!({ "filter": { "name": "app-1" } })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "id": id, "name": "app-1", "metadata": [] }])),
        )
        .mount(server)
        .await;
}
