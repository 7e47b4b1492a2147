//! Shared HTTP client for the vendor API clients.
//!
//! One client serves the central platform, the Polaris locator and the
//! Black Duck lookup, so they share a connection pool and timeouts.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

const USER_AGENT: &str = concat!("cvms-trigger/", env!("CARGO_PKG_VERSION"));

/// Uploads of large reports can take a while
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn create_shared_client() -> anyhow::Result<Arc<Client>> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .tcp_keepalive(Duration::from_secs(60))
        .build()?;

    Ok(Arc::new(client))
}

/// Strip trailing slashes so endpoint paths can be appended with `/`.
pub fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_shared_client() {
        let client = create_shared_client().expect("Failed to create client");
        assert!(Arc::strong_count(&client) == 1);
    }

    #[test]
    fn test_client_can_be_cloned() {
        let client = create_shared_client().expect("Failed to create client");
        let client2 = Arc::clone(&client);
        assert!(Arc::strong_count(&client) == 2);
        drop(client2);
        assert!(Arc::strong_count(&client) == 1);
    }

    #[test]
    fn test_trim_base_url() {
        assert_eq!(trim_base_url("https://cvms.example.com/"), "https://cvms.example.com");
        assert_eq!(trim_base_url(" https://x.io// "), "https://x.io");
        assert_eq!(trim_base_url("https://x.io"), "https://x.io");
    }
}
