use tracing::{debug, trace};

use crate::{
    config::BackendConfig,
    errors::{FetchError, InitializationError},
    model::{MonitorTarget, StatsRequest, StatsResponse},
};

/// Route on the backend that serves interface statistics
pub const STATS_ROUTE: &str = "/api/get-stats";

/// Issues single `POST /api/get-stats` requests against the backend
#[derive(Debug, Clone)]
pub struct StatsFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl StatsFetcher {
    pub fn new(config: &BackendConfig) -> Result<Self, InitializationError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("mikrotik-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                InitializationError::http_client(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self::with_client(&config.base_url, client))
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), STATS_ROUTE),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One request, one response. No retries; a body with a non-success
    /// status is still returned as `Ok` and left to the caller.
    pub async fn fetch(&self, target: &MonitorTarget) -> Result<StatsResponse, FetchError> {
        debug!(
            "Requesting stats for {} ({} interfaces)",
            target.address,
            target.interfaces.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&StatsRequest::from(target))
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: self.endpoint.clone(),
                status,
            });
        }

        let body: StatsResponse = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(&self.endpoint, e))?;

        trace!(
            "Stats response: status={}, records={}",
            body.status_label(),
            body.stats.as_ref().map(|s| s.len()).unwrap_or(0)
        );

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn target() -> MonitorTarget {
        MonitorTarget {
            address: "192.168.88.1".to_string(),
            username: "admin".to_string(),
            password: SecretString::from("pass".to_string()),
            interfaces: vec!["ether1".to_string(), "ether2".to_string()],
        }
    }

    #[tokio::test]
    async fn test_fetch_posts_target() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/get-stats"))
            .and(body_json(json!({
                "ip": "192.168.88.1",
                "username": "admin",
                "password": "pass",
                "interfaces": ["ether1", "ether2"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "stats": [{"iface": "ether1"}, {"iface": "ether2"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = StatsFetcher::with_client(&format!("{}/", server.uri()), reqwest::Client::new());
        let response = fetcher.fetch(&target()).await.unwrap();

        assert!(response.is_success());
        assert_eq!(response.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/get-stats"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = StatsFetcher::with_client(&server.uri(), reqwest::Client::new());
        let err = fetcher.fetch(&target()).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status, .. } if status.as_u16() == 500));
    }

    #[tokio::test]
    async fn test_fetch_invalid_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/get-stats"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let fetcher = StatsFetcher::with_client(&server.uri(), reqwest::Client::new());
        let err = fetcher.fetch(&target()).await.unwrap_err();

        assert!(matches!(err, FetchError::Decode { .. }));
    }
}
