//! HTTP client for the fake trace backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};
use url::Url;

use super::Backend;
use crate::collector::deadline_after;
use crate::config::BackendConfig;
use crate::error::{Error, Result};

/// Client for a backend exposing `/get-requests`, `/clear-requests` and
/// `/health`
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    get_requests: Url,
    clear_requests: Url,
    health: Url,
}

impl HttpBackend {
    /// Create a client from configuration
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base = Url::parse(&config.url)
            .map_err(|e| Error::config(format!("invalid backend url {:?}: {e}", config.url)))?;

        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            get_requests: endpoint(&base, &config.get_requests_path)?,
            clear_requests: endpoint(&base, &config.clear_requests_path)?,
            health: endpoint(&base, &config.health_path)?,
        })
    }

    /// Create a client for `url` with default paths and timeout
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        Self::new(&BackendConfig {
            url: url.into(),
            ..BackendConfig::default()
        })
    }

    /// Check the readiness endpoint once. Transport errors count as not ready.
    pub async fn is_healthy(&self) -> bool {
        match self.client.get(self.health.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %self.health, error = %e, "Health check failed");
                false
            }
        }
    }

    /// Poll the readiness endpoint until it answers with success
    pub async fn wait_until_healthy(&self, timeout: Duration, interval: Duration) -> Result<()> {
        let deadline = deadline_after(Instant::now(), timeout);

        loop {
            if self.is_healthy().await {
                info!(url = %self.health, "Backend is healthy");
                return Ok(());
            }
            if deadline_after(Instant::now(), interval) > deadline {
                return Err(Error::Timeout(timeout));
            }
            sleep(interval).await;
        }
    }
}

fn endpoint(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::config(format!("invalid backend path {path:?}: {e}")))
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch(&self) -> Result<String> {
        let response = self
            .client
            .get(self.get_requests.clone())
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }

    async fn reset(&self) -> Result<()> {
        let response = self.client.get(self.clear_requests.clone()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::reset(format!(
                "{} returned {}: {}",
                self.clear_requests, status, body
            )));
        }

        info!(url = %self.clear_requests, "Backend requests cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get-requests"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"resourceSpans":[]}]"#))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpBackend::from_url(server.uri()).unwrap();

        assert_eq!(backend.fetch().await.unwrap(), r#"[{"resourceSpans":[]}]"#);
    }

    #[tokio::test]
    async fn test_fetch_error_status_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get-requests"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let backend = HttpBackend::from_url(server.uri()).unwrap();

        assert!(matches!(backend.fetch().await, Err(Error::Http(_))));
    }

    #[tokio::test]
    async fn test_reset_acknowledged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clear-requests"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpBackend::from_url(server.uri()).unwrap();

        backend.reset().await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_not_acknowledged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clear-requests"))
            .respond_with(ResponseTemplate::new(500).set_body_string("store locked"))
            .mount(&server)
            .await;

        let backend = HttpBackend::from_url(server.uri()).unwrap();
        let err = backend.reset().await.unwrap_err();

        assert!(err.is_reset_failure());
        assert!(err.to_string().contains("store locked"));
    }

    #[tokio::test]
    async fn test_custom_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/dump"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&BackendConfig {
            url: server.uri(),
            get_requests_path: "/api/dump".to_string(),
            ..BackendConfig::default()
        })
        .unwrap();

        assert_eq!(backend.fetch().await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_wait_until_healthy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let backend = HttpBackend::from_url(server.uri()).unwrap();

        backend
            .wait_until_healthy(Duration::from_secs(5), Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_until_healthy_without_a_bound() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpBackend::from_url(server.uri()).unwrap();

        backend
            .wait_until_healthy(Duration::MAX, Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_until_healthy_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let backend = HttpBackend::from_url(server.uri()).unwrap();
        let err = backend
            .wait_until_healthy(Duration::from_millis(50), Duration::from_millis(10))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout(_)));
    }

    #[test]
    fn test_invalid_url_is_a_config_error() {
        assert!(matches!(
            HttpBackend::from_url("not a url"),
            Err(Error::Config(_))
        ));
    }
}
