use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::http::{HttpRequest, HttpTransport, ReqwestTransport};

use super::errors::{Result, SourceError};
use super::rate_limit::{DEFAULT_RPS, RateLimiter};

/// Timeout applied when a source is configured with zero.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest prefix of an error body kept in [`SourceError::Status`].
const STATUS_BODY_LIMIT: usize = 512;

/// Connection settings for one external source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Scheme and host, optionally with a path prefix. No trailing slash.
    pub base_url: String,
    /// Request budget; 0 means [`DEFAULT_RPS`].
    pub requests_per_second: u32,
    /// Per-request timeout; zero means [`DEFAULT_TIMEOUT`].
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            requests_per_second: DEFAULT_RPS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SourceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Normalize defaults and check that `base_url` is an absolute URL.
    pub fn validated(mut self) -> Result<Self> {
        if self.requests_per_second == 0 {
            self.requests_per_second = DEFAULT_RPS;
        }
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }

        let trimmed = self.base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(SourceError::config("base_url must not be empty"));
        }
        Url::parse(trimmed)?;
        self.base_url = trimmed.to_string();

        Ok(self)
    }
}

/// Rate-limited JSON client for one external source.
///
/// Every request waits on the client's own token bucket, is bounded by the
/// configured timeout, and has its whole body decoded before returning.
#[derive(Clone)]
pub struct SourceClient {
    transport: Arc<dyn HttpTransport>,
    config: SourceConfig,
    limiter: RateLimiter,
}

impl SourceClient {
    /// Build a client over a reqwest transport.
    pub fn new(config: SourceConfig) -> Result<Self> {
        let config = config.validated()?;
        let transport = ReqwestTransport::with_timeout(config.timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a client over any transport.
    pub fn with_transport(config: SourceConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let config = config.validated()?;
        let limiter = RateLimiter::new(config.requests_per_second);
        Ok(Self {
            transport,
            config,
            limiter,
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Absolute URL for `path` with `query` appended in order.
    pub fn url(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}{}", self.config.base_url, path))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url.into())
    }

    /// `GET {base_url}{path}?{query}` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path, query)?;
        self.send(HttpRequest::get(url)).await
    }

    /// `POST {base_url}{path}` with a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path, &[])?;
        let body = serde_json::to_vec(body)
            .map_err(|e| SourceError::decode(format!("cannot encode request body: {e}")))?;
        self.send(HttpRequest::post_json(url, body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        self.limiter.wait().await;

        let method = request.method.as_str();
        let url = request.url.clone();
        tracing::debug!(method, url = %url, "Source request");

        let timeout = self.config.timeout;
        let response = tokio::time::timeout(timeout, self.transport.send(request))
            .await
            .map_err(|_| SourceError::Timeout { after: timeout })??;

        if !response.is_success() {
            let body: String = String::from_utf8_lossy(&response.body)
                .chars()
                .take(STATUS_BODY_LIMIT)
                .collect();
            tracing::debug!(method, url = %url, status = response.status, "Source returned error status");
            return Err(SourceError::Status {
                status: response.status,
                body,
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| SourceError::decode(e.to_string()))
    }
}

impl std::fmt::Debug for SourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceClient")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpError, HttpMethod, HttpResponse, MockTransport};

    fn client(transport: &MockTransport) -> SourceClient {
        let config = SourceConfig {
            base_url: "https://feed.example.com/".to_string(),
            requests_per_second: 1_000,
            timeout: Duration::from_secs(5),
        };
        SourceClient::with_transport(config, Arc::new(transport.clone())).expect("valid config")
    }

    #[test]
    fn validated_fills_defaults_and_trims_base_url() {
        let config = SourceConfig {
            base_url: " https://feed.example.com/ ".to_string(),
            requests_per_second: 0,
            timeout: Duration::ZERO,
        }
        .validated()
        .expect("valid");

        assert_eq!(config.base_url, "https://feed.example.com");
        assert_eq!(config.requests_per_second, DEFAULT_RPS);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn validated_rejects_missing_or_relative_base_url() {
        assert!(matches!(
            SourceConfig::new("").validated(),
            Err(SourceError::Config { .. })
        ));
        assert!(matches!(
            SourceConfig::new("not a url").validated(),
            Err(SourceError::InvalidUrl(_))
        ));
    }

    #[test]
    fn url_keeps_query_order() {
        let transport = MockTransport::new();
        let url = client(&transport)
            .url("/api/v3/klines", &[("symbol", "TIAUSDT".into()), ("limit", "5".into())])
            .expect("url");
        assert_eq!(url, "https://feed.example.com/api/v3/klines?symbol=TIAUSDT&limit=5");
    }

    #[tokio::test]
    async fn get_json_decodes_body() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, "https://feed.example.com/ping", r#"{"ok":true}"#);

        let body: serde_json::Value = client(&transport).get_json("/ping", &[]).await.expect("ok");
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn non_success_status_is_transient_error() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            "https://feed.example.com/ping",
            HttpResponse {
                status: 429,
                headers: Vec::new(),
                body: b"slow down".to_vec(),
            },
        );

        let err = client(&transport)
            .get_json::<serde_json::Value>("/ping", &[])
            .await
            .expect_err("429 should fail");
        assert!(matches!(err, SourceError::Status { status: 429, ref body } if body == "slow down"));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn undecodable_body_is_fatal() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, "https://feed.example.com/ping", "<html>");

        let err = client(&transport)
            .get_json::<serde_json::Value>("/ping", &[])
            .await
            .expect_err("html is not json");
        assert!(matches!(err, SourceError::Decode { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn post_json_sends_serialized_body() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Post, "https://feed.example.com/v1/echo", "[]");

        let _: Vec<u8> = client(&transport)
            .post_json("/v1/echo", &serde_json::json!({"limit": 3}))
            .await
            .expect("ok");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body, br#"{"limit":3}"#.to_vec());
    }

    struct StalledTransport;

    #[async_trait::async_trait]
    impl HttpTransport for StalledTransport {
        async fn send(&self, _request: HttpRequest) -> std::result::Result<HttpResponse, HttpError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_request_times_out() {
        let config = SourceConfig {
            base_url: "https://feed.example.com".to_string(),
            requests_per_second: 1_000,
            timeout: Duration::from_secs(2),
        };
        let client = SourceClient::with_transport(config, Arc::new(StalledTransport)).expect("client");

        let err = client
            .get_json::<serde_json::Value>("/ping", &[])
            .await
            .expect_err("should time out");
        assert!(matches!(err, SourceError::Timeout { after } if after == Duration::from_secs(2)));
        assert!(err.is_transient());
    }
}
