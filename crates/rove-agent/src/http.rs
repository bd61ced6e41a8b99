//! Resilient outbound HTTP
//!
//! Each attempt runs under its own timeout. A request still in flight when the
//! timeout fires is dropped and reported as [`RoveError::Timeout`]. Server
//! errors and connection failures are retried; client errors come back as
//! ordinary responses for the caller to inspect.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Method;
use rove_core::retry::{with_retry, Backoff, RetryPolicy};
use rove_core::{Result, RoveError};
use tracing::{instrument, warn};

use crate::client::classify_reqwest_error;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// A fully read response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL after redirects
    pub url: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Server errors and connection failures (including timeouts) are retried
pub fn is_retryable_http_error(err: &RoveError) -> bool {
    err.is_server_error() || err.is_connection_failure()
}

/// GET/HEAD with per-attempt timeouts and retries
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    backoff: Backoff,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, backoff: Backoff) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RoveError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, timeout, backoff))
    }

    pub fn with_client(client: reqwest::Client, timeout: Duration, backoff: Backoff) -> Self {
        Self {
            client,
            timeout,
            backoff,
        }
    }

    /// Same client with a different per-attempt timeout
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    /// Same client with a different retry schedule
    pub fn with_backoff(&self, backoff: Backoff) -> Self {
        Self {
            backoff,
            ..self.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.execute(Method::GET, url, &[], &[]).await
    }

    /// GET with query pairs and extra headers
    pub async fn get_with(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        self.execute(Method::GET, url, query, headers).await
    }

    pub async fn head(&self, url: &str) -> Result<HttpResponse> {
        self.execute(Method::HEAD, url, &[], &[]).await
    }

    #[instrument(skip(self, query, headers), fields(timeout_ms = self.timeout.as_millis() as u64))]
    async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        let policy = RetryPolicy::new(self.backoff, is_retryable_http_error).on_retry(|err, attempt| {
            warn!("HTTP attempt {} failed: {}", attempt, err);
        });

        with_retry(&policy, || self.attempt(method.clone(), url, query, headers)).await
    }

    async fn attempt(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        let mut builder = self.client.request(method.clone(), url).query(query);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let exchange = async {
            let response = builder.send().await.map_err(classify_reqwest_error)?;
            let status = response.status().as_u16();
            let final_url = response.url().to_string();
            let headers = response.headers().clone();
            let body = response.text().await.map_err(classify_reqwest_error)?;
            Ok::<_, RoveError>(HttpResponse {
                status,
                url: final_url,
                headers,
                body,
            })
        };

        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                RoveError::Timeout(format!(
                    "{} {} exceeded {}ms",
                    method,
                    url,
                    self.timeout.as_millis()
                ))
            })??;

        if response.status >= 500 {
            return Err(RoveError::Api {
                status: response.status,
                message: format!("{} {} returned {}", method, url, response.status),
            });
        }

        tracing::debug!("{} {} -> {}", method, url, response.status);
        Ok(response)
    }
}
