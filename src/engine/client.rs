//! HTTP client for the engine's management API and ingestion endpoint
//!
//! Every call is fail-fast: transport failures and non-success statuses are
//! turned into [`Error`] values and nothing is retried here. Retrying is the
//! readiness poller's job alone.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;

use crate::common::{Error, Result};

/// Thin typed wrapper around `reqwest`
#[derive(Debug, Clone)]
pub struct EngineClient {
    http: Client,
    request_timeout: Duration,
}

impl EngineClient {
    /// Create a client whose PUT/POST and [`fetch`](Self::fetch) calls use `request_timeout`
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            request_timeout,
        })
    }

    /// GET `url` and parse the body as JSON
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<Value> {
        tracing::debug!(url, ?timeout, "GET");
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| send_error(url, e))?;
        let response = check_status("GET", url, response).await?;

        let body = response.bytes().await.map_err(|e| send_error(url, e))?;
        serde_json::from_slice(&body).map_err(|e| Error::malformed(url, e.to_string()))
    }

    /// GET with the client's default request timeout
    pub async fn fetch(&self, url: &str) -> Result<Value> {
        self.get(url, self.request_timeout).await
    }

    /// GET `url` and discard the body; only the status matters
    pub async fn probe(&self, url: &str, timeout: Duration) -> Result<()> {
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| send_error(url, e))?;
        check_status("GET", url, response).await?;
        Ok(())
    }

    /// PUT a JSON body, returning the response text
    pub async fn put<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<String> {
        tracing::debug!(url, "PUT");
        let response = self
            .http
            .put(url)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| send_error(url, e))?;
        let response = check_status("PUT", url, response).await?;
        response.text().await.map_err(|e| send_error(url, e))
    }

    /// POST a JSON body, returning the response text
    pub async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<String> {
        tracing::debug!(url, "POST");
        let response = self
            .http
            .post(url)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| send_error(url, e))?;
        let response = check_status("POST", url, response).await?;
        response.text().await.map_err(|e| send_error(url, e))
    }
}

/// Only connection failures mean the engine is not reachable (yet)
///
/// reqwest flags a connect timeout as `is_connect` too, so `is_timeout` alone
/// means the connection was made and the response was slow.
fn send_error(url: &str, e: reqwest::Error) -> Error {
    if e.is_connect() {
        Error::RemoteUnavailable {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else if e.is_timeout() {
        Error::Timeout {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else {
        Error::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

async fn check_status(method: &str, url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::remote_error(method, url, status.as_u16(), body.trim()))
}
