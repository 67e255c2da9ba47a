//! HTTP transport seam.
//!
//! Backends describe calls as [`ApiRequest`]s; a [`Transport`] executes
//! them. Authentication is consumed through [`AccessTokenProvider`] and is
//! not implemented here beyond a static bearer token.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use drivekit_common::{AccessToken, Error, Result};

/// One call against a drive API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            body: None,
        }
    }

    pub fn post(url: Url, body: Value) -> Self {
        Self {
            method: Method::POST,
            url,
            body: Some(body),
        }
    }

    pub fn patch(url: Url, body: Value) -> Self {
        Self {
            method: Method::PATCH,
            url,
            body: Some(body),
        }
    }

    pub fn delete(url: Url) -> Self {
        Self {
            method: Method::DELETE,
            url,
            body: None,
        }
    }
}

/// Executes API requests and returns the decoded JSON body.
///
/// Implementations may honor the cancellation token for calls already in
/// flight; an aborted call fails with [`Error::Cancelled`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request.
    ///
    /// # Returns
    /// The JSON response body, or `Value::Null` for empty responses.
    ///
    /// # Errors
    /// - Network failures and non-success statuses
    /// - Cancellation of the in-flight call
    async fn send(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<Value>;
}

/// Source of bearer tokens for API calls.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken>;
}

/// Token provider that always hands out the same token.
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    pub fn new(token: AccessToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<AccessToken> {
        if self.token.is_empty() {
            return Err(Error::Authentication("No access token configured".to_string()));
        }
        Ok(self.token.clone())
    }
}

/// reqwest-backed transport with bearer authentication.
pub struct HttpTransport {
    http: Client,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    ///
    /// # Errors
    /// - The HTTP client could not be built (TLS backend initialization)
    pub fn new(
        tokens: Arc<dyn AccessTokenProvider>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, tokens })
    }

    /// Handle API response with error checking.
    async fn handle_response(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();

        if status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| Error::Network(format!("Failed to read response: {}", e)))?;
            if status == StatusCode::NO_CONTENT || body.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_slice(&body)
                .map_err(|e| Error::Serialization(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound("Resource not found".to_string()))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(Error::Authentication(
                "Invalid or expired token".to_string(),
            ))
        } else if status == StatusCode::FORBIDDEN {
            Err(Error::PermissionDenied("Access denied".to_string()))
        } else if status == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            Err(Error::AlreadyExists(format!("Name conflict: {}", body)))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Network(format!("API error: {} - {}", status, body)))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<Value> {
        let token = self.tokens.access_token().await?;
        debug!(method = %request.method, url = %request.url, "Sending drive request");

        let mut builder = self
            .http
            .request(request.method, request.url)
            .bearer_auth(token.secret());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = builder.send() => result
                .map_err(|e| Error::Network(format!("Request failed: {}", e)))?,
        };

        self.handle_response(response).await
    }
}
