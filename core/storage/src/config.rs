//! Client configuration and factories.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use drivekit_common::{AccessToken, Error, Result};

use crate::graph::{GraphClient, GRAPH_API_BASE};
use crate::onedrive::{OneDriveClient, ONEDRIVE_API_BASE};
use crate::options::DriveApi;
use crate::provider::DriveClient;
use crate::transport::{HttpTransport, StaticTokenProvider, Transport};

fn default_user_agent() -> String {
    format!("drivekit/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

/// Settings for one drive session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Bearer token sent with every request.
    pub access_token: AccessToken,
    /// Overrides the API's public endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl DriveConfig {
    pub fn new(access_token: AccessToken) -> Self {
        Self {
            access_token,
            base_url: None,
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Parse from JSON.
    ///
    /// # Errors
    /// - `InvalidInput` when a field is missing or malformed
    pub fn from_value(config: serde_json::Value) -> Result<Self> {
        serde_json::from_value(config)
            .map_err(|e| Error::InvalidInput(format!("Invalid drive config: {}", e)))
    }

    /// Check the settings without touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(Error::InvalidInput("Access token must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::InvalidInput("Timeout must be at least one second".to_string()));
        }
        Ok(())
    }

    fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url.as_deref().unwrap_or(default)
    }

    fn http_transport(&self) -> Result<Arc<dyn Transport>> {
        self.validate()?;
        let tokens = Arc::new(StaticTokenProvider::new(self.access_token.clone()));
        let transport = HttpTransport::new(
            tokens,
            &self.user_agent,
            Duration::from_secs(self.timeout_secs),
        )?;
        Ok(Arc::new(transport))
    }

    /// Build a client for `api` over HTTP.
    ///
    /// # Postconditions
    /// - Every call of the client carries `access_token` and `user_agent`
    ///
    /// # Errors
    /// - `InvalidInput` when [`validate`](Self::validate) fails or `base_url`
    ///   is malformed
    /// - `Network` when the HTTP client cannot be created
    pub fn build(&self, api: DriveApi) -> Result<Arc<dyn DriveClient>> {
        let transport = self.http_transport()?;
        self.build_with_transport(api, transport)
    }

    /// Build a client for `api` over the given transport.
    pub fn build_with_transport(
        &self,
        api: DriveApi,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<dyn DriveClient>> {
        let client: Arc<dyn DriveClient> = match api {
            DriveApi::OneDrive => Arc::new(OneDriveClient::with_base_url(
                self.base_url_or(ONEDRIVE_API_BASE),
                transport,
            )?),
            DriveApi::Graph => Arc::new(GraphClient::with_base_url(
                self.base_url_or(GRAPH_API_BASE),
                transport,
            )?),
        };
        Ok(client)
    }
}

/// Create a OneDrive API client from JSON configuration.
pub fn create_onedrive_client(config: serde_json::Value) -> Result<Arc<dyn DriveClient>> {
    DriveConfig::from_value(config)?.build(DriveApi::OneDrive)
}

/// Create a Microsoft Graph client from JSON configuration.
pub fn create_graph_client(config: serde_json::Value) -> Result<Arc<dyn DriveClient>> {
    DriveConfig::from_value(config)?.build(DriveApi::Graph)
}
