//! HTTP client for the function-management REST API
//!
//! Speaks the Lambda-style REST paths:
//! - `GET {endpoint}/2015-03-31/functions/{name}` for the live configuration
//! - `DELETE {endpoint}/2017-10-31/functions/{name}/concurrency` to drop the
//!   reserved-concurrency setting
//!
//! The client does not sign requests. Point it at an emulator or at a signing
//! proxy that holds the ambient credentials.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ApiResult, FunctionApi, RemoteFunctionConfiguration};
use crate::error::FunctionApiError;

const DEFAULT_ENDPOINT: &str = "http://localhost:4566";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Function API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionApiConfig {
    /// Base URL of the function-management API
    pub endpoint: String,
    /// Bearer token (optional, e.g. for a signing proxy)
    pub token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FunctionApiConfig {
    fn default() -> Self {
        FunctionApiConfig {
            endpoint: std::env::var("DEVSTRIP_API_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            token: std::env::var("DEVSTRIP_API_TOKEN").ok(),
            timeout_secs: std::env::var("DEVSTRIP_API_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl FunctionApiConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint
    pub fn new(endpoint: &str) -> Self {
        FunctionApiConfig {
            endpoint: endpoint.to_string(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn function_url(&self, function_name: &str) -> String {
        format!(
            "{}/2015-03-31/functions/{}",
            self.endpoint.trim_end_matches('/'),
            function_name
        )
    }

    fn concurrency_url(&self, function_name: &str) -> String {
        format!(
            "{}/2017-10-31/functions/{}/concurrency",
            self.endpoint.trim_end_matches('/'),
            function_name
        )
    }
}

/// Shape of the `GetFunction` response; everything else is ignored.
#[derive(Debug, Deserialize)]
struct GetFunctionResponse {
    #[serde(rename = "Configuration")]
    configuration: Option<FunctionConfigurationBody>,
    #[serde(rename = "Concurrency")]
    concurrency: Option<ConcurrencyBody>,
}

#[derive(Debug, Deserialize)]
struct FunctionConfigurationBody {
    #[serde(rename = "FunctionName")]
    function_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConcurrencyBody {
    #[serde(rename = "ReservedConcurrentExecutions")]
    reserved_concurrent_executions: Option<u32>,
}

/// Decode a `GetFunction` body into a [`RemoteFunctionConfiguration`].
fn decode_function(function_name: &str, body: &str) -> ApiResult<RemoteFunctionConfiguration> {
    let parsed: GetFunctionResponse = serde_json::from_str(body)?;
    let name = parsed
        .configuration
        .and_then(|c| c.function_name)
        .unwrap_or_else(|| function_name.to_string());

    Ok(RemoteFunctionConfiguration {
        function_name: name,
        reserved_concurrency: parsed
            .concurrency
            .and_then(|c| c.reserved_concurrent_executions),
    })
}

/// HTTP-backed [`FunctionApi`]
pub struct HttpFunctionApi {
    config: FunctionApiConfig,
    http_client: reqwest::Client,
}

impl HttpFunctionApi {
    /// Create a new client
    pub fn new(config: FunctionApiConfig) -> ApiResult<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(FunctionApiError::Configuration(
                "endpoint must not be empty".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("devstrip-function-api/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| FunctionApiError::Configuration(e.to_string()))?;

        Ok(HttpFunctionApi {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> ApiResult<Self> {
        Self::new(FunctionApiConfig::from_env())
    }

    /// Get the configuration
    pub fn config(&self) -> &FunctionApiConfig {
        &self.config
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_status(
        function_name: &str,
        response: reqwest::Response,
    ) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(FunctionApiError::NotFound {
                function_name: function_name.to_string(),
            });
        }
        let body = response.text().await.unwrap_or_default();
        Err(FunctionApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl FunctionApi for HttpFunctionApi {
    async fn get_function_configuration(
        &self,
        function_name: &str,
    ) -> ApiResult<RemoteFunctionConfiguration> {
        let url = self.config.function_url(function_name);
        debug!(url = %url, "Fetching function configuration");

        let response = self.authorize(self.http_client.get(&url)).send().await?;
        let response = Self::check_status(function_name, response).await?;
        let body = response.text().await?;

        decode_function(function_name, &body)
    }

    async fn delete_function_concurrency(&self, function_name: &str) -> ApiResult<()> {
        let url = self.config.concurrency_url(function_name);
        debug!(url = %url, "Deleting function concurrency");

        let response = self.authorize(self.http_client.delete(&url)).send().await?;
        Self::check_status(function_name, response).await?;
        Ok(())
    }
}
