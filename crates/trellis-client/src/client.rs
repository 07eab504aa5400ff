//! Core API client.

use crate::error::{ClientError, ClientResult};
use crate::token::TokenCache;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trellis_core::config::CoreApiConfig;

/// Client for the external Core compute service.
///
/// All protected calls go through [`CoreClient::send_authorized`], which
/// attaches the cached bearer token and performs exactly one forced
/// refresh-and-retry when Core answers 401.
pub struct CoreClient {
    http: reqwest::Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
    scope: String,
    tokens: TokenCache,
}

impl CoreClient {
    /// Build a client from configuration.
    pub fn from_config(config: &CoreApiConfig) -> ClientResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::Url(format!("{}: {e}", config.base_url)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
            tokens: TokenCache::new(Duration::from_secs(config.token_skew_secs)),
        })
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Url(format!("{path}: {e}")))
    }

    /// Exchange client credentials for a fresh access token.
    ///
    /// A non-success response is a hard error; the caller decides whether
    /// to retry.
    async fn connect(&self) -> ClientResult<ConnectResponse> {
        let url = self.url("/clients/connect")?;
        let request = ConnectRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            scope: &self.scope,
        };

        let response = self.http.post(url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Connect {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Return a valid bearer token, connecting if the cache is empty.
    ///
    /// Concurrent misses collapse into one connect call: the refresh lock
    /// serializes them and each caller re-checks the cache under the lock.
    pub async fn token(&self) -> ClientResult<String> {
        if let Some(token) = self.tokens.current() {
            return Ok(token);
        }

        let _guard = self.tokens.refresh_guard().await;
        if let Some(token) = self.tokens.current() {
            return Ok(token);
        }

        let connect = self.connect().await?;
        tracing::debug!(expires_in = connect.expires_in, "Acquired Core access token");
        Ok(self
            .tokens
            .store(connect.access_token, connect.expires_in))
    }

    /// Send a request with the cached bearer token attached.
    ///
    /// On a 401, the cache is invalidated and the request retried once with
    /// a fresh token. A second 401 surfaces as [`ClientError::Unauthorized`].
    pub async fn send_authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ClientResult<reqwest::Response> {
        // try_clone succeeds for every request this client builds (JSON
        // bodies only); taken up front so the original can be consumed.
        let retry = request.try_clone();

        let token = self.token().await?;
        let response = request.bearer_auth(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::info!("Core rejected token, forcing refresh");
        self.tokens.invalidate();
        let retry = retry.ok_or(ClientError::Unauthorized)?;
        let token = self.token().await?;
        let response = retry.bearer_auth(&token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        Ok(response)
    }

    /// Submit a job to Core.
    pub async fn submit_job(&self, request: &SubmitJobRequest) -> ClientResult<CoreJob> {
        let url = self.url("/jobs")?;
        let response = self
            .send_authorized(self.http.post(url).json(request))
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    scope: &'a str,
}

/// Response of the credentials exchange.
#[derive(Debug, Deserialize)]
pub struct ConnectResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Job submission payload forwarded to Core.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    /// Scaffold group the job operates on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaffold_group_id: Option<String>,
    /// Opaque job input passed through to Core.
    #[serde(default)]
    pub input: serde_json::Value,
}

/// Job handle returned by Core.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreJob {
    pub job_id: String,
    pub status: String,
}
