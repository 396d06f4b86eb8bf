//! Buildkite REST API client
//!
//! Thin JSON-over-HTTP wrapper: no retries or pagination. A 404 surfaces as
//! `ApiError::NotFound` so callers can tell a vanished pipeline from a failure.

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::api::PipelinePayload;

pub const DEFAULT_BASE_URL: &str = "https://api.buildkite.com/v2/";

const USER_AGENT: &str = concat!("kiteform/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API request to {path} failed with status {status}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// API token, kept out of debug output
#[derive(Clone)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ApiToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl From<String> for ApiToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken(<redacted>)")
    }
}

/// Pipeline operations the provider needs from the API
#[async_trait]
pub trait PipelineApi: Send + Sync {
    async fn create_pipeline(&self, payload: &PipelinePayload) -> ApiResult<PipelinePayload>;

    async fn get_pipeline(&self, slug: &str) -> ApiResult<PipelinePayload>;

    async fn update_pipeline(
        &self,
        slug: &str,
        payload: &PipelinePayload,
    ) -> ApiResult<PipelinePayload>;

    async fn delete_pipeline(&self, slug: &str) -> ApiResult<()>;
}

pub struct BuildkiteClient {
    client: Client,
    /// `{base_url}/organizations/{organization}/`
    api_url: Url,
    token: ApiToken,
}

impl BuildkiteClient {
    pub fn new(base_url: &str, organization: &str, token: ApiToken) -> ApiResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut api_url = Url::parse(base_url)
            .map_err(|e| ApiError::Config(format!("Invalid base URL: {e}")))?;
        api_url
            .path_segments_mut()
            .map_err(|_| ApiError::Config(format!("Base URL cannot have a path: {base_url}")))?
            .pop_if_empty()
            .extend(["organizations", organization, ""]);

        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    /// Organization-scoped API root
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    fn url(&self, path: &[&str]) -> ApiResult<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Config(format!("Invalid API URL: {}", self.api_url)))?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &[&str]) -> ApiResult<R> {
        let url = self.url(path)?;
        self.send_json(self.client.get(url), path).await
    }

    pub async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &[&str],
        body: &B,
    ) -> ApiResult<R> {
        let url = self.url(path)?;
        let body = serde_json::to_vec(body)?;
        self.send_json(self.json_body(self.client.post(url), body), path)
            .await
    }

    pub async fn patch<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &[&str],
        body: &B,
    ) -> ApiResult<R> {
        let url = self.url(path)?;
        let body = serde_json::to_vec(body)?;
        self.send_json(self.json_body(self.client.patch(url), body), path)
            .await
    }

    pub async fn delete(&self, path: &[&str]) -> ApiResult<()> {
        let url = self.url(path)?;
        self.send(self.client.delete(url), path).await?;
        Ok(())
    }

    fn json_body(&self, request: RequestBuilder, body: Vec<u8>) -> RequestBuilder {
        request
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
    }

    async fn send_json<R: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &[&str],
    ) -> ApiResult<R> {
        let response = self.send(request, path).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send(&self, request: RequestBuilder, path: &[&str]) -> ApiResult<reqwest::Response> {
        let path = path.join("/");
        trace!("buildkite: request {}", path);

        let response = request.bearer_auth(self.token.as_str()).send().await?;
        let status = response.status();
        debug!("buildkite: {} -> {}", path, status);

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(path));
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(ApiError::Status {
                path,
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl PipelineApi for BuildkiteClient {
    async fn create_pipeline(&self, payload: &PipelinePayload) -> ApiResult<PipelinePayload> {
        self.post(&["pipelines"], payload).await
    }

    async fn get_pipeline(&self, slug: &str) -> ApiResult<PipelinePayload> {
        self.get(&["pipelines", slug]).await
    }

    async fn update_pipeline(
        &self,
        slug: &str,
        payload: &PipelinePayload,
    ) -> ApiResult<PipelinePayload> {
        self.patch(&["pipelines", slug], payload).await
    }

    async fn delete_pipeline(&self, slug: &str) -> ApiResult<()> {
        self.delete(&["pipelines", slug]).await
    }
}
