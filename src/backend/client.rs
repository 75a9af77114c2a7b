use reqwest::{header, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::BackendConfig;
use crate::error::{AppError, BackendError};

/// HTTP handle on the hosted backend.
///
/// One instance is built at startup and passed to every collaborator; cloning
/// is cheap and shares the underlying connection pool.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    bearer: String,
}

impl BackendClient {
    pub fn new(base_url: &str, api_key: &str, timeout: std::time::Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_http(http, base_url, api_key)
    }

    pub fn with_http(http: reqwest::Client, base_url: &str, api_key: &str) -> Result<Self, AppError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
            bearer: api_key.to_string(),
        })
    }

    /// Client authenticated with the public key.
    pub fn anon(config: &BackendConfig) -> Result<Self, AppError> {
        Self::new(&config.url, &config.anon_key, config.timeout())
    }

    /// Client authenticated with the service-role key, if one is configured.
    pub fn service(config: &BackendConfig) -> Result<Option<Self>, AppError> {
        config
            .service_role_key
            .as_deref()
            .map(|key| Self::new(&config.url, key, config.timeout()))
            .transpose()
    }

    /// Same connection pool, requests scoped to a user's access token.
    pub fn with_access_token(&self, access_token: &str) -> Self {
        Self {
            bearer: access_token.to_string(),
            ..self.clone()
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn url(&self, path: &str) -> Result<Url, AppError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AppError> {
        self.request_as(method, path, &self.bearer)
    }

    /// Request carrying an explicit bearer token instead of the client's own.
    pub fn request_as(&self, method: Method, path: &str, bearer: &str) -> Result<RequestBuilder, AppError> {
        let url = self.url(path)?;
        debug!(%method, path = url.path(), "backend request");
        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer)))
    }

    pub async fn send(&self, request: RequestBuilder) -> Result<Response, AppError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = BackendError::from_response_body(status, &body);
        warn!(status = err.status, message = %err.message, "backend request failed");
        Err(err.into())
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AppError> {
        let response = self.send(request).await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn send_empty(&self, request: RequestBuilder) -> Result<(), AppError> {
        self.send(request).await?;
        Ok(())
    }
}
