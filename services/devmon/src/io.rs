//! HTTP client abstraction for testability

use std::time::Duration;

use async_trait::async_trait;

use crate::config::DeviceConfig;

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Credentials attached to an outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpAuth {
    None,
    Bearer(String),
    Basic { username: String, password: String },
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request to the given URL
    async fn get(&self, url: &str) -> crate::Result<HttpResponse>;

    /// Send a POST request with form-encoded body
    async fn post_form(
        &self,
        url: &str,
        auth: &HttpAuth,
        params: &[(&str, &str)],
    ) -> crate::Result<HttpResponse>;

    /// Send a POST request with a JSON body
    async fn post_json(
        &self,
        url: &str,
        auth: &HttpAuth,
        body: &serde_json::Value,
    ) -> crate::Result<HttpResponse>;
}

/// Transport policy for a reqwest client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpClientOptions {
    /// Skip certificate validation (self-signed device certificates)
    pub accept_invalid_certs: bool,
    pub timeout: Option<Duration>,
}

impl HttpClientOptions {
    /// The TLS policy and timeout configured for one device
    pub fn for_device(device: &DeviceConfig) -> Self {
        Self {
            accept_invalid_certs: device.accept_invalid_certs,
            timeout: Some(device.request_timeout),
        }
    }
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            accept_invalid_certs: false,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Production HTTP client using reqwest
#[derive(Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(options: HttpClientOptions) -> crate::Result<Self> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(options.accept_invalid_certs);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| crate::DevmonError::Http(format!("Building HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn with_auth(request: reqwest::RequestBuilder, auth: &HttpAuth) -> reqwest::RequestBuilder {
    match auth {
        HttpAuth::None => request,
        HttpAuth::Bearer(token) => request.bearer_auth(token),
        HttpAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
    }
}

async fn into_response(
    method: &str,
    url: &str,
    response: reqwest::Response,
) -> crate::Result<HttpResponse> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| crate::DevmonError::Http(format!("Reading response body: {}", e)))?;

    tracing::debug!("{} {} -> {} ({} bytes)", method, url, status, body.len());
    Ok(HttpResponse { status, body })
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> crate::Result<HttpResponse> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| crate::DevmonError::Http(format!("GET {} failed: {}", url, e)))?;

        into_response("GET", url, response).await
    }

    async fn post_form(
        &self,
        url: &str,
        auth: &HttpAuth,
        params: &[(&str, &str)],
    ) -> crate::Result<HttpResponse> {
        tracing::debug!("POST {}", url);
        let response = with_auth(self.client.post(url), auth)
            .form(params)
            .send()
            .await
            .map_err(|e| crate::DevmonError::Http(format!("POST {} failed: {}", url, e)))?;

        into_response("POST", url, response).await
    }

    async fn post_json(
        &self,
        url: &str,
        auth: &HttpAuth,
        body: &serde_json::Value,
    ) -> crate::Result<HttpResponse> {
        tracing::debug!("POST {}", url);
        let response = with_auth(self.client.post(url), auth)
            .json(body)
            .send()
            .await
            .map_err(|e| crate::DevmonError::Http(format!("POST {} failed: {}", url, e)))?;

        into_response("POST", url, response).await
    }
}
