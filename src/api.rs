// API client module: one blocking call primitive shared by the public
// SurveyMonkey REST API and the private admin endpoints. The HTTP work sits
// behind `Transport` so the call/retry sequencing can run without a network.

use crate::config::Credentials;
use crate::error::ApiError;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, REFERER, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::thread;
use std::time::Duration;

pub use reqwest::Method;

/// Which authentication a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Bearer token, documented v3 API.
    Public,
    /// Browser session cookie + referer, undocumented admin UI endpoints.
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub surface: Surface,
}

impl Endpoint {
    pub fn public(url: impl Into<String>) -> Self {
        Self { url: url.into(), surface: Surface::Public }
    }

    pub fn private(url: impl Into<String>) -> Self {
        Self { url: url.into(), surface: Surface::Private }
    }

    /// Appends path segments, e.g. `/{id}/pages`.
    pub fn join(&self, suffix: &str) -> Self {
        Self { url: format!("{}{}", self.url, suffix), surface: self.surface }
    }
}

/// Request body or parameters. Reads use `Query`, structured writes `Json`,
/// raw writes `Form`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Query(Vec<(String, String)>),
    Json(Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: Endpoint,
    pub payload: Payload,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<Duration>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into(), retry_after: None }
    }
}

/// Sends one request and returns the raw status and body. No retry here.
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Production transport backed by a reqwest blocking client.
pub struct HttpTransport {
    client: Client,
    public_headers: HeaderMap,
    private_headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;

        let mut public_headers = HeaderMap::new();
        let bearer = format!("Bearer {}", credentials.auth_token);
        public_headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).context("auth_token is not a valid header value")?,
        );

        let mut private_headers = HeaderMap::new();
        private_headers.insert(
            COOKIE,
            HeaderValue::from_str(&credentials.admin_ui_cookie)
                .context("admin_ui_cookie is not a valid header value")?,
        );
        private_headers.insert(
            REFERER,
            HeaderValue::from_str(&credentials.admin_ui_referer)
                .context("admin_ui_referer is not a valid header value")?,
        );

        Ok(HttpTransport { client, public_headers, private_headers })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let headers = match request.endpoint.surface {
            Surface::Public => self.public_headers.clone(),
            Surface::Private => self.private_headers.clone(),
        };
        let mut req = self
            .client
            .request(request.method.clone(), &request.endpoint.url)
            .headers(headers);
        req = match &request.payload {
            Payload::Empty => req,
            Payload::Query(params) => req.query(params),
            Payload::Json(body) => req.json(body),
            Payload::Form(fields) => req.form(fields),
        };

        let res = req.send()?;
        let status = res.status().as_u16();
        let retry_after = res
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = res.text()?;
        Ok(ApiResponse { status, body, retry_after })
    }
}

/// Call primitive: sends through the transport, retries rate limiting with
/// bounded backoff, and decodes successful bodies as JSON.
pub struct ApiClient<T = HttpTransport> {
    transport: T,
    retry: RetryPolicy,
}

impl ApiClient<HttpTransport> {
    pub fn from_credentials(credentials: &Credentials, retry: RetryPolicy) -> Result<Self> {
        Ok(ApiClient::new(HttpTransport::new(credentials)?, retry))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        ApiClient { transport, retry }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Perform one logical call. 200/201 return the decoded body (empty
    /// bodies decode to `Value::Null`), 429 is retried until the policy runs
    /// out, anything else is returned as `ApiError::Status`.
    pub fn call(
        &self,
        endpoint: &Endpoint,
        method: Method,
        payload: Payload,
    ) -> Result<Value, ApiError> {
        let request = ApiRequest { method, endpoint: endpoint.clone(), payload };
        let attempts = self.retry.max_attempts();

        for attempt in 1..=attempts {
            debug!(
                "{} {} (attempt {}/{})",
                request.method, request.endpoint.url, attempt, attempts
            );
            let response = self.transport.send(&request)?;
            match response.status {
                200 | 201 => return decode_body(response.body),
                429 => {
                    if attempt == attempts {
                        break;
                    }
                    let delay = self.retry.delay_with_hint(attempt, response.retry_after);
                    warn!("server busy, retrying {} in {:?}", request.endpoint.url, delay);
                    thread::sleep(delay);
                }
                status => {
                    return Err(ApiError::Status { status, body: response.body });
                }
            }
        }

        Err(ApiError::RateLimited { attempts })
    }

    /// `call`, then deserialize the body into `D`.
    pub fn call_as<D: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        method: Method,
        payload: Payload,
    ) -> Result<D, ApiError> {
        let value = self.call(endpoint, method, payload)?;
        let body = value.to_string();
        serde_json::from_value(value).map_err(|source| ApiError::Decode { source, body })
    }
}

fn decode_body(body: String) -> Result<Value, ApiError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|source| ApiError::Decode { source, body })
}
