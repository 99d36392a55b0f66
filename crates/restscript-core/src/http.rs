//! HTTP client abstraction and the default reqwest-backed implementation.
//!
//! Any status code is a normal [`HttpResponse`]; only transport failures
//! (connection refused, DNS, timeout) are [`HttpError`]s.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use tracing::debug;

use crate::ast::HttpMethod;
use crate::error::HttpError;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercased.
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON when the body parses, otherwise the raw text.
    pub body: Value,
    pub elapsed_ms: u64,
}

impl HttpResponse {
    /// The value bound to `$response`: status, headers, body and elapsed.
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("status".to_string(), Value::Integer(i64::from(self.status)));
        map.insert(
            "headers".to_string(),
            Value::Map(
                self.headers
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        );
        map.insert("body".to_string(), self.body.clone());
        map.insert("elapsed".to_string(), Value::Integer(i64::try_from(self.elapsed_ms).unwrap_or(i64::MAX)));
        Value::Map(map)
    }
}

/// Executes one HTTP request.
///
/// Implementations are shared by concurrently running scripts, so they must
/// not keep per-request state.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Default client built on reqwest with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, HttpError> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| HttpError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
    }
}

fn build_headers(input: &BTreeMap<String, String>) -> Result<HeaderMap, HttpError> {
    let mut headers = HeaderMap::new();
    for (key, value) in input {
        if key.is_empty() {
            continue;
        }
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| HttpError::InvalidRequest(format!("invalid header name `{key}`: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HttpError::InvalidRequest(format!("invalid header value for `{key}`: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Layers `overrides` onto `base`. Header names match case-insensitively;
/// an override replaces any differently-cased entry it matches.
pub fn merge_headers(
    base: &mut BTreeMap<String, String>,
    overrides: impl IntoIterator<Item = (String, String)>,
) {
    for (name, value) in overrides {
        base.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        base.insert(name, value);
    }
}

/// Parses a response body as JSON, keeping it as text when it is not.
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut headers = build_headers(&request.headers)?;
        let mut builder = self
            .client
            .request(to_method(request.method), &request.url);
        if request.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(request.timeout_ms));
        }

        match &request.body {
            Some(Value::String(text)) => {
                builder = builder.body(text.clone());
            }
            Some(value) => {
                let json = serde_json::to_vec(&serde_json::Value::from(value))
                    .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                builder = builder.body(json);
            }
            None => {}
        }

        let start = Instant::now();
        let response = builder.headers(headers).send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(request.timeout_ms)
            } else {
                HttpError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let response_headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_ascii_lowercase(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(request.timeout_ms)
            } else {
                HttpError::Network(format!("failed to read response: {e}"))
            }
        })?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        debug!(status, elapsed_ms, bytes = text.len(), "received response");

        Ok(HttpResponse {
            status,
            headers: response_headers,
            body: parse_body(&text),
            elapsed_ms,
        })
    }
}
