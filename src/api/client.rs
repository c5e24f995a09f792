//! `TemuClient`: signed calls to the Temu open-API router.
//!
//! Every call is a `POST` of one flat JSON object: the common parameters
//! (`type`, `app_key`, `access_token`, `timestamp`, `data_type`, `version`),
//! the business parameters of the API, and finally `sign`. The router answers
//! with an envelope:
//!
//! ```json
//! { "success": true, "errorCode": 1000000, "errorMsg": "", "result": { … } }
//! ```
//!
//! The HTTP layer sits behind [`HttpTransport`] so the signing, envelope and
//! retry logic here can be exercised without a network.

use crate::api::retry::{retry_with_backoff, RetryDisposition, RetryPolicy};
use crate::api::signature::{self, SignMethod};
use crate::config::ListingConfig;
use crate::error::ListingError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

pub const DATA_TYPE: &str = "JSON";
pub const API_VERSION: &str = "V1";

/// App credentials issued by the Temu seller centre.
#[derive(Clone, PartialEq, Eq)]
pub struct TemuCredentials {
    pub app_key: String,
    pub app_secret: String,
    pub access_token: String,
}

impl TemuCredentials {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            access_token: access_token.into(),
        }
    }

    /// Read `TEMU_APP_KEY`, `TEMU_APP_SECRET` and `TEMU_ACCESS_TOKEN`.
    pub fn from_env() -> Result<Self, ListingError> {
        fn var(name: &str) -> Result<String, ListingError> {
            match std::env::var(name) {
                Ok(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(ListingError::MissingCredentials { var: name.into() }),
            }
        }
        Ok(Self::new(
            var("TEMU_APP_KEY")?,
            var("TEMU_APP_SECRET")?,
            var("TEMU_ACCESS_TOKEN")?,
        ))
    }
}

impl fmt::Debug for TemuCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemuCredentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Raw HTTP response handed back by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Network-level failure (connect, TLS, timeout, body read).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct TransportError {
    pub reason: String,
    pub timeout: bool,
}

/// Sends a JSON body to a URL.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout_secs: u64) -> Result<Self, ListingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ListingError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        let to_err = |e: reqwest::Error| TransportError {
            timeout: e.is_timeout(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(to_err)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(to_err)?;
        Ok(HttpResponse { status, body })
    }
}

/// Signed, retrying client for the Temu router.
#[derive(Clone)]
pub struct TemuClient {
    transport: Arc<dyn HttpTransport>,
    credentials: TemuCredentials,
    router_url: String,
    sign_method: SignMethod,
    retry: RetryPolicy,
    transient_codes: Vec<i64>,
}

impl fmt::Debug for TemuClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemuClient")
            .field("credentials", &self.credentials)
            .field("router_url", &self.router_url)
            .field("sign_method", &self.sign_method)
            .field("retry", &self.retry)
            .finish()
    }
}

impl TemuClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: TemuCredentials,
        router_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            credentials,
            router_url: router_url.into(),
            sign_method: SignMethod::default(),
            retry: RetryPolicy::default(),
            transient_codes: Vec::new(),
        }
    }

    /// Build a reqwest-backed client from a listing config.
    ///
    /// Credentials come from the config, else from the environment.
    pub fn from_config(config: &ListingConfig) -> Result<Self, ListingError> {
        let credentials = match &config.credentials {
            Some(c) => c.clone(),
            None => TemuCredentials::from_env()?,
        };
        let transport = Arc::new(ReqwestTransport::new(config.api_timeout_secs)?);
        Ok(Self::new(transport, credentials, config.effective_router_url())
            .with_sign_method(config.sign_method)
            .with_retry(RetryPolicy::from_config(config))
            .with_transient_codes(config.transient_error_codes.clone()))
    }

    pub fn with_sign_method(mut self, method: SignMethod) -> Self {
        self.sign_method = method;
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_transient_codes(mut self, codes: Vec<i64>) -> Self {
        self.transient_codes = codes;
        self
    }

    pub fn router_url(&self) -> &str {
        &self.router_url
    }

    /// Assemble the signed request body for one call.
    pub fn build_request(
        &self,
        api_type: &str,
        params: &Value,
        timestamp: u64,
    ) -> Result<Map<String, Value>, ListingError> {
        let mut body = match params {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(ListingError::Internal(format!(
                    "parameters for '{api_type}' must be a JSON object, got {other}"
                )))
            }
        };
        body.retain(|_, v| !v.is_null());

        body.insert("type".into(), Value::String(api_type.to_string()));
        body.insert("app_key".into(), Value::String(self.credentials.app_key.clone()));
        body.insert(
            "access_token".into(),
            Value::String(self.credentials.access_token.clone()),
        );
        body.insert("timestamp".into(), Value::from(timestamp));
        body.insert("data_type".into(), Value::String(DATA_TYPE.into()));
        body.insert("version".into(), Value::String(API_VERSION.into()));

        signature::sign_in_place(&mut body, &self.credentials.app_secret, self.sign_method)?;
        Ok(body)
    }

    /// Call `api_type` with `params`, retrying transient failures.
    ///
    /// Returns the envelope's `result` (or `Null` when absent).
    pub async fn call(&self, api_type: &str, params: Value) -> Result<Value, ListingError> {
        let transient = &self.transient_codes;
        retry_with_backoff(
            &self.retry,
            api_type,
            |attempt| self.call_once(api_type, &params, attempt),
            |err| {
                if err.is_transient(transient) {
                    RetryDisposition::Retry
                } else {
                    RetryDisposition::Abort
                }
            },
        )
        .await
    }

    /// [`Self::call`] followed by deserialisation of the result.
    pub async fn call_typed<T: DeserializeOwned>(
        &self,
        api_type: &str,
        params: Value,
    ) -> Result<T, ListingError> {
        let result = self.call(api_type, params).await?;
        serde_json::from_value(result).map_err(|e| ListingError::InvalidResponse {
            api_type: api_type.to_string(),
            detail: e.to_string(),
        })
    }

    async fn call_once(
        &self,
        api_type: &str,
        params: &Value,
        attempt: u32,
    ) -> Result<Value, ListingError> {
        // Timestamp and signature are fresh on every attempt.
        let body = Value::Object(self.build_request(api_type, params, unix_timestamp())?);
        debug!(api_type, attempt, "calling Temu API");

        let response = self
            .transport
            .post_json(&self.router_url, &body)
            .await
            .map_err(|e| ListingError::Transport {
                api_type: api_type.to_string(),
                reason: if e.timeout {
                    format!("timed out: {e}")
                } else {
                    e.to_string()
                },
            })?;

        parse_envelope(api_type, &response)
    }
}

/// Turn a router response into the `result` value or a typed error.
pub fn parse_envelope(api_type: &str, response: &HttpResponse) -> Result<Value, ListingError> {
    if !(200..300).contains(&response.status) {
        return Err(ListingError::HttpStatus {
            api_type: api_type.to_string(),
            status: response.status,
            body: truncate(&response.body, 500),
        });
    }

    let envelope: Value =
        serde_json::from_str(&response.body).map_err(|e| ListingError::InvalidResponse {
            api_type: api_type.to_string(),
            detail: format!("not JSON ({e}): {}", truncate(&response.body, 200)),
        })?;

    let success = envelope
        .get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| ListingError::InvalidResponse {
            api_type: api_type.to_string(),
            detail: "missing 'success' flag".into(),
        })?;

    if !success {
        let code = match envelope.get("errorCode") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(-1),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(-1),
            _ => -1,
        };
        let message = envelope
            .get("errorMsg")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        return Err(ListingError::Api {
            api_type: api_type.to_string(),
            code,
            message,
        });
    }

    Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max_chars).collect();
        t.push('…');
        t
    }
}
