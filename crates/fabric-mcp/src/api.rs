// crates/fabric-mcp/src/api.rs
// ============================================================================
// Module: REST API Plumbing
// Description: Shared HTTP transport for the Power BI and Fabric clients.
// Purpose: Centralize bearer attachment, status mapping, and body limits.
// Dependencies: reqwest, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Both upstream clients speak the same dialect: JSON over HTTPS with a
//! bearer token fetched per call from the shared [`AuthService`]. This module
//! holds that plumbing so the clients reduce to endpoint maps. Non-success
//! statuses surface as [`ApiError::Status`] carrying the response body text;
//! response bodies are size-capped before decoding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

use crate::auth::AuthError;
use crate::auth::AuthService;
use crate::config::ConfigError;
use crate::config::HttpConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum upstream response body size (bytes). DAX result sets can be
/// sizable, so this is deliberately larger than the server request cap.
const MAX_RESPONSE_BODY_BYTES: usize = 8 * 1024 * 1024;
/// Maximum number of error-body characters carried into an error message.
const MAX_ERROR_DETAIL_CHARS: usize = 512;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Upstream API call errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bearer-token acquisition failed before the request was sent.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Upstream returned a non-success status.
    #[error("{service} API returned {status}: {detail}")]
    Status {
        /// Upstream service name.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Trimmed response body text.
        detail: String,
    },
    /// Request could not be sent or the response could not be read.
    #[error("{service} API request failed: {detail}")]
    Transport {
        /// Upstream service name.
        service: &'static str,
        /// Stable failure description.
        detail: String,
    },
    /// Response body was not the expected JSON shape.
    #[error("{service} API returned an invalid response")]
    Decode {
        /// Upstream service name.
        service: &'static str,
    },
}

// ============================================================================
// SECTION: Rest Client
// ============================================================================

/// Bearer-authenticated JSON client bound to one upstream service.
pub struct RestClient {
    /// Blocking HTTP client with configured timeouts.
    client: Client,
    /// Base URL without a trailing slash.
    base_url: String,
    /// OAuth2 scope used to fetch tokens for this service.
    scope: String,
    /// Shared token service.
    auth: Arc<AuthService>,
    /// Upstream service name used in error messages.
    service: &'static str,
}

impl RestClient {
    /// Builds a client for one upstream service.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the HTTP client cannot be constructed.
    pub fn new(
        service: &'static str,
        base_url: &str,
        scope: &str,
        auth: Arc<AuthService>,
        http: &HttpConfig,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(http.connect_timeout_ms))
            .timeout(Duration::from_millis(http.request_timeout_ms))
            .build()
            .map_err(|_| ConfigError::Invalid("http client build failed".to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            scope: scope.to_string(),
            auth,
            service,
        })
    }

    /// Issues a GET request and decodes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on auth, transport, status, or decode failure.
    pub fn get(&self, path: &str) -> Result<Value, ApiError> {
        let token = self.auth.token(&self.scope)?;
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .map_err(|err| self.map_send_error(&err))?;
        self.decode(response)
    }

    /// Issues a POST request with a JSON body and decodes the JSON reply.
    ///
    /// An empty response body decodes to `Value::Null`, which accepted-only
    /// endpoints (dataset refresh, row upload) return.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on auth, transport, status, or decode failure.
    pub fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let token = self.auth.token(&self.scope)?;
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .map_err(|err| self.map_send_error(&err))?;
        self.decode(response)
    }

    /// Checks the status and decodes a size-capped JSON body.
    fn decode(&self, mut response: reqwest::blocking::Response) -> Result<Value, ApiError> {
        let status = response.status();
        let body = self.read_body(&mut response)?;
        if !status.is_success() {
            let detail: String = String::from_utf8_lossy(&body)
                .trim()
                .chars()
                .take(MAX_ERROR_DETAIL_CHARS)
                .collect();
            return Err(ApiError::Status {
                service: self.service,
                status: status.as_u16(),
                detail,
            });
        }
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(|_| ApiError::Decode {
            service: self.service,
        })
    }

    /// Reads a response body enforcing the size cap.
    fn read_body(&self, response: &mut reqwest::blocking::Response) -> Result<Vec<u8>, ApiError> {
        let cap = u64::try_from(MAX_RESPONSE_BODY_BYTES).unwrap_or(u64::MAX);
        if let Some(length) = response.content_length()
            && length > cap
        {
            return Err(ApiError::Transport {
                service: self.service,
                detail: "response too large".to_string(),
            });
        }
        let mut limited = response.take(cap.saturating_add(1));
        let mut buf = Vec::new();
        limited.read_to_end(&mut buf).map_err(|_| ApiError::Transport {
            service: self.service,
            detail: "response read failed".to_string(),
        })?;
        if buf.len() > MAX_RESPONSE_BODY_BYTES {
            return Err(ApiError::Transport {
                service: self.service,
                detail: "response too large".to_string(),
            });
        }
        Ok(buf)
    }

    /// Maps reqwest send errors to stable transport error messages.
    fn map_send_error(&self, error: &reqwest::Error) -> ApiError {
        let detail = if error.is_timeout() {
            "request timed out"
        } else if error.is_connect() {
            "service unreachable"
        } else {
            "request failed"
        };
        ApiError::Transport {
            service: self.service,
            detail: detail.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Response Helpers
// ============================================================================

/// Unwraps the OData `value` array from a list response.
///
/// # Errors
///
/// Returns [`ApiError::Decode`] when the field is missing or not an array.
pub fn odata_value(service: &'static str, body: Value) -> Result<Value, ApiError> {
    match body {
        Value::Object(mut map) => match map.remove("value") {
            Some(value @ Value::Array(_)) => Ok(value),
            _ => Err(ApiError::Decode {
                service,
            }),
        },
        _ => Err(ApiError::Decode {
            service,
        }),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use serde_json::json;

    use super::odata_value;

    #[test]
    fn odata_value_unwraps_list_payloads() {
        let body = json!({"value": [{"id": "a"}, {"id": "b"}]});
        let value = odata_value("Power BI", body).unwrap();
        assert_eq!(value, json!([{"id": "a"}, {"id": "b"}]));
    }

    #[test]
    fn odata_value_rejects_missing_field() {
        assert!(odata_value("Power BI", json!({"items": []})).is_err());
        assert!(odata_value("Power BI", json!({"value": "nope"})).is_err());
        assert!(odata_value("Power BI", json!(null)).is_err());
    }
}
