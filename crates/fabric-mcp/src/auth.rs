// crates/fabric-mcp/src/auth.rs
// ============================================================================
// Module: Token Acquisition Service
// Description: OAuth2 client-credentials token acquisition and caching.
// Purpose: Serve scope-specific bearer tokens with minimal identity round-trips.
// Dependencies: reqwest, serde, thiserror
// ============================================================================

//! ## Overview
//! The token service wraps the Azure AD client-credentials flow behind a
//! per-scope cache. Tokens are cached with a safety margin subtracted from the
//! provider-reported expiry so an entry is never served within five minutes of
//! true expiry. Acquisition failures leave the cache untouched.
//!
//! ## Invariants
//! - A cached token is served only while `now < expires_at_ms`.
//! - Cache entries are overwritten wholesale on refresh, never merged.
//! - The cache lock is never held across a network call; two concurrent
//!   acquisitions for the same expired scope may both fetch and the later
//!   write wins. This is an accepted last-write-wins race: token requests are
//!   idempotent and cheap relative to call volume.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::config::FabricMcpConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Safety margin subtracted from the provider-reported expiry (5 minutes).
pub const TOKEN_EXPIRY_MARGIN_MS: u64 = 300_000;
/// Fallback token lifetime when the provider omits an expiry (55 minutes).
pub const FALLBACK_TOKEN_TTL_MS: u64 = 3_300_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Token acquisition errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Identity provider rejected the request or was unreachable.
    #[error("token acquisition failed: {0}")]
    Acquisition(String),
    /// Internal service failure (lock poisoning, clock failure).
    #[error("auth service error: {0}")]
    Internal(String),
}

// ============================================================================
// SECTION: Token Source
// ============================================================================

/// Provider response for a single token request.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    /// Opaque bearer token.
    pub access_token: String,
    /// Provider-reported absolute expiry in epoch milliseconds, when present.
    pub expires_at_ms: Option<u64>,
}

/// Identity-provider seam for token acquisition.
pub trait TokenSource: Send + Sync {
    /// Performs a client-credentials token request for the given scope.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the provider rejects or is unreachable.
    fn acquire(&self, scope: &str) -> Result<TokenResponse, AuthError>;
}

/// Azure AD v2.0 token endpoint client.
pub struct AadTokenSource {
    /// Blocking HTTP client with configured timeouts.
    client: Client,
    /// Fully resolved token endpoint URL.
    token_url: String,
    /// Application (client) identifier.
    client_id: String,
    /// Client secret for the confidential application.
    client_secret: String,
}

/// Wire shape of a successful token endpoint response.
#[derive(Debug, Deserialize)]
struct AadTokenReply {
    /// Issued access token.
    access_token: String,
    /// Token lifetime in seconds.
    expires_in: Option<u64>,
}

impl AadTokenSource {
    /// Builds a token source from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a credential is missing or the HTTP client
    /// cannot be constructed.
    pub fn from_config(config: &FabricMcpConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let tenant_id = config
            .auth
            .tenant_id
            .clone()
            .ok_or_else(|| ConfigError::MissingCredential("auth.tenant_id".to_string()))?;
        let client_id = config
            .auth
            .client_id
            .clone()
            .ok_or_else(|| ConfigError::MissingCredential("auth.client_id".to_string()))?;
        let client_secret = config
            .auth
            .client_secret
            .clone()
            .ok_or_else(|| ConfigError::MissingCredential("auth.client_secret".to_string()))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.http.connect_timeout_ms))
            .timeout(Duration::from_millis(config.http.request_timeout_ms))
            .build()
            .map_err(|_| ConfigError::Invalid("http client build failed".to_string()))?;
        let token_url = format!("{}/{tenant_id}/oauth2/v2.0/token", config.authority());
        Ok(Self {
            client,
            token_url,
            client_id,
            client_secret,
        })
    }
}

impl TokenSource for AadTokenSource {
    fn acquire(&self, scope: &str) -> Result<TokenResponse, AuthError> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
            ("grant_type", "client_credentials"),
        ];
        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .map_err(|err| map_send_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AuthError::Acquisition(format!(
                "identity provider returned {status}: {}",
                body.trim()
            )));
        }
        let reply: AadTokenReply = response
            .json()
            .map_err(|_| AuthError::Acquisition("invalid token response".to_string()))?;
        let expires_at_ms =
            reply.expires_in.map(|secs| now_millis().saturating_add(secs.saturating_mul(1_000)));
        Ok(TokenResponse {
            access_token: reply.access_token,
            expires_at_ms,
        })
    }
}

/// Maps reqwest send errors to stable acquisition error messages.
fn map_send_error(error: &reqwest::Error) -> AuthError {
    if error.is_timeout() {
        AuthError::Acquisition("token request timed out".to_string())
    } else if error.is_connect() {
        AuthError::Acquisition("identity provider unreachable".to_string())
    } else {
        AuthError::Acquisition("token request failed".to_string())
    }
}

// ============================================================================
// SECTION: Auth Service
// ============================================================================

/// Cached token entry for a single scope.
#[derive(Debug, Clone)]
struct CachedToken {
    /// Opaque bearer token.
    token: String,
    /// Effective expiry in epoch milliseconds (margin already applied).
    expires_at_ms: u64,
}

/// Process-wide token acquisition and caching service.
///
/// Constructed once and shared by both API clients; the cache is the only
/// shared mutable state in the server.
pub struct AuthService {
    /// Identity-provider client.
    source: Arc<dyn TokenSource>,
    /// Per-scope token cache.
    cache: Mutex<BTreeMap<String, CachedToken>>,
    /// Default scope for Power BI API calls.
    powerbi_scope: String,
    /// Default scope for Fabric API calls.
    fabric_scope: String,
}

impl AuthService {
    /// Builds the auth service from validated configuration.
    ///
    /// Fails before any token request is attempted when a required credential
    /// is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when credentials are missing or invalid.
    pub fn from_config(config: &FabricMcpConfig) -> Result<Self, ConfigError> {
        let source = AadTokenSource::from_config(config)?;
        Ok(Self::with_source(
            Arc::new(source),
            config.powerbi_scope(),
            config.fabric_scope(),
        ))
    }

    /// Builds the auth service over an explicit token source.
    ///
    /// Used by tests to substitute the identity provider.
    #[must_use]
    pub fn with_source(
        source: Arc<dyn TokenSource>,
        powerbi_scope: &str,
        fabric_scope: &str,
    ) -> Self {
        Self {
            source,
            cache: Mutex::new(BTreeMap::new()),
            powerbi_scope: powerbi_scope.to_string(),
            fabric_scope: fabric_scope.to_string(),
        }
    }

    /// Returns a valid bearer token for the requested scope.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when acquisition fails; the cache is left
    /// untouched so a subsequent call retries cleanly.
    pub fn token(&self, scope: &str) -> Result<String, AuthError> {
        self.token_at(scope, now_millis())
    }

    /// Returns a token for the scope evaluating expiry against `now_ms`.
    ///
    /// Exposed so cache-expiry behavior is deterministic under test.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when acquisition fails.
    pub fn token_at(&self, scope: &str, now_ms: u64) -> Result<String, AuthError> {
        if let Some(cached) = self.lookup(scope)? {
            if cached.expires_at_ms > now_ms {
                return Ok(cached.token);
            }
        }
        let response = self.source.acquire(scope)?;
        let expires_at_ms = response.expires_at_ms.map_or_else(
            || now_ms.saturating_add(FALLBACK_TOKEN_TTL_MS),
            |reported| reported.saturating_sub(TOKEN_EXPIRY_MARGIN_MS),
        );
        self.store(scope, &response.access_token, expires_at_ms)?;
        Ok(response.access_token)
    }

    /// Returns a bearer token for the default Power BI scope.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when acquisition fails.
    pub fn power_bi_token(&self) -> Result<String, AuthError> {
        self.token(&self.powerbi_scope)
    }

    /// Returns a bearer token for the default Fabric scope.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when acquisition fails.
    pub fn fabric_token(&self) -> Result<String, AuthError> {
        self.token(&self.fabric_scope)
    }

    /// Reads the cache entry for a scope. Lock is released before returning.
    fn lookup(&self, scope: &str) -> Result<Option<CachedToken>, AuthError> {
        let cache = self
            .cache
            .lock()
            .map_err(|_| AuthError::Internal("token cache lock poisoned".to_string()))?;
        Ok(cache.get(scope).cloned())
    }

    /// Overwrites the cache entry for a scope.
    fn store(&self, scope: &str, token: &str, expires_at_ms: u64) -> Result<(), AuthError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| AuthError::Internal("token cache lock poisoned".to_string()))?;
        cache.insert(
            scope.to_string(),
            CachedToken {
                token: token.to_string(),
                expires_at_ms,
            },
        );
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current wall-clock time in epoch milliseconds.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
