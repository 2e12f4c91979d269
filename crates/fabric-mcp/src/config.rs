// crates/fabric-mcp/src/config.rs
// ============================================================================
// Module: Fabric MCP Configuration
// Description: Configuration loading and validation for the Fabric MCP server.
// Purpose: Provide strict, fail-closed config parsing with env overlays.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file and overlaid with environment
//! variables for credentials and endpoint overrides. Missing credentials fail
//! closed at startup: the server must not begin serving requests without a
//! complete client-credential triple.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "fabric-mcp.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "FABRIC_MCP_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Default maximum request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Default HTTP connect timeout in milliseconds.
pub(crate) const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
/// Default HTTP request timeout in milliseconds.
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Minimum allowed HTTP connect timeout in milliseconds.
pub(crate) const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum allowed HTTP connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 60_000;
/// Minimum allowed HTTP request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
/// Maximum allowed HTTP request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;

/// Default Azure AD authority base URL.
pub(crate) const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
/// Default Power BI REST API base URL.
pub(crate) const DEFAULT_POWERBI_BASE_URL: &str = "https://api.powerbi.com/v1.0/myorg";
/// Default OAuth scope for the Power BI API.
pub(crate) const DEFAULT_POWERBI_SCOPE: &str = "https://analysis.windows.net/powerbi/api/.default";
/// Default Fabric REST API base URL.
pub(crate) const DEFAULT_FABRIC_BASE_URL: &str = "https://api.fabric.microsoft.com/v1";
/// Default OAuth scope for the Fabric API.
pub(crate) const DEFAULT_FABRIC_SCOPE: &str = "https://api.fabric.microsoft.com/.default";

// ============================================================================
// SECTION: Configuration Model
// ============================================================================

/// Top-level Fabric MCP configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FabricMcpConfig {
    /// Azure AD client-credential settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Power BI API settings.
    #[serde(default)]
    pub powerbi: PowerBiConfig,
    /// Fabric API settings.
    #[serde(default)]
    pub fabric: FabricConfig,
    /// Server transport settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Outbound HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Azure AD client-credential configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Azure AD tenant identifier.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Application (client) identifier.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Client secret for the confidential application.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Authority base URL override.
    #[serde(default)]
    pub authority: Option<String>,
}

/// Power BI API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerBiConfig {
    /// API base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// OAuth scope override.
    #[serde(default)]
    pub scope: Option<String>,
    /// Workspace identifier used to scope dataset listings.
    #[serde(default)]
    pub workspace_id: Option<String>,
    /// Workspace display name (startup diagnostics only).
    #[serde(default)]
    pub workspace_name: Option<String>,
    /// XMLA endpoint (startup diagnostics only).
    #[serde(default)]
    pub xmla_endpoint: Option<String>,
}

/// Fabric API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FabricConfig {
    /// API base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// OAuth scope override.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Server transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Transport selection.
    #[serde(default)]
    pub transport: ServerTransport,
    /// Bind address for HTTP transport.
    #[serde(default)]
    pub bind: Option<String>,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: ServerTransport::default(),
            bind: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Server transport selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// Framed JSON-RPC over stdin/stdout.
    #[default]
    Stdio,
    /// JSON-RPC over HTTP POST.
    Http,
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl FabricMcpConfig {
    /// Loads configuration from disk using the default resolution rules and
    /// applies environment overlays.
    ///
    /// An explicitly provided path must load; the default path is optional so
    /// that env-only deployments keep working.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match resolve_path(path) {
            ResolvedPath::Required(resolved) => Self::from_file(&resolved)?,
            ResolvedPath::Optional(resolved) => {
                if resolved.exists() {
                    Self::from_file(&resolved)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overlay();
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Overlays environment variables onto the parsed configuration.
    ///
    /// Environment values take precedence over file values to match the
    /// deployment convention of keeping secrets out of config files.
    fn apply_env_overlay(&mut self) {
        self.apply_overlay(|var| env::var(var).ok());
    }

    /// Overlays values from an arbitrary lookup. The lookup seam keeps the
    /// precedence rules testable without touching process environment.
    pub fn apply_overlay(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        overlay(&mut self.auth.tenant_id, &lookup, "AZURE_TENANT_ID");
        overlay(&mut self.auth.client_id, &lookup, "AZURE_CLIENT_ID");
        overlay(&mut self.auth.client_secret, &lookup, "AZURE_CLIENT_SECRET");
        overlay(&mut self.powerbi.base_url, &lookup, "POWERBI_API_BASE_URL");
        overlay(&mut self.powerbi.scope, &lookup, "POWERBI_SCOPE");
        overlay(&mut self.powerbi.workspace_id, &lookup, "POWERBI_WORKSPACE_ID");
        overlay(&mut self.powerbi.workspace_name, &lookup, "POWERBI_WORKSPACE_NAME");
        overlay(&mut self.powerbi.xmla_endpoint, &lookup, "POWERBI_XMLA_ENDPOINT");
        overlay(&mut self.fabric.base_url, &lookup, "FABRIC_API_BASE_URL");
        overlay(&mut self.fabric.scope, &lookup, "FABRIC_SCOPE");
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_credential(self.auth.tenant_id.as_deref(), "auth.tenant_id / AZURE_TENANT_ID")?;
        require_credential(self.auth.client_id.as_deref(), "auth.client_id / AZURE_CLIENT_ID")?;
        require_credential(
            self.auth.client_secret.as_deref(),
            "auth.client_secret / AZURE_CLIENT_SECRET",
        )?;
        if self.server.transport == ServerTransport::Http && self.server.bind.is_none() {
            return Err(ConfigError::Invalid(
                "server.bind is required for http transport".to_string(),
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_body_bytes must be non-zero".to_string()));
        }
        validate_range(
            "http.connect_timeout_ms",
            self.http.connect_timeout_ms,
            MIN_CONNECT_TIMEOUT_MS,
            MAX_CONNECT_TIMEOUT_MS,
        )?;
        validate_range(
            "http.request_timeout_ms",
            self.http.request_timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )?;
        Ok(())
    }

    /// Returns the effective authority base URL.
    #[must_use]
    pub fn authority(&self) -> &str {
        self.auth.authority.as_deref().unwrap_or(DEFAULT_AUTHORITY)
    }

    /// Returns the effective Power BI API base URL.
    #[must_use]
    pub fn powerbi_base_url(&self) -> &str {
        self.powerbi.base_url.as_deref().unwrap_or(DEFAULT_POWERBI_BASE_URL)
    }

    /// Returns the effective Power BI OAuth scope.
    #[must_use]
    pub fn powerbi_scope(&self) -> &str {
        self.powerbi.scope.as_deref().unwrap_or(DEFAULT_POWERBI_SCOPE)
    }

    /// Returns the effective Fabric API base URL.
    #[must_use]
    pub fn fabric_base_url(&self) -> &str {
        self.fabric.base_url.as_deref().unwrap_or(DEFAULT_FABRIC_BASE_URL)
    }

    /// Returns the effective Fabric OAuth scope.
    #[must_use]
    pub fn fabric_scope(&self) -> &str {
        self.fabric.scope.as_deref().unwrap_or(DEFAULT_FABRIC_SCOPE)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Required credential missing; the server must not start.
    #[error("missing credential: {0}")]
    MissingCredential(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolution outcome for the config path.
enum ResolvedPath {
    /// Path was given explicitly and must exist.
    Required(PathBuf),
    /// Path came from defaults and may be absent.
    Optional(PathBuf),
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> ResolvedPath {
    if let Some(path) = path {
        return ResolvedPath::Required(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        return ResolvedPath::Required(PathBuf::from(env_path));
    }
    ResolvedPath::Optional(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Replaces the target with a non-empty looked-up value when present.
fn overlay(target: &mut Option<String>, lookup: impl Fn(&str) -> Option<String>, var: &str) {
    if let Some(value) = lookup(var) {
        if !value.trim().is_empty() {
            *target = Some(value);
        }
    }
}

/// Ensures a credential field is present and non-empty.
fn require_credential(value: Option<&str>, field: &str) -> Result<(), ConfigError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::MissingCredential(field.to_string())),
    }
}

/// Validates a numeric field against inclusive bounds.
fn validate_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(())
}

/// Serde default for `server.max_body_bytes`.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Serde default for `http.connect_timeout_ms`.
const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Serde default for `http.request_timeout_ms`.
const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
