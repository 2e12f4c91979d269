// crates/fabric-mcp/tests/config_validation.rs
// ============================================================================
// Module: Configuration Validation Tests
// Description: Tests for config parsing, overlays, and fail-closed validation.
// Purpose: Verify startup refuses incomplete or malformed configuration.
// Dependencies: fabric-mcp, tempfile
// ============================================================================

//! ## Overview
//! Covers TOML parsing strictness, overlay precedence, credential
//! requirements, and transport/timeout validation. File-backed cases go
//! through [`FabricMcpConfig::load`] with a temp directory.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;
use std::path::PathBuf;

use fabric_mcp::ConfigError;
use fabric_mcp::FabricMcpConfig;
use fabric_mcp::config::ServerTransport;

/// Builds a config with the minimum viable credential triple.
fn base_config() -> FabricMcpConfig {
    let mut config = FabricMcpConfig::default();
    config.auth.tenant_id = Some("tenant-1".to_string());
    config.auth.client_id = Some("client-1".to_string());
    config.auth.client_secret = Some("secret-1".to_string());
    config
}

/// Writes a TOML config into a temp dir and returns its path.
fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("fabric-mcp.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn minimal_credential_triple_validates() {
    base_config().validate().unwrap();
}

#[test]
fn each_missing_credential_is_named() {
    let cases: [(fn(&mut FabricMcpConfig), &str); 3] = [
        (|c| c.auth.tenant_id = None, "auth.tenant_id / AZURE_TENANT_ID"),
        (|c| c.auth.client_id = None, "auth.client_id / AZURE_CLIENT_ID"),
        (|c| c.auth.client_secret = None, "auth.client_secret / AZURE_CLIENT_SECRET"),
    ];
    for (clear, expected) in cases {
        let mut config = base_config();
        clear(&mut config);
        match config.validate() {
            Err(ConfigError::MissingCredential(field)) => assert_eq!(field, expected),
            other => panic!("expected missing credential, got {other:?}"),
        }
    }
}

#[test]
fn whitespace_credential_is_rejected() {
    let mut config = base_config();
    config.auth.client_secret = Some("   ".to_string());
    assert!(matches!(config.validate(), Err(ConfigError::MissingCredential(_))));
}

#[test]
fn http_transport_requires_bind() {
    let mut config = base_config();
    config.server.transport = ServerTransport::Http;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    config.server.bind = Some("127.0.0.1:8080".to_string());
    config.validate().unwrap();
}

#[test]
fn zero_body_limit_is_rejected() {
    let mut config = base_config();
    config.server.max_body_bytes = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn out_of_range_timeouts_are_rejected() {
    let mut config = base_config();
    config.http.connect_timeout_ms = 10;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let mut config = base_config();
    config.http.request_timeout_ms = 10_000_000;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn defaults_fill_in_service_endpoints() {
    let config = base_config();
    assert_eq!(config.authority(), "https://login.microsoftonline.com");
    assert_eq!(config.powerbi_base_url(), "https://api.powerbi.com/v1.0/myorg");
    assert_eq!(config.powerbi_scope(), "https://analysis.windows.net/powerbi/api/.default");
    assert_eq!(config.fabric_base_url(), "https://api.fabric.microsoft.com/v1");
    assert_eq!(config.fabric_scope(), "https://api.fabric.microsoft.com/.default");
    assert_eq!(config.server.transport, ServerTransport::Stdio);
}

#[test]
fn overlay_values_take_precedence_over_file_values() {
    let mut config = base_config();
    config.powerbi.base_url = Some("https://file.example/powerbi".to_string());
    config.apply_overlay(|var| match var {
        "AZURE_TENANT_ID" => Some("tenant-env".to_string()),
        "POWERBI_API_BASE_URL" => Some("https://env.example/powerbi".to_string()),
        "POWERBI_WORKSPACE_ID" => Some("ws-env".to_string()),
        _ => None,
    });
    assert_eq!(config.auth.tenant_id.as_deref(), Some("tenant-env"));
    assert_eq!(config.powerbi_base_url(), "https://env.example/powerbi");
    assert_eq!(config.powerbi.workspace_id.as_deref(), Some("ws-env"));
    // Untouched fields keep their file values.
    assert_eq!(config.auth.client_id.as_deref(), Some("client-1"));
}

#[test]
fn empty_overlay_values_are_ignored() {
    let mut config = base_config();
    config.apply_overlay(|var| match var {
        "AZURE_CLIENT_SECRET" => Some(String::new()),
        "FABRIC_SCOPE" => Some("  ".to_string()),
        _ => None,
    });
    assert_eq!(config.auth.client_secret.as_deref(), Some("secret-1"));
    assert_eq!(config.fabric_scope(), "https://api.fabric.microsoft.com/.default");
}

#[test]
fn load_parses_a_complete_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[auth]
tenant_id = "tenant-file"
client_id = "client-file"
client_secret = "secret-file"

[powerbi]
workspace_id = "ws-file"

[server]
transport = "http"
bind = "127.0.0.1:9300"
"#,
    );
    let config = FabricMcpConfig::load(Some(&path)).unwrap();
    assert_eq!(config.auth.tenant_id.as_deref(), Some("tenant-file"));
    assert_eq!(config.powerbi.workspace_id.as_deref(), Some("ws-file"));
    assert_eq!(config.server.transport, ServerTransport::Http);
    assert_eq!(config.server.bind.as_deref(), Some("127.0.0.1:9300"));
}

#[test]
fn load_rejects_unknown_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[auth]
tenant_id = "t"
client_id = "c"
client_secret = "s"
unknown_key = "value"
"#,
    );
    assert!(matches!(FabricMcpConfig::load(Some(&path)), Err(ConfigError::Parse(_))));
}

#[test]
fn load_rejects_missing_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(matches!(FabricMcpConfig::load(Some(&path)), Err(ConfigError::Io(_))));
}

#[test]
fn load_rejects_non_utf8_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fabric-mcp.toml");
    fs::write(&path, [0xffu8, 0xfe, 0x00, 0x01]).unwrap();
    assert!(matches!(FabricMcpConfig::load(Some(&path)), Err(ConfigError::Invalid(_))));
}

#[test]
fn load_fails_closed_without_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[powerbi]
workspace_id = "ws-only"
"#,
    );
    // Credentials can still arrive from the process environment, so accept
    // either outcome but never an ignored triple.
    match FabricMcpConfig::load(Some(&path)) {
        Err(ConfigError::MissingCredential(_)) => {}
        Ok(config) => config.validate().unwrap(),
        Err(other) => panic!("unexpected load failure: {other:?}"),
    }
}
