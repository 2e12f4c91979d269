// crates/fabric-mcp/src/lib.rs
// ============================================================================
// Module: Fabric MCP
// Description: MCP server exposing Power BI and Microsoft Fabric tools.
// Purpose: Provide tool adapters over the Power BI and Fabric REST APIs.
// Dependencies: axum, jsonschema, reqwest, serde, tokio
// ============================================================================

//! ## Overview
//! Fabric MCP exposes a fixed catalog of tools over JSON-RPC 2.0, letting an
//! external agent query and refresh Power BI datasets and manage Microsoft
//! Fabric notebooks and warehouses. OAuth2 client-credential acquisition and
//! token caching sit behind [`auth::AuthService`]; all tool calls route
//! through [`tools::ToolRouter`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod contract;
pub mod fabric;
pub mod powerbi;
pub mod server;
pub mod tools;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use api::ApiError;
pub use audit::AuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::ToolAuditEvent;
pub use auth::AuthError;
pub use auth::AuthService;
pub use auth::TokenResponse;
pub use auth::TokenSource;
pub use config::ConfigError;
pub use config::FabricMcpConfig;
pub use contract::ToolContent;
pub use contract::ToolDefinition;
pub use contract::ToolName;
pub use contract::ToolResult;
pub use fabric::FabricApi;
pub use fabric::FabricClient;
pub use powerbi::PowerBiApi;
pub use powerbi::PowerBiClient;
pub use server::McpServer;
pub use server::McpServerError;
pub use tools::ToolError;
pub use tools::ToolRouter;
pub use validation::ToolInputValidator;
pub use validation::ValidationError;
