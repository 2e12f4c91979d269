// crates/fabric-mcp/src/powerbi.rs
// ============================================================================
// Module: Power BI Client
// Description: Power BI REST API surface for datasets and workspaces.
// Purpose: Map dataset query/refresh and workspace listing onto the REST API.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The [`PowerBiApi`] trait is the seam the tool router binds against; the
//! [`PowerBiClient`] implementation maps each operation to a Power BI REST
//! endpoint. When a workspace id is configured, dataset listing uses the
//! workspace-scoped endpoint; everything else addresses datasets directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use serde_json::json;

use crate::api::ApiError;
use crate::api::RestClient;
use crate::api::odata_value;
use crate::auth::AuthService;
use crate::config::ConfigError;
use crate::config::FabricMcpConfig;

/// Service name used in Power BI error messages.
const SERVICE: &str = "Power BI";

// ============================================================================
// SECTION: API Seam
// ============================================================================

/// Power BI REST API operations used by the tool router.
pub trait PowerBiApi: Send + Sync {
    /// Lists datasets visible to the service principal.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on auth or upstream failure.
    fn list_datasets(&self) -> Result<Value, ApiError>;

    /// Fetches a single dataset by id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on auth or upstream failure.
    fn get_dataset(&self, dataset_id: &str) -> Result<Value, ApiError>;

    /// Executes a DAX query against a dataset.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on auth or upstream failure.
    fn execute_dax_query(&self, dataset_id: &str, query: &str) -> Result<Value, ApiError>;

    /// Initiates an asynchronous dataset refresh.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on auth or upstream failure.
    fn refresh_dataset(&self, dataset_id: &str) -> Result<(), ApiError>;

    /// Lists workspaces (groups) visible to the service principal.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on auth or upstream failure.
    fn list_workspaces(&self) -> Result<Value, ApiError>;
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Blocking Power BI REST client.
pub struct PowerBiClient {
    /// Shared bearer-authenticated transport.
    rest: RestClient,
    /// Workspace scoping for dataset listing, when configured.
    workspace_id: Option<String>,
}

impl PowerBiClient {
    /// Builds the client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the HTTP client cannot be constructed.
    pub fn from_config(
        config: &FabricMcpConfig,
        auth: Arc<AuthService>,
    ) -> Result<Self, ConfigError> {
        let rest = RestClient::new(
            SERVICE,
            config.powerbi_base_url(),
            config.powerbi_scope(),
            auth,
            &config.http,
        )?;
        Ok(Self {
            rest,
            workspace_id: config.powerbi.workspace_id.clone(),
        })
    }
}

impl PowerBiApi for PowerBiClient {
    fn list_datasets(&self) -> Result<Value, ApiError> {
        let path = self.workspace_id.as_ref().map_or_else(
            || "/datasets".to_string(),
            |workspace_id| format!("/groups/{workspace_id}/datasets"),
        );
        let body = self.rest.get(&path)?;
        odata_value(SERVICE, body)
    }

    fn get_dataset(&self, dataset_id: &str) -> Result<Value, ApiError> {
        self.rest.get(&format!("/datasets/{dataset_id}"))
    }

    fn execute_dax_query(&self, dataset_id: &str, query: &str) -> Result<Value, ApiError> {
        let payload = json!({
            "queries": [
                { "query": query }
            ]
        });
        self.rest.post(&format!("/datasets/{dataset_id}/executeQueries"), &payload)
    }

    fn refresh_dataset(&self, dataset_id: &str) -> Result<(), ApiError> {
        self.rest.post(&format!("/datasets/{dataset_id}/refreshes"), &json!({}))?;
        Ok(())
    }

    fn list_workspaces(&self) -> Result<Value, ApiError> {
        let body = self.rest.get("/groups")?;
        odata_value(SERVICE, body)
    }
}
