// crates/fabric-mcp/src/fabric.rs
// ============================================================================
// Module: Fabric Client
// Description: Microsoft Fabric REST API surface for workspaces and items.
// Purpose: Map notebook and warehouse operations onto the Fabric REST API.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The [`FabricApi`] trait is the seam the tool router binds against; the
//! [`FabricClient`] implementation maps each operation to a Fabric REST
//! endpoint with the Fabric scope token attached per call.

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

/// Service name used in Fabric error messages.
const SERVICE: &str = "Fabric";

// ============================================================================
// SECTION: API Seam
// ============================================================================

/// Fabric REST API operations used by the tool router.
pub trait FabricApi: Send + Sync {
    /// Lists Fabric workspaces visible to the service principal.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on auth or upstream failure.
    fn list_workspaces(&self) -> Result<Value, ApiError>;

    /// Creates a notebook in a workspace from a caller-supplied definition.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on auth or upstream failure.
    fn create_notebook(
        &self,
        workspace_id: &str,
        name: &str,
        definition: &Value,
    ) -> Result<Value, ApiError>;

    /// Triggers execution of an existing notebook.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on auth or upstream failure.
    fn execute_notebook(&self, workspace_id: &str, notebook_id: &str) -> Result<Value, ApiError>;

    /// Appends rows to a data warehouse table.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on auth or upstream failure.
    fn upload_rows(
        &self,
        workspace_id: &str,
        warehouse_id: &str,
        table_name: &str,
        rows: &Value,
    ) -> Result<(), ApiError>;

    /// Lists data warehouses in a workspace.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on auth or upstream failure.
    fn list_warehouses(&self, workspace_id: &str) -> Result<Value, ApiError>;
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Blocking Fabric REST client.
pub struct FabricClient {
    /// Shared bearer-authenticated transport.
    rest: RestClient,
}

impl FabricClient {
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
            config.fabric_base_url(),
            config.fabric_scope(),
            auth,
            &config.http,
        )?;
        Ok(Self {
            rest,
        })
    }
}

impl FabricApi for FabricClient {
    fn list_workspaces(&self) -> Result<Value, ApiError> {
        let body = self.rest.get("/workspaces")?;
        odata_value(SERVICE, body)
    }

    fn create_notebook(
        &self,
        workspace_id: &str,
        name: &str,
        definition: &Value,
    ) -> Result<Value, ApiError> {
        let payload = json!({
            "displayName": name,
            "definition": definition,
        });
        self.rest.post(&format!("/workspaces/{workspace_id}/notebooks"), &payload)
    }

    fn execute_notebook(&self, workspace_id: &str, notebook_id: &str) -> Result<Value, ApiError> {
        self.rest.post(
            &format!("/workspaces/{workspace_id}/notebooks/{notebook_id}/execute"),
            &json!({}),
        )
    }

    fn upload_rows(
        &self,
        workspace_id: &str,
        warehouse_id: &str,
        table_name: &str,
        rows: &Value,
    ) -> Result<(), ApiError> {
        let payload = json!({ "rows": rows });
        self.rest.post(
            &format!("/workspaces/{workspace_id}/datawarehouses/{warehouse_id}/tables/{table_name}/rows"),
            &payload,
        )?;
        Ok(())
    }

    fn list_warehouses(&self, workspace_id: &str) -> Result<Value, ApiError> {
        let body = self.rest.get(&format!("/workspaces/{workspace_id}/datawarehouses"))?;
        odata_value(SERVICE, body)
    }
}
