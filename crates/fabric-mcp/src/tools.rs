// crates/fabric-mcp/src/tools.rs
// ============================================================================
// Module: Tool Router
// Description: Dispatches validated tool calls to the upstream API clients.
// Purpose: Keep the protocol boundary total; failures become error results.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The router owns the full lifecycle of a tool invocation: name resolution,
//! schema validation, typed decoding, dispatch to the bound API client, and
//! result envelope construction. Every invocation produces a well-formed
//! [`ToolResult`]; handler failures of any kind are folded into an error
//! result and never escape as raw errors. Invocations are independent and
//! share no state beyond the token cache inside the clients.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::api::ApiError;
use crate::audit::AuditSink;
use crate::audit::ToolAuditEvent;
use crate::audit::ToolOutcome;
use crate::contract::ToolDefinition;
use crate::contract::ToolName;
use crate::contract::ToolResult;
use crate::contract::tool_definitions;
use crate::fabric::FabricApi;
use crate::powerbi::PowerBiApi;
use crate::validation::ToolInputValidator;
use crate::validation::ValidationError;

// ============================================================================
// SECTION: Tool Requests
// ============================================================================

/// Arguments for `execute_dax_query`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ExecuteDaxQueryRequest {
    /// Dataset identifier.
    dataset_id: String,
    /// DAX query text.
    query: String,
}

/// Arguments for `refresh_dataset`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RefreshDatasetRequest {
    /// Dataset identifier.
    dataset_id: String,
}

/// Arguments for `create_notebook`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateNotebookRequest {
    /// Fabric workspace identifier.
    workspace_id: String,
    /// Display name for the notebook.
    name: String,
    /// Notebook definition payload.
    content: Value,
}

/// Arguments for `upload_to_datawarehouse`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UploadToDataWarehouseRequest {
    /// Fabric workspace identifier.
    workspace_id: String,
    /// Data warehouse identifier.
    warehouse_id: String,
    /// Destination table name.
    table_name: String,
    /// Rows to append.
    data: Value,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool routing errors. All variants fold into an error result at the
/// protocol boundary.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool name not recognized.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// Arguments violated the tool input schema.
    #[error(transparent)]
    InvalidParams(#[from] ValidationError),
    /// Arguments passed the schema but failed typed decoding.
    #[error("invalid parameters: {0}")]
    Decode(String),
    /// Auth or upstream API failure.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Response payload serialization failed.
    #[error("serialization failure: {0}")]
    Serialization(String),
}

// ============================================================================
// SECTION: Tool Router
// ============================================================================

/// Tool router bound to the Power BI and Fabric API seams.
pub struct ToolRouter {
    /// Power BI API client.
    powerbi: Arc<dyn PowerBiApi>,
    /// Fabric API client.
    fabric: Arc<dyn FabricApi>,
    /// Compiled input validators.
    validator: ToolInputValidator,
    /// Audit sink receiving one event per invocation.
    audit: Arc<dyn AuditSink>,
}

impl ToolRouter {
    /// Creates a router over the given API clients and audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a catalog schema does not compile.
    pub fn new(
        powerbi: Arc<dyn PowerBiApi>,
        fabric: Arc<dyn FabricApi>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            powerbi,
            fabric,
            validator: ToolInputValidator::new()?,
            audit,
        })
    }

    /// Lists the tools supported by this server.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Executes a tool call and returns the result envelope.
    ///
    /// Failures at any stage (unknown name, schema violation, auth, upstream)
    /// become an error result; the caller always receives a well-formed
    /// envelope.
    pub fn call_tool(&self, name: &str, arguments: &Value) -> ToolResult {
        match self.invoke(name, arguments) {
            Ok(text) => {
                self.audit.record(&ToolAuditEvent::new(name, ToolOutcome::Succeeded, None));
                ToolResult::text(text)
            }
            Err(err) => {
                let message = err.to_string();
                self.audit.record(&ToolAuditEvent::new(
                    name,
                    ToolOutcome::Failed,
                    Some(message.clone()),
                ));
                ToolResult::error(&message)
            }
        }
    }

    /// Resolves, validates, and dispatches a single invocation.
    fn invoke(&self, name: &str, arguments: &Value) -> Result<String, ToolError> {
        let tool =
            ToolName::parse(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        self.validator.validate(tool, arguments)?;
        match tool {
            ToolName::GetPowerBiDatasets => {
                let datasets = self.powerbi.list_datasets()?;
                pretty(&datasets)
            }
            ToolName::ExecuteDaxQuery => {
                let request: ExecuteDaxQueryRequest = decode(arguments)?;
                let result = self.powerbi.execute_dax_query(&request.dataset_id, &request.query)?;
                pretty(&result)
            }
            ToolName::RefreshDataset => {
                let request: RefreshDatasetRequest = decode(arguments)?;
                self.powerbi.refresh_dataset(&request.dataset_id)?;
                Ok(format!("Dataset {} refresh initiated successfully", request.dataset_id))
            }
            ToolName::GetWorkspaces => {
                let workspaces = self.powerbi.list_workspaces()?;
                pretty(&workspaces)
            }
            ToolName::CreateNotebook => {
                let request: CreateNotebookRequest = decode(arguments)?;
                let notebook = self.fabric.create_notebook(
                    &request.workspace_id,
                    &request.name,
                    &request.content,
                )?;
                pretty(&notebook)
            }
            ToolName::UploadToDataWarehouse => {
                let request: UploadToDataWarehouseRequest = decode(arguments)?;
                self.fabric.upload_rows(
                    &request.workspace_id,
                    &request.warehouse_id,
                    &request.table_name,
                    &request.data,
                )?;
                Ok(format!("Data uploaded successfully to {}", request.table_name))
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes validated arguments into a typed request.
fn decode<T: serde::de::DeserializeOwned>(arguments: &Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments.clone()).map_err(|err| ToolError::Decode(err.to_string()))
}

/// Pretty-prints a JSON payload for a text content block.
fn pretty(value: &Value) -> Result<String, ToolError> {
    serde_json::to_string_pretty(value).map_err(|err| ToolError::Serialization(err.to_string()))
}
