// crates/fabric-mcp/src/contract.rs
// ============================================================================
// Module: MCP Tool Contracts
// Description: Canonical MCP tool names, schemas, and result envelopes.
// Purpose: Provide the fixed tool surface for MCP listings and dispatch.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines the canonical MCP tool surface: the closed set of tool
//! names, their input schemas, and the result envelope returned from every
//! invocation. Wire argument names are camelCase to match the protocol
//! surface agents already target. Tool inputs are untrusted; schemas here are
//! enforced by the validation layer before any handler runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Closed set of tool names exposed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ToolName {
    /// List Power BI datasets.
    GetPowerBiDatasets,
    /// Execute a DAX query against a dataset.
    ExecuteDaxQuery,
    /// Initiate a dataset refresh.
    RefreshDataset,
    /// List Power BI workspaces.
    GetWorkspaces,
    /// Create a Fabric notebook.
    CreateNotebook,
    /// Upload rows to a Fabric data warehouse table.
    UploadToDataWarehouse,
}

impl ToolName {
    /// Returns the canonical string name for the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetPowerBiDatasets => "get_powerbi_datasets",
            Self::ExecuteDaxQuery => "execute_dax_query",
            Self::RefreshDataset => "refresh_dataset",
            Self::GetWorkspaces => "get_workspaces",
            Self::CreateNotebook => "create_notebook",
            Self::UploadToDataWarehouse => "upload_to_datawarehouse",
        }
    }

    /// Parses a tool name from its canonical string form.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "get_powerbi_datasets" => Some(Self::GetPowerBiDatasets),
            "execute_dax_query" => Some(Self::ExecuteDaxQuery),
            "refresh_dataset" => Some(Self::RefreshDataset),
            "get_workspaces" => Some(Self::GetWorkspaces),
            "create_notebook" => Some(Self::CreateNotebook),
            "upload_to_datawarehouse" => Some(Self::UploadToDataWarehouse),
            _ => None,
        }
    }

    /// Returns every tool in canonical listing order.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::GetPowerBiDatasets,
            Self::ExecuteDaxQuery,
            Self::RefreshDataset,
            Self::GetWorkspaces,
            Self::CreateNotebook,
            Self::UploadToDataWarehouse,
        ]
    }
}

// ============================================================================
// SECTION: Tool Definitions
// ============================================================================

/// Tool definition shape used by MCP tool listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Canonical tool name.
    pub name: String,
    /// Human-readable tool description.
    pub description: String,
    /// JSON schema for the tool arguments.
    pub input_schema: Value,
}

/// Returns the canonical tool definitions in listing order.
///
/// The order is intentional and preserved in listings; append new tools at
/// the end.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::all()
        .into_iter()
        .map(|name| ToolDefinition {
            name: name.as_str().to_string(),
            description: tool_description(name).to_string(),
            input_schema: tool_input_schema(name),
        })
        .collect()
}

/// Returns the description for a tool.
#[must_use]
pub const fn tool_description(name: ToolName) -> &'static str {
    match name {
        ToolName::GetPowerBiDatasets => {
            "Get all Power BI datasets visible to the service principal, scoped to the \
             configured workspace when one is set."
        }
        ToolName::ExecuteDaxQuery => {
            "Execute a DAX query against a Power BI dataset and return the result tables."
        }
        ToolName::RefreshDataset => "Trigger an asynchronous refresh of a Power BI dataset.",
        ToolName::GetWorkspaces => "Get all Power BI workspaces visible to the service principal.",
        ToolName::CreateNotebook => {
            "Create a notebook in a Microsoft Fabric workspace from a caller-supplied definition."
        }
        ToolName::UploadToDataWarehouse => {
            "Upload rows of data to a table in a Microsoft Fabric data warehouse."
        }
    }
}

/// Builds the input schema for a tool.
#[must_use]
pub fn tool_input_schema(name: ToolName) -> Value {
    match name {
        ToolName::GetPowerBiDatasets | ToolName::GetWorkspaces => object_schema(&json!({}), &[]),
        ToolName::ExecuteDaxQuery => object_schema(
            &json!({
                "datasetId": schema_string("Dataset identifier."),
                "query": schema_string("DAX query text to execute."),
            }),
            &["datasetId", "query"],
        ),
        ToolName::RefreshDataset => object_schema(
            &json!({
                "datasetId": schema_string("Dataset identifier."),
            }),
            &["datasetId"],
        ),
        ToolName::CreateNotebook => object_schema(
            &json!({
                "workspaceId": schema_string("Fabric workspace identifier."),
                "name": schema_string("Display name for the notebook."),
                "content": {
                    "description": "Notebook definition payload."
                },
            }),
            &["workspaceId", "name", "content"],
        ),
        ToolName::UploadToDataWarehouse => object_schema(
            &json!({
                "workspaceId": schema_string("Fabric workspace identifier."),
                "warehouseId": schema_string("Data warehouse identifier."),
                "tableName": schema_string("Destination table name."),
                "data": {
                    "type": "array",
                    "description": "Rows to append to the table."
                },
            }),
            &["workspaceId", "warehouseId", "tableName", "data"],
        ),
    }
}

// ============================================================================
// SECTION: Result Envelope
// ============================================================================

/// Content block inside a tool result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Plain text content.
    Text {
        /// Text payload.
        text: String,
    },
}

/// Result envelope returned for every tool invocation.
///
/// Handler failures are carried inside this envelope with `is_error` set;
/// they never surface as JSON-RPC protocol errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Ordered content blocks.
    pub content: Vec<ToolContent>,
    /// Whether the invocation failed.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    /// Builds a successful text result.
    #[must_use]
    pub fn text(text: String) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text,
            }],
            is_error: false,
        }
    }

    /// Builds a failed result with the conventional error prefix.
    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: format!("Error: {message}"),
            }],
            is_error: true,
        }
    }
}

// ============================================================================
// SECTION: Schema Helpers
// ============================================================================

/// Builds a strict object schema with the given properties and required set.
fn object_schema(properties: &Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Builds a described string schema.
fn schema_string(description: &str) -> Value {
    json!({
        "type": "string",
        "minLength": 1,
        "description": description,
    })
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

    use serde_json::Value;

    use super::ToolName;
    use super::ToolResult;
    use super::tool_definitions;

    #[test]
    fn names_round_trip_through_parse() {
        for name in ToolName::all() {
            assert_eq!(ToolName::parse(name.as_str()), Some(name));
        }
        assert_eq!(ToolName::parse("unknown_tool"), None);
    }

    #[test]
    fn definitions_cover_the_catalog_in_order() {
        let definitions = tool_definitions();
        assert_eq!(definitions.len(), 6);
        let names: Vec<&str> = definitions.iter().map(|def| def.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "get_powerbi_datasets",
                "execute_dax_query",
                "refresh_dataset",
                "get_workspaces",
                "create_notebook",
                "upload_to_datawarehouse",
            ]
        );
        for definition in &definitions {
            assert!(!definition.description.is_empty());
            assert_eq!(definition.input_schema["type"], "object");
        }
    }

    #[test]
    fn required_sets_match_the_catalog() {
        let required_for = |tool: &str| -> Vec<String> {
            let definitions = tool_definitions();
            let definition = definitions.iter().find(|def| def.name == tool).unwrap();
            definition.input_schema["required"]
                .as_array()
                .unwrap()
                .iter()
                .map(|value| value.as_str().unwrap().to_string())
                .collect()
        };
        assert!(required_for("get_powerbi_datasets").is_empty());
        assert_eq!(required_for("execute_dax_query"), vec!["datasetId", "query"]);
        assert_eq!(required_for("refresh_dataset"), vec!["datasetId"]);
        assert!(required_for("get_workspaces").is_empty());
        assert_eq!(required_for("create_notebook"), vec!["workspaceId", "name", "content"]);
        assert_eq!(
            required_for("upload_to_datawarehouse"),
            vec!["workspaceId", "warehouseId", "tableName", "data"]
        );
    }

    #[test]
    fn definition_serializes_with_camel_case_schema_key() {
        let definitions = tool_definitions();
        let value = serde_json::to_value(&definitions[0]).unwrap();
        assert!(value.get("inputSchema").is_some());
        assert!(value.get("input_schema").is_none());
    }

    #[test]
    fn error_results_carry_the_conventional_prefix() {
        let result = ToolResult::error("something broke");
        assert!(result.is_error);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], Value::Bool(true));
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "Error: something broke");
    }
}
