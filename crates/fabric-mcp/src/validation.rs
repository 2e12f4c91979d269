// crates/fabric-mcp/src/validation.rs
// ============================================================================
// Module: Tool Input Validation
// Description: Schema validation of tool arguments before dispatch.
// Purpose: Reject malformed tool calls before any upstream request is made.
// Dependencies: jsonschema, serde_json
// ============================================================================

//! ## Overview
//! Tool arguments are untrusted and validated against the canonical input
//! schemas before a handler runs. Schemas are compiled once at construction;
//! a validation failure names the violating path and field and guarantees no
//! upstream HTTP request is issued for that invocation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

use crate::contract::ToolName;
use crate::contract::tool_input_schema;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool argument validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Arguments violated the tool input schema.
    #[error("invalid arguments for {tool}: {detail}")]
    Invalid {
        /// Canonical tool name.
        tool: &'static str,
        /// Violating path and constraint description.
        detail: String,
    },
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Compiled input validators for the full tool catalog.
pub struct ToolInputValidator {
    /// Compiled schema per tool.
    validators: BTreeMap<ToolName, Validator>,
}

impl ToolInputValidator {
    /// Compiles every tool input schema.
    ///
    /// Compilation failure is a programming error in the catalog, surfaced as
    /// [`ValidationError`] so construction stays fallible rather than
    /// panicking.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a catalog schema does not compile.
    pub fn new() -> Result<Self, ValidationError> {
        let mut validators = BTreeMap::new();
        for tool in ToolName::all() {
            let schema = tool_input_schema(tool);
            let validator = compile_schema(tool, &schema)?;
            validators.insert(tool, validator);
        }
        Ok(Self {
            validators,
        })
    }

    /// Validates tool arguments against the compiled schema.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the violating path on failure.
    pub fn validate(&self, tool: ToolName, arguments: &Value) -> Result<(), ValidationError> {
        let Some(validator) = self.validators.get(&tool) else {
            return Err(ValidationError::Invalid {
                tool: tool.as_str(),
                detail: "no compiled schema".to_string(),
            });
        };
        validator.validate(arguments).map_err(|err| {
            let path = err.instance_path().to_string();
            let location = if path.is_empty() { "arguments".to_string() } else { path };
            ValidationError::Invalid {
                tool: tool.as_str(),
                detail: format!("{location}: {err}"),
            }
        })
    }
}

/// Compiles a tool input schema for validation.
fn compile_schema(tool: ToolName, schema: &Value) -> Result<Validator, ValidationError> {
    jsonschema::options().with_draft(Draft::Draft202012).build(schema).map_err(|err| {
        ValidationError::Invalid {
            tool: tool.as_str(),
            detail: format!("invalid schema: {err}"),
        }
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
