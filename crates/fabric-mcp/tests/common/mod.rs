// crates/fabric-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fakes and fixtures for Fabric MCP tests.
// Purpose: Provide deterministic API doubles without network access.
// Dependencies: fabric-mcp, serde_json
// ============================================================================

//! ## Overview
//! Trait-object fakes for the Power BI and Fabric API seams plus router
//! construction helpers. Fakes count invocations so tests can assert that
//! validation failures never reach a handler.

#![allow(
    dead_code,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Shared test helpers may be unused and assert by panicking."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use fabric_mcp::ApiError;
use fabric_mcp::FabricApi;
use fabric_mcp::NoopAuditSink;
use fabric_mcp::PowerBiApi;
use fabric_mcp::ToolContent;
use fabric_mcp::ToolResult;
use fabric_mcp::ToolRouter;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Power BI Fake
// ============================================================================

/// Power BI API double with call counting and a one-shot failure switch.
#[derive(Default)]
pub struct FakePowerBi {
    /// Total handler invocations observed.
    calls: AtomicUsize,
    /// When set, the next `list_workspaces` call fails once.
    fail_next_workspaces: AtomicBool,
}

impl FakePowerBi {
    /// Returns the number of handler invocations observed.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Arms a one-shot upstream failure for `list_workspaces`.
    pub fn fail_next_workspaces(&self) {
        self.fail_next_workspaces.store(true, Ordering::SeqCst);
    }
}

impl PowerBiApi for FakePowerBi {
    fn list_datasets(&self) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!([
            {"id": "ds-1", "name": "Sales", "isRefreshable": true},
            {"id": "ds-2", "name": "Inventory", "isRefreshable": false},
        ]))
    }

    fn get_dataset(&self, dataset_id: &str) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"id": dataset_id, "name": "Sales"}))
    }

    fn execute_dax_query(&self, dataset_id: &str, query: &str) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "results": [{
                "tables": [{"rows": [{"dataset": dataset_id, "query": query}]}],
            }],
        }))
    }

    fn refresh_dataset(&self, _dataset_id: &str) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list_workspaces(&self) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_workspaces.swap(false, Ordering::SeqCst) {
            return Err(ApiError::Status {
                service: "Power BI",
                status: 503,
                detail: "service unavailable".to_string(),
            });
        }
        Ok(json!([{"id": "ws-1", "name": "Analytics"}]))
    }
}

// ============================================================================
// SECTION: Fabric Fake
// ============================================================================

/// Fabric API double with call counting.
#[derive(Default)]
pub struct FakeFabric {
    /// Total handler invocations observed.
    calls: AtomicUsize,
}

impl FakeFabric {
    /// Returns the number of handler invocations observed.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FabricApi for FakeFabric {
    fn list_workspaces(&self) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!([{"id": "fw-1", "displayName": "Lakehouse", "type": "Workspace"}]))
    }

    fn create_notebook(
        &self,
        workspace_id: &str,
        name: &str,
        definition: &Value,
    ) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "id": "nb-1",
            "displayName": name,
            "workspaceId": workspace_id,
            "definition": definition,
        }))
    }

    fn execute_notebook(&self, workspace_id: &str, notebook_id: &str) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"workspaceId": workspace_id, "notebookId": notebook_id, "status": "Running"}))
    }

    fn upload_rows(
        &self,
        _workspace_id: &str,
        _warehouse_id: &str,
        _table_name: &str,
        _rows: &Value,
    ) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list_warehouses(&self, workspace_id: &str) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!([{"id": "wh-1", "displayName": "Main", "workspaceId": workspace_id}]))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a router over the provided fakes with audit disabled.
pub fn router(powerbi: Arc<FakePowerBi>, fabric: Arc<FakeFabric>) -> ToolRouter {
    match ToolRouter::new(powerbi, fabric, Arc::new(NoopAuditSink)) {
        Ok(router) => router,
        Err(err) => panic!("router construction failed: {err}"),
    }
}

/// Extracts the text of the first content block in a result.
pub fn result_text(result: &ToolResult) -> &str {
    match result.content.first() {
        Some(ToolContent::Text {
            text,
        }) => text,
        None => panic!("result has no content"),
    }
}
