use crate::db::SqliteStore;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::types::{AppState, Request};
use crate::schema::catalog;
use crate::sync::SyncDebouncer;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "schemaVersion": catalog().version(),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let store = match SqliteStore::open(&path) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
    };
    let debounce = match setup::sync_settings(&store) {
        Ok(s) => s.debounce,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    tracing::info!(workspace = %path.to_string_lossy(), "workspace opened");
    state.workspace = Some(path.clone());
    state.store = Some(store);
    state.debouncer = SyncDebouncer::new(debounce);
    ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
