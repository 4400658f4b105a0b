use crate::ipc::error::ok;
use crate::ipc::handlers::sheet::export_rows;
use crate::ipc::helpers::store;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::time::Instant;

fn handle_sync_touch(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.debouncer.touch(Instant::now());
    ok(
        &req.id,
        json!({
            "pending": true,
            "windowMs": state.debouncer.window().as_millis() as u64,
        }),
    )
}

/// Hands back the full mirror once edits have been quiet for the window, or
/// immediately with `force: true`. The pending edit is cleared only when rows
/// are returned.
fn handle_sync_poll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let force = req
        .params
        .get("force")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let pending = state.debouncer.is_pending();
    let due = pending && (force || state.debouncer.due(Instant::now()));
    if !due {
        return ok(&req.id, json!({ "due": false, "pending": pending }));
    }

    let store = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let rows = match export_rows(store, req, None) {
        Ok(r) => r,
        Err(e) => return e,
    };
    state.debouncer.mark_flushed();
    tracing::debug!(rows = rows.len(), "sync push due");
    ok(&req.id, json!({ "due": true, "pending": false, "rows": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.touch" => Some(handle_sync_touch(state, req)),
        "sync.poll" => Some(handle_sync_poll(state, req)),
        _ => None,
    }
}
