use crate::backup::{self, BackupDocument, BackupError};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, store, store_mut};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;

fn backup_err(req: &Request, e: anyhow::Error) -> serde_json::Value {
    let code = match e.downcast_ref::<BackupError>() {
        Some(BackupError::UnsupportedFormat(_)) => "unsupported_format",
        Some(BackupError::InvalidDocument(_)) => "invalid_backup",
        Some(BackupError::MissingEntry(_)) => "invalid_backup",
        Some(BackupError::ChecksumMismatch { .. }) => "checksum_mismatch",
        None => "io_failed",
    };
    err(&req.id, code, format!("{e:#}"), None)
}

fn handle_backup_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let store = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let doc = match BackupDocument::collect(store) {
        Ok(d) => d,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    match backup::export_bundle(&doc, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "ok": true,
                "path": out_path.to_string_lossy(),
                "bundleFormat": summary.bundle_format,
                "entryCount": summary.entry_count,
                "sha256": summary.checksum,
            }),
        ),
        Err(e) => backup_err(req, e),
    }
}

/// Restores every collection from a bundle or bare JSON backup. Nothing is
/// written unless the whole document reads and verifies.
fn handle_backup_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match required_str(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let (doc, summary) = match backup::import_bundle(&in_path) {
        Ok(v) => v,
        Err(e) => return backup_err(req, e),
    };
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    if let Err(e) = doc.apply(store) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    state.debouncer.touch(Instant::now());
    ok(
        &req.id,
        json!({
            "ok": true,
            "bundleFormatDetected": summary.bundle_format_detected,
            "teacherCount": summary.teacher_count,
            "reportCount": summary.report_count,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_backup_export(state, req)),
        "backup.import" => Some(handle_backup_import(state, req)),
        _ => None,
    }
}
