use crate::db::{self, Store, KEY_REPORTS, KEY_TEACHERS, KEY_TENURE_REPORTS};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{
    load_reports, load_teachers, optional_param, optional_str, store, store_mut,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ReportData, TenureReport};
use crate::sheet::{self, csv, Row};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetFormat {
    Rows,
    Csv,
}

fn parse_format(req: &Request) -> Result<SheetFormat, serde_json::Value> {
    match optional_str(req, "format").map(|s| s.to_ascii_lowercase()).as_deref() {
        None | Some("rows") => Ok(SheetFormat::Rows),
        Some("csv") => Ok(SheetFormat::Csv),
        Some(other) => Err(err(
            &req.id,
            "bad_params",
            "format must be one of: rows, csv",
            Some(json!({ "format": other })),
        )),
    }
}

/// Builds the full tabular mirror from the workspace. Shared with the sync
/// poll, which pushes the same rows.
pub(crate) fn export_rows(
    store: &dyn Store,
    req: &Request,
    active_report: Option<&ReportData>,
) -> Result<Vec<Row>, serde_json::Value> {
    let teachers = load_teachers(store, req)?;
    let reports = load_reports(store, req)?;
    let settings = setup::sync_settings(store)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    Ok(sheet::serialize(
        &teachers,
        active_report,
        Some(&reports),
        Some(&settings.defaults),
    ))
}

fn handle_sheet_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let format = match parse_format(req) {
        Ok(f) => f,
        Err(e) => return e,
    };
    let active: Option<ReportData> = match optional_param(req, "activeReport") {
        Ok(r) => r,
        Err(e) => return e,
    };
    let store = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let rows = match export_rows(store, req, active.as_ref()) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let row_count = rows.len();

    match format {
        SheetFormat::Rows => ok(&req.id, json!({ "rowCount": row_count, "rows": rows })),
        SheetFormat::Csv => {
            let text = csv::rows_to_csv(&rows);
            let Some(out_path) = optional_str(req, "outPath") else {
                return ok(&req.id, json!({ "rowCount": row_count, "csv": text }));
            };
            if let Err(e) = std::fs::write(out_path, text.as_bytes()) {
                return err(
                    &req.id,
                    "io_failed",
                    e.to_string(),
                    Some(json!({ "outPath": out_path })),
                );
            }
            tracing::info!(path = out_path, rows = row_count, "sheet exported as csv");
            ok(&req.id, json!({ "rowCount": row_count, "outPath": out_path }))
        }
    }
}

/// Input rows from `params.rows`, `params.csvText` or `params.csvPath`, in
/// that order of preference.
fn input_rows(req: &Request) -> Result<Vec<Row>, serde_json::Value> {
    if let Some(rows) = optional_param::<Vec<Row>>(req, "rows")? {
        return Ok(rows);
    }
    if let Some(text) = req.params.get("csvText").and_then(|v| v.as_str()) {
        return Ok(csv::csv_to_rows(text));
    }
    if let Some(path) = optional_str(req, "csvPath") {
        let text = std::fs::read_to_string(Path::new(path)).map_err(|e| {
            err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "csvPath": path })),
            )
        })?;
        return Ok(csv::csv_to_rows(&text));
    }
    Err(err(
        &req.id,
        "bad_params",
        "one of rows, csvText, csvPath is required",
        None,
    ))
}

/// Parses a sheet. Without `apply` this is a preview; with `apply: true` the
/// teacher and report collections are replaced in one transaction, and tenure
/// reports of teachers absent from the sheet are dropped with them.
fn handle_sheet_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match input_rows(req) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let apply = req
        .params
        .get("apply")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let parsed = sheet::parse(&rows);
    let summary = json!({
        "rowCount": rows.len(),
        "teacherCount": parsed.teachers.len(),
        "reportCount": parsed.reports_by_teacher_id.len(),
        "warnings": parsed.warnings,
    });
    if !apply {
        return ok(
            &req.id,
            json!({
                "applied": false,
                "summary": summary,
                "teachers": parsed.teachers,
            }),
        );
    }

    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let mut tenure: BTreeMap<String, TenureReport> =
        match db::load_or_default(&*store, KEY_TENURE_REPORTS) {
            Ok(t) => t,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
    let present: HashSet<&str> = parsed.teachers.iter().map(|t| t.id.as_str()).collect();
    let tenure_before = tenure.len();
    tenure.retain(|id, _| present.contains(id.as_str()));

    let entries = match (
        serde_json::to_value(&parsed.teachers),
        serde_json::to_value(&parsed.reports_by_teacher_id),
        serde_json::to_value(&tenure),
    ) {
        (Ok(t), Ok(r), Ok(n)) => [(KEY_TEACHERS, t), (KEY_REPORTS, r), (KEY_TENURE_REPORTS, n)],
        _ => return err(&req.id, "db_update_failed", "failed to encode sheet", None),
    };
    if let Err(e) = store.set_many(&entries) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    // The store now mirrors the sheet it was read from.
    state.debouncer.mark_flushed();
    tracing::info!(
        teachers = parsed.teachers.len(),
        warnings = parsed.warnings.len(),
        tenure_dropped = tenure_before - tenure.len(),
        "sheet imported"
    );
    ok(&req.id, json!({ "applied": true, "summary": summary }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sheet.export" => Some(handle_sheet_export(state, req)),
        "sheet.import" => Some(handle_sheet_import(state, req)),
        _ => None,
    }
}
