use crate::db::{self, KEY_REPORTS, KEY_TENURE_REPORTS};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    load_reports, load_teachers, required_param, required_str, save, store, store_mut,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ReportData, TenureReport};
use crate::normalize::{normalize_report_dates, normalize_tenure_dates};
use crate::schema::observation_template;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

fn teacher_exists(
    state: &AppState,
    req: &Request,
    teacher_id: &str,
) -> Result<(), serde_json::Value> {
    let store = store(state, req)?;
    if load_teachers(store, req)?.iter().any(|t| t.id == teacher_id) {
        Ok(())
    } else {
        Err(err(
            &req.id,
            "not_found",
            "teacher not found",
            Some(json!({ "teacherId": teacher_id })),
        ))
    }
}

fn load_tenure(
    state: &AppState,
    req: &Request,
) -> Result<BTreeMap<String, TenureReport>, serde_json::Value> {
    db::load_or_default(store(state, req)?, KEY_TENURE_REPORTS)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

/// The stored report, or a fresh one with every observation template when the
/// teacher has none yet.
fn handle_reports_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = teacher_exists(state, req, &teacher_id) {
        return e;
    }
    let store = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let mut reports = match load_reports(store, req) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let (report, stored) = match reports.remove(&teacher_id) {
        Some(r) => (r, true),
        None => (ReportData::empty(&teacher_id), false),
    };
    ok(&req.id, json!({ "report": report, "stored": stored }))
}

fn handle_reports_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut report: ReportData = match required_param(req, "report") {
        Ok(r) => r,
        Err(e) => return e,
    };
    if report.teacher_id.trim().is_empty() {
        return err(&req.id, "bad_params", "report.teacherId must not be empty", None);
    }
    if let Err(e) = teacher_exists(state, req, &report.teacher_id) {
        return e;
    }
    if let Some(unknown) = report
        .observations
        .iter()
        .find(|o| observation_template(&o.template_id).is_none())
    {
        return err(
            &req.id,
            "bad_params",
            "unknown observation template",
            Some(json!({ "templateId": unknown.template_id })),
        );
    }
    if report.id.trim().is_empty() {
        report.id = Uuid::new_v4().to_string();
    }
    report.fill_missing_observations();
    normalize_report_dates(&mut report);

    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let mut reports = match load_reports(&*store, req) {
        Ok(r) => r,
        Err(e) => return e,
    };
    reports.insert(report.teacher_id.clone(), report.clone());
    if let Err(e) = save(store, req, KEY_REPORTS, &reports) {
        return e;
    }

    state.debouncer.touch(Instant::now());
    ok(&req.id, json!({ "report": report }))
}

fn handle_tenure_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match load_tenure(state, req) {
        Ok(mut all) => ok(&req.id, json!({ "tenureReport": all.remove(&teacher_id) })),
        Err(e) => e,
    }
}

fn handle_tenure_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut report: TenureReport = match required_param(req, "tenureReport") {
        Ok(r) => r,
        Err(e) => return e,
    };
    if let Err(e) = teacher_exists(state, req, &report.teacher_id) {
        return e;
    }
    if report.id.trim().is_empty() {
        report.id = Uuid::new_v4().to_string();
    }
    normalize_tenure_dates(&mut report);

    let mut all = match load_tenure(state, req) {
        Ok(t) => t,
        Err(e) => return e,
    };
    all.insert(report.teacher_id.clone(), report.clone());
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    if let Err(e) = save(store, req, KEY_TENURE_REPORTS, &all) {
        return e;
    }
    ok(&req.id, json!({ "tenureReport": report }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.get" => Some(handle_reports_get(state, req)),
        "reports.upsert" => Some(handle_reports_upsert(state, req)),
        "tenure.get" => Some(handle_tenure_get(state, req)),
        "tenure.upsert" => Some(handle_tenure_upsert(state, req)),
        _ => None,
    }
}
