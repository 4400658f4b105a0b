use crate::db::{self, Store, KEY_REPORTS, KEY_TEACHERS, KEY_TENURE_REPORTS};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    load_reports, load_teachers, required_param, required_str, save, store, store_mut,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Teacher, TenureReport};
use crate::normalize::{normalize_echelon, normalize_teacher_dates};
use crate::sheet::Cell;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    match load_teachers(store, req) {
        Ok(teachers) => ok(
            &req.id,
            json!({ "count": teachers.len(), "teachers": teachers }),
        ),
        Err(e) => e,
    }
}

fn handle_teachers_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut teacher: Teacher = match required_param(req, "teacher") {
        Ok(t) => t,
        Err(e) => return e,
    };
    if teacher.name.trim().is_empty() {
        return err(&req.id, "bad_params", "teacher.name must not be empty", None);
    }
    if teacher.id.trim().is_empty() {
        teacher.id = Uuid::new_v4().to_string();
    }
    teacher.echelon = match normalize_echelon(&Cell::from(teacher.echelon.as_str())) {
        Some(e) => e,
        None => {
            return err(
                &req.id,
                "bad_params",
                "teacher.echelon must be an integer in 1..=12",
                Some(json!({ "echelon": teacher.echelon })),
            )
        }
    };
    normalize_teacher_dates(&mut teacher);

    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let mut teachers = match load_teachers(&*store, req) {
        Ok(t) => t,
        Err(e) => return e,
    };
    let created = match teachers.iter_mut().find(|t| t.id == teacher.id) {
        Some(existing) => {
            *existing = teacher.clone();
            false
        }
        None => {
            teachers.push(teacher.clone());
            true
        }
    };
    if let Err(e) = save(store, req, KEY_TEACHERS, &teachers) {
        return e;
    }

    state.debouncer.touch(Instant::now());
    ok(
        &req.id,
        json!({ "teacherId": teacher.id, "created": created, "teacher": teacher }),
    )
}

/// Removes the teacher together with their report and tenure report.
fn handle_teachers_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let mut teachers = match load_teachers(&*store, req) {
        Ok(t) => t,
        Err(e) => return e,
    };
    let before = teachers.len();
    teachers.retain(|t| t.id != teacher_id);
    if teachers.len() == before {
        return err(
            &req.id,
            "not_found",
            "teacher not found",
            Some(json!({ "teacherId": teacher_id })),
        );
    }
    let mut reports = match load_reports(&*store, req) {
        Ok(r) => r,
        Err(e) => return e,
    };
    reports.remove(&teacher_id);
    let mut tenure: BTreeMap<String, TenureReport> =
        match db::load_or_default(&*store, KEY_TENURE_REPORTS) {
            Ok(t) => t,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
    tenure.remove(&teacher_id);

    let entries = match (
        serde_json::to_value(&teachers),
        serde_json::to_value(&reports),
        serde_json::to_value(&tenure),
    ) {
        (Ok(t), Ok(r), Ok(n)) => [(KEY_TEACHERS, t), (KEY_REPORTS, r), (KEY_TENURE_REPORTS, n)],
        _ => return err(&req.id, "db_update_failed", "failed to encode collections", None),
    };
    if let Err(e) = store.set_many(&entries) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    state.debouncer.touch(Instant::now());
    ok(&req.id, json!({ "ok": true, "remaining": teachers.len() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.upsert" => Some(handle_teachers_upsert(state, req)),
        "teachers.delete" => Some(handle_teachers_delete(state, req)),
        _ => None,
    }
}
