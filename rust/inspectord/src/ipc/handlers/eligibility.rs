use crate::eligibility::{self, EligibilityFlags, InspectionPriority, PromotionRules};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{
    load_reports, load_teachers, optional_param, reference_date, required_str, store,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ReportData, Teacher};
use serde_json::json;

fn flags_json(
    teacher: &Teacher,
    flags: EligibilityFlags,
    rules: &PromotionRules,
) -> serde_json::Value {
    json!({
        "teacherId": teacher.id,
        "name": teacher.name,
        "priority": flags.priority,
        "promotionDue": flags.promotion_due,
        "nextEchelonDate": eligibility::next_echelon_date(teacher, rules)
            .map(|d| d.format("%Y-%m-%d").to_string()),
    })
}

/// Flags for one teacher. `params.activeReport` stands in for the stored
/// report while the inspector is still editing it.
fn handle_eligibility_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let now = match reference_date(req) {
        Ok(d) => d,
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
    let teachers = match load_teachers(store, req) {
        Ok(t) => t,
        Err(e) => return e,
    };
    let Some(teacher) = teachers.iter().find(|t| t.id == teacher_id) else {
        return err(
            &req.id,
            "not_found",
            "teacher not found",
            Some(json!({ "teacherId": teacher_id })),
        );
    };
    let mut reports = match load_reports(store, req) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let rules = match setup::promotion_rules(store) {
        Ok(r) => r,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let report = active
        .filter(|r| r.teacher_id == teacher_id)
        .or_else(|| reports.remove(&teacher_id));
    let flags = eligibility::evaluate(teacher, report.as_ref(), now, &rules);
    ok(&req.id, flags_json(teacher, flags, &rules))
}

fn handle_eligibility_scan(state: &mut AppState, req: &Request) -> serde_json::Value {
    let now = match reference_date(req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let store = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let (teachers, reports) = match (load_teachers(store, req), load_reports(store, req)) {
        (Ok(t), Ok(r)) => (t, r),
        (Err(e), _) | (_, Err(e)) => return e,
    };
    let rules = match setup::promotion_rules(store) {
        Ok(r) => r,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut urgent = 0usize;
    let mut medium = 0usize;
    let mut promotion = 0usize;
    let rows: Vec<serde_json::Value> = teachers
        .iter()
        .map(|t| {
            let flags = eligibility::evaluate(t, reports.get(&t.id), now, &rules);
            match flags.priority {
                InspectionPriority::Urgent => urgent += 1,
                InspectionPriority::Medium => medium += 1,
                InspectionPriority::None => {}
            }
            if flags.promotion_due {
                promotion += 1;
            }
            flags_json(t, flags, &rules)
        })
        .collect();

    ok(
        &req.id,
        json!({
            "now": now.format("%Y-%m-%d").to_string(),
            "urgentCount": urgent,
            "mediumCount": medium,
            "promotionDueCount": promotion,
            "rows": rows,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "eligibility.get" => Some(handle_eligibility_get(state, req)),
        "eligibility.scan" => Some(handle_eligibility_scan(state, req)),
        _ => None,
    }
}
