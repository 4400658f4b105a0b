use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::db::{self, SqliteStore, Store, KEY_REPORTS, KEY_TEACHERS};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::{ReportData, Teacher};
use crate::normalize::parse_date;

pub(crate) fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub(crate) fn optional_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Deserializes `params[key]` when present; `Ok(None)` when absent or null.
pub(crate) fn optional_param<T: DeserializeOwned>(
    req: &Request,
    key: &str,
) -> Result<Option<T>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| err(&req.id, "bad_params", format!("invalid {}: {}", key, e), None)),
    }
}

pub(crate) fn required_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, Value> {
    optional_param(req, key)?
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub(crate) fn store<'a>(state: &'a AppState, req: &Request) -> Result<&'a SqliteStore, Value> {
    state
        .store
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub(crate) fn store_mut<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut SqliteStore, Value> {
    state
        .store
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// `params.now` as a date, or today's local date.
pub(crate) fn reference_date(req: &Request) -> Result<NaiveDate, Value> {
    match optional_str(req, "now") {
        None => Ok(chrono::Local::now().date_naive()),
        Some(s) => parse_date(s).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "now must be a date",
                Some(serde_json::json!({ "now": s })),
            )
        }),
    }
}

pub(crate) fn load_teachers(store: &dyn Store, req: &Request) -> Result<Vec<Teacher>, Value> {
    db::load_or_default(store, KEY_TEACHERS)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

pub(crate) fn load_reports(
    store: &dyn Store,
    req: &Request,
) -> Result<BTreeMap<String, ReportData>, Value> {
    db::load_or_default(store, KEY_REPORTS)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

pub(crate) fn save<T: Serialize>(
    store: &mut dyn Store,
    req: &Request,
    key: &str,
    value: &T,
) -> Result<(), Value> {
    db::save(store, key, value).map_err(|e| err(&req.id, "db_update_failed", e.to_string(), None))
}
