use crate::db::{self, Store};
use crate::eligibility::PromotionRules;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{store, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::model::GlobalDefaults;
use serde_json::{json, Map, Value};
use std::time::Duration;

#[derive(Clone, Copy)]
enum SetupSection {
    Sync,
    Eligibility,
}

impl SetupSection {
    const ALL: [SetupSection; 2] = [SetupSection::Sync, SetupSection::Eligibility];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "sync" => Some(Self::Sync),
            "eligibility" => Some(Self::Eligibility),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Eligibility => "eligibility",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Sync => "setup.sync",
            Self::Eligibility => "setup.eligibility",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Sync => json!({
            "inspectorName": "",
            "region": "",
            "district": "",
            "school": "",
            "debounceMs": 2000
        }),
        SetupSection::Eligibility => json!({
            "seniorityBonusEnabled": false,
            "bonusMonths": 0.0
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_f64_range(v: &Value, key: &str, min: f64, max: f64) -> Result<f64, String> {
    let n = v.as_f64().ok_or_else(|| format!("{} must be a number", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Sync => match k.as_str() {
                "inspectorName" | "region" | "district" | "school" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 120)?));
                }
                "debounceMs" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 250, 60_000)?));
                }
                _ => return Err(format!("unknown sync field: {}", k)),
            },
            SetupSection::Eligibility => match k.as_str() {
                "seniorityBonusEnabled" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "bonusMonths" => {
                    obj.insert(k.clone(), Value::from(parse_f64_range(v, k, 0.0, 12.0)?));
                }
                _ => return Err(format!("unknown eligibility field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(store: &dyn Store, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = store.get(section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults.
            if let Err(msg) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(section = section.name(), %msg, "ignoring stored setup");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

/// Sync section values consumed outside the setup handlers.
pub(crate) struct SyncSettings {
    pub defaults: GlobalDefaults,
    pub debounce: Duration,
}

pub(crate) fn sync_settings(store: &dyn Store) -> anyhow::Result<SyncSettings> {
    let section = load_section(store, SetupSection::Sync)?;
    let debounce_ms = section
        .get("debounceMs")
        .and_then(|v| v.as_u64())
        .unwrap_or(2000);
    Ok(SyncSettings {
        defaults: serde_json::from_value(section)?,
        debounce: Duration::from_millis(debounce_ms),
    })
}

pub(crate) fn promotion_rules(store: &dyn Store) -> anyhow::Result<PromotionRules> {
    Ok(serde_json::from_value(load_section(
        store,
        SetupSection::Eligibility,
    )?)?)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let mut out = Map::new();
    for section in SetupSection::ALL {
        match load_section(store, section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let mut current = match load_section(&*store, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::save(store, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    if let SetupSection::Sync = section {
        if let Some(ms) = current.get("debounceMs").and_then(|v| v.as_u64()) {
            state.debouncer.set_window(Duration::from_millis(ms));
        }
    }
    tracing::info!(section = section.name(), "setup updated");
    ok(
        &req.id,
        json!({ "ok": true, "section": section.name(), "values": current }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
