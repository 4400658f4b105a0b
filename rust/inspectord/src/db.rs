use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub const DB_FILE: &str = "inspectord.sqlite3";

pub const KEY_TEACHERS: &str = "teachers";
pub const KEY_REPORTS: &str = "reports";
pub const KEY_TENURE_REPORTS: &str = "tenureReports";
pub const KEY_AUXILIARY: &str = "auxiliary";

/// Local key-value persistence. The sheet/eligibility core never sees it;
/// only the application layer reads and writes through it.
pub trait Store {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;
    fn set(&mut self, key: &str, value: &Value) -> anyhow::Result<()>;

    fn set_many(&mut self, entries: &[(&str, Value)]) -> anyhow::Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

pub fn load<T: DeserializeOwned>(store: &dyn Store, key: &str) -> anyhow::Result<Option<T>> {
    match store.get(key)? {
        Some(v) => Ok(Some(
            serde_json::from_value(v)
                .with_context(|| format!("stored value for {} is malformed", key))?,
        )),
        None => Ok(None),
    }
}

pub fn load_or_default<T: DeserializeOwned + Default>(
    store: &dyn Store,
    key: &str,
) -> anyhow::Result<T> {
    Ok(load(store, key)?.unwrap_or_default())
}

pub fn save<T: Serialize>(store: &mut dyn Store, key: &str, value: &T) -> anyhow::Result<()> {
    let v = serde_json::to_value(value).with_context(|| format!("failed to encode {}", key))?;
    store.set(key, &v)
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace).with_context(|| {
            format!(
                "failed to create workspace {}",
                workspace.to_string_lossy()
            )
        })?;
        let conn = Connection::open(workspace.join(DB_FILE))?;
        Self::init(conn)
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv(
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT
            )",
            [],
        )?;
        Ok(Self { conn })
    }
}

fn upsert(conn: &Connection, key: &str, value: &Value) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO kv(key, value, updated_at) VALUES(?, ?, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (key, text),
    )?;
    Ok(())
}

impl Store for SqliteStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let text: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        match text {
            Some(t) => Ok(Some(
                serde_json::from_str(&t).with_context(|| format!("stored {} is not JSON", key))?,
            )),
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &str, value: &Value) -> anyhow::Result<()> {
        upsert(&self.conn, key, value)
    }

    /// One transaction, so a partial import never lands.
    fn set_many(&mut self, entries: &[(&str, Value)]) -> anyhow::Result<()> {
        let tx = self.conn.transaction()?;
        for (key, value) in entries {
            upsert(&tx, key, value)?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &Value) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Teacher;
    use serde_json::json;

    #[test]
    fn sqlite_store_roundtrips_and_overwrites() {
        let mut s = SqliteStore::in_memory().expect("open");
        assert_eq!(s.get("missing").expect("get"), None);
        s.set("k", &json!({ "a": 1 })).expect("set");
        s.set("k", &json!({ "a": 2 })).expect("overwrite");
        assert_eq!(s.get("k").expect("get"), Some(json!({ "a": 2 })));
    }

    #[test]
    fn typed_helpers_over_any_store() {
        let mut s = MemoryStore::new();
        let teachers = vec![Teacher::new("Amina")];
        save(&mut s, KEY_TEACHERS, &teachers).expect("save");
        let back: Vec<Teacher> = load_or_default(&s, KEY_TEACHERS).expect("load");
        assert_eq!(back, teachers);
        let none: Vec<Teacher> = load_or_default(&s, KEY_REPORTS).expect("load default");
        assert!(none.is_empty());
    }

    #[test]
    fn set_many_is_all_or_nothing_per_call() {
        let mut s = SqliteStore::in_memory().expect("open");
        s.set_many(&[("a", json!(1)), ("b", json!([2]))]).expect("set many");
        assert_eq!(s.get("a").expect("get"), Some(json!(1)));
        assert_eq!(s.get("b").expect("get"), Some(json!([2])));
    }
}
