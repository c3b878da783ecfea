use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::folder_key;

pub const OPEN_FOLDERS_KEY: &str = "openFolders";
pub const FOLDER_SECTION_KEY: &str = "folderSectionState";
pub const SEARCHES_SECTION_KEY: &str = "searchesSectionState";

/// String-keyed client-local storage, the terminal counterpart of a
/// browser's `localStorage`.
pub trait LocalStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .context("failed to create local_storage table")?;
        Ok(Self { conn })
    }
}

impl LocalStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read {key}"))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .with_context(|| format!("failed to write {key}"))?;
        Ok(())
    }
}

/// Volatile fallback used when the sqlite file cannot be opened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub fn open_or_memory(path: &Path) -> Box<dyn LocalStore> {
    match SqliteStore::open(path) {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!(path = %path.display(), error = %format!("{err:#}"), "local storage unavailable, UI state will not persist");
            Box::new(MemoryStore::default())
        }
    }
}

/// Accepts the stored forms `"folder-12"`, `"12"` and `12`.
pub fn parse_folder_ref(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s
            .strip_prefix("folder-")
            .unwrap_or(s)
            .parse::<i64>()
            .ok(),
        _ => None,
    }
}

fn read_open_entries(store: &dyn LocalStore) -> Vec<Value> {
    let raw = match store.get(OPEN_FOLDERS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "failed to read open folders");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<Value>>(&raw) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(%err, "discarding malformed open folder state");
            Vec::new()
        }
    }
}

fn write_open_entries(store: &mut dyn LocalStore, entries: &[Value]) -> Result<()> {
    let raw = serde_json::to_string(entries)?;
    store.set(OPEN_FOLDERS_KEY, &raw)
}

pub fn open_folder_ids(store: &dyn LocalStore) -> BTreeSet<i64> {
    read_open_entries(store)
        .iter()
        .filter_map(parse_folder_ref)
        .collect()
}

pub fn add_open_folder(store: &mut dyn LocalStore, folder_id: i64) -> Result<()> {
    let mut entries = read_open_entries(store);
    if entries
        .iter()
        .any(|entry| parse_folder_ref(entry) == Some(folder_id))
    {
        return Ok(());
    }
    entries.push(Value::String(folder_key(folder_id)));
    write_open_entries(store, &entries)
}

pub fn remove_open_folder(store: &mut dyn LocalStore, folder_id: i64) -> Result<()> {
    let entries: Vec<Value> = read_open_entries(store)
        .into_iter()
        .filter(|entry| parse_folder_ref(entry) != Some(folder_id))
        .collect();
    write_open_entries(store, &entries)
}

pub fn section_collapsed(store: &dyn LocalStore, key: &str) -> bool {
    matches!(store.get(key), Ok(Some(value)) if value == "true")
}

pub fn set_section_collapsed(store: &mut dyn LocalStore, key: &str, collapsed: bool) -> Result<()> {
    store.set(key, if collapsed { "true" } else { "false" })
}
