use serde::{Deserialize, Serialize};

pub const DEFAULT_FOLDER_COLOR: &str = "#6c757d";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistoryItem {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub folder_id: Option<i64>,
}

fn default_color() -> String {
    DEFAULT_FOLDER_COLOR.to_string()
}

/// Where an item (and its action menu) lives in the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    TopLevel,
    Folder(i64),
}

/// The page the client is "on": the landing page or one saved history item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Root,
    HistoryItem(i64),
}

impl Location {
    pub fn active_item(self) -> Option<i64> {
        match self {
            Location::Root => None,
            Location::HistoryItem(id) => Some(id),
        }
    }

    pub fn path(self) -> String {
        match self {
            Location::Root => String::from("/"),
            Location::HistoryItem(id) => format!("/history-item/{id}"),
        }
    }
}

pub fn folder_key(id: i64) -> String {
    format!("folder-{id}")
}
