use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use ratatui::style::Color;

use crate::model::DEFAULT_FOLDER_COLOR;

const TITLE_MAX_CHARS: usize = 25;
const TITLE_KEEP_CHARS: usize = 22;

pub fn format_title(title: &str) -> String {
    if title.chars().count() > TITLE_MAX_CHARS {
        let head: String = title.chars().take(TITLE_KEEP_CHARS).collect();
        return format!("{head}...");
    }
    title.to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Naive timestamps are treated as UTC.
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Coarse relative age, e.g. `5m ago`. Unknown timestamps render empty.
pub fn time_ago(timestamp: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(then) = timestamp.and_then(parse_timestamp) else {
        return String::new();
    };

    let seconds = ((now - then).num_milliseconds() as f64 / 1000.0).round();
    let minutes = (seconds / 60.0).round();
    let hours = (minutes / 60.0).round();
    let days = (hours / 24.0).round();
    let weeks = (days / 7.0).round();
    let months = (days / 30.44).round();
    let years = (days / 365.25).round();

    if seconds < 60.0 {
        String::from("Just now")
    } else if minutes < 60.0 {
        format!("{minutes}m ago")
    } else if hours < 24.0 {
        format!("{hours}h ago")
    } else if days < 7.0 {
        format!("{days}d ago")
    } else if weeks < 5.0 {
        format!("{weeks}w ago")
    } else if months < 12.0 {
        format!("{months}mo ago")
    } else {
        format!("{years}y ago")
    }
}

pub fn parse_hex_color(raw: &str) -> Option<Color> {
    let hex = raw.trim().strip_prefix('#')?;
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let value = u32::from_str_radix(&expanded, 16).ok()?;
    Some(Color::Rgb(
        ((value >> 16) & 0xff) as u8,
        ((value >> 8) & 0xff) as u8,
        (value & 0xff) as u8,
    ))
}

pub fn folder_color(raw: &str) -> Color {
    parse_hex_color(raw)
        .or_else(|| parse_hex_color(DEFAULT_FOLDER_COLOR))
        .unwrap_or(Color::Gray)
}

pub fn copyright_year(now: DateTime<Utc>) -> i32 {
    now.year()
}
