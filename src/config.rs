use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

const CONFIG_FILE_REL: &str = "history-sidebar/config.toml";
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_STORAGE_FILE: &str = "local-storage.sqlite3";
const DEFAULT_LOG_FILE: &str = "history-sidebar.log";

pub const URL_ENV: &str = "HISTORY_SIDEBAR_URL";
pub const CSRF_ENV: &str = "HISTORY_SIDEBAR_CSRF_TOKEN";

/// On-disk shape; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    base_url: Option<String>,
    csrf_token: Option<String>,
    request_timeout_secs: Option<u64>,
    toast_secs: Option<u64>,
    menu_margin: Option<u16>,
    storage_path: Option<PathBuf>,
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: String,
    pub csrf_token: Option<String>,
    pub request_timeout: Duration,
    pub toast_ttl: Duration,
    pub menu_margin: u16,
    pub storage_path: PathBuf,
    pub log_file: PathBuf,
    /// History item to start on, as if its page had been opened.
    pub active_item: Option<i64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            csrf_token: None,
            request_timeout: Duration::from_secs(10),
            toast_ttl: Duration::from_secs(5),
            menu_margin: 1,
            storage_path: PathBuf::from(DEFAULT_STORAGE_FILE),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            active_item: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cli {
    pub url: Option<String>,
    pub config: Option<PathBuf>,
    pub active: Option<i64>,
    pub help: bool,
}

pub const USAGE: &str = "\
Usage: history-sidebar [OPTIONS]

Options:
  --url <URL>       Base URL of the history service
  --config <PATH>   Config file (default: $XDG_CONFIG_HOME/history-sidebar/config.toml)
  --active <ID>     Start with this history item open
  --help            Show this help message";

impl Cli {
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cli = Cli::default();
        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => cli.help = true,
                "--url" => cli.url = Some(value_of(&arg, args.next())?),
                "--config" => cli.config = Some(PathBuf::from(value_of(&arg, args.next())?)),
                "--active" => {
                    let raw = value_of(&arg, args.next())?;
                    let id = raw
                        .parse::<i64>()
                        .with_context(|| format!("--active expects a numeric id, got {raw:?}"))?;
                    cli.active = Some(id);
                }
                other => bail!("unknown argument {other:?}\n\n{USAGE}"),
            }
        }
        Ok(cli)
    }
}

fn value_of(flag: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| anyhow!("{flag} expects a value"))
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        return Some(PathBuf::from(xdg).join(CONFIG_FILE_REL));
    }
    if let Ok(appdata) = env::var("APPDATA")
        && !appdata.is_empty()
    {
        return Some(PathBuf::from(appdata).join(CONFIG_FILE_REL));
    }
    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join(CONFIG_FILE_REL))
}

impl Config {
    /// File, then environment, then command line; later layers win.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = cli.config.clone().or_else(default_config_path);
        let file = match &path {
            Some(path) if path.exists() => read_file(path)?,
            // An explicitly requested file has to exist.
            Some(path) if cli.config.is_some() => {
                bail!("config file {} does not exist", path.display())
            }
            _ => ConfigFile::default(),
        };
        let base_dir = path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = Self::from_file(file, &base_dir);
        config.apply_env(env::var(URL_ENV).ok(), env::var(CSRF_ENV).ok());
        if let Some(url) = &cli.url {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if cli.active.is_some() {
            config.active_item = cli.active;
        }
        Ok(config)
    }

    fn from_file(file: ConfigFile, base_dir: &Path) -> Self {
        let defaults = Self::default();
        Self {
            base_url: file
                .base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            csrf_token: file.csrf_token.filter(|t| !t.trim().is_empty()),
            request_timeout: file
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            toast_ttl: file
                .toast_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.toast_ttl),
            menu_margin: file.menu_margin.unwrap_or(defaults.menu_margin),
            storage_path: resolve(base_dir, file.storage_path, DEFAULT_STORAGE_FILE),
            log_file: resolve(base_dir, file.log_file, DEFAULT_LOG_FILE),
            active_item: None,
        }
    }

    fn apply_env(&mut self, url: Option<String>, csrf: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(token) = csrf.filter(|t| !t.trim().is_empty()) {
            self.csrf_token = Some(token.trim().to_string());
        }
    }
}

fn read_file(path: &Path) -> Result<ConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

fn resolve(base_dir: &Path, configured: Option<PathBuf>, default_name: &str) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path,
        Some(path) => base_dir.join(path),
        None => base_dir.join(default_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse(["--url", "http://host:9000", "--active", "42"]).expect("parse");
        assert_eq!(cli.url.as_deref(), Some("http://host:9000"));
        assert_eq!(cli.active, Some(42));
        assert!(!cli.help);
        assert!(Cli::parse(["--help"]).expect("parse").help);
    }

    #[test]
    fn cli_rejects_bad_input() {
        assert!(Cli::parse(["--active", "abc"]).is_err());
        assert!(Cli::parse(["--url"]).is_err());
        assert!(Cli::parse(["--frobnicate"]).is_err());
    }

    #[test]
    fn file_values_and_relative_paths() {
        let file: ConfigFile = toml::from_str(
            r#"
            base_url = "https://assistant.example.org/"
            toast_secs = 8
            storage_path = "state.db"
            "#,
        )
        .expect("toml");
        let config = Config::from_file(file, Path::new("/etc/hs"));
        assert_eq!(config.base_url, "https://assistant.example.org");
        assert_eq!(config.toast_ttl, Duration::from_secs(8));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.storage_path, PathBuf::from("/etc/hs/state.db"));
        assert_eq!(config.log_file, PathBuf::from("/etc/hs/history-sidebar.log"));
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = Config::default();
        config.apply_env(Some(String::from("http://other/")), Some(String::from(" tok ")));
        assert_eq!(config.base_url, "http://other");
        assert_eq!(config.csrf_token.as_deref(), Some("tok"));
        config.apply_env(Some(String::from("  ")), None);
        assert_eq!(config.base_url, "http://other");
    }
}
