//! Configuration loader and validator for the showcase server.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Invalid value {value:?} for environment variable {var}")]
    Env { var: &'static str, value: String },
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    pub notion: Notion,
    #[serde(default)]
    pub fetch: Fetch,
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    pub bind: String,
    pub cache_ttl_seconds: u64,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".into(),
            cache_ttl_seconds: 60,
        }
    }
}

/// Notion API settings. Credentials may be left out of the file and
/// supplied through the environment instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notion {
    #[serde(default)]
    pub token: Option<String>,
    pub version: String,
    #[serde(default)]
    pub database_id: Option<String>,
    pub fields: Fields,
}

/// Property names of the content database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fields {
    pub status: String,
    pub published: String,
    pub category: String,
    pub members_label: String,
    pub title: String,
    pub subtitle: String,
    pub keywords: String,
    pub assignees: String,
    pub photo: String,
}

/// Retry knobs for upstream requests. Floors are applied by `RetryPolicy`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fetch {
    pub attempts: u32,
    pub backoff_ms: u64,
    pub timeout_ms: u64,
}

impl Default for Fetch {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 800,
            timeout_ms: 15_000,
        }
    }
}

/// Load configuration from a YAML file, apply environment overrides and
/// validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    apply_env(&mut cfg, |key| std::env::var(key).ok())?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Overlay values found through `lookup` onto `cfg`. Empty values are ignored.
pub fn apply_env<F>(cfg: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = get("NOTION_API_KEY") {
        cfg.notion.token = Some(token);
    }
    if let Some(id) = get("NOTION_DATABASE_ID") {
        cfg.notion.database_id = Some(id);
    }
    if let Some(raw) = get("NOTION_FETCH_ATTEMPTS") {
        cfg.fetch.attempts = parse_env("NOTION_FETCH_ATTEMPTS", raw)?;
    }
    if let Some(raw) = get("NOTION_FETCH_BACKOFF_MS") {
        cfg.fetch.backoff_ms = parse_env("NOTION_FETCH_BACKOFF_MS", raw)?;
    }
    if let Some(raw) = get("NOTION_FETCH_TIMEOUT_MS") {
        cfg.fetch.timeout_ms = parse_env("NOTION_FETCH_TIMEOUT_MS", raw)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value: raw })
}

/// Validate a configuration instance. Missing credentials are not an error
/// here; the content source reports them when a fetch is attempted.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.bind.trim().is_empty() {
        return Err(ConfigError::Invalid("server.bind must be non-empty"));
    }
    if cfg.notion.version.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.version must be non-empty"));
    }

    let f = &cfg.notion.fields;
    if f.status.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.fields.status must be non-empty"));
    }
    if f.published.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.fields.published must be non-empty"));
    }
    if f.category.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.fields.category must be non-empty"));
    }
    if f.title.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.fields.title must be non-empty"));
    }

    Ok(())
}

/// Returns the reference YAML configuration.
pub fn example() -> &'static str {
    r#"server:
  bind: "127.0.0.1:3000"
  cache_ttl_seconds: 60

notion:
  # or NOTION_API_KEY / NOTION_DATABASE_ID in the environment
  token: "YOUR_NOTION_INTEGRATION_TOKEN"
  version: "2022-06-28"
  database_id: "NOTION_DATABASE_ID"

  fields:
    status: "公開状態"
    published: "公開済み"
    category: "コンテンツタイプ"
    members_label: "メンバー"
    title: "タイトル"
    subtitle: "日本語タイトル"
    keywords: "キーワード"
    assignees: "担当者"
    photo: "顔写真"

fetch:
  attempts: 3
  backoff_ms: 800
  timeout_ms: 15000
"#
}
