use crate::types::*;
use chrono::Local;
use std::{
    env,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

pub fn repo_root() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    repo_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  if let Some(raw) = env_default("ARCHIVE_CONFIG_PATH") {
    return resolve_repo_path(&raw);
  }
  repo_root().join("config.json")
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

pub fn parse_flag(raw: &str) -> Option<bool> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}

pub fn apply_env_defaults(config: AppConfig) -> AppConfig {
  apply_env_defaults_from(config, env_default)
}

/// Fills blank fields from `lookup`; `ARCHIVE_FEED_POLLING` and
/// `ARCHIVE_QUALIFIER_CUTOFF` always override.
pub fn apply_env_defaults_from(
  mut config: AppConfig,
  lookup: impl Fn(&str) -> Option<String>,
) -> AppConfig {
  if config.feed_url.trim().is_empty() {
    if let Some(value) = lookup("ARCHIVE_FEED_URL") {
      config.feed_url = value;
    }
  }
  if config.feed_token.trim().is_empty() {
    if let Some(value) = lookup("ARCHIVE_FEED_TOKEN") {
      config.feed_token = value;
    }
  }
  if config.listen_addr.trim().is_empty() {
    config.listen_addr = lookup("ARCHIVE_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
  }
  if config.site_dir.trim().is_empty() {
    if let Some(value) = lookup("ARCHIVE_SITE_DIR") {
      config.site_dir = value;
    }
  }
  if let Some(flag) = lookup("ARCHIVE_FEED_POLLING").as_deref().and_then(parse_flag) {
    config.feed_polling = flag;
  }
  if let Some(cutoff) = lookup("ARCHIVE_QUALIFIER_CUTOFF").and_then(|raw| raw.parse::<u32>().ok()) {
    config.qualifier_cutoff = cutoff;
  }
  if config.poll_interval_ms == 0 {
    config.poll_interval_ms = FEED_POLL_INTERVAL_MS;
  }
  config
}

pub fn load_config() -> Result<AppConfig, String> {
  load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, String> {
  if !path.is_file() {
    return Ok(apply_env_defaults(AppConfig::default()));
  }
  let data = fs::read_to_string(path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  let config =
    serde_json::from_str::<AppConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))?;
  Ok(apply_env_defaults(config))
}

pub fn load_env_file() {
  let env_path = repo_root().join(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for line in contents.lines() {
    if let Some((key, value)) = parse_env_line(line) {
      if env::var_os(&key).is_none() {
        env::set_var(key, value);
      }
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut value = raw_value.trim();
  if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

pub fn logs_dir() -> PathBuf {
  repo_root().join("logs")
}

pub fn feed_log_path() -> PathBuf {
  logs_dir().join("feed_api.log")
}

pub fn append_feed_log(label: &str, payload: &str) {
  if fs::create_dir_all(logs_dir()).is_err() {
    return;
  }
  let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
  let entry = format!("[{timestamp}] {label}\n{payload}\n\n");
  if let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(feed_log_path()) {
    let _ = file.write_all(entry.as_bytes());
  }
}

pub fn log_env_warnings(config: &AppConfig) {
  let mut warnings = Vec::new();

  if config.feed_url.trim().is_empty() {
    warnings.push("ARCHIVE_FEED_URL not set and no feedUrl in config; archive will stay empty");
  }
  if config.qualifier_cutoff == 0 {
    warnings.push("qualifierCutoff is 0; no qualifier row will be marked as passed");
  }
  if !config.site_dir.trim().is_empty() && !resolve_repo_path(&config.site_dir).is_dir() {
    warnings.push("siteDir does not exist; only the JSON endpoints will be served");
  }

  for msg in warnings {
    tracing::warn!("{}", msg);
  }
}
