use crate::config::*;
use crate::types::*;
use serde_json::Value;
use std::{
    sync::Arc,
    thread::sleep,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::{info, warn};

pub fn feed_url_from_config(config: &AppConfig) -> Result<String, String> {
  let trimmed = config.feed_url.trim();
  if trimmed.is_empty() {
    return Err("Results feed URL is not set (feedUrl or ARCHIVE_FEED_URL).".to_string());
  }
  Ok(trimmed.to_string())
}

pub fn parse_feed_body(body: &str) -> Result<Value, String> {
  let trimmed = body.trim_start_matches('\u{feff}').trim();
  if trimmed.is_empty() {
    return Err("Results feed returned an empty body.".to_string());
  }
  serde_json::from_str(trimmed).map_err(|e| format!("Results feed parse failed: {e}"))
}

/// One GET of the raw feed snapshot, retried with linear back-off.
pub fn fetch_feed_snapshot(config: &AppConfig) -> Result<Value, String> {
  let url = feed_url_from_config(config)?;
  let token = config.feed_token.trim();
  let client = reqwest::blocking::Client::builder()
    .timeout(Duration::from_secs(10))
    .build()
    .map_err(|e| format!("Results feed client failed: {e}"))?;
  let auth_log = if token.is_empty() { "none" } else { "Bearer [redacted]" };
  append_feed_log(
    "Feed request",
    &format!("url: {url}\nAuthorization: {auth_log}\nUser-Agent: {FEED_USER_AGENT}"),
  );

  let mut last_send_err = String::new();
  let mut resp = None;
  for attempt in 0..FEED_REQUEST_ATTEMPTS {
    if attempt > 0 {
      sleep(Duration::from_millis(500 * u64::from(attempt)));
    }
    let mut request = client
      .get(&url)
      .header("User-Agent", FEED_USER_AGENT)
      .header("Cache-Control", "no-cache");
    if !token.is_empty() {
      request = request.header("Authorization", format!("Bearer {token}"));
    }
    match request.send() {
      Ok(r) => {
        resp = Some(r);
        break;
      }
      Err(e) => {
        last_send_err = format!("Results feed request failed (attempt {}): {e}", attempt + 1);
        append_feed_log("Feed error", &last_send_err);
      }
    }
  }
  let resp = resp.ok_or_else(|| last_send_err.clone())?;
  let status = resp.status();
  let body = resp.text().map_err(|e| {
    append_feed_log("Feed error", &format!("read failed: {e}"));
    format!("Results feed read failed: {e}")
  })?;
  append_feed_log("Feed response", &format!("status: {status}\nbytes: {}", body.len()));
  if !status.is_success() {
    return Err(format!("Results feed error {status}"));
  }
  parse_feed_body(&body).map_err(|e| {
    append_feed_log("Feed error", &e);
    e
  })
}

pub fn maybe_refresh_live_feed(
  config: &AppConfig,
  live_state: &SharedLiveFeed,
  force: bool,
) -> Option<Arc<Value>> {
  refresh_live_feed_with(config, live_state, force, fetch_feed_snapshot)
}

/// Refreshes the shared snapshot through `fetch`. A failed fetch records the
/// error and leaves the previous snapshot in place.
pub fn refresh_live_feed_with(
  config: &AppConfig,
  live_state: &SharedLiveFeed,
  force: bool,
  fetch: impl FnOnce(&AppConfig) -> Result<Value, String>,
) -> Option<Arc<Value>> {
  let url = config.feed_url.trim();
  if url.is_empty() {
    let mut guard = live_state.lock().unwrap_or_else(|e| e.into_inner());
    guard.snapshot = None;
    guard.feed_url = None;
    guard.last_fetch = None;
    guard.last_error = None;
    return None;
  }

  let (cached, cached_url, fetch_in_flight, last_fetch) = {
    let guard = live_state.lock().unwrap_or_else(|e| e.into_inner());
    (
      guard.snapshot.clone(),
      guard.feed_url.clone(),
      guard.fetch_in_flight,
      guard.last_fetch,
    )
  };

  let url_changed = cached_url.as_deref() != Some(url);
  let mut needs_refresh = force || cached.is_none() || url_changed;
  if let Some(last) = last_fetch {
    let age_ms = last.elapsed().map(|age| age.as_millis() as u64).unwrap_or(u64::MAX);
    if age_ms >= config.poll_interval_ms {
      needs_refresh = true;
    }
  }
  if !needs_refresh || fetch_in_flight {
    return cached;
  }

  {
    let mut guard = live_state.lock().unwrap_or_else(|e| e.into_inner());
    guard.fetch_in_flight = true;
  }

  let result = fetch(config);
  let mut guard = live_state.lock().unwrap_or_else(|e| e.into_inner());
  guard.fetch_in_flight = false;
  if url_changed {
    guard.snapshot = None;
  }
  guard.feed_url = Some(url.to_string());
  match result {
    Ok(value) => {
      let snapshot = Arc::new(value);
      guard.last_fetch = Some(SystemTime::now());
      guard.last_error = None;
      guard.snapshot = Some(Arc::clone(&snapshot));
      Some(snapshot)
    }
    Err(err) => {
      warn!("results feed refresh failed, keeping last snapshot: {err}");
      guard.last_error = Some(err);
      guard.snapshot.clone()
    }
  }
}

pub fn spawn_feed_polling(live_state: SharedLiveFeed) {
  std::thread::spawn(move || loop {
    let config = load_config().unwrap_or_else(|e| {
      warn!("config load failed, using defaults: {e}");
      apply_env_defaults(AppConfig::default())
    });
    let interval = Duration::from_millis(config.poll_interval_ms.max(250));
    if !config.feed_polling || config.feed_url.trim().is_empty() {
      sleep(interval);
      continue;
    }
    let had_snapshot = live_state
      .lock()
      .map(|guard| guard.snapshot.is_some())
      .unwrap_or(false);
    if maybe_refresh_live_feed(&config, &live_state, true).is_some() && !had_snapshot {
      info!("results feed online: {}", config.feed_url.trim());
    }
    sleep(interval);
  });
}

pub fn feed_status(live_state: &SharedLiveFeed) -> FeedStatus {
  let guard = live_state.lock().unwrap_or_else(|e| e.into_inner());
  let last_fetch_ms = guard.last_fetch.and_then(|time| {
    time
      .duration_since(UNIX_EPOCH)
      .ok()
      .map(|duration| duration.as_millis() as u64)
  });
  FeedStatus {
    feed_url: guard.feed_url.clone(),
    has_snapshot: guard.snapshot.is_some(),
    last_error: guard.last_error.clone(),
    last_fetch_ms,
  }
}
