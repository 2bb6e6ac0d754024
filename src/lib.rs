pub mod types;
pub mod config;
pub mod raw;
pub mod identity;
pub mod stages;
pub mod standings;
pub mod qualifier;
pub mod cross;
pub mod archive;
pub mod feed;

pub use archive::{
    resolve, resolve_arcade, resolve_division, resolve_region, resolve_with, ArchiveCache,
    ResolveOptions,
};
pub use cross::derive_cross_matches;
pub use qualifier::build_qualifier_rows;
pub use stages::{find_stage, StageRole};
pub use standings::build_standings;

use types::*;
use config::*;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use std::{
    fs,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use axum::{
    extract::{Path, State as AxumState},
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── Archive server ─────────────────────────────────────────────────────

fn archive_router(state: ArchiveServerState, site_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route("/status.json", get(get_status_json))
        .route("/archive/console.json", get(get_console_json))
        .route("/archive/arcade.json", get(get_arcade_json))
        .route("/archive/arcade/:region", get(get_region_json));
    let router = match site_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };
    router.with_state(state)
}

async fn start_archive_server(state: ArchiveServerState, site_dir: Option<PathBuf>, addr: &str) {
    let app = archive_router(state, site_dir);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("archive server failed to bind {addr}: {e}");
            return;
        }
    };
    info!("archive server listening at http://{addr}/");
    if let Err(e) = axum::serve(listener, app).await {
        error!("archive server error: {e}");
    }
}

fn json_response<T: Serialize>(payload: &T) -> impl IntoResponse {
    let body = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    (
        [
            ("Content-Type", "application/json"),
            ("Cache-Control", "no-store"),
            ("Pragma", "no-cache"),
            ("Expires", "0"),
        ],
        body,
    )
}

/// Latest snapshot, or `null` before the first successful fetch. With polling
/// disabled the feed is refreshed on demand instead.
async fn live_snapshot(state: &ArchiveServerState) -> Arc<Value> {
    let live_feed = state.live_feed.clone();
    let snapshot = tokio::task::spawn_blocking(move || {
        let config = load_config().unwrap_or_else(|_| apply_env_defaults(AppConfig::default()));
        if config.feed_polling {
            let guard = live_feed.lock().unwrap_or_else(|e| e.into_inner());
            guard.snapshot.clone()
        } else {
            feed::maybe_refresh_live_feed(&config, &live_feed, false)
        }
    })
    .await
    .ok()
    .flatten();
    snapshot_or_empty(snapshot)
}

// Stable cache key while no snapshot has been fetched.
static EMPTY_SNAPSHOT: Lazy<Arc<Value>> = Lazy::new(|| Arc::new(Value::Null));

fn snapshot_or_empty(snapshot: Option<Arc<Value>>) -> Arc<Value> {
    snapshot.unwrap_or_else(|| Arc::clone(&EMPTY_SNAPSHOT))
}

async fn get_status_json(AxumState(state): AxumState<ArchiveServerState>) -> impl IntoResponse {
    json_response(&feed::feed_status(&state.live_feed))
}

async fn get_console_json(AxumState(state): AxumState<ArchiveServerState>) -> impl IntoResponse {
    let snapshot = live_snapshot(&state).await;
    let resolved = {
        let mut cache = state.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.console(&snapshot, &state.options)
    };
    json_response(&*resolved)
}

async fn get_arcade_json(AxumState(state): AxumState<ArchiveServerState>) -> impl IntoResponse {
    let snapshot = live_snapshot(&state).await;
    let arcade = {
        let mut cache = state.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.arcade(&snapshot, &state.options)
    };
    json_response(&*arcade)
}

async fn get_region_json(
    AxumState(state): AxumState<ArchiveServerState>,
    Path(region): Path<String>,
) -> impl IntoResponse {
    let snapshot = live_snapshot(&state).await;
    json_response(&resolve_region(&snapshot, &region, &state.options))
}

fn site_dir_from_config(config: &AppConfig) -> Option<PathBuf> {
    let raw = config.site_dir.trim();
    if raw.is_empty() {
        return None;
    }
    let dir = resolve_repo_path(raw);
    dir.is_dir().then_some(dir)
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() {
    load_env_file();

    // Initialize tracing with file output
    let logs_dir = logs_dir();
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "archive.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Taiko Cup archive starting");

    let config = load_config().unwrap_or_else(|e| {
        error!("{e}; falling back to defaults");
        apply_env_defaults(AppConfig::default())
    });
    log_env_warnings(&config);

    let live_feed: SharedLiveFeed = Arc::new(Mutex::new(LiveFeedState::default()));
    let cache: SharedArchiveCache = Arc::new(Mutex::new(ArchiveCache::new()));
    feed::spawn_feed_polling(live_feed.clone());

    let state = ArchiveServerState {
        live_feed,
        cache,
        options: ResolveOptions::from_config(&config),
    };
    let site_dir = site_dir_from_config(&config);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start async runtime: {e}");
            return;
        }
    };
    runtime.block_on(start_archive_server(state, site_dir, &config.listen_addr));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_site_dir_is_not_served() {
        let config = AppConfig {
            site_dir: "  ".to_string(),
            ..AppConfig::default()
        };
        assert!(site_dir_from_config(&config).is_none());
    }

    #[test]
    fn test_missing_site_dir_is_not_served() {
        let config = AppConfig {
            site_dir: "no-such-site-dir".to_string(),
            ..AppConfig::default()
        };
        assert!(site_dir_from_config(&config).is_none());
    }

    #[test]
    fn test_existing_site_dir_is_served() {
        let dir = std::env::temp_dir().join(format!("taiko-cup-site-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let config = AppConfig {
            site_dir: dir.to_string_lossy().into_owned(),
            ..AppConfig::default()
        };
        assert_eq!(site_dir_from_config(&config), Some(dir.clone()));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_snapshot_reuses_one_empty_value() {
        let first = snapshot_or_empty(None);
        let second = snapshot_or_empty(None);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_null());

        let mut cache = ArchiveCache::new();
        let options = ResolveOptions::default();
        let resolved = cache.console(&first, &options);
        assert!(Arc::ptr_eq(&resolved, &cache.console(&second, &options)));
    }

    #[test]
    fn test_null_snapshot_serves_empty_archives() {
        let mut cache = ArchiveCache::new();
        let snapshot = Arc::new(Value::Null);
        let options = ResolveOptions::default();
        let console = cache.console(&snapshot, &options);
        assert!(console.archive.stages.is_empty());
        assert!(console.standings.is_empty());
        assert_eq!(console.archive.season, DEFAULT_SEASON);
        let arcade = cache.arcade(&snapshot, &options);
        assert!(arcade.regions.is_empty());
        assert!(arcade.cross_matches.is_empty());
    }
}
