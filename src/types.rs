use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    sync::{Arc, Mutex},
    time::SystemTime,
};

use crate::archive::{ArchiveCache, ResolveOptions};

// ── Constants ──────────────────────────────────────────────────────────

pub const DEFAULT_SEASON: &str = "2026";
pub const DEFAULT_QUALIFIER_CUTOFF: u32 = 4;
pub const CROSS_GROUP_SIZE: usize = 4;
pub const FEED_POLL_INTERVAL_MS: u64 = 3000;
pub const FEED_REQUEST_ATTEMPTS: u32 = 3;
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:17880";
pub const FEED_USER_AGENT: &str = "taiko-cup-archive";

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedLiveFeed = Arc<Mutex<LiveFeedState>>;
pub type SharedArchiveCache = Arc<Mutex<ArchiveCache>>;

// ── Divisions ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Division {
    Console,
    Arcade,
}

impl Division {
    /// Key of the division sub-tree inside the raw feed.
    pub fn feed_key(self) -> &'static str {
        match self {
            Division::Console => "console",
            Division::Arcade => "arcade",
        }
    }

    pub fn archive_key(self) -> &'static str {
        match self {
            Division::Console => "consoleArchive",
            Division::Arcade => "arcadeArchive",
        }
    }
}

// ── Result rows and stages ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Controller {
    #[default]
    #[serde(rename = "")]
    Unknown,
    #[serde(rename = "joycon")]
    JoyCon,
    #[serde(rename = "procon")]
    ProController,
    #[serde(rename = "tatacon")]
    Tatacon,
}

impl Controller {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Controller::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    pub rank: Option<u32>,
    pub nickname: String,
    pub score: Option<f64>,
    pub detail: String,
    pub entry_id: Option<String>,
    pub controller: Controller,
    pub s1: Option<f64>,
    pub s2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub stage_key: String,
    pub stage_label: String,
    pub order: i64,
    pub status: String,
    pub note: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub rows: Vec<ResultRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonArchive {
    pub season: String,
    pub stages: Vec<Stage>,
}

impl SeasonArchive {
    pub fn empty(season: &str) -> Self {
        SeasonArchive {
            season: season.to_string(),
            stages: Vec::new(),
        }
    }
}

impl Default for SeasonArchive {
    fn default() -> Self {
        SeasonArchive::empty(DEFAULT_SEASON)
    }
}

// ── Derived views ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub rank: u32,
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifierRow {
    #[serde(flatten)]
    pub row: ResultRow,
    pub passed: bool,
    pub seed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRow {
    pub seed: u32,
    pub region_key: String,
    pub region_label: String,
    pub entry_id: Option<String>,
    pub nickname: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossMatch {
    pub match_no: u8,
    pub left: SeedRow,
    pub right: SeedRow,
    pub winner_entry_id: Option<String>,
    pub note: Option<String>,
}

/// Every derived view of one division, as handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDivision {
    pub archive: SeasonArchive,
    pub standings: Vec<Standing>,
    pub qualifiers: Vec<QualifierRow>,
    pub semifinal1: Option<Stage>,
    pub semifinal2: Option<Stage>,
    pub third_place: Option<Stage>,
    pub grand_final: Option<Stage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionArchive {
    pub region_key: String,
    pub region_label: String,
    pub order: i64,
    pub archive: SeasonArchive,
    pub seeds: Vec<SeedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcadeArchive {
    pub season: String,
    pub regions: Vec<RegionArchive>,
    pub cross_matches: Vec<CrossMatch>,
}

// ── Config types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub feed_url: String,
    pub feed_token: String,
    pub feed_polling: bool,
    pub poll_interval_ms: u64,
    pub listen_addr: String,
    pub site_dir: String,
    pub qualifier_cutoff: u32,
    pub default_season: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed_url: String::new(),
            feed_token: String::new(),
            feed_polling: true,
            poll_interval_ms: FEED_POLL_INTERVAL_MS,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            site_dir: "site".to_string(),
            qualifier_cutoff: DEFAULT_QUALIFIER_CUTOFF,
            default_season: DEFAULT_SEASON.to_string(),
        }
    }
}

// ── Live feed state ────────────────────────────────────────────────────

#[derive(Default)]
pub struct LiveFeedState {
    pub snapshot: Option<Arc<Value>>,
    pub feed_url: Option<String>,
    pub last_fetch: Option<SystemTime>,
    pub last_error: Option<String>,
    pub fetch_in_flight: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatus {
    pub feed_url: Option<String>,
    pub has_snapshot: bool,
    pub last_error: Option<String>,
    pub last_fetch_ms: Option<u64>,
}

#[derive(Clone)]
pub struct ArchiveServerState {
    pub live_feed: SharedLiveFeed,
    pub cache: SharedArchiveCache,
    pub options: ResolveOptions,
}
