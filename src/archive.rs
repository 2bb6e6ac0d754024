use crate::cross::{parse_seed_rows, resolve_cross_matches};
use crate::qualifier::{build_qualifier_rows, build_seed_rows};
use crate::raw::{field, parse_stages, text_field, value_to_i64, value_to_text};
use crate::stages::{grand_final_stage, semifinal1_stage, semifinal2_stage, third_place_stage};
use crate::standings::build_standings;
use crate::types::*;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
  pub cutoff: u32,
  pub default_season: String,
}

impl Default for ResolveOptions {
  fn default() -> Self {
    ResolveOptions {
      cutoff: DEFAULT_QUALIFIER_CUTOFF,
      default_season: DEFAULT_SEASON.to_string(),
    }
  }
}

impl ResolveOptions {
  pub fn from_config(config: &AppConfig) -> Self {
    let default_season = config.default_season.trim();
    ResolveOptions {
      cutoff: config.qualifier_cutoff,
      default_season: if default_season.is_empty() {
        DEFAULT_SEASON.to_string()
      } else {
        default_season.to_string()
      },
    }
  }
}

// ── Division lookup ────────────────────────────────────────────────────

/// `root.<division>`, `root.results.<division>` or `root.<division>Archive`.
pub fn locate_division(snapshot: &Value, division: Division) -> Option<&Value> {
  let root = snapshot.as_object()?;
  let candidates = [
    root.get(division.feed_key()),
    root
      .get("results")
      .and_then(|results| results.get(division.feed_key())),
    root.get(division.archive_key()),
  ];
  candidates
    .into_iter()
    .flatten()
    .find(|value| value.is_object() || value.is_array())
}

fn season_of(snapshot: &Value, subtree: &Value, default_season: &str) -> String {
  subtree
    .get("season")
    .and_then(value_to_text)
    .or_else(|| snapshot.get("season").and_then(value_to_text))
    .unwrap_or_else(|| default_season.to_string())
}

/// A division or region sub-tree: either a bare stage list or an object
/// carrying `stages`.
fn archive_from_subtree(subtree: &Value, season: String) -> SeasonArchive {
  let stages = match subtree {
    Value::Array(_) => parse_stages(subtree),
    Value::Object(obj) => field(obj, &["stages"]).map(parse_stages).unwrap_or_default(),
    _ => Vec::new(),
  };
  SeasonArchive { season, stages }
}

// ── Single division ────────────────────────────────────────────────────

pub fn resolve(snapshot: &Value, division: Division) -> SeasonArchive {
  resolve_with(snapshot, division, &ResolveOptions::default())
}

pub fn resolve_with(snapshot: &Value, division: Division, options: &ResolveOptions) -> SeasonArchive {
  match locate_division(snapshot, division) {
    Some(subtree) => {
      let season = season_of(snapshot, subtree, &options.default_season);
      archive_from_subtree(subtree, season)
    }
    None => SeasonArchive::empty(&options.default_season),
  }
}

/// The archive plus every derived view of it.
pub fn resolve_division(snapshot: &Value, division: Division, options: &ResolveOptions) -> ResolvedDivision {
  resolved_views(resolve_with(snapshot, division, options), options.cutoff)
}

pub fn resolved_views(archive: SeasonArchive, cutoff: u32) -> ResolvedDivision {
  ResolvedDivision {
    standings: build_standings(&archive),
    qualifiers: build_qualifier_rows(&archive, cutoff),
    semifinal1: semifinal1_stage(&archive).cloned(),
    semifinal2: semifinal2_stage(&archive).cloned(),
    third_place: third_place_stage(&archive).cloned(),
    grand_final: grand_final_stage(&archive).cloned(),
    archive,
  }
}

// ── Arcade regions ─────────────────────────────────────────────────────

/// `(region key, region sub-tree)` pairs from a `regions` array or object.
fn region_entries(subtree: &Value) -> Vec<(String, &Value)> {
  match subtree.get("regions") {
    Some(Value::Array(items)) => items
      .iter()
      .filter_map(|item| {
        let obj = item.as_object()?;
        let key = text_field(obj, &["regionKey", "key", "region"])?;
        Some((key, item))
      })
      .collect(),
    Some(Value::Object(map)) => map
      .iter()
      .filter(|(key, item)| !key.trim().is_empty() && (item.is_object() || item.is_array()))
      .map(|(key, item)| (key.trim().to_string(), item))
      .collect(),
    _ => Vec::new(),
  }
}

fn region_archive(key: String, value: &Value, season: &str, options: &ResolveOptions) -> RegionArchive {
  let obj = value.as_object();
  let region_label = obj
    .and_then(|obj| text_field(obj, &["regionLabel", "label", "name"]))
    .unwrap_or_else(|| key.clone());
  let order = obj
    .and_then(|obj| field(obj, &["order"]))
    .and_then(value_to_i64)
    .unwrap_or(0);
  let region_season = value
    .get("season")
    .and_then(value_to_text)
    .unwrap_or_else(|| season.to_string());
  let archive = archive_from_subtree(value, region_season);

  let explicit_seeds = value
    .get("seeds")
    .map(|seeds| parse_seed_rows(seeds, &key, &region_label))
    .unwrap_or_default();
  let seeds = if explicit_seeds.is_empty() {
    build_seed_rows(&archive, &key, &region_label, options.cutoff)
  } else {
    explicit_seeds
  };

  RegionArchive {
    region_key: key,
    region_label,
    order,
    archive,
    seeds,
  }
}

fn region_archives<'a>(
  snapshot: &'a Value,
  options: &ResolveOptions,
) -> Option<(String, &'a Value, Vec<RegionArchive>)> {
  let subtree = locate_division(snapshot, Division::Arcade)?;
  let season = season_of(snapshot, subtree, &options.default_season);
  let mut regions: Vec<RegionArchive> = region_entries(subtree)
    .into_iter()
    .map(|(key, value)| region_archive(key, value, &season, options))
    .collect();
  regions.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.region_key.cmp(&b.region_key)));
  Some((season, subtree, regions))
}

/// One arcade region as its own season archive.
pub fn resolve_region(snapshot: &Value, region_key: &str, options: &ResolveOptions) -> SeasonArchive {
  let wanted = region_key.trim();
  region_archives(snapshot, options)
    .and_then(|(_, _, regions)| {
      regions
        .into_iter()
        .find(|region| region.region_key.eq_ignore_ascii_case(wanted))
    })
    .map(|region| region.archive)
    .unwrap_or_else(|| SeasonArchive::empty(&options.default_season))
}

/// Every arcade region plus the cross-bracket between the two seeded groups.
pub fn resolve_arcade(snapshot: &Value, options: &ResolveOptions) -> ArcadeArchive {
  let Some((season, subtree, regions)) = region_archives(snapshot, options) else {
    return ArcadeArchive {
      season: options.default_season.clone(),
      regions: Vec::new(),
      cross_matches: Vec::new(),
    };
  };

  let (group_a, group_b) = cross_groups(subtree, &regions);
  let cross_matches = resolve_cross_matches(
    group_a.map(|region| region.seeds.as_slice()).unwrap_or_default(),
    group_b.map(|region| region.seeds.as_slice()).unwrap_or_default(),
    subtree.get("crossMatches"),
  );

  ArcadeArchive {
    season,
    regions,
    cross_matches,
  }
}

/// `crossGroups: [a, b]` when both name known regions, else the first two regions.
fn cross_groups<'a>(
  subtree: &Value,
  regions: &'a [RegionArchive],
) -> (Option<&'a RegionArchive>, Option<&'a RegionArchive>) {
  let find = |key: &str| {
    regions
      .iter()
      .find(|region| region.region_key.eq_ignore_ascii_case(key.trim()))
  };
  let named: Vec<String> = subtree
    .get("crossGroups")
    .and_then(Value::as_array)
    .map(|items| items.iter().filter_map(value_to_text).collect())
    .unwrap_or_default();
  if let [a, b] = named.as_slice() {
    if let (Some(a), Some(b)) = (find(a.as_str()), find(b.as_str())) {
      return (Some(a), Some(b));
    }
  }
  (regions.first(), regions.get(1))
}

// ── Memoisation ────────────────────────────────────────────────────────

/// Caller-owned memo of the most recent snapshot's resolved views.
///
/// Entries are keyed by snapshot identity (`Arc` pointer) and options; any
/// other snapshot evicts the entry.
#[derive(Default)]
pub struct ArchiveCache {
  snapshot: Option<Arc<Value>>,
  options: ResolveOptions,
  console: Option<Arc<ResolvedDivision>>,
  arcade: Option<Arc<ArcadeArchive>>,
}

impl ArchiveCache {
  pub fn new() -> Self {
    ArchiveCache::default()
  }

  fn sync(&mut self, snapshot: &Arc<Value>, options: &ResolveOptions) {
    let same = self
      .snapshot
      .as_ref()
      .map(|cached| Arc::ptr_eq(cached, snapshot))
      .unwrap_or(false);
    if !same || self.options != *options {
      self.snapshot = Some(Arc::clone(snapshot));
      self.options = options.clone();
      self.console = None;
      self.arcade = None;
    }
  }

  pub fn console(&mut self, snapshot: &Arc<Value>, options: &ResolveOptions) -> Arc<ResolvedDivision> {
    self.sync(snapshot, options);
    self
      .console
      .get_or_insert_with(|| Arc::new(resolve_division(snapshot, Division::Console, options)))
      .clone()
  }

  pub fn arcade(&mut self, snapshot: &Arc<Value>, options: &ResolveOptions) -> Arc<ArcadeArchive> {
    self.sync(snapshot, options);
    self
      .arcade
      .get_or_insert_with(|| Arc::new(resolve_arcade(snapshot, options)))
      .clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::raw::sort_rows;
  use serde_json::json;

  fn console_feed() -> Value {
    json!({
      "season": 2025,
      "results": {
        "console": {
          "season": "2026",
          "stages": [
            { "stageKey": "grand-final", "order": 4, "rows": [
              { "nickname": "Katsu", "rank": 2, "detail": "E-2 procon" },
              { "nickname": "Don", "rank": 1, "detail": "E-1 joy-con" }
            ]},
            { "stageKey": "online-qualifier", "order": 1, "rows": [
              { "nickname": "Don", "rank": 1, "score": "998,000" },
              { "nickname": "", "rank": 2 },
              { "name": "Katsu", "rank": 3 },
              { "nickname": "Ka", "rank": 2 },
              { "nickname": "Dodon", "rank": 5 }
            ]},
            { "label": "no key", "rows": [] },
            { "stageKey": "sf-1", "order": 2, "rows": [] }
          ]
        }
      }
    })
  }

  #[test]
  fn test_resolve_is_idempotent() {
    let feed = console_feed();
    let first = resolve(&feed, Division::Console);
    let second = resolve(&feed, Division::Console);
    assert_eq!(first, second);
    assert_eq!(
      serde_json::to_string(&first).unwrap(),
      serde_json::to_string(&second).unwrap()
    );
  }

  #[test]
  fn test_resolve_orders_stages_and_drops_keyless() {
    let archive = resolve(&console_feed(), Division::Console);
    assert_eq!(archive.season, "2026");
    let keys: Vec<&str> = archive.stages.iter().map(|stage| stage.stage_key.as_str()).collect();
    assert_eq!(keys, vec!["online-qualifier", "sf-1", "grand-final"]);
  }

  #[test]
  fn test_rows_sorted_and_named_in_every_stage() {
    let archive = resolve(&console_feed(), Division::Console);
    for stage in &archive.stages {
      let mut sorted = stage.rows.clone();
      sort_rows(&mut sorted);
      assert_eq!(sorted, stage.rows);
      let ranks: Vec<u32> = stage.rows.iter().map(|row| row.rank.unwrap_or(u32::MAX)).collect();
      assert!(ranks.windows(2).all(|pair| pair[0] <= pair[1]));
      assert!(stage.rows.iter().all(|row| !row.nickname.trim().is_empty()));
    }
    assert_eq!(archive.stages[0].rows.len(), 4);
  }

  #[test]
  fn test_empty_inputs_give_empty_archive() {
    for feed in [Value::Null, json!({}), json!([]), json!("feed"), json!({ "console": 3 })] {
      let archive = resolve(&feed, Division::Console);
      assert_eq!(archive, SeasonArchive::empty(DEFAULT_SEASON));
    }
  }

  #[test]
  fn test_nesting_shapes() {
    let stages = json!([{ "stageKey": "final", "rows": [] }]);
    let shapes = [
      json!({ "console": { "stages": stages.clone() } }),
      json!({ "results": { "console": { "stages": stages.clone() } } }),
      json!({ "consoleArchive": { "stages": stages.clone() } }),
      json!({ "console": stages.clone() }),
    ];
    for feed in shapes {
      let archive = resolve(&feed, Division::Console);
      assert_eq!(archive.stages.len(), 1, "{feed}");
    }
  }

  #[test]
  fn test_season_falls_back_to_root_then_default() {
    let feed = json!({ "season": 2025, "console": { "stages": [] } });
    assert_eq!(resolve(&feed, Division::Console).season, "2025");
    let options = ResolveOptions {
      default_season: "2027".to_string(),
      ..ResolveOptions::default()
    };
    assert_eq!(resolve_with(&json!({}), Division::Console, &options).season, "2027");
  }

  #[test]
  fn test_resolve_division_views() {
    let resolved = resolve_division(&console_feed(), Division::Console, &ResolveOptions::default());
    assert_eq!(resolved.standings.len(), 2);
    assert_eq!(resolved.standings[0].nickname, "Don");
    assert_eq!(resolved.qualifiers.len(), 4);
    let passed: Vec<&str> = resolved
      .qualifiers
      .iter()
      .filter(|row| row.passed)
      .map(|row| row.row.nickname.as_str())
      .collect();
    assert_eq!(passed, vec!["Don", "Ka", "Katsu"]);
    assert_eq!(resolved.semifinal1.as_ref().unwrap().stage_key, "sf-1");
    assert!(resolved.semifinal2.is_none());
    assert!(resolved.third_place.is_none());
    let final_rows = &resolved.grand_final.as_ref().unwrap().rows;
    assert_eq!(final_rows[0].entry_id.as_deref(), Some("E-1"));
  }

  fn region(label: &str, order: i64, base: u32) -> Value {
    let rows: Vec<Value> = (1..=5)
      .map(|rank| {
        json!({
          "nickname": format!("{label}{rank}"),
          "rank": rank,
          "detail": format!("E-{}", base + rank),
        })
      })
      .collect();
    json!({
      "regionLabel": label,
      "order": order,
      "stages": [{ "stageKey": "qualifier", "rows": rows }]
    })
  }

  fn arcade_feed() -> Value {
    json!({
      "arcade": {
        "season": "2026",
        "regions": {
          "busan": region("Busan", 2, 200),
          "seoul": region("Seoul", 1, 100),
          "daegu": region("Daegu", 3, 300)
        }
      }
    })
  }

  #[test]
  fn test_arcade_regions_ordered_and_seeded() {
    let arcade = resolve_arcade(&arcade_feed(), &ResolveOptions::default());
    let keys: Vec<&str> = arcade.regions.iter().map(|region| region.region_key.as_str()).collect();
    assert_eq!(keys, vec!["seoul", "busan", "daegu"]);
    let seoul = &arcade.regions[0];
    assert_eq!(seoul.region_label, "Seoul");
    assert_eq!(seoul.seeds.len(), 4);
    assert_eq!(seoul.seeds[0].entry_id.as_deref(), Some("E-101"));
  }

  #[test]
  fn test_arcade_cross_matches_use_first_two_regions() {
    let arcade = resolve_arcade(&arcade_feed(), &ResolveOptions::default());
    let pairs: Vec<(&str, &str)> = arcade
      .cross_matches
      .iter()
      .map(|m| (m.left.nickname.as_str(), m.right.nickname.as_str()))
      .collect();
    assert_eq!(
      pairs,
      vec![("Seoul1", "Busan4"), ("Seoul2", "Busan3"), ("Seoul3", "Busan2"), ("Seoul4", "Busan1")]
    );
  }

  #[test]
  fn test_arcade_named_cross_groups_and_recorded_winner() {
    let mut feed = arcade_feed();
    feed["arcade"]["crossGroups"] = json!(["daegu", "seoul"]);
    feed["arcade"]["crossMatches"] = json!([{ "matchNo": 1, "winnerEntryId": "E-301" }]);
    let arcade = resolve_arcade(&feed, &ResolveOptions::default());
    assert_eq!(arcade.cross_matches[0].left.nickname, "Daegu1");
    assert_eq!(arcade.cross_matches[0].right.nickname, "Seoul4");
    assert_eq!(arcade.cross_matches[0].winner_entry_id.as_deref(), Some("E-301"));
  }

  #[test]
  fn test_explicit_region_seeds_win() {
    let feed = json!({
      "arcadeArchive": {
        "regions": [
          { "regionKey": "seoul", "seeds": [
            { "seed": 1, "nickname": "Don", "entryId": "E-9" }
          ], "stages": [] }
        ]
      }
    });
    let arcade = resolve_arcade(&feed, &ResolveOptions::default());
    assert_eq!(arcade.season, DEFAULT_SEASON);
    assert_eq!(arcade.regions[0].seeds.len(), 1);
    assert_eq!(arcade.regions[0].seeds[0].region_key, "seoul");
    assert!(arcade.cross_matches.is_empty());
  }

  #[test]
  fn test_resolve_region() {
    let archive = resolve_region(&arcade_feed(), "Busan", &ResolveOptions::default());
    assert_eq!(archive.stages.len(), 1);
    assert_eq!(archive.stages[0].rows[0].nickname, "Busan1");
    let missing = resolve_region(&arcade_feed(), "jeju", &ResolveOptions::default());
    assert!(missing.stages.is_empty());
  }

  #[test]
  fn test_empty_arcade() {
    let arcade = resolve_arcade(&Value::Null, &ResolveOptions::default());
    assert!(arcade.regions.is_empty());
    assert!(arcade.cross_matches.is_empty());
  }

  #[test]
  fn test_cache_reuses_until_snapshot_changes() {
    let options = ResolveOptions::default();
    let mut cache = ArchiveCache::new();
    let snapshot = Arc::new(console_feed());
    let first = cache.console(&snapshot, &options);
    let second = cache.console(&snapshot, &options);
    assert!(Arc::ptr_eq(&first, &second));

    let equal_but_new = Arc::new(console_feed());
    let third = cache.console(&equal_but_new, &options);
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(*first, *third);

    let stricter = ResolveOptions { cutoff: 1, ..options };
    let fourth = cache.console(&equal_but_new, &stricter);
    assert_eq!(fourth.qualifiers.iter().filter(|row| row.passed).count(), 1);
  }
}
