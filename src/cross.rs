use crate::identity::{extract_entry_id, normalize_entry_id};
use crate::raw::{field, text_field, value_to_f64, value_to_rank, value_to_text};
use crate::types::{CrossMatch, SeedRow, CROSS_GROUP_SIZE};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Fixed cross-seeding A1-B4, A2-B3, A3-B2, A4-B1.
///
/// Empty until both groups have four seeds.
pub fn derive_cross_matches(group_a: &[SeedRow], group_b: &[SeedRow]) -> Vec<CrossMatch> {
  if group_a.len() < CROSS_GROUP_SIZE || group_b.len() < CROSS_GROUP_SIZE {
    return Vec::new();
  }
  let a = sorted_by_seed(group_a);
  let b = sorted_by_seed(group_b);
  (0..CROSS_GROUP_SIZE)
    .map(|idx| CrossMatch {
      match_no: idx as u8 + 1,
      left: a[idx].clone(),
      right: b[CROSS_GROUP_SIZE - 1 - idx].clone(),
      winner_entry_id: None,
      note: None,
    })
    .collect()
}

fn sorted_by_seed(group: &[SeedRow]) -> Vec<&SeedRow> {
  let mut rows: Vec<&SeedRow> = group.iter().collect();
  rows.sort_by_key(|row| row.seed);
  rows
}

/// Matches entered in the feed replace derived ones with the same number.
pub fn resolve_cross_matches(
  group_a: &[SeedRow],
  group_b: &[SeedRow],
  explicit: Option<&Value>,
) -> Vec<CrossMatch> {
  let derived = derive_cross_matches(group_a, group_b);
  let recorded = explicit
    .map(|value| parse_explicit_matches(value, group_a, group_b, &derived))
    .unwrap_or_default();
  if recorded.is_empty() {
    return derived;
  }
  let mut out: Vec<CrossMatch> = derived
    .into_iter()
    .filter(|derived| !recorded.iter().any(|m| m.match_no == derived.match_no))
    .collect();
  out.extend(recorded);
  out.sort_by_key(|m| m.match_no);
  out
}

/// Decodes a `crossMatches` array. Sides may be seed objects or bare entry
/// ids; a match that names no sides borrows them from the derived match with
/// the same number. Unresolvable matches are dropped.
pub fn parse_explicit_matches(
  value: &Value,
  group_a: &[SeedRow],
  group_b: &[SeedRow],
  derived: &[CrossMatch],
) -> Vec<CrossMatch> {
  let Some(items) = value.as_array() else {
    return Vec::new();
  };
  let mut seen = HashSet::new();
  let mut out = Vec::new();
  for item in items {
    let Some(obj) = item.as_object() else {
      continue;
    };
    let Some(match_no) = field(obj, &["matchNo", "match_no", "match"])
      .and_then(value_to_rank)
      .filter(|no| *no as usize <= CROSS_GROUP_SIZE)
      .map(|no| no as u8)
    else {
      continue;
    };
    if seen.contains(&match_no) {
      continue;
    }
    let fallback = derived.iter().find(|m| m.match_no == match_no);
    let left = resolve_side(obj, "left", group_a, group_b)
      .or_else(|| fallback.map(|m| m.left.clone()));
    let right = resolve_side(obj, "right", group_a, group_b)
      .or_else(|| fallback.map(|m| m.right.clone()));
    let (Some(left), Some(right)) = (left, right) else {
      continue;
    };
    let winner_entry_id = resolve_winner(obj, &left, &right);
    seen.insert(match_no);
    out.push(CrossMatch {
      match_no,
      left,
      right,
      winner_entry_id,
      note: text_field(obj, &["note"]),
    });
  }
  out.sort_by_key(|m| m.match_no);
  out
}

fn resolve_side(
  obj: &Map<String, Value>,
  side: &str,
  group_a: &[SeedRow],
  group_b: &[SeedRow],
) -> Option<SeedRow> {
  let lookup = |entry_id: &str| {
    group_a
      .iter()
      .chain(group_b.iter())
      .find(|row| row.entry_id.as_deref() == Some(entry_id))
      .cloned()
  };
  let id_key = format!("{side}EntryId");
  if let Some(entry_id) = text_field(obj, &[id_key.as_str()]).and_then(|raw| normalize_entry_id(&raw)) {
    if let Some(row) = lookup(&entry_id) {
      return Some(row);
    }
  }
  let side_value = obj.get(side)?;
  if let Some(entry_id) = value_entry_id(side_value) {
    if let Some(row) = lookup(&entry_id) {
      return Some(row);
    }
  }
  parse_seed_row(side_value, "", "")
}

fn value_entry_id(value: &Value) -> Option<String> {
  let raw = match value {
    Value::Object(obj) => text_field(obj, &["entryId", "entry_id"]),
    other => value_to_text(other),
  };
  raw.and_then(|raw| normalize_entry_id(&raw))
}

fn resolve_winner(obj: &Map<String, Value>, left: &SeedRow, right: &SeedRow) -> Option<String> {
  let raw = text_field(obj, &["winnerEntryId", "winner"])?;
  if let Some(entry_id) = normalize_entry_id(&raw) {
    return Some(entry_id);
  }
  [left, right]
    .into_iter()
    .find(|side| side.nickname.eq_ignore_ascii_case(&raw))
    .and_then(|side| side.entry_id.clone())
}

/// A seed object from the feed. Region fields default to the given region.
pub fn parse_seed_row(value: &Value, region_key: &str, region_label: &str) -> Option<SeedRow> {
  let obj = value.as_object()?;
  let seed = field(obj, &["seed"]).and_then(value_to_rank)?;
  let nickname = text_field(obj, &["nickname", "name"])?;
  let region_key = text_field(obj, &["regionKey", "region"]).unwrap_or_else(|| region_key.to_string());
  let region_label = text_field(obj, &["regionLabel"])
    .or_else(|| Some(region_label.to_string()).filter(|label| !label.is_empty()))
    .unwrap_or_else(|| region_key.clone());
  let entry_id = text_field(obj, &["entryId", "entry_id"])
    .and_then(|raw| normalize_entry_id(&raw))
    .or_else(|| extract_entry_id(&nickname, ""));
  Some(SeedRow {
    seed,
    region_key,
    region_label,
    entry_id,
    nickname,
    score: field(obj, &["score"]).and_then(value_to_f64),
  })
}

/// Explicit `seeds` array, ordered by seed; duplicate seed numbers keep the first.
pub fn parse_seed_rows(value: &Value, region_key: &str, region_label: &str) -> Vec<SeedRow> {
  let Some(items) = value.as_array() else {
    return Vec::new();
  };
  let mut seen = HashSet::new();
  let mut rows: Vec<SeedRow> = items
    .iter()
    .filter_map(|item| parse_seed_row(item, region_key, region_label))
    .filter(|row| seen.insert(row.seed))
    .collect();
  rows.sort_by_key(|row| row.seed);
  rows
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn seed(region: &str, seed: u32) -> SeedRow {
    let region_no = if region == "a" { 1 } else { 2 };
    SeedRow {
      seed,
      region_key: region.to_string(),
      region_label: region.to_uppercase(),
      entry_id: Some(format!("E-{region_no}{seed}")),
      nickname: format!("{region}{seed}"),
      score: None,
    }
  }

  fn group(region: &str) -> Vec<SeedRow> {
    (1..=4).map(|n| seed(region, n)).collect()
  }

  fn pairs(matches: &[CrossMatch]) -> Vec<(u8, String, String)> {
    matches
      .iter()
      .map(|m| (m.match_no, m.left.nickname.clone(), m.right.nickname.clone()))
      .collect()
  }

  fn expected_pairs() -> Vec<(u8, String, String)> {
    vec![
      (1, "a1".to_string(), "b4".to_string()),
      (2, "a2".to_string(), "b3".to_string()),
      (3, "a3".to_string(), "b2".to_string()),
      (4, "a4".to_string(), "b1".to_string()),
    ]
  }

  #[test]
  fn test_fixed_cross_seeding() {
    let matches = derive_cross_matches(&group("a"), &group("b"));
    assert_eq!(pairs(&matches), expected_pairs());
    assert!(matches.iter().all(|m| m.winner_entry_id.is_none()));
  }

  #[test]
  fn test_cross_seeding_ignores_input_order() {
    let mut a = group("a");
    let mut b = group("b");
    a.reverse();
    b.swap(0, 2);
    assert_eq!(pairs(&derive_cross_matches(&a, &b)), expected_pairs());
    assert_eq!(derive_cross_matches(&a, &b), derive_cross_matches(&group("a"), &group("b")));
  }

  #[test]
  fn test_short_group_yields_nothing() {
    let short: Vec<SeedRow> = group("b").into_iter().take(3).collect();
    assert!(derive_cross_matches(&group("a"), &short).is_empty());
    assert!(derive_cross_matches(&[], &[]).is_empty());
  }

  #[test]
  fn test_recorded_winner_overlays_derived_match() {
    let explicit = json!([{ "matchNo": 2, "winnerEntryId": "e-23", "note": "close" }]);
    let matches = resolve_cross_matches(&group("a"), &group("b"), Some(&explicit));
    assert_eq!(pairs(&matches), expected_pairs());
    assert_eq!(matches[1].winner_entry_id.as_deref(), Some("E-23"));
    assert_eq!(matches[1].note.as_deref(), Some("close"));
    assert!(matches[0].winner_entry_id.is_none());
  }

  #[test]
  fn test_explicit_sides_take_precedence() {
    let explicit = json!([
      { "matchNo": 1, "leftEntryId": "E-11", "rightEntryId": "E-21", "winner": "b1" }
    ]);
    let matches = resolve_cross_matches(&group("a"), &group("b"), Some(&explicit));
    assert_eq!(matches.len(), 4);
    assert_eq!(matches[0].right.nickname, "b1");
    assert_eq!(matches[0].winner_entry_id.as_deref(), Some("E-21"));
  }

  #[test]
  fn test_explicit_matches_without_derivable_bracket() {
    let explicit = json!([
      { "matchNo": 3, "left": { "seed": 3, "nickname": "Don", "regionKey": "a" },
        "right": { "seed": 2, "nickname": "Katsu", "regionKey": "b" } },
      { "matchNo": 1, "left": { "seed": 1, "nickname": "Ka" } },
      { "matchNo": 9, "left": { "seed": 1, "nickname": "X" }, "right": { "seed": 1, "nickname": "Y" } }
    ]);
    let matches = resolve_cross_matches(&[], &[], Some(&explicit));
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].match_no, 3);
    assert_eq!(matches[0].left.nickname, "Don");
    assert_eq!(matches[0].right.region_key, "b");
  }

  #[test]
  fn test_malformed_explicit_falls_back_to_derivation() {
    let explicit = json!({ "matchNo": 1 });
    let matches = resolve_cross_matches(&group("a"), &group("b"), Some(&explicit));
    assert_eq!(pairs(&matches), expected_pairs());
  }

  #[test]
  fn test_parse_seed_rows_drops_invalid_and_duplicates() {
    let rows = parse_seed_rows(
      &json!([
        { "seed": 2, "nickname": "Katsu", "entryId": "E-2", "score": "1,000" },
        { "seed": 1, "name": "Don" },
        { "seed": 2, "nickname": "Dup" },
        { "seed": 0, "nickname": "Zero" },
        { "nickname": "NoSeed" }
      ]),
      "seoul",
      "Seoul",
    );
    let names: Vec<&str> = rows.iter().map(|row| row.nickname.as_str()).collect();
    assert_eq!(names, vec!["Don", "Katsu"]);
    assert_eq!(rows[1].score, Some(1000.0));
    assert_eq!(rows[1].entry_id.as_deref(), Some("E-2"));
    assert_eq!(rows[0].region_label, "Seoul");
  }
}
