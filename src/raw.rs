use crate::identity::{extract_identity, normalize_entry_id, parse_controller};
use crate::types::{ResultRow, Stage};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

const NICKNAME_KEYS: &[&str] = &["nickname", "name"];
const RANK_KEYS: &[&str] = &["rank", "place"];
const DETAIL_KEYS: &[&str] = &["detail", "memo"];
const ENTRY_ID_KEYS: &[&str] = &["entryId", "entry_id"];
const STAGE_KEY_KEYS: &[&str] = &["stageKey", "key", "stage"];
const STAGE_LABEL_KEYS: &[&str] = &["stageLabel", "label", "title"];
const STAGE_ROWS_KEYS: &[&str] = &["rows", "entries"];
const UPDATED_AT_KEYS: &[&str] = &["updatedAt", "updated_at"];

// ── Scalar coercions ───────────────────────────────────────────────────

pub fn value_to_f64(value: &Value) -> Option<f64> {
  let parsed = match value {
    Value::Number(num) => num.as_f64(),
    Value::String(raw) => {
      let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
      if cleaned.is_empty() {
        None
      } else {
        cleaned.parse::<f64>().ok()
      }
    }
    _ => None,
  };
  parsed.filter(|num| num.is_finite())
}

/// Positive integral rank. `0`, negatives and fractions are "no rank".
pub fn value_to_rank(value: &Value) -> Option<u32> {
  let num = value_to_f64(value)?;
  if num < 1.0 || num.fract() != 0.0 || num > f64::from(u32::MAX) {
    return None;
  }
  Some(num as u32)
}

pub fn value_to_i64(value: &Value) -> Option<i64> {
  let num = value_to_f64(value)?;
  if num.abs() > 9.0e15 {
    return None;
  }
  Some(num.trunc() as i64)
}

pub fn value_to_text(value: &Value) -> Option<String> {
  let text = match value {
    Value::String(raw) => raw.trim().to_string(),
    Value::Number(num) => num.to_string(),
    _ => return None,
  };
  if text.is_empty() {
    None
  } else {
    Some(text)
  }
}

/// RFC 3339 text, or epoch seconds / milliseconds.
pub fn value_to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
  if let Some(text) = value.as_str() {
    let trimmed = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
      return Some(parsed.with_timezone(&Utc));
    }
  }
  let epoch = value_to_i64(value)?;
  if epoch > 1_000_000_000_000 {
    DateTime::from_timestamp_millis(epoch)
  } else if epoch > 0 {
    DateTime::from_timestamp(epoch, 0)
  } else {
    None
  }
}

// ── Field lookup ───────────────────────────────────────────────────────

pub fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
  keys
    .iter()
    .filter_map(|key| obj.get(*key))
    .find(|value| !value.is_null())
}

/// First key whose value resolves to non-empty text.
pub fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
  keys
    .iter()
    .filter_map(|key| obj.get(*key))
    .find_map(value_to_text)
}

// ── Rows ───────────────────────────────────────────────────────────────

pub fn parse_row(value: &Value) -> Option<ResultRow> {
  let obj = value.as_object()?;
  let Some(nickname) = text_field(obj, NICKNAME_KEYS) else {
    debug!("dropping result row without nickname");
    return None;
  };
  let detail = text_field(obj, DETAIL_KEYS).unwrap_or_default();
  let mined = extract_identity(&nickname, &detail);

  let entry_id = text_field(obj, ENTRY_ID_KEYS)
    .and_then(|raw| normalize_entry_id(&raw))
    .or(mined.entry_id);
  let controller = text_field(obj, &["controller"])
    .map(|raw| parse_controller(&raw))
    .filter(|controller| !controller.is_unknown())
    .unwrap_or(mined.controller);
  let s1 = field(obj, &["s1"]).and_then(value_to_f64).or(mined.s1);
  let s2 = field(obj, &["s2"]).and_then(value_to_f64).or(mined.s2);

  Some(ResultRow {
    rank: field(obj, RANK_KEYS).and_then(value_to_rank),
    nickname,
    score: field(obj, &["score"]).and_then(value_to_f64),
    detail,
    entry_id,
    controller,
    s1,
    s2,
  })
}

pub fn parse_rows(value: &Value) -> Vec<ResultRow> {
  let mut rows: Vec<ResultRow> = value
    .as_array()
    .map(|items| items.iter().filter_map(parse_row).collect())
    .unwrap_or_default();
  sort_rows(&mut rows);
  rows
}

/// Rank ascending, unranked rows last; ties keep feed order.
pub fn sort_rows(rows: &mut [ResultRow]) {
  rows.sort_by_key(|row| row.rank.unwrap_or(u32::MAX));
}

// ── Stages ─────────────────────────────────────────────────────────────

pub fn parse_stage(value: &Value, fallback_key: Option<&str>) -> Option<Stage> {
  let obj = value.as_object()?;
  let stage_key = text_field(obj, STAGE_KEY_KEYS).or_else(|| {
    fallback_key
      .map(str::trim)
      .filter(|key| !key.is_empty())
      .map(str::to_string)
  });
  let Some(stage_key) = stage_key else {
    debug!("dropping stage without stageKey");
    return None;
  };
  let stage_label = text_field(obj, STAGE_LABEL_KEYS).unwrap_or_else(|| stage_key.clone());

  Some(Stage {
    stage_label,
    order: field(obj, &["order"]).and_then(value_to_i64).unwrap_or(0),
    status: text_field(obj, &["status"]).unwrap_or_default(),
    note: text_field(obj, &["note"]).unwrap_or_default(),
    updated_at: field(obj, UPDATED_AT_KEYS).and_then(value_to_timestamp),
    rows: field(obj, STAGE_ROWS_KEYS).map(parse_rows).unwrap_or_default(),
    stage_key,
  })
}

/// Accepts an array of stages or an object keyed by stage key.
pub fn parse_stages(value: &Value) -> Vec<Stage> {
  let mut stages: Vec<Stage> = match value {
    Value::Array(items) => items
      .iter()
      .filter_map(|item| parse_stage(item, None))
      .collect(),
    Value::Object(map) => map
      .iter()
      .filter_map(|(key, item)| parse_stage(item, Some(key.as_str())))
      .collect(),
    _ => Vec::new(),
  };
  stages.sort_by_key(|stage| stage.order);
  stages
}
