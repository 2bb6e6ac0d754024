use crate::types::Controller;
use once_cell::sync::Lazy;
use regex::Regex;

static ENTRY_ID_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)E-(\d+)").expect("entry id pattern"));
static S1_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)\bs1\s*[:=]\s*(\d[\d,]*(?:\.\d+)?)").expect("s1 pattern"));
static S2_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)\bs2\s*[:=]\s*(\d[\d,]*(?:\.\d+)?)").expect("s2 pattern"));

// Checked in order; the first category with a hit wins.
const CONTROLLER_VOCABULARY: &[(Controller, &[&str])] = &[
  (Controller::JoyCon, &["joy-con", "joycon", "joy con"]),
  (
    Controller::ProController,
    &["pro controller", "pro-controller", "procon", "pro-con", "pro con"],
  ),
  (Controller::Tatacon, &["tatacon", "tata-con", "taiko drum", "drum controller"]),
];

/// Identifiers mined out of a row's nickname and free-text detail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryIdentity {
  pub entry_id: Option<String>,
  pub controller: Controller,
  pub s1: Option<f64>,
  pub s2: Option<f64>,
}

pub fn extract_identity(nickname: &str, detail: &str) -> EntryIdentity {
  EntryIdentity {
    entry_id: extract_entry_id(nickname, detail),
    controller: classify_controller(detail),
    s1: extract_sub_score(&S1_RE, detail),
    s2: extract_sub_score(&S2_RE, detail),
  }
}

/// First `E-<digits>` in `detail`, then in `nickname`, upper-cased.
pub fn extract_entry_id(nickname: &str, detail: &str) -> Option<String> {
  [detail, nickname]
    .into_iter()
    .find_map(|text| ENTRY_ID_RE.captures(text))
    .and_then(|caps| caps.get(1))
    .map(|digits| format!("E-{}", digits.as_str()))
}

/// Normalises an entry id that arrived as a structured field.
pub fn normalize_entry_id(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }
  if let Some(id) = extract_entry_id("", trimmed) {
    return Some(id);
  }
  if trimmed.chars().all(|c| c.is_ascii_digit()) {
    return Some(format!("E-{trimmed}"));
  }
  None
}

pub fn classify_controller(detail: &str) -> Controller {
  let lower = detail.to_lowercase();
  if lower.trim().is_empty() {
    return Controller::Unknown;
  }
  CONTROLLER_VOCABULARY
    .iter()
    .find(|(_, tokens)| tokens.iter().any(|token| lower.contains(token)))
    .map(|(controller, _)| *controller)
    .unwrap_or_default()
}

/// Maps a structured `controller` field onto the vocabulary.
pub fn parse_controller(raw: &str) -> Controller {
  let lower = raw.trim().to_lowercase();
  match lower.as_str() {
    "joycon" => Controller::JoyCon,
    "procon" => Controller::ProController,
    "tatacon" => Controller::Tatacon,
    _ => classify_controller(&lower),
  }
}

fn extract_sub_score(pattern: &Regex, detail: &str) -> Option<f64> {
  let caps = pattern.captures(detail)?;
  let digits = caps.get(1)?.as_str().replace(',', "");
  digits.parse::<f64>().ok().filter(|value| value.is_finite())
}
