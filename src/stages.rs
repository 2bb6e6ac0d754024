use crate::types::{SeasonArchive, Stage};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StageRole {
  Qualifier,
  SemiFinal1,
  SemiFinal2,
  ThirdPlace,
  GrandFinal,
  Standings,
}

impl StageRole {
  /// Most specific role first; `classify` relies on this order.
  pub const CLASSIFY_ORDER: [StageRole; 6] = [
    StageRole::ThirdPlace,
    StageRole::SemiFinal1,
    StageRole::SemiFinal2,
    StageRole::Qualifier,
    StageRole::Standings,
    StageRole::GrandFinal,
  ];

  pub fn aliases(self) -> &'static [&'static str] {
    match self {
      StageRole::Qualifier => &["qualifier", "online", "qual", "prelim"],
      StageRole::SemiFinal1 => &["semifinal1", "semifinala", "semi1", "sf1"],
      StageRole::SemiFinal2 => &["semifinal2", "semifinalb", "semi2", "sf2"],
      StageRole::ThirdPlace => &["thirdplace", "3rdplace", "third", "bronze", "3rd"],
      StageRole::GrandFinal => &["grandfinal", "final"],
      StageRole::Standings => &["standings", "ranking", "result", "podium"],
    }
  }

  /// Normalised markers that disqualify a key from this role.
  pub fn rejects(self) -> &'static [&'static str] {
    match self {
      StageRole::GrandFinal => EARLIER_ROUND_MARKERS,
      _ => &[],
    }
  }

  /// The role a raw stage key belongs to, if any.
  pub fn classify(stage_key: &str) -> Option<StageRole> {
    let key = normalize_stage_key(stage_key);
    if key.is_empty() {
      return None;
    }
    StageRole::CLASSIFY_ORDER.into_iter().find(|role| {
      role.aliases().iter().any(|alias| key_matches(&key, alias))
        && !role.rejects().iter().any(|marker| key.contains(*marker))
    })
  }
}

// Bracket rounds before the final; `quarterfinal` or a bare `semifinal` is
// never the grand final.
const EARLIER_ROUND_MARKERS: &[&str] = &["quarter", "semi", "sf", "qf"];

/// Lower-cases and strips everything but letters and digits.
pub fn normalize_stage_key(raw: &str) -> String {
  raw
    .chars()
    .filter(|c| c.is_alphanumeric())
    .flat_map(char::to_lowercase)
    .collect()
}

fn key_matches(normalized_key: &str, alias: &str) -> bool {
  !alias.is_empty() && normalized_key.contains(alias)
}

/// Candidates are tried in order; the first one with any match wins and the
/// earliest stage matching it is returned.
pub fn find_stage<'a>(archive: &'a SeasonArchive, candidates: &[&str]) -> Option<&'a Stage> {
  for candidate in candidates {
    let alias = normalize_stage_key(candidate);
    if alias.is_empty() {
      continue;
    }
    let found = archive
      .stages
      .iter()
      .find(|stage| key_matches(&normalize_stage_key(&stage.stage_key), &alias));
    if found.is_some() {
      return found;
    }
  }
  None
}

/// Like [`find_stage`] over the role's aliases, but skips stages that belong
/// to a more specific role (so `final` never captures `semifinal1`).
pub fn find_role(archive: &SeasonArchive, role: StageRole) -> Option<&Stage> {
  for alias in role.aliases() {
    let mut matches = archive.stages.iter().filter(|stage| {
      key_matches(&normalize_stage_key(&stage.stage_key), alias)
        && StageRole::classify(&stage.stage_key) == Some(role)
    });
    let Some(first) = matches.next() else {
      continue;
    };
    let ignored: Vec<&str> = matches.map(|stage| stage.stage_key.as_str()).collect();
    if !ignored.is_empty() {
      warn!(
        "duplicate {:?} stages in season {}: using {}, ignoring {}",
        role,
        archive.season,
        first.stage_key,
        ignored.join(", ")
      );
    }
    return Some(first);
  }
  None
}

pub fn qualifier_stage(archive: &SeasonArchive) -> Option<&Stage> {
  find_role(archive, StageRole::Qualifier)
}

pub fn semifinal1_stage(archive: &SeasonArchive) -> Option<&Stage> {
  find_role(archive, StageRole::SemiFinal1)
}

pub fn semifinal2_stage(archive: &SeasonArchive) -> Option<&Stage> {
  find_role(archive, StageRole::SemiFinal2)
}

pub fn third_place_stage(archive: &SeasonArchive) -> Option<&Stage> {
  find_role(archive, StageRole::ThirdPlace)
}

pub fn grand_final_stage(archive: &SeasonArchive) -> Option<&Stage> {
  find_role(archive, StageRole::GrandFinal)
}

pub fn standings_stage(archive: &SeasonArchive) -> Option<&Stage> {
  find_role(archive, StageRole::Standings)
}
