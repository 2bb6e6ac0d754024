use crate::stages::qualifier_stage;
use crate::types::{QualifierRow, ResultRow, SeasonArchive, SeedRow};
use std::cmp::Ordering;

/// Every qualifier row, annotated with pass/fail against `cutoff`.
///
/// Unranked rows never pass, whatever the cutoff.
pub fn build_qualifier_rows(archive: &SeasonArchive, cutoff: u32) -> Vec<QualifierRow> {
  let Some(stage) = qualifier_stage(archive) else {
    return Vec::new();
  };
  stage
    .rows
    .iter()
    .map(|row| qualifier_row(row, cutoff))
    .collect()
}

fn passed_rank(row: &ResultRow, cutoff: u32) -> Option<u32> {
  row.rank.filter(|rank| *rank <= cutoff)
}

pub fn qualifier_row(row: &ResultRow, cutoff: u32) -> QualifierRow {
  let passed_rank = passed_rank(row, cutoff);
  QualifierRow {
    row: row.clone(),
    passed: passed_rank.is_some(),
    seed: passed_rank.map(|rank| format!("#{rank}")),
  }
}

/// Seeds `1..=cutoff` for a region's qualifier, best first. Only rows that
/// passed the cutoff are seeded.
///
/// Ordering is rank ascending, then score descending, then feed order, so
/// seeds stay unique even when the feed repeats a rank.
pub fn build_seed_rows(
  archive: &SeasonArchive,
  region_key: &str,
  region_label: &str,
  cutoff: u32,
) -> Vec<SeedRow> {
  let Some(stage) = qualifier_stage(archive) else {
    return Vec::new();
  };
  let mut ordered: Vec<&ResultRow> = stage
    .rows
    .iter()
    .filter(|row| passed_rank(row, cutoff).is_some())
    .collect();
  ordered.sort_by(|a, b| compare_for_seeding(a, b));
  ordered
    .into_iter()
    .take(cutoff as usize)
    .enumerate()
    .map(|(idx, row)| SeedRow {
      seed: idx as u32 + 1,
      region_key: region_key.to_string(),
      region_label: region_label.to_string(),
      entry_id: row.entry_id.clone(),
      nickname: row.nickname.clone(),
      score: row.score,
    })
    .collect()
}

fn compare_for_seeding(a: &ResultRow, b: &ResultRow) -> Ordering {
  let rank_a = a.rank.unwrap_or(u32::MAX);
  let rank_b = b.rank.unwrap_or(u32::MAX);
  rank_a.cmp(&rank_b).then_with(|| {
    let score_a = a.score.unwrap_or(f64::NEG_INFINITY);
    let score_b = b.score.unwrap_or(f64::NEG_INFINITY);
    score_b.partial_cmp(&score_a).unwrap_or(Ordering::Equal)
  })
}
