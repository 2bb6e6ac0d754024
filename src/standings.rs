use crate::raw::sort_rows;
use crate::stages::{grand_final_stage, standings_stage, third_place_stage};
use crate::types::{ResultRow, SeasonArchive, Stage, Standing};

/// Final placings for a division.
///
/// A dedicated standings stage is authoritative. Without one, ranks 1/2 come
/// from the grand final and 3/4 from the third-place match; either pair is left
/// out while its stage is missing, short, or tied.
pub fn build_standings(archive: &SeasonArchive) -> Vec<Standing> {
  if let Some(stage) = standings_stage(archive).filter(|stage| !stage.rows.is_empty()) {
    return standings_from_stage(stage);
  }

  let mut out = Vec::new();
  if let Some(pair) = grand_final_stage(archive).and_then(|stage| decided_pair(stage, 1)) {
    out.extend(pair);
  }
  if let Some(pair) = third_place_stage(archive).and_then(|stage| decided_pair(stage, 3)) {
    out.extend(pair);
  }
  out.sort_by_key(|standing| standing.rank);
  out
}

// Unranked rows are placed after the highest explicit rank, in feed order.
fn standings_from_stage(stage: &Stage) -> Vec<Standing> {
  let mut next_rank = stage.rows.iter().filter_map(|row| row.rank).max().unwrap_or(0);
  let mut out: Vec<Standing> = stage
    .rows
    .iter()
    .map(|row| {
      let rank = row.rank.unwrap_or_else(|| {
        next_rank += 1;
        next_rank
      });
      Standing {
        rank,
        nickname: row.nickname.clone(),
      }
    })
    .collect();
  out.sort_by_key(|standing| standing.rank);
  out
}

/// Winner/runner-up of a two-player stage, ranked `first_rank` and `first_rank + 1`.
fn decided_pair(stage: &Stage, first_rank: u32) -> Option<[Standing; 2]> {
  if stage.rows.len() < 2 {
    return None;
  }
  let mut rows: Vec<ResultRow> = stage.rows.clone();
  sort_rows(&mut rows);
  let (winner, runner_up) = (&rows[0], &rows[1]);
  match (winner.rank, runner_up.rank) {
    (Some(a), Some(b)) if a < b => Some([
      Standing {
        rank: first_rank,
        nickname: winner.nickname.clone(),
      },
      Standing {
        rank: first_rank + 1,
        nickname: runner_up.nickname.clone(),
      },
    ]),
    _ => None,
  }
}
