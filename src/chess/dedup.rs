//! Duplicate removal.
//!
//! Games are grouped by identical move bytes; inside a group a later game is
//! a duplicate of an earlier one when both players match (exactly or by
//! fuzzy name tokens), the results are equal and the years agree.

use std::io::Write;

use super::bins::result_to_bin;
use super::collection::Collection;
use super::database::write_collection;
use super::error::DbError;
use super::ids::GAME_ID_SENTINEL;
use super::log;
use super::names::{is_player_match, is_year_match, name_tokens};
use super::pgn::write_pgn_game;
use super::progress::{Progress, fraction_to_permill};
use super::roster::Roster;
use super::sort::{SortKey, sort_collection};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub games_before: usize,
    pub duplicates: usize,
    /// Duplicates written to the side PGN before the write was cancelled.
    pub duplicates_exported: usize,
}

/// Whether `later` duplicates `earlier`, given `earlier`'s name tokens.
pub fn is_duplicate(
    earlier: &Roster,
    white_tokens: &[String],
    black_tokens: &[String],
    later: &Roster,
) -> bool {
    let white = earlier.white == later.white || is_player_match(&later.white, white_tokens);
    let black = earlier.black == later.black || is_player_match(&later.black, black_tokens);
    let result = result_to_bin(&earlier.result) == result_to_bin(&later.result);
    white && black && result && is_year_match(&earlier.date, &later.date)
}

fn check(progress: &mut (impl Progress + ?Sized), done: u64, total: u64, status: &str) -> Result<(), DbError> {
    if progress
        .permill(fraction_to_permill(done, total), Some(status))
        .is_break()
    {
        return Err(DbError::Aborted);
    }
    Ok(())
}

// Marks duplicates inside games[start..end], a run of equal move bytes
// already ordered by id. Returns how many were marked.
fn mark_run(collection: &mut Collection, start: usize, end: usize) -> Result<usize, DbError> {
    let rosters = collection.games()[start..end]
        .iter()
        .map(|g| g.roster(&collection.catalog))
        .collect::<Result<Vec<_>, _>>()?;
    let mut marked = vec![false; rosters.len()];
    for p in 0..rosters.len() {
        if marked[p] {
            continue;
        }
        let white_tokens = name_tokens(&rosters[p].white);
        let black_tokens = name_tokens(&rosters[p].black);
        for q in p + 1..rosters.len() {
            if !marked[q] && is_duplicate(&rosters[p], &white_tokens, &black_tokens, &rosters[q]) {
                marked[q] = true;
            }
        }
    }
    let games = &mut collection.games_mut()[start..end];
    for (g, _) in games.iter_mut().zip(&marked).filter(|&(_, &m)| m) {
        g.set_game_id(GAME_ID_SENTINEL);
    }
    Ok(marked.iter().filter(|&&m| m).count())
}

/// Removes duplicate games, optionally writing the cleaned database to `out`
/// first and the removed games as PGN to `duplicates_pgn`.
///
/// On return the collection is ordered by id with fresh contiguous ids and
/// holds no sentinel-marked games. Cancellation during the scan or the
/// database write yields [`DbError::Aborted`]; cancelling the optional PGN
/// export only stops that export.
pub fn remove_duplicates_and_write(
    collection: &mut Collection,
    title: &str,
    out: Option<&mut dyn Write>,
    duplicates_pgn: Option<&mut dyn Write>,
    locked: bool,
    progress: &mut (impl Progress + ?Sized),
) -> Result<DedupReport, DbError> {
    let n = collection.len();
    let mut report = DedupReport {
        games_before: n,
        ..DedupReport::default()
    };

    let base = collection.ids.allocate_top(n as u32);
    for (i, g) in collection.games_mut().iter_mut().enumerate() {
        g.set_game_id(base.wrapping_add(i as u32));
    }

    let phase1 = format!("{}, step 1 of 3: Duplicate Removal - phase 1", title);
    if sort_collection(collection, SortKey::Moves, &phase1, progress).cancelled {
        return Err(DbError::Aborted);
    }

    let phase2 = format!("{}, step 1 of 3: Duplicate Removal - phase 2", title);
    let mut start = 0;
    while start < n {
        check(progress, start as u64, n as u64, &phase2)?;
        let moves = collection.games()[start].compressed_moves();
        let end = start
            + collection.games()[start..]
                .iter()
                .take_while(|g| g.compressed_moves() == moves)
                .count();
        if end - start > 1 {
            collection.games_mut()[start..end].sort_by_key(|g| g.game_id());
            mark_run(collection, start, end)?;
        }
        start = end;
    }

    let phase3 = format!("{}, step 1 of 3: Duplicate Removal - phase 3", title);
    if sort_collection(collection, SortKey::Id, &phase3, progress).cancelled {
        return Err(DbError::Aborted);
    }
    let duplicates = collection
        .games()
        .iter()
        .rev()
        .take_while(|g| g.is_duplicate())
        .count();
    report.duplicates = duplicates;

    if let Some(out) = out {
        write_collection(collection, out, duplicates, locked, progress)?;
    }

    if duplicates > 0 {
        if let Some(pgn) = duplicates_pgn {
            let status = format!(
                "{}, step 3 of 3: Saving duplicates, cancel if not needed",
                title
            );
            for (i, g) in collection.games().iter().rev().take(duplicates).enumerate() {
                let doc = g.materialize(&collection.catalog)?;
                write_pgn_game(pgn, &doc)?;
                report.duplicates_exported = i + 1;
                if progress
                    .permill(fraction_to_permill((i + 1) as u64, duplicates as u64), Some(&status))
                    .is_break()
                {
                    break;
                }
            }
        }
        let keep = n - duplicates;
        collection.games_mut().truncate(keep);
        log::info(format!("Number of duplicates deleted: {}", duplicates));
    }
    Ok(report)
}
