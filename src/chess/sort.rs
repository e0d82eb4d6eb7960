//! Collection ordering with estimated progress.
//!
//! A comparison sort cannot say how far along it is. Progress here counts
//! comparator calls against the `7.5 * n * log10(n)` calls a sort of random
//! input was measured to need. The figure only moves a progress bar; it is
//! clamped to 1000 and never reported lower than an earlier value.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::collection::Collection;
use super::log;
use super::progress::{Monotonic, PERMILL_DONE, Progress, expected_sort_comparisons};
use super::record::GameRecord;

const CHECK_INTERVAL: u64 = 0x10000;
const ORDER_SAMPLES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Ascending game id.
    Id,
    /// White player name, then game id, so one player's games keep file order.
    WhiteThenId,
    /// Compressed move bytes, lexicographic.
    Moves,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortReport {
    pub already_sorted: bool,
    pub comparisons: u64,
    /// Games that ended up at a different index.
    pub displaced: usize,
    /// A progress callback asked to stop. The sort itself always completes.
    pub cancelled: bool,
}

struct SortMeter<'a, P: Progress + ?Sized> {
    progress: Monotonic<'a, P>,
    status: &'a str,
    count: u64,
    expected: u64,
    cancelled: bool,
}

impl<P: Progress + ?Sized> SortMeter<'_, P> {
    fn tick(&mut self) {
        self.count += 1;
        if self.count % CHECK_INTERVAL == 0 {
            let permill = if self.expected == 0 || self.count >= self.expected {
                PERMILL_DONE
            } else if self.expected > 1_000_000 {
                (self.count / (self.expected / 1000)) as u32
            } else {
                (self.count * 1000 / self.expected) as u32
            };
            if self.progress.permill(permill, Some(self.status)).is_break() {
                self.cancelled = true;
            }
        }
    }
}

/// Reorders `games` by `key`. Names for [`SortKey::WhiteThenId`] come from
/// `collection.catalog`.
pub fn sort_collection(
    collection: &mut Collection,
    key: SortKey,
    status: &str,
    progress: &mut (impl Progress + ?Sized),
) -> SortReport {
    let whites: Vec<String> = match key {
        SortKey::WhiteThenId => collection.rosters().into_iter().map(|r| r.white).collect(),
        _ => Vec::new(),
    };
    let games = collection.games_mut();
    sort_games(games, key, &whites, status, progress)
}

fn compare(games: &[GameRecord], whites: &[String], key: SortKey, a: usize, b: usize) -> Ordering {
    match key {
        SortKey::Id => games[a].game_id().cmp(&games[b].game_id()),
        SortKey::Moves => games[a].compressed_moves().cmp(games[b].compressed_moves()),
        SortKey::WhiteThenId => whites[a]
            .cmp(&whites[b])
            .then_with(|| games[a].game_id().cmp(&games[b].game_id())),
    }
}

pub fn is_sorted(games: &[GameRecord], whites: &[String], key: SortKey) -> bool {
    (1..games.len()).all(|i| compare(games, whites, key, i - 1, i) != Ordering::Greater)
}

fn sort_games(
    games: &mut Vec<GameRecord>,
    key: SortKey,
    whites: &[String],
    status: &str,
    progress: &mut (impl Progress + ?Sized),
) -> SortReport {
    let n = games.len();
    let mut report = SortReport {
        comparisons: n.saturating_sub(1) as u64,
        ..SortReport::default()
    };
    if is_sorted(games, whites, key) {
        report.already_sorted = true;
        return report;
    }

    let mut meter = SortMeter {
        progress: Monotonic::new(progress),
        status,
        count: 0,
        expected: expected_sort_comparisons(n),
        cancelled: false,
    };
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        meter.tick();
        compare(games, whites, key, a, b)
    });
    log::info(format!(
        "{}: {} games, {} comparisons expected, {} made",
        status, n, meter.expected, meter.count
    ));
    report.comparisons += meter.count;
    report.cancelled = meter.cancelled;
    let _ = meter.progress.permill(PERMILL_DONE, Some(status));

    report.displaced = order.iter().enumerate().filter(|&(i, &j)| i != j).count();
    let mut slots: Vec<Option<GameRecord>> = games.drain(..).map(Some).collect();
    games.extend(order.iter().filter_map(|&i| slots[i].take()));
    report
}

/// Sorts by id (or by player then id) unless the collection already is,
/// which is the usual case for an unmodified database.
pub fn initial_sort(
    collection: &mut Collection,
    by_player: bool,
    progress: &mut (impl Progress + ?Sized),
) -> SortReport {
    let (key, status) = if by_player {
        (SortKey::WhiteThenId, "Sorting by player name")
    } else {
        (SortKey::Id, "Initial sort")
    };
    let report = sort_collection(collection, key, status, progress);
    log::info(format!(
        "{} sorted by {}",
        if report.already_sorted { "Already" } else { "Not already" },
        if by_player { "player name" } else { "id" }
    ));
    report
}

/// Samples random pairs in `begin..end` and, when later games overwhelmingly
/// carry earlier dates, reverses the range so it runs oldest first. Ids in
/// the range are then renumbered from the first game's id. Returns whether
/// the range was reversed.
pub fn normalise_order(collection: &mut Collection, begin: usize, end: usize, seed: u64) -> bool {
    let end = end.min(collection.len());
    if begin >= end {
        return false;
    }
    let size = end - begin;
    let dates: Vec<u32> = collection.games()[begin..end]
        .iter()
        .map(|g| g.bins(&collection.catalog).map(|b| b.date).unwrap_or(0))
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let (mut forward, mut reverse) = (0u32, 0u32);
    for _ in 0..ORDER_SAMPLES {
        let j = rng.gen_range(0..size);
        let k = rng.gen_range(0..size);
        if k > j && dates[k] > dates[j] {
            forward += 1;
        }
        if k > j && dates[k] < dates[j] {
            reverse += 1;
        }
    }
    let reversing = reverse > forward.saturating_mul(5);
    log::info(format!(
        "normalise order: forward_cnt={}, reverse_cnt={}, reversing={}",
        forward, reverse, reversing
    ));
    if reversing {
        let games = &mut collection.games_mut()[begin..end];
        let base = games[0].game_id();
        games.reverse();
        for (i, g) in games.iter_mut().enumerate() {
            g.set_game_id(base.wrapping_add(i as u32));
        }
    }
    reversing
}
