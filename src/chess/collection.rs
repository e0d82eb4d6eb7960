//! The in-memory game collection every database operation works on.

use shakmaty::{Chess, Move};

use super::codec::compress_moves;
use super::config::EloCutoffPolicy;
use super::control::Catalog;
use super::ids::GameIdAllocator;
use super::log;
use super::record::{GameRecord, PgnBackedRecord};
use super::roster::{Roster, RosterBins};

/// Most games a locked database lets a caller export in one go.
pub const DATABASE_LOCKABLE_LIMIT: usize = 10_000;

const IMPORT_REPORT_INTERVAL: u64 = 10_000;

/// Games owned by one caller. Records reference schemas and string tables in
/// `catalog`; nothing is shared between collections.
#[derive(Debug, Default)]
pub struct Collection {
    pub catalog: Catalog,
    games: Vec<GameRecord>,
    pub ids: GameIdAllocator,
    pub locked: bool,
    imported: u64,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty collection sharing this one's id allocator, so ids handed out
    /// later never collide with ids handed out so far.
    pub fn with_allocator(ids: GameIdAllocator) -> Self {
        Self {
            ids,
            ..Self::default()
        }
    }

    pub fn games(&self) -> &[GameRecord] {
        &self.games
    }

    pub fn games_mut(&mut self) -> &mut Vec<GameRecord> {
        &mut self.games
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn push(&mut self, record: GameRecord) {
        self.games.push(record);
    }

    /// Drops every game and control block. The id allocator is kept.
    pub fn clear(&mut self) {
        self.games.clear();
        self.catalog = Catalog::new();
        self.imported = 0;
    }

    /// Rosters of every game, in collection order. Headers that fail to
    /// decode yield a default roster.
    pub fn rosters(&self) -> Vec<Roster> {
        self.games
            .iter()
            .map(|g| g.roster(&self.catalog).unwrap_or_default())
            .collect()
    }

    /// How many of `requested` games may be exported right now.
    pub fn export_allowance(&self, requested: usize) -> usize {
        if self.locked {
            requested.min(DATABASE_LOCKABLE_LIMIT)
        } else {
            requested
        }
    }

    /// Compresses and stages one imported game. Returns false, without
    /// error, when the game is filtered out: set-up start position, fewer
    /// than three moves, a blank player name or a failed Elo cutoff.
    pub fn append_game(&mut self, roster: &Roster, moves: &[Move], policy: &EloCutoffPolicy) -> bool {
        self.imported += 1;
        if self.imported % IMPORT_REPORT_INTERVAL == 0 {
            log::info(format!("{} games read from input .pgn so far", self.imported));
        }
        if roster.has_fen() || moves.len() < 3 {
            return false;
        }
        let bins = RosterBins::from_roster(roster);
        if !policy.admits(bins.white_elo, bins.black_elo, bins.date) {
            return false;
        }
        if roster.white.trim_start_matches(' ').is_empty()
            || roster.black.trim_start_matches(' ').is_empty()
        {
            return false;
        }

        let mut stored = roster.clone();
        stored.white = strip_suffix(&roster.white, " (wh)");
        stored.black = strip_suffix(&roster.black, " (bl)");
        let moves = compress_moves(&Chess::default(), moves);
        let game_id = self.ids.allocate_bottom(1);
        self.games.push(GameRecord::Pgn(PgnBackedRecord {
            game_id,
            roster: stored,
            moves,
        }));
        true
    }
}

fn strip_suffix(name: &str, suffix: &str) -> String {
    match name.strip_suffix(suffix) {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => name.to_string(),
    }
}
