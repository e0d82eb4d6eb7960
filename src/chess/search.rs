//! Exact position search over an in-memory collection.
//!
//! Each game is replayed half-move by half-move and its board compared with
//! the target one rank (eight bytes) at a time. Most games are abandoned
//! after a few moves by rejection tests that prove the target can no longer
//! be reached: material never comes back, and a pawn never returns to its
//! home row.

use std::error::Error;

use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color, Position};

use super::board::{CharBoard, Material};
use super::collection::Collection;
use super::error::DbError;
use super::log;
use super::progress::Progress;
use super::replay::Replay;

/// Games between two progress reports.
pub const PROGRESS_INTERVAL: usize = 0x100;

// Middle ranks differ first in most games: rows for ranks 3..8, then 1 and 2
const ROW_ORDER: [usize; 8] = [5, 4, 3, 2, 1, 0, 7, 6];
const WHITE_HOME_ROW: usize = 6;
const BLACK_HOME_ROW: usize = 1;

/// One game found by a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameMatch {
    /// Index into the searched collection.
    pub index: usize,
    pub game_id: u32,
    /// Half-moves played before the match.
    pub offset_first: u16,
    /// Currently always equal to `offset_first`.
    pub offset_last: u16,
}

pub type MatchList = Vec<GameMatch>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HomeRow {
    mask: u64,
    pawns: u64,
}

impl HomeRow {
    fn new(target: &CharBoard, row: usize, pawn: u8) -> Self {
        let mut mask = [0u8; 8];
        let mut pawns = [0u8; 8];
        for file in 0..8 {
            if target.get((row * 8 + file) as u8) == pawn {
                mask[file] = 0xff;
                pawns[file] = pawn;
            }
        }
        Self {
            mask: u64::from_ne_bytes(mask),
            pawns: u64::from_ne_bytes(pawns),
        }
    }

    fn intact(&self, board: &CharBoard, row: usize) -> bool {
        board.rank_word(row) & self.mask == self.pawns
    }
}

/// A board and side to move to look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionTarget {
    board: CharBoard,
    white_to_move: bool,
    words: [u64; 8],
    material: Material,
    white_home: HomeRow,
    black_home: HomeRow,
}

impl PositionTarget {
    pub fn new(board: CharBoard, white_to_move: bool) -> Self {
        Self {
            words: board.rank_words(),
            material: Material::of(&board),
            white_home: HomeRow::new(&board, WHITE_HOME_ROW, b'P'),
            black_home: HomeRow::new(&board, BLACK_HOME_ROW, b'p'),
            board,
            white_to_move,
        }
    }

    pub fn from_position(pos: &Chess) -> Self {
        Self::new(CharBoard::from_board(pos.board()), pos.turn() == Color::White)
    }

    pub fn from_fen(text: &str) -> Result<Self, Box<dyn Error>> {
        let pos: Chess = text
            .parse::<Fen>()?
            .into_position(CastlingMode::Standard)
            .map_err(|e| format!("Invalid search position '{}': {}", text, e))?;
        Ok(Self::from_position(&pos))
    }

    pub fn board(&self) -> &CharBoard {
        &self.board
    }

    fn is_reached(&self, replay: &Replay<'_>) -> bool {
        replay.white_to_move() == self.white_to_move
            && ROW_ORDER
                .iter()
                .all(|&row| replay.board().rank_word(row) == self.words[row])
    }

    fn is_unreachable(&self, replay: &Replay<'_>) -> bool {
        let board = replay.board();
        if !self.white_home.intact(board, WHITE_HOME_ROW)
            || !self.black_home.intact(board, BLACK_HOME_ROW)
        {
            return true;
        }
        let m = replay.material();
        if replay.promotions_possible() {
            // A promotion trades a pawn for a piece, so only side totals and
            // pawn counts are monotonic
            m.white() < self.material.white()
                || m.black() < self.material.black()
                || m.get(b'P') < self.material.get(b'P')
                || m.get(b'p') < self.material.get(b'p')
        } else {
            !m.covers(&self.material)
        }
    }

    /// Replays one game until the target is reached or ruled out.
    pub fn search_game(&self, mut replay: Replay<'_>) -> Option<u16> {
        loop {
            if self.is_reached(&replay) {
                return Some(replay.plies());
            }
            if self.is_unreachable(&replay) || !replay.step() {
                return None;
            }
        }
    }
}

/// Lists every game in `collection` that reaches `target`. Cancelling via
/// `progress` yields [`DbError::Killed`].
pub fn search_position(
    collection: &Collection,
    target: &PositionTarget,
    progress: &mut (impl Progress + ?Sized),
) -> Result<MatchList, DbError> {
    let games = collection.games();
    let n = games.len();
    let mut found = MatchList::new();
    for (index, game) in games.iter().enumerate() {
        if index % PROGRESS_INTERVAL == 0 && progress.fraction(index as u64, n as u64).is_break() {
            return Err(DbError::Killed);
        }
        if let Some(offset) = target.search_game(Replay::for_game(game)) {
            found.push(GameMatch {
                index,
                game_id: game.game_id(),
                offset_first: offset,
                offset_last: offset,
            });
        }
    }
    log::info(format!("Position search: {} games, {} found", n, found.len()));
    Ok(found)
}
