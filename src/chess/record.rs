use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Move};

use super::bitpack::BitPackError;
use super::codec::uncompress_moves;
use super::control::{Catalog, ControlHandle};
use super::ids::GAME_ID_SENTINEL;
use super::roster::{Roster, RosterBins};
use super::side::may_contain_promotion;

/// A game as read from a database file: header bits interpreted through a
/// control block of the owning collection's catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRecord {
    pub game_id: u32,
    pub control: ControlHandle,
    pub header: Box<[u8]>,
    pub moves: Box<[u8]>,
}

/// A game freshly imported from PGN, roster held as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgnBackedRecord {
    pub game_id: u32,
    pub roster: Roster,
    pub moves: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameRecord {
    Binary(BinaryRecord),
    Pgn(PgnBackedRecord),
}

/// A fully expanded game.
#[derive(Debug, Clone)]
pub struct GameDocument {
    pub game_id: u32,
    pub roster: Roster,
    pub start: Chess,
    pub moves: Vec<Move>,
}

impl GameRecord {
    pub fn game_id(&self) -> u32 {
        match self {
            Self::Binary(r) => r.game_id,
            Self::Pgn(r) => r.game_id,
        }
    }

    pub fn set_game_id(&mut self, id: u32) {
        match self {
            Self::Binary(r) => r.game_id = id,
            Self::Pgn(r) => r.game_id = id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.game_id() == GAME_ID_SENTINEL
    }

    /// Move bytes without the end marker.
    pub fn compressed_moves(&self) -> &[u8] {
        match self {
            Self::Binary(r) => &r.moves,
            Self::Pgn(r) => &r.moves,
        }
    }

    pub fn has_promotion(&self) -> bool {
        may_contain_promotion(self.compressed_moves())
    }

    pub fn roster(&self, catalog: &Catalog) -> Result<Roster, BitPackError> {
        match self {
            Self::Binary(r) => catalog.roster(r.control, &r.header),
            Self::Pgn(r) => Ok(r.roster.clone()),
        }
    }

    pub fn bins(&self, catalog: &Catalog) -> Result<RosterBins, BitPackError> {
        match self {
            Self::Binary(r) => Ok(catalog.header(r.control, &r.header)?.bins()),
            Self::Pgn(r) => Ok(RosterBins::from_roster(&r.roster)),
        }
    }

    /// FEN of a set-up start position; binary records always start from the
    /// initial position.
    pub fn fen(&self) -> Option<&str> {
        match self {
            Self::Binary(_) => None,
            Self::Pgn(r) => r.roster.has_fen().then_some(r.roster.fen.as_str()),
        }
    }

    pub fn start_position(&self) -> Chess {
        self.fen()
            .and_then(|text| text.parse::<Fen>().ok())
            .and_then(|fen| fen.into_position(CastlingMode::Standard).ok())
            .unwrap_or_default()
    }

    pub fn materialize(&self, catalog: &Catalog) -> Result<GameDocument, BitPackError> {
        let start = self.start_position();
        let moves = uncompress_moves(&start, self.compressed_moves());
        Ok(GameDocument {
            game_id: self.game_id(),
            roster: self.roster(catalog)?,
            start,
            moves,
        })
    }
}
