//! Half-move replay of a compressed move stream onto a [`CharBoard`].
//!
//! Games that cannot contain a promotion are replayed straight from the
//! fast codes: the side caches name each move's squares and the board is
//! patched in place, with no move generation at all. Anything else goes
//! through [`MoveCodec`], which falls back to legal move generation when a
//! side leaves fast mode.

use shakmaty::{Chess, Color, Position};

use super::board::{CharBoard, EMPTY, Material, role_of};
use super::codec::MoveCodec;
use super::record::GameRecord;
use super::side::{CODE_END, FastKind, SideState};

#[derive(Debug, Clone)]
pub struct Replay<'a> {
    moves: &'a [u8],
    next: usize,
    board: CharBoard,
    material: Material,
    white: bool,
    sides: [SideState; 2],
    full: Option<MoveCodec>,
}

impl<'a> Replay<'a> {
    /// Fast-code replay from the initial position. Only valid for streams
    /// without promotions.
    pub fn quick(moves: &'a [u8]) -> Self {
        Self {
            moves,
            next: 0,
            board: CharBoard::START,
            material: Material::of(&CharBoard::START),
            white: true,
            sides: [SideState::new(true), SideState::new(false)],
            full: None,
        }
    }

    /// Replay through the full codec from any start position.
    pub fn full(start: Chess, moves: &'a [u8]) -> Self {
        let board = CharBoard::from_board(start.board());
        Self {
            moves,
            next: 0,
            material: Material::of(&board),
            board,
            white: start.turn() == Color::White,
            sides: [SideState::new(true), SideState::new(false)],
            full: Some(MoveCodec::new(start)),
        }
    }

    pub fn for_game(game: &'a GameRecord) -> Self {
        if game.has_promotion() || game.fen().is_some() {
            Self::full(game.start_position(), game.compressed_moves())
        } else {
            Self::quick(game.compressed_moves())
        }
    }

    pub fn board(&self) -> &CharBoard {
        &self.board
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn white_to_move(&self) -> bool {
        self.white
    }

    /// Half-moves played so far.
    pub fn plies(&self) -> u16 {
        u16::try_from(self.next).unwrap_or(u16::MAX)
    }

    /// Piece counts may still grow by promotion.
    pub fn promotions_possible(&self) -> bool {
        self.full.is_some()
    }

    /// Plays the next half-move. False at the end of the stream or at a code
    /// that does not decode here.
    pub fn step(&mut self) -> bool {
        let Some(&code) = self.moves.get(self.next) else {
            return false;
        };
        if code == CODE_END {
            return false;
        }
        let played = match &mut self.full {
            Some(codec) => {
                let ok = codec.decode_move(code).is_some();
                if ok {
                    self.board = CharBoard::from_board(codec.position().board());
                    self.material = Material::of(&self.board);
                }
                ok
            }
            None => self.quick_step(code),
        };
        if played {
            self.next += 1;
            self.white = !self.white;
        }
        played
    }

    fn quick_step(&mut self, code: u8) -> bool {
        let white = self.white;
        let [w, b] = &mut self.sides;
        let (mover, other) = if white { (w, b) } else { (b, w) };
        if !mover.fast_mode && !mover.try_fast_mode(&self.board) {
            return false;
        }
        let board = &self.board;
        let Some(fm) = mover.decode(code, |sq| board.is_occupied(sq)) else {
            return false;
        };
        let piece = self.board.get(fm.src);
        if piece == EMPTY {
            return false;
        }
        match fm.castling_rook() {
            Some((from, to)) => {
                let rook = self.board.get(from);
                self.board.set(from, EMPTY);
                self.board.set(to, rook);
            }
            None => {
                let at = fm.capture_square(white);
                let victim = self.board.get(at);
                if victim != EMPTY {
                    if other.fast_mode
                        && let Some(role) = role_of(victim)
                    {
                        other.remove_captured(role, at);
                    }
                    self.material.remove(victim);
                    self.board.set(at, EMPTY);
                }
            }
        }
        debug_assert!(!matches!(fm.kind, FastKind::Promotion(_)));
        self.board.set(fm.src, EMPTY);
        self.board.set(fm.dst, piece);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::codec::compress_moves;
    use shakmaty::Move;
    use shakmaty::san::SanPlus;

    fn play(sans: &[&str]) -> Vec<Move> {
        let mut pos = Chess::default();
        sans.iter()
            .map(|s| {
                let san: SanPlus = s.parse().unwrap();
                let m = san.san.to_move(&pos).unwrap();
                pos.play_unchecked(m);
                m
            })
            .collect()
    }

    #[test]
    fn test_quick_replay_tracks_full_replay() {
        // Castling on both sides, en passant and ordinary captures
        let moves = play(&[
            "e4", "Nf6", "e5", "d5", "exd6", "e6", "Nf3", "Be7", "Bc4", "O-O", "O-O", "Nc6",
            "dxc7", "Qxc7", "Re1", "Rd8", "Bxe6", "fxe6",
        ]);
        let bytes = compress_moves(&Chess::default(), &moves);
        let mut quick = Replay::quick(&bytes);
        let mut full = Replay::full(Chess::default(), &bytes);
        let mut pos = Chess::default();
        for &m in &moves {
            assert!(quick.step());
            assert!(full.step());
            pos.play_unchecked(m);
            let expected = CharBoard::from_board(pos.board());
            assert_eq!(quick.board(), &expected);
            assert_eq!(full.board(), &expected);
            assert_eq!(quick.material(), &Material::of(&expected));
            assert_eq!(quick.white_to_move(), full.white_to_move());
        }
        assert_eq!(quick.plies(), moves.len() as u16);
        assert!(!quick.step());
        assert!(!full.step());
    }

    #[test]
    fn test_promotion_game_uses_full_replay() {
        let moves = play(&[
            "e4", "d5", "exd5", "c6", "dxc6", "Nf6", "cxb7", "Nbd7", "bxa8=Q", "e6",
        ]);
        let bytes = compress_moves(&Chess::default(), &moves);
        let game = GameRecord::Pgn(crate::chess::record::PgnBackedRecord {
            game_id: 1,
            roster: Default::default(),
            moves: bytes,
        });
        assert!(game.has_promotion());
        let mut replay = Replay::for_game(&game);
        assert!(replay.promotions_possible());
        while replay.step() {}
        assert_eq!(replay.plies(), 10);
        assert_eq!(replay.material().get(b'Q'), 2);
    }

    #[test]
    fn test_end_marker_stops_replay() {
        let mut bytes = compress_moves(&Chess::default(), &play(&["e4", "e5", "Nf3"]));
        bytes.insert(1, CODE_END);
        let mut replay = Replay::quick(&bytes);
        assert!(replay.step());
        assert!(!replay.step());
        assert_eq!(replay.plies(), 1);
        assert!(!replay.white_to_move());
    }
}
