//! Game-level move compression.
//!
//! Each side is encoded in fast mode (see [`side`](super::side)) while its
//! pieces fit the fixed slots, otherwise in slow mode: the byte is
//! `255 - index` into the position's legal moves rendered as SAN and sorted
//! bytewise. Bishops on dark squares are written `D`, so `Dc4` and `Bc4`
//! never collide. Code `0x01` marks a move missing from the list.

use shakmaty::san::San;
use shakmaty::{Chess, Color, Move, Position, Role};
use smallvec::SmallVec;

use super::board::{CharBoard, from_square, is_dark, to_square};
use super::side::{CODE_END, FastKind, FastMove, SideState};

/// Slow code written when a move is not among the legal moves.
pub const CODE_SLOW_ERROR: u8 = 0x01;

type SortedMoves = SmallVec<[(String, Move); 64]>;

fn move_text(pos: &Chess, m: Move) -> String {
    let text = San::from_move(pos, m).to_string();
    let dark_bishop = match m {
        Move::Normal {
            role: Role::Bishop,
            from,
            ..
        } => is_dark(from_square(from)),
        Move::Normal {
            promotion: Some(Role::Bishop),
            to,
            ..
        } => is_dark(from_square(to)),
        _ => false,
    };
    if dark_bishop {
        // Pawn files are lowercase, so the first `B` is the bishop letter
        text.replacen('B', "D", 1)
    } else {
        text
    }
}

fn sorted_moves(pos: &Chess) -> SortedMoves {
    let mut list: SortedMoves = pos
        .legal_moves()
        .into_iter()
        .map(|m| (move_text(pos, m), m))
        .collect();
    list.sort_by(|a, b| a.0.cmp(&b.0));
    list
}

pub fn slow_encode(pos: &Chess, m: Move) -> u8 {
    let text = move_text(pos, m);
    match sorted_moves(pos).iter().position(|(t, _)| *t == text) {
        Some(idx) if idx < 255 => 255 - idx as u8,
        _ => CODE_SLOW_ERROR,
    }
}

/// Out of range indexes fall back to the first move.
pub fn slow_decode(pos: &Chess, code: u8) -> Option<Move> {
    let list = sorted_moves(pos);
    let idx = usize::from(255 - code);
    let idx = if idx >= list.len() { 0 } else { idx };
    list.get(idx).map(|(_, m)| *m)
}

/// Incremental encoder/decoder for one game.
#[derive(Debug, Clone)]
pub struct MoveCodec {
    pos: Chess,
    sides: [SideState; 2],
}

impl Default for MoveCodec {
    fn default() -> Self {
        Self::new(Chess::default())
    }
}

impl MoveCodec {
    pub fn new(pos: Chess) -> Self {
        Self {
            pos,
            sides: [SideState::new(true), SideState::new(false)],
        }
    }

    pub fn position(&self) -> &Chess {
        &self.pos
    }

    pub fn side(&self, color: Color) -> &SideState {
        match color {
            Color::White => &self.sides[0],
            Color::Black => &self.sides[1],
        }
    }

    // Mover first.
    fn split(&mut self) -> (&mut SideState, &mut SideState) {
        let [white, black] = &mut self.sides;
        match self.pos.turn() {
            Color::White => (white, black),
            Color::Black => (black, white),
        }
    }

    fn mover_fast(&mut self) -> bool {
        let board = CharBoard::from_board(self.pos.board());
        let (mover, _) = self.split();
        mover.fast_mode || mover.try_fast_mode(&board)
    }

    /// Encodes a legal move and plays it.
    pub fn encode_move(&mut self, m: Move) -> u8 {
        let code = if self.mover_fast() {
            self.encode_fast(m)
        } else {
            let code = slow_encode(&self.pos, m);
            self.split().1.fast_mode = false;
            code
        };
        self.pos.play_unchecked(m);
        code
    }

    /// Decodes one byte and plays the resulting move. `None` if the byte does
    /// not name a legal move here.
    pub fn decode_move(&mut self, code: u8) -> Option<Move> {
        let m = if self.mover_fast() {
            self.decode_fast(code)?
        } else {
            let m = slow_decode(&self.pos, code)?;
            self.split().1.fast_mode = false;
            m
        };
        if !self.pos.is_legal(m) {
            return None;
        }
        self.pos.play_unchecked(m);
        Some(m)
    }

    fn encode_fast(&mut self, m: Move) -> u8 {
        let white = self.pos.turn() == Color::White;
        let (role, fm) = match m {
            Move::Normal {
                role,
                from,
                to,
                promotion,
                ..
            } => {
                let (src, dst) = (from_square(from), from_square(to));
                let kind = match promotion {
                    Some(p) => FastKind::Promotion(p),
                    None if role == Role::Pawn && src.abs_diff(dst) == 16 => FastKind::DoublePush,
                    None => FastKind::Quiet,
                };
                (role, FastMove { src, dst, kind })
            }
            Move::EnPassant { from, to } => (
                Role::Pawn,
                FastMove {
                    src: from_square(from),
                    dst: from_square(to),
                    kind: FastKind::EnPassant,
                },
            ),
            Move::Castle { king, rook } => {
                let src = from_square(king);
                let (dst, kind) = if rook.file() > king.file() {
                    (src + 2, FastKind::CastleShort)
                } else {
                    (src - 2, FastKind::CastleLong)
                };
                (Role::King, FastMove { src, dst, kind })
            }
            _ => return CODE_END,
        };
        let captured = self.captured_role(&fm, white);
        let (mover, other) = self.split();
        let code = mover.encode(role, fm);
        if let Some(victim) = captured
            && other.fast_mode
        {
            other.remove_captured(victim, fm.capture_square(white));
        }
        code
    }

    fn captured_role(&self, fm: &FastMove, white: bool) -> Option<Role> {
        match fm.kind {
            FastKind::EnPassant => Some(Role::Pawn),
            FastKind::CastleShort | FastKind::CastleLong => None,
            _ => self.pos.board().role_at(to_square(fm.capture_square(white))),
        }
    }

    fn decode_fast(&mut self, code: u8) -> Option<Move> {
        let white = self.pos.turn() == Color::White;
        let board = self.pos.board().clone();
        let [w, b] = &mut self.sides;
        let (mover, other) = if white { (w, b) } else { (b, w) };
        let fm = mover.decode(code, |sq| board.piece_at(to_square(sq)).is_some())?;
        let from = to_square(fm.src);
        let to = to_square(fm.dst);
        let m = match fm.kind {
            FastKind::CastleShort | FastKind::CastleLong => {
                let (rook, _) = fm.castling_rook()?;
                Move::Castle {
                    king: from,
                    rook: to_square(rook),
                }
            }
            FastKind::EnPassant => Move::EnPassant { from, to },
            FastKind::Promotion(p) => Move::Normal {
                role: Role::Pawn,
                from,
                capture: board.role_at(to),
                to,
                promotion: Some(p),
            },
            FastKind::Quiet | FastKind::DoublePush => Move::Normal {
                role: board.role_at(from)?,
                from,
                capture: board.role_at(to),
                to,
                promotion: None,
            },
        };
        let captured = match fm.kind {
            FastKind::EnPassant => Some(Role::Pawn),
            FastKind::CastleShort | FastKind::CastleLong => None,
            _ => board.role_at(to),
        };
        if let Some(victim) = captured
            && other.fast_mode
        {
            other.remove_captured(victim, fm.capture_square(white));
        }
        Some(m)
    }
}

/// Compresses a sequence of legal moves played from `start`.
pub fn compress_moves(start: &Chess, moves: &[Move]) -> Vec<u8> {
    let mut codec = MoveCodec::new(start.clone());
    moves.iter().map(|&m| codec.encode_move(m)).collect()
}

/// Expands a move stream, stopping at the end marker or at the first byte
/// that does not decode to a legal move.
pub fn uncompress_moves(start: &Chess, bytes: &[u8]) -> Vec<Move> {
    let mut codec = MoveCodec::new(start.clone());
    let mut moves = Vec::with_capacity(bytes.len());
    for &code in bytes {
        if code == CODE_END {
            break;
        }
        match codec.decode_move(code) {
            Some(m) => moves.push(m),
            None => break,
        }
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::record::{GameRecord, PgnBackedRecord};
    use crate::chess::replay::Replay;
    use shakmaty::CastlingMode;
    use shakmaty::fen::Fen;
    use shakmaty::san::SanPlus;

    fn play(start: &Chess, sans: &[&str]) -> Vec<Move> {
        let mut pos = start.clone();
        let mut moves = Vec::new();
        for text in sans {
            let san: SanPlus = text.parse().unwrap();
            let m = san.san.to_move(&pos).unwrap();
            pos.play_unchecked(m);
            moves.push(m);
        }
        moves
    }

    fn from_fen(fen: &str) -> Chess {
        let fen: Fen = fen.parse().unwrap();
        fen.into_position(CastlingMode::Standard).unwrap()
    }

    fn round_trip(start: &Chess, sans: &[&str]) -> Vec<u8> {
        let moves = play(start, sans);
        let bytes = compress_moves(start, &moves);
        assert_eq!(bytes.len(), moves.len());
        assert!(bytes.iter().all(|&b| b != CODE_END));
        assert_eq!(uncompress_moves(start, &bytes), moves);
        bytes
    }

    #[test]
    fn test_opening_with_castling_round_trips() {
        let start = Chess::default();
        round_trip(
            &start,
            &[
                "e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "Ba4", "Nf6", "O-O", "Be7", "Re1", "b5",
                "Bb3", "d6", "c3", "O-O", "h3", "Nb8", "d4", "Nbd7",
            ],
        );
    }

    #[test]
    fn test_queenside_castling_and_captures_round_trip() {
        let start = Chess::default();
        round_trip(
            &start,
            &[
                "d4", "d5", "Nc3", "Nf6", "Bg5", "Bf5", "Qd2", "e6", "O-O-O", "Bxc2", "Kxc2",
                "Bb4", "Bxf6", "Qxf6", "a3", "Bxc3", "Qxc3", "Nc6",
            ],
        );
    }

    #[test]
    fn test_en_passant_round_trips() {
        let start = Chess::default();
        let bytes = round_trip(&start, &["e4", "Nf6", "e5", "d5", "exd6", "cxd6"]);
        assert_eq!(bytes.len(), 6);
    }

    #[test]
    fn test_every_promotion_piece_round_trips() {
        for piece in ["Q", "R", "B", "N"] {
            let start = from_fen("8/P6k/8/8/8/8/6K1/8 w - - 0 1");
            let promote = format!("a8={}", piece);
            let bytes = round_trip(&start, &[&promote, "Kg6", "Kf2"]);
            assert!(crate::chess::side::may_contain_promotion(&bytes[..1]));
        }
    }

    #[test]
    fn test_capture_promotion_then_slow_mode_round_trips() {
        let start = from_fen("1n5k/P7/8/8/8/8/6K1/8 w - - 0 1");
        round_trip(&start, &["axb8=Q+", "Kg7", "Qc7+", "Kg6", "Qd6+", "Kg5"]);
    }

    #[test]
    fn test_three_knights_use_slow_mode() {
        let start = from_fen("4k3/8/8/8/8/2N5/8/NN2K3 w - - 0 1");
        let moves = play(&start, &["Nd5", "Kd7", "Nb3", "Kc6"]);
        let bytes = compress_moves(&start, &moves);
        // Slow codes index the sorted move list from the top down
        assert!(bytes[0] > 0xc0);
        assert_eq!(uncompress_moves(&start, &bytes), moves);
    }

    #[test]
    fn test_slow_code_is_sorted_san_index() {
        let pos = Chess::default();
        // Knight moves sort before pawn moves: Na3 Nc3 Nf3 Nh3 a3 a4 ...
        let na3 = play(&pos, &["Na3"])[0];
        let nf3 = play(&pos, &["Nf3"])[0];
        let a3 = play(&pos, &["a3"])[0];
        assert_eq!(slow_encode(&pos, na3), 0xff);
        assert_eq!(slow_encode(&pos, nf3), 0xfd);
        assert_eq!(slow_encode(&pos, a3), 0xfb);
        assert_eq!(slow_decode(&pos, 0xfb), Some(a3));
        // Out of range decodes to index 0
        assert_eq!(slow_decode(&pos, 1), Some(na3));
    }

    #[test]
    fn test_slow_list_holds_only_legal_moves() {
        // No castling rights, so O-O must not take a slot
        let pos = from_fen("4k3/8/8/8/8/8/8/4K2R w - - 0 1");
        let legal = pos.legal_moves().len();
        assert_eq!(legal, 14);
        for code in (256 - legal)..=255 {
            let m = slow_decode(&pos, code as u8).unwrap();
            assert!(!m.is_castle());
            assert_eq!(slow_encode(&pos, m), code as u8);
        }
        assert_eq!(slow_decode(&pos, (255 - legal) as u8), slow_decode(&pos, 0xff));
    }

    #[test]
    fn test_dark_bishop_sorts_after_light_bishop() {
        let pos = from_fen("4k3/8/8/8/8/8/8/2B1KB2 w - - 0 1");
        // Light bishop f1: Ba6 Bb5 Bc4 Bd3 Be2 Bg2 Bh3, then dark c1: Da3 Db2 ...
        let ba6 = play(&pos, &["Ba6"])[0];
        let bb2 = play(&pos, &["Bb2"])[0];
        assert_eq!(slow_encode(&pos, ba6), 0xff);
        assert_eq!(slow_encode(&pos, bb2), 0xff - 8);
        assert_eq!(slow_decode(&pos, 0xff - 8), Some(bb2));
    }

    #[test]
    fn test_move_not_in_list_gets_error_code() {
        let pos = Chess::default();
        let elsewhere = play(&pos, &["e4", "e5"])[1];
        assert_eq!(slow_encode(&pos, elsewhere), CODE_SLOW_ERROR);
    }

    // Full replay must track shakmaty's board after every byte.
    fn assert_replay_tracks(start: &Chess, moves: &[Move], replay: &mut Replay<'_>) {
        let mut pos = start.clone();
        for &m in moves {
            assert!(replay.step());
            pos.play_unchecked(m);
            assert_eq!(replay.board(), &CharBoard::from_board(pos.board()));
        }
        assert!(!replay.step());
    }

    #[test]
    fn test_two_queens_stay_in_fast_mode() {
        let start = Chess::default();
        let moves = play(
            &start,
            &[
                "e4", "d5", "exd5", "c6", "dxc6", "Nf6", "cxb7", "Nbd7", "bxa8=Q", "e6", "Nf3",
                "Bb4", "a3", "Bxd2+", "Bxd2", "O-O", "Qxa7", "Qc7", "Qe2",
            ],
        );
        let mut codec = MoveCodec::new(start.clone());
        let bytes: Vec<u8> = moves.iter().map(|&m| codec.encode_move(m)).collect();
        // Six pawns left after Bxd2, so both queens have slots
        let white = codec.side(Color::White);
        assert!(white.fast_mode);
        assert_eq!(white.nbr_queens, 2);
        // Qxa7 moves the first queen, Qe2 the second
        assert_eq!(bytes[16] & 0xf0, crate::chess::side::CODE_QUEEN_ROOK);
        assert_eq!(bytes[18] & 0xf0, crate::chess::side::CODE_QUEEN2_BISHOP);
        assert_eq!(uncompress_moves(&start, &bytes), moves);

        let game = GameRecord::Pgn(PgnBackedRecord {
            game_id: 1,
            roster: Default::default(),
            moves: bytes,
        });
        let mut replay = Replay::for_game(&game);
        assert!(replay.promotions_possible());
        assert_replay_tracks(&start, &moves, &mut replay);
    }

    #[test]
    fn test_underpromotion_regains_fast_mode_after_capture() {
        let start = from_fen("1n2k3/P7/8/8/8/8/8/1N2K1Nr w - - 0 1");
        let moves = play(&start, &["axb8=N", "Kf7", "Nc6", "Rxg1+", "Kf2", "Rxb1", "Nd4"]);
        let mut codec = MoveCodec::new(start.clone());
        let mut bytes = Vec::new();
        let mut white_fast = Vec::new();
        for &m in &moves {
            bytes.push(codec.encode_move(m));
            white_fast.push(codec.side(Color::White).fast_mode);
        }
        // Promotion drops fast mode; three knights keep it off; after Rxg1
        // the rescan before Kf2 succeeds and Rxb1 updates the cache
        assert_eq!(white_fast, [false, false, false, false, true, true, true]);
        assert_eq!(codec.side(Color::White).nbr_knights, 1);
        assert_eq!(uncompress_moves(&start, &bytes), moves);

        let mut replay = Replay::full(start.clone(), &bytes);
        assert_replay_tracks(&start, &moves, &mut replay);
    }

    #[test]
    fn test_decoding_stops_at_end_marker() {
        let start = Chess::default();
        let moves = play(&start, &["e4", "e5", "Nf3"]);
        let mut bytes = compress_moves(&start, &moves);
        bytes.insert(2, CODE_END);
        assert_eq!(uncompress_moves(&start, &bytes), moves[..2].to_vec());
    }

    #[test]
    fn test_illegal_byte_stops_decoding() {
        let start = Chess::default();
        // A rook cannot move on move one
        assert!(uncompress_moves(&start, &[0x28]).is_empty());
    }
}
