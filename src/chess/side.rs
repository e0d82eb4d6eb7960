//! Per-side piece tracking and the one-byte fast move code.
//!
//! While a side is in fast mode every piece it owns has a slot in a
//! [`SideState`], and a move is a high nibble naming the piece plus a low
//! nibble naming the target relative to the piece's current square. Pawns
//! are kept in canonical order (see [`PAWN_ORDERING`]) so the pawn slot
//! number is part of the code.

use shakmaty::Role;

use super::board::{CharBoard, PAWN_ORDERING, Sq, TRAVERSE_ORDER, is_dark};

pub const CODE_KING: u8 = 0x00;
pub const CODE_KNIGHT: u8 = 0x10;
pub const CODE_ROOK_LO: u8 = 0x20;
pub const CODE_ROOK_HI: u8 = 0x30;
pub const CODE_BISHOP_DARK: u8 = 0x40;
pub const CODE_BISHOP_LIGHT: u8 = 0x50;
pub const CODE_QUEEN_ROOK: u8 = 0x60;
pub const CODE_QUEEN_BISHOP: u8 = 0x70;
pub const CODE_PAWN: u8 = 0x80;
// Second queen borrows the pawn slots 6 and 7
pub const CODE_QUEEN2_ROOK: u8 = 0xe0;
pub const CODE_QUEEN2_BISHOP: u8 = 0xf0;

/// Terminates a move stream; never produced for a real move.
pub const CODE_END: u8 = 0x00;

const K_N: u8 = 0x01;
const K_NE: u8 = 0x02;
const K_E: u8 = 0x03;
const K_SE: u8 = 0x04;
const K_S: u8 = 0x05;
const K_SW: u8 = 0x06;
const K_W: u8 = 0x07;
const K_NW: u8 = 0x08;
const K_CASTLE_SHORT: u8 = 0x09;
const K_CASTLE_LONG: u8 = 0x0b;

const N_HI: u8 = 0x08;
const N_VECTORS: [i32; 8] = [-15, -6, 10, 17, 15, 6, -10, -17];

const R_RANK: u8 = 0x08;
const B_FALL: u8 = 0x08;

const P_DOUBLE: u8 = 0;
const P_SINGLE: u8 = 1;
const P_LEFT: u8 = 2;
const P_RIGHT: u8 = 3;

const PROMO_QUEEN: u8 = 0;
const PROMO_ROOK: u8 = 1;
const PROMO_BISHOP: u8 = 2;
const PROMO_KNIGHT: u8 = 3;

/// True if any byte of a move stream could be a pawn promotion. Used to pick
/// the search strategy before replaying a game.
pub fn may_contain_promotion(moves: &[u8]) -> bool {
    moves.iter().any(|&b| (b & 0x8c) > 0x80)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastKind {
    Quiet,
    DoublePush,
    EnPassant,
    CastleShort,
    CastleLong,
    Promotion(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastMove {
    pub src: Sq,
    pub dst: Sq,
    pub kind: FastKind,
}

impl FastMove {
    /// Square a captured piece would stand on.
    pub fn capture_square(&self, white: bool) -> Sq {
        match self.kind {
            FastKind::EnPassant if white => self.dst + 8,
            FastKind::EnPassant => self.dst - 8,
            _ => self.dst,
        }
    }

    /// Origin and target of the rook in a castling move.
    pub fn castling_rook(&self) -> Option<(Sq, Sq)> {
        match self.kind {
            FastKind::CastleShort => Some((self.src + 3, self.src + 1)),
            FastKind::CastleLong => Some((self.src - 4, self.src - 1)),
            _ => None,
        }
    }
}

fn quiet_move(src: Sq, dst: Sq) -> Option<FastMove> {
    Some(FastMove {
        src,
        dst,
        kind: FastKind::Quiet,
    })
}

fn offset(sq: Sq, delta: i32) -> Option<Sq> {
    let target = i32::from(sq) + delta;
    (0..64).contains(&target).then_some(target as Sq)
}

fn rook_low(src: Sq, dst: Sq) -> u8 {
    if src & 7 == dst & 7 {
        R_RANK | ((dst >> 3) & 7)
    } else {
        dst & 7
    }
}

fn rook_target(code: u8, src: Sq) -> Sq {
    if code & R_RANK != 0 {
        ((code & 7) << 3) | (src & 7)
    } else {
        (src & 0x38) | (code & 7)
    }
}

fn bishop_low(src: Sq, dst: Sq) -> u8 {
    if src.abs_diff(dst) % 9 == 0 {
        B_FALL | (dst & 7)
    } else {
        dst & 7
    }
}

fn bishop_target(code: u8, src: Sq) -> Option<Sq> {
    let file_delta = i32::from(code & 7) - i32::from(src & 7);
    if code & B_FALL != 0 {
        offset(src, 9 * file_delta)
    } else {
        offset(src, -7 * file_delta)
    }
}

fn slot_of(squares: &[Sq], sq: Sq) -> usize {
    squares.iter().position(|&s| s == sq).unwrap_or(0)
}

fn order_pair(pair: &mut [Sq; 2], count: u8) {
    if count == 2 && pair[0] > pair[1] {
        pair.swap(0, 1);
    }
}

fn remove_from_pair(pair: &mut [Sq; 2], count: &mut u8, sq: Sq) {
    if *count == 2 && pair[0] == sq {
        pair[0] = pair[1];
    }
    *count = count.saturating_sub(1);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideState {
    pub white: bool,
    pub fast_mode: bool,
    pub king: Sq,
    pub rooks: [Sq; 2],
    pub nbr_rooks: u8,
    pub knights: [Sq; 2],
    pub nbr_knights: u8,
    pub queens: [Sq; 2],
    pub nbr_queens: u8,
    pub bishop_dark: Sq,
    pub nbr_dark_bishops: u8,
    pub bishop_light: Sq,
    pub nbr_light_bishops: u8,
    pub pawns: [Sq; 8],
    pub nbr_pawns: u8,
}

impl SideState {
    pub fn new(white: bool) -> Self {
        Self {
            white,
            ..Self::default()
        }
    }

    /// Rebuilds the piece lists from a board. Succeeds, and sets fast mode,
    /// only if every piece fits a slot.
    pub fn try_fast_mode(&mut self, board: &CharBoard) -> bool {
        let (pawn, rook, knight, bishop, dark_bishop, queen, king) = if self.white {
            (b'P', b'R', b'N', b'B', b'D', b'Q', b'K')
        } else {
            (b'p', b'r', b'n', b'b', b'd', b'q', b'k')
        };
        *self = Self::new(self.white);
        let mut okay = true;
        for i in 0..64u8 {
            let sq = TRAVERSE_ORDER[i as usize];
            if board.get(sq) == pawn {
                if self.nbr_pawns < 8 {
                    self.pawns[self.nbr_pawns as usize] = sq;
                    self.nbr_pawns += 1;
                } else {
                    okay = false;
                }
            }
            let c = board.get(i);
            if c == rook {
                okay &= push_pair(&mut self.rooks, &mut self.nbr_rooks, i);
            } else if c == knight {
                okay &= push_pair(&mut self.knights, &mut self.nbr_knights, i);
            } else if c == queen {
                okay &= push_pair(&mut self.queens, &mut self.nbr_queens, i);
            } else if c == bishop || c == dark_bishop {
                if is_dark(i) {
                    okay &= self.nbr_dark_bishops == 0;
                    self.bishop_dark = i;
                    self.nbr_dark_bishops += 1;
                } else {
                    okay &= self.nbr_light_bishops == 0;
                    self.bishop_light = i;
                    self.nbr_light_bishops += 1;
                }
            } else if c == king {
                self.king = i;
            }
            if !okay {
                break;
            }
        }
        // The second queen's codes overlap pawn slots 6 and 7
        if self.nbr_queens == 2 && self.nbr_pawns > 6 {
            okay = false;
        }
        self.fast_mode = okay;
        okay
    }

    /// Forgets a piece captured on `sq`.
    pub fn remove_captured(&mut self, role: Role, sq: Sq) {
        match role {
            Role::Knight => remove_from_pair(&mut self.knights, &mut self.nbr_knights, sq),
            Role::Rook => remove_from_pair(&mut self.rooks, &mut self.nbr_rooks, sq),
            Role::Queen => remove_from_pair(&mut self.queens, &mut self.nbr_queens, sq),
            Role::Bishop if is_dark(sq) => {
                self.nbr_dark_bishops = self.nbr_dark_bishops.saturating_sub(1)
            }
            Role::Bishop => self.nbr_light_bishops = self.nbr_light_bishops.saturating_sub(1),
            Role::Pawn => {
                let n = self.nbr_pawns as usize;
                if let Some(i) = self.pawns[..n].iter().position(|&s| s == sq) {
                    self.pawns.copy_within(i + 1..n, i);
                    self.nbr_pawns -= 1;
                }
            }
            Role::King => {}
        }
    }

    // pawns[slot] has already moved; restore canonical order by bubbling it
    fn reorder_pawn(&mut self, slot: usize) {
        let n = self.nbr_pawns as usize;
        let ord = |sq: Sq| PAWN_ORDERING[sq as usize];
        let mut i = slot;
        while i + 1 < n && ord(self.pawns[i]) > ord(self.pawns[i + 1]) {
            self.pawns.swap(i, i + 1);
            i += 1;
        }
        while i > 0 && ord(self.pawns[i - 1]) > ord(self.pawns[i]) {
            self.pawns.swap(i - 1, i);
            i -= 1;
        }
    }

    /// Encodes a move by the piece of `role` and updates the piece lists.
    pub fn encode(&mut self, role: Role, mv: FastMove) -> u8 {
        let (src, dst) = (mv.src, mv.dst);
        match role {
            Role::King => {
                self.king = dst;
                let low = match i32::from(dst) - i32::from(src) {
                    -9 => K_NW,
                    -8 => K_N,
                    -7 => K_NE,
                    -1 => K_W,
                    1 => K_E,
                    7 => K_SW,
                    8 => K_S,
                    9 => K_SE,
                    2 | -2 => {
                        if let Some((from, to)) = mv.castling_rook() {
                            let i = slot_of(&self.rooks[..self.nbr_rooks as usize], from);
                            self.rooks[i] = to;
                        }
                        if dst > src { K_CASTLE_SHORT } else { K_CASTLE_LONG }
                    }
                    _ => return CODE_END,
                };
                CODE_KING | low
            }
            Role::Rook => {
                let i = slot_of(&self.rooks[..self.nbr_rooks as usize], src);
                let base = if i == 0 { CODE_ROOK_LO } else { CODE_ROOK_HI };
                self.rooks[i] = dst;
                order_pair(&mut self.rooks, self.nbr_rooks);
                base | rook_low(src, dst)
            }
            Role::Bishop => {
                if is_dark(src) {
                    self.bishop_dark = dst;
                    CODE_BISHOP_DARK | bishop_low(src, dst)
                } else {
                    self.bishop_light = dst;
                    CODE_BISHOP_LIGHT | bishop_low(src, dst)
                }
            }
            Role::Queen => {
                let i = slot_of(&self.queens[..self.nbr_queens as usize], src);
                self.queens[i] = dst;
                order_pair(&mut self.queens, self.nbr_queens);
                let straight = src & 7 == dst & 7 || src & 0x38 == dst & 0x38;
                match (i, straight) {
                    (0, true) => CODE_QUEEN_ROOK | rook_low(src, dst),
                    (0, false) => CODE_QUEEN_BISHOP | bishop_low(src, dst),
                    (_, true) => CODE_QUEEN2_ROOK | rook_low(src, dst),
                    (_, false) => CODE_QUEEN2_BISHOP | bishop_low(src, dst),
                }
            }
            Role::Knight => {
                let i = slot_of(&self.knights[..self.nbr_knights as usize], src);
                self.knights[i] = dst;
                order_pair(&mut self.knights, self.nbr_knights);
                let delta = i32::from(dst) - i32::from(src);
                let vector = N_VECTORS.iter().position(|&v| v == delta).unwrap_or(0) as u8;
                let hi = if i == 0 { 0 } else { N_HI };
                CODE_KNIGHT | hi | vector
            }
            Role::Pawn => {
                let slot = slot_of(&self.pawns[..self.nbr_pawns as usize], src);
                self.pawns[slot] = dst;
                let forward = if self.white {
                    i32::from(src) - i32::from(dst)
                } else {
                    i32::from(dst) - i32::from(src)
                };
                let dir = match forward {
                    16 => P_DOUBLE,
                    8 => P_SINGLE,
                    9 => P_LEFT,
                    7 => P_RIGHT,
                    _ => P_DOUBLE,
                };
                let low = match mv.kind {
                    FastKind::Promotion(r) => {
                        // The promoted piece has no slot
                        self.fast_mode = false;
                        (dir << 2) | promotion_bits(r)
                    }
                    _ => {
                        if dir == P_LEFT || dir == P_RIGHT {
                            self.reorder_pawn(slot);
                        }
                        dir
                    }
                };
                CODE_PAWN | ((slot as u8) << 4) | low
            }
        }
    }

    /// Decodes one fast code and updates the piece lists. `occupied` tells
    /// a diagonal pawn capture from en passant.
    pub fn decode(&mut self, code: u8, occupied: impl Fn(Sq) -> bool) -> Option<FastMove> {
        match code & 0xf0 {
            CODE_KING => {
                let src = self.king;
                let (delta, kind) = match code & 0x0f {
                    K_N => (-8, FastKind::Quiet),
                    K_NE => (-7, FastKind::Quiet),
                    K_E => (1, FastKind::Quiet),
                    K_SE => (9, FastKind::Quiet),
                    K_S => (8, FastKind::Quiet),
                    K_SW => (7, FastKind::Quiet),
                    K_W => (-1, FastKind::Quiet),
                    K_NW => (-9, FastKind::Quiet),
                    K_CASTLE_SHORT => (2, FastKind::CastleShort),
                    K_CASTLE_LONG => (-2, FastKind::CastleLong),
                    _ => return None,
                };
                let mv = FastMove {
                    src,
                    dst: offset(src, delta)?,
                    kind,
                };
                if let Some((from, to)) = mv.castling_rook() {
                    let i = slot_of(&self.rooks[..self.nbr_rooks as usize], from);
                    self.rooks[i] = to;
                }
                self.king = mv.dst;
                Some(mv)
            }
            CODE_ROOK_LO | CODE_ROOK_HI => {
                let i = usize::from(code & 0x10 != 0);
                if i >= self.nbr_rooks as usize {
                    return None;
                }
                let src = self.rooks[i];
                let dst = rook_target(code, src);
                self.rooks[i] = dst;
                order_pair(&mut self.rooks, self.nbr_rooks);
                quiet_move(src, dst)
            }
            CODE_BISHOP_DARK => {
                let src = self.bishop_dark;
                let dst = bishop_target(code, src)?;
                self.bishop_dark = dst;
                quiet_move(src, dst)
            }
            CODE_BISHOP_LIGHT => {
                let src = self.bishop_light;
                let dst = bishop_target(code, src)?;
                self.bishop_light = dst;
                quiet_move(src, dst)
            }
            CODE_KNIGHT => {
                let i = usize::from(code & N_HI != 0);
                if i >= self.nbr_knights as usize {
                    return None;
                }
                let src = self.knights[i];
                let dst = offset(src, N_VECTORS[(code & 7) as usize])?;
                self.knights[i] = dst;
                order_pair(&mut self.knights, self.nbr_knights);
                quiet_move(src, dst)
            }
            CODE_QUEEN_ROOK | CODE_QUEEN_BISHOP => self.decode_queen(0, code),
            CODE_QUEEN2_ROOK | CODE_QUEEN2_BISHOP if self.nbr_queens >= 2 => {
                self.decode_queen(1, code)
            }
            _ => self.decode_pawn(code, occupied),
        }
    }

    fn decode_queen(&mut self, i: usize, code: u8) -> Option<FastMove> {
        if i >= self.nbr_queens as usize {
            return None;
        }
        let src = self.queens[i];
        let dst = if code & 0x10 == 0 {
            rook_target(code, src)
        } else {
            bishop_target(code, src)?
        };
        self.queens[i] = dst;
        order_pair(&mut self.queens, self.nbr_queens);
        Some(FastMove {
            src,
            dst,
            kind: FastKind::Quiet,
        })
    }

    fn decode_pawn(&mut self, code: u8, occupied: impl Fn(Sq) -> bool) -> Option<FastMove> {
        let slot = ((code >> 4) & 7) as usize;
        if slot >= self.nbr_pawns as usize {
            return None;
        }
        let src = self.pawns[slot];
        let forward = if self.white { -1 } else { 1 };
        let low = code & 0x0f;
        let (step, kind) = match low {
            P_DOUBLE => (16, FastKind::DoublePush),
            P_SINGLE => (8, FastKind::Quiet),
            P_LEFT => (9, FastKind::Quiet),
            P_RIGHT => (7, FastKind::Quiet),
            _ => {
                let step = match low >> 2 {
                    P_SINGLE => 8,
                    P_LEFT => 9,
                    P_RIGHT => 7,
                    _ => return None,
                };
                let role = match low & 3 {
                    PROMO_QUEEN => Role::Queen,
                    PROMO_ROOK => Role::Rook,
                    PROMO_BISHOP => Role::Bishop,
                    _ => Role::Knight,
                };
                (step, FastKind::Promotion(role))
            }
        };
        let dst = offset(src, forward * step)?;
        let kind = if (low == P_LEFT || low == P_RIGHT) && !occupied(dst) {
            FastKind::EnPassant
        } else {
            kind
        };
        self.pawns[slot] = dst;
        match kind {
            FastKind::Promotion(_) => self.fast_mode = false,
            _ if low == P_LEFT || low == P_RIGHT => self.reorder_pawn(slot),
            _ => {}
        }
        Some(FastMove { src, dst, kind })
    }
}

fn push_pair(pair: &mut [Sq; 2], count: &mut u8, sq: Sq) -> bool {
    if *count >= 2 {
        return false;
    }
    pair[*count as usize] = sq;
    *count += 1;
    true
}

fn promotion_bits(role: Role) -> u8 {
    match role {
        Role::Rook => PROMO_ROOK,
        Role::Bishop => PROMO_BISHOP,
        Role::Knight => PROMO_KNIGHT,
        _ => PROMO_QUEEN,
    }
}
