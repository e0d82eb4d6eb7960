//! Square numbering and the character board shared by the codec and the
//! search engine.
//!
//! Squares run a8 = 0, b8 = 1 .. h1 = 63, so row 0 is rank 8. Pieces are the
//! usual FEN letters except that a bishop standing on a dark square is written
//! `D`/`d`; a bishop never changes square colour, so the letter identifies the
//! bishop for its whole life.

use shakmaty::{Board, Color, File, Rank, Role, Square};

/// Board square in a8-first order.
pub type Sq = u8;

pub const EMPTY: u8 = b' ';

pub const fn file_of(sq: Sq) -> u8 {
    sq & 7
}

/// 0 is rank 8, 7 is rank 1.
pub const fn row_of(sq: Sq) -> u8 {
    (sq >> 3) & 7
}

pub const fn is_dark(sq: Sq) -> bool {
    (file_of(sq) + row_of(sq)) & 1 == 1
}

/// Canonical pawn numbering: files left to right, and within a file from
/// rank 1 upwards.
pub static PAWN_ORDERING: [u8; 64] = pawn_ordering();

/// Squares visited in ascending [`PAWN_ORDERING`].
pub static TRAVERSE_ORDER: [Sq; 64] = traverse_order();

const fn pawn_ordering() -> [u8; 64] {
    let mut table = [0u8; 64];
    let mut sq = 0;
    while sq < 64 {
        let s = sq as u8;
        table[sq] = file_of(s) * 8 + (7 - row_of(s));
        sq += 1;
    }
    table
}

const fn traverse_order() -> [Sq; 64] {
    let mut table = [0u8; 64];
    let mut file = 0u8;
    while file < 8 {
        let mut rank = 0u8;
        while rank < 8 {
            table[(file * 8 + rank) as usize] = (7 - rank) * 8 + file;
            rank += 1;
        }
        file += 1;
    }
    table
}

pub fn to_square(sq: Sq) -> Square {
    Square::from_coords(
        File::new(u32::from(file_of(sq))),
        Rank::new(u32::from(7 - row_of(sq))),
    )
}

pub fn from_square(sq: Square) -> Sq {
    sq.flip_vertical() as u8
}

/// Piece letter for a role, with the dark bishop distinction applied.
pub fn piece_char(color: Color, role: Role, sq: Sq) -> u8 {
    let c = match role {
        Role::Pawn => b'p',
        Role::Knight => b'n',
        Role::Bishop if is_dark(sq) => b'd',
        Role::Bishop => b'b',
        Role::Rook => b'r',
        Role::Queen => b'q',
        Role::King => b'k',
    };
    match color {
        Color::White => c.to_ascii_uppercase(),
        Color::Black => c,
    }
}

pub fn role_of(c: u8) -> Option<Role> {
    match c.to_ascii_lowercase() {
        b'p' => Some(Role::Pawn),
        b'n' => Some(Role::Knight),
        b'b' | b'd' => Some(Role::Bishop),
        b'r' => Some(Role::Rook),
        b'q' => Some(Role::Queen),
        b'k' => Some(Role::King),
        _ => None,
    }
}

/// 64 piece letters, compared eight bytes (one rank) at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharBoard {
    cells: [u8; 64],
}

impl Default for CharBoard {
    fn default() -> Self {
        Self::START
    }
}

impl CharBoard {
    pub const START: CharBoard = CharBoard {
        cells: *b"rnbqkdnrpppppppp                                PPPPPPPPRNDQKBNR",
    };

    pub const fn empty() -> Self {
        Self { cells: [EMPTY; 64] }
    }

    pub fn from_cells(cells: [u8; 64]) -> Self {
        let mut board = Self { cells };
        board.normalise();
        board
    }

    /// Converts a shakmaty board, writing dark bishops as `D`/`d`.
    pub fn from_board(board: &Board) -> Self {
        let mut out = Self::empty();
        for square in board.occupied() {
            if let Some(piece) = board.piece_at(square) {
                let sq = from_square(square);
                out.cells[sq as usize] = piece_char(piece.color, piece.role, sq);
            }
        }
        out
    }

    /// Maps any non-piece byte to [`EMPTY`] and applies the dark bishop
    /// letters.
    fn normalise(&mut self) {
        for (i, cell) in self.cells.iter_mut().enumerate() {
            let sq = i as Sq;
            *cell = match *cell {
                b'B' | b'D' if is_dark(sq) => b'D',
                b'B' | b'D' => b'B',
                b'b' | b'd' if is_dark(sq) => b'd',
                b'b' | b'd' => b'b',
                c @ (b'P' | b'N' | b'R' | b'Q' | b'K' | b'p' | b'n' | b'r' | b'q' | b'k') => c,
                _ => EMPTY,
            };
        }
    }

    #[inline]
    pub fn get(&self, sq: Sq) -> u8 {
        self.cells[(sq & 63) as usize]
    }

    #[inline]
    pub fn set(&mut self, sq: Sq, c: u8) {
        self.cells[(sq & 63) as usize] = c;
    }

    #[inline]
    pub fn is_occupied(&self, sq: Sq) -> bool {
        self.get(sq) != EMPTY
    }

    pub fn cells(&self) -> &[u8; 64] {
        &self.cells
    }

    /// Row 0 is rank 8.
    #[inline]
    pub fn rank_word(&self, row: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.cells[row * 8..row * 8 + 8]);
        u64::from_ne_bytes(bytes)
    }

    pub fn rank_words(&self) -> [u64; 8] {
        std::array::from_fn(|row| self.rank_word(row))
    }

    /// Left-right mirror image.
    pub fn mirrored(&self) -> Self {
        let mut cells = [EMPTY; 64];
        for (i, cell) in cells.iter_mut().enumerate() {
            *cell = self.cells[i ^ 7];
        }
        Self::from_cells(cells)
    }

    /// Top-bottom flip with the colours swapped, so white's pieces become
    /// black's standing where black's would.
    pub fn colour_reversed(&self) -> Self {
        let mut cells = [EMPTY; 64];
        for (i, cell) in cells.iter_mut().enumerate() {
            let c = self.cells[i ^ 56];
            *cell = if c.is_ascii_uppercase() {
                c.to_ascii_lowercase()
            } else {
                c.to_ascii_uppercase()
            };
        }
        Self::from_cells(cells)
    }
}

const MATERIAL_LETTERS: &[u8; 12] = b"PNBDRQpnbdrq";

/// Non-king piece counts by letter, light and dark bishops kept apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Material([u8; 12]);

impl Material {
    fn slot(c: u8) -> Option<usize> {
        MATERIAL_LETTERS.iter().position(|&x| x == c)
    }

    pub fn of(board: &CharBoard) -> Self {
        let mut m = Self::default();
        for &c in board.cells() {
            if let Some(i) = Self::slot(c) {
                m.0[i] += 1;
            }
        }
        m
    }

    pub fn get(&self, c: u8) -> u8 {
        Self::slot(c).map_or(0, |i| self.0[i])
    }

    pub fn remove(&mut self, c: u8) {
        if let Some(i) = Self::slot(c) {
            self.0[i] = self.0[i].saturating_sub(1);
        }
    }

    pub fn total(&self) -> u32 {
        self.0.iter().map(|&n| u32::from(n)).sum()
    }

    pub fn white(&self) -> u32 {
        self.0[..6].iter().map(|&n| u32::from(n)).sum()
    }

    pub fn black(&self) -> u32 {
        self.0[6..].iter().map(|&n| u32::from(n)).sum()
    }

    /// Counts dark bishops as bishops.
    pub fn merged_bishops(mut self) -> Self {
        for (dark, light) in [(3, 2), (9, 8)] {
            self.0[light] += self.0[dark];
            self.0[dark] = 0;
        }
        self
    }

    /// Every count is at least `other`'s.
    pub fn covers(&self, other: &Material) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a >= b)
    }
}
