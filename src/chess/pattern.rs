//! Pattern and material-balance search.
//!
//! A pattern is a partial board: every piece on it must stand on the same
//! square in the game, other squares are free. A material pattern instead
//! compares piece counts and ignores squares. Either kind can also be
//! matched with colours reversed and/or mirrored left to right.

use super::board::{CharBoard, EMPTY, Material, Sq};
use super::collection::Collection;
use super::error::DbError;
use super::log;
use super::progress::Progress;
use super::replay::Replay;
use super::search::{GameMatch, MatchList, PROGRESS_INTERVAL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternParameters {
    /// Pieces to find. Kings count like any other piece.
    pub board: CharBoard,
    pub white_to_move: bool,
    /// Ignore the side to move.
    pub either_to_move: bool,
    /// Also try the colour reversed pattern, with the other side to move.
    pub include_reverse_colours: bool,
    /// Also try the left-right mirror image.
    pub include_mirror_image: bool,
    /// The game may hold pieces beyond the pattern's. When false the game's
    /// non-king piece count must equal the pattern's.
    pub allow_more_pieces: bool,
    /// Keeps dark and light bishops apart when comparing material.
    pub bishops_must_be_same_colour: bool,
    /// Compare piece counts only.
    pub material_balance: bool,
    /// Consecutive half-moves the pattern must hold for.
    pub number_of_ply: u32,
}

impl Default for PatternParameters {
    fn default() -> Self {
        Self {
            board: CharBoard::empty(),
            white_to_move: true,
            either_to_move: false,
            include_reverse_colours: false,
            include_mirror_image: false,
            allow_more_pieces: true,
            bishops_must_be_same_colour: true,
            material_balance: false,
            number_of_ply: 1,
        }
    }
}

/// Tallies over the games a pattern search found. Results are counted from
/// the pattern's point of view: in a reversed match a 1-0 is a black win.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternStats {
    pub games: usize,
    pub reversed_games: usize,
    pub white_wins: usize,
    pub black_wins: usize,
    pub draws: usize,
}

impl PatternStats {
    fn record(&mut self, result: &str, reversed: bool) {
        self.games += 1;
        if reversed {
            self.reversed_games += 1;
        }
        match (result, reversed) {
            ("1-0", false) | ("0-1", true) => self.white_wins += 1,
            ("0-1", false) | ("1-0", true) => self.black_wins += 1,
            _ => self.draws += 1,
        }
    }
}

#[derive(Debug, Clone)]
struct Variant {
    pieces: Vec<(Sq, u8)>,
    material: Material,
    white_to_move: bool,
    reversed: bool,
}

/// Prepared form of [`PatternParameters`].
#[derive(Debug, Clone)]
pub struct Pattern {
    params: PatternParameters,
    variants: Vec<Variant>,
    min_pieces: u32,
}

fn fold_bishop(c: u8) -> u8 {
    match c {
        b'D' => b'B',
        b'd' => b'b',
        c => c,
    }
}

impl Pattern {
    pub fn new(params: PatternParameters) -> Self {
        let base = params.board;
        let mut boards = vec![(base, params.white_to_move, false)];
        if params.include_reverse_colours {
            boards.push((base.colour_reversed(), !params.white_to_move, true));
        }
        if params.include_mirror_image {
            boards.push((base.mirrored(), params.white_to_move, false));
            if params.include_reverse_colours {
                boards.push((base.mirrored().colour_reversed(), !params.white_to_move, true));
            }
        }
        let variants: Vec<Variant> = boards
            .into_iter()
            .map(|(board, white_to_move, reversed)| {
                let material = Material::of(&board);
                Variant {
                    pieces: (0..64u8)
                        .map(|sq| (sq, board.get(sq)))
                        .filter(|&(_, c)| c != EMPTY)
                        .collect(),
                    material: if params.bishops_must_be_same_colour {
                        material
                    } else {
                        material.merged_bishops()
                    },
                    white_to_move,
                    reversed,
                }
            })
            .collect();
        let min_pieces = variants
            .iter()
            .map(|v| v.material.total())
            .min()
            .unwrap_or(0);
        Self {
            params,
            variants,
            min_pieces,
        }
    }

    pub fn parameters(&self) -> &PatternParameters {
        &self.params
    }

    fn variant_matches(&self, v: &Variant, board: &CharBoard, material: &Material, white: bool) -> bool {
        if !self.params.either_to_move && white != v.white_to_move {
            return false;
        }
        let material = if self.params.bishops_must_be_same_colour {
            *material
        } else {
            material.merged_bishops()
        };
        if self.params.material_balance {
            return if self.params.allow_more_pieces {
                material.covers(&v.material)
            } else {
                material == v.material
            };
        }
        if !self.params.allow_more_pieces && material.total() != v.material.total() {
            return false;
        }
        v.pieces.iter().all(|&(sq, want)| {
            let have = board.get(sq);
            have == want || fold_bishop(have) == fold_bishop(want)
        })
    }

    /// Whether the current position matches, and if so whether it matched
    /// with colours reversed.
    pub fn test(&self, board: &CharBoard, material: &Material, white_to_move: bool) -> Option<bool> {
        self.variants
            .iter()
            .find(|v| self.variant_matches(v, board, material, white_to_move))
            .map(|v| v.reversed)
    }

    /// Replays one game; returns the offset where the first long enough run
    /// of matching positions starts, and its orientation.
    pub fn search_game(&self, mut replay: Replay<'_>) -> Option<(u16, bool)> {
        let needed = self.params.number_of_ply.max(1);
        let mut run = 0u32;
        let mut start = (0u16, false);
        loop {
            match self.test(replay.board(), replay.material(), replay.white_to_move()) {
                Some(reversed) => {
                    if run == 0 {
                        start = (replay.plies(), reversed);
                    }
                    run += 1;
                    if run >= needed {
                        return Some(start);
                    }
                }
                None => run = 0,
            }
            // Captures only ever lower the piece count
            if replay.material().total() < self.min_pieces || !replay.step() {
                return None;
            }
        }
    }
}

/// Lists every game that reaches `pattern`, with aggregate results.
/// Cancelling via `progress` yields [`DbError::Killed`].
pub fn search_pattern(
    collection: &Collection,
    pattern: &Pattern,
    progress: &mut (impl Progress + ?Sized),
) -> Result<(MatchList, PatternStats), DbError> {
    let games = collection.games();
    let n = games.len();
    let mut found = MatchList::new();
    let mut stats = PatternStats::default();
    for (index, game) in games.iter().enumerate() {
        if index % PROGRESS_INTERVAL == 0 && progress.fraction(index as u64, n as u64).is_break() {
            return Err(DbError::Killed);
        }
        if let Some((offset, reversed)) = pattern.search_game(Replay::for_game(game)) {
            let roster = game.roster(&collection.catalog)?;
            stats.record(&roster.result, reversed);
            found.push(GameMatch {
                index,
                game_id: game.game_id(),
                offset_first: offset,
                offset_last: offset,
            });
        }
    }
    log::info(format!(
        "Pattern search: {} games, {} found, {} reversed",
        n, stats.games, stats.reversed_games
    ));
    Ok((found, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::board::from_square;
    use crate::chess::config::EloCutoffPolicy;
    use crate::chess::progress::NoProgress;
    use crate::chess::roster::Roster;
    use shakmaty::san::SanPlus;
    use shakmaty::{Chess, Move, Position, Square};
    use std::ops::ControlFlow;

    const RUY_LOPEZ: [&str; 6] = ["e4", "e5", "Nf3", "Nc6", "Bb5", "a6"];
    const SCANDINAVIAN: [&str; 4] = ["e4", "d5", "exd5", "Qxd5"];

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

    fn collection(games: &[(&[&str], &str)]) -> Collection {
        let mut c = Collection::new();
        for (i, (sans, result)) in games.iter().enumerate() {
            let roster = Roster {
                white: format!("White {}", i),
                black: format!("Black {}", i),
                result: result.to_string(),
                ..Roster::default()
            };
            assert!(c.append_game(&roster, &play(sans), &EloCutoffPolicy::default()));
        }
        c
    }

    fn board(pieces: &[(Square, u8)]) -> CharBoard {
        let mut cells = [EMPTY; 64];
        for &(sq, c) in pieces {
            cells[from_square(sq) as usize] = c;
        }
        CharBoard::from_cells(cells)
    }

    fn search(c: &Collection, params: PatternParameters) -> (MatchList, PatternStats) {
        search_pattern(c, &Pattern::new(params), &mut NoProgress).unwrap()
    }

    #[test]
    fn test_partial_board_respects_side_to_move() {
        let c = collection(&[(&RUY_LOPEZ, "1-0")]);
        let knight_and_pawn = board(&[(Square::F3, b'N'), (Square::E4, b'P')]);
        let (found, stats) = search(
            &c,
            PatternParameters {
                board: knight_and_pawn,
                white_to_move: false,
                ..PatternParameters::default()
            },
        );
        assert_eq!(found[0].offset_first, 3);
        assert_eq!(stats.white_wins, 1);

        let (found, _) = search(
            &c,
            PatternParameters {
                board: knight_and_pawn,
                white_to_move: true,
                ..PatternParameters::default()
            },
        );
        assert_eq!(found[0].offset_first, 4);
    }

    #[test]
    fn test_reversed_colours_flip_the_result() {
        let c = collection(&[(&RUY_LOPEZ, "1-0")]);
        let params = PatternParameters {
            board: board(&[(Square::F6, b'n'), (Square::E5, b'p')]),
            white_to_move: true,
            include_reverse_colours: true,
            ..PatternParameters::default()
        };
        let (found, stats) = search(&c, params.clone());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].offset_first, 3);
        assert_eq!(stats.reversed_games, 1);
        assert_eq!(stats.black_wins, 1);
        assert_eq!(stats.white_wins, 0);

        let (found, _) = search(
            &c,
            PatternParameters {
                include_reverse_colours: false,
                ..params
            },
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_mirror_image() {
        let c = collection(&[(&RUY_LOPEZ, "1/2-1/2")]);
        let params = PatternParameters {
            board: board(&[(Square::C3, b'N'), (Square::D4, b'P')]),
            either_to_move: true,
            ..PatternParameters::default()
        };
        assert!(search(&c, params.clone()).0.is_empty());
        let (found, stats) = search(
            &c,
            PatternParameters {
                include_mirror_image: true,
                ..params
            },
        );
        assert_eq!(found[0].offset_first, 3);
        assert_eq!(stats.draws, 1);
        assert_eq!(stats.reversed_games, 0);
    }

    #[test]
    fn test_exact_piece_count() {
        let c = collection(&[(&RUY_LOPEZ, "1-0")]);
        let params = PatternParameters {
            board: board(&[(Square::F3, b'N'), (Square::E4, b'P')]),
            either_to_move: true,
            allow_more_pieces: false,
            ..PatternParameters::default()
        };
        assert!(search(&c, params).0.is_empty());
    }

    #[test]
    fn test_material_balance_after_exchange() {
        let c = collection(&[(&RUY_LOPEZ, "1-0"), (&SCANDINAVIAN, "0-1")]);
        // One pawn each gone
        let mut cells = *CharBoard::START.cells();
        cells[from_square(Square::E2) as usize] = EMPTY;
        cells[from_square(Square::D7) as usize] = EMPTY;
        let params = PatternParameters {
            board: CharBoard::from_cells(cells),
            either_to_move: true,
            material_balance: true,
            allow_more_pieces: false,
            ..PatternParameters::default()
        };
        let (found, stats) = search(&c, params);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 1);
        assert_eq!(found[0].offset_first, 4);
        assert_eq!(stats.black_wins, 1);
    }

    #[test]
    fn test_bishop_colours_merge_only_on_request() {
        let c = collection(&[(&RUY_LOPEZ, "1-0")]);
        // Two light squared white bishops, otherwise the initial material
        let mut cells = *CharBoard::START.cells();
        cells[from_square(Square::C1) as usize] = EMPTY;
        cells[from_square(Square::D3) as usize] = b'B';
        let params = PatternParameters {
            board: CharBoard::from_cells(cells),
            either_to_move: true,
            material_balance: true,
            allow_more_pieces: false,
            ..PatternParameters::default()
        };
        assert!(search(&c, params.clone()).0.is_empty());
        let (found, _) = search(
            &c,
            PatternParameters {
                bishops_must_be_same_colour: false,
                ..params
            },
        );
        assert_eq!(found[0].offset_first, 0);
    }

    #[test]
    fn test_number_of_ply_needs_a_run() {
        let c = collection(&[(&SCANDINAVIAN, "1-0"), (&RUY_LOPEZ, "1-0")]);
        let params = PatternParameters {
            board: board(&[(Square::E4, b'P')]),
            either_to_move: true,
            number_of_ply: 3,
            ..PatternParameters::default()
        };
        // 1.e4 d5 2.exd5 leaves e4 after two plies
        let (found, _) = search(&c, params);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 1);
        assert_eq!(found[0].offset_first, 1);
    }

    #[test]
    fn test_number_of_ply_with_mirror_image() {
        let c = collection(&[(&RUY_LOPEZ, "1-0")]);
        // Mirrored to Nf3 and e4, which hold from ply 3 to the end (ply 6)
        let params = PatternParameters {
            board: board(&[(Square::C3, b'N'), (Square::D4, b'P')]),
            either_to_move: true,
            include_mirror_image: true,
            number_of_ply: 4,
            ..PatternParameters::default()
        };
        let (found, stats) = search(&c, params.clone());
        assert_eq!(found[0].offset_first, 3);
        assert_eq!(stats.reversed_games, 0);

        let (found, _) = search(
            &c,
            PatternParameters {
                number_of_ply: 5,
                ..params
            },
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_number_of_ply_with_reversed_colours() {
        let c = collection(&[(&RUY_LOPEZ, "1-0")]);
        let params = PatternParameters {
            board: board(&[(Square::F6, b'n'), (Square::E5, b'p')]),
            white_to_move: true,
            include_reverse_colours: true,
            number_of_ply: 2,
            ..PatternParameters::default()
        };
        // Reversed it needs black to move, so plies 3 and 5 never join up
        assert!(search(&c, params.clone()).0.is_empty());

        let (found, stats) = search(
            &c,
            PatternParameters {
                either_to_move: true,
                number_of_ply: 4,
                ..params
            },
        );
        assert_eq!(found[0].offset_first, 3);
        assert_eq!(stats.reversed_games, 1);
        assert_eq!(stats.black_wins, 1);
    }

    #[test]
    fn test_material_at_least_with_number_of_ply() {
        let c = collection(&[(&SCANDINAVIAN, "0-1")]);
        let pawns: Vec<(Square, u8)> = [
            Square::A7,
            Square::B7,
            Square::C7,
            Square::D7,
            Square::E7,
            Square::F7,
            Square::G7,
            Square::H7,
        ]
        .into_iter()
        .map(|sq| (sq, b'p'))
        .collect();
        let params = PatternParameters {
            board: board(&pawns),
            either_to_move: true,
            material_balance: true,
            allow_more_pieces: true,
            number_of_ply: 3,
            ..PatternParameters::default()
        };
        // Black keeps eight pawns for plies 0 to 2; 2.exd5 takes one
        let (found, stats) = search(&c, params.clone());
        assert_eq!(found[0].offset_first, 0);
        assert_eq!(stats.black_wins, 1);

        let (found, _) = search(
            &c,
            PatternParameters {
                number_of_ply: 4,
                ..params.clone()
            },
        );
        assert!(found.is_empty());

        // Exact counts fail: the game has pieces besides the pawns
        let (found, _) = search(
            &c,
            PatternParameters {
                allow_more_pieces: false,
                ..params
            },
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_cancelled_pattern_search_is_killed() {
        let c = collection(&[(&RUY_LOPEZ, "1-0")]);
        let mut cancel = |_: u32, _: Option<&str>| ControlFlow::Break(());
        let err = search_pattern(&c, &Pattern::new(PatternParameters::default()), &mut cancel)
            .unwrap_err();
        assert!(matches!(err, DbError::Killed));
    }
}
