//! Compact binary storage and in-memory search for chess game databases.
//!
//! Games are stored as a packed header plus one byte per half-move. A
//! database file loads into a [`chess::Collection`], which can be searched
//! for positions, patterns and material balances, deduplicated, sorted and
//! written back out.

pub mod chess;

pub use chess::{
    BackgroundLoad, Collection, DbError, GameMatch, MatchList, Pattern, PatternParameters,
    PositionTarget, Progress, Roster,
};
