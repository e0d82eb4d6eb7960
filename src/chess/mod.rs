pub mod background;
pub mod bins;
pub mod bitpack;
pub mod board;
pub mod codec;
pub mod collection;
pub mod config;
pub mod control;
pub mod database;
pub mod dedup;
pub mod error;
pub mod format;
pub mod ids;
pub mod log;
pub mod names;
pub mod pattern;
pub mod pgn;
pub mod progress;
pub mod reader;
pub mod record;
pub mod replay;
pub mod roster;
pub mod search;
pub mod side;
pub mod sort;
pub mod visitor;

pub use background::{BackgroundLoad, LoadedGames};
pub use board::CharBoard;
pub use codec::{MoveCodec, compress_moves, uncompress_moves};
pub use collection::Collection;
pub use config::EloCutoffPolicy;
pub use database::{Database, LoadOutcome, open, write_collection, write_file};
pub use dedup::{DedupReport, remove_duplicates_and_write};
pub use error::DbError;
pub use pattern::{Pattern, PatternParameters, PatternStats, search_pattern};
pub use progress::{NoProgress, Progress};
pub use reader::{CompressionMode, ImportReport, import_pgn, import_pgn_files};
pub use record::{GameDocument, GameRecord};
pub use roster::Roster;
pub use search::{GameMatch, MatchList, PositionTarget, search_position};
pub use sort::{SortKey, sort_collection};
