//! PGN file import into a [`Collection`].

use super::collection::Collection;
use super::config::EloCutoffPolicy;
use super::error::DbError;
use super::log;
use super::visitor::GameVisitor;

use pgn_reader::Reader;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use zstd::stream::read::Decoder as ZstdDecoder;

pub type PgnInput = Box<dyn Read + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    Plain,
    Zstd,
}

impl CompressionMode {
    pub fn parse(raw: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let normalized = raw.trim();
        if normalized.eq_ignore_ascii_case("zstd") || normalized.eq_ignore_ascii_case("zst") {
            Ok(Self::Zstd)
        } else if normalized.eq_ignore_ascii_case("none") || normalized.eq_ignore_ascii_case("plain") {
            Ok(Self::Plain)
        } else {
            Err(format!(
                "Invalid compression value '{}'. Supported values: 'zstd', 'plain' or omitted.",
                normalized
            )
            .into())
        }
    }

    /// `.zst` files are read through the decoder, anything else as text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("zst") => Self::Zstd,
            _ => Self::Plain,
        }
    }
}

/// Counters for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub files: usize,
    pub games_read: usize,
    pub inserted: usize,
    /// Games the collection declined: Elo cutoff, blank names, short games,
    /// set-up positions.
    pub filtered: usize,
    /// Games dropped because a move or the start position could not be read.
    pub rejected: usize,
    pub killed: bool,
}

/// Expands a single path or a glob pattern into the files to read.
pub fn expand_paths(pattern: &str) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let paths: Vec<PathBuf> = if pattern.contains('*') || pattern.contains('?') {
        glob::glob(pattern)?.filter_map(|entry| entry.ok()).collect()
    } else {
        vec![PathBuf::from(pattern)]
    };
    Ok(paths)
}

pub fn open_input_stream(path: &Path, compression: CompressionMode) -> Result<PgnInput, String> {
    let file =
        File::open(path).map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

    match compression {
        CompressionMode::Plain => Ok(Box::new(file)),
        CompressionMode::Zstd => ZstdDecoder::new(file)
            .map(|decoder| Box::new(decoder) as PgnInput)
            .map_err(|e| {
                format!(
                    "Failed to initialize zstd decoder for '{}': {}",
                    path.display(),
                    e
                )
            }),
    }
}

/// Reads every game from `input` and offers it to `collection`. Games with
/// an illegal move or unreadable start position are skipped with a warning.
/// `kill` is polled between games.
pub fn import_pgn<R: Read>(
    collection: &mut Collection,
    input: R,
    source: &str,
    policy: &EloCutoffPolicy,
    kill: &AtomicBool,
    report: &mut ImportReport,
) {
    let mut reader = Reader::new(input);
    let mut visitor = GameVisitor::new();
    let mut game_index = 0usize;
    loop {
        if kill.load(Ordering::Relaxed) {
            report.killed = true;
            return;
        }
        game_index += 1;
        match reader.read_game(&mut visitor) {
            Ok(Some(())) => {}
            Ok(None) => return,
            Err(error) => {
                visitor.finalize_game_with_error(format!(
                    "Parser-stage error: stage=read_game; file='{}'; game_index={}; error={}",
                    source, game_index, error
                ));
                if let Some(msg) = visitor.current_game.take().and_then(|g| g.parse_error) {
                    log::warn(msg);
                }
                report.games_read += 1;
                report.rejected += 1;
                // The reader cannot resynchronise after an I/O level failure
                return;
            }
        }
        let Some(game) = visitor.current_game.take() else {
            return;
        };
        report.games_read += 1;
        if let Some(error) = game.parse_error.as_deref()
            && (game.moves.is_empty() || error.contains("Illegal move") || error.contains("FEN"))
        {
            log::warn(format!("{}: game {} skipped: {}", source, game_index, error));
            report.rejected += 1;
            continue;
        }
        if collection.append_game(&game.roster, &game.moves, policy) {
            report.inserted += 1;
        } else {
            report.filtered += 1;
        }
    }
}

/// Imports every file matched by `pattern`. `compression` overrides the
/// per-file choice made from the extension. With several files an
/// unreadable one is skipped with a warning; a single unreadable file is an
/// error.
pub fn import_pgn_files(
    collection: &mut Collection,
    pattern: &str,
    compression: Option<CompressionMode>,
    policy: &EloCutoffPolicy,
    kill: &AtomicBool,
) -> Result<ImportReport, DbError> {
    let paths = expand_paths(pattern).map_err(|e| DbError::Io(e.to_string()))?;
    if paths.is_empty() {
        return Err(DbError::FileNotFound(pattern.to_string()));
    }
    let mut report = ImportReport::default();
    for path in &paths {
        let mode = compression.unwrap_or_else(|| CompressionMode::from_path(path));
        let input = match open_input_stream(path, mode) {
            Ok(input) => input,
            Err(msg) if paths.len() == 1 => return Err(DbError::Io(msg)),
            Err(msg) => {
                log::warn(&msg);
                continue;
            }
        };
        report.files += 1;
        import_pgn(collection, input, &path.display().to_string(), policy, kill, &mut report);
        if report.killed {
            break;
        }
    }
    log::info(format!(
        "Import of '{}': {} files, {} games read, {} inserted, {} filtered, {} rejected",
        pattern, report.files, report.games_read, report.inserted, report.filtered, report.rejected
    ));
    Ok(report)
}
