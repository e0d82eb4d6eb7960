//! Opening, loading and writing database files.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::bitpack::bits_required;
use super::collection::Collection;
use super::control::{APPEND_INDEX_BITS, HeaderValues, StringTables, header_schema};
use super::error::DbError;
use super::format::{
    COMPATIBILITY_HEADER_SIZE, FILE_HEADER_LEN, FileHeader, FormatVersion, Preamble,
    compatibility_header, inspect_preamble,
};
use super::log;
use super::progress::{Progress, fraction_to_permill};
use super::record::{BinaryRecord, GameRecord};

/// A validated database file, positioned anywhere.
#[derive(Debug)]
pub struct Database<R> {
    name: String,
    reader: R,
    preamble_size: usize,
    version: u8,
}

/// What a load added to a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    pub games: usize,
    pub promotion_games: usize,
    pub killed: bool,
}

/// Opens and validates a database file. On failure the file is closed and
/// the error explains why.
pub fn open(path: impl AsRef<Path>) -> Result<Database<BufReader<File>>, DbError> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let file = File::open(path).map_err(|_| DbError::FileNotFound(name.clone()))?;
    Database::from_reader(name, BufReader::new(file))
}

impl<R: BufRead + Seek> Database<R> {
    pub fn from_reader(name: impl Into<String>, mut reader: R) -> Result<Self, DbError> {
        let name = name.into();
        let not_tarrasch =
            || DbError::NotATarraschFile(format!("File {} does not appear to be a Tarrasch database file", name));
        reader.seek(SeekFrom::Start(0))?;
        let mut buf = [0u8; COMPATIBILITY_HEADER_SIZE];
        if let Err(e) = reader.read_exact(&mut buf) {
            return Err(match e.kind() {
                ErrorKind::UnexpectedEof => not_tarrasch(),
                _ => e.into(),
            });
        }
        match inspect_preamble(&buf) {
            Preamble::Binary { version, size } => {
                if version == FormatVersion::Tiny.byte() {
                    Err(DbError::UnsupportedTinyVersion { path: name })
                } else if version < FormatVersion::BinDb.byte() {
                    Err(DbError::UnsupportedLegacyVersion {
                        path: name,
                        version,
                    })
                } else if version > FormatVersion::Lockable.byte() {
                    Err(DbError::UnsupportedFutureVersion {
                        path: name,
                        version,
                    })
                } else {
                    Ok(Self {
                        name,
                        reader,
                        preamble_size: size,
                        version,
                    })
                }
            }
            Preamble::LegacySql => Err(DbError::UnsupportedLegacyVersion {
                path: name,
                version: FormatVersion::LegacySql.byte(),
            }),
            Preamble::Unknown => Err(not_tarrasch()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Whether the file format can carry the locked flag.
    pub fn is_lockable(&self) -> bool {
        self.version == FormatVersion::Lockable.byte()
    }

    /// Loads every game into a fresh collection. A raised kill flag or a
    /// cancelling progress callback yields [`DbError::Killed`].
    pub fn load_all(
        &mut self,
        for_append: bool,
        progress: &mut (impl Progress + ?Sized),
        kill: &AtomicBool,
    ) -> Result<Collection, DbError> {
        let mut collection = Collection::new();
        let outcome = self.load_into(&mut collection, for_append, progress, kill)?;
        if outcome.killed {
            return Err(DbError::Killed);
        }
        Ok(collection)
    }

    /// Appends this file's games to `collection`. Cancellation is reported in
    /// the outcome and leaves the games read so far in place.
    ///
    /// Loading for append keeps file order and widens string indexes to 24
    /// bits; otherwise games end up newest first.
    pub fn load_into(
        &mut self,
        collection: &mut Collection,
        for_append: bool,
        progress: &mut (impl Progress + ?Sized),
        kill: &AtomicBool,
    ) -> Result<LoadOutcome, DbError> {
        let reverse = !for_append;
        self.reader.seek(SeekFrom::Start(self.preamble_size as u64))?;
        let fh = FileHeader::read_from(&mut self.reader)?;
        log::info(format!(
            "{} games, {} players, {} events, {} sites",
            fh.nbr_games, fh.nbr_players, fh.nbr_events, fh.nbr_sites
        ));
        let player_bits = bits_required(FileHeader::count(fh.nbr_players));
        let event_bits = bits_required(FileHeader::count(fh.nbr_events));
        let site_bits = bits_required(FileHeader::count(fh.nbr_sites));
        log::info(format!(
            "{} player bits, {} event bits, {} site bits",
            player_bits, event_bits, site_bits
        ));
        collection.locked = fh.is_locked();
        if fh.hdr_len as usize != FILE_HEADER_LEN {
            self.reader
                .seek(SeekFrom::Start((self.preamble_size as i64 + i64::from(fh.hdr_len)) as u64))?;
        }

        let tables = StringTables {
            players: read_strings(&mut self.reader, FileHeader::count(fh.nbr_players))?,
            events: read_strings(&mut self.reader, FileHeader::count(fh.nbr_events))?,
            sites: read_strings(&mut self.reader, FileHeader::count(fh.nbr_sites))?,
        };

        let file_schema = header_schema(event_bits, site_bits, player_bits)?;
        let stored_schema = if for_append {
            header_schema(APPEND_INDEX_BITS, APPEND_INDEX_BITS, APPEND_INDEX_BITS)?
        } else {
            file_schema.clone()
        };
        let file_size = file_schema.byte_size();
        let stored_size = stored_schema.byte_size();
        let control = collection.catalog.add_block(stored_schema.clone(), tables);

        let count = FileHeader::count(fh.nbr_games);
        let base = collection.ids.allocate_top(count as u32);
        let first = collection.len();
        let mut outcome = LoadOutcome::default();
        let mut header = vec![0u8; file_size];
        let mut moves = Vec::new();
        for i in 0..count {
            if kill.load(Ordering::Relaxed) || progress.fraction(i as u64, count as u64).is_break() {
                outcome.killed = true;
                break;
            }
            if let Err(e) = self.reader.read_exact(&mut header) {
                if e.kind() == ErrorKind::UnexpectedEof {
                    log::warn(format!("{}: file ends after {} of {} games", self.name, i, count));
                    break;
                }
                return Err(e.into());
            }
            moves.clear();
            self.reader.read_until(0, &mut moves)?;
            if moves.last() == Some(&0) {
                moves.pop();
            } else {
                log::warn(format!("{}: unterminated move list in game {}", self.name, i));
            }

            let stored: Box<[u8]> = if for_append {
                let values = HeaderValues::read(&file_schema, &header)?;
                let mut widened = vec![0u8; stored_size];
                values.write(&stored_schema, &mut widened)?;
                widened.into_boxed_slice()
            } else {
                header.clone().into_boxed_slice()
            };
            let offset = if reverse { count - 1 - i } else { i };
            let record = GameRecord::Binary(BinaryRecord {
                game_id: base.wrapping_add(offset as u32),
                control,
                header: stored,
                moves: moves.clone().into_boxed_slice(),
            });
            if record.has_promotion() {
                outcome.promotion_games += 1;
            }
            collection.push(record);
            outcome.games += 1;
        }
        if reverse {
            collection.games_mut()[first..].reverse();
        }
        log::info(format!(
            "{} games loaded ({} may contain promotions){}",
            outcome.games,
            outcome.promotion_games,
            if outcome.killed { ", killed" } else { "" }
        ));
        Ok(outcome)
    }
}

// Reads up to `count` NUL terminated strings, fewer if the file ends.
fn read_strings<R: BufRead>(reader: &mut R, count: usize) -> io::Result<Vec<String>> {
    let mut strings = Vec::with_capacity(count);
    let mut raw = Vec::new();
    for _ in 0..count {
        raw.clear();
        if reader.read_until(0, &mut raw)? == 0 {
            break;
        }
        if raw.last() == Some(&0) {
            raw.pop();
        }
        strings.push(String::from_utf8_lossy(&raw).into_owned());
    }
    Ok(strings)
}

fn write_strings<W: Write + ?Sized>(
    out: &mut W,
    table: &[String],
    done: &mut u64,
    total: u64,
    progress: &mut (impl Progress + ?Sized),
) -> Result<(), DbError> {
    for s in table {
        out.write_all(s.as_bytes())?;
        out.write_all(&[0])?;
        *done += 1;
        if progress.fraction(*done, total).is_break() {
            return Err(DbError::Aborted);
        }
    }
    Ok(())
}

/// Serializes `collection`, leaving out its last `omit_from_end` games.
///
/// String tables are built from the games being written, so names only used
/// by omitted games are dropped.
pub fn write_collection<W: Write + ?Sized>(
    collection: &Collection,
    out: &mut W,
    omit_from_end: usize,
    locked: bool,
    progress: &mut (impl Progress + ?Sized),
) -> Result<(), DbError> {
    let n = collection.len().saturating_sub(omit_from_end);
    let games = &collection.games()[..n];
    let rosters = games
        .iter()
        .map(|g| g.roster(&collection.catalog))
        .collect::<Result<Vec<_>, _>>()?;
    let tables = StringTables::from_rosters(&rosters);
    let schema = tables.schema()?;

    let version = if locked {
        FormatVersion::Lockable
    } else {
        FormatVersion::BinDb
    };
    out.write_all(&compatibility_header(version))?;
    let fh = FileHeader::new(
        tables.players.len(),
        tables.events.len(),
        tables.sites.len(),
        n,
        locked,
    );
    log::info(format!(
        "{} games, {} players, {} events, {} sites",
        fh.nbr_games, fh.nbr_players, fh.nbr_events, fh.nbr_sites
    ));
    fh.write_to(out)?;

    let total = (tables.players.len() + tables.events.len() + tables.sites.len() + n) as u64;
    let mut done = 0u64;
    write_strings(out, &tables.players, &mut done, total, progress)?;
    write_strings(out, &tables.events, &mut done, total, progress)?;
    write_strings(out, &tables.sites, &mut done, total, progress)?;

    let mut header = vec![0u8; schema.byte_size()];
    for (game, roster) in games.iter().zip(&rosters) {
        header.fill(0);
        tables.header_for(roster).write(&schema, &mut header)?;
        out.write_all(&header)?;
        out.write_all(game.compressed_moves())?;
        out.write_all(&[0])?;
        done += 1;
        if let ControlFlow::Break(()) = progress.fraction(done, total) {
            return Err(DbError::Aborted);
        }
    }
    out.flush()?;
    // Everything is written; a cancel request this late changes nothing
    let _ = progress.permill(fraction_to_permill(total, total), None);
    Ok(())
}

/// Writes `collection` to a new file at `path`.
pub fn write_file(
    collection: &Collection,
    path: impl AsRef<Path>,
    omit_from_end: usize,
    locked: bool,
    progress: &mut (impl Progress + ?Sized),
) -> Result<(), DbError> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| DbError::Io(format!("Cannot create '{}' ({e})", path.display())))?;
    let mut out = BufWriter::new(file);
    write_collection(collection, &mut out, omit_from_end, locked, progress)
}
