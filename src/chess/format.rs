//! On-disk layout: the compatibility preamble and the file header.
//!
//! A database file starts with a preamble that looks like a one-table SQLite
//! file, so readers that only know the legacy SQL format can find a version
//! byte and refuse the file politely. The version byte is the last byte of
//! the preamble; the preamble length is stored little-endian at 0xF0 and
//! defaults to 1200 when absent or implausible.

use std::io::{self, Read, Write};

pub const COMPATIBILITY_HEADER_SIZE: usize = 1200;
const MIN_COMPATIBILITY_HEADER_SIZE: usize = 0x10b;
const HEADER_SIZE_OFFSET: usize = 0xf0;

const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";
const TDB_MAGIC: &[u8] = b"TDB format";
const TDB_MAGIC_OFFSET: usize = 0x100;

/// Version tiers found in the preamble's last byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FormatVersion {
    LegacySql = 1,
    Tiny = 2,
    BinDb = 3,
    Lockable = 4,
}

impl FormatVersion {
    pub const fn byte(self) -> u8 {
        self as u8
    }
}

// SQLite page-1 fields, then a schema row for
// CREATE TABLE description (description TEXT, version INTEGER)
// whose single data row is the notice below plus the version byte.
const SQLITE_HEADER_FIELDS: [u8; 0x70 - 0x10] = [
    0x04, 0x00, 0x01, 0x01, 0x00, 0x40, 0x20, 0x20, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x02,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x04,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02,
    0x00, 0x2d, 0xe6, 0x07, 0x0d, 0x00, 0x00, 0x00, 0x01, 0x03, 0x9f, 0x00, 0x03, 0x9f, 0x00, 0x00,
];
const SCHEMA_CELL_OFFSET: usize = 0x39f;
const SCHEMA_CELL_PREFIX: [u8; 9] = [0x5f, 0x01, 0x07, 0x17, 0x23, 0x23, 0x01, 0x81, 0x05];
const SCHEMA_NAMES: &[u8] = b"tabledescriptiondescription";
const SCHEMA_ROOT_PAGE: u8 = 0x02;
const SCHEMA_SQL: &[u8] = b"CREATE TABLE description (description TEXT, version INTEGER)";
const DATA_PAGE_OFFSET: usize = 0x400;
const DATA_PAGE_PREFIX: [u8; 27] = [
    0x0d, 0x00, 0x00, 0x00, 0x01, 0x00, 0x14, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x81, 0x19, 0x01, 0x04, 0x82, 0x35, 0x01,
];
const NOTICE: &[u8] = b"This header allows the alpha SQL based version of Tarrasch V3 to recognise \
(but gracefully reject) the newer custom in-memory binary database format";

/// The full preamble ending in `version`.
pub fn compatibility_header(version: FormatVersion) -> [u8; COMPATIBILITY_HEADER_SIZE] {
    let mut buf = [0u8; COMPATIBILITY_HEADER_SIZE];
    let mut put = |at: usize, bytes: &[u8]| {
        buf[at..at + bytes.len()].copy_from_slice(bytes);
        at + bytes.len()
    };
    let at = put(0, SQLITE_MAGIC);
    put(at, &SQLITE_HEADER_FIELDS);
    put(TDB_MAGIC_OFFSET, TDB_MAGIC);
    let at = put(SCHEMA_CELL_OFFSET, &SCHEMA_CELL_PREFIX);
    let at = put(at, SCHEMA_NAMES);
    let at = put(at, &[SCHEMA_ROOT_PAGE]);
    let at = put(at, SCHEMA_SQL);
    debug_assert_eq!(at, DATA_PAGE_OFFSET);
    let at = put(DATA_PAGE_OFFSET, &DATA_PAGE_PREFIX);
    let at = put(at, NOTICE);
    put(at, &[version.byte()]);
    buf
}

/// Result of inspecting the first bytes of a candidate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preamble {
    /// Binary format; `size` bytes of preamble precede the file header.
    Binary { version: u8, size: usize },
    /// The legacy SQL format, no TDB marker.
    LegacySql,
    Unknown,
}

pub fn inspect_preamble(buf: &[u8; COMPATIBILITY_HEADER_SIZE]) -> Preamble {
    if &buf[TDB_MAGIC_OFFSET..TDB_MAGIC_OFFSET + TDB_MAGIC.len()] == TDB_MAGIC {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&buf[HEADER_SIZE_OFFSET..HEADER_SIZE_OFFSET + 4]);
        let size = u32::from_le_bytes(raw) as usize;
        let size = if (MIN_COMPATIBILITY_HEADER_SIZE..=COMPATIBILITY_HEADER_SIZE).contains(&size) {
            size
        } else {
            COMPATIBILITY_HEADER_SIZE
        };
        Preamble::Binary {
            version: buf[size - 1],
            size,
        }
    } else if buf.starts_with(&SQLITE_MAGIC[..15]) {
        Preamble::LegacySql
    } else {
        Preamble::Unknown
    }
}

/// Size of [`FileHeader`] as written by this crate.
pub const FILE_HEADER_LEN: usize = 24;

/// Counts that follow the preamble. `hdr_len` lets readers skip fields added
/// after them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileHeader {
    pub hdr_len: i32,
    pub nbr_players: i32,
    pub nbr_events: i32,
    pub nbr_sites: i32,
    pub nbr_games: i32,
    pub locked: i32,
}

impl FileHeader {
    pub fn new(players: usize, events: usize, sites: usize, games: usize, locked: bool) -> Self {
        Self {
            hdr_len: FILE_HEADER_LEN as i32,
            nbr_players: players as i32,
            nbr_events: events as i32,
            nbr_sites: sites as i32,
            nbr_games: games as i32,
            locked: i32::from(locked),
        }
    }

    /// Reads the six fields. Headers shorter than 24 bytes predate the
    /// locked flag, which then reads as false.
    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
        let mut raw = [0u8; FILE_HEADER_LEN];
        r.read_exact(&mut raw)?;
        let field = |i: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&raw[i * 4..i * 4 + 4]);
            i32::from_le_bytes(b)
        };
        let mut fh = Self {
            hdr_len: field(0),
            nbr_players: field(1),
            nbr_events: field(2),
            nbr_sites: field(3),
            nbr_games: field(4),
            locked: field(5),
        };
        if (fh.hdr_len as usize) < FILE_HEADER_LEN {
            fh.locked = 0;
        }
        Ok(fh)
    }

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        for v in [
            self.hdr_len,
            self.nbr_players,
            self.nbr_events,
            self.nbr_sites,
            self.nbr_games,
            self.locked,
        ] {
            w.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked != 0
    }

    pub fn count(v: i32) -> usize {
        v.max(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_preamble_layout() {
        let buf = compatibility_header(FormatVersion::Lockable);
        assert!(buf.starts_with(b"SQLite format 3\0"));
        assert_eq!(&buf[0x100..0x10a], b"TDB format");
        assert_eq!(&buf[0x3a8..0x3c3], b"tabledescriptiondescription");
        assert_eq!(&buf[0x41b..0x41b + 4], b"This");
        assert_eq!(buf[0x4ae], b't');
        assert_eq!(buf[COMPATIBILITY_HEADER_SIZE - 1], 4);
        assert_eq!(&buf[0x60..0x64], &[0x00, 0x2d, 0xe6, 0x07]);
    }

    #[test]
    fn test_inspect_reads_version_byte() {
        let buf = compatibility_header(FormatVersion::BinDb);
        assert_eq!(
            inspect_preamble(&buf),
            Preamble::Binary {
                version: 3,
                size: COMPATIBILITY_HEADER_SIZE
            }
        );
    }

    #[test]
    fn test_inspect_honours_smaller_declared_size() {
        let mut buf = compatibility_header(FormatVersion::BinDb);
        buf[0xf0..0xf4].copy_from_slice(&0x200u32.to_le_bytes());
        buf[0x1ff] = 9;
        assert_eq!(
            inspect_preamble(&buf),
            Preamble::Binary {
                version: 9,
                size: 0x200
            }
        );
        buf[0xf0..0xf4].copy_from_slice(&0x20u32.to_le_bytes());
        assert_eq!(
            inspect_preamble(&buf),
            Preamble::Binary {
                version: 3,
                size: COMPATIBILITY_HEADER_SIZE
            }
        );
    }

    #[test]
    fn test_inspect_legacy_and_unknown() {
        let mut buf = [0u8; COMPATIBILITY_HEADER_SIZE];
        buf[..16].copy_from_slice(b"SQLite format 3\0");
        assert_eq!(inspect_preamble(&buf), Preamble::LegacySql);
        assert_eq!(inspect_preamble(&[b'x'; COMPATIBILITY_HEADER_SIZE]), Preamble::Unknown);
    }

    #[test]
    fn test_file_header_round_trip_and_short_form() {
        let fh = FileHeader::new(10, 2, 3, 500, true);
        let mut out = Vec::new();
        fh.write_to(&mut out).unwrap();
        assert_eq!(out.len(), FILE_HEADER_LEN);
        assert_eq!(&out[..4], &[24, 0, 0, 0]);
        assert_eq!(FileHeader::read_from(&mut Cursor::new(&out)).unwrap(), fh);

        // A 20 byte header has no locked flag
        out[0] = 20;
        let short = FileHeader::read_from(&mut Cursor::new(&out)).unwrap();
        assert!(!short.is_locked());
        assert_eq!(short.nbr_games, 500);
    }
}
