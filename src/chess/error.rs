use std::error::Error;
use std::fmt;
use std::io;

use super::bitpack::BitPackError;
use super::format::FormatVersion;

/// Last release able to read the legacy SQL based format.
pub const LEGACY_RELEASE_URL: &str = "https://triplehappy.com/downloads/portable-tarrasch-v3.03a-g.zip";

/// Failures surfaced by the database layer. Every variant renders as a
/// sentence suitable for showing to a user as-is.
#[derive(Debug)]
pub enum DbError {
    FileNotFound(String),
    NotATarraschFile(String),
    UnsupportedLegacyVersion { path: String, version: u8 },
    /// The short-lived intermediate "tiny" format.
    UnsupportedTinyVersion { path: String },
    UnsupportedFutureVersion { path: String, version: u8 },
    /// Cooperative cancellation via the kill flag (load, search, write).
    Killed,
    /// Cancellation requested through a progress callback during dedup or write.
    Aborted,
    Io(String),
    Corrupt(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound(path) => write!(f, "Cannot open '{}'", path),
            Self::NotATarraschFile(reason) => write!(f, "{}", reason),
            Self::UnsupportedLegacyVersion { path, version } => write!(
                f,
                "Tarrasch database file '{}' uses an old Tarrasch format (DB format = {}) and is \
                 incompatible with this version. Try Tarrasch V3.03, it might be able to read it. \
                 If that works, append a small (even empty) pgn to rewrite to a newer format. \
                 Tarrasch V3.03 can be downloaded from {}.",
                path, version, LEGACY_RELEASE_URL
            ),
            Self::UnsupportedTinyVersion { path } => write!(
                f,
                "Tarrasch database file '{}' uses the intermediate tiny Tarrasch format (DB format = {}), \
                 which is not supported",
                path,
                FormatVersion::Tiny.byte()
            ),
            Self::UnsupportedFutureVersion { path, version } => write!(
                f,
                "Tarrasch database file '{}' expects a more recent version (DB format = {}), it is \
                 incompatible with this older version",
                path, version
            ),
            Self::Killed => write!(f, "Operation killed before completion"),
            Self::Aborted => write!(f, "Operation aborted by user"),
            Self::Io(msg) => write!(f, "{}", msg),
            Self::Corrupt(msg) => write!(f, "Corrupt database: {}", msg),
        }
    }
}

impl Error for DbError {}

impl From<io::Error> for DbError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<BitPackError> for DbError {
    fn from(e: BitPackError) -> Self {
        Self::Corrupt(e.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator(Option<String>);

impl ErrorAccumulator {
    pub fn push(&mut self, msg: &str) {
        match &mut self.0 {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(msg);
            }
            None => {
                self.0 = Some(msg.to_string());
            }
        }
    }

    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_multiple_messages_uses_separator() {
        let mut accumulator = ErrorAccumulator::default();
        accumulator.push("first");
        accumulator.push("second");

        assert_eq!(accumulator.take().as_deref(), Some("first; second"));
        assert!(accumulator.is_empty());
    }

    #[test]
    fn test_legacy_version_message_names_minimum_release() {
        let err = DbError::UnsupportedLegacyVersion {
            path: "old.tdb".to_string(),
            version: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("old.tdb"));
        assert!(msg.contains("V3.03"));
        assert!(msg.contains("DB format = 1"));
        assert!(msg.contains(LEGACY_RELEASE_URL));
    }

    #[test]
    fn test_tiny_version_message_does_not_suggest_legacy_release() {
        let msg = DbError::UnsupportedTinyVersion {
            path: "tiny.tdb".to_string(),
        }
        .to_string();
        assert!(msg.contains("tiny.tdb"));
        assert!(msg.contains("DB format = 2"));
        assert!(!msg.contains(LEGACY_RELEASE_URL));
    }

    #[test]
    fn test_killed_and_aborted_render_differently() {
        assert_ne!(DbError::Killed.to_string(), DbError::Aborted.to_string());
    }

    #[test]
    fn test_io_error_converts_with_message() {
        let err: DbError = io::Error::new(io::ErrorKind::UnexpectedEof, "short read").into();
        assert_eq!(err.to_string(), "short read");
    }
}
