//! Import filtering policy.
//!
//! The policy can be written as text, `<mode>[:<cutoff>][,missing=<rule>]`:
//! `ignore`, `one:2000`, `both:2200,missing=pass`,
//! `both:2200,missing=before:1970`. `BINDB_ELO_CUTOFF` supplies a default.

use std::env;
use std::error::Error;

use super::bins::bin_year;

const SUPPORTED_MODES: &str = "'ignore', 'one:<elo>' or 'both:<elo>'";
const SUPPORTED_MISSING: &str = "'fail', 'pass' or 'before:<year>'";

/// Which players must reach the cutoff.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CutoffMode {
    #[default]
    Ignore,
    One,
    Both,
}

/// How an unrated player (Elo 0) is judged.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MissingRating {
    #[default]
    Fail,
    Pass,
    /// Passes only when the game is dated before this year. Games with an
    /// unknown year count as old.
    PassBefore(u32),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EloCutoffPolicy {
    pub mode: CutoffMode,
    pub cutoff: u32,
    pub missing: MissingRating,
}

impl EloCutoffPolicy {
    pub fn new(mode: CutoffMode, cutoff: u32, missing: MissingRating) -> Self {
        Self {
            mode,
            cutoff,
            missing,
        }
    }

    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        match env::var("BINDB_ELO_CUTOFF") {
            Ok(raw) => Self::parse(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, Box<dyn Error>> {
        let normalized = raw.trim();
        let (mode_part, missing_part) = match normalized.split_once(',') {
            Some((m, rest)) => (m.trim(), Some(rest.trim())),
            None => (normalized, None),
        };

        let (mode, cutoff) = match mode_part.split_once(':') {
            None if mode_part.eq_ignore_ascii_case("ignore") => (CutoffMode::Ignore, 0),
            Some((m, elo)) => {
                let mode = if m.trim().eq_ignore_ascii_case("one") {
                    CutoffMode::One
                } else if m.trim().eq_ignore_ascii_case("both") {
                    CutoffMode::Both
                } else {
                    return Err(format!(
                        "Invalid Elo cutoff mode '{}'. Supported values: {}.",
                        m.trim(),
                        SUPPORTED_MODES
                    )
                    .into());
                };
                let cutoff = elo.trim().parse::<u32>().map_err(|e| {
                    format!("Invalid Elo cutoff '{}' ({e})", elo.trim())
                })?;
                (mode, cutoff)
            }
            None => {
                return Err(format!(
                    "Invalid Elo cutoff mode '{}'. Supported values: {}.",
                    mode_part, SUPPORTED_MODES
                )
                .into());
            }
        };

        let missing = match missing_part {
            None => MissingRating::default(),
            Some(part) => {
                let rule = part
                    .strip_prefix("missing=")
                    .ok_or_else(|| format!("Invalid Elo cutoff option '{}'", part))?
                    .trim();
                Self::parse_missing(rule)?
            }
        };

        Ok(Self::new(mode, cutoff, missing))
    }

    fn parse_missing(rule: &str) -> Result<MissingRating, Box<dyn Error>> {
        if rule.eq_ignore_ascii_case("fail") {
            return Ok(MissingRating::Fail);
        }
        if rule.eq_ignore_ascii_case("pass") {
            return Ok(MissingRating::Pass);
        }
        if let Some((word, year)) = rule.split_once(':')
            && word.trim().eq_ignore_ascii_case("before")
        {
            let year = year
                .trim()
                .parse::<u32>()
                .map_err(|e| format!("Invalid year '{}' ({e})", year.trim()))?;
            return Ok(MissingRating::PassBefore(year));
        }
        Err(format!(
            "Invalid missing rating rule '{}'. Supported values: {}.",
            rule, SUPPORTED_MISSING
        )
        .into())
    }

    /// Whether a game with these ratings (0 = unrated) and date bin passes.
    pub fn admits(&self, white_elo: u32, black_elo: u32, date_bin: u32) -> bool {
        if self.mode == CutoffMode::Ignore {
            return true;
        }
        let mut white_pass = white_elo >= self.cutoff;
        let mut black_pass = black_elo >= self.cutoff;
        if white_elo == 0 || black_elo == 0 {
            let missing_pass = match self.missing {
                MissingRating::Fail => false,
                MissingRating::Pass => true,
                MissingRating::PassBefore(year) => bin_year(date_bin).unwrap_or(1500) < year,
            };
            if white_elo == 0 {
                white_pass = missing_pass;
            }
            if black_elo == 0 {
                black_pass = missing_pass;
            }
        }
        match self.mode {
            CutoffMode::One => white_pass || black_pass,
            CutoffMode::Both => white_pass && black_pass,
            CutoffMode::Ignore => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::bins::date_to_bin;

    #[test]
    fn test_parse_accepts_each_form() {
        assert_eq!(EloCutoffPolicy::parse("ignore").unwrap(), EloCutoffPolicy::default());
        assert_eq!(
            EloCutoffPolicy::parse(" Both:2000 ").unwrap(),
            EloCutoffPolicy::new(CutoffMode::Both, 2000, MissingRating::Fail)
        );
        assert_eq!(
            EloCutoffPolicy::parse("one:2200,missing=pass").unwrap(),
            EloCutoffPolicy::new(CutoffMode::One, 2200, MissingRating::Pass)
        );
        assert_eq!(
            EloCutoffPolicy::parse("both:2000,missing=before:1970").unwrap(),
            EloCutoffPolicy::new(CutoffMode::Both, 2000, MissingRating::PassBefore(1970))
        );
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        let err = EloCutoffPolicy::parse("all:2000").unwrap_err().to_string();
        assert!(err.contains("Supported values"));
        assert!(EloCutoffPolicy::parse("both:abc").is_err());
        assert!(EloCutoffPolicy::parse("both:2000,missing=maybe").is_err());
        assert!(EloCutoffPolicy::parse("both:2000,unrated").is_err());
        assert!(EloCutoffPolicy::parse("").is_err());
    }

    #[test]
    fn test_both_players_with_missing_failing() {
        let policy = EloCutoffPolicy::new(CutoffMode::Both, 2000, MissingRating::Fail);
        assert!(!policy.admits(1900, 2100, 0));
        assert!(!policy.admits(2100, 0, 0));
        assert!(policy.admits(2100, 2050, 0));
    }

    #[test]
    fn test_one_player_is_enough() {
        let policy = EloCutoffPolicy::new(CutoffMode::One, 2000, MissingRating::Fail);
        assert!(policy.admits(1900, 2100, 0));
        assert!(!policy.admits(1900, 1950, 0));
        assert!(!policy.admits(0, 0, 0));
    }

    #[test]
    fn test_missing_ratings_pass_before_year() {
        let policy = EloCutoffPolicy::new(CutoffMode::Both, 2000, MissingRating::PassBefore(1970));
        assert!(policy.admits(0, 0, date_to_bin("1927.09.16")));
        assert!(!policy.admits(0, 2500, date_to_bin("1985.01.01")));
        // Unknown year counts as old
        assert!(policy.admits(0, 2500, date_to_bin("????.??.??")));
        // A rated player below the cutoff still fails
        assert!(!policy.admits(0, 1800, date_to_bin("1927.09.16")));
    }

    #[test]
    fn test_ignore_admits_everything() {
        assert!(EloCutoffPolicy::default().admits(0, 0, 0));
    }
}
