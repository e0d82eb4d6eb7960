use super::error::ErrorAccumulator;
use super::roster::Roster;

use chrono::NaiveDate;
use pgn_reader::{Nag, Outcome, RawComment, RawTag, SanPlus, Skip, Visitor};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Move, Position};
use std::mem;
use std::ops::ControlFlow;

#[macro_export]
macro_rules! pgn_visitor_skip_variations {
    () => {
        fn nag(&mut self, _: &mut Self::Movetext, _: Nag) -> ControlFlow<Self::Output> {
            ControlFlow::Continue(())
        }

        fn comment(
            &mut self,
            _: &mut Self::Movetext,
            _: RawComment<'_>,
        ) -> ControlFlow<Self::Output> {
            ControlFlow::Continue(())
        }

        fn partial_comment(
            &mut self,
            _: &mut Self::Movetext,
            _: RawComment<'_>,
        ) -> ControlFlow<Self::Output> {
            ControlFlow::Continue(())
        }

        fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
            ControlFlow::Continue(Skip(true))
        }
    };
}

/// One game read from PGN: roster text plus the mainline as legal moves.
#[derive(Debug, Clone)]
pub struct ImportedGame {
    pub roster: Roster,
    pub moves: Vec<Move>,
    /// Set when a tag failed to convert or the mainline hit an illegal
    /// move. `moves` then holds the legal prefix.
    pub parse_error: Option<String>,
}

/// Streaming PGN visitor (pgn-reader) replaying the mainline so every SAN
/// token is resolved against the position it was played in.
pub struct GameVisitor {
    headers: HeaderFields,
    result_marker: Option<String>,
    parse_error: ErrorAccumulator,
    pub current_game: Option<ImportedGame>,
}

pub struct Mainline {
    pos: Chess,
    moves: Vec<Move>,
    stopped: bool,
}

#[derive(Default)]
struct HeaderFields {
    event: String,
    site: String,
    white: String,
    black: String,
    result: String,
    white_elo: String,
    black_elo: String,
    date: String,
    utc_date: String,
    event_date: String,
    round: String,
    eco: String,
    fen: String,
}

impl HeaderFields {
    fn clear(&mut self) {
        *self = Self::default();
    }

    fn set_known_tag(&mut self, key: &[u8], value: RawTag<'_>) {
        let slot: &mut String = match key {
            b"Event" => &mut self.event,
            b"Site" => &mut self.site,
            b"White" => &mut self.white,
            b"Black" => &mut self.black,
            b"Result" => &mut self.result,
            b"WhiteElo" => &mut self.white_elo,
            b"BlackElo" => &mut self.black_elo,
            b"Date" => &mut self.date,
            b"UTCDate" => &mut self.utc_date,
            b"EventDate" => &mut self.event_date,
            b"Round" => &mut self.round,
            b"ECO" => &mut self.eco,
            b"FEN" => &mut self.fen,
            _ => return,
        };

        if !slot.is_empty() {
            return;
        }

        let bytes = value.as_bytes();
        if bytes.is_empty() {
            return;
        }

        *slot = String::from_utf8_lossy(bytes).trim().to_string();
    }
}

impl Default for GameVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl GameVisitor {
    pub fn new() -> Self {
        Self {
            headers: HeaderFields::default(),
            result_marker: None,
            parse_error: ErrorAccumulator::default(),
            current_game: None,
        }
    }

    fn date_parts(raw: &str) -> Option<[&str; 3]> {
        let mut parts = raw.trim().split(['.', '-', '/']);
        let out = [parts.next()?, parts.next()?, parts.next()?];
        parts.next().is_none().then_some(out)
    }

    fn date_completeness_score(raw: &str) -> u8 {
        let Some([year, month, day]) = Self::date_parts(raw) else {
            return 0;
        };
        let known = |s: &str| !s.contains('?') && s.parse::<u32>().is_ok();
        if !known(year) {
            return 0;
        }
        1 + u8::from(known(month)) + u8::from(known(day))
    }

    /// Picks the most complete of Date, UTCDate and EventDate (ties keep that
    /// precedence) and normalises it to `yyyy.mm.dd` with `??` for unknown
    /// parts. A calendar-impossible day or month is reported and dropped.
    fn best_date(headers: &HeaderFields, parse_error: &mut ErrorAccumulator) -> String {
        let mut ranked: Vec<(u8, u8, &str, &str)> = [
            (0u8, headers.date.as_str(), "Date"),
            (1u8, headers.utc_date.as_str(), "Date (from UTCDate)"),
            (2u8, headers.event_date.as_str(), "Date (from EventDate)"),
        ]
        .into_iter()
        .filter(|(_, raw, _)| !raw.is_empty())
        .map(|(precedence, raw, label)| (Self::date_completeness_score(raw), precedence, raw, label))
        .collect();
        ranked.sort_by(|left, right| right.0.cmp(&left.0).then_with(|| left.1.cmp(&right.1)));

        let Some(&(score, _, raw, label)) = ranked.first() else {
            return String::new();
        };
        let Some([year, month, day]) = Self::date_parts(raw) else {
            parse_error.push(&format!("Conversion error: {label}='{raw}'"));
            return String::new();
        };
        if score == 0 {
            return "????.??.??".to_string();
        }
        let field = |s: &str, width: usize| match s.parse::<u32>() {
            Ok(v) if !s.contains('?') => format!("{:0width$}", v, width = width),
            _ => "?".repeat(width),
        };
        let (year, month, day) = (field(year, 4), field(month, 2), field(day, 2));
        if score == 3 {
            let parsed = NaiveDate::parse_from_str(&format!("{year}.{month}.{day}"), "%Y.%m.%d");
            if let Err(e) = parsed {
                parse_error.push(&format!("Conversion error: {label}='{raw}' (chrono: {e})"));
                return format!("{year}.??.??");
            }
        } else if month.parse::<u32>().is_ok_and(|m| !(1..=12).contains(&m)) {
            parse_error.push(&format!("Conversion error: {label}='{raw}' (chrono: input is out of range)"));
            return format!("{year}.??.??");
        }
        format!("{year}.{month}.{day}")
    }

    fn checked_elo(raw: &str, label: &str, parse_error: &mut ErrorAccumulator) -> String {
        if raw.is_empty() || raw.parse::<u32>().is_ok() {
            raw.to_string()
        } else {
            parse_error.push(&format!("Conversion error: {label}='{raw}'"));
            String::new()
        }
    }

    fn start_position(&mut self) -> (Chess, bool) {
        if self.headers.fen.is_empty() {
            return (Chess::default(), false);
        }
        let parsed = self
            .headers
            .fen
            .parse::<Fen>()
            .map_err(|e| e.to_string())
            .and_then(|fen| fen.into_position(CastlingMode::Standard).map_err(|e| e.to_string()));
        match parsed {
            Ok(pos) => (pos, false),
            Err(e) => {
                let msg = format!("Conversion error: FEN='{}' ({e})", self.headers.fen);
                self.parse_error.push(&msg);
                (Chess::default(), true)
            }
        }
    }

    fn build_game(&mut self, moves: Vec<Move>) {
        let date = Self::best_date(&self.headers, &mut self.parse_error);
        let white_elo = Self::checked_elo(&self.headers.white_elo, "WhiteElo", &mut self.parse_error);
        let black_elo = Self::checked_elo(&self.headers.black_elo, "BlackElo", &mut self.parse_error);
        let result = match self.result_marker.take() {
            Some(marker) if marker != "*" || self.headers.result.is_empty() => marker,
            _ => mem::take(&mut self.headers.result),
        };

        let h = &mut self.headers;
        self.current_game = Some(ImportedGame {
            roster: Roster {
                white: mem::take(&mut h.white),
                black: mem::take(&mut h.black),
                event: mem::take(&mut h.event),
                site: mem::take(&mut h.site),
                date,
                round: mem::take(&mut h.round),
                result,
                eco: mem::take(&mut h.eco),
                white_elo,
                black_elo,
                fen: mem::take(&mut h.fen),
            },
            moves,
            parse_error: self.parse_error.take(),
        });
    }

    pub fn finalize_game_with_error(&mut self, error_msg: String) {
        self.parse_error.push(&error_msg);
        self.build_game(Vec::new());
    }
}

impl Visitor for GameVisitor {
    type Tags = ();
    type Movetext = Mainline;
    type Output = ();

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        self.headers.clear();
        self.result_marker = None;
        self.parse_error = ErrorAccumulator::default();
        self.current_game = None;
        ControlFlow::Continue(())
    }

    fn tag(
        &mut self,
        _: &mut Self::Tags,
        key: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        self.headers.set_known_tag(key, value);
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, _: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        let (pos, stopped) = self.start_position();
        ControlFlow::Continue(Mainline {
            pos,
            moves: Vec::with_capacity(128),
            stopped,
        })
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        if movetext.stopped {
            return ControlFlow::Continue(());
        }
        match san.san.to_move(&movetext.pos) {
            Ok(m) => {
                movetext.pos.play_unchecked(m);
                movetext.moves.push(m);
            }
            Err(e) => {
                let ply = movetext.moves.len() + 1;
                self.parse_error
                    .push(&format!("Illegal move '{}' at ply {} ({})", san, ply, e));
                movetext.stopped = true;
            }
        }
        ControlFlow::Continue(())
    }

    fn outcome(
        &mut self,
        _movetext: &mut Self::Movetext,
        outcome: Outcome,
    ) -> ControlFlow<Self::Output> {
        self.result_marker = Some(outcome.to_string());
        ControlFlow::Continue(())
    }

    pgn_visitor_skip_variations!();

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        self.build_game(movetext.moves);
    }
}
