//! PGN export of expanded games.

use std::io::{self, Write};

use shakmaty::san::SanPlus;
use shakmaty::{Color, Position};

use super::record::GameDocument;

const LINE_WIDTH: usize = 79;

fn write_tag<W: Write + ?Sized>(out: &mut W, name: &str, value: &str) -> io::Result<()> {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    writeln!(out, "[{} \"{}\"]", name, escaped)
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() { default } else { value }
}

/// Writes one game: the seven-tag roster, any optional tags, then wrapped
/// SAN movetext ending in the result. A blank line follows the game.
pub fn write_pgn_game<W: Write + ?Sized>(out: &mut W, doc: &GameDocument) -> io::Result<()> {
    let r = &doc.roster;
    let result = or_default(&r.result, "*");
    write_tag(out, "Event", or_default(&r.event, "?"))?;
    write_tag(out, "Site", or_default(&r.site, "?"))?;
    write_tag(out, "Date", or_default(&r.date, "????.??.??"))?;
    write_tag(out, "Round", or_default(&r.round, "?"))?;
    write_tag(out, "White", or_default(&r.white, "?"))?;
    write_tag(out, "Black", or_default(&r.black, "?"))?;
    write_tag(out, "Result", result)?;
    for (name, value) in [("ECO", &r.eco), ("WhiteElo", &r.white_elo), ("BlackElo", &r.black_elo)] {
        if !value.is_empty() {
            write_tag(out, name, value)?;
        }
    }
    if r.has_fen() {
        write_tag(out, "SetUp", "1")?;
        write_tag(out, "FEN", &r.fen)?;
    }
    writeln!(out)?;

    let mut pos = doc.start.clone();
    let mut tokens = Vec::with_capacity(doc.moves.len() * 3 / 2 + 1);
    for (i, &m) in doc.moves.iter().enumerate() {
        let number = pos.fullmoves().get();
        match pos.turn() {
            Color::White => tokens.push(format!("{}.", number)),
            Color::Black if i == 0 => tokens.push(format!("{}...", number)),
            Color::Black => {}
        }
        tokens.push(SanPlus::from_move_and_play_unchecked(&mut pos, m).to_string());
    }
    tokens.push(result.to_string());

    let mut line = String::new();
    for token in tokens {
        if !line.is_empty() && line.len() + 1 + token.len() > LINE_WIDTH {
            writeln!(out, "{}", line)?;
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&token);
    }
    writeln!(out, "{}", line)?;
    writeln!(out)
}
