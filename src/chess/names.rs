//! Fuzzy player-name matching used by duplicate detection.

use regex::Regex;
use std::sync::LazyLock;

static NAME_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\x00-\x20,.:;]+").expect("valid name token regex"));

/// Uppercased tokens of at least two bytes, split on whitespace, control
/// characters and `,.:;`.
pub fn name_tokens(name: &str) -> Vec<String> {
    NAME_TOKEN_RE
        .find_iter(name)
        .map(|m| m.as_str())
        .filter(|t| t.len() > 1)
        .map(|t| t.to_ascii_uppercase())
        .collect()
}

/// Edit distance with adjacent transposition counted as one step once both
/// strings are past their second character.
pub fn levenshtein(source: &str, target: &str) -> usize {
    let s = source.as_bytes();
    let t = target.as_bytes();
    let (n, m) = (s.len(), t.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }
    let mut matrix = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=m {
        matrix[0][j] = j;
    }
    for i in 1..=n {
        for j in 1..=m {
            let cost = usize::from(s[i - 1] != t[j - 1]);
            let mut cell = (matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost)
                .min(matrix[i - 1][j] + 1);
            if i > 2 && j > 2 {
                let mut trans = matrix[i - 2][j - 2] + 1;
                if s[i - 2] != t[j - 1] {
                    trans += 1;
                }
                if s[i - 1] != t[j - 2] {
                    trans += 1;
                }
                cell = cell.min(trans);
            }
            matrix[i][j] = cell;
        }
    }
    matrix[n][m]
}

/// True if any token of `player` equals, or nearly equals, any of `tokens`.
/// Long tokens (over 8 bytes) tolerate two edits, medium ones (over 4) one.
pub fn is_player_match(player: &str, tokens: &[String]) -> bool {
    let other = name_tokens(player);
    tokens.iter().any(|a| {
        other.iter().any(|b| {
            if a == b {
                return true;
            }
            let dist = levenshtein(a, b);
            (a.len() > 8 && b.len() > 8 && dist <= 2) || (a.len() > 4 && b.len() > 4 && dist <= 1)
        })
    })
}

/// The first four characters (the year) of both dates are present and equal.
pub fn is_year_match(date1: &str, date2: &str) -> bool {
    match (date1.as_bytes().get(..4), date2.as_bytes().get(..4)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
