//! Conversions between PGN tag text and the small integers stored in a
//! packed game header.

use chrono::{Datelike, NaiveDate};

pub const DATE_BITS: u8 = 19;
pub const ROUND_BITS: u8 = 16;
pub const ECO_BITS: u8 = 9;
pub const RESULT_BITS: u8 = 2;
pub const ELO_BITS: u8 = 12;

const YEAR_BASE: u32 = 1500;
const MAX_ELO: u32 = 4095;

// Splits "a.b.c" style text into up to three numbers. '?' reads as '0' and
// any non-digit ends a component.
fn numeric_parts(text: &str, max_parts: usize) -> [u32; 3] {
    let mut parts = [0u32; 3];
    let mut state = 0;
    let mut acc = 0u32;
    for c in text.bytes() {
        if state >= max_parts {
            break;
        }
        let c = if c == b'?' { b'0' } else { c };
        if c.is_ascii_digit() {
            acc = acc.saturating_mul(10).saturating_add(u32::from(c - b'0'));
        } else {
            parts[state] = acc;
            acc = 0;
            state += 1;
        }
    }
    if state < max_parts {
        parts[state] = acc;
    }
    parts
}

/// `yyyy.mm.dd` to `(year - 1500) << 9 | month << 5 | day`. Unknown or out of
/// range parts are stored as zero.
pub fn date_to_bin(date: &str) -> u32 {
    let [yyyy, mm, dd] = numeric_parts(date, 3);
    let yyyy = if (1501..=2500).contains(&yyyy) {
        yyyy
    } else {
        YEAR_BASE
    };
    let mm = if (1..=12).contains(&mm) { mm } else { 0 };
    let dd = if (1..=31).contains(&dd) { dd } else { 0 };
    ((yyyy - YEAR_BASE) << 9) | (mm << 5) | dd
}

pub fn bin_to_date(bin: u32) -> String {
    let yyyy = (bin >> 9) & 0x3ff;
    let mm = (bin >> 5) & 0x0f;
    let dd = bin & 0x1f;
    let year = if yyyy == 0 {
        "????".to_string()
    } else {
        format!("{:04}", yyyy + YEAR_BASE)
    };
    let two = |v: u32| {
        if v == 0 {
            "??".to_string()
        } else {
            format!("{:02}", v)
        }
    };
    format!("{}.{}.{}", year, two(mm), two(dd))
}

/// Year of a date bin, `None` when unknown.
pub fn bin_year(bin: u32) -> Option<u32> {
    let yyyy = (bin >> 9) & 0x3ff;
    (yyyy != 0).then_some(yyyy + YEAR_BASE)
}

pub fn naive_date_to_bin(date: NaiveDate) -> u32 {
    let text = format!("{:04}.{:02}.{:02}", date.year(), date.month(), date.day());
    date_to_bin(&text)
}

/// Calendar date of a bin, only when year, month and day are all known and
/// form a real date.
pub fn bin_to_naive_date(bin: u32) -> Option<NaiveDate> {
    let year = bin_year(bin)?;
    let mm = (bin >> 5) & 0x0f;
    let dd = bin & 0x1f;
    NaiveDate::from_ymd_opt(year as i32, mm, dd)
}

/// `round[.board]` to `round << 10 | board`, round capped at 63 and board at
/// 1023.
pub fn round_to_bin(round: &str) -> u32 {
    let [rnd, brd, _] = numeric_parts(round, 2);
    (rnd.min(63) << 10) | brd.min(1023)
}

pub fn bin_to_round(bin: u32) -> String {
    let r = (bin >> 10) & 0x3f;
    let b = bin & 0x3ff;
    let mut text = if b == 0 {
        r.to_string()
    } else {
        format!("{}.{}", r, b)
    };
    if r == 0 {
        text.replace_range(0..1, "?");
    }
    text
}

/// `A00`..`E99` to 0..=499; anything else is 0.
pub fn eco_to_bin(eco: &str) -> u32 {
    match eco.as_bytes() {
        [letter @ b'A'..=b'E', tens @ b'0'..=b'9', ones @ b'0'..=b'9', ..] => {
            u32::from(letter - b'A') * 100 + u32::from(tens - b'0') * 10 + u32::from(ones - b'0')
        }
        _ => 0,
    }
}

pub fn bin_to_eco(bin: u32) -> String {
    if bin >= 500 {
        return String::new();
    }
    let letter = (b'A' + (bin / 100) as u8) as char;
    format!("{}{:02}", letter, bin % 100)
}

pub fn result_to_bin(result: &str) -> u32 {
    match result {
        "1-0" => 1,
        "0-1" => 2,
        "1/2-1/2" => 3,
        _ => 0,
    }
}

pub fn bin_to_result(bin: u32) -> &'static str {
    match bin {
        1 => "1-0",
        2 => "0-1",
        3 => "1/2-1/2",
        _ => "*",
    }
}

/// Leading decimal digits of the tag, capped at 4095; 0 means unrated.
pub fn elo_to_bin(elo: &str) -> u32 {
    let digits: &str = {
        let t = elo.trim_start();
        let end = t.find(|c: char| !c.is_ascii_digit()).unwrap_or(t.len());
        &t[..end]
    };
    digits
        .parse::<u64>()
        .map(|v| v.min(u64::from(MAX_ELO)) as u32)
        .unwrap_or(if digits.is_empty() { 0 } else { MAX_ELO })
}

pub fn bin_to_elo(bin: u32) -> String {
    match bin.min(MAX_ELO) {
        0 => String::new(),
        v => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_bins() {
        assert_eq!(date_to_bin("2016.03.05"), (516 << 9) | (3 << 5) | 5);
        assert_eq!(bin_to_date(date_to_bin("2016.03.05")), "2016.03.05");
        assert_eq!(bin_to_date(date_to_bin("1999.??.??")), "1999.??.??");
        assert_eq!(bin_to_date(date_to_bin("????.??.??")), "????.??.??");
        assert_eq!(date_to_bin("1400.01.01"), (1 << 5) | 1);
        assert_eq!(date_to_bin("2000.13.32"), 500 << 9);
        assert_eq!(date_to_bin(""), 0);
        assert_eq!(bin_to_date(date_to_bin("2001")), "2001.??.??");
    }

    #[test]
    fn test_calendar_dates() {
        let d = NaiveDate::from_ymd_opt(1972, 7, 11).unwrap();
        let bin = naive_date_to_bin(d);
        assert_eq!(bin_to_naive_date(bin), Some(d));
        assert_eq!(bin_year(bin), Some(1972));
        assert_eq!(bin_to_naive_date(date_to_bin("1972.??.??")), None);
        assert_eq!(bin_to_naive_date(date_to_bin("1972.02.31")), None);
        assert_eq!(bin_year(0), None);
    }

    #[test]
    fn test_round_bins() {
        assert_eq!(round_to_bin("5"), 5 << 10);
        assert_eq!(bin_to_round(round_to_bin("5")), "5");
        assert_eq!(bin_to_round(round_to_bin("12.3")), "12.3");
        assert_eq!(bin_to_round(round_to_bin("?")), "?");
        assert_eq!(bin_to_round(round_to_bin("-")), "?");
        assert_eq!(round_to_bin("99.2000"), (63 << 10) | 1023);
        assert_eq!(bin_to_round(round_to_bin("0.4")), "?.4");
    }

    #[test]
    fn test_eco_bins() {
        assert_eq!(eco_to_bin("A00"), 0);
        assert_eq!(eco_to_bin("C42"), 242);
        assert_eq!(eco_to_bin("E99"), 499);
        assert_eq!(eco_to_bin("F00"), 0);
        assert_eq!(eco_to_bin("B1"), 0);
        assert_eq!(bin_to_eco(242), "C42");
        assert_eq!(bin_to_eco(7), "A07");
        assert_eq!(bin_to_eco(500), "");
    }

    #[test]
    fn test_result_bins() {
        for r in ["*", "1-0", "0-1", "1/2-1/2"] {
            assert_eq!(bin_to_result(result_to_bin(r)), r);
        }
        assert_eq!(result_to_bin("draw"), 0);
    }

    #[test]
    fn test_elo_bins() {
        assert_eq!(elo_to_bin("2750"), 2750);
        assert_eq!(elo_to_bin(""), 0);
        assert_eq!(elo_to_bin("?"), 0);
        assert_eq!(elo_to_bin("9999"), 4095);
        assert_eq!(elo_to_bin("2100 (est)"), 2100);
        assert_eq!(bin_to_elo(0), "");
        assert_eq!(bin_to_elo(2100), "2100");
    }
}
