use super::bins::{
    bin_to_date, bin_to_eco, bin_to_elo, bin_to_result, bin_to_round, date_to_bin, eco_to_bin,
    elo_to_bin, result_to_bin, round_to_bin,
};

/// PGN tag metadata for one game. `fen` is empty unless the game starts from
/// a set-up position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    pub white: String,
    pub black: String,
    pub event: String,
    pub site: String,
    pub date: String,
    pub round: String,
    pub result: String,
    pub eco: String,
    pub white_elo: String,
    pub black_elo: String,
    pub fen: String,
}

/// The numeric header fields of a roster, as stored in a packed header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterBins {
    pub date: u32,
    pub round: u32,
    pub eco: u32,
    pub result: u32,
    pub white_elo: u32,
    pub black_elo: u32,
}

impl RosterBins {
    pub fn from_roster(r: &Roster) -> Self {
        Self {
            date: date_to_bin(&r.date),
            round: round_to_bin(&r.round),
            eco: eco_to_bin(&r.eco),
            result: result_to_bin(&r.result),
            white_elo: elo_to_bin(&r.white_elo),
            black_elo: elo_to_bin(&r.black_elo),
        }
    }

    /// Fills the numeric fields of `r` with their canonical text.
    pub fn apply(&self, r: &mut Roster) {
        r.date = bin_to_date(self.date);
        r.round = bin_to_round(self.round);
        r.eco = bin_to_eco(self.eco);
        r.result = bin_to_result(self.result).to_string();
        r.white_elo = bin_to_elo(self.white_elo);
        r.black_elo = bin_to_elo(self.black_elo);
    }
}

impl Roster {
    pub fn has_fen(&self) -> bool {
        !self.fen.is_empty()
    }

    /// Same roster with the numeric tags rewritten in the form a packed header
    /// reproduces them.
    pub fn normalized(&self) -> Self {
        let mut r = self.clone();
        RosterBins::from_roster(self).apply(&mut r);
        r
    }
}
