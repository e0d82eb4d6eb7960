//! Control blocks: a frozen header schema plus the string tables its
//! player/event/site indices refer to.

use super::bins::{DATE_BITS, ECO_BITS, ELO_BITS, RESULT_BITS, ROUND_BITS};
use super::bitpack::{BitPackError, BitSchema, SchemaHandle, SchemaRegistry, bits_required};
use super::roster::{Roster, RosterBins};

/// Index width used while a collection is open for appending, wide enough
/// for any string table a session can build.
pub const APPEND_INDEX_BITS: u8 = 24;

/// Packed header fields in on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    Event,
    Site,
    White,
    Black,
    Date,
    Round,
    Eco,
    Result,
    WhiteElo,
    BlackElo,
}

impl HeaderField {
    pub const ALL: [HeaderField; 10] = [
        HeaderField::Event,
        HeaderField::Site,
        HeaderField::White,
        HeaderField::Black,
        HeaderField::Date,
        HeaderField::Round,
        HeaderField::Eco,
        HeaderField::Result,
        HeaderField::WhiteElo,
        HeaderField::BlackElo,
    ];

    pub const fn index(self) -> usize {
        match self {
            HeaderField::Event => 0,
            HeaderField::Site => 1,
            HeaderField::White => 2,
            HeaderField::Black => 3,
            HeaderField::Date => 4,
            HeaderField::Round => 5,
            HeaderField::Eco => 6,
            HeaderField::Result => 7,
            HeaderField::WhiteElo => 8,
            HeaderField::BlackElo => 9,
        }
    }
}

pub fn header_schema(event_bits: u8, site_bits: u8, player_bits: u8) -> Result<BitSchema, BitPackError> {
    BitSchema::with_widths(&[
        event_bits,
        site_bits,
        player_bits,
        player_bits,
        DATE_BITS,
        ROUND_BITS,
        ECO_BITS,
        RESULT_BITS,
        ELO_BITS,
        ELO_BITS,
    ])
}

/// Schema sized for the given table cardinalities.
pub fn schema_for_counts(players: usize, events: usize, sites: usize) -> Result<BitSchema, BitPackError> {
    header_schema(bits_required(events), bits_required(sites), bits_required(players))
}

/// Unpacked header record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderValues([u32; 10]);

impl HeaderValues {
    pub fn get(&self, field: HeaderField) -> u32 {
        self.0[field.index()]
    }

    pub fn set(&mut self, field: HeaderField, value: u32) {
        self.0[field.index()] = value;
    }

    pub fn read(schema: &BitSchema, buf: &[u8]) -> Result<Self, BitPackError> {
        let mut values = Self::default();
        for field in HeaderField::ALL {
            values.set(field, schema.read(field.index(), buf)?);
        }
        Ok(values)
    }

    pub fn write(&self, schema: &BitSchema, buf: &mut [u8]) -> Result<(), BitPackError> {
        for field in HeaderField::ALL {
            schema.write(field.index(), self.get(field), buf)?;
        }
        Ok(())
    }

    pub fn bins(&self) -> RosterBins {
        RosterBins {
            date: self.get(HeaderField::Date),
            round: self.get(HeaderField::Round),
            eco: self.get(HeaderField::Eco),
            result: self.get(HeaderField::Result),
            white_elo: self.get(HeaderField::WhiteElo),
            black_elo: self.get(HeaderField::BlackElo),
        }
    }

    pub fn set_bins(&mut self, bins: &RosterBins) {
        self.set(HeaderField::Date, bins.date);
        self.set(HeaderField::Round, bins.round);
        self.set(HeaderField::Eco, bins.eco);
        self.set(HeaderField::Result, bins.result);
        self.set(HeaderField::WhiteElo, bins.white_elo);
        self.set(HeaderField::BlackElo, bins.black_elo);
    }
}

/// Ascending, deduplicated player/event/site tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTables {
    pub players: Vec<String>,
    pub events: Vec<String>,
    pub sites: Vec<String>,
}

impl StringTables {
    /// Interns every name mentioned by `rosters`.
    pub fn from_rosters<'a>(rosters: impl IntoIterator<Item = &'a Roster>) -> Self {
        let mut t = Self::default();
        for r in rosters {
            t.players.push(r.white.clone());
            t.players.push(r.black.clone());
            t.events.push(r.event.clone());
            t.sites.push(r.site.clone());
        }
        for table in [&mut t.players, &mut t.events, &mut t.sites] {
            table.sort_unstable();
            table.dedup();
        }
        t
    }

    fn lookup(table: &[String], s: &str) -> u32 {
        table
            .binary_search_by(|entry| entry.as_str().cmp(s))
            .map(|i| i as u32)
            .unwrap_or(0)
    }

    /// Header for `r` against these tables. Names missing from a table map
    /// to index 0.
    pub fn header_for(&self, r: &Roster) -> HeaderValues {
        let mut h = HeaderValues::default();
        h.set(HeaderField::Event, Self::lookup(&self.events, &r.event));
        h.set(HeaderField::Site, Self::lookup(&self.sites, &r.site));
        h.set(HeaderField::White, Self::lookup(&self.players, &r.white));
        h.set(HeaderField::Black, Self::lookup(&self.players, &r.black));
        h.set_bins(&RosterBins::from_roster(r));
        h
    }

    pub fn schema(&self) -> Result<BitSchema, BitPackError> {
        schema_for_counts(self.players.len(), self.events.len(), self.sites.len())
    }
}

/// One header schema plus its string tables.
#[derive(Debug, Clone)]
pub struct ControlBlock {
    pub schema: SchemaHandle,
    pub tables: StringTables,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlHandle(u32);

/// Every schema and control block referenced by a collection's records.
#[derive(Debug, Default)]
pub struct Catalog {
    schemas: SchemaRegistry,
    blocks: Vec<ControlBlock>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, schema: BitSchema, tables: StringTables) -> ControlHandle {
        let schema = self.schemas.register(schema);
        self.blocks.push(ControlBlock { schema, tables });
        ControlHandle((self.blocks.len() - 1) as u32)
    }

    pub fn block(&self, handle: ControlHandle) -> Result<&ControlBlock, BitPackError> {
        self.blocks
            .get(handle.0 as usize)
            .ok_or(BitPackError::UnknownSchema(handle.0))
    }

    pub fn schema(&self, handle: ControlHandle) -> Result<&BitSchema, BitPackError> {
        self.schemas.get(self.block(handle)?.schema)
    }

    pub fn header(&self, handle: ControlHandle, buf: &[u8]) -> Result<HeaderValues, BitPackError> {
        HeaderValues::read(self.schema(handle)?, buf)
    }

    /// Expands a packed header into a roster. Out of range string indexes
    /// yield empty names.
    pub fn roster(&self, handle: ControlHandle, buf: &[u8]) -> Result<Roster, BitPackError> {
        let block = self.block(handle)?;
        let h = HeaderValues::read(self.schemas.get(block.schema)?, buf)?;
        let name = |table: &[String], field| {
            table
                .get(h.get(field) as usize)
                .cloned()
                .unwrap_or_default()
        };
        let mut r = Roster {
            white: name(&block.tables.players, HeaderField::White),
            black: name(&block.tables.players, HeaderField::Black),
            event: name(&block.tables.events, HeaderField::Event),
            site: name(&block.tables.sites, HeaderField::Site),
            ..Roster::default()
        };
        h.bins().apply(&mut r);
        Ok(r)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(white: &str, black: &str, event: &str) -> Roster {
        Roster {
            white: white.into(),
            black: black.into(),
            event: event.into(),
            site: "Wijk aan Zee".into(),
            date: "2013.01.19".into(),
            round: "7".into(),
            result: "1/2-1/2".into(),
            eco: "C67".into(),
            white_elo: "2861".into(),
            black_elo: "2810".into(),
            fen: String::new(),
        }
    }

    #[test]
    fn test_tables_are_sorted_and_deduplicated() {
        let a = roster("Carlsen, Magnus", "Aronian, Levon", "Tata Steel");
        let b = roster("Aronian, Levon", "Anand, Viswanathan", "Tata Steel");
        let t = StringTables::from_rosters([&a, &b]);
        assert_eq!(
            t.players,
            vec!["Anand, Viswanathan", "Aronian, Levon", "Carlsen, Magnus"]
        );
        assert_eq!(t.events, vec!["Tata Steel"]);
        let h = t.header_for(&a);
        assert_eq!(h.get(HeaderField::White), 2);
        assert_eq!(h.get(HeaderField::Black), 1);
    }

    #[test]
    fn test_catalog_rebuilds_roster_from_header() {
        let a = roster("Carlsen, Magnus", "Aronian, Levon", "Tata Steel");
        let tables = StringTables::from_rosters([&a]);
        let schema = tables.schema().unwrap();
        let mut buf = vec![0u8; schema.byte_size()];
        tables.header_for(&a).write(&schema, &mut buf).unwrap();

        let mut catalog = Catalog::new();
        let handle = catalog.add_block(schema, tables);
        assert_eq!(catalog.roster(handle, &buf).unwrap(), a.normalized());
    }

    #[test]
    fn test_schema_widths_follow_counts() {
        let schema = schema_for_counts(300, 2, 1).unwrap();
        assert_eq!(schema.width(HeaderField::Event.index()), Some(2));
        assert_eq!(schema.width(HeaderField::Site.index()), Some(1));
        assert_eq!(schema.width(HeaderField::White.index()), Some(9));
        assert_eq!(schema.width(HeaderField::BlackElo.index()), Some(ELO_BITS));
    }
}
