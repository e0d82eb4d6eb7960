//! Fixed-width bit-field records.
//!
//! A [`BitSchema`] is an ordered list of unsigned fields packed back to back,
//! least significant bit first, with no padding between fields. Game headers
//! in the database file are one frozen schema instance per file.

use std::error::Error;
use std::fmt;

/// Widest field a schema accepts.
pub const MAX_FIELD_BITS: u8 = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitPackError {
    Frozen,
    NotFrozen,
    InvalidWidth(u8),
    FieldOutOfRange { index: usize, count: usize },
    BufferTooShort { needed: usize, actual: usize },
    UnknownSchema(u32),
}

impl fmt::Display for BitPackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frozen => write!(f, "cannot add a field to a frozen schema"),
            Self::NotFrozen => write!(f, "schema must be frozen before use"),
            Self::InvalidWidth(w) => {
                write!(f, "field width {} outside 1..={}", w, MAX_FIELD_BITS)
            }
            Self::FieldOutOfRange { index, count } => {
                write!(f, "field index {} out of range ({} fields)", index, count)
            }
            Self::BufferTooShort { needed, actual } => {
                write!(f, "record buffer holds {} bytes, {} needed", actual, needed)
            }
            Self::UnknownSchema(h) => write!(f, "no schema registered under handle {}", h),
        }
    }
}

impl Error for BitPackError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    offset: u32,
    width: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSchema {
    fields: Vec<Field>,
    total_bits: u32,
    frozen: bool,
}

impl BitSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and freezes a schema in one step.
    pub fn with_widths(widths: &[u8]) -> Result<Self, BitPackError> {
        let mut schema = Self::new();
        for &w in widths {
            schema.add_field(w)?;
        }
        schema.freeze();
        Ok(schema)
    }

    pub fn add_field(&mut self, width: u8) -> Result<usize, BitPackError> {
        if self.frozen {
            return Err(BitPackError::Frozen);
        }
        if width == 0 || width > MAX_FIELD_BITS {
            return Err(BitPackError::InvalidWidth(width));
        }
        self.fields.push(Field {
            offset: self.total_bits,
            width,
        });
        self.total_bits += u32::from(width);
        Ok(self.fields.len() - 1)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn width(&self, index: usize) -> Option<u8> {
        self.fields.get(index).map(|f| f.width)
    }

    /// Whole bytes needed to hold every field, rounded up.
    pub fn byte_size(&self) -> usize {
        self.total_bits.div_ceil(8) as usize
    }

    fn locate(&self, index: usize, buf_len: usize) -> Result<Field, BitPackError> {
        if !self.frozen {
            return Err(BitPackError::NotFrozen);
        }
        let field = *self
            .fields
            .get(index)
            .ok_or(BitPackError::FieldOutOfRange {
                index,
                count: self.fields.len(),
            })?;
        let needed = self.byte_size();
        if buf_len < needed {
            return Err(BitPackError::BufferTooShort {
                needed,
                actual: buf_len,
            });
        }
        Ok(field)
    }

    // A field of up to 32 bits at any shift spans at most 5 bytes.
    fn span(field: Field) -> (usize, u32, usize) {
        let start = (field.offset / 8) as usize;
        let shift = field.offset % 8;
        let len = (shift + u32::from(field.width)).div_ceil(8) as usize;
        (start, shift, len)
    }

    fn mask(width: u8) -> u64 {
        (1u64 << width) - 1
    }

    pub fn read(&self, index: usize, buf: &[u8]) -> Result<u32, BitPackError> {
        let field = self.locate(index, buf.len())?;
        let (start, shift, len) = Self::span(field);
        let word = buf[start..start + len]
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, &b)| acc | (u64::from(b) << (8 * i)));
        Ok(((word >> shift) & Self::mask(field.width)) as u32)
    }

    /// Stores `value` truncated to the field width; neighbouring fields keep
    /// their bits.
    pub fn write(&self, index: usize, value: u32, buf: &mut [u8]) -> Result<(), BitPackError> {
        let field = self.locate(index, buf.len())?;
        let (start, shift, len) = Self::span(field);
        let bytes = &mut buf[start..start + len];
        let mut word = bytes
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, &b)| acc | (u64::from(b) << (8 * i)));
        let mask = Self::mask(field.width) << shift;
        word = (word & !mask) | ((u64::from(value) << shift) & mask);
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (word >> (8 * i)) as u8;
        }
        Ok(())
    }
}

/// Smallest width able to represent every index in `0..count`.
pub fn bits_required(count: usize) -> u8 {
    let mut bits = 1u8;
    while bits < 24 && count >= (1usize << bits) {
        bits += 1;
    }
    bits
}

/// Opaque reference to a schema owned by a [`SchemaRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaHandle(u32);

/// Owns every live schema; callers hold handles, never the schemas.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: Vec<BitSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema, freezing it if the caller has not.
    pub fn register(&mut self, mut schema: BitSchema) -> SchemaHandle {
        schema.freeze();
        if let Some(pos) = self.schemas.iter().position(|s| *s == schema) {
            return SchemaHandle(pos as u32);
        }
        self.schemas.push(schema);
        SchemaHandle((self.schemas.len() - 1) as u32)
    }

    pub fn get(&self, handle: SchemaHandle) -> Result<&BitSchema, BitPackError> {
        self.schemas
            .get(handle.0 as usize)
            .ok_or(BitPackError::UnknownSchema(handle.0))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_width_fields_read_back() {
        let mut schema = BitSchema::new();
        let mut sizes = Vec::new();
        for w in [3, 20, 2, 8, 7] {
            schema.add_field(w).unwrap();
            sizes.push(schema.byte_size());
        }
        schema.freeze();
        assert_eq!(sizes, vec![1, 3, 4, 5, 5]);

        let mut buf = vec![0u8; schema.byte_size()];
        schema.write(0, 6, &mut buf).unwrap();
        schema.write(1, 0xabcde, &mut buf).unwrap();
        schema.write(2, 3, &mut buf).unwrap();
        schema.write(3, 250, &mut buf).unwrap();
        schema.write(4, 0, &mut buf).unwrap();

        // Rewriting a middle field leaves the rest alone
        schema.write(3, 250, &mut buf).unwrap();

        let values: Vec<u32> = (0..5).map(|i| schema.read(i, &buf).unwrap()).collect();
        assert_eq!(values, vec![6, 0xabcde, 3, 250, 0]);
    }

    #[test]
    fn test_every_width_preserves_neighbours() {
        for w in 1..=24u8 {
            let schema = BitSchema::with_widths(&[5, w, 11]).unwrap();
            let mut buf = vec![0u8; schema.byte_size()];
            schema.write(0, 0b10101, &mut buf).unwrap();
            schema.write(2, 0x5a5, &mut buf).unwrap();

            let max = (1u32 << w) - 1;
            for v in [0, 1, max / 2, max] {
                schema.write(1, v, &mut buf).unwrap();
                assert_eq!(schema.read(1, &buf).unwrap(), v, "width {}", w);
                assert_eq!(schema.read(0, &buf).unwrap(), 0b10101);
                assert_eq!(schema.read(2, &buf).unwrap(), 0x5a5);
            }
        }
    }

    #[test]
    fn test_thirty_two_bit_field_at_odd_offset() {
        let schema = BitSchema::with_widths(&[3, 32, 1]).unwrap();
        assert_eq!(schema.byte_size(), 5);
        let mut buf = vec![0xffu8; schema.byte_size()];
        schema.write(1, 0xdead_beef, &mut buf).unwrap();
        assert_eq!(schema.read(1, &buf).unwrap(), 0xdead_beef);
        assert_eq!(schema.read(0, &buf).unwrap(), 0b111);
        assert_eq!(schema.read(2, &buf).unwrap(), 1);
    }

    #[test]
    fn test_oversized_value_is_truncated_to_width() {
        let schema = BitSchema::with_widths(&[4, 4]).unwrap();
        let mut buf = [0u8; 1];
        schema.write(0, 0x1f, &mut buf).unwrap();
        assert_eq!(schema.read(0, &buf).unwrap(), 0xf);
        assert_eq!(schema.read(1, &buf).unwrap(), 0);
    }

    #[test]
    fn test_rejects_bad_index_and_short_buffer() {
        let schema = BitSchema::with_widths(&[12, 12]).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(
            schema.read(2, &buf),
            Err(BitPackError::FieldOutOfRange { index: 2, count: 2 })
        );
        assert_eq!(
            schema.write(0, 1, &mut buf[..2]),
            Err(BitPackError::BufferTooShort {
                needed: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_frozen_schema_refuses_new_fields() {
        let mut schema = BitSchema::with_widths(&[8]).unwrap();
        assert_eq!(schema.add_field(8), Err(BitPackError::Frozen));
        assert_eq!(BitSchema::new().add_field(33), Err(BitPackError::InvalidWidth(33)));
    }

    #[test]
    fn test_unfrozen_schema_refuses_access() {
        let mut schema = BitSchema::new();
        schema.add_field(8).unwrap();
        assert_eq!(schema.read(0, &[0]), Err(BitPackError::NotFrozen));
    }

    #[test]
    fn test_bits_required_thresholds() {
        assert_eq!(bits_required(0), 1);
        assert_eq!(bits_required(1), 1);
        assert_eq!(bits_required(2), 2);
        assert_eq!(bits_required(3), 2);
        assert_eq!(bits_required(4), 3);
        assert_eq!(bits_required(255), 8);
        assert_eq!(bits_required(256), 9);
        assert_eq!(bits_required(0x7f_ffff), 23);
        assert_eq!(bits_required(0x80_0000), 24);
        assert_eq!(bits_required(usize::MAX), 24);
    }

    #[test]
    fn test_registry_shares_identical_schemas() {
        let mut registry = SchemaRegistry::new();
        let a = registry.register(BitSchema::with_widths(&[4, 4]).unwrap());
        let b = registry.register(BitSchema::with_widths(&[4, 4]).unwrap());
        let c = registry.register(BitSchema::with_widths(&[8]).unwrap());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(c).unwrap().field_count(), 1);
        assert_eq!(
            registry.get(SchemaHandle(9)),
            Err(BitPackError::UnknownSchema(9))
        );
    }
}
