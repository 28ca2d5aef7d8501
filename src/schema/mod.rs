//! Scan-chain field schema for TMX25 configuration
//!
//! The ASIC's configuration is one long serial shift register. Software sees
//! it as a flat array of 32-bit words; every named setting is a bit range
//! inside that array. This module describes those ranges as data: a
//! [`FieldSchema`] is built once per device type and is immutable afterwards,
//! so there are no bit-offset literals scattered through the codebase.
//!
//! # Design Principles (KISS)
//! - One `FieldSpec` record per named setting; no per-field types
//! - Overlap and naming invariants checked once, at schema build time
//! - Fields are addressed through copyable `FieldHandle` indices, never by
//!   string lookup on the hot path

pub mod channels;
pub mod tmx25;

pub use channels::{ChannelFieldGroup, TemplateField};

use std::collections::HashMap;

use thiserror::Error;

/// Width of one register-image word in bits
pub const WORD_BITS: u32 = 32;

/// Bit-significance convention of a field inside the scan chain
///
/// Most fields shift in LSB-first (`Natural`). Some field groups are wired so
/// that the serial shift order is opposite to the word's internal
/// significance; those are `ScanReversed` and their bit pattern is mirrored
/// on encode and decode alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrdering {
    /// Bit `i` of the value maps to bit `bit_in_word + i`
    Natural,
    /// Bit `i` of the value maps to bit `bit_in_word + (width - 1 - i)`
    ScanReversed,
}

/// One named bit range in the scan chain
///
/// `bit_offset` is the 1-based absolute position of the field's first bit in
/// the logical chain; `bit_width` is the number of bits. Immutable once the
/// owning schema is built.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub bit_offset: u32,
    pub bit_width: u32,
    pub ordering: BitOrdering,
    pub default: u32,
}

impl FieldSpec {
    pub fn new(
        name: impl Into<String>,
        bit_offset: u32,
        bit_width: u32,
        ordering: BitOrdering,
        default: u32,
    ) -> Self {
        Self {
            name: name.into(),
            bit_offset,
            bit_width,
            ordering,
            default,
        }
    }

    /// First occupied bit, 0-based
    pub(crate) fn first_bit(&self) -> u64 {
        (self.bit_offset - 1) as u64
    }

    /// One past the last occupied bit, 0-based
    pub(crate) fn end_bit(&self) -> u64 {
        self.first_bit() + self.bit_width as u64
    }
}

/// Index of a field inside its schema
///
/// Handles are only meaningful together with the schema that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldHandle(pub(crate) usize);

/// Schema construction errors
///
/// All of these are fatal at build time, before any device use.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("field '{name}' has zero bit width")]
    ZeroWidth { name: String },

    #[error("field '{name}' is wider than one 32-bit word")]
    TooWide { name: String },

    #[error("field '{name}' has bit offset 0 (offsets are 1-based)")]
    ZeroOffset { name: String },

    #[error("duplicate field name '{name}'")]
    DuplicateName { name: String },

    #[error("fields '{first}' and '{second}' overlap in the scan chain")]
    Overlap { first: String, second: String },
}

/// Incrementally collects fields, then validates the whole set at once
///
/// Scalar fields and channel groups may be freely interleaved; overlap is
/// checked jointly across everything that was added, so two independently
/// strided groups over one image are validated against each other too.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldSpec>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single scalar field
    pub fn scalar(&mut self, spec: FieldSpec) -> FieldHandle {
        let handle = FieldHandle(self.fields.len());
        self.fields.push(spec);
        handle
    }

    /// Validate everything and produce the immutable schema
    pub fn build(self) -> Result<FieldSchema, SchemaError> {
        let mut by_name = HashMap::with_capacity(self.fields.len());
        for (idx, f) in self.fields.iter().enumerate() {
            if f.bit_width == 0 {
                return Err(SchemaError::ZeroWidth {
                    name: f.name.clone(),
                });
            }
            if f.bit_width > WORD_BITS {
                return Err(SchemaError::TooWide {
                    name: f.name.clone(),
                });
            }
            if f.bit_offset == 0 {
                return Err(SchemaError::ZeroOffset {
                    name: f.name.clone(),
                });
            }
            if by_name.insert(f.name.clone(), FieldHandle(idx)).is_some() {
                return Err(SchemaError::DuplicateName {
                    name: f.name.clone(),
                });
            }
        }

        // Sort ranges by start bit; any overlap then shows up between
        // neighbours.
        let mut order: Vec<usize> = (0..self.fields.len()).collect();
        order.sort_by_key(|&i| self.fields[i].first_bit());
        for pair in order.windows(2) {
            let a = &self.fields[pair[0]];
            let b = &self.fields[pair[1]];
            if b.first_bit() < a.end_bit() {
                return Err(SchemaError::Overlap {
                    first: a.name.clone(),
                    second: b.name.clone(),
                });
            }
        }

        let max_end = self
            .fields
            .iter()
            .map(|f| f.end_bit())
            .max()
            .unwrap_or(0);
        let word_count = (max_end as usize).div_ceil(WORD_BITS as usize);

        Ok(FieldSchema {
            fields: self.fields,
            by_name,
            word_count,
        })
    }
}

/// Immutable, validated set of scan-chain fields for one device type
#[derive(Debug)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
    by_name: HashMap<String, FieldHandle>,
    word_count: usize,
}

impl FieldSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Spec record for a handle issued by this schema's builder
    pub fn field(&self, handle: FieldHandle) -> &FieldSpec {
        &self.fields[handle.0]
    }

    /// Look up a field by its full display name
    pub fn handle(&self, name: &str) -> Option<FieldHandle> {
        self.by_name.get(name).copied()
    }

    /// All fields, in insertion order, with their handles
    pub fn iter(&self) -> impl Iterator<Item = (FieldHandle, &FieldSpec)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, f)| (FieldHandle(i), f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of 32-bit words a register image for this schema occupies
    pub fn word_count(&self) -> usize {
        self.word_count
    }
}
