//! Bitfield codec and register image
//!
//! Translates named field values to and from the flat word array that gets
//! shifted into the ASIC. This is the one place in the system where bit
//! arithmetic happens; a mistake here silently miswrites a live chip, so the
//! encode and decode paths are exact inverses and every failure mode is a
//! typed error.
//!
//! Offsets are 1-based absolute scan-chain positions. A field must fit
//! inside a single 32-bit word; the hardware layouts never straddle a word
//! boundary and a field that would is rejected instead of guessing a
//! spanning semantics.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::schema::{BitOrdering, FieldHandle, FieldSchema, FieldSpec, WORD_BITS};

/// Per-field codec errors
///
/// Each failure concerns a single field write or read; the rest of the image
/// is untouched and remains valid.
#[derive(Error, Debug)]
pub enum FieldError {
    #[error("value {value:#x} does not fit in {width} bits of field '{name}'")]
    ValueTooWide { name: String, value: u32, width: u32 },

    #[error("field '{name}' at bit offset {offset} ({width} bits) straddles a word boundary")]
    CrossesWordBoundary { name: String, offset: u32, width: u32 },

    #[error("field '{name}' lies outside the {words}-word image")]
    OutOfImage { name: String, words: usize },

    #[error("image length mismatch: expected {expected} words, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("unknown field '{name}'")]
    UnknownField { name: String },
}

fn field_mask(width: u32) -> u32 {
    if width == WORD_BITS {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

/// Mirror the low `width` bits of `value`
fn mirror(value: u32, width: u32) -> u32 {
    value.reverse_bits() >> (WORD_BITS - width)
}

fn locate(field: &FieldSpec, words: usize) -> Result<(usize, u32), FieldError> {
    let word_index = ((field.bit_offset - 1) / WORD_BITS) as usize;
    let bit_in_word = (field.bit_offset - 1) % WORD_BITS;
    if bit_in_word + field.bit_width > WORD_BITS {
        return Err(FieldError::CrossesWordBoundary {
            name: field.name.clone(),
            offset: field.bit_offset,
            width: field.bit_width,
        });
    }
    if word_index >= words {
        return Err(FieldError::OutOfImage {
            name: field.name.clone(),
            words,
        });
    }
    Ok((word_index, bit_in_word))
}

/// Write `value` into `field`'s bit range of `words`
///
/// Clears the field's bits first, so repeated writes are idempotent. For
/// `ScanReversed` fields the value's bit significance is mirrored before
/// placement; decode mirrors it back.
pub fn encode_field(words: &mut [u32], field: &FieldSpec, value: u32) -> Result<(), FieldError> {
    let mask = field_mask(field.bit_width);
    if value & !mask != 0 {
        return Err(FieldError::ValueTooWide {
            name: field.name.clone(),
            value,
            width: field.bit_width,
        });
    }
    let (word_index, bit_in_word) = locate(field, words.len())?;
    let placed = match field.ordering {
        BitOrdering::Natural => value,
        BitOrdering::ScanReversed => mirror(value, field.bit_width),
    };
    words[word_index] =
        (words[word_index] & !(mask << bit_in_word)) | (placed << bit_in_word);
    Ok(())
}

/// Read `field`'s value back out of `words`; exact inverse of [`encode_field`]
pub fn decode_field(words: &[u32], field: &FieldSpec) -> Result<u32, FieldError> {
    let (word_index, bit_in_word) = locate(field, words.len())?;
    let mask = field_mask(field.bit_width);
    let raw = (words[word_index] >> bit_in_word) & mask;
    Ok(match field.ordering {
        BitOrdering::Natural => raw,
        BitOrdering::ScanReversed => mirror(raw, field.bit_width),
    })
}

/// Mutable word array for one device instance
///
/// Created once at device-initialization time, mutated on every field write,
/// and shifted out to the chip by the (external) transport layer. Owned by
/// exactly one logical device at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterImage {
    words: Vec<u32>,
}

impl RegisterImage {
    /// All-zero image sized for `schema`
    pub fn zeroed(schema: &FieldSchema) -> Self {
        Self {
            words: vec![0; schema.word_count()],
        }
    }

    /// Image with every field set to its schema default
    pub fn with_defaults(schema: &FieldSchema) -> Result<Self, FieldError> {
        let mut image = Self::zeroed(schema);
        for (_, field) in schema.iter() {
            encode_field(&mut image.words, field, field.default)?;
        }
        Ok(image)
    }

    /// Adopt words read back from hardware; length must match the schema
    pub fn from_words(schema: &FieldSchema, words: Vec<u32>) -> Result<Self, FieldError> {
        if words.len() != schema.word_count() {
            return Err(FieldError::LengthMismatch {
                expected: schema.word_count(),
                actual: words.len(),
            });
        }
        Ok(Self { words })
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Write one field
    pub fn write(
        &mut self,
        schema: &FieldSchema,
        handle: FieldHandle,
        value: u32,
    ) -> Result<(), FieldError> {
        let field = schema.field(handle);
        debug!(field = %field.name, value, "register write");
        encode_field(&mut self.words, field, value)
    }

    /// Read one field
    pub fn read(&self, schema: &FieldSchema, handle: FieldHandle) -> Result<u32, FieldError> {
        decode_field(&self.words, schema.field(handle))
    }

    /// Write a field addressed by display name (config-file path)
    pub fn write_named(
        &mut self,
        schema: &FieldSchema,
        name: &str,
        value: u32,
    ) -> Result<(), FieldError> {
        let handle = schema.handle(name).ok_or_else(|| FieldError::UnknownField {
            name: name.to_string(),
        })?;
        self.write(schema, handle, value)
    }

    /// Decode every field into a name -> value map
    ///
    /// Sorted by name so dumps are stable across runs.
    pub fn decode_all(&self, schema: &FieldSchema) -> Result<BTreeMap<String, u32>, FieldError> {
        let mut values = BTreeMap::new();
        for (_, field) in schema.iter() {
            values.insert(field.name.clone(), decode_field(&self.words, field)?);
        }
        Ok(values)
    }
}

/// Encode an image from schema defaults plus explicit overrides
pub fn encode_image(
    schema: &FieldSchema,
    overrides: &[(FieldHandle, u32)],
) -> Result<RegisterImage, FieldError> {
    let mut image = RegisterImage::with_defaults(schema)?;
    for &(handle, value) in overrides {
        image.write(schema, handle, value)?;
    }
    Ok(image)
}
