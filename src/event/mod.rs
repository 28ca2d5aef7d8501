//! Hit-event word decoder
//!
//! Every hit the chip reads out is one 32-bit word, streamed LSB-word-first
//! by the serializer:
//!
//! ```text
//! [31:19] SeqCnt | [18] TotOverflow | [17:9] TotData | [8] ToaOverflow | [7:1] ToaData | [0] Hit
//! ```
//!
//! Decoding is pure and stateless; one word in, one [`HitRecord`] out. The
//! TOT field additionally splits into a coarse counter plus a fine
//! interpolation code, and that split differs between the two front-end
//! variants. Reserved raw values mean "no real measurement" and must be
//! tested before the split is used.

use serde::{Deserialize, Serialize};

/// Bit layout of one hit word
pub mod constants {
    /// Bytes per event word on the wire
    pub const WORD_SIZE: usize = 4;

    pub const HIT_MASK: u32 = 0x1;
    pub const TOA_SHIFT: u32 = 1;
    pub const TOA_MASK: u32 = 0x7F;
    pub const TOA_OVERFLOW_SHIFT: u32 = 8;
    pub const TOT_SHIFT: u32 = 9;
    pub const TOT_MASK: u32 = 0x1FF;
    pub const TOT_OVERFLOW_SHIFT: u32 = 18;
    pub const SEQ_SHIFT: u32 = 19;
    pub const SEQ_MASK: u32 = 0x1FFF;

    /// Sequence counter wraps at 2^13
    pub const SEQ_MODULO: u16 = 1 << 13;

    /// TOA code meaning "saturated / no valid time"
    pub const TOA_SATURATED: u8 = 0x7F;
    /// VPA raw TOT value meaning "no real hit"
    pub const VPA_TOT_NO_HIT: u16 = 0x1FC;
    /// TZ raw TOT value meaning "no real hit"
    pub const TZ_TOT_NO_HIT: u16 = 0x1F8;
}

/// Front-end flavour of the pixel matrix
///
/// Determines how the raw TOT code decomposes into (fine, coarse) and which
/// raw value is the "no real hit" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrontEndVariant {
    /// Voltage preamplifier front-end: 2-bit fine + overflow, 7-bit coarse
    Vpa,
    /// Transimpedance front-end: 3-bit fine + overflow, 6-bit coarse
    Tz,
}

impl FrontEndVariant {
    /// Number of effective fine codes (overflow bit included)
    pub fn fine_code_count(&self) -> usize {
        match self {
            FrontEndVariant::Vpa => 8,
            FrontEndVariant::Tz => 16,
        }
    }

    /// Raw TOT value reserved as the "no real hit" sentinel
    pub fn tot_sentinel(&self) -> u16 {
        match self {
            FrontEndVariant::Vpa => constants::VPA_TOT_NO_HIT,
            FrontEndVariant::Tz => constants::TZ_TOT_NO_HIT,
        }
    }
}

/// TOT code split into its interpolator and counter parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotCode {
    /// Fine interpolation code, overflow-extended (3 or 4 effective bits)
    pub fine: u8,
    /// Coarse counter (7 or 6 bits)
    pub coarse: u8,
}

impl TotCode {
    /// Half-LSB-resolution interpolated coarse value
    pub fn coarse_interp1(&self) -> u8 {
        (self.coarse + 1) >> 1
    }
}

/// One decoded hit word
///
/// Value object: immutable after decode, freely copied between consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRecord {
    /// 13-bit frame sequence counter, wraps modulo 2^13
    pub seq_cnt: u16,
    pub tot_overflow: bool,
    /// Raw 9-bit TOT code as on the wire
    pub tot_raw: u16,
    pub toa_overflow: bool,
    /// Raw 7-bit TOA code; 127 is the saturation sentinel
    pub toa_raw: u8,
    pub hit: bool,
}

impl HitRecord {
    /// Decode one wire word
    pub fn from_word(word: u32) -> Self {
        use constants::*;
        Self {
            seq_cnt: ((word >> SEQ_SHIFT) & SEQ_MASK) as u16,
            tot_overflow: (word >> TOT_OVERFLOW_SHIFT) & 1 != 0,
            tot_raw: ((word >> TOT_SHIFT) & TOT_MASK) as u16,
            toa_overflow: (word >> TOA_OVERFLOW_SHIFT) & 1 != 0,
            toa_raw: ((word >> TOA_SHIFT) & TOA_MASK) as u8,
            hit: word & HIT_MASK != 0,
        }
    }

    /// Pack back into a wire word; exact inverse of [`Self::from_word`]
    pub fn to_word(&self) -> u32 {
        use constants::*;
        ((self.seq_cnt as u32 & SEQ_MASK) << SEQ_SHIFT)
            | ((self.tot_overflow as u32) << TOT_OVERFLOW_SHIFT)
            | ((self.tot_raw as u32 & TOT_MASK) << TOT_SHIFT)
            | ((self.toa_overflow as u32) << TOA_OVERFLOW_SHIFT)
            | ((self.toa_raw as u32 & TOA_MASK) << TOA_SHIFT)
            | (self.hit as u32)
    }

    /// TOA saturation sentinel check
    ///
    /// Independent of `toa_overflow`; both must be consulted before the TOA
    /// code is used as a time.
    pub fn toa_saturated(&self) -> bool {
        self.toa_raw == constants::TOA_SATURATED
    }

    /// Split the TOT code for the given front-end variant
    ///
    /// Returns `None` for the variant's "no real hit" sentinel; the overflow
    /// flag extends the fine code by one bit.
    pub fn tot_code(&self, variant: FrontEndVariant) -> Option<TotCode> {
        if self.tot_raw == variant.tot_sentinel() {
            return None;
        }
        let code = match variant {
            FrontEndVariant::Vpa => TotCode {
                fine: (self.tot_raw & 0x3) as u8 + (self.tot_overflow as u8) * 4,
                coarse: (self.tot_raw >> 2) as u8,
            },
            FrontEndVariant::Tz => TotCode {
                fine: (self.tot_raw & 0x7) as u8 + (self.tot_overflow as u8) * 8,
                coarse: (self.tot_raw >> 3) as u8,
            },
        };
        Some(code)
    }
}
