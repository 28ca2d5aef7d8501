//! TMX25 scan-chain layout
//!
//! The concrete field map of the 25-pixel timing front-end: three words of
//! global settings, one word per pixel, one word per pixel group. Built once
//! per front-end variant; the two variants share the geometry but differ in
//! a few defaults and one TZ-only feedback trim.
//!
//! Offsets below are the 1-based scan-chain positions from the chip manual.
//! The DAC-style fields shift in MSB-first and are therefore `ScanReversed`;
//! single-bit switches and counters are `Natural`.

use crate::event::FrontEndVariant;
use crate::schema::{
    BitOrdering, ChannelFieldGroup, FieldSchema, FieldSpec, SchemaError, TemplateField,
};

/// Individually addressed pixels
pub const PIXEL_COUNT: usize = 25;
/// Pixel groups sharing per-group analog settings
pub const GROUP_COUNT: usize = 5;

/// First bit of the per-pixel region (0-based base, offsets inside are 1-based)
const PIXEL_BASE: u32 = 96;
/// One word per pixel
const PIXEL_STRIDE: u32 = 32;
/// First bit of the per-group region
const GROUP_BASE: u32 = PIXEL_BASE + PIXEL_COUNT as u32 * PIXEL_STRIDE;
/// One word per group
const GROUP_STRIDE: u32 = 32;

use BitOrdering::{Natural, ScanReversed};

/// Global fields shared by both variants: (name, offset, width, ordering, default)
const GLOBAL_FIELDS: &[(&str, u32, u32, BitOrdering, u32)] = &[
    // word 0 - analog bias block
    ("bias_preamp", 1, 8, ScanReversed, 0x80),
    ("bias_discri", 9, 8, ScanReversed, 0x60),
    ("bias_tdc", 17, 8, ScanReversed, 0x40),
    ("clk_div", 25, 2, Natural, 0),
    ("pll_enable", 27, 1, Natural, 1),
    ("ext_trigger", 28, 1, Natural, 0),
    // word 1 - threshold references and delay line
    ("vref_toa", 33, 10, ScanReversed, 512),
    ("vref_tot", 43, 10, ScanReversed, 512),
    ("dll_bias", 53, 6, ScanReversed, 32),
    ("dll_lock_ovr", 59, 1, Natural, 0),
    // word 2 - test pulse and readout control
    ("tp_period", 65, 12, Natural, 100),
    ("tp_width", 77, 8, Natural, 10),
    ("readout_mode", 85, 2, Natural, 0),
    ("seq_reset", 87, 1, Natural, 0),
];

/// TZ front-end adds a feedback resistor trim in the word-2 spare bits
const TZ_EXTRA_FIELDS: &[(&str, u32, u32, BitOrdering, u32)] = &[
    ("tz_feedback_trim", 88, 6, ScanReversed, 16),
];

fn pixel_template(variant: FrontEndVariant) -> Vec<TemplateField> {
    // The TZ preamp runs at a higher nominal gain setting.
    let gain_default = match variant {
        FrontEndVariant::Vpa => 1,
        FrontEndVariant::Tz => 2,
    };
    vec![
        TemplateField::new("trim_dac", 1, 7, ScanReversed, 64),
        TemplateField::new("mask", 8, 1, Natural, 0),
        TemplateField::new("test_pulse", 9, 1, Natural, 0),
        TemplateField::new("probe_toa", 10, 1, Natural, 0),
        TemplateField::new("probe_tot", 11, 1, Natural, 0),
        TemplateField::new("gain_sel", 12, 2, Natural, gain_default),
        TemplateField::new("hysteresis", 14, 3, Natural, 4),
    ]
}

fn group_template() -> Vec<TemplateField> {
    vec![
        TemplateField::new("cm_feedback", 1, 4, Natural, 8),
        TemplateField::new("delay_trim", 5, 6, ScanReversed, 32),
        TemplateField::new("comp_bias", 11, 8, ScanReversed, 128),
        TemplateField::new("calib_enable", 19, 1, Natural, 0),
    ]
}

/// Validated TMX25 schema plus the handle tables for its two channel groups
#[derive(Debug)]
pub struct Tmx25Layout {
    pub variant: FrontEndVariant,
    pub schema: FieldSchema,
    pub pixels: ChannelFieldGroup,
    pub groups: ChannelFieldGroup,
}

impl Tmx25Layout {
    /// Build the layout for one front-end variant
    ///
    /// An error here means the field tables themselves are inconsistent, so
    /// it is surfaced rather than unwrapped even though the tables are
    /// compile-time constants.
    pub fn new(variant: FrontEndVariant) -> Result<Self, SchemaError> {
        let mut builder = FieldSchema::builder();
        for &(name, offset, width, ordering, default) in GLOBAL_FIELDS {
            builder.scalar(FieldSpec::new(name, offset, width, ordering, default));
        }
        if variant == FrontEndVariant::Tz {
            for &(name, offset, width, ordering, default) in TZ_EXTRA_FIELDS {
                builder.scalar(FieldSpec::new(name, offset, width, ordering, default));
            }
        }
        let pixels = ChannelFieldGroup::expand(
            &mut builder,
            "pix",
            &pixel_template(variant),
            PIXEL_COUNT,
            PIXEL_STRIDE,
            PIXEL_BASE,
        );
        let groups = ChannelFieldGroup::expand(
            &mut builder,
            "grp",
            &group_template(),
            GROUP_COUNT,
            GROUP_STRIDE,
            GROUP_BASE,
        );
        Ok(Self {
            variant,
            schema: builder.build()?,
            pixels,
            groups,
        })
    }

    /// Pixel group a pixel belongs to (5 pixels per group, row order)
    pub fn group_of_pixel(pixel: usize) -> usize {
        pixel / (PIXEL_COUNT / GROUP_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_build_for_both_variants() {
        for variant in [FrontEndVariant::Vpa, FrontEndVariant::Tz] {
            let layout = Tmx25Layout::new(variant).unwrap();
            assert_eq!(layout.pixels.channel_count(), PIXEL_COUNT);
            assert_eq!(layout.groups.channel_count(), GROUP_COUNT);
            assert_eq!(layout.schema.word_count(), 33);
        }
    }

    #[test]
    fn test_field_counts() {
        let vpa = Tmx25Layout::new(FrontEndVariant::Vpa).unwrap();
        let tz = Tmx25Layout::new(FrontEndVariant::Tz).unwrap();
        // 14 global + 25*7 pixel + 5*4 group
        assert_eq!(vpa.schema.len(), 14 + 175 + 20);
        assert_eq!(tz.schema.len(), vpa.schema.len() + 1);
        assert!(tz.schema.handle("tz_feedback_trim").is_some());
        assert!(vpa.schema.handle("tz_feedback_trim").is_none());
    }

    #[test]
    fn test_pixel_naming_and_position() {
        let layout = Tmx25Layout::new(FrontEndVariant::Vpa).unwrap();
        let entry = layout.pixels.entry("trim_dac").unwrap();
        let spec = layout.schema.field(layout.pixels.handle(entry, 24));
        assert_eq!(spec.name, "pix24_trim_dac");
        assert_eq!(spec.bit_offset, PIXEL_BASE + 1 + 24 * PIXEL_STRIDE);
    }

    #[test]
    fn test_group_of_pixel() {
        assert_eq!(Tmx25Layout::group_of_pixel(0), 0);
        assert_eq!(Tmx25Layout::group_of_pixel(4), 0);
        assert_eq!(Tmx25Layout::group_of_pixel(5), 1);
        assert_eq!(Tmx25Layout::group_of_pixel(24), 4);
    }

    #[test]
    fn test_variant_defaults_differ() {
        let vpa = Tmx25Layout::new(FrontEndVariant::Vpa).unwrap();
        let tz = Tmx25Layout::new(FrontEndVariant::Tz).unwrap();
        let e = vpa.pixels.entry("gain_sel").unwrap();
        assert_eq!(vpa.schema.field(vpa.pixels.handle(e, 0)).default, 1);
        assert_eq!(tz.schema.field(tz.pixels.handle(e, 0)).default, 2);
    }
}
