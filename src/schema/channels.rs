//! Per-channel field expansion
//!
//! The pixel matrix repeats the same handful of settings once per pixel at a
//! fixed stride in the scan chain, and again once per pixel *group* at a
//! different stride. Instead of hundreds of hand-written offset constants,
//! a short template is expanded into real schema fields, and the resulting
//! group keeps an indexed table of handles (entry x channel).

use super::{BitOrdering, FieldHandle, FieldSpec, SchemaBuilder};

/// One template entry, positioned relative to a channel's base
///
/// `sub_offset` is 1-based within the channel slot, so the absolute scan
/// chain offset of channel `ch` becomes
/// `base_offset + sub_offset + ch * stride_bits`.
#[derive(Debug, Clone)]
pub struct TemplateField {
    pub name: String,
    pub sub_offset: u32,
    pub bit_width: u32,
    pub ordering: BitOrdering,
    pub default: u32,
}

impl TemplateField {
    pub fn new(
        name: impl Into<String>,
        sub_offset: u32,
        bit_width: u32,
        ordering: BitOrdering,
        default: u32,
    ) -> Self {
        Self {
            name: name.into(),
            sub_offset,
            bit_width,
            ordering,
            default,
        }
    }
}

/// Handles for one expanded channel group
///
/// Access is by entry index (or name, resolved once) and channel number;
/// the display names (`pix07_trim_dac` style) exist for humans and config
/// files, not for lookup on the data path.
#[derive(Debug)]
pub struct ChannelFieldGroup {
    entry_names: Vec<String>,
    /// `handles[entry][channel]`
    handles: Vec<Vec<FieldHandle>>,
    channel_count: usize,
}

impl ChannelFieldGroup {
    /// Expand `template` across `channel_count` channels into `builder`
    ///
    /// Every emitted field is named `<prefix><ch>_<entry>` with a
    /// two-digit channel number. Overlap against everything else in the
    /// builder (including other groups over the same image) is checked when
    /// the schema is built, not here.
    pub fn expand(
        builder: &mut SchemaBuilder,
        prefix: &str,
        template: &[TemplateField],
        channel_count: usize,
        stride_bits: u32,
        base_offset: u32,
    ) -> Self {
        let mut handles = vec![Vec::with_capacity(channel_count); template.len()];
        for ch in 0..channel_count {
            for (entry, t) in template.iter().enumerate() {
                let spec = FieldSpec::new(
                    format!("{prefix}{ch:02}_{}", t.name),
                    base_offset + t.sub_offset + ch as u32 * stride_bits,
                    t.bit_width,
                    t.ordering,
                    t.default,
                );
                handles[entry].push(builder.scalar(spec));
            }
        }
        Self {
            entry_names: template.iter().map(|t| t.name.clone()).collect(),
            handles,
            channel_count,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Template entry names, in template order
    pub fn entry_names(&self) -> &[String] {
        &self.entry_names
    }

    /// Handle for template entry `entry` on channel `ch`
    pub fn handle(&self, entry: usize, ch: usize) -> FieldHandle {
        self.handles[entry][ch]
    }

    /// Resolve a template entry by name, for config-file driven access
    pub fn entry(&self, name: &str) -> Option<usize> {
        self.entry_names.iter().position(|n| n == name)
    }

    /// All handles of one channel, in template order
    pub fn channel(&self, ch: usize) -> impl Iterator<Item = FieldHandle> + '_ {
        self.handles.iter().map(move |per_entry| per_entry[ch])
    }
}
