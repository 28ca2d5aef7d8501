//! Configuration for the TMX25 readout stack
//!
//! Loading:
//! - TOML for the run configuration (device settings, readout order,
//!   calibration parameters)
//! - JSON for stand-alone device value sets, so a control API can store and
//!   replay them
//!
//! Device settings follow the "defaults + overrides" pattern: one
//! [`PixelConfig`] applied to all pixels, plus a sparse map for the pixels
//! that differ. Pixel keys are strings in the file (TOML and JSON both key
//! maps by string) and are validated against the pixel count when applied.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use thiserror::Error;
use tracing::debug;

use crate::common::ReadoutResult;
use crate::event::FrontEndVariant;
use crate::register::RegisterImage;
use crate::schema::tmx25::{Tmx25Layout, GROUP_COUNT, PIXEL_COUNT};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("pixel override key '{key}' is not an index below {count}")]
    BadPixelIndex { key: String, count: usize },

    #[error("group override key '{key}' is not an index below {count}")]
    BadGroupIndex { key: String, count: usize },

    #[error("config is for the {config:?} front-end but the layout is {layout:?}")]
    VariantMismatch {
        config: FrontEndVariant,
        layout: FrontEndVariant,
    },
}

/// Top-level run configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    #[serde(default)]
    pub readout: ReadoutConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml(&content)?)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Device settings: front-end variant plus field values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Front-end variant this value set targets
    pub variant: FrontEndVariant,

    /// Global field overrides by schema name (e.g. `vref_toa = 480`)
    #[serde(default)]
    pub fields: BTreeMap<String, u32>,

    /// Settings applied to every pixel
    #[serde(default)]
    pub pixel_defaults: PixelConfig,

    /// Per-pixel overrides, sparse; keys are pixel indices as strings
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub pixel_overrides: HashMap<String, PixelConfig>,

    /// Per-group overrides, sparse; keys are group indices as strings
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub group_overrides: HashMap<String, GroupConfig>,
}

impl DeviceConfig {
    /// Bare configuration with no overrides
    pub fn new(variant: FrontEndVariant) -> Self {
        Self {
            variant,
            fields: BTreeMap::new(),
            pixel_defaults: PixelConfig::default(),
            pixel_overrides: HashMap::new(),
            group_overrides: HashMap::new(),
        }
    }

    /// Load a device value set from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Serialize for storage or a control API
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write this value set onto a defaults-initialized register image
    ///
    /// Field order: schema defaults are assumed present, then global
    /// overrides, then pixel defaults, then sparse pixel and group
    /// overrides, so later layers win.
    pub fn apply(&self, layout: &Tmx25Layout, image: &mut RegisterImage) -> ReadoutResult<()> {
        if self.variant != layout.variant {
            return Err(ConfigError::VariantMismatch {
                config: self.variant,
                layout: layout.variant,
            }
            .into());
        }

        for (name, &value) in &self.fields {
            image.write_named(&layout.schema, name, value)?;
        }

        for key in self.pixel_overrides.keys() {
            if key.parse::<usize>().map_or(true, |p| p >= PIXEL_COUNT) {
                return Err(ConfigError::BadPixelIndex {
                    key: key.clone(),
                    count: PIXEL_COUNT,
                }
                .into());
            }
        }
        for pixel in 0..layout.pixels.channel_count() {
            let merged = match self.pixel_overrides.get(&pixel.to_string()) {
                Some(over) => self.pixel_defaults.merged(over),
                None => self.pixel_defaults.clone(),
            };
            for (entry_name, value) in merged.values() {
                if let Some(entry) = layout.pixels.entry(entry_name) {
                    image.write(&layout.schema, layout.pixels.handle(entry, pixel), value)?;
                }
            }
        }

        for (key, over) in &self.group_overrides {
            let group: usize = key
                .parse()
                .ok()
                .filter(|&g| g < GROUP_COUNT)
                .ok_or_else(|| ConfigError::BadGroupIndex {
                    key: key.clone(),
                    count: GROUP_COUNT,
                })?;
            for (entry_name, value) in over.values() {
                if let Some(entry) = layout.groups.entry(entry_name) {
                    image.write(&layout.schema, layout.groups.handle(entry, group), value)?;
                }
            }
        }

        debug!(variant = ?self.variant, "applied device config to register image");
        Ok(())
    }
}

/// Per-pixel settings; `None` keeps the lower layer's value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PixelConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_dac: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_pulse: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_toa: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_tot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_sel: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hysteresis: Option<u32>,
}

impl PixelConfig {
    /// Overlay `over` on top of `self`
    pub fn merged(&self, over: &PixelConfig) -> PixelConfig {
        PixelConfig {
            trim_dac: over.trim_dac.or(self.trim_dac),
            mask: over.mask.or(self.mask),
            test_pulse: over.test_pulse.or(self.test_pulse),
            probe_toa: over.probe_toa.or(self.probe_toa),
            probe_tot: over.probe_tot.or(self.probe_tot),
            gain_sel: over.gain_sel.or(self.gain_sel),
            hysteresis: over.hysteresis.or(self.hysteresis),
        }
    }

    /// Set values as (template entry, register value) pairs
    fn values(&self) -> Vec<(&'static str, u32)> {
        let mut out = Vec::new();
        if let Some(v) = self.trim_dac {
            out.push(("trim_dac", v));
        }
        if let Some(v) = self.mask {
            out.push(("mask", v as u32));
        }
        if let Some(v) = self.test_pulse {
            out.push(("test_pulse", v as u32));
        }
        if let Some(v) = self.probe_toa {
            out.push(("probe_toa", v as u32));
        }
        if let Some(v) = self.probe_tot {
            out.push(("probe_tot", v as u32));
        }
        if let Some(v) = self.gain_sel {
            out.push(("gain_sel", v));
        }
        if let Some(v) = self.hysteresis {
            out.push(("hysteresis", v));
        }
        out
    }
}

/// Per-group settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cm_feedback: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_trim: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comp_bias: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calib_enable: Option<bool>,
}

impl GroupConfig {
    fn values(&self) -> Vec<(&'static str, u32)> {
        let mut out = Vec::new();
        if let Some(v) = self.cm_feedback {
            out.push(("cm_feedback", v));
        }
        if let Some(v) = self.delay_trim {
            out.push(("delay_trim", v));
        }
        if let Some(v) = self.comp_bias {
            out.push(("comp_bias", v));
        }
        if let Some(v) = self.calib_enable {
            out.push(("calib_enable", v as u32));
        }
        out
    }
}

/// Readout-order configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReadoutConfig {
    /// Pixel index per serializer slot; cycled over the word stream
    pub order: Vec<u16>,
}

impl Default for ReadoutConfig {
    fn default() -> Self {
        Self {
            order: (0..PIXEL_COUNT as u16).collect(),
        }
    }
}

/// Calibration parameters
#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    /// Coarse TOT counter LSB in picoseconds
    #[serde(default = "default_lsb_coarse_ps")]
    pub lsb_coarse_ps: f64,

    /// Where the linearization table is persisted
    #[serde(default)]
    pub table_path: Option<PathBuf>,
}

fn default_lsb_coarse_ps() -> f64 {
    160.0
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            lsb_coarse_ps: default_lsb_coarse_ps(),
            table_path: None,
        }
    }
}
