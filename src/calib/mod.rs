//! TDC fine-code linearization
//!
//! The TOT interpolator's fine codes are not equally wide in time: the delay
//! elements spread with process and temperature. The fix is the usual
//! code-density method: histogram the fine codes seen in real data, turn bin
//! populations into cumulative fractions, and use those as the effective
//! position of each code. The resulting table is built once per calibration
//! run, persisted as a plain text file, and read-only afterwards; a rebuild
//! produces a new table that the owner swaps in whole.
//!
//! The edge-correction terms in [`CalibrationTable::apply`] cancel a known
//! phase discontinuity between the fine and coarse counters at specific code
//! transitions. The constants are empirically validated hardware facts;
//! they are reproduced literally and locked by tests.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::event::{FrontEndVariant, HitRecord};

/// Calibration build and persistence errors
///
/// A failed build or load never invalidates a previously built table.
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("fine-code histogram is empty")]
    EmptyHistogram,

    #[error("calibration file I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("calibration file line {line}: cannot parse '{value}' as a number")]
    Parse { line: usize, value: String },

    #[error("calibration file holds {lines} values; need K+1 with K >= 1")]
    TooShort { lines: usize },

    #[error("table has {actual} fine codes but the front-end expects {expected}")]
    CodeCountMismatch { expected: usize, actual: usize },
}

/// Accumulates fine-code occurrences from decoded hits
#[derive(Debug, Clone)]
pub struct FineCodeHistogram {
    counts: Vec<u64>,
}

impl FineCodeHistogram {
    /// Histogram sized for a front-end variant's fine-code range
    pub fn for_variant(variant: FrontEndVariant) -> Self {
        Self::with_code_count(variant.fine_code_count())
    }

    pub fn with_code_count(k: usize) -> Self {
        Self { counts: vec![0; k] }
    }

    /// Count one fine code; out-of-range codes are logged and ignored
    pub fn record(&mut self, fine: u8) {
        match self.counts.get_mut(fine as usize) {
            Some(slot) => *slot += 1,
            None => warn!(fine, "fine code outside histogram range"),
        }
    }

    /// Accumulate one decoded hit, honouring the TOT sentinel
    ///
    /// Returns whether the record contributed a sample.
    pub fn fill(&mut self, record: &HitRecord, variant: FrontEndVariant) -> bool {
        match record.tot_code(variant) {
            Some(code) => {
                self.record(code.fine);
                true
            }
            None => false,
        }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Fine-code linearization table
///
/// `K` table values (cumulative code positions as fractions of the fine
/// range) plus one sentinel slot holding the nominal one-code width, used
/// for uncertainty estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    slots: Vec<f64>,
}

impl CalibrationTable {
    /// Build a table from an accumulated histogram
    ///
    /// The histogram is shifted by one code before integration, each code's
    /// own population contributing half its width to its position. The
    /// nominal width comes from the middle half of the distribution, so a
    /// hot or dead code at either edge does not skew it. A non-monotonic
    /// result is a quality warning, not an error; hardware samples are
    /// noisy.
    pub fn build(histogram: &FineCodeHistogram) -> Result<Self, CalibrationError> {
        let counts = histogram.counts();
        let k = counts.len();
        let total = histogram.total();
        if total == 0 {
            return Err(CalibrationError::EmptyHistogram);
        }
        let total_f = total as f64;

        let mut slots = vec![0.0; k + 1];
        let mut cum = 0.0;
        for code in 0..k {
            let edge = if code == 0 {
                0.0
            } else {
                counts[code - 1] as f64
            };
            cum += edge;
            slots[code] = (edge / 2.0 + cum) / total_f;
        }

        let skirt = k / 4;
        let middle = &counts[skirt..k - skirt];
        slots[k] = middle.iter().map(|&c| c as f64).sum::<f64>() / total_f / middle.len() as f64;

        if slots[..k].windows(2).any(|w| w[1] < w[0]) {
            warn!("calibration table is not monotonic; input histogram is noisy or sparse");
        }
        info!(codes = k, samples = total, "built fine-code calibration table");
        Ok(Self { slots })
    }

    /// Ideal table for `k` equally wide codes
    pub fn identity(k: usize) -> Self {
        let mut slots: Vec<f64> = (0..k).map(|code| code as f64 / k as f64).collect();
        slots.push(1.0 / k as f64);
        Self { slots }
    }

    pub fn fine_code_count(&self) -> usize {
        self.slots.len() - 1
    }

    /// Calibrated position of a fine code, as a fraction of the fine range
    pub fn value(&self, fine: usize) -> f64 {
        self.slots[fine]
    }

    /// Nominal one-code width (the sentinel slot)
    pub fn nominal_width(&self) -> f64 {
        *self.slots.last().expect("table always holds K+1 slots")
    }

    /// Convert a (coarse, fine) code pair into picoseconds
    ///
    /// `fine` must lie in `[0, K)`. The fine interpolator spans two coarse
    /// periods, hence the doubled LSB on the table term and the parity
    /// conditions of the edge corrections.
    pub fn apply(&self, coarse: u32, fine: usize, lsb_coarse_ps: f64) -> f64 {
        let lsb = lsb_coarse_ps;
        let mut time = (coarse as f64 + 1.0) * lsb - self.slots[fine] * 2.0 * lsb;
        if fine > 3 && coarse % 2 == 0 {
            time += 2.0 * lsb;
        }
        if fine == 0 && coarse % 2 == 1 {
            time -= self.slots[0] * 2.0 * lsb;
        }
        time
    }

    /// Write as newline-separated decimals, K+1 lines
    pub fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), CalibrationError> {
        for slot in &self.slots {
            writeln!(writer, "{slot}")?;
        }
        Ok(())
    }

    /// Parse a table written by [`Self::to_writer`]
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CalibrationError> {
        let mut slots = Vec::new();
        for (idx, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value = trimmed.parse::<f64>().map_err(|_| CalibrationError::Parse {
                line: idx + 1,
                value: trimmed.to_string(),
            })?;
            slots.push(value);
        }
        if slots.len() < 2 {
            return Err(CalibrationError::TooShort { lines: slots.len() });
        }
        Ok(Self { slots })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibrationError> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        debug!(path = %path.as_ref().display(), "saved calibration table");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let table = Self::from_reader(File::open(path.as_ref())?)?;
        info!(
            path = %path.as_ref().display(),
            codes = table.fine_code_count(),
            "loaded calibration table"
        );
        Ok(table)
    }
}

/// Bundles a table with the front-end it calibrates
///
/// Owns exactly one table at a time; `rebuild` swaps in a complete new table
/// or leaves the current one untouched on failure.
#[derive(Debug, Clone)]
pub struct Linearizer {
    variant: FrontEndVariant,
    table: CalibrationTable,
    lsb_coarse_ps: f64,
}

impl Linearizer {
    pub fn new(
        variant: FrontEndVariant,
        table: CalibrationTable,
        lsb_coarse_ps: f64,
    ) -> Result<Self, CalibrationError> {
        if table.fine_code_count() != variant.fine_code_count() {
            return Err(CalibrationError::CodeCountMismatch {
                expected: variant.fine_code_count(),
                actual: table.fine_code_count(),
            });
        }
        Ok(Self {
            variant,
            table,
            lsb_coarse_ps,
        })
    }

    pub fn table(&self) -> &CalibrationTable {
        &self.table
    }

    /// Replace the table from a fresh histogram; the old table survives a
    /// failed build
    pub fn rebuild(&mut self, histogram: &FineCodeHistogram) -> Result<(), CalibrationError> {
        let table = CalibrationTable::build(histogram)?;
        if table.fine_code_count() != self.variant.fine_code_count() {
            return Err(CalibrationError::CodeCountMismatch {
                expected: self.variant.fine_code_count(),
                actual: table.fine_code_count(),
            });
        }
        self.table = table;
        Ok(())
    }

    /// Calibrated time over threshold, `None` for sentinel TOT codes
    pub fn time_over_threshold_ps(&self, record: &HitRecord) -> Option<f64> {
        let code = record.tot_code(self.variant)?;
        Some(
            self.table
                .apply(code.coarse as u32, code.fine as usize, self.lsb_coarse_ps),
        )
    }
}
