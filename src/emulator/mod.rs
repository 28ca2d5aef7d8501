//! Emulator byte source - generates synthetic hit words for testing
//!
//! Stands in for the readout hardware behind the [`ByteSource`] contract:
//! each chunk is a batch of well-formed little-endian event words with a
//! running 13-bit sequence counter and roughly Gaussian TOA/TOT codes.
//! Seeded, so test runs are reproducible.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::event::{constants, FrontEndVariant, HitRecord};
use crate::stream::{ByteSource, StreamError};

/// Emulator configuration
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// RNG seed; same seed, same stream
    pub seed: u64,
    /// Event words per chunk
    pub events_per_chunk: usize,
    /// Number of chunks before end-of-stream (`None` = unbounded)
    pub chunk_limit: Option<u64>,
    /// Front-end variant, selects the TOT sentinel code
    pub variant: FrontEndVariant,
    /// Probability that a word carries the hit flag
    pub hit_probability: f64,
    /// Probability of a "no real hit" sentinel TOT word
    pub sentinel_probability: f64,
    pub toa_mean: f64,
    pub toa_sigma: f64,
    pub tot_mean: f64,
    pub tot_sigma: f64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            events_per_chunk: 256,
            chunk_limit: None,
            variant: FrontEndVariant::Vpa,
            hit_probability: 0.9,
            sentinel_probability: 0.02,
            toa_mean: 60.0,
            toa_sigma: 15.0,
            tot_mean: 200.0,
            tot_sigma: 40.0,
        }
    }
}

/// Synthetic hit-word source
pub struct HitWordEmulator {
    config: EmulatorConfig,
    rng: StdRng,
    toa_dist: Normal<f64>,
    tot_dist: Normal<f64>,
    seq_cnt: u16,
    chunks_emitted: u64,
}

impl HitWordEmulator {
    pub fn new(config: EmulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let toa_dist = Normal::new(config.toa_mean, config.toa_sigma).unwrap();
        let tot_dist = Normal::new(config.tot_mean, config.tot_sigma).unwrap();
        Self {
            config,
            rng,
            toa_dist,
            tot_dist,
            seq_cnt: 0,
            chunks_emitted: 0,
        }
    }

    /// Generate one record, advancing the sequence counter
    pub fn next_record(&mut self) -> HitRecord {
        let seq_cnt = self.seq_cnt;
        self.seq_cnt = (self.seq_cnt + 1) % constants::SEQ_MODULO;

        let toa_sample = self.toa_dist.sample(&mut self.rng).round() as i64;
        // Codes past the range saturate into the reserved 127
        let toa_raw = toa_sample.clamp(0, constants::TOA_SATURATED as i64) as u8;
        let toa_overflow = toa_sample > constants::TOA_SATURATED as i64;

        let (tot_raw, tot_overflow) = if self.rng.gen_bool(self.config.sentinel_probability) {
            (self.config.variant.tot_sentinel(), false)
        } else {
            let tot_sample = self.tot_dist.sample(&mut self.rng).round() as i64;
            if tot_sample > 0x1FF {
                // Counter wrapped once; the overflow flag records it
                (((tot_sample - 0x200).min(0x1FF)) as u16, true)
            } else {
                (tot_sample.max(0) as u16, false)
            }
        };

        HitRecord {
            seq_cnt,
            tot_overflow,
            tot_raw,
            toa_overflow,
            toa_raw,
            hit: self.rng.gen_bool(self.config.hit_probability),
        }
    }
}

impl ByteSource for HitWordEmulator {
    fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        if let Some(limit) = self.config.chunk_limit {
            if self.chunks_emitted >= limit {
                return Ok(None);
            }
        }
        self.chunks_emitted += 1;
        let mut buf = Vec::with_capacity(self.config.events_per_chunk * constants::WORD_SIZE);
        for _ in 0..self.config.events_per_chunk {
            buf.extend_from_slice(&self.next_record().to_word().to_le_bytes());
        }
        Ok(Some(Bytes::from(buf)))
    }
}
