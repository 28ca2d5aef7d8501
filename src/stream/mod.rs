//! Frame stream: byte chunks in, hit records out
//!
//! A [`ByteSource`] hands over opaque chunks (hardware FIFO reads, file
//! blocks, the emulator...). Each chunk must independently hold a whole
//! number of 32-bit little-endian event words; a chunk that does not is
//! dropped and counted, never reassembled with its neighbours, and never
//! stops acquisition. Decoding carries no state across words, so consumers
//! may stop at any word boundary.
//!
//! The stream knows nothing about pixels. Channel identity comes from the
//! configured readout order: the serializer emits pixels in a fixed cycle,
//! and [`ReadoutOrder`] turns a running word position into a pixel index.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::warn;

use crate::common::{StreamCounters, StreamStats};
use crate::event::{constants::WORD_SIZE, HitRecord};

/// Streaming errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// Chunk length is not a whole number of event words
    #[error("chunk of {len} bytes is not a whole number of 4-byte words")]
    MisalignedChunk { len: usize },

    /// Readout order table must name at least one pixel
    #[error("readout order table is empty")]
    EmptyReadoutOrder,

    /// Byte source failure (file-backed sources)
    #[error("byte source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// External supplier of raw readout chunks
///
/// `Ok(None)` is end-of-stream; the stream is not seekable and restarts only
/// by reopening the source. Timeouts and transport retries belong to the
/// implementation, not to this contract.
pub trait ByteSource {
    fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError>;
}

/// One aligned chunk, viewed as a finite lazy sequence of hit records
#[derive(Debug, Clone)]
pub struct Frame {
    chunk: Bytes,
}

impl Frame {
    /// Validate chunk alignment
    pub fn try_new(chunk: Bytes) -> Result<Self, StreamError> {
        if chunk.len() % WORD_SIZE != 0 {
            return Err(StreamError::MisalignedChunk { len: chunk.len() });
        }
        Ok(Self { chunk })
    }

    pub fn word_count(&self) -> usize {
        self.chunk.len() / WORD_SIZE
    }

    /// Raw little-endian words, in wire order
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.chunk
            .chunks_exact(WORD_SIZE)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Decoded records, in wire order
    pub fn records(&self) -> impl Iterator<Item = HitRecord> + '_ {
        self.words().map(HitRecord::from_word)
    }
}

/// Pulls chunks from a byte source and yields aligned frames
///
/// Misaligned chunks are logged, counted in [`StreamCounters`], and skipped;
/// `next_frame` keeps going until an aligned chunk or end-of-stream.
pub struct FrameStream<S> {
    source: S,
    counters: Arc<StreamCounters>,
}

impl<S: ByteSource> FrameStream<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            counters: Arc::new(StreamCounters::new()),
        }
    }

    /// Shared handle to the counters, for an external monitor
    pub fn counters(&self) -> Arc<StreamCounters> {
        Arc::clone(&self.counters)
    }

    pub fn stats(&self) -> StreamStats {
        self.counters.snapshot()
    }

    /// Next aligned frame, or `None` at end of stream
    pub fn next_frame(&mut self) -> Result<Option<Frame>, StreamError> {
        loop {
            let Some(chunk) = self.source.next_chunk()? else {
                return Ok(None);
            };
            self.counters.inc_chunks();
            self.counters.add_bytes(chunk.len() as u64);
            match Frame::try_new(chunk) {
                Ok(frame) => {
                    self.counters.add_words(frame.word_count() as u64);
                    return Ok(Some(frame));
                }
                Err(err) => {
                    warn!(%err, "dropping malformed chunk");
                    self.counters.inc_chunks_dropped();
                }
            }
        }
    }
}

/// Cyclic pixel assignment for decoded words
///
/// `pixel = table[position mod len]`; the table is configuration data owned
/// outside the stream. The position survives across frames because the
/// serializer's cycle does not restart per chunk.
#[derive(Debug, Clone)]
pub struct ReadoutOrder {
    table: Vec<u16>,
    position: u64,
}

impl ReadoutOrder {
    pub fn new(table: Vec<u16>) -> Result<Self, StreamError> {
        if table.is_empty() {
            return Err(StreamError::EmptyReadoutOrder);
        }
        Ok(Self { table, position: 0 })
    }

    /// Pixel index for the next word, advancing the cycle
    pub fn next_pixel(&mut self) -> u16 {
        let pixel = self.table[(self.position % self.table.len() as u64) as usize];
        self.position += 1;
        pixel
    }

    /// Words assigned so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Restart the cycle (source reopened)
    pub fn reset(&mut self) {
        self.position = 0;
    }
}
