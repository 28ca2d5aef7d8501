//! Decode-path counters
//!
//! # Design Principles (KISS)
//! - Lock-free atomic counters on the hot path
//! - Simple snapshot mechanism for reporting
//! - Eventually consistent is fine; these feed monitoring, not physics
//!
//! Malformed chunks are recoverable by contract: acquisition never halts for
//! one, so the drop is recorded here as the side channel a caller inspects.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters for one frame stream
#[derive(Debug, Default)]
pub struct StreamCounters {
    /// Chunks received from the byte source
    pub chunks: AtomicU64,
    /// Chunks dropped because their length was not a whole number of words
    pub chunks_dropped: AtomicU64,
    /// Event words decoded
    pub words: AtomicU64,
    /// Bytes received (dropped chunks included)
    pub bytes: AtomicU64,
}

impl StreamCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_chunks(&self) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_chunks_dropped(&self) {
        self.chunks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_words(&self, n: u64) {
        self.words.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_bytes(&self, n: u64) {
        self.bytes.fetch_add(n, Ordering::Relaxed);
    }

    /// Consistent-enough copy for reporting
    pub fn snapshot(&self) -> StreamStats {
        StreamStats {
            chunks: self.chunks.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
            words: self.words.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`StreamCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub chunks: u64,
    pub chunks_dropped: u64,
    pub words: u64,
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let c = StreamCounters::new();
        assert_eq!(c.snapshot(), StreamStats::default());
    }

    #[test]
    fn test_increment_and_snapshot() {
        let c = StreamCounters::new();
        c.inc_chunks();
        c.inc_chunks();
        c.inc_chunks_dropped();
        c.add_words(16);
        c.add_bytes(64);
        let s = c.snapshot();
        assert_eq!(s.chunks, 2);
        assert_eq!(s.chunks_dropped, 1);
        assert_eq!(s.words, 16);
        assert_eq!(s.bytes, 64);
    }
}
