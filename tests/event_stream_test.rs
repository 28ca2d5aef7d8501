//! E2E tests for the hit-word path (byte source → frames → records)
//!
//! Chunks are either handcrafted word buffers or come from the seeded
//! emulator, so every expectation is exact and reproducible.

use bytes::Bytes;
use tempix_rs::emulator::{EmulatorConfig, HitWordEmulator};
use tempix_rs::event::{constants, FrontEndVariant, HitRecord};
use tempix_rs::stream::{ByteSource, FrameStream, ReadoutOrder, StreamError};

/// Byte source backed by a prepared chunk list
struct VecSource {
    chunks: std::vec::IntoIter<Bytes>,
}

impl VecSource {
    fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks
                .into_iter()
                .map(Bytes::from)
                .collect::<Vec<_>>()
                .into_iter(),
        }
    }
}

impl ByteSource for VecSource {
    fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        Ok(self.chunks.next())
    }
}

fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[test]
fn test_wire_exact_decode_through_stream() {
    let words = vec![
        0x0000_0001,          // hit flag only
        0x0008_0000,          // seq_cnt = 1
        (2 << 9) | (2 << 1),  // tot = 2, toa = 2
        0x7F << 1,            // saturated TOA, overflow clear
        (0x7F << 1) | 0x100,  // saturated TOA, overflow set
    ];
    let mut stream = FrameStream::new(VecSource::new(vec![words_to_bytes(&words)]));
    let frame = stream.next_frame().unwrap().unwrap();
    let records: Vec<HitRecord> = frame.records().collect();

    assert!(records[0].hit);
    assert_eq!(records[0].seq_cnt, 0);

    assert_eq!(records[1].seq_cnt, 1);
    assert!(!records[1].hit);

    assert_eq!(records[2].tot_raw, 2);
    assert_eq!(records[2].toa_raw, 2);
    assert!(!records[2].tot_overflow);
    assert!(!records[2].toa_overflow);

    assert!(records[3].toa_saturated());
    assert!(!records[3].toa_overflow);
    assert!(records[4].toa_saturated());
    assert!(records[4].toa_overflow);
}

#[test]
fn test_misaligned_chunks_produce_no_records() {
    for len in [3usize, 5, 6, 7] {
        let mut stream = FrameStream::new(VecSource::new(vec![vec![0u8; len]]));
        assert!(
            stream.next_frame().unwrap().is_none(),
            "{len}-byte chunk must decode to nothing"
        );
        let stats = stream.stats();
        assert_eq!(stats.chunks_dropped, 1);
        assert_eq!(stats.words, 0);
    }
}

#[test]
fn test_stream_survives_malformed_chunk_between_good_ones() {
    let a = words_to_bytes(&[0x0000_0001]);
    let b = words_to_bytes(&[0x0008_0000, 0x0010_0000]);
    let mut stream = FrameStream::new(VecSource::new(vec![a, vec![0u8; 5], b]));

    let first = stream.next_frame().unwrap().unwrap();
    assert_eq!(first.word_count(), 1);
    let second = stream.next_frame().unwrap().unwrap();
    assert_eq!(second.word_count(), 2);
    assert!(stream.next_frame().unwrap().is_none());

    let stats = stream.stats();
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.chunks_dropped, 1);
    assert_eq!(stats.words, 3);
    assert_eq!(stats.bytes, 4 + 5 + 8);
}

#[test]
fn test_zero_length_chunk_is_an_empty_sequence() {
    let mut stream = FrameStream::new(VecSource::new(vec![vec![], words_to_bytes(&[1])]));
    let frame = stream.next_frame().unwrap().unwrap();
    assert_eq!(frame.records().count(), 0);
    let frame = stream.next_frame().unwrap().unwrap();
    assert_eq!(frame.records().count(), 1);
    assert_eq!(stream.stats().chunks_dropped, 0);
}

#[test]
fn test_emulator_stream_end_to_end() {
    let mut stream = FrameStream::new(HitWordEmulator::new(EmulatorConfig {
        seed: 42,
        events_per_chunk: 64,
        chunk_limit: Some(4),
        ..Default::default()
    }));

    let mut records = Vec::new();
    while let Some(frame) = stream.next_frame().unwrap() {
        records.extend(frame.records());
    }
    assert_eq!(records.len(), 256);
    let stats = stream.stats();
    assert_eq!(stats.chunks, 4);
    assert_eq!(stats.chunks_dropped, 0);
    assert_eq!(stats.words, 256);
    assert_eq!(stats.bytes, 256 * 4);

    // The sequence counter increments by one per word, wrapping mod 2^13
    for pair in records.windows(2) {
        let expected = (pair[0].seq_cnt + 1) % constants::SEQ_MODULO;
        assert_eq!(pair[1].seq_cnt, expected);
    }
}

#[test]
fn test_pixel_assignment_follows_readout_order() {
    let mut stream = FrameStream::new(HitWordEmulator::new(EmulatorConfig {
        seed: 9,
        events_per_chunk: 10,
        chunk_limit: Some(3),
        ..Default::default()
    }));
    // Serializer scans a 4-slot cycle
    let table = vec![2u16, 0, 3, 1];
    let mut order = ReadoutOrder::new(table.clone()).unwrap();

    let mut assigned = Vec::new();
    while let Some(frame) = stream.next_frame().unwrap() {
        for record in frame.records() {
            assigned.push((order.next_pixel(), record));
        }
    }
    assert_eq!(assigned.len(), 30);
    // The cycle continues across frame boundaries
    for (i, (pixel, _)) in assigned.iter().enumerate() {
        assert_eq!(*pixel, table[i % table.len()]);
    }
}

#[test]
fn test_records_are_value_objects() {
    // Two consumers of one frame see identical, independent copies
    let words = words_to_bytes(&[(0x1F8 << 9) | 1]);
    let mut stream = FrameStream::new(VecSource::new(vec![words]));
    let frame = stream.next_frame().unwrap().unwrap();
    let first: Vec<HitRecord> = frame.records().collect();
    let second: Vec<HitRecord> = frame.records().collect();
    assert_eq!(first, second);
    assert_eq!(first[0].tot_code(FrontEndVariant::Tz), None);
    assert!(first[0].tot_code(FrontEndVariant::Vpa).is_some());
}
