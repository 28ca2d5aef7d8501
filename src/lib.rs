//! TEMPIX-RS: configuration and readout codec for the TMX25 timing ASIC
//!
//! This crate is the bit-exact core of the readout stack: it maps named
//! configuration fields onto the scan-chain register image, decodes the
//! chip's 32-bit hit words, demultiplexes raw byte chunks into hit records,
//! and linearizes the TDC fine codes into picoseconds. Transport (hardware
//! access, sockets) and process orchestration live in external collaborators
//! behind the [`stream::ByteSource`] contract.

pub mod calib;
pub mod common;
pub mod config;
pub mod emulator;
pub mod event;
pub mod register;
pub mod schema;
pub mod stream;

pub use common::{ReadoutError, ReadoutResult};
