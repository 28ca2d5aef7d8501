//! Aggregate error type for the readout stack
//!
//! # Design Principles (KISS)
//! - Each module defines its own precise thiserror enum
//! - This aggregate exists for callers that drive the whole stack (configure
//!   a device, run a stream, rebuild a calibration) and want one `?` type
//! - Construction-time errors surface synchronously; stream errors are
//!   recoverable per chunk and normally travel through counters instead

use thiserror::Error;

use crate::calib::CalibrationError;
use crate::config::ConfigError;
use crate::register::FieldError;
use crate::schema::SchemaError;
use crate::stream::StreamError;

/// Any error the readout stack can produce
#[derive(Error, Debug)]
pub enum ReadoutError {
    /// Invalid field layout, fatal before any device use
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Single field write/read failure; the rest of the image is intact
    #[error("field codec error: {0}")]
    Field(#[from] FieldError),

    /// Byte-source or framing failure
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// Calibration build or persistence failure; a previously built table
    /// stays valid
    #[error("calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    /// Configuration file problem
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias using [`ReadoutError`]
pub type ReadoutResult<T> = Result<T, ReadoutError>;
