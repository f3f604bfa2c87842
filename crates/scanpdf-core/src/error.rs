//! Error types for the scanpdf-core library.
//!
//! Variants fall into five families: device access, option configuration,
//! override parsing, acquisition, and I/O. Almost every one of them is fatal
//! to a run; [`Error::is_soft`] names the exceptions.

use crate::device::{FrameFormat, OptionKind, Status};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for scanpdf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all scanpdf operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The SANE library failed to initialize
    #[error("Failed to initialize SANE: {status}")]
    Init {
        /// Status reported by the library
        status: Status,
    },

    /// Device enumeration failed
    #[error("Failed to get device list: {status}")]
    DeviceList {
        /// Status reported by the backend
        status: Status,
    },

    /// A negative device index was requested
    #[error("Invalid device index: {index}")]
    InvalidDeviceIndex {
        /// The requested index
        index: i64,
    },

    /// The device index is past the end of the enumeration
    #[error("Device not found at index {index}")]
    DeviceNotFound {
        /// The requested index
        index: i64,
    },

    /// The device is busy, missing, or refused the open
    #[error("Device {device} could not be accessed: {status}")]
    Open {
        /// Device name
        device: String,
        /// Status reported by the backend
        status: Status,
    },

    /// An operation that needs an open device was issued without one
    #[error("No device is open")]
    NotOpen,

    /// The option descriptors of the open device could not be fetched
    #[error("Failed to retrieve options of {device}: {status}")]
    Options {
        /// Device name
        device: String,
        /// Status reported by the backend
        status: Status,
    },

    /// Reading the current value of an option failed
    #[error("Failed to read option {name}: {status}")]
    OptionGet {
        /// Option name
        name: String,
        /// Status reported by the backend
        status: Status,
    },

    /// The device rejected a new option value
    #[error("Failed to set option {name}: {status}")]
    OptionSet {
        /// Option name
        name: String,
        /// Status reported by the backend
        status: Status,
    },

    /// No option with this name is exposed by the device
    #[error("Unknown option {name}")]
    UnknownOption {
        /// Option name
        name: String,
    },

    /// A value of the wrong kind was passed to a set
    #[error("Option {name} holds {expected} values, got {found}")]
    ValueKindMismatch {
        /// Option name
        name: String,
        /// Kind declared by the option
        expected: OptionKind,
        /// Kind of the value supplied
        found: OptionKind,
    },

    /// A command-line override did not parse as the option's kind
    #[error("Option {name} not {}: {value}", expected.describe())]
    OptionParse {
        /// Option name
        name: String,
        /// Kind declared by the option
        expected: OptionKind,
        /// Raw override text
        value: String,
    },

    /// The device could not begin acquisition
    #[error("Device {device} could not start scanning: {status}")]
    Start {
        /// Device name
        device: String,
        /// Status reported by the backend
        status: Status,
    },

    /// Image parameters could not be fetched after start
    #[error("Device {device} could not get parameters: {status}")]
    Parameters {
        /// Device name
        device: String,
        /// Status reported by the backend
        status: Status,
    },

    /// A non-good status arrived in the middle of the raster stream
    #[error("Scanning interrupted: {status}")]
    ReadInterrupted {
        /// Status reported by the backend
        status: Status,
    },

    /// The device delivered a frame format that cannot be placed in a document
    #[error("Unsupported frame format: {format}")]
    UnsupportedFrameFormat {
        /// Reported format
        format: FrameFormat,
    },

    /// A raster read was issued outside a started scan
    #[error("No scan is in progress")]
    NotScanning,

    /// The sample depth has no document encoding
    #[error("Unsupported bit depth: {depth}")]
    UnsupportedDepth {
        /// Bits per sample
        depth: u32,
    },

    /// The scan produced no pixels
    #[error("Scan produced an empty image ({width}x{height})")]
    EmptyImage {
        /// Pixels per line
        width: usize,
        /// Lines
        height: usize,
    },

    /// The raster buffer is too short for the reported geometry
    #[error("Raster holds {actual} bytes, expected at least {expected}")]
    RasterSize {
        /// Bytes needed by the geometry
        expected: usize,
        /// Bytes actually received
        actual: usize,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Writing a listing or message to the output stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new option read error
    pub fn option_get(name: impl Into<String>, status: Status) -> Self {
        Self::OptionGet {
            name: name.into(),
            status,
        }
    }

    /// Creates a new option set error
    pub fn option_set(name: impl Into<String>, status: Status) -> Self {
        Self::OptionSet {
            name: name.into(),
            status,
        }
    }

    /// Returns true if the configuration pass should log this and move on
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::OptionGet { .. })
    }
}
