//! Run configuration, built once from the command line.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default output path
pub const DEFAULT_OUTPUT: &str = "output.pdf";

/// Default read chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// What to do once the device is open and configured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Operation {
    /// Print every option of the device
    DumpOptions,
    /// Acquire one page and write it as a PDF
    #[default]
    Scan,
}

/// Configuration for a single run
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Position of the device in the enumeration order
    pub device_index: i64,
    /// Where the PDF is written
    pub output: PathBuf,
    /// Whether to stamp the scan time and user onto the page
    pub annotate: bool,
    /// User name for the annotation
    pub user: Option<String>,
    /// Dump options or scan
    pub operation: Operation,
    /// Option overrides, by option name
    pub overrides: BTreeMap<String, String>,
    /// Bytes requested per read
    pub chunk_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            output: PathBuf::from(DEFAULT_OUTPUT),
            annotate: false,
            user: None,
            operation: Operation::Scan,
            overrides: BTreeMap::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ScanConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the device by enumeration index
    pub fn device_index(mut self, index: i64) -> Self {
        self.device_index = index;
        self
    }

    /// Sets the output path
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = path.into();
        self
    }

    /// Enables or disables the annotation
    pub fn annotate(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// Sets the user name shown in the annotation
    pub fn user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    /// Sets the operation
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    /// Adds an override; a name already present keeps its first value
    pub fn set_override(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    /// Replaces all overrides
    pub fn overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Sets the read chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }
}
