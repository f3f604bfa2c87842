//! # scanpdf-core
//!
//! A library for scanning one page through SANE and saving it as a PDF.
//!
//! This crate provides the core functionality for:
//! - Driving scanners through the system SANE library
//! - Configuring device options from textual `name=value` overrides
//! - Acquiring a raster and laying it out as a single-page PDF
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`device`]: Device model, the [`Backend`] trait, and the option/acquisition session.
//!   With the `sane` feature, `device::sane::SaneBackend` implements it over libsane
//! - [`document`]: Raster normalization and PDF assembly
//! - [`pipeline`]: The end-to-end run driven by a [`ScanConfig`]
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```ignore
//! use scanpdf_core::device::sane::SaneBackend;
//! use scanpdf_core::{pipeline, ScanConfig};
//!
//! let mut backend = SaneBackend::init()?;
//! let config = ScanConfig::new()
//!     .output("page.pdf")
//!     .set_override("resolution", "300");
//!
//! pipeline::run(&mut backend, &config, &mut std::io::stdout())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! Anything that can enumerate, configure and read from a scanner can drive
//! the pipeline by implementing [`Backend`].

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod device;
pub mod document;
pub mod error;
pub mod pipeline;

// Re-export primary types for convenience
pub use config::{Operation, ScanConfig};
pub use device::{Backend, DeviceDescriptor, OptionDescriptor, OptionKind, OptionValue, Status};
pub use document::{PdfAssembler, Raster, Samples};
pub use error::{Error, Result};

#[cfg(feature = "sane")]
pub use device::sane::SaneBackend;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
