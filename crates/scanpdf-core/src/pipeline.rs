//! One run of the program, from device selection to output.
//!
//! [`run`] enumerates devices, opens the one selected by index, applies the
//! option overrides and then either dumps the option table or acquires a
//! page and writes it as a PDF. Every step works against [`Backend`], so the
//! same flow drives the SANE library or an in-memory stand-in.

use crate::config::{Operation, ScanConfig};
use crate::device::{session, Backend, DeviceDescriptor};
use crate::document::{self, annotation_text, PdfAssembler};
use crate::error::{Error, Result};
use chrono::Local;
use std::io::Write;
use tracing::{debug, info, warn};

/// Prints the name of every device the backend can see
pub fn list_devices<B: Backend + ?Sized, W: Write>(backend: &mut B, out: &mut W) -> Result<()> {
    writeln!(out, "Devices:")?;
    for device in backend.devices()? {
        writeln!(out, "\t{}", device.name)?;
    }
    Ok(())
}

/// Picks a device by its position in the enumeration
pub fn select_device(devices: &[DeviceDescriptor], index: i64) -> Result<&DeviceDescriptor> {
    if index < 0 {
        return Err(Error::InvalidDeviceIndex { index });
    }
    usize::try_from(index)
        .ok()
        .and_then(|i| devices.get(i))
        .ok_or(Error::DeviceNotFound { index })
}

/// Runs the configured operation against `backend`.
///
/// Option dumps and the annotation text are written to `out`; scans go to
/// `config.output`.
pub fn run<B: Backend + ?Sized, W: Write>(
    backend: &mut B,
    config: &ScanConfig,
    out: &mut W,
) -> Result<()> {
    let devices = backend.devices()?;
    debug!("Backend reports {} devices", devices.len());
    let device = select_device(&devices, config.device_index)?.name.clone();

    backend.open(&device)?;

    let options = match backend.options() {
        Ok(options) => options,
        Err(e) => {
            warn!("Failed to retrieve options: {}", e);
            Vec::new()
        }
    };

    session::configure(backend, &options, &config.overrides)?;

    match config.operation {
        Operation::DumpOptions => session::dump_options(out, backend, &options),
        Operation::Scan => {
            let resolution = session::resolution(backend, &options);
            let scan = session::acquire(backend, config.chunk_size)?;
            let raster = document::normalize(scan)?;
            info!(
                "Scanned {}x{} pixels at {} dpi",
                raster.width, raster.height, resolution
            );

            let annotation = config
                .annotate
                .then(|| annotation_text(&Local::now(), config.user.as_deref()));
            if let Some(text) = &annotation {
                writeln!(out, "Drawing text: {}", text)?;
            }
            PdfAssembler::new(resolution)
                .with_title(format!("Scan from {}", device))
                .with_annotation(annotation)
                .write_to_file(raster, &config.output)
        }
    }
}
