//! Device session operations: the configuration pass, the option dump, and
//! the acquisition loop.
//!
//! All three are generic over [`Backend`], so they run the same against the
//! SANE library and against an in-memory device.

use super::{
    Backend, ColorSpace, Constraint, OptionDescriptor, OptionKind, ScanParameters, Significant,
};
use crate::device::overrides::parse_override;
use crate::error::Result;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, info, trace, warn};

/// Resolution assumed when the device exposes none
pub const DEFAULT_RESOLUTION: f32 = 72.0;

/// Name SANE backends use for the scan resolution option
const RESOLUTION_OPTION: &str = "resolution";

/// Upper bound on the buffer reserved up front from the reported image size
const MAX_PREALLOC: usize = 64 << 20;

/// An acquired image
#[derive(Debug, Clone)]
pub struct Scan {
    /// Parameters as reported by the device, with any unknown height resolved
    pub parameters: ScanParameters,
    /// Color space derived from the frame format
    pub color_space: ColorSpace,
    /// Raw raster bytes as delivered
    pub data: Vec<u8>,
}

/// Applies `overrides` to the device, in the device's option order.
///
/// Every option's current value is fetched first. An option whose value
/// cannot be read is skipped; an override that does not parse, or that the
/// device rejects, aborts the pass.
pub fn configure<B: Backend + ?Sized>(
    backend: &mut B,
    options: &[OptionDescriptor],
    overrides: &BTreeMap<String, String>,
) -> Result<()> {
    for option in options {
        let current = match backend.get_option(&option.name) {
            Ok(value) => value,
            Err(e) if e.is_soft() => {
                debug!("Skipping option {}: {}", option.name, e);
                continue;
            }
            Err(e) => return Err(e),
        };
        trace!("Option {} = {}", option.name, current);

        let Some(raw) = overrides.get(&option.name) else {
            continue;
        };

        let Some(value) = parse_override(option, raw)? else {
            warn!(
                "Ignoring override for boolean option {}: boolean overrides are not supported",
                option.name
            );
            continue;
        };

        let set_info = backend.set_option(&option.name, &value)?;
        info!("Set option {} = {}", option.name, value);
        if set_info.inexact {
            debug!("Device rounded option {}", option.name);
        }
        if set_info.reload_options || set_info.reload_params {
            debug!(
                reload_options = set_info.reload_options,
                reload_params = set_info.reload_params,
                "Option {} changed device state",
                option.name
            );
        }
    }

    for name in overrides.keys() {
        if !options.iter().any(|o| &o.name == name) {
            warn!("Device has no option named {}", name);
        }
    }

    Ok(())
}

/// Writes every option with its current value and constraint set.
pub fn dump_options<B: Backend + ?Sized, W: Write>(
    out: &mut W,
    backend: &mut B,
    options: &[OptionDescriptor],
) -> Result<()> {
    writeln!(out, "Options: {}", options.len())?;

    for option in options {
        writeln!(out, " {}", option.name)?;
        writeln!(out, "  Name: {}", option.title)?;
        if option.readonly {
            writeln!(out, "  Size: {} (Readonly)", option.size)?;
        } else {
            writeln!(out, "  Size: {}", option.size)?;
        }

        let label = match option.kind {
            OptionKind::Bool => "Bool",
            OptionKind::Int => "Int",
            OptionKind::Float => "Float",
            OptionKind::String => "Str",
        };
        match backend.get_option(&option.name) {
            Ok(value) => writeln!(out, "    {} Value: {}", label, value)?,
            Err(e) => {
                warn!("Could not read option {}: {}", option.name, e);
                writeln!(out, "    {} Value: <unavailable>", label)?;
            }
        }

        write_constraint(out, &option.constraint)?;
    }

    Ok(())
}

fn write_constraint<W: Write>(out: &mut W, constraint: &Constraint) -> Result<()> {
    match constraint {
        Constraint::None => {}
        Constraint::IntList(values) => write_list(out, values)?,
        Constraint::FloatList(values) => {
            let values: Vec<Significant> = values.iter().copied().map(Significant).collect();
            write_list(out, &values)?
        }
        Constraint::StringList(values) => write_list(out, values)?,
        Constraint::IntRange { min, max, quant } => {
            if min != max {
                writeln!(out, "    Constraint range: {} - {} Step: {}", min, max, quant)?;
            }
        }
        Constraint::FloatRange { min, max, quant } => {
            if min != max {
                writeln!(
                    out,
                    "    Constraint range: {} - {} Step: {}",
                    Significant(*min),
                    Significant(*max),
                    Significant(*quant)
                )?;
            }
        }
    }
    Ok(())
}

fn write_list<W: Write, T: std::fmt::Display>(out: &mut W, values: &[T]) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }
    writeln!(out, "    Constraints:")?;
    for value in values {
        writeln!(out, "         {}", value)?;
    }
    Ok(())
}

/// Reads the scan resolution in dpi, falling back to [`DEFAULT_RESOLUTION`].
pub fn resolution<B: Backend + ?Sized>(backend: &mut B, options: &[OptionDescriptor]) -> f32 {
    if !options.iter().any(|o| o.name == RESOLUTION_OPTION) {
        return DEFAULT_RESOLUTION;
    }
    match backend.get_option(RESOLUTION_OPTION) {
        Ok(value) => match value.as_f64() {
            Some(dpi) if dpi > 0.0 => dpi as f32,
            _ => DEFAULT_RESOLUTION,
        },
        Err(e) => {
            debug!("Could not read resolution: {}", e);
            DEFAULT_RESOLUTION
        }
    }
}

/// Runs one acquisition: start, fetch parameters, read until end-of-data.
///
/// The loop ends exactly when the device signals end-of-data; any other
/// failure mid-stream discards what was read.
pub fn acquire<B: Backend + ?Sized>(backend: &mut B, chunk_size: usize) -> Result<Scan> {
    backend.start()?;
    debug!("Scan started");

    let parameters = backend.parameters()?;
    debug!(
        format = %parameters.format,
        pixels_per_line = parameters.pixels_per_line,
        lines = parameters.lines,
        depth = parameters.depth,
        bytes_per_line = parameters.bytes_per_line,
        "Scan parameters"
    );
    let color_space = ColorSpace::try_from(parameters.format)?;

    // The reported size only sizes the first reservation; the loop grows past it
    let reserve = parameters.expected_len().unwrap_or(0).min(MAX_PREALLOC);
    let mut data = Vec::with_capacity(reserve);
    let mut chunk = vec![0u8; chunk_size.max(2)];
    while let Some(len) = backend.read(&mut chunk)? {
        data.extend_from_slice(&chunk[..len]);
        trace!("Read {} bytes ({} total)", len, data.len());
    }
    info!("Acquired {} bytes", data.len());

    if let Err(e) = backend.cancel() {
        warn!("Failed to end scan cycle: {}", e);
    }

    Ok(Scan {
        parameters: parameters.with_received(data.len()),
        color_space,
        data,
    })
}
