//! Conversion of device rasters into packed image samples.
//!
//! Devices deliver lines of `bytes_per_line` bytes, which may include
//! padding past the last pixel, at 1, 8 or 16 bits per sample. The PDF page
//! embeds tightly packed samples at 8 or 16 bits, so every raster passes
//! through [`normalize`] first.

use crate::device::session::Scan;
use crate::device::ColorSpace;
use crate::error::{Error, Result};
use tracing::debug;

/// Packed samples at the depth they are embedded with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Samples {
    /// One byte per sample
    Eight(Vec<u8>),
    /// Two bytes per sample
    Sixteen(Vec<u16>),
}

impl Samples {
    /// Bits per sample
    pub fn depth(&self) -> u32 {
        match self {
            Samples::Eight(_) => 8,
            Samples::Sixteen(_) => 16,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        match self {
            Samples::Eight(samples) => samples.len(),
            Samples::Sixteen(samples) => samples.len(),
        }
    }

    /// Returns true if there are no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tightly packed image ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// Pixels per line
    pub width: usize,
    /// Number of lines
    pub height: usize,
    /// Channel layout of `samples`
    pub color_space: ColorSpace,
    /// `width * height * channels` samples, row-major
    pub samples: Samples,
}

/// Strips line padding and unpacks samples.
///
/// One-bit samples follow the SANE lineart convention where a set bit is
/// black and are expanded to 8 bits. Sixteen-bit samples arrive in host byte
/// order and stay at 16 bits.
pub fn normalize(scan: Scan) -> Result<Raster> {
    let Scan {
        parameters,
        color_space,
        mut data,
    } = scan;

    let width = parameters.pixels_per_line;
    let height = parameters.line_count().unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(Error::EmptyImage { width, height });
    }

    let depth = parameters.depth;
    if !matches!(depth, 1 | 8 | 16) {
        return Err(Error::UnsupportedDepth { depth });
    }

    let samples_per_line = width * color_space.channels();
    let row_len = (samples_per_line * depth as usize).div_ceil(8);
    let stride = parameters.bytes_per_line.max(row_len);
    let expected = stride * (height - 1) + row_len;
    if data.len() < expected {
        return Err(Error::RasterSize {
            expected,
            actual: data.len(),
        });
    }
    if data.len() > stride * height {
        debug!("Ignoring {} trailing bytes", data.len() - stride * height);
    }

    if depth == 8 && stride == row_len {
        data.truncate(row_len * height);
        return Ok(Raster {
            width,
            height,
            color_space,
            samples: Samples::Eight(data),
        });
    }

    let rows = data.chunks(stride).take(height).map(|row| &row[..row_len]);
    let samples = match depth {
        1 => Samples::Eight(
            rows.flat_map(|row| {
                (0..samples_per_line).map(move |i| {
                    if row[i / 8] & (0x80 >> (i % 8)) != 0 {
                        0x00
                    } else {
                        0xFF
                    }
                })
            })
            .collect(),
        ),
        8 => Samples::Eight(rows.flatten().copied().collect()),
        _ => Samples::Sixteen(
            rows.flat_map(|row| {
                row.chunks_exact(2)
                    .map(|sample| u16::from_ne_bytes([sample[0], sample[1]]))
            })
            .collect(),
        ),
    };

    Ok(Raster {
        width,
        height,
        color_space,
        samples,
    })
}
