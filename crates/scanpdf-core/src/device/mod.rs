//! Device model shared by every backend.
//!
//! A [`Backend`] is the seam between the scanning pipeline and whatever
//! speaks the SANE protocol. The types in this module describe what flows
//! across it: devices, option descriptors with their constraints, typed
//! option values, and the image parameters reported after a scan starts.
//!
//! ## Option typing
//!
//! SANE options are typed at runtime. Here that runtime typing is a closed
//! set: every option declares an [`OptionKind`], and every value is an
//! [`OptionValue`] carrying its kind in the variant. Backends refuse a set
//! whose value kind differs from the declared kind, see
//! [`OptionDescriptor::check_value`].

#[cfg(test)]
pub(crate) mod mock;
pub mod overrides;
#[cfg(feature = "sane")]
pub mod sane;
pub mod session;

use crate::error::{Error, Result};
use std::fmt;

/// Status codes defined by the SANE standard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Operation completed normally
    Good,
    /// Operation is not supported
    Unsupported,
    /// Operation was cancelled
    Cancelled,
    /// Device is busy
    DeviceBusy,
    /// Data is invalid
    Inval,
    /// No more data available
    Eof,
    /// Document feeder jammed
    Jammed,
    /// Document feeder out of documents
    NoDocs,
    /// Scanner cover is open
    CoverOpen,
    /// Error during device I/O
    IoError,
    /// Out of memory
    NoMem,
    /// Access to resource has been denied
    AccessDenied,
    /// A code outside the standard set
    Other(u32),
}

impl Status {
    /// Returns the numeric code defined by the standard
    pub fn code(self) -> u32 {
        match self {
            Status::Good => 0,
            Status::Unsupported => 1,
            Status::Cancelled => 2,
            Status::DeviceBusy => 3,
            Status::Inval => 4,
            Status::Eof => 5,
            Status::Jammed => 6,
            Status::NoDocs => 7,
            Status::CoverOpen => 8,
            Status::IoError => 9,
            Status::NoMem => 10,
            Status::AccessDenied => 11,
            Status::Other(code) => code,
        }
    }
}

impl From<u32> for Status {
    fn from(code: u32) -> Self {
        match code {
            0 => Status::Good,
            1 => Status::Unsupported,
            2 => Status::Cancelled,
            3 => Status::DeviceBusy,
            4 => Status::Inval,
            5 => Status::Eof,
            6 => Status::Jammed,
            7 => Status::NoDocs,
            8 => Status::CoverOpen,
            9 => Status::IoError,
            10 => Status::NoMem,
            11 => Status::AccessDenied,
            other => Status::Other(other),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Good => f.write_str("Success"),
            Status::Unsupported => f.write_str("Operation not supported"),
            Status::Cancelled => f.write_str("Operation was cancelled"),
            Status::DeviceBusy => f.write_str("Device busy"),
            Status::Inval => f.write_str("Invalid argument"),
            Status::Eof => f.write_str("End of file reached"),
            Status::Jammed => f.write_str("Document feeder jammed"),
            Status::NoDocs => f.write_str("Document feeder out of documents"),
            Status::CoverOpen => f.write_str("Scanner cover is open"),
            Status::IoError => f.write_str("Error during device I/O"),
            Status::NoMem => f.write_str("Out of memory"),
            Status::AccessDenied => f.write_str("Access to resource has been denied"),
            Status::Other(code) => write!(f, "Unknown SANE status code {}", code),
        }
    }
}

/// A device found during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Backend-qualified device name, used to open the device
    pub name: String,
    /// Vendor string
    pub vendor: String,
    /// Model string
    pub model: String,
    /// Device type, e.g. "flatbed scanner"
    pub kind: String,
}

impl DeviceDescriptor {
    /// Creates a descriptor carrying only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vendor: String::new(),
            model: String::new(),
            kind: String::new(),
        }
    }
}

/// The value type an option declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Boolean flag
    Bool,
    /// 32-bit signed integer
    Int,
    /// Fixed-point number, handled as `f64`
    Float,
    /// Text
    String,
}

impl OptionKind {
    /// Phrase used in parse errors: "not an integer", "not a string", ...
    pub fn describe(self) -> &'static str {
        match self {
            OptionKind::Bool => "a boolean",
            OptionKind::Int => "an integer",
            OptionKind::Float => "a floating point value",
            OptionKind::String => "a string",
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptionKind::Bool => "boolean",
            OptionKind::Int => "integer",
            OptionKind::Float => "floating point",
            OptionKind::String => "string",
        })
    }
}

/// A typed option value
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i32),
    /// Fixed-point value
    Float(f64),
    /// String value
    String(String),
}

impl OptionValue {
    /// Returns the kind of this value
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Bool(_) => OptionKind::Bool,
            OptionValue::Int(_) => OptionKind::Int,
            OptionValue::Float(_) => OptionKind::Float,
            OptionValue::String(_) => OptionKind::String,
        }
    }

    /// Returns the value as a number, if it is one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Int(v) => Some(f64::from(*v)),
            OptionValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{}", u8::from(*v)),
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::Float(v) => write!(f, "{}", Significant(*v)),
            OptionValue::String(v) => f.write_str(v),
        }
    }
}

/// Converts 16.16 fixed-point to floating point
pub fn fixed_to_f64(value: i32) -> f64 {
    f64::from(value) / 65536.0
}

/// Converts floating point to 16.16 fixed-point, saturating at the bounds
pub fn f64_to_fixed(value: f64) -> i32 {
    (value * 65536.0).round() as i32
}

/// Formats a float with six significant digits, like C's `%g`.
///
/// Fixed-point values rarely convert to short decimals, so `215.9` read back
/// from a device is `215.89999389648438`; this prints it as `215.9`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Significant(pub f64);

impl Significant {
    const PRECISION: usize = 6;
}

impl fmt::Display for Significant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;
        if value.is_nan() {
            return f.write_str("nan");
        }
        if value.is_infinite() {
            return f.write_str(if value < 0.0 { "-inf" } else { "inf" });
        }
        if value == 0.0 {
            return f.write_str(if value.is_sign_negative() { "-0" } else { "0" });
        }

        // The exponent is taken after rounding to the kept digits
        let scientific = format!("{:.*e}", Self::PRECISION - 1, value);
        let Some((mantissa, exponent)) = scientific.split_once('e') else {
            return write!(f, "{}", value);
        };
        let exponent: i32 = exponent.parse().unwrap_or(0);

        if exponent < -4 || exponent >= Self::PRECISION as i32 {
            let sign = if exponent < 0 { '-' } else { '+' };
            write!(
                f,
                "{}e{}{:02}",
                trim_fraction(mantissa),
                sign,
                exponent.unsigned_abs()
            )
        } else {
            let decimals = (Self::PRECISION as i32 - 1 - exponent) as usize;
            f.write_str(trim_fraction(&format!("{:.*}", decimals, value)))
        }
    }
}

fn trim_fraction(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

/// The set of legal values an option accepts
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Any value of the declared kind
    None,
    /// Integer range with a step quantum (0 = continuous)
    IntRange {
        /// Lower bound
        min: i32,
        /// Upper bound
        max: i32,
        /// Step
        quant: i32,
    },
    /// Fixed-point range with a step quantum (0 = continuous)
    FloatRange {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
        /// Step
        quant: f64,
    },
    /// Enumerated integers
    IntList(Vec<i32>),
    /// Enumerated fixed-point values
    FloatList(Vec<f64>),
    /// Enumerated strings
    StringList(Vec<String>),
}

/// One configurable device setting
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDescriptor {
    /// Position in the device's option array
    pub index: u32,
    /// Machine name, the key for get/set
    pub name: String,
    /// Human-readable title
    pub title: String,
    /// Longer description
    pub description: String,
    /// Declared value type
    pub kind: OptionKind,
    /// Value size in bytes as declared by the device
    pub size: u32,
    /// Whether software may change the value
    pub readonly: bool,
    /// Whether the option is currently inactive
    pub inactive: bool,
    /// Legal values
    pub constraint: Constraint,
}

impl OptionDescriptor {
    /// Rejects a value whose kind differs from the declared kind
    pub fn check_value(&self, value: &OptionValue) -> Result<()> {
        if value.kind() == self.kind {
            Ok(())
        } else {
            Err(Error::ValueKindMismatch {
                name: self.name.clone(),
                expected: self.kind,
                found: value.kind(),
            })
        }
    }
}

/// Flags returned by a successful set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetInfo {
    /// The device rounded the value
    pub inexact: bool,
    /// Other option descriptors may have changed
    pub reload_options: bool,
    /// Scan parameters may have changed
    pub reload_params: bool,
}

impl SetInfo {
    const INEXACT: u32 = 1;
    const RELOAD_OPTIONS: u32 = 2;
    const RELOAD_PARAMS: u32 = 4;

    /// Decodes the SANE info bitmask
    pub fn from_bits(bits: u32) -> Self {
        Self {
            inexact: bits & Self::INEXACT != 0,
            reload_options: bits & Self::RELOAD_OPTIONS != 0,
            reload_params: bits & Self::RELOAD_PARAMS != 0,
        }
    }
}

/// Pixel encoding reported for the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// Single-channel gray
    Gray,
    /// Interleaved RGB
    Rgb,
    /// Red channel of a three-pass scan
    Red,
    /// Green channel of a three-pass scan
    Green,
    /// Blue channel of a three-pass scan
    Blue,
    /// A code outside the standard set
    Other(u32),
}

impl From<u32> for FrameFormat {
    fn from(code: u32) -> Self {
        match code {
            0 => FrameFormat::Gray,
            1 => FrameFormat::Rgb,
            2 => FrameFormat::Red,
            3 => FrameFormat::Green,
            4 => FrameFormat::Blue,
            other => FrameFormat::Other(other),
        }
    }
}

impl FrameFormat {
    /// Returns the numeric code defined by the standard
    pub fn code(self) -> u32 {
        match self {
            FrameFormat::Gray => 0,
            FrameFormat::Rgb => 1,
            FrameFormat::Red => 2,
            FrameFormat::Green => 3,
            FrameFormat::Blue => 4,
            FrameFormat::Other(code) => code,
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFormat::Gray => f.write_str("gray"),
            FrameFormat::Rgb => f.write_str("rgb"),
            FrameFormat::Red => f.write_str("red"),
            FrameFormat::Green => f.write_str("green"),
            FrameFormat::Blue => f.write_str("blue"),
            FrameFormat::Other(code) => write!(f, "unknown ({})", code),
        }
    }
}

/// Color space of an acquired image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// One sample per pixel
    Gray,
    /// Three samples per pixel
    Rgb,
}

impl ColorSpace {
    /// Samples per pixel
    pub fn channels(self) -> usize {
        match self {
            ColorSpace::Gray => 1,
            ColorSpace::Rgb => 3,
        }
    }
}

impl TryFrom<FrameFormat> for ColorSpace {
    type Error = Error;

    fn try_from(format: FrameFormat) -> Result<Self> {
        match format {
            FrameFormat::Gray => Ok(ColorSpace::Gray),
            FrameFormat::Rgb => Ok(ColorSpace::Rgb),
            other => Err(Error::UnsupportedFrameFormat { format: other }),
        }
    }
}

/// Image geometry and encoding, valid once a scan has started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParameters {
    /// Frame format
    pub format: FrameFormat,
    /// Whether this is the last frame of the image
    pub last_frame: bool,
    /// Bytes per scan line, including any padding
    pub bytes_per_line: usize,
    /// Pixels per scan line
    pub pixels_per_line: usize,
    /// Number of lines, negative when the device cannot tell in advance
    pub lines: i32,
    /// Bits per sample
    pub depth: u32,
}

impl ScanParameters {
    /// Number of lines, if known
    pub fn line_count(&self) -> Option<usize> {
        usize::try_from(self.lines).ok()
    }

    /// Bytes the device will deliver, if the line count is known
    pub fn expected_len(&self) -> Option<usize> {
        self.line_count()
            .and_then(|lines| lines.checked_mul(self.bytes_per_line))
    }

    /// Fills in an unknown line count from the number of bytes received
    pub fn with_received(mut self, received: usize) -> Self {
        if self.lines < 0 && self.bytes_per_line > 0 {
            self.lines = i32::try_from(received / self.bytes_per_line).unwrap_or(i32::MAX);
        }
        self
    }
}

/// Access to SANE devices
///
/// One backend holds at most one open device. Option calls, `start`,
/// `parameters`, `read` and `cancel` all address that device.
pub trait Backend {
    /// Enumerates the reachable devices
    fn devices(&mut self) -> Result<Vec<DeviceDescriptor>>;

    /// Opens a device by name
    fn open(&mut self, name: &str) -> Result<()>;

    /// Lists the value-bearing options of the open device, in device order
    fn options(&mut self) -> Result<Vec<OptionDescriptor>>;

    /// Reads the current value of an option
    fn get_option(&mut self, name: &str) -> Result<OptionValue>;

    /// Pushes a new value for an option
    ///
    /// The value kind must match the option's declared kind exactly.
    fn set_option(&mut self, name: &str, value: &OptionValue) -> Result<SetInfo>;

    /// Begins acquisition
    fn start(&mut self) -> Result<()>;

    /// Image parameters for the scan in progress
    fn parameters(&mut self) -> Result<ScanParameters>;

    /// Reads the next run of raster bytes into `buf`
    ///
    /// Returns `Ok(None)` once the device signals end-of-data. Sixteen-bit
    /// samples are delivered in host byte order.
    fn read(&mut self, buf: &mut [u8]) -> Result<Option<usize>>;

    /// Ends the current scan cycle
    fn cancel(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::from(5), Status::Eof);
        assert_eq!(Status::from(42), Status::Other(42));
        assert_eq!(Status::DeviceBusy.code(), 3);
        assert_eq!(Status::NoDocs.to_string(), "Document feeder out of documents");
    }

    #[test]
    fn test_color_space_from_frame() {
        assert_eq!(ColorSpace::try_from(FrameFormat::Gray).unwrap(), ColorSpace::Gray);
        assert_eq!(ColorSpace::try_from(FrameFormat::Rgb).unwrap(), ColorSpace::Rgb);
        assert!(matches!(
            ColorSpace::try_from(FrameFormat::Red),
            Err(Error::UnsupportedFrameFormat { .. })
        ));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(OptionValue::Bool(true).to_string(), "1");
        assert_eq!(OptionValue::Bool(false).to_string(), "0");
        assert_eq!(OptionValue::Float(3.5).to_string(), "3.5");
        assert_eq!(OptionValue::Int(-7).to_string(), "-7");
    }

    #[test]
    fn test_fixed_point_values_print_six_digits() {
        let width = fixed_to_f64(f64_to_fixed(215.9));
        assert_ne!(width, 215.9);
        assert_eq!(OptionValue::Float(width).to_string(), "215.9");
        assert_eq!(OptionValue::Float(fixed_to_f64(f64_to_fixed(25.4))).to_string(), "25.4");
        assert_eq!(fixed_to_f64(0x0001_8000), 1.5);
        assert_eq!(f64_to_fixed(1.5), 0x0001_8000);
    }

    #[test]
    fn test_significant_matches_printf_g() {
        let cases = [
            (0.0, "0"),
            (100.0, "100"),
            (-2.5, "-2.5"),
            (1.0 / 3.0, "0.333333"),
            (123456.0, "123456"),
            (1234567.0, "1.23457e+06"),
            (999999.5, "1e+06"),
            (0.0001, "0.0001"),
            (0.00001234, "1.234e-05"),
            (1.52587890625e-5, "1.52588e-05"),
        ];
        for (value, expected) in cases {
            assert_eq!(Significant(value).to_string(), expected, "{}", value);
        }
    }

    #[test]
    fn test_check_value() {
        let option = OptionDescriptor {
            index: 1,
            name: "resolution".into(),
            title: "Scan resolution".into(),
            description: String::new(),
            kind: OptionKind::Int,
            size: 4,
            readonly: false,
            inactive: false,
            constraint: Constraint::None,
        };
        assert!(option.check_value(&OptionValue::Int(300)).is_ok());
        assert!(matches!(
            option.check_value(&OptionValue::Float(300.0)),
            Err(Error::ValueKindMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_line_count() {
        let params = ScanParameters {
            format: FrameFormat::Gray,
            last_frame: true,
            bytes_per_line: 10,
            pixels_per_line: 10,
            lines: -1,
            depth: 8,
        };
        assert_eq!(params.expected_len(), None);
        assert_eq!(params.with_received(95).lines, 9);

        let huge = ScanParameters {
            lines: i32::MAX,
            bytes_per_line: usize::MAX / 2,
            ..params
        };
        assert_eq!(huge.expected_len(), None);
    }

    #[test]
    fn test_set_info_bits() {
        let info = SetInfo::from_bits(6);
        assert!(!info.inexact);
        assert!(info.reload_options);
        assert!(info.reload_params);
    }
}
