//! [`Backend`] over the system SANE library.
//!
//! [`SaneBackend`] drives `libsane` through the `sane-scan` bindings, so it
//! sees every local device the installed backends can reach, USB and SCSI
//! scanners included. The bindings enumerate with `local_only` set, so
//! devices behind the `net` backend are not listed.
//!
//! The library is initialized when the backend is created and shut down
//! when it is dropped. The open device handle is closed first.

use super::{
    fixed_to_f64, f64_to_fixed, Backend, Constraint, DeviceDescriptor, FrameFormat,
    OptionDescriptor, OptionKind, OptionValue, ScanParameters, SetInfo, Status,
};
use crate::error::{Error, Result};
use sane_scan as sane;
use std::ffi::{CStr, CString};
use std::fmt;
use tracing::{debug, info, trace};

/// Bytes in a SANE word; every bool, int and fixed value occupies one
const WORD_SIZE: u32 = 4;

/// Where the open device is in its scan cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Idle,
    Reading,
    /// End-of-data was reached; the library has already ended the cycle
    Drained,
}

struct OpenDevice {
    name: String,
    handle: sane::DeviceHandle,
    /// Descriptors as last fetched, group and button entries included
    options: Vec<sane::DeviceOption>,
    scan: ScanState,
}

/// A session with the local SANE library
pub struct SaneBackend {
    // Declared before `sane` so the handle closes before the library exits
    device: Option<OpenDevice>,
    sane: sane::Sane,
}

impl fmt::Debug for SaneBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaneBackend")
            .field("device", &self.device.as_ref().map(|d| d.name.as_str()))
            .finish_non_exhaustive()
    }
}

impl SaneBackend {
    /// Initializes the SANE library
    pub fn init() -> Result<Self> {
        let sane = sane::Sane::init_1_0().map_err(|e| Error::Init {
            status: status_of(&e),
        })?;
        debug!("SANE library initialized");
        Ok(Self { device: None, sane })
    }

    fn open_device(&mut self) -> Result<&mut OpenDevice> {
        self.device.as_mut().ok_or(Error::NotOpen)
    }

    fn refresh_options(&mut self) -> Result<()> {
        let device = self.open_device()?;
        device.options = device.handle.get_options().map_err(|e| Error::Options {
            device: device.name.clone(),
            status: status_of(&e),
        })?;
        debug!("Fetched {} option descriptors", device.options.len());
        Ok(())
    }

    /// Finds a value-bearing option by name
    fn lookup(&self, name: &str) -> Result<&sane::DeviceOption> {
        self.device
            .as_ref()
            .ok_or(Error::NotOpen)?
            .options
            .iter()
            .find(|o| option_kind(o).is_some() && o.name.to_bytes() == name.as_bytes())
            .ok_or_else(|| Error::UnknownOption {
                name: name.to_string(),
            })
    }
}

fn open_handle(name: &str) -> Result<sane::DeviceHandle> {
    let open_error = |status| Error::Open {
        device: name.to_string(),
        status,
    };
    let device = sane::Device {
        name: CString::new(name).map_err(|_| open_error(Status::Inval))?,
        vendor: CString::default(),
        model: CString::default(),
        type_: CString::default(),
    };
    device.open().map_err(|e| open_error(status_of(&e)))
}

fn status_of(error: &sane::Error) -> Status {
    Status::from(error.0 as u32)
}

fn text(value: &CStr) -> String {
    value.to_string_lossy().into_owned()
}

fn option_kind(option: &sane::DeviceOption) -> Option<OptionKind> {
    match option.type_ {
        sane::ValueType::Bool => Some(OptionKind::Bool),
        sane::ValueType::Int => Some(OptionKind::Int),
        sane::ValueType::Fixed => Some(OptionKind::Float),
        sane::ValueType::String => Some(OptionKind::String),
        sane::ValueType::Button | sane::ValueType::Group => None,
    }
}

/// Rejects reads of options whose declared size cannot hold a value.
///
/// The library copies `size` bytes into the read buffer, so a zero-sized
/// string or a short word would be read past its end.
fn check_storage(option: &sane::DeviceOption, kind: OptionKind) -> Result<()> {
    let needed = match kind {
        OptionKind::String => 1,
        _ => WORD_SIZE,
    };
    if option.size < needed {
        return Err(Error::option_get(text(&option.name), Status::Inval));
    }
    Ok(())
}

fn describe(option: &sane::DeviceOption) -> Option<OptionDescriptor> {
    let kind = option_kind(option)?;
    let constraint = match &option.constraint {
        sane::OptionConstraint::None => Constraint::None,
        sane::OptionConstraint::Range { range, quant } if kind == OptionKind::Float => {
            Constraint::FloatRange {
                min: fixed_to_f64(range.start),
                max: fixed_to_f64(range.end),
                quant: fixed_to_f64(*quant),
            }
        }
        sane::OptionConstraint::Range { range, quant } => Constraint::IntRange {
            min: range.start,
            max: range.end,
            quant: *quant,
        },
        sane::OptionConstraint::WordList(words) if kind == OptionKind::Float => {
            Constraint::FloatList(words.iter().copied().map(fixed_to_f64).collect())
        }
        sane::OptionConstraint::WordList(words) => Constraint::IntList(words.clone()),
        sane::OptionConstraint::StringList(strings) => {
            Constraint::StringList(strings.iter().map(|s| text(s)).collect())
        }
    };

    Some(OptionDescriptor {
        index: option.option_idx as u32,
        name: text(&option.name),
        title: text(&option.title),
        description: text(&option.desc),
        kind,
        size: option.size,
        readonly: !option.cap.contains(sane::OptionCapability::SOFT_SELECT),
        inactive: option.cap.contains(sane::OptionCapability::INACTIVE),
        constraint,
    })
}

fn scan_parameters(parameters: &sane::Parameters) -> ScanParameters {
    ScanParameters {
        format: FrameFormat::from(parameters.format as u32),
        last_frame: parameters.last_frame != 0,
        bytes_per_line: usize::try_from(parameters.bytes_per_line).unwrap_or(0),
        pixels_per_line: usize::try_from(parameters.pixels_per_line).unwrap_or(0),
        lines: parameters.lines,
        depth: u32::try_from(parameters.depth).unwrap_or(0),
    }
}

impl Backend for SaneBackend {
    fn devices(&mut self) -> Result<Vec<DeviceDescriptor>> {
        let devices = self.sane.get_devices().map_err(|e| Error::DeviceList {
            status: status_of(&e),
        })?;
        Ok(devices
            .iter()
            .map(|device| {
                let device = DeviceDescriptor {
                    name: text(&device.name),
                    vendor: text(&device.vendor),
                    model: text(&device.model),
                    kind: text(&device.type_),
                };
                debug!(
                    "Found {} ({} {}, {})",
                    device.name, device.vendor, device.model, device.kind
                );
                device
            })
            .collect())
    }

    fn open(&mut self, name: &str) -> Result<()> {
        // Dropping the previous handle closes it
        self.device = None;
        let handle = open_handle(name)?;
        info!("Opened {}", name);
        self.device = Some(OpenDevice {
            name: name.to_string(),
            handle,
            options: Vec::new(),
            scan: ScanState::Idle,
        });
        self.refresh_options()
    }

    fn options(&mut self) -> Result<Vec<OptionDescriptor>> {
        self.refresh_options()?;
        Ok(self
            .device
            .as_ref()
            .ok_or(Error::NotOpen)?
            .options
            .iter()
            .filter_map(describe)
            .collect())
    }

    fn get_option(&mut self, name: &str) -> Result<OptionValue> {
        let option = self.lookup(name)?;
        let kind = option_kind(option).ok_or_else(|| Error::UnknownOption {
            name: name.to_string(),
        })?;
        check_storage(option, kind)?;

        let device = self.device.as_ref().ok_or(Error::NotOpen)?;
        let value = device
            .handle
            .get_option(option)
            .map_err(|e| Error::option_get(name, status_of(&e)))?;
        match value {
            sane::DeviceOptionValue::Bool(v) => Ok(OptionValue::Bool(v)),
            sane::DeviceOptionValue::Int(v) => Ok(OptionValue::Int(v)),
            sane::DeviceOptionValue::Fixed(v) => Ok(OptionValue::Float(fixed_to_f64(v))),
            sane::DeviceOptionValue::String(v) => Ok(OptionValue::String(text(&v))),
            sane::DeviceOptionValue::Button | sane::DeviceOptionValue::Group => {
                Err(Error::option_get(name, Status::Inval))
            }
        }
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> Result<SetInfo> {
        let option = self.lookup(name)?;
        if let Some(descriptor) = describe(option) {
            descriptor.check_value(value)?;
        }

        let value = match value {
            OptionValue::Bool(v) => sane::DeviceOptionValue::Bool(*v),
            OptionValue::Int(v) => sane::DeviceOptionValue::Int(*v),
            OptionValue::Float(v) => sane::DeviceOptionValue::Fixed(f64_to_fixed(*v)),
            OptionValue::String(v) => sane::DeviceOptionValue::String(
                CString::new(v.as_str()).map_err(|_| Error::option_set(name, Status::Inval))?,
            ),
        };

        let device = self.device.as_ref().ok_or(Error::NotOpen)?;
        let info = device
            .handle
            .set_option(option, value)
            .map_err(|e| Error::option_set(name, status_of(&e)))?;
        let info = SetInfo::from_bits(info.bits());
        if info.reload_options {
            self.refresh_options()?;
        }
        Ok(info)
    }

    fn start(&mut self) -> Result<()> {
        let device = self.open_device()?;
        device.handle.start_scan().map_err(|e| Error::Start {
            device: device.name.clone(),
            status: status_of(&e),
        })?;
        device.scan = ScanState::Reading;
        Ok(())
    }

    fn parameters(&mut self) -> Result<ScanParameters> {
        let device = self.open_device()?;
        let parameters = device.handle.get_parameters().map_err(|e| Error::Parameters {
            device: device.name.clone(),
            status: status_of(&e),
        })?;
        Ok(scan_parameters(&parameters))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let device = self.open_device()?;
        match device.scan {
            ScanState::Idle => return Err(Error::NotScanning),
            ScanState::Drained => return Ok(None),
            ScanState::Reading => {}
        }

        let read = device.handle.read(buf).map_err(|e| Error::ReadInterrupted {
            status: status_of(&e),
        })?;
        if read.is_none() {
            trace!("End of image data");
            device.scan = ScanState::Drained;
        }
        Ok(read)
    }

    fn cancel(&mut self) -> Result<()> {
        let device = self.open_device()?;
        let state = std::mem::replace(&mut device.scan, ScanState::Idle);
        if state == ScanState::Reading {
            // The bindings only cancel from the handle's destructor, so a
            // scan cut short is ended by reopening the device
            debug!("Cancelling unfinished scan on {}", device.name);
            let name = device.name.clone();
            self.device = None;
            let handle = open_handle(&name)?;
            self.device = Some(OpenDevice {
                name,
                handle,
                options: Vec::new(),
                scan: ScanState::Idle,
            });
            self.refresh_options()?;
        }
        Ok(())
    }
}
