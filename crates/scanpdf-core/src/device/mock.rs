//! Scriptable in-memory backend for tests.

use super::{
    Backend, Constraint, DeviceDescriptor, FrameFormat, OptionDescriptor, OptionKind,
    OptionValue, ScanParameters, SetInfo, Status,
};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug)]
pub(crate) struct MockBackend {
    pub(crate) devices: Vec<DeviceDescriptor>,
    pub(crate) devices_status: Option<Status>,
    pub(crate) options: Vec<OptionDescriptor>,
    pub(crate) values: HashMap<String, OptionValue>,
    pub(crate) unreadable: HashSet<String>,
    pub(crate) rejected: HashSet<String>,
    pub(crate) start_status: Option<Status>,
    pub(crate) parameters: ScanParameters,
    pub(crate) chunks: VecDeque<Vec<u8>>,
    pub(crate) read_failure: Option<Status>,
    pub(crate) opened: Option<String>,
    pub(crate) scanning: bool,
    pub(crate) cancelled: bool,
    pub(crate) sets: Vec<(String, OptionValue)>,
}

impl MockBackend {
    pub(crate) fn new(device_names: &[&str]) -> Self {
        Self {
            devices: device_names
                .iter()
                .map(|name| DeviceDescriptor::named(*name))
                .collect(),
            devices_status: None,
            options: Vec::new(),
            values: HashMap::new(),
            unreadable: HashSet::new(),
            rejected: HashSet::new(),
            start_status: None,
            parameters: ScanParameters {
                format: FrameFormat::Gray,
                last_frame: true,
                bytes_per_line: 0,
                pixels_per_line: 0,
                lines: 0,
                depth: 8,
            },
            chunks: VecDeque::new(),
            read_failure: None,
            opened: None,
            scanning: false,
            cancelled: false,
            sets: Vec::new(),
        }
    }

    pub(crate) fn with_option(
        mut self,
        name: &str,
        kind: OptionKind,
        constraint: Constraint,
        value: OptionValue,
    ) -> Self {
        let size = match &value {
            OptionValue::String(_) => 32,
            _ => 4,
        };
        self.options.push(OptionDescriptor {
            index: self.options.len() as u32 + 1,
            name: name.to_string(),
            title: format!("{} title", name),
            description: String::new(),
            kind,
            size,
            readonly: false,
            inactive: false,
            constraint,
        });
        self.values.insert(name.to_string(), value);
        self
    }

    /// Scripts a gray or RGB raster of `lines` rows delivered in `chunk` sized pieces
    pub(crate) fn with_raster(
        mut self,
        format: FrameFormat,
        pixels_per_line: usize,
        lines: i32,
        depth: u32,
        data: Vec<u8>,
        chunk: usize,
    ) -> Self {
        let channels = if format == FrameFormat::Rgb { 3 } else { 1 };
        self.parameters = ScanParameters {
            format,
            last_frame: true,
            bytes_per_line: (pixels_per_line * channels * depth as usize).div_ceil(8),
            pixels_per_line,
            lines,
            depth,
        };
        self.chunks = data.chunks(chunk).map(<[u8]>::to_vec).collect();
        self
    }

    fn descriptor(&self, name: &str) -> Result<&OptionDescriptor> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .ok_or_else(|| Error::UnknownOption {
                name: name.to_string(),
            })
    }

    fn device_name(&self) -> String {
        self.opened.clone().unwrap_or_default()
    }
}

impl Backend for MockBackend {
    fn devices(&mut self) -> Result<Vec<DeviceDescriptor>> {
        match self.devices_status {
            Some(status) => Err(Error::DeviceList { status }),
            None => Ok(self.devices.clone()),
        }
    }

    fn open(&mut self, name: &str) -> Result<()> {
        if !self.devices.iter().any(|d| d.name == name) {
            return Err(Error::Open {
                device: name.to_string(),
                status: Status::Inval,
            });
        }
        self.opened = Some(name.to_string());
        Ok(())
    }

    fn options(&mut self) -> Result<Vec<OptionDescriptor>> {
        self.opened.as_ref().ok_or(Error::NotOpen)?;
        Ok(self.options.clone())
    }

    fn get_option(&mut self, name: &str) -> Result<OptionValue> {
        self.descriptor(name)?;
        if self.unreadable.contains(name) {
            return Err(Error::option_get(name, Status::Inval));
        }
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| Error::option_get(name, Status::Inval))
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> Result<SetInfo> {
        self.descriptor(name)?.check_value(value)?;
        if self.rejected.contains(name) {
            return Err(Error::option_set(name, Status::Inval));
        }
        self.values.insert(name.to_string(), value.clone());
        self.sets.push((name.to_string(), value.clone()));
        Ok(SetInfo::default())
    }

    fn start(&mut self) -> Result<()> {
        if let Some(status) = self.start_status {
            return Err(Error::Start {
                device: self.device_name(),
                status,
            });
        }
        self.scanning = true;
        Ok(())
    }

    fn parameters(&mut self) -> Result<ScanParameters> {
        Ok(self.parameters)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        if !self.scanning {
            return Err(Error::NotScanning);
        }
        match self.chunks.pop_front() {
            Some(chunk) => {
                assert!(chunk.len() <= buf.len(), "mock chunk larger than read buffer");
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(Some(chunk.len()))
            }
            None => match self.read_failure {
                Some(status) => Err(Error::ReadInterrupted { status }),
                None => Ok(None),
            },
        }
    }

    fn cancel(&mut self) -> Result<()> {
        self.scanning = false;
        self.cancelled = true;
        Ok(())
    }
}
