//! Lifecycle of a single controller connection.
//!
//! A [`Connection`] starts closed, holds at most one device while open, and
//! never retries or reconnects on its own. Every operation takes `&mut self`,
//! so one read or write is in flight at a time.

use log::{debug, info, trace, warn};
use std::io;
use std::ops::Deref;
use std::path::Path;

use crate::discovery::{self, DeviceInfo};
use crate::error::{Error, Result};
use crate::hidraw::{HidDevice, HidrawDevice};
use crate::output::OutputCommand;
use crate::report::REPORT_SIZE;

/// The bytes returned by one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReport(Box<[u8]>);

impl RawReport {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for RawReport {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for RawReport {
    fn from(bytes: Vec<u8>) -> Self {
        RawReport(bytes.into_boxed_slice())
    }
}

impl From<&[u8]> for RawReport {
    fn from(bytes: &[u8]) -> Self {
        RawReport(bytes.into())
    }
}

/// Classify a failure to open a hidraw node.
fn open_error(e: io::Error, path: &Path, vendor_id: u16, product_id: u16) -> Error {
    match e.kind() {
        io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.to_owned()),
        io::ErrorKind::NotFound => Error::DeviceNotFound {
            vendor_id,
            product_id,
        },
        _ => Error::Io(e),
    }
}

struct Open {
    info: DeviceInfo,
    device: Box<dyn HidDevice>,
}

#[derive(Default)]
pub struct Connection {
    open: Option<Open>,
}

impl Connection {
    pub fn new() -> Connection {
        Connection::default()
    }

    /// Find the hidraw node for `vendor_id:product_id` and open it.
    pub fn open(&mut self, vendor_id: u16, product_id: u16) -> Result<&DeviceInfo> {
        if self.open.is_some() {
            return Err(Error::AlreadyOpen);
        }
        let info = discovery::find_device(vendor_id, product_id)?;
        debug!("Matched {:?} for {:04x}:{:04x}", info.device_node, vendor_id, product_id);
        self.open_device(&info)
    }

    /// Open the exact node described by `info`.
    ///
    /// The kernel's view of the node must still match `info`'s ids.
    pub fn open_device(&mut self, info: &DeviceInfo) -> Result<&DeviceInfo> {
        if self.open.is_some() {
            return Err(Error::AlreadyOpen);
        }
        let (vendor_id, product_id) = (info.vendor_id, info.product_id);
        let device = HidrawDevice::open(&info.device_node)
            .map_err(|e| open_error(e, &info.device_node, vendor_id, product_id))?;

        let raw = device.raw_info()?;
        if raw.vendor_id != vendor_id || raw.product_id != product_id {
            warn!(
                "{:?} reports {:04x}:{:04x}, expected {:04x}:{:04x}",
                info.device_node, raw.vendor_id, raw.product_id, vendor_id, product_id
            );
            return Err(Error::DeviceNotFound {
                vendor_id,
                product_id,
            });
        }
        match device.report_descriptor() {
            Ok(descriptor) => debug!("HID descriptor is {} bytes", descriptor.len()),
            Err(e) => debug!("Couldn't read HID descriptor: {}", e),
        }
        if let Ok(name) = device.raw_name() {
            debug!("Kernel name: `{}`", name);
        }
        self.attach(info.clone(), Box::new(device))
    }

    /// Adopt a device that is already open.
    pub fn attach(&mut self, info: DeviceInfo, device: Box<dyn HidDevice>) -> Result<&DeviceInfo> {
        if self.open.is_some() {
            return Err(Error::AlreadyOpen);
        }
        info!(
            "Opened `{}` {:04x}:{:04x} on {:?} ({:?})",
            info.name, info.vendor_id, info.product_id, info.bus, info.device_node
        );
        let open = self.open.insert(Open { info, device });
        Ok(&open.info)
    }

    /// Release the device. Closing twice is fine.
    pub fn close(&mut self) {
        if let Some(open) = self.open.take() {
            info!("Closed `{}` ({:?})", open.info.name, open.info.device_node);
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn info(&self) -> Option<&DeviceInfo> {
        self.open.as_ref().map(|open| &open.info)
    }

    fn device(&mut self) -> Result<&mut Box<dyn HidDevice>> {
        self.open
            .as_mut()
            .map(|open| &mut open.device)
            .ok_or(Error::NotConnected)
    }

    /// Block until one report of `size` bytes arrives.
    ///
    /// A shorter report is returned as [`Error::ShortRead`]; the caller should
    /// drop it and read again.
    pub fn read(&mut self, size: usize) -> Result<RawReport> {
        let device = self.device()?;
        let mut buf = vec![0u8; size];
        let actual = device.read_report(&mut buf)?;
        if actual < size {
            return Err(Error::ShortRead {
                expected: size,
                actual,
            });
        }
        trace!("Read report: {:02x?}", buf);
        Ok(buf.into())
    }

    /// Read one full input report.
    pub fn read_report(&mut self) -> Result<RawReport> {
        self.read(REPORT_SIZE)
    }

    /// Hand `bytes` to the transport. Success does not mean the device acted on it.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let device = self.device()?;
        let written = device.write_report(bytes)?;
        trace!("Wrote {} of {} bytes", written, bytes.len());
        Ok(written)
    }

    pub fn send(&mut self, command: &OutputCommand) -> Result<usize> {
        self.write(&command.encode())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
