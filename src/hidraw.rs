use nix::{ioctl_read, ioctl_read_buf};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;

// From uapi/linux/hid.h
const HID_MAX_DESCRIPTOR_SIZE: usize = 4096;

// From uapi/linux/hidraw.h
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct hidraw_report_descriptor {
    size: u32,
    value: [u8; HID_MAX_DESCRIPTOR_SIZE],
}

#[allow(non_camel_case_types)]
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct hidraw_devinfo {
    bustype: u32,
    vendor: i16,
    product: i16,
}

ioctl_read!(hid_read_descriptor_size, b'H', 0x01, libc::c_int);
ioctl_read!(hid_read_descriptor, b'H', 0x02, hidraw_report_descriptor);
ioctl_read!(hid_read_raw_info, b'H', 0x03, hidraw_devinfo);
ioctl_read_buf!(hid_read_raw_name, b'H', 0x04, u8);

/// A transport that moves whole HID reports.
///
/// Each call transfers at most one report. Implementations block until the
/// transfer completes or fails.
pub trait HidDevice: Send {
    fn read_report(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_report(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// Identity reported by the kernel for an open hidraw node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInfo {
    pub bus_type: u32,
    pub vendor_id: u16,
    pub product_id: u16,
}

/// A `/dev/hidrawN` node opened for blocking reads and writes.
#[derive(Debug)]
pub struct HidrawDevice {
    file: File,
}

impl HidrawDevice {
    pub fn open(path: &Path) -> io::Result<HidrawDevice> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(HidrawDevice { file })
    }

    pub fn raw_info(&self) -> io::Result<RawInfo> {
        let mut info = hidraw_devinfo::default();
        unsafe {
            hid_read_raw_info(self.file.as_raw_fd(), &mut info)?;
        }
        // The kernel stores the ids as __s16.
        Ok(RawInfo {
            bus_type: info.bustype,
            vendor_id: info.vendor as u16,
            product_id: info.product as u16,
        })
    }

    pub fn raw_name(&self) -> io::Result<String> {
        let mut buf = [0u8; 256];
        let len = unsafe { hid_read_raw_name(self.file.as_raw_fd(), &mut buf)? };
        let name = &buf[..(len.max(0) as usize).min(buf.len())];
        let name = name.split(|&b| b == 0).next().unwrap_or_default();
        Ok(String::from_utf8_lossy(name).into_owned())
    }

    /// Fetch the HID report descriptor.
    pub fn report_descriptor(&self) -> io::Result<Vec<u8>> {
        let fd = self.file.as_raw_fd();
        let mut desc = hidraw_report_descriptor {
            size: 0,
            value: [0; HID_MAX_DESCRIPTOR_SIZE],
        };
        unsafe {
            let mut size = 0;
            hid_read_descriptor_size(fd, &mut size)?;
            desc.size = size as u32;
            hid_read_descriptor(fd, &mut desc)?;
        }
        let len = (desc.size as usize).min(HID_MAX_DESCRIPTOR_SIZE);
        Ok(desc.value[..len].to_owned())
    }
}

impl HidDevice for HidrawDevice {
    fn read_report(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write_report(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }
}
