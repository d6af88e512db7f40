use futures::Future;
use futures_util::StreamExt;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use tokio::sync::mpsc::Sender;
use tokio::task::LocalSet;
use tokio_udev::{AsyncMonitorSocket, Device, Enumerator, EventType, MonitorBuilder};

use crate::error::{Error, Result};

// From Linux uapi/linux/input.h
const USB: u16 = 3;
const BLUETOOTH: u16 = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bus {
    Usb,
    Bluetooth,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub sys_path: PathBuf,
    pub device_node: PathBuf,
    pub bus: Bus,
    pub name: String,
    pub serial: String,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceInfo {
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

#[derive(Debug)]
pub enum DeviceEvent {
    Added(DeviceInfo),
    Removed(PathBuf),
}

fn spliteq(s: &str) -> Option<(&str, &str)> {
    let mut bits = s.splitn(2, '=');
    Some((bits.next()?, bits.next()?))
}

/// Parse uevent's `HID_ID` string into bus type, vendor id, product id.
///
/// Returns `None` for unsupported bus types.
fn parse_id(id: &str) -> Option<(Bus, u16, u16)> {
    let mut bits = id.splitn(3, ':');
    let bus = match u16::from_str_radix(bits.next()?, 16).ok()? {
        BLUETOOTH => Bus::Bluetooth,
        USB => Bus::Usb,
        _ => return None,
    };
    let vid = u16::from_str_radix(bits.next()?, 16).ok()?;
    let pid = u16::from_str_radix(bits.next()?, 16).ok()?;
    Some((bus, vid, pid))
}

/// Pull bus, ids, name and serial out of the HID parent's `uevent` text.
fn parse_uevent(uevent: &str) -> Option<(Bus, u16, u16, String, String)> {
    let mut id = None;
    let mut name = None;
    let mut serial = None;
    for line in uevent.lines() {
        if let Some((key, value)) = spliteq(line) {
            match key {
                "HID_ID" => id = parse_id(value),
                "HID_NAME" => name = Some(value.to_owned()),
                "HID_UNIQ" => serial = Some(value.to_owned()),
                _ => {}
            }
        }
    }
    let (bus, vendor_id, product_id) = id?;
    Some((bus, vendor_id, product_id, name?, serial?))
}

fn get_device_info(device: &Device) -> io::Result<DeviceInfo> {
    let missing = |what: &str| io::Error::new(io::ErrorKind::NotFound, what.to_owned());
    let sys_path = device.syspath().to_owned();
    let device_node = device
        .devnode()
        .ok_or_else(|| missing("Missing device node"))?
        .to_owned();
    let hid_parent = device
        .parent_with_subsystem("hid")?
        .ok_or_else(|| missing("Couldn't find HID parent device"))?;
    let uevent = hid_parent
        .attribute_value("uevent")
        .ok_or_else(|| missing("Couldn't read uevent attribute"))?
        // Strings exposed by the HID driver should be UTF-8; at worst the
        // name ends up with replacement characters.
        .to_string_lossy();
    let (bus, vendor_id, product_id, name, serial) =
        parse_uevent(&uevent).ok_or_else(|| missing("Couldn't find enough info"))?;
    Ok(DeviceInfo {
        sys_path,
        device_node,
        bus,
        name,
        serial,
        vendor_id,
        product_id,
    })
}

/// Enumerate every hidraw node whose HID parent could be identified.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let mut enumerator = Enumerator::new()?;
    enumerator.match_subsystem("hidraw")?;
    let mut devices = Vec::new();
    for device in enumerator.scan_devices()? {
        match get_device_info(&device) {
            Ok(info) => devices.push(info),
            Err(e) => debug!("Skipping {:?}: {}", device.syspath(), e),
        }
    }
    Ok(devices)
}

/// Find the first hidraw node for `vendor_id:product_id`.
pub fn find_device(vendor_id: u16, product_id: u16) -> Result<DeviceInfo> {
    list_devices()?
        .into_iter()
        .find(|info| info.matches(vendor_id, product_id))
        .ok_or(Error::DeviceNotFound {
            vendor_id,
            product_id,
        })
}

async fn monitor_devices_internal(
    vendor_id: u16,
    product_id: u16,
    tx: Sender<DeviceEvent>,
) -> anyhow::Result<()> {
    info!("Starting monitor_devices_internal");
    // Remember what we reported so removals of other devices can be ignored.
    let mut devices = HashSet::new();
    for info in list_devices()? {
        if info.matches(vendor_id, product_id) {
            devices.insert(info.sys_path.clone());
            tx.send(DeviceEvent::Added(info)).await?;
        }
    }

    let socket = MonitorBuilder::new()?.match_subsystem("hidraw")?.listen()?;
    let mut monitor = AsyncMonitorSocket::new(socket)?;

    while let Some(event) = monitor.next().await {
        let event = event?;
        let syspath = event.syspath();
        match event.event_type() {
            EventType::Add => match get_device_info(&event) {
                Ok(info) if info.matches(vendor_id, product_id) => {
                    devices.insert(info.sys_path.clone());
                    tx.send(DeviceEvent::Added(info)).await?;
                }
                Ok(info) => debug!("Ignoring {:04x}:{:04x}", info.vendor_id, info.product_id),
                Err(e) => debug!("Ignoring {:?}: {}", syspath, e),
            },
            EventType::Remove => {
                if devices.remove(syspath) {
                    tx.send(DeviceEvent::Removed(syspath.to_owned())).await?;
                } else {
                    debug!("Remove event for unwatched device: {:?}", syspath);
                }
            }
            _ => {}
        }
    }
    warn!("udev monitor stream ended");
    Ok(())
}

/// Watch hidraw devices matching `vendor_id:product_id` via udev.
///
/// Sends a DeviceEvent::Added for each matching device already present or
/// plugged in later, and a DeviceEvent::Removed once such a device goes away.
pub fn monitor_devices(
    vendor_id: u16,
    product_id: u16,
    tx: Sender<DeviceEvent>,
) -> impl Future<Output = ()> {
    info!("Starting monitor_devices for {vendor_id:04x}:{product_id:04x}");
    // The tokio-udev types are !Send, so we need to run them on a LocalSet.
    let local = LocalSet::new();
    local.spawn_local(async move {
        if let Err(e) = monitor_devices_internal(vendor_id, product_id, tx).await {
            warn!("Device monitor failed: {e:#}");
        }
    });
    local
}
