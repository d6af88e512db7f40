//! Input and output reports for a wired DualSense controller over Linux hidraw.
//!
//! Open a [`Connection`], read a [`RawReport`] each cycle, feed it to
//! [`DeviceState::update`], and send feedback with [`Connection::send`].

pub mod connection;
pub mod discovery;
pub mod error;
pub mod hidraw;
pub mod output;
pub mod report;
pub mod rolling;
pub mod state;

pub use connection::{Connection, RawReport};
pub use discovery::{Bus, DeviceEvent, DeviceInfo};
pub use error::{Error, Result};
pub use hidraw::HidDevice;
pub use output::{MicLed, OutputCommand, Rgb, OUTPUT_REPORT_SIZE};
pub use report::REPORT_SIZE;
pub use rolling::RollingWindow;
pub use state::{
    Battery, BatteryStatus, Buttons, DecoderConfig, DeviceState, Dpad, InputReport, MotionSample,
    Sticks, TouchContact, Triggers,
};

/// Sony Interactive Entertainment.
pub const SONY_VENDOR_ID: u16 = 0x054C;
/// DualSense over USB.
pub const DUALSENSE_PRODUCT_ID: u16 = 0x0CE6;
