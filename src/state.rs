use num_enum::{FromPrimitive, IntoPrimitive};

use crate::rolling::RollingWindow;

/// Digital buttons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buttons {
    pub triangle: bool,
    pub circle: bool,
    pub cross: bool,
    pub square: bool,
    pub l1: bool,
    pub r1: bool,
    /// L2 pressed past the digital threshold.
    pub l2: bool,
    pub r2: bool,
    pub share: bool,
    pub options: bool,
    pub l3: bool,
    pub r3: bool,
    pub ps: bool,
    /// Touchpad clicked down.
    pub touchpad: bool,
    pub mic: bool,
}

/// Directional pad. Diagonals set two flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dpad {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Dpad {
    pub const CENTERED: Dpad = Dpad::new(false, false, false, false);

    pub const fn new(up: bool, down: bool, left: bool, right: bool) -> Dpad {
        Dpad {
            up,
            down,
            left,
            right,
        }
    }

    pub fn is_centered(&self) -> bool {
        *self == Dpad::CENTERED
    }
}

/// Stick positions relative to center: raw byte minus 127.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sticks {
    pub lx: i16,
    pub ly: i16,
    pub rx: i16,
    pub ry: i16,
}

/// Analog trigger pressure, 0-255.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Triggers {
    pub l2: u8,
    pub r2: u8,
}

/// One finger slot on the touchpad.
///
/// `x` and `y` are 12-bit values and only mean something while `active`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchContact {
    pub active: bool,
    /// Tracking id, bumped by the controller each time a finger lands.
    pub id: u8,
    pub x: u16,
    pub y: u16,
}

/// One reading from a three-axis motion sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// Charge state from the high nibble of the battery byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum BatteryStatus {
    Discharging = 0x0,
    Charging = 0x1,
    Full = 0x2,
    TemperatureOrVoltageOutOfRange = 0xA,
    NotCharging = 0xB,
    Error = 0xF,
    #[num_enum(default)]
    Unknown = 0xFF,
}

impl Default for BatteryStatus {
    fn default() -> Self {
        BatteryStatus::Unknown
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Battery {
    pub status: BatteryStatus,
    /// Charge percentage, 5-100 once a report has been decoded.
    pub level: u8,
}

impl Battery {
    /// Decode the battery byte: status from the high nibble, level from the low one.
    pub fn from_byte(byte: u8) -> Battery {
        let status = BatteryStatus::from((byte & 0xF0) >> 4);
        let level = ((byte & 0x0F) * 10 + 5).min(100);
        Battery { status, level }
    }
}

/// Everything decoded from a single input report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputReport {
    pub buttons: Buttons,
    pub dpad: Dpad,
    pub sticks: Sticks,
    pub triggers: Triggers,
    pub touch: [TouchContact; 2],
    pub accelerometer: MotionSample,
    /// Pitch, yaw and roll in `x`, `y` and `z`.
    pub gyrometer: MotionSample,
    pub battery: Battery,
}

/// How much history to keep per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    pub touch_history: usize,
    pub motion_history: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            touch_history: 1,
            motion_history: 1,
        }
    }
}

/// History of one touchpad slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchSlot {
    pub active: bool,
    pub id: u8,
    /// `(x, y)` pairs, appended every report whether or not the slot is active.
    pub history: RollingWindow<(u16, u16)>,
}

impl TouchSlot {
    fn new(capacity: usize) -> TouchSlot {
        TouchSlot {
            active: false,
            id: 0,
            history: RollingWindow::new(capacity),
        }
    }

    fn push(&mut self, contact: &TouchContact) {
        self.active = contact.active;
        self.id = contact.id;
        self.history.push((contact.x, contact.y));
    }

    /// The most recent contact, or `None` before the first report.
    pub fn contact(&self) -> Option<TouchContact> {
        self.history.latest().map(|&(x, y)| TouchContact {
            active: self.active,
            id: self.id,
            x,
            y,
        })
    }
}

/// Per-axis history of a motion sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionHistory {
    pub x: RollingWindow<i16>,
    pub y: RollingWindow<i16>,
    pub z: RollingWindow<i16>,
}

impl MotionHistory {
    fn new(capacity: usize) -> MotionHistory {
        MotionHistory {
            x: RollingWindow::new(capacity),
            y: RollingWindow::new(capacity),
            z: RollingWindow::new(capacity),
        }
    }

    fn push(&mut self, sample: &MotionSample) {
        self.x.push(sample.x);
        self.y.push(sample.y);
        self.z.push(sample.z);
    }

    pub fn latest(&self) -> Option<MotionSample> {
        Some(MotionSample {
            x: *self.x.latest()?,
            y: *self.y.latest()?,
            z: *self.z.latest()?,
        })
    }

    /// Per-axis mean over the window.
    pub fn mean(&self) -> Option<(f64, f64, f64)> {
        Some((self.x.mean()?, self.y.mean()?, self.z.mean()?))
    }
}

/// The caller-owned view of the controller, updated once per polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub buttons: Buttons,
    pub dpad: Dpad,
    pub sticks: Sticks,
    pub triggers: Triggers,
    pub touch: [TouchSlot; 2],
    pub accelerometer: MotionHistory,
    /// Pitch, yaw and roll in `x`, `y` and `z`.
    pub gyrometer: MotionHistory,
    pub battery: Battery,
}

impl DeviceState {
    pub fn new(config: DecoderConfig) -> DeviceState {
        DeviceState {
            buttons: Buttons::default(),
            dpad: Dpad::default(),
            sticks: Sticks::default(),
            triggers: Triggers::default(),
            touch: [
                TouchSlot::new(config.touch_history),
                TouchSlot::new(config.touch_history),
            ],
            accelerometer: MotionHistory::new(config.motion_history),
            gyrometer: MotionHistory::new(config.motion_history),
            battery: Battery::default(),
        }
    }

    /// Copy a decoded report into the state, appending to every history window.
    pub fn apply(&mut self, report: &InputReport) {
        self.buttons = report.buttons;
        self.dpad = report.dpad;
        self.sticks = report.sticks;
        self.triggers = report.triggers;
        self.apply_touch(&report.touch);
        self.accelerometer.push(&report.accelerometer);
        self.gyrometer.push(&report.gyrometer);
        self.battery = report.battery;
    }

    pub(crate) fn apply_touch(&mut self, contacts: &[TouchContact; 2]) {
        for (slot, contact) in self.touch.iter_mut().zip(contacts) {
            slot.push(contact);
        }
    }

    pub(crate) fn apply_accelerometer(&mut self, sample: &MotionSample) {
        self.accelerometer.push(sample);
    }

    pub(crate) fn apply_gyrometer(&mut self, sample: &MotionSample) {
        self.gyrometer.push(sample);
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        DeviceState::new(DecoderConfig::default())
    }
}
