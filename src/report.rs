//! Decoding of the 64-byte USB input report.
//!
//! Offsets include the report ID at byte 0. Every accessor checks bounds, so a
//! truncated report yields [`Error::Decode`] instead of garbage, and the
//! `DeviceState::update*` methods only touch the state once parsing succeeded.

use crate::error::{Error, Result};
use crate::state::{
    Battery, Buttons, DeviceState, Dpad, InputReport, MotionSample, Sticks, TouchContact, Triggers,
};

/// Size of a USB input report, including the report ID.
pub const REPORT_SIZE: usize = 64;
/// Report ID of the USB input report.
pub const INPUT_REPORT_ID: u8 = 0x01;

const STICK_LX: usize = 1;
const STICK_LY: usize = 2;
const STICK_RX: usize = 3;
const STICK_RY: usize = 4;
const TRIGGER_L2: usize = 5;
const TRIGGER_R2: usize = 6;
/// Face buttons in the high nibble, d-pad in the low nibble.
const BUTTONS_DPAD: usize = 8;
const BUTTONS_MISC: usize = 9;
const BUTTONS_SYSTEM: usize = 10;
const ACCEL_X: usize = 16;
const ACCEL_Y: usize = 18;
const ACCEL_Z: usize = 20;
const GYRO_PITCH: usize = 22;
const GYRO_YAW: usize = 24;
const GYRO_ROLL: usize = 26;
const TOUCH_0: usize = 33;
/// Distance between the two touch contact records.
const TOUCH_STRIDE: usize = 4;
const BATTERY: usize = 53;

/// Stick bytes rest at 127.
const STICK_CENTER: i16 = 127;

/// Byte 8: face buttons.
const TRIANGLE: u8 = 1 << 7;
const CIRCLE: u8 = 1 << 6;
const CROSS: u8 = 1 << 5;
const SQUARE: u8 = 1 << 4;
const DPAD_MASK: u8 = 0x0F;

/// Byte 9: shoulders, triggers and menu buttons.
const L1: u8 = 1 << 0;
const R1: u8 = 1 << 1;
const L2: u8 = 1 << 2;
const R2: u8 = 1 << 3;
const SHARE: u8 = 1 << 4;
const OPTIONS: u8 = 1 << 5;
const L3: u8 = 1 << 6;
const R3: u8 = 1 << 7;

/// Byte 10: system buttons.
const PS: u8 = 1 << 0;
const TOUCH_CLICK: u8 = 1 << 1;
const MIC: u8 = 1 << 2;

/// Set when no finger is on the contact.
const TOUCH_INACTIVE: u8 = 0x80;
const TOUCH_ID_MASK: u8 = 0x7F;

/// D-pad nibble to direction flags; 8-15 are centered.
///
/// NOTE: this table is suspect. Nibbles 0 and 1 both set Up, and nibbles 4
/// and 5 both set Down; nibble 5 has no Left where a bijective 8-way hat
/// would report Down-Left.
pub const DPAD_TABLE: [Dpad; 8] = [
    Dpad::new(true, false, false, false),
    Dpad::new(true, false, false, true),
    Dpad::new(false, false, false, true),
    Dpad::new(false, true, false, true),
    Dpad::new(false, true, false, false),
    Dpad::new(false, true, false, false),
    Dpad::new(false, false, true, false),
    Dpad::new(true, false, true, false),
];

/// Bounds-checked view over a raw report.
#[derive(Debug, Clone, Copy)]
struct Fields<'a> {
    data: &'a [u8],
}

impl<'a> Fields<'a> {
    fn new(data: &'a [u8]) -> Fields<'a> {
        Fields { data }
    }

    /// Fail unless byte `last` exists.
    fn require(&self, field: &'static str, last: usize) -> Result<()> {
        if self.data.len() <= last {
            return Err(Error::Decode {
                field,
                needed: last + 1,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    fn u8(&self, field: &'static str, offset: usize) -> Result<u8> {
        self.require(field, offset)?;
        Ok(self.data[offset])
    }

    fn i16_le(&self, field: &'static str, offset: usize) -> Result<i16> {
        self.require(field, offset + 1)?;
        Ok(i16::from_le_bytes([self.data[offset], self.data[offset + 1]]))
    }
}

/// Triangle, circle, cross and square from byte 8. Other fields stay false.
pub fn parse_face_buttons(report: &[u8]) -> Result<Buttons> {
    let face = Fields::new(report).u8("face buttons", BUTTONS_DPAD)?;
    Ok(Buttons {
        triangle: face & TRIANGLE != 0,
        circle: face & CIRCLE != 0,
        cross: face & CROSS != 0,
        square: face & SQUARE != 0,
        ..Buttons::default()
    })
}

/// Shoulders, digital triggers, share, options and stick clicks from byte 9.
/// Other fields stay false.
pub fn parse_shoulders(report: &[u8]) -> Result<Buttons> {
    let misc = Fields::new(report).u8("shoulder buttons", BUTTONS_MISC)?;
    Ok(Buttons {
        l1: misc & L1 != 0,
        r1: misc & R1 != 0,
        l2: misc & L2 != 0,
        r2: misc & R2 != 0,
        share: misc & SHARE != 0,
        options: misc & OPTIONS != 0,
        l3: misc & L3 != 0,
        r3: misc & R3 != 0,
        ..Buttons::default()
    })
}

/// PS, touchpad click and mic button from byte 10. Other fields stay false.
pub fn parse_system_buttons(report: &[u8]) -> Result<Buttons> {
    let system = Fields::new(report).u8("system buttons", BUTTONS_SYSTEM)?;
    Ok(Buttons {
        ps: system & PS != 0,
        touchpad: system & TOUCH_CLICK != 0,
        mic: system & MIC != 0,
        ..Buttons::default()
    })
}

pub fn parse_buttons(report: &[u8]) -> Result<Buttons> {
    Fields::new(report).require("buttons", BUTTONS_SYSTEM)?;
    let face = parse_face_buttons(report)?;
    let shoulders = parse_shoulders(report)?;
    let system = parse_system_buttons(report)?;
    Ok(Buttons {
        triangle: face.triangle,
        circle: face.circle,
        cross: face.cross,
        square: face.square,
        ps: system.ps,
        touchpad: system.touchpad,
        mic: system.mic,
        ..shoulders
    })
}

/// Map a d-pad nibble through [`DPAD_TABLE`].
pub fn dpad_from_nibble(nibble: u8) -> Dpad {
    DPAD_TABLE
        .get((nibble & DPAD_MASK) as usize)
        .copied()
        .unwrap_or(Dpad::CENTERED)
}

pub fn parse_dpad(report: &[u8]) -> Result<Dpad> {
    let nibble = Fields::new(report).u8("dpad", BUTTONS_DPAD)? & DPAD_MASK;
    Ok(dpad_from_nibble(nibble))
}

pub fn parse_sticks(report: &[u8]) -> Result<Sticks> {
    let f = Fields::new(report);
    f.require("sticks", STICK_RY)?;
    let axis = |offset: usize| -> Result<i16> { Ok(f.u8("sticks", offset)? as i16 - STICK_CENTER) };
    Ok(Sticks {
        lx: axis(STICK_LX)?,
        ly: axis(STICK_LY)?,
        rx: axis(STICK_RX)?,
        ry: axis(STICK_RY)?,
    })
}

pub fn parse_triggers(report: &[u8]) -> Result<Triggers> {
    let f = Fields::new(report);
    f.require("triggers", TRIGGER_R2)?;
    Ok(Triggers {
        l2: f.u8("triggers", TRIGGER_L2)?,
        r2: f.u8("triggers", TRIGGER_R2)?,
    })
}

/// Decode touch contact `slot` (0 or 1).
///
/// Each contact is four bytes: status, then x and y packed as two 12-bit
/// values sharing the middle byte.
pub fn parse_touch(report: &[u8], slot: usize) -> Result<TouchContact> {
    let base = TOUCH_0 + TOUCH_STRIDE * slot;
    let f = Fields::new(report);
    f.require("touchpad", base + 3)?;
    let status = f.u8("touchpad", base)?;
    let lo = f.u8("touchpad", base + 1)? as u16;
    let mid = f.u8("touchpad", base + 2)? as u16;
    let hi = f.u8("touchpad", base + 3)? as u16;
    Ok(TouchContact {
        active: status & TOUCH_INACTIVE == 0,
        id: status & TOUCH_ID_MASK,
        x: ((mid & 0x0F) << 8) | lo,
        y: (hi << 4) | ((mid & 0xF0) >> 4),
    })
}

fn parse_touchpad(report: &[u8]) -> Result<[TouchContact; 2]> {
    Ok([parse_touch(report, 0)?, parse_touch(report, 1)?])
}

fn parse_motion(report: &[u8], field: &'static str, offsets: [usize; 3]) -> Result<MotionSample> {
    let f = Fields::new(report);
    f.require(field, offsets[2] + 1)?;
    Ok(MotionSample {
        x: f.i16_le(field, offsets[0])?,
        y: f.i16_le(field, offsets[1])?,
        z: f.i16_le(field, offsets[2])?,
    })
}

pub fn parse_accelerometer(report: &[u8]) -> Result<MotionSample> {
    parse_motion(report, "accelerometer", [ACCEL_X, ACCEL_Y, ACCEL_Z])
}

/// Pitch, yaw and roll land in `x`, `y` and `z`.
pub fn parse_gyrometer(report: &[u8]) -> Result<MotionSample> {
    parse_motion(report, "gyrometer", [GYRO_PITCH, GYRO_YAW, GYRO_ROLL])
}

pub fn parse_battery(report: &[u8]) -> Result<Battery> {
    Ok(Battery::from_byte(Fields::new(report).u8("battery", BATTERY)?))
}

impl InputReport {
    /// Decode every field. The report must reach the battery byte.
    pub fn parse(report: &[u8]) -> Result<InputReport> {
        Fields::new(report).require("input report", BATTERY)?;
        Ok(InputReport {
            buttons: parse_buttons(report)?,
            dpad: parse_dpad(report)?,
            sticks: parse_sticks(report)?,
            triggers: parse_triggers(report)?,
            touch: parse_touchpad(report)?,
            accelerometer: parse_accelerometer(report)?,
            gyrometer: parse_gyrometer(report)?,
            battery: parse_battery(report)?,
        })
    }
}

impl DeviceState {
    /// Decode a full report into the state.
    ///
    /// On error nothing is modified, including the history windows.
    pub fn update(&mut self, report: &[u8]) -> Result<()> {
        let parsed = InputReport::parse(report)?;
        log::trace!("Decoded report: {:?}", parsed);
        self.apply(&parsed);
        Ok(())
    }

    /// Face buttons only.
    pub fn update_buttons(&mut self, report: &[u8]) -> Result<()> {
        let parsed = parse_face_buttons(report)?;
        self.buttons.triangle = parsed.triangle;
        self.buttons.circle = parsed.circle;
        self.buttons.cross = parsed.cross;
        self.buttons.square = parsed.square;
        Ok(())
    }

    pub fn update_dpad(&mut self, report: &[u8]) -> Result<()> {
        self.dpad = parse_dpad(report)?;
        Ok(())
    }

    pub fn update_sticks(&mut self, report: &[u8]) -> Result<()> {
        self.sticks = parse_sticks(report)?;
        Ok(())
    }

    /// Shoulder buttons, digital trigger flags, stick clicks and analog triggers.
    pub fn update_triggers(&mut self, report: &[u8]) -> Result<()> {
        let shoulders = parse_shoulders(report)?;
        let triggers = parse_triggers(report)?;
        self.buttons.l1 = shoulders.l1;
        self.buttons.r1 = shoulders.r1;
        self.buttons.l2 = shoulders.l2;
        self.buttons.r2 = shoulders.r2;
        self.buttons.l3 = shoulders.l3;
        self.buttons.r3 = shoulders.r3;
        self.triggers = triggers;
        Ok(())
    }

    /// Share, options, PS, touchpad click and mic button.
    pub fn update_misc(&mut self, report: &[u8]) -> Result<()> {
        let shoulders = parse_shoulders(report)?;
        let system = parse_system_buttons(report)?;
        self.buttons.share = shoulders.share;
        self.buttons.options = shoulders.options;
        self.buttons.ps = system.ps;
        self.buttons.touchpad = system.touchpad;
        self.buttons.mic = system.mic;
        Ok(())
    }

    pub fn update_touchpad(&mut self, report: &[u8]) -> Result<()> {
        let contacts = parse_touchpad(report)?;
        self.apply_touch(&contacts);
        Ok(())
    }

    pub fn update_accelerometer(&mut self, report: &[u8]) -> Result<()> {
        let sample = parse_accelerometer(report)?;
        self.apply_accelerometer(&sample);
        Ok(())
    }

    pub fn update_gyrometer(&mut self, report: &[u8]) -> Result<()> {
        let sample = parse_gyrometer(report)?;
        self.apply_gyrometer(&sample);
        Ok(())
    }

    pub fn update_battery(&mut self, report: &[u8]) -> Result<()> {
        self.battery = parse_battery(report)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{BatteryStatus, DecoderConfig};

    fn idle_report() -> [u8; REPORT_SIZE] {
        let mut report = [0u8; REPORT_SIZE];
        report[0] = INPUT_REPORT_ID;
        report[STICK_LX..=STICK_RY].copy_from_slice(&[127; 4]);
        report[BUTTONS_DPAD] = 0x08;
        report[TOUCH_0] = TOUCH_INACTIVE;
        report[TOUCH_0 + TOUCH_STRIDE] = TOUCH_INACTIVE;
        report
    }

    #[test]
    fn idle_report_is_neutral() {
        let parsed = InputReport::parse(&idle_report()).unwrap();
        assert_eq!(parsed.buttons, Buttons::default());
        assert!(parsed.dpad.is_centered());
        assert_eq!(parsed.sticks, Sticks::default());
        assert!(!parsed.touch[0].active);
        assert!(!parsed.touch[1].active);
        assert_eq!(parsed.battery.status, BatteryStatus::Discharging);
    }

    #[test]
    fn touch_coordinates() {
        let mut report = idle_report();
        report[33] = 0x00;
        report[34] = 0xCD;
        report[35] = 0x0A;
        report[36] = 0x12;
        let contact = parse_touch(&report, 0).unwrap();
        assert!(contact.active);
        assert_eq!(contact.x, 2765);
        assert_eq!(contact.y, 288);

        report[33] = 0x80;
        assert!(!parse_touch(&report, 0).unwrap().active);
    }

    #[test]
    fn second_touch_contact_is_four_bytes_later() {
        let mut report = idle_report();
        report[37] = 0x05;
        report[38] = 0xFF;
        report[39] = 0xA7;
        report[40] = 0x3B;
        let contact = parse_touch(&report, 1).unwrap();
        assert!(contact.active);
        assert_eq!(contact.id, 5);
        assert_eq!(contact.x, 0x7FF);
        assert_eq!(contact.y, 0x3BA);
    }

    #[test]
    fn accelerometer_little_endian() {
        let mut report = idle_report();
        report[16] = 0x34;
        report[17] = 0x12;
        assert_eq!(parse_accelerometer(&report).unwrap().x, 4660);
        report[16] = 0xFF;
        report[17] = 0xFF;
        assert_eq!(parse_accelerometer(&report).unwrap().x, -1);
    }

    #[test]
    fn gyrometer_axes() {
        let mut report = idle_report();
        report[22..28].copy_from_slice(&[0x01, 0x00, 0x00, 0x80, 0xFF, 0x7F]);
        let gyro = parse_gyrometer(&report).unwrap();
        assert_eq!((gyro.x, gyro.y, gyro.z), (1, i16::MIN, i16::MAX));
    }

    #[test]
    fn sticks_are_centered_on_127() {
        let mut report = idle_report();
        report[1..5].copy_from_slice(&[0, 255, 127, 128]);
        let sticks = parse_sticks(&report).unwrap();
        assert_eq!(sticks, Sticks { lx: -127, ly: 128, rx: 0, ry: 1 });
    }

    #[test]
    fn triggers_and_shoulders() {
        let mut report = idle_report();
        report[TRIGGER_L2] = 200;
        report[TRIGGER_R2] = 3;
        report[BUTTONS_MISC] = L1 | R2 | R3;
        let parsed = InputReport::parse(&report).unwrap();
        assert_eq!(parsed.triggers, Triggers { l2: 200, r2: 3 });
        assert!(parsed.buttons.l1);
        assert!(!parsed.buttons.r1);
        assert!(!parsed.buttons.l2);
        assert!(parsed.buttons.r2);
        assert!(!parsed.buttons.l3);
        assert!(parsed.buttons.r3);
    }

    #[test]
    fn face_and_system_buttons() {
        let mut report = idle_report();
        report[BUTTONS_DPAD] = TRIANGLE | SQUARE | 0x08;
        report[BUTTONS_MISC] = SHARE | OPTIONS;
        report[BUTTONS_SYSTEM] = PS | MIC;
        let buttons = parse_buttons(&report).unwrap();
        assert!(buttons.triangle && buttons.square);
        assert!(!buttons.circle && !buttons.cross);
        assert!(buttons.share && buttons.options);
        assert!(buttons.ps && buttons.mic);
        assert!(!buttons.touchpad);
    }

    fn dpad_row(nibble: u8, up: bool, down: bool, left: bool, right: bool) {
        let mut report = idle_report();
        // Face buttons share the byte and must not leak into the d-pad.
        report[BUTTONS_DPAD] = 0xF0 | nibble;
        assert_eq!(
            parse_dpad(&report).unwrap(),
            Dpad::new(up, down, left, right),
            "nibble {nibble}"
        );
    }

    #[test]
    fn dpad_0_up() {
        dpad_row(0, true, false, false, false);
    }

    #[test]
    fn dpad_1_up_right() {
        dpad_row(1, true, false, false, true);
    }

    #[test]
    fn dpad_2_right() {
        dpad_row(2, false, false, false, true);
    }

    #[test]
    fn dpad_3_down_right() {
        dpad_row(3, false, true, false, true);
    }

    #[test]
    fn dpad_4_down() {
        dpad_row(4, false, true, false, false);
    }

    #[test]
    fn dpad_5_down_without_left() {
        dpad_row(5, false, true, false, false);
    }

    #[test]
    fn dpad_6_left() {
        dpad_row(6, false, false, true, false);
    }

    #[test]
    fn dpad_7_up_left() {
        dpad_row(7, true, false, true, false);
    }

    #[test]
    fn dpad_8_to_15_centered() {
        for nibble in 8..16 {
            dpad_row(nibble, false, false, false, false);
        }
    }

    #[test]
    fn battery_byte() {
        let mut report = idle_report();
        report[BATTERY] = 0x19;
        let battery = parse_battery(&report).unwrap();
        assert_eq!(battery.status, BatteryStatus::Charging);
        assert_eq!(battery.level, 95);
        report[BATTERY] = 0x2F;
        let battery = parse_battery(&report).unwrap();
        assert_eq!(battery.status, BatteryStatus::Full);
        assert_eq!(battery.level, 100);
        report[BATTERY] = 0x53;
        assert_eq!(parse_battery(&report).unwrap().status, BatteryStatus::Unknown);
    }

    #[test]
    fn short_report_fails_per_field() {
        let report = [0u8; 20];
        assert!(parse_buttons(&report).is_ok());
        assert!(parse_accelerometer(&report).is_err());
        match parse_battery(&report) {
            Err(Error::Decode {
                field,
                needed,
                actual,
            }) => {
                assert_eq!(field, "battery");
                assert_eq!(needed, 54);
                assert_eq!(actual, 20);
            }
            other => panic!("unexpected {other:?}"),
        }
        // Last gyro byte is 27.
        assert!(parse_gyrometer(&[0u8; 27]).is_err());
        assert!(parse_gyrometer(&[0u8; 28]).is_ok());
        assert!(parse_touch(&[0u8; 40], 1).is_err());
        assert!(parse_touch(&[0u8; 41], 1).is_ok());
    }

    #[test]
    fn button_groups_need_only_their_own_byte() {
        let mut report = [0u8; 11];
        report[BUTTONS_DPAD] = TRIANGLE;
        report[BUTTONS_MISC] = L1 | SHARE;
        report[BUTTONS_SYSTEM] = MIC;

        assert!(parse_face_buttons(&report[..8]).is_err());
        assert!(parse_face_buttons(&report[..9]).unwrap().triangle);
        assert!(parse_shoulders(&report[..9]).is_err());
        let shoulders = parse_shoulders(&report[..10]).unwrap();
        assert!(shoulders.l1 && shoulders.share);
        assert!(!shoulders.triangle);
        assert!(parse_system_buttons(&report[..10]).is_err());
        assert!(parse_system_buttons(&report[..11]).unwrap().mic);
        assert!(parse_buttons(&report[..10]).is_err());
        assert!(parse_buttons(&report).is_ok());
    }

    #[test]
    fn update_buttons_accepts_nine_byte_report() {
        let mut state = DeviceState::default();
        let mut report = [0u8; 9];
        report[BUTTONS_DPAD] = TRIANGLE;
        state.update_buttons(&report).unwrap();
        assert!(state.buttons.triangle);
        assert!(state.update_buttons(&report[..8]).is_err());
    }

    #[test]
    fn update_triggers_accepts_ten_byte_report() {
        let mut state = DeviceState::default();
        let mut report = [0u8; 10];
        report[TRIGGER_L2] = 40;
        report[BUTTONS_MISC] = R1 | L3;
        state.update_triggers(&report).unwrap();
        assert!(state.buttons.r1 && state.buttons.l3);
        assert_eq!(state.triggers.l2, 40);

        let before = state.clone();
        assert!(state.update_triggers(&report[..9]).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn update_misc_needs_byte_10() {
        let mut state = DeviceState::default();
        let mut report = [0u8; 11];
        report[BUTTONS_MISC] = OPTIONS;
        report[BUTTONS_SYSTEM] = PS;
        assert!(state.update_misc(&report[..10]).is_err());
        assert!(!state.buttons.options);
        state.update_misc(&report).unwrap();
        assert!(state.buttons.options && state.buttons.ps);
    }

    #[test]
    fn failed_update_keeps_history() {
        let mut state = DeviceState::new(DecoderConfig {
            touch_history: 2,
            motion_history: 2,
        });
        let mut report = idle_report();
        report[16] = 7;
        state.update(&report).unwrap();
        let before = state.clone();

        assert!(state.update(&report[..40]).is_err());
        assert!(state.update_battery(&report[..53]).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn repeated_update_only_grows_history() {
        let mut state = DeviceState::new(DecoderConfig {
            touch_history: 1,
            motion_history: 3,
        });
        let mut report = idle_report();
        report[BUTTONS_DPAD] = 0x23;
        report[18] = 0x10;
        state.update(&report).unwrap();
        let first = (state.buttons, state.dpad, state.sticks, state.battery);
        state.update(&report).unwrap();
        assert_eq!((state.buttons, state.dpad, state.sticks, state.battery), first);
        assert_eq!(state.accelerometer.y.to_vec(), vec![0x10, 0x10]);
        assert_eq!(state.touch[0].history.len(), 1);
    }

    #[test]
    fn partial_updates_touch_only_their_fields() {
        let mut state = DeviceState::default();
        let mut report = idle_report();
        report[BUTTONS_DPAD] = CROSS | 0x02;
        report[BUTTONS_MISC] = L1 | OPTIONS;
        report[BUTTONS_SYSTEM] = TOUCH_CLICK;
        report[TRIGGER_R2] = 99;

        state.update_buttons(&report).unwrap();
        assert!(state.buttons.cross);
        assert!(!state.buttons.l1 && !state.buttons.options);
        assert!(!state.dpad.right);

        state.update_dpad(&report).unwrap();
        assert!(state.dpad.right);

        state.update_triggers(&report).unwrap();
        assert!(state.buttons.l1);
        assert_eq!(state.triggers.r2, 99);
        assert!(!state.buttons.options);

        state.update_misc(&report).unwrap();
        assert!(state.buttons.options && state.buttons.touchpad);

        state.update_touchpad(&report).unwrap();
        state.update_accelerometer(&report).unwrap();
        state.update_gyrometer(&report).unwrap();
        assert!(state.touch[0].contact().is_some());
        assert!(state.gyrometer.latest().is_some());
        assert_eq!(state.battery.status, BatteryStatus::Unknown);
    }
}
