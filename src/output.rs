//! Construction of the 64-byte USB output report.

use num_enum::IntoPrimitive;

use crate::error::{Error, Result};

pub const OUTPUT_REPORT_SIZE: usize = 64;
/// Report ID of the USB output report.
pub const OUTPUT_REPORT_ID: u8 = 0x02;
/// Byte 1: enable every feature in the first flag group.
pub const FEATURE_FLAGS_0: u8 = 0xFF;
/// Byte 2: rumble, light bar and mic LED updates.
pub const FEATURE_FLAGS_1: u8 = 0x01 | 0x02 | 0x04 | 0x10 | 0x40;
/// Byte 10 value when the microphone is muted.
pub const MIC_MUTED: u8 = 0x10;

const FLAGS_0: usize = 1;
const FLAGS_1: usize = 2;
const RIGHT_MOTOR: usize = 3;
const LEFT_MOTOR: usize = 4;
const MIC_LED: usize = 9;
const MIC_MUTE: usize = 10;
const LIGHTBAR: usize = 45;

/// State of the LED under the microphone button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum MicLed {
    #[default]
    Off = 0,
    On = 1,
    Pulse = 2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Rgb {
        Rgb { r, g, b }
    }
}

/// The full set of actuator values for one output report.
///
/// There is no partial update: every write carries the complete state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputCommand {
    /// High frequency motor, 0-255.
    pub right_motor: u8,
    /// Low frequency motor, 0-255.
    pub left_motor: u8,
    /// Light bar color. `None` leaves the color bytes zeroed.
    pub lightbar: Option<Rgb>,
    pub mic_led: MicLed,
    pub mic_mute: bool,
}

impl OutputCommand {
    /// Everything off.
    pub fn off() -> OutputCommand {
        OutputCommand::default()
    }

    pub fn with_rumble(mut self, left: u8, right: u8) -> OutputCommand {
        self.left_motor = left;
        self.right_motor = right;
        self
    }

    pub fn with_lightbar(mut self, color: Rgb) -> OutputCommand {
        self.lightbar = Some(color);
        self
    }

    /// Serialize into a fresh report.
    pub fn encode(&self) -> [u8; OUTPUT_REPORT_SIZE] {
        let mut report = [0u8; OUTPUT_REPORT_SIZE];
        self.write_fields(&mut report);
        report
    }

    /// Serialize into `buf`, which must hold at least a full report.
    ///
    /// The first `OUTPUT_REPORT_SIZE` bytes are overwritten completely; bytes
    /// beyond that are left alone.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        let actual = buf.len();
        let report = buf.get_mut(..OUTPUT_REPORT_SIZE).ok_or(Error::Encode {
            needed: OUTPUT_REPORT_SIZE,
            actual,
        })?;
        report.fill(0);
        self.write_fields(report);
        Ok(OUTPUT_REPORT_SIZE)
    }

    fn write_fields(&self, report: &mut [u8]) {
        report[0] = OUTPUT_REPORT_ID;
        report[FLAGS_0] = FEATURE_FLAGS_0;
        report[FLAGS_1] = FEATURE_FLAGS_1;
        report[RIGHT_MOTOR] = self.right_motor;
        report[LEFT_MOTOR] = self.left_motor;
        report[MIC_LED] = self.mic_led.into();
        report[MIC_MUTE] = if self.mic_mute { MIC_MUTED } else { 0x00 };
        if let Some(Rgb { r, g, b }) = self.lightbar {
            report[LIGHTBAR..LIGHTBAR + 3].copy_from_slice(&[r, g, b]);
        }
    }
}
