use anyhow::{Context as ErrorContext, Result};
use log::{debug, info, warn};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::Receiver;

use dualsense_hidraw::{
    Connection, DecoderConfig, DeviceInfo, DeviceState, Error, MicLed, OutputCommand, Rgb,
};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub decoder: DecoderConfig,
    pub lightbar: Option<Rgb>,
    pub mic_led: MicLed,
    pub trigger_rumble: bool,
    pub interval: Duration,
}

impl SessionConfig {
    fn base_command(&self) -> OutputCommand {
        OutputCommand {
            lightbar: self.lightbar,
            mic_led: self.mic_led,
            ..OutputCommand::off()
        }
    }
}

/// What changed between two cycles that is worth an `info!` line.
fn log_changes(previous: &DeviceState, state: &DeviceState) {
    if state.buttons != previous.buttons {
        info!("Buttons: {:?}", state.buttons);
    }
    if state.dpad != previous.dpad {
        info!("D-pad: {:?}", state.dpad);
    }
    if state.battery != previous.battery {
        info!("Battery: {:?} {}%", state.battery.status, state.battery.level);
    }
    for (i, slot) in state.touch.iter().enumerate() {
        if slot.active {
            if let Some(contact) = slot.contact() {
                debug!("Touch {}: ({}, {})", i, contact.x, contact.y);
            }
        } else if previous.touch[i].active {
            debug!("Touch {} released", i);
        }
    }
    debug!(
        "Sticks {:?} triggers {:?} accel {:?} gyro {:?}",
        state.sticks,
        state.triggers,
        state.accelerometer.mean(),
        state.gyrometer.mean()
    );
}

/// Poll one controller until it goes away or `stop_rx` fires.
///
/// This blocks the calling thread; run it on a blocking worker.
pub fn run_session(info: DeviceInfo, config: SessionConfig, mut stop_rx: Receiver<()>) -> Result<()> {
    info!("Starting session for `{:?}`", &info.device_node);
    let mut connection = Connection::new();
    connection
        .open_device(&info)
        .with_context(|| format!("Couldn't open `{}`", info.name))?;

    let base = config.base_command();
    let mut sent = base;
    connection.send(&sent).context("Couldn't send initial output report")?;

    let mut state = DeviceState::new(config.decoder);
    loop {
        match stop_rx.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(()) | Err(TryRecvError::Disconnected) => break,
        }
        let report = match connection.read_report() {
            Ok(report) => report,
            Err(Error::ShortRead { expected, actual }) => {
                debug!("Dropping short report ({actual} of {expected} bytes)");
                continue;
            }
            Err(e) => return Err(e).context("Controller read failed"),
        };
        let previous = state.clone();
        if let Err(e) = state.update(&report) {
            warn!("{}", e);
            continue;
        }
        log_changes(&previous, &state);

        if config.trigger_rumble {
            let command = base.with_rumble(state.triggers.l2, state.triggers.r2);
            if command != sent {
                connection.send(&command).context("Controller write failed")?;
                sent = command;
            }
        }
        if !config.interval.is_zero() {
            thread::sleep(config.interval);
        }
    }

    if let Err(e) = connection.send(&OutputCommand::off()) {
        debug!("Couldn't reset outputs: {}", e);
    }
    connection.close();
    info!("Stopping session for `{:?}`", &info.device_node);
    Ok(())
}
