use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinHandle;

use dualsense_hidraw::discovery::{self, DeviceEvent};
use dualsense_hidraw::{
    DecoderConfig, DeviceInfo, MicLed, Rgb, DUALSENSE_PRODUCT_ID, SONY_VENDOR_ID,
};

mod session;

use session::SessionConfig;

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("`{s}` is not a 16-bit hex id: {e}"))
}

fn parse_rgb(s: &str) -> Result<Rgb, String> {
    let digits = s.trim_start_matches('#');
    if digits.len() != 6 {
        return Err(format!("`{s}` is not an rrggbb color"));
    }
    let value = u32::from_str_radix(digits, 16).map_err(|e| format!("`{s}`: {e}"))?;
    Ok(Rgb::new((value >> 16) as u8, (value >> 8) as u8, value as u8))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum MicLedArg {
    Off,
    On,
    Pulse,
}

impl From<MicLedArg> for MicLed {
    fn from(arg: MicLedArg) -> Self {
        match arg {
            MicLedArg::Off => MicLed::Off,
            MicLedArg::On => MicLed::On,
            MicLedArg::Pulse => MicLed::Pulse,
        }
    }
}

/// Poll a wired DualSense controller and log its state.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// USB vendor id, hex [default: 054c]
    #[arg(long, value_parser = parse_hex_u16)]
    vendor_id: Option<u16>,

    /// USB product id, hex [default: 0ce6]
    #[arg(long, value_parser = parse_hex_u16)]
    product_id: Option<u16>,

    /// Samples kept per motion axis
    #[arg(long, default_value_t = 1)]
    motion_history: usize,

    /// Samples kept per touch contact
    #[arg(long, default_value_t = 1)]
    touch_history: usize,

    /// Light bar color as rrggbb
    #[arg(long, value_parser = parse_rgb)]
    lightbar: Option<Rgb>,

    #[arg(long, value_enum, default_value_t = MicLedArg::Off)]
    mic_led: MicLedArg,

    /// Drive the motors from the analog triggers
    #[arg(long)]
    trigger_rumble: bool,

    /// Pause between polls, in milliseconds
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,

    /// Exit when the first controller goes away instead of waiting for another
    #[arg(long)]
    once: bool,
}

impl Args {
    fn ids(&self) -> (u16, u16) {
        (
            self.vendor_id.unwrap_or(SONY_VENDOR_ID),
            self.product_id.unwrap_or(DUALSENSE_PRODUCT_ID),
        )
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            decoder: DecoderConfig {
                touch_history: self.touch_history,
                motion_history: self.motion_history,
            },
            lightbar: self.lightbar,
            mic_led: self.mic_led.into(),
            trigger_rumble: self.trigger_rumble,
            interval: Duration::from_millis(self.interval_ms),
        }
    }
}

struct RunningSession {
    sys_path: PathBuf,
    stop_tx: Sender<()>,
    handle: JoinHandle<Result<()>>,
}

fn start_session(info: DeviceInfo, config: SessionConfig) -> RunningSession {
    let (stop_tx, stop_rx) = mpsc::channel(1);
    let sys_path = info.sys_path.clone();
    let handle = tokio::task::spawn_blocking(move || session::run_session(info, config, stop_rx));
    RunningSession {
        sys_path,
        stop_tx,
        handle,
    }
}

async fn finish_session(session: RunningSession) {
    // The worker checks for this between reads.
    let _ = session.stop_tx.send(()).await;
    match session.handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Session ended: {e:#}"),
        Err(e) => warn!("Session task failed: {e}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.session_config();

    let (tx, mut rx) = mpsc::channel(8);
    let (vendor_id, product_id) = args.ids();
    let monitor = discovery::monitor_devices(vendor_id, product_id, tx);
    tokio::pin!(monitor);

    let mut current: Option<RunningSession> = None;
    loop {
        tokio::select! {
            _ = &mut monitor => bail!("Device monitor stopped"),
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            Some(event) = rx.recv() => match event {
                DeviceEvent::Added(info) => {
                    if current.as_ref().map_or(false, |s| !s.handle.is_finished()) {
                        info!("Already polling a controller, ignoring {:?}", info.device_node);
                        continue;
                    }
                    if let Some(stale) = current.take() {
                        finish_session(stale).await;
                    }
                    current = Some(start_session(info, config.clone()));
                }
                DeviceEvent::Removed(path) => {
                    if current.as_ref().map_or(false, |s| s.sys_path == path) {
                        info!("Controller removed");
                        if let Some(session) = current.take() {
                            finish_session(session).await;
                        }
                        if args.once {
                            break;
                        }
                    }
                }
            },
        }
    }
    if let Some(session) = current.take() {
        finish_session(session).await;
    }
    Ok(())
}
