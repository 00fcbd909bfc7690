use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::controls::GestureThresholds;
use crate::externals::vehicle::services::LinkConfig;

/// Host-side controller for the smart car: arbitrates drive commands from
/// gesture, keyboard, voice, and web sources and streams the winner to the
/// vehicle over serial.
#[derive(Parser, Debug)]
#[command(name = "smartcar_control_system")]
pub struct Cli {
    /// Serial port of the vehicle. Discovered automatically when omitted.
    #[arg(long)]
    pub port: Option<String>,

    /// Serial baud rate.
    #[arg(long, default_value_t = 9600)]
    pub baud: u32,

    /// Milliseconds between command writes to the vehicle.
    #[arg(long, default_value_t = 50)]
    pub cadence_ms: u64,

    /// Serial write timeout in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub write_timeout_ms: u64,

    /// Milliseconds to let the vehicle controller boot after the port opens.
    #[arg(long, default_value_t = 2000)]
    pub settle_ms: u64,

    /// Milliseconds between the mode-select byte and the first command.
    #[arg(long, default_value_t = 1000)]
    pub handshake_ms: u64,

    /// Control-mode byte sent once after connecting ('1' for the gesture
    /// firmware menu, '3' for direct drive).
    #[arg(long, default_value_t = '3', value_parser = ascii_char)]
    pub mode_select: char,

    /// Address for the HTTP control surface.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub http_addr: SocketAddr,

    /// How many command updates to keep for /status history.
    #[arg(long, default_value_t = 50)]
    pub history_capacity: usize,

    /// Remote controller to mirror, e.g. http://car.example.com:8080.
    /// Enables the bridge poller.
    #[arg(long)]
    pub bridge_url: Option<String>,

    /// Milliseconds between bridge polls.
    #[arg(long, default_value_t = 100)]
    pub bridge_poll_ms: u64,

    /// Pixels a fingertip must clear its PIP joint to count as extended.
    #[arg(long, default_value_t = 20.0)]
    pub finger_margin_px: f32,

    /// Height difference in pixels before one-hand-up steering wins.
    #[arg(long, default_value_t = 80.0)]
    pub steering_margin_px: f32,

    /// At most this many extended fingers reads as a closed fist.
    #[arg(long, default_value_t = 1)]
    pub fist_max_fingers: usize,

    /// At least this many extended fingers reads as an open hand.
    #[arg(long, default_value_t = 3)]
    pub open_min_fingers: usize,

    /// Drive a simulated link instead of real hardware.
    #[arg(long)]
    pub no_hardware: bool,

    /// Disable the stdin keyboard reader (for running as a service).
    #[arg(long)]
    pub no_keyboard: bool,

    /// Log level: error, warn, info, debug, or trace.
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

impl Cli {
    pub fn thresholds(&self) -> GestureThresholds {
        GestureThresholds {
            finger_extension_margin: self.finger_margin_px,
            steering_height_margin: self.steering_margin_px,
            closed_fist_max_fingers: self.fist_max_fingers,
            open_hand_min_fingers: self.open_min_fingers,
        }
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            port_name: self.port.clone(),
            baud_rate: self.baud,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_ms),
            handshake_delay: Duration::from_millis(self.handshake_ms),
            mode_select: self.mode_select,
        }
    }

    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }

    pub fn bridge_poll(&self) -> Duration {
        Duration::from_millis(self.bridge_poll_ms)
    }
}

/// The mode-select value goes over the wire as one byte, so only a single
/// ASCII character is accepted.
fn ascii_char(raw: &str) -> Result<char, String> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c),
        (Some(c), None) => Err(format!("'{}' is not an ASCII character", c)),
        _ => Err("expected a single character".to_string()),
    }
}
