use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use serialport::{ClearBuffer, SerialPort, SerialPortType};
use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

use crate::models::command::Command;

/// Connection choreography tunables.
///
/// The settle delay covers the vehicle controller resetting itself when the
/// port opens; the handshake delay gives its firmware time to act on the
/// mode-select byte before command bytes follow.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Explicit port name. `None` means discover one.
    pub port_name: Option<String>,
    pub baud_rate: u32,
    pub write_timeout: Duration,
    pub settle_delay: Duration,
    pub handshake_delay: Duration,
    /// Single byte telling the firmware which control mode is driving it.
    pub mode_select: char,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port_name: None,
            baud_rate: 9600,
            write_timeout: Duration::from_millis(1000),
            settle_delay: Duration::from_secs(2),
            handshake_delay: Duration::from_secs(1),
            mode_select: '3',
        }
    }
}

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("No serial port looks like the vehicle.")]
    NoPortFound,

    #[error("Failed to open port '{port}'.")]
    OpenFailed {
        port: String,
        source: serialport::Error,
    },

    #[error("Mode-select handshake failed on port '{port}'.")]
    HandshakeFailed {
        port: String,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Link is not connected.")]
    NotConnected,

    #[error("Failed to write command byte.")]
    Io(#[from] std::io::Error),
}

/// This service separates the serial transport from the streaming logic so
/// the streamer can be unit tested against fakes.
#[async_trait]
pub trait VehicleLink: Send {
    /// Open the transport and run the connect choreography. Safe to call
    /// again after a failed attempt or a dropped session.
    async fn connect(&mut self) -> Result<(), ConnectError>;

    fn is_connected(&self) -> bool;

    /// Write one command byte. Retry policy belongs to the caller; a failed
    /// write drops the session so `is_connected` turns false.
    fn write_command(&mut self, command: Command) -> Result<(), WriteError>;

    /// Best-effort stop-and-close. Never fails; a vehicle that missed the
    /// final stop byte will coast until its own failsafe kicks in.
    async fn disconnect(&mut self);

    /// Human-readable transport description for logs.
    fn describe(&self) -> String;
}

/// The real serial transport.
pub struct SerialVehicleLink {
    config: LinkConfig,
    port: Option<Box<dyn SerialPort>>,
    resolved_name: Option<String>,
    /// Bytes put on the wire by the current session, mode byte included.
    bytes_written: u64,
    /// What killed the previous session, if anything did.
    last_error: Option<String>,
}

impl SerialVehicleLink {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            port: None,
            resolved_name: None,
            bytes_written: 0,
            last_error: None,
        }
    }

    fn resolve_port_name(&self) -> Result<String, ConnectError> {
        if let Some(name) = &self.config.port_name {
            return Ok(name.clone());
        }
        match find_vehicle_port() {
            None => Err(ConnectError::NoPortFound),
            Some(name) => Ok(name),
        }
    }

    /// Throw away whatever the firmware printed while booting so the first
    /// command byte is not queued behind it.
    fn drain_pending_input(port: &mut Box<dyn SerialPort>) {
        match port.bytes_to_read() {
            Ok(0) => trace!("No boot output to drain."),
            Ok(pending) => {
                debug!("Draining {} bytes of boot output.", pending);
                if let Err(e) = port.clear(ClearBuffer::Input) {
                    warn!("Failed to clear the input buffer. Error: {}", e);
                }
            }
            Err(e) => warn!("Failed to check for pending input. Error: {}", e),
        }
    }
}

#[async_trait]
impl VehicleLink for SerialVehicleLink {
    #[instrument(skip_all)]
    async fn connect(&mut self) -> Result<(), ConnectError> {
        let name = self.resolve_port_name()?;
        match self.last_error.take() {
            None => info!("Opening '{}' at {} baud.", name, self.config.baud_rate),
            Some(why) => info!(
                "Reopening '{}' at {} baud after: {}",
                name, self.config.baud_rate, why
            ),
        }

        let mut port = match serialport::new(name.clone(), self.config.baud_rate)
            .timeout(self.config.write_timeout)
            .open()
        {
            Err(e) => {
                self.last_error = Some(e.to_string());
                return Err(ConnectError::OpenFailed {
                    port: name,
                    source: e,
                });
            }
            Ok(port) => port,
        };

        // Opening the port resets the controller; let it boot before the
        // mode byte, then let the firmware chew on the byte before anything
        // else arrives.
        trace!("Waiting {:?} for the controller to boot.", self.config.settle_delay);
        tokio::time::sleep(self.config.settle_delay).await;

        if let Err(e) = port.write_all(&[self.config.mode_select as u8]) {
            self.last_error = Some(e.to_string());
            return Err(ConnectError::HandshakeFailed {
                port: name,
                source: e,
            });
        }
        debug!("Sent mode-select byte '{}'.", self.config.mode_select);
        self.bytes_written = 1;
        tokio::time::sleep(self.config.handshake_delay).await;

        Self::drain_pending_input(&mut port);

        info!("Connected to '{}'.", name);
        self.resolved_name = Some(name);
        self.port = Some(port);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn write_command(&mut self, command: Command) -> Result<(), WriteError> {
        let result = match self.port.as_mut() {
            None => return Err(WriteError::NotConnected),
            Some(port) => port.write_all(&[command.wire_byte()]),
        };
        if let Err(e) = result {
            warn!("Write failed; dropping the serial session. Error: {}", e);
            self.last_error = Some(e.to_string());
            self.port = None;
            return Err(WriteError::Io(e));
        }
        self.bytes_written += 1;
        trace!("Wrote '{}'.", command.wire_char());
        Ok(())
    }

    #[instrument(skip_all)]
    async fn disconnect(&mut self) {
        let mut port = match self.port.take() {
            None => return,
            Some(port) => port,
        };
        info!("Disconnecting; sending a final stop.");
        match port.write_all(&[Command::Stop.wire_byte()]) {
            Err(e) => warn!("Failed to write the final stop byte. Error: {}", e),
            Ok(()) => self.bytes_written += 1,
        }
        // Give the byte time to leave before the handle closes.
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(port);
        info!("Serial session closed after {} bytes.", self.bytes_written);
    }

    fn describe(&self) -> String {
        let name = self
            .resolved_name
            .as_ref()
            .or(self.config.port_name.as_ref())
            .map(|name| name.as_str())
            .unwrap_or("auto");
        format!("serial '{}' @ {} baud", name, self.config.baud_rate)
    }
}

/// Pick the most plausible vehicle port: USB serial adapters first, then
/// anything that is not Bluetooth, Bluetooth only as a last resort because
/// pairing latency stalls the first writes.
#[instrument(skip_all)]
fn find_vehicle_port() -> Option<String> {
    let ports = match serialport::available_ports() {
        Err(e) => {
            warn!("Failed to enumerate serial ports. Error: {}", e);
            return None;
        }
        Ok(ports) => ports,
    };
    trace!("Found {} ports to check.", ports.len());

    let mut fallback = None;
    let mut bluetooth = None;
    for port in ports {
        match port.port_type {
            SerialPortType::UsbPort(_) => {
                debug!("Picking USB port '{}'.", port.port_name);
                return Some(port.port_name);
            }
            SerialPortType::BluetoothPort => {
                bluetooth = bluetooth.or(Some(port.port_name));
            }
            _ => {
                fallback = fallback.or(Some(port.port_name));
            }
        }
    }

    if let Some(name) = fallback {
        debug!("No USB port; picking '{}'.", name);
        return Some(name);
    }
    if let Some(name) = bluetooth {
        warn!("Only a Bluetooth port ('{}') is available.", name);
        return Some(name);
    }
    None
}

/// Stand-in link for running without the vehicle attached. Accepts every
/// write and counts them so the rest of the system behaves exactly as it
/// does in the field.
#[derive(Default)]
pub struct SimulatedVehicleLink {
    connected: bool,
    writes: u64,
    last_written: Option<Command>,
}

impl SimulatedVehicleLink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VehicleLink for SimulatedVehicleLink {
    async fn connect(&mut self) -> Result<(), ConnectError> {
        self.connected = true;
        info!("Simulated link ready.");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn write_command(&mut self, command: Command) -> Result<(), WriteError> {
        if !self.connected {
            return Err(WriteError::NotConnected);
        }
        self.writes += 1;
        self.last_written = Some(command);
        trace!("Simulated write '{}'.", command.wire_char());
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.connected {
            self.writes += 1;
            self.last_written = Some(Command::Stop);
            self.connected = false;
            info!("Simulated link closed after a final stop ({} writes).", self.writes);
        }
    }

    fn describe(&self) -> String {
        "simulated link".to_string()
    }
}
