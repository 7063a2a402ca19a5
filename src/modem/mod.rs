//! # GSM Modem Communication Module
//!
//! This module owns the hardware side of the gateway: turning a queued
//! message record into an SMS on the air via an AT-command modem on a
//! serial port.
//!
//! The [`SmsTransport`] trait is the seam between the relay logic and the
//! hardware. The real implementation is [`GsmModem`] (feature `serial`);
//! tests script the [`fake::FakeModem`] instead.
//!
//! ## Delivery reports
//!
//! A send that reaches the modem resolves to one of four terminal
//! [`DeliveryReport`] classes. For a dispatched message the report is
//! observational: the relay logs and counts it without gating the cycle.
//! `NullPayload` is the exception — nothing was transmitted, so the
//! relay treats that cycle as failed.
//!
//! ## Configuration
//!
//! ```toml
//! [modem]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! ```

pub mod fake;

use anyhow::Result;

#[cfg(feature = "serial")]
use crate::logutil::escape_log;
#[cfg(feature = "serial")]
use anyhow::anyhow;
#[cfg(feature = "serial")]
use log::{debug, trace};
#[cfg(feature = "serial")]
use std::io::{Read, Write};
#[cfg(feature = "serial")]
use std::time::{Duration, Instant};

/// Modem-level failures. These are the "send exception" path: the cycle
/// that hits one is logged and skipped, the counter stays put.
#[derive(Debug, thiserror::Error)]
pub enum ModemError {
    #[error("Failed to open modem port {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("Modem I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Modem rejected command {command}: {response}")]
    CommandFailed { command: String, response: String },

    #[error("Timed out waiting for modem response to {command}")]
    Timeout { command: String },
}

/// Terminal result classes for one send attempt, mirrored from the
/// four radio-level outcomes a cellular stack reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryReport {
    /// Message accepted by the network.
    Sent,
    /// Modem error with no more specific classification.
    GenericFailure,
    /// No network service / radio unavailable.
    RadioOff,
    /// Nothing to transmit: the body was empty.
    NullPayload,
}

impl std::fmt::Display for DeliveryReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DeliveryReport::Sent => "sent",
            DeliveryReport::GenericFailure => "generic failure",
            DeliveryReport::RadioOff => "radio off",
            DeliveryReport::NullPayload => "null payload",
        };
        write!(f, "{}", label)
    }
}

/// Hardware seam for sending one SMS to one recipient.
///
/// Implementations are free to block: the relay invokes them from a
/// per-cycle task, never from the server loop.
pub trait SmsTransport: Send {
    /// Readiness gate. The poller refuses to start its schedule until the
    /// transport answers this.
    fn probe(&mut self) -> Result<()>;

    /// Send one text message. `Ok(report)` means the attempt was carried
    /// out and `report` is the terminal radio outcome; `Err` means the
    /// attempt itself blew up (port gone, command rejected mid-sequence).
    fn send_text(&mut self, phone: &str, body: &str) -> Result<DeliveryReport>;
}

/// Placeholder transport for running without an attached modem (port
/// missing or failed to open). The probe always fails, so the poller
/// stays inactive while the rest of the daemon keeps working.
pub struct DisconnectedModem {
    reason: String,
}

impl DisconnectedModem {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SmsTransport for DisconnectedModem {
    fn probe(&mut self) -> Result<()> {
        Err(ModemError::Open {
            port: "(none)".to_string(),
            reason: self.reason.clone(),
        }
        .into())
    }

    fn send_text(&mut self, _phone: &str, _body: &str) -> Result<DeliveryReport> {
        Err(ModemError::Open {
            port: "(none)".to_string(),
            reason: self.reason.clone(),
        }
        .into())
    }
}

/// CMS error codes that mean "no radio / no network service" rather than
/// a message-level failure. 30 = no network service, 31 = network timeout,
/// 331 = no network service (SMS), 500 without registration also lands
/// here via the CFUN check.
#[cfg(any(feature = "serial", test))]
fn is_radio_off_code(code: u32) -> bool {
    matches!(code, 30 | 31 | 331)
}

/// Classify the modem's final response line for a completed AT+CMGS
/// exchange. Split out of the I/O path so the mapping is testable
/// without hardware.
#[cfg(any(feature = "serial", test))]
pub(crate) fn classify_send_response(response: &str) -> DeliveryReport {
    let upper = response.to_ascii_uppercase();
    if upper.contains("+CMGS") || upper.lines().any(|l| l.trim() == "OK") {
        return DeliveryReport::Sent;
    }
    if let Some(rest) = upper.split("+CMS ERROR:").nth(1) {
        let code: u32 = rest
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap_or(0);
        if is_radio_off_code(code) {
            return DeliveryReport::RadioOff;
        }
    }
    DeliveryReport::GenericFailure
}

/// A GSM modem in text mode (`AT+CMGF=1`) on a serial port.
#[cfg(feature = "serial")]
pub struct GsmModem {
    port: Box<dyn serialport::SerialPort>,
    port_name: String,
}

#[cfg(feature = "serial")]
impl GsmModem {
    /// Command round-trip budget for control commands (AT, ATE0, CMGF).
    const COMMAND_DEADLINE: Duration = Duration::from_secs(5);
    /// AT+CMGS can take much longer while the network accepts the message.
    const SEND_DEADLINE: Duration = Duration::from_secs(30);

    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        debug!("Opening modem port {} at {} baud", port_name, baud_rate);
        let mut builder =
            serialport::new(port_name, baud_rate).timeout(Duration::from_millis(500));
        // Some USB serial adapters need explicit settings
        #[cfg(unix)]
        {
            builder = builder
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None);
        }
        let mut port = builder.open().map_err(|e| ModemError::Open {
            port: port_name.to_string(),
            reason: e.to_string(),
        })?;
        // Toggle DTR/RTS so sleeping USB dongles wake up
        let _ = port.write_data_terminal_ready(true);
        let _ = port.write_request_to_send(true);
        std::thread::sleep(Duration::from_millis(150));
        // Discard any buffered unsolicited output from before we attached
        let _ = port.clear(serialport::ClearBuffer::Input);
        Ok(Self {
            port,
            port_name: port_name.to_string(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Write one AT command and collect the response until a terminal
    /// `OK`/`ERROR` line or the deadline.
    fn command(&mut self, command: &str, deadline: Duration) -> Result<String> {
        trace!("modem <- {}", escape_log(command));
        self.port.write_all(command.as_bytes())?;
        self.port.write_all(b"\r")?;
        self.port.flush()?;
        self.read_until_terminal(command, deadline)
    }

    fn read_until_terminal(&mut self, command: &str, deadline: Duration) -> Result<String> {
        let started = Instant::now();
        let mut response = String::new();
        let mut buf = [0u8; 256];
        while started.elapsed() < deadline {
            match self.port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    response.push_str(&String::from_utf8_lossy(&buf[..n]));
                    if response_is_terminal(&response) {
                        trace!("modem -> {}", escape_log(&response));
                        return Ok(response);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(ModemError::Io(e).into()),
            }
        }
        Err(ModemError::Timeout {
            command: command.to_string(),
        }
        .into())
    }

    /// Wait for the `> ` prompt that AT+CMGS emits before the body.
    fn await_body_prompt(&mut self) -> Result<()> {
        let started = Instant::now();
        let mut seen = String::new();
        let mut buf = [0u8; 64];
        while started.elapsed() < Self::COMMAND_DEADLINE {
            match self.port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    seen.push_str(&String::from_utf8_lossy(&buf[..n]));
                    if seen.contains('>') {
                        return Ok(());
                    }
                    if seen.to_ascii_uppercase().contains("ERROR") {
                        return Err(ModemError::CommandFailed {
                            command: "AT+CMGS".to_string(),
                            response: seen,
                        }
                        .into());
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(ModemError::Io(e).into()),
            }
        }
        Err(ModemError::Timeout {
            command: "AT+CMGS".to_string(),
        }
        .into())
    }
}

#[cfg(feature = "serial")]
fn response_is_terminal(response: &str) -> bool {
    let upper = response.to_ascii_uppercase();
    upper
        .lines()
        .any(|l| l.trim() == "OK" || l.trim().starts_with("ERROR") || l.contains("ERROR:"))
}

#[cfg(feature = "serial")]
impl SmsTransport for GsmModem {
    fn probe(&mut self) -> Result<()> {
        let response = self.command("AT", Self::COMMAND_DEADLINE)?;
        if !response.to_ascii_uppercase().contains("OK") {
            return Err(anyhow!(
                "Modem on {} did not answer AT probe: {}",
                self.port_name,
                escape_log(&response)
            ));
        }
        // Echo off keeps response parsing unambiguous; text mode for CMGS
        let _ = self.command("ATE0", Self::COMMAND_DEADLINE)?;
        let cmgf = self.command("AT+CMGF=1", Self::COMMAND_DEADLINE)?;
        if !cmgf.to_ascii_uppercase().contains("OK") {
            return Err(ModemError::CommandFailed {
                command: "AT+CMGF=1".to_string(),
                response: cmgf,
            }
            .into());
        }
        debug!("Modem on {} answered probe, text mode set", self.port_name);
        Ok(())
    }

    fn send_text(&mut self, phone: &str, body: &str) -> Result<DeliveryReport> {
        if body.is_empty() {
            return Ok(DeliveryReport::NullPayload);
        }
        self.port
            .write_all(format!("AT+CMGS=\"{}\"", phone).as_bytes())?;
        self.port.write_all(b"\r")?;
        self.port.flush()?;
        self.await_body_prompt()?;
        self.port.write_all(body.as_bytes())?;
        self.port.write_all(&[0x1A])?; // Ctrl-Z terminates the body
        self.port.flush()?;
        let response = self.read_until_terminal("AT+CMGS", Self::SEND_DEADLINE)?;
        Ok(classify_send_response(&response))
    }
}
