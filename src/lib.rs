//! # smsgate - SMS Gateway Relay Daemon
//!
//! smsgate polls a local development server for queued outbound SMS
//! messages and relays each one through an attached GSM modem, keeping a
//! running count of successfully sent messages.
//!
//! ## Features
//!
//! - **Periodic Polling**: One HTTP GET per cycle against the queue
//!   server's `/getSMS` endpoint, on a fixed (default 5s) schedule.
//! - **GSM Modem Integration**: Text-mode AT commands over USB/UART
//!   serial links, with terminal delivery reports.
//! - **Fail-Quiet Cycles**: Network, parse, and send failures are logged
//!   and skipped; the next tick is the only retry.
//! - **Daemon Mode**: Background service support (Linux/macOS) with
//!   graceful shutdown and TTY-aware logging.
//! - **Async Design**: Built with Tokio; the counter lives on a single
//!   task and needs no locking.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smsgate::config::Config;
//! use smsgate::gateway::GatewayServer;
//! use smsgate::modem::DisconnectedModem;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!
//!     // A real deployment opens a GsmModem here (feature "serial")
//!     let transport = Box::new(DisconnectedModem::new("example"));
//!     let mut server = GatewayServer::new(config, transport);
//!     let _ = server.start_polling().await;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`gateway`] - Server loop, poller, and fetch cycles
//! - [`upstream`] - Queue server HTTP client and wire format
//! - [`modem`] - GSM modem communication and the transport seam
//! - [`config`] - Configuration management
//! - [`validation`] - Recipient and body validation
//! - [`metrics`] - Process-lifetime relay counters

pub mod config;
pub mod gateway;
pub mod logutil;
pub mod metrics;
pub mod modem;
pub mod upstream;
pub mod validation;
