//! # Gateway Server - Core Application Controller
//!
//! The [`GatewayServer`] wires the poller, the queue client, and the SMS
//! transport together and owns the one piece of mutable state the whole
//! daemon has: the sent-message counter.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │  Queue Server   │───→│     Poller      │───→│   GSM Modem     │
//! │  (HTTP /getSMS) │    │  (fetch cycle)  │    │  (SmsTransport) │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//!                               │ outcomes (mpsc)
//!                        ┌─────────────────┐
//!                        │  GatewayServer  │ ← counter, display line
//!                        └─────────────────┘
//! ```
//!
//! The counter is only ever touched on the server loop, so no lock guards
//! it. It increments by exactly one per successful send and never
//! decreases; restart resets it.

pub mod poller;

use anyhow::Result;
use log::{info, warn};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::metrics;
use crate::modem::SmsTransport;
use crate::upstream::QueueClient;
use poller::{CycleOutcome, Poller};

pub struct GatewayServer {
    config: Config,
    poller: Poller,
    outcome_rx: mpsc::UnboundedReceiver<CycleOutcome>,
    sent_count: u64,
}

impl GatewayServer {
    pub fn new(config: Config, transport: Box<dyn SmsTransport>) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let client = QueueClient::new(config.upstream.clone());
        let poller = Poller::new(
            client,
            transport,
            config.effective_poll_interval_ms(),
            outcome_tx,
        );
        Self {
            config,
            poller,
            outcome_rx,
            sent_count: 0,
        }
    }

    pub fn sent_count(&self) -> u64 {
        self.sent_count
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Start the poll schedule. A failed transport probe is surfaced as a
    /// warning and leaves the poller inactive; whether that is fatal is
    /// the caller's call (`require_modem_at_startup`).
    pub async fn start_polling(&mut self) -> Result<()> {
        match self.poller.start().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Poller not started: {:#}", e);
                Err(e)
            }
        }
    }

    pub fn stop_polling(&mut self) {
        self.poller.stop();
    }

    /// Drive the server until Ctrl-C. Each successful cycle bumps the
    /// counter and reprints the display line.
    pub async fn run(&mut self) -> Result<()> {
        info!("Messages sent: {}", self.sent_count);
        loop {
            tokio::select! {
                outcome = self.outcome_rx.recv() => {
                    match outcome {
                        Some(outcome) => self.observe(outcome),
                        None => break,
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    self.poller.stop();
                    break;
                }
            }
        }
        Ok(())
    }

    /// Fold one cycle outcome into the counter. Only `Sent` moves it.
    pub fn observe(&mut self, outcome: CycleOutcome) {
        if let CycleOutcome::Sent { .. } = outcome {
            self.sent_count += 1;
            metrics::inc_messages_sent();
            info!("Messages sent: {}", self.sent_count);
        }
    }

    /// Human-readable configuration summary for the `status` command.
    ///
    /// Counters and poller liveness belong to the running daemon's
    /// process; a fresh `status` invocation cannot observe them, so it
    /// points at the log instead of printing zeros.
    pub fn status_summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("smsgate v{}\n", env!("CARGO_PKG_VERSION")));
        out.push_str(&format!(
            "  queue url:      {}\n",
            self.config.upstream.poll_url()
        ));
        out.push_str(&format!(
            "  poll interval:  {}ms\n",
            self.config.effective_poll_interval_ms()
        ));
        out.push_str(&format!("  modem port:     {}\n", self.config.modem.port));
        match &self.config.logging.file {
            Some(file) => out.push_str(&format!(
                "  sent counter:   see 'Messages sent:' lines in {}\n",
                file
            )),
            None => out.push_str("  sent counter:   logged by the running gateway\n"),
        }
        out
    }

    /// Print the status summary to stdout.
    pub fn show_status(&self) {
        print!("{}", self.status_summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::fake::FakeModem;
    use crate::modem::DeliveryReport;

    fn test_server() -> GatewayServer {
        GatewayServer::new(Config::default(), Box::new(FakeModem::new()))
    }

    #[test]
    fn counter_moves_only_on_sent() {
        let mut server = test_server();
        assert_eq!(server.sent_count(), 0);

        server.observe(CycleOutcome::Idle);
        server.observe(CycleOutcome::Failed);
        assert_eq!(server.sent_count(), 0);

        server.observe(CycleOutcome::Sent {
            id: "1".into(),
            report: DeliveryReport::Sent,
        });
        assert_eq!(server.sent_count(), 1);

        // Delivery report class is logged only; it never gates the counter
        server.observe(CycleOutcome::Sent {
            id: "2".into(),
            report: DeliveryReport::RadioOff,
        });
        assert_eq!(server.sent_count(), 2);
    }

    #[test]
    fn status_summary_reports_config_not_live_state() {
        let server = test_server();
        let summary = server.status_summary();
        assert!(summary.contains("http://127.0.0.1:3000/getSMS"));
        assert!(summary.contains("5000ms"));
        // A fresh process cannot see the daemon's counters, so the
        // summary must not pretend otherwise.
        assert!(!summary.contains("messages sent:"));
        assert!(!summary.contains("poller active:"));
        assert!(summary.contains("Messages sent:"), "should point at the log");
    }

    #[tokio::test]
    async fn probe_failure_leaves_poller_inactive() {
        let mut server = GatewayServer::new(
            Config::default(),
            Box::new(FakeModem::unavailable("no modem attached")),
        );
        assert!(server.start_polling().await.is_err());
        assert!(!server.is_polling());
    }
}
