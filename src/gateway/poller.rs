//! Periodic fetch-and-send driver.
//!
//! The poller owns a cancellable driver task that ticks on a fixed
//! interval and spawns one fetch cycle per tick. Cycles report back over
//! an mpsc channel; a dropped receiver just means nobody is watching
//! anymore and the outcome is discarded.
//!
//! Known limitation, kept on purpose: ticks are not mutually exclusive
//! against a cycle that runs long, so two fetches can be in flight at
//! once. Stopping the poller only cancels future ticks, never a cycle
//! already underway.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::logutil::escape_log;
use crate::metrics;
use crate::modem::{DeliveryReport, SmsTransport};
use crate::upstream::QueueClient;
use crate::validation::{validate_body, validate_phone};

/// Result of one fetch cycle, delivered to whoever owns the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The transport dispatched this record to the network. The report is
    /// the terminal radio outcome, already logged; for a dispatched
    /// message it stays observational. A `NullPayload` report never gets
    /// here — nothing was transmitted, so that cycle is `Failed`.
    Sent { id: String, report: DeliveryReport },
    /// The queue had nothing unsent.
    Idle,
    /// Fetch, parse, validation, or send failed. Details are in the log;
    /// the next tick is the only retry.
    Failed,
}

pub type SharedTransport = Arc<Mutex<Box<dyn SmsTransport>>>;

/// Fetch-and-send scheduler with start/stop semantics.
pub struct Poller {
    client: QueueClient,
    transport: SharedTransport,
    interval_ms: u64,
    outcome_tx: mpsc::UnboundedSender<CycleOutcome>,
    driver: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new(
        client: QueueClient,
        transport: Box<dyn SmsTransport>,
        interval_ms: u64,
        outcome_tx: mpsc::UnboundedSender<CycleOutcome>,
    ) -> Self {
        Self {
            client,
            transport: Arc::new(Mutex::new(transport)),
            interval_ms,
            outcome_tx,
            driver: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.driver
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Probe the transport and begin the tick schedule.
    ///
    /// Idempotent: calling `start` while the schedule is active is a
    /// no-op. A failed probe leaves the poller inactive and returns the
    /// error so the caller can surface a notice.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            debug!("Poller already running; start ignored");
            return Ok(());
        }

        self.transport
            .lock()
            .await
            .probe()
            .context("SMS transport probe failed")?;

        let client = self.client.clone();
        let transport = self.transport.clone();
        let outcome_tx = self.outcome_tx.clone();
        let period = Duration::from_millis(self.interval_ms);

        info!(
            "Poller started: fetching {} every {}ms",
            client.poll_url(),
            self.interval_ms
        );

        self.driver = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let client = client.clone();
                let transport = transport.clone();
                let outcome_tx = outcome_tx.clone();
                // Each cycle is its own task so a slow fetch never stalls
                // the schedule (and can therefore overlap the next one).
                tokio::spawn(async move {
                    let outcome = run_cycle(&client, &transport).await;
                    let _ = outcome_tx.send(outcome);
                });
            }
        }));

        Ok(())
    }

    /// Cancel future ticks. No effect if the poller is not running; a
    /// cycle already in flight finishes on its own.
    pub fn stop(&mut self) {
        if let Some(handle) = self.driver.take() {
            handle.abort();
            info!("Poller stopped");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One fetch-and-maybe-send cycle. Every failure is logged and swallowed
/// here; the caller only sees the outcome class.
pub async fn run_cycle(client: &QueueClient, transport: &SharedTransport) -> CycleOutcome {
    metrics::inc_cycles_run();

    let pending = match client.fetch_pending().await {
        Ok(pending) => pending,
        Err(e) => {
            warn!("Fetch cycle failed: {:#}", e);
            metrics::inc_fetch_errors();
            return CycleOutcome::Failed;
        }
    };

    let message = match pending {
        Some(message) => message,
        None => {
            debug!("No unsent messages available");
            metrics::inc_empty_polls();
            return CycleOutcome::Idle;
        }
    };

    let phone = match validate_phone(&message.phone) {
        Ok(phone) => phone,
        Err(e) => {
            warn!("Rejecting queue record {}: {}", message.id, e);
            metrics::inc_send_failures();
            return CycleOutcome::Failed;
        }
    };
    if let Err(e) = validate_body(&message.body) {
        warn!("Rejecting queue record {}: {}", message.id, e);
        metrics::inc_send_failures();
        return CycleOutcome::Failed;
    }

    info!(
        "Sending SMS to {}: {}",
        phone,
        escape_log(&message.body)
    );

    match transport.lock().await.send_text(&phone, &message.body) {
        Ok(report) => {
            metrics::record_delivery_report(report);
            match report {
                DeliveryReport::Sent => info!("SMS sent successfully"),
                other => warn!("SMS delivery report: {}", other),
            }
            if report == DeliveryReport::NullPayload {
                // Nothing went over the wire; an empty body is a failed
                // cycle, not a send.
                metrics::inc_send_failures();
                return CycleOutcome::Failed;
            }
            CycleOutcome::Sent {
                id: message.id,
                report,
            }
        }
        Err(e) => {
            warn!("Failed to send SMS: {:#}", e);
            metrics::inc_send_failures();
            CycleOutcome::Failed
        }
    }
}

/// Wrap a boxed transport the way [`Poller`] holds one. Handy for tests
/// that drive [`run_cycle`] directly.
pub fn shared_transport(transport: Box<dyn SmsTransport>) -> SharedTransport {
    Arc::new(Mutex::new(transport))
}
