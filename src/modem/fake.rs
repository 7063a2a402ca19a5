//! Scripted transport used by tests to exercise the relay without hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::{DeliveryReport, SmsTransport};

/// One recorded send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSend {
    pub phone: String,
    pub body: String,
}

/// Shared inner state so a test can keep inspecting the fake after the
/// relay has taken ownership of the transport.
#[derive(Default)]
struct FakeState {
    script: VecDeque<Result<DeliveryReport, String>>,
    sends: Vec<RecordedSend>,
    probe_failure: Option<String>,
    probes: usize,
}

/// Minimal fake modem: scripted send outcomes, recorded writes.
///
/// An exhausted script answers like the real modem: `NullPayload` for an
/// empty body, `Sent` otherwise. That keeps long-running poller tests
/// from needing exact cycle counts.
#[derive(Clone, Default)]
pub struct FakeModem {
    state: Arc<Mutex<FakeState>>,
}

impl FakeModem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake whose `probe` fails with `reason`, for permission-gate tests.
    pub fn unavailable(reason: &str) -> Self {
        let fake = Self::new();
        fake.state.lock().unwrap().probe_failure = Some(reason.to_string());
        fake
    }

    /// Queue the outcome of the next unscripted send. `Err` strings become
    /// transport errors (the "send exception" path).
    pub fn push_outcome(&self, outcome: Result<DeliveryReport, String>) {
        self.state.lock().unwrap().script.push_back(outcome);
    }

    pub fn sends(&self) -> Vec<RecordedSend> {
        self.state.lock().unwrap().sends.clone()
    }

    pub fn send_count(&self) -> usize {
        self.state.lock().unwrap().sends.len()
    }

    pub fn probe_count(&self) -> usize {
        self.state.lock().unwrap().probes
    }
}

impl SmsTransport for FakeModem {
    fn probe(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.probes += 1;
        match &state.probe_failure {
            Some(reason) => Err(anyhow!("{}", reason)),
            None => Ok(()),
        }
    }

    fn send_text(&mut self, phone: &str, body: &str) -> Result<DeliveryReport> {
        let mut state = self.state.lock().unwrap();
        state.sends.push(RecordedSend {
            phone: phone.to_string(),
            body: body.to_string(),
        });
        match state.script.pop_front() {
            Some(Ok(report)) => Ok(report),
            Some(Err(reason)) => Err(anyhow!("{}", reason)),
            None if body.is_empty() => Ok(DeliveryReport::NullPayload),
            None => Ok(DeliveryReport::Sent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_sends_and_follows_script() {
        let fake = FakeModem::new();
        fake.push_outcome(Ok(DeliveryReport::RadioOff));
        fake.push_outcome(Err("port vanished".into()));

        let mut transport = fake.clone();
        assert_eq!(
            transport.send_text("+15550001111", "hello").unwrap(),
            DeliveryReport::RadioOff
        );
        assert!(transport.send_text("+15550001111", "again").is_err());
        // Script exhausted: defaults to Sent
        assert_eq!(
            transport.send_text("+15550001111", "third").unwrap(),
            DeliveryReport::Sent
        );

        let sends = fake.sends();
        assert_eq!(sends.len(), 3);
        assert_eq!(sends[0].phone, "+15550001111");
        assert_eq!(sends[0].body, "hello");
    }

    #[test]
    fn unscripted_empty_body_is_null_payload() {
        let fake = FakeModem::new();
        let mut transport = fake.clone();
        assert_eq!(
            transport.send_text("+15550001111", "").unwrap(),
            DeliveryReport::NullPayload
        );
    }

    #[test]
    fn unavailable_fake_fails_probe() {
        let fake = FakeModem::unavailable("no modem attached");
        let mut transport = fake.clone();
        assert!(transport.probe().is_err());
        assert_eq!(fake.probe_count(), 1);
        assert_eq!(fake.send_count(), 0);
    }
}
