//! Process-lifetime relay counters.
//! Everything here is observational: the `status` command and tests read
//! these, but nothing in the relay path ever branches on them.
use std::sync::atomic::{AtomicU64, Ordering};

static CYCLES_RUN: AtomicU64 = AtomicU64::new(0);
static MESSAGES_SENT: AtomicU64 = AtomicU64::new(0);
static EMPTY_POLLS: AtomicU64 = AtomicU64::new(0);
static FETCH_ERRORS: AtomicU64 = AtomicU64::new(0);
static SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
static REPORT_OK: AtomicU64 = AtomicU64::new(0);
static REPORT_GENERIC_FAILURE: AtomicU64 = AtomicU64::new(0);
static REPORT_RADIO_OFF: AtomicU64 = AtomicU64::new(0);
static REPORT_NULL_PAYLOAD: AtomicU64 = AtomicU64::new(0);

pub fn inc_cycles_run() {
    CYCLES_RUN.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_messages_sent() {
    MESSAGES_SENT.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_empty_polls() {
    EMPTY_POLLS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_fetch_errors() {
    FETCH_ERRORS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_send_failures() {
    SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
}

/// Record one terminal delivery report class.
pub fn record_delivery_report(report: crate::modem::DeliveryReport) {
    use crate::modem::DeliveryReport::*;
    let counter = match report {
        Sent => &REPORT_OK,
        GenericFailure => &REPORT_GENERIC_FAILURE,
        RadioOff => &REPORT_RADIO_OFF,
        NullPayload => &REPORT_NULL_PAYLOAD,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub cycles_run: u64,
    pub messages_sent: u64,
    pub empty_polls: u64,
    pub fetch_errors: u64,
    pub send_failures: u64,
    pub report_ok: u64,
    pub report_generic_failure: u64,
    pub report_radio_off: u64,
    pub report_null_payload: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        cycles_run: CYCLES_RUN.load(Ordering::Relaxed),
        messages_sent: MESSAGES_SENT.load(Ordering::Relaxed),
        empty_polls: EMPTY_POLLS.load(Ordering::Relaxed),
        fetch_errors: FETCH_ERRORS.load(Ordering::Relaxed),
        send_failures: SEND_FAILURES.load(Ordering::Relaxed),
        report_ok: REPORT_OK.load(Ordering::Relaxed),
        report_generic_failure: REPORT_GENERIC_FAILURE.load(Ordering::Relaxed),
        report_radio_off: REPORT_RADIO_OFF.load(Ordering::Relaxed),
        report_null_payload: REPORT_NULL_PAYLOAD.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::DeliveryReport;

    // Counters are process-global and tests run in parallel, so these
    // assert monotonic movement rather than exact deltas.
    #[test]
    fn sent_counter_is_monotonic() {
        let before = snapshot().messages_sent;
        inc_messages_sent();
        inc_messages_sent();
        let after = snapshot().messages_sent;
        assert!(after >= before + 2);
    }

    #[test]
    fn delivery_reports_bucketed_by_class() {
        let before = snapshot();
        record_delivery_report(DeliveryReport::Sent);
        record_delivery_report(DeliveryReport::RadioOff);
        let after = snapshot();
        assert!(after.report_ok >= before.report_ok + 1);
        assert!(after.report_radio_off >= before.report_radio_off + 1);
    }
}
