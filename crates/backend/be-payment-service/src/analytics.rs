use std::time::Duration;

use posthog_rs::Event;
use tracing::warn;

const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

fn capture_async(event: Event) {
    tokio::spawn(async move {
        match tokio::time::timeout(CAPTURE_TIMEOUT, posthog_rs::capture(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to capture analytics event: {e}"),
            Err(_) => warn!("Analytics event capture timed out"),
        }
    });
}

pub fn track_checkout_session_created(currency: &str) {
    let mut event = Event::new_anon("checkout_session_created");
    event.insert_prop("currency", currency).ok();
    capture_async(event);
}

pub fn track_checkout_session_creation_failed(error_kind: &str) {
    let mut event = Event::new_anon("checkout_session_creation_failed");
    event.insert_prop("error_kind", error_kind).ok();
    capture_async(event);
}

/// `outcome` is one of `completed`, `already_processed` or `not_paid`.
pub fn track_payment_reconciled(outcome: &str) {
    let mut event = Event::new_anon("payment_reconciled");
    event.insert_prop("outcome", outcome).ok();
    capture_async(event);
}

pub fn track_payment_reconciliation_failed(error_kind: &str) {
    let mut event = Event::new_anon("payment_reconciliation_failed");
    event.insert_prop("error_kind", error_kind).ok();
    capture_async(event);
}

pub fn track_payment_history_listed(filtered: bool, count: usize) {
    let mut event = Event::new_anon("payment_history_listed");
    event.insert_prop("filtered", filtered).ok();
    event.insert_prop("count", count).ok();
    capture_async(event);
}
