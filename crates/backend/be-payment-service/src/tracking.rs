//! Human-readable shipment tracking identifiers: `PRCL-YYYYMMDD-XXXXXX`.

use chrono::{NaiveDate, Utc};
use tracing::warn;

use crate::error::PaymentError;
use crate::ledger::PaymentLedger;

pub const TRACKING_ID_PREFIX: &str = "PRCL";

/// Draws before giving up when every candidate is already taken.
pub const MAX_TRACKING_ID_ATTEMPTS: usize = 5;

/// Fresh tracking id for today's UTC date. Never cache the result.
pub fn generate_tracking_id() -> String {
    generate_tracking_id_on(Utc::now().date_naive())
}

pub fn generate_tracking_id_on(date: NaiveDate) -> String {
    let suffix = hex::encode_upper(rand::random::<[u8; 3]>());
    format!("{TRACKING_ID_PREFIX}-{}-{suffix}", date.format("%Y%m%d"))
}

/// Draws tracking ids until one is unused by the ledger.
///
/// The random space is small (3 bytes per day), so candidates are checked
/// against issued ids instead of trusting chance.
pub async fn issue_tracking_id<L: PaymentLedger>(ledger: &L) -> Result<String, PaymentError> {
    for attempt in 1..=MAX_TRACKING_ID_ATTEMPTS {
        let candidate = generate_tracking_id();
        let taken = ledger
            .tracking_id_taken(&candidate)
            .await
            .map_err(PaymentError::reconciliation)?;
        if !taken {
            return Ok(candidate);
        }
        warn!(attempt, tracking_id = %candidate, "Tracking id collision, regenerating");
    }

    Err(PaymentError::reconciliation(
        "could not allocate an unused tracking id",
    ))
}

pub fn is_valid_tracking_id(id: &str) -> bool {
    let mut parts = id.split('-');
    let (Some(prefix), Some(date), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    prefix == TRACKING_ID_PREFIX
        && NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
        && date.len() == 8
        && suffix.len() == 6
        && suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryLedger;

    #[test]
    fn format_matches_prefix_date_and_hex() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let id = generate_tracking_id_on(date);

        assert!(id.starts_with("PRCL-20260307-"), "{id}");
        assert_eq!(id.len(), "PRCL-20260307-".len() + 6);
        assert!(is_valid_tracking_id(&id), "{id}");
    }

    #[test]
    fn uses_current_utc_date() {
        let today = Utc::now().format("%Y%m%d").to_string();
        let id = generate_tracking_id();
        assert_eq!(id.split('-').nth(1), Some(today.as_str()));
    }

    #[test]
    fn consecutive_ids_differ() {
        let ids: std::collections::HashSet<_> = (0..32).map(|_| generate_tracking_id()).collect();
        assert!(ids.len() > 1);
    }

    #[test]
    fn validator_rejects_malformed_ids() {
        assert!(!is_valid_tracking_id("PRCL-20260307-abcdef"));
        assert!(!is_valid_tracking_id("PKG-20260307-ABCDEF"));
        assert!(!is_valid_tracking_id("PRCL-2026037-ABCDEF"));
        assert!(!is_valid_tracking_id("PRCL-20260307-ABCDEF-1"));
    }

    #[tokio::test]
    async fn issue_skips_ids_already_in_use() {
        let ledger = InMemoryLedger::default();
        ledger.reject_next_tracking_ids(2);

        let id = issue_tracking_id(&ledger).await.unwrap();

        let checked = ledger.checked_tracking_ids();
        assert_eq!(checked.len(), 3);
        assert_eq!(checked.last(), Some(&id));
        assert!(is_valid_tracking_id(&id));
    }

    #[tokio::test]
    async fn issue_accepts_first_free_candidate() {
        let ledger = InMemoryLedger::default();
        let id = issue_tracking_id(&ledger).await.unwrap();
        assert_eq!(ledger.checked_tracking_ids(), [id]);
    }

    #[tokio::test]
    async fn issue_gives_up_when_every_candidate_is_taken() {
        let ledger = InMemoryLedger::default();
        ledger.reject_all_tracking_ids();

        let err = issue_tracking_id(&ledger).await.unwrap_err();
        assert!(matches!(err, PaymentError::Reconciliation(_)));
        assert_eq!(ledger.checked_tracking_ids().len(), MAX_TRACKING_ID_ATTEMPTS);
    }
}
