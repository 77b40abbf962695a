//! Confirms completed checkout sessions and applies their effect exactly once.

use std::sync::Arc;

use be_remote_db::error::{
    PARCELS_TRACKING_ID_KEY, PAYMENTS_TRACKING_ID_KEY, PAYMENTS_TRANSACTION_ID_KEY,
};
use be_remote_db::{NewPayment, ParcelUpdate, PaymentCommit, PaymentRecord, PaymentStatus};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::analytics;
use crate::checkout::from_minor_units;
use crate::error::PaymentError;
use crate::ledger::PaymentLedger;
use crate::provider::{CheckoutProvider, CheckoutSessionSnapshot};
use crate::tracking::issue_tracking_id;

/// Commit attempts when a freshly issued tracking id loses a race.
const MAX_COMMIT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationResult {
    /// This call marked the parcel paid and wrote the ledger entry.
    Completed {
        tracking_id: String,
        transaction_id: String,
        parcel_update: ParcelUpdate,
        payment_record: PaymentRecord,
    },
    /// A ledger entry for the transaction already existed; nothing was written.
    AlreadyProcessed {
        tracking_id: String,
        transaction_id: String,
    },
    /// The provider has not collected the payment.
    NotPaid { payment_status: PaymentStatus },
    /// The session is paid but its parcel was already paid under another
    /// transaction. Nothing was written; `tracking_id` is the parcel's own.
    ParcelAlreadyPaid {
        tracking_id: String,
        transaction_id: String,
    },
}

impl ReconciliationResult {
    fn already_processed(existing: PaymentRecord) -> Self {
        Self::AlreadyProcessed {
            tracking_id: existing.tracking_id,
            transaction_id: existing.transaction_id,
        }
    }

    pub fn tracking_id(&self) -> Option<&str> {
        match self {
            Self::Completed { tracking_id, .. }
            | Self::AlreadyProcessed { tracking_id, .. }
            | Self::ParcelAlreadyPaid { tracking_id, .. } => Some(tracking_id),
            Self::NotPaid { .. } => None,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::AlreadyProcessed { .. } => "already_processed",
            Self::NotPaid { .. } => "not_paid",
            Self::ParcelAlreadyPaid { .. } => "parcel_already_paid",
        }
    }
}

impl Serialize for ReconciliationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Completed {
                tracking_id,
                transaction_id,
                parcel_update,
                payment_record,
            } => {
                let mut s = serializer.serialize_struct("ReconciliationResult", 5)?;
                s.serialize_field("success", &true)?;
                s.serialize_field("trackingId", tracking_id)?;
                s.serialize_field("transactionId", transaction_id)?;
                s.serialize_field("parcelUpdateResult", parcel_update)?;
                s.serialize_field("paymentRecord", payment_record)?;
                s.end()
            }
            Self::AlreadyProcessed {
                tracking_id,
                transaction_id,
            } => {
                let mut s = serializer.serialize_struct("ReconciliationResult", 4)?;
                s.serialize_field("success", &true)?;
                s.serialize_field("alreadyProcessed", &true)?;
                s.serialize_field("trackingId", tracking_id)?;
                s.serialize_field("transactionId", transaction_id)?;
                s.end()
            }
            Self::NotPaid { payment_status } => {
                let mut s = serializer.serialize_struct("ReconciliationResult", 2)?;
                s.serialize_field("success", &false)?;
                s.serialize_field("paymentStatus", payment_status)?;
                s.end()
            }
            Self::ParcelAlreadyPaid {
                tracking_id,
                transaction_id,
            } => {
                let mut s = serializer.serialize_struct("ReconciliationResult", 4)?;
                s.serialize_field("success", &false)?;
                s.serialize_field("parcelAlreadyPaid", &true)?;
                s.serialize_field("trackingId", tracking_id)?;
                s.serialize_field("transactionId", transaction_id)?;
                s.end()
            }
        }
    }
}

/// Applies completed checkout sessions to parcels and the payment ledger.
///
/// Safe to call repeatedly for the same session: the ledger's transaction
/// reference is the idempotency key, and a concurrent duplicate that slips
/// past the read is resolved by the ledger's uniqueness constraint.
pub struct Reconciler<P, L> {
    provider: Arc<P>,
    ledger: Arc<L>,
}

impl<P: CheckoutProvider, L: PaymentLedger> Reconciler<P, L> {
    pub fn new(provider: Arc<P>, ledger: Arc<L>) -> Self {
        Self { provider, ledger }
    }

    #[instrument(skip(self))]
    pub async fn reconcile_payment(
        &self,
        session_id: &str,
    ) -> Result<ReconciliationResult, PaymentError> {
        let session = self.provider.retrieve_session(session_id).await?;
        let transaction_id = session.transaction_id();

        if let Some(existing) = self.ledger.find_by_transaction(transaction_id).await? {
            info!(
                transaction_id,
                tracking_id = %existing.tracking_id,
                "Payment already reconciled"
            );
            return Ok(self.finish(ReconciliationResult::already_processed(existing)));
        }

        if !session.is_paid() {
            info!(
                transaction_id,
                payment_status = %session.payment_status,
                "Checkout session not paid yet"
            );
            return Ok(self.finish(ReconciliationResult::NotPaid {
                payment_status: session.payment_status,
            }));
        }

        let payment = pending_payment(&session)?;
        let result = self.commit(payment).await?;
        Ok(self.finish(result))
    }

    async fn commit(&self, mut payment: NewPayment) -> Result<ReconciliationResult, PaymentError> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            // Parcel and ledger must carry the same id, so it is issued once per attempt.
            payment.tracking_id = issue_tracking_id(self.ledger.as_ref()).await?;

            match self.ledger.commit_payment(payment.clone()).await {
                Ok(PaymentCommit::Recorded(recorded)) => {
                    if recorded.parcel_update.matched_count == 0 {
                        warn!(
                            parcel_id = %payment.parcel_id,
                            transaction_id = %payment.transaction_id,
                            "Paid session references no parcel; payment recorded anyway"
                        );
                    }

                    info!(
                        transaction_id = %payment.transaction_id,
                        tracking_id = %payment.tracking_id,
                        parcel_id = %payment.parcel_id,
                        "Payment reconciled"
                    );

                    return Ok(ReconciliationResult::Completed {
                        tracking_id: recorded.record.tracking_id.clone(),
                        transaction_id: recorded.record.transaction_id.clone(),
                        parcel_update: recorded.parcel_update,
                        payment_record: recorded.record,
                    });
                }
                Ok(PaymentCommit::ParcelAlreadyPaid { tracking_id }) => {
                    warn!(
                        parcel_id = %payment.parcel_id,
                        transaction_id = %payment.transaction_id,
                        %tracking_id,
                        "Parcel already paid by another transaction; payment needs a refund"
                    );
                    return Ok(ReconciliationResult::ParcelAlreadyPaid {
                        tracking_id,
                        transaction_id: payment.transaction_id.clone(),
                    });
                }
                Err(e) if e.violates(PAYMENTS_TRANSACTION_ID_KEY) => {
                    info!(
                        transaction_id = %payment.transaction_id,
                        "Concurrent reconciliation won the race, re-reading ledger"
                    );
                    let existing = self
                        .ledger
                        .find_by_transaction(&payment.transaction_id)
                        .await
                        .map_err(PaymentError::reconciliation)?
                        .ok_or_else(|| {
                            PaymentError::reconciliation(
                                "ledger reported a duplicate transaction that cannot be read back",
                            )
                        })?;
                    return Ok(ReconciliationResult::already_processed(existing));
                }
                Err(e)
                    if e.violates(PAYMENTS_TRACKING_ID_KEY)
                        || e.violates(PARCELS_TRACKING_ID_KEY) =>
                {
                    warn!(
                        attempt,
                        tracking_id = %payment.tracking_id,
                        "Tracking id taken between issue and commit, retrying"
                    );
                }
                Err(e) => return Err(PaymentError::reconciliation(e)),
            }
        }

        Err(PaymentError::reconciliation(
            "tracking id kept colliding while committing payment",
        ))
    }

    fn finish(&self, result: ReconciliationResult) -> ReconciliationResult {
        analytics::track_payment_reconciled(result.outcome());
        result
    }
}

/// Ledger entry for a paid session, before a tracking id is assigned.
fn pending_payment(session: &CheckoutSessionSnapshot) -> Result<NewPayment, PaymentError> {
    let parcel_id = session
        .parcel_id()
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| {
            PaymentError::reconciliation(format!(
                "session {} carries no valid parcel id",
                session.id
            ))
        })?;

    let amount_total = session.amount_total.ok_or_else(|| {
        PaymentError::reconciliation(format!("session {} has no amount", session.id))
    })?;

    let currency = session.currency.clone().ok_or_else(|| {
        PaymentError::reconciliation(format!("session {} has no currency", session.id))
    })?;

    Ok(NewPayment {
        amount: from_minor_units(amount_total),
        currency,
        customer_email: session.customer_email.clone(),
        parcel_id,
        transaction_id: session.transaction_id().to_string(),
        payment_status: session.payment_status,
        tracking_id: String::new(),
    })
}
