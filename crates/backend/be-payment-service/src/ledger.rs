use std::future::Future;

use be_remote_db::{DatabaseManager, DbResult, NewPayment, PaymentCommit, PaymentRecord};
use tracing::debug;

use crate::error::PaymentError;

/// Storage operations the payment flow depends on.
pub trait PaymentLedger: Send + Sync + 'static {
    fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> impl Future<Output = DbResult<Option<PaymentRecord>>> + Send;

    fn tracking_id_taken(&self, tracking_id: &str) -> impl Future<Output = DbResult<bool>> + Send;

    /// Marks the parcel paid and inserts the ledger row atomically. Writes
    /// nothing when the parcel is already paid under another transaction.
    fn commit_payment(
        &self,
        payment: NewPayment,
    ) -> impl Future<Output = DbResult<PaymentCommit>> + Send;

    fn payment_history(
        &self,
        customer_email: Option<&str>,
    ) -> impl Future<Output = DbResult<Vec<PaymentRecord>>> + Send;
}

impl PaymentLedger for DatabaseManager {
    async fn find_by_transaction(&self, transaction_id: &str) -> DbResult<Option<PaymentRecord>> {
        self.find_payment_by_transaction()
            .transaction_id(transaction_id)
            .call()
            .await
    }

    async fn tracking_id_taken(&self, tracking_id: &str) -> DbResult<bool> {
        self.tracking_id_exists()
            .tracking_id(tracking_id)
            .call()
            .await
    }

    async fn commit_payment(&self, payment: NewPayment) -> DbResult<PaymentCommit> {
        self.record_payment().payment(payment).call().await
    }

    async fn payment_history(&self, customer_email: Option<&str>) -> DbResult<Vec<PaymentRecord>> {
        self.list_payments()
            .maybe_customer_email(customer_email)
            .call()
            .await
    }
}

/// Payment history, newest first, optionally narrowed to one customer.
///
/// Callers are expected to have authenticated the request already; the
/// filter is not checked against the caller's identity.
pub async fn list_payments<L: PaymentLedger>(
    ledger: &L,
    customer_email: Option<&str>,
) -> Result<Vec<PaymentRecord>, PaymentError> {
    let customer_email = customer_email.map(str::trim).filter(|e| !e.is_empty());
    let payments = ledger.payment_history(customer_email).await?;
    debug!(count = payments.len(), ?customer_email, "Listed payments");
    Ok(payments)
}
