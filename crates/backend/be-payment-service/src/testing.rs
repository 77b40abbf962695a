//! In-memory stand-ins for the checkout provider and the payment ledger.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use be_remote_db::error::{
    PARCELS_TRACKING_ID_KEY, PAYMENTS_TRACKING_ID_KEY, PAYMENTS_TRANSACTION_ID_KEY,
};
use be_remote_db::{
    DbError, DbResult, Json, NewPayment, Parcel, ParcelUpdate, PaymentCommit, PaymentRecord,
    PaymentStatus, RecordedPayment,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::error::PaymentError;
use crate::ledger::PaymentLedger;
use crate::provider::{
    CheckoutProvider, CheckoutSessionSnapshot, CreatedSession, NewCheckoutSession,
    PARCEL_ID_METADATA_KEY,
};
use crate::tracking::generate_tracking_id;

pub fn test_config() -> PaymentConfig {
    PaymentConfig::new("sk_test_fake", "http://localhost:5173", "usd")
        .expect("static test config is valid")
}

pub fn new_payment(transaction_id: &str, customer_email: &str) -> NewPayment {
    NewPayment {
        amount: Decimal::new(1000, 2),
        currency: "usd".to_string(),
        customer_email: Some(customer_email.to_string()),
        parcel_id: Uuid::now_v7(),
        transaction_id: transaction_id.to_string(),
        payment_status: PaymentStatus::Paid,
        tracking_id: generate_tracking_id(),
    }
}

#[derive(Default)]
pub struct FakeCheckout {
    sessions: Mutex<HashMap<String, CheckoutSessionSnapshot>>,
    created: Mutex<Vec<NewCheckoutSession>>,
    fail_next: AtomicBool,
}

impl FakeCheckout {
    /// Next provider call fails as if the provider were unreachable.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn created_sessions(&self) -> Vec<NewCheckoutSession> {
        self.created.lock().unwrap().clone()
    }

    /// Registers an unpaid session for the parcel and returns its id.
    pub fn open_session(&self, parcel_id: Uuid, amount_total: i64, customer_email: &str) -> String {
        let id = format!("cs_test_{}", Uuid::now_v7().simple());
        let snapshot = CheckoutSessionSnapshot {
            id: id.clone(),
            amount_total: Some(amount_total),
            currency: Some("usd".to_string()),
            customer_email: Some(customer_email.to_string()),
            metadata: HashMap::from([(
                PARCEL_ID_METADATA_KEY.to_string(),
                parcel_id.to_string(),
            )]),
            payment_status: PaymentStatus::Unpaid,
            payment_intent: None,
        };
        self.sessions.lock().unwrap().insert(id.clone(), snapshot);
        id
    }

    pub fn mark_paid(&self, session_id: &str, payment_intent: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(session_id).expect("unknown test session");
        session.payment_status = PaymentStatus::Paid;
        session.payment_intent = Some(payment_intent.to_string());
    }

    pub fn clear_metadata(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(session_id).expect("unknown test session");
        session.metadata.clear();
    }

    fn check_outage(&self) -> Result<(), PaymentError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PaymentError::Provider("simulated provider outage".into()));
        }
        Ok(())
    }
}

impl CheckoutProvider for FakeCheckout {
    async fn create_session(
        &self,
        session: NewCheckoutSession,
    ) -> Result<CreatedSession, PaymentError> {
        self.check_outage()?;
        let id = self.open_session(session.parcel_id, session.unit_amount, &session.customer_email);
        self.created.lock().unwrap().push(session);
        Ok(CreatedSession {
            url: format!("https://checkout.test/pay/{id}"),
            id,
        })
    }

    async fn retrieve_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionSnapshot, PaymentError> {
        self.check_outage()?;
        tokio::task::yield_now().await;
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentError::SessionNotFound(session_id.to_string()))
    }
}

#[derive(Default)]
struct LedgerState {
    parcels: HashMap<Uuid, Parcel>,
    payments: Vec<PaymentRecord>,
}

impl LedgerState {
    fn tracking_id_taken(&self, tracking_id: &str) -> bool {
        self.payments.iter().any(|p| p.tracking_id == tracking_id)
            || self
                .parcels
                .values()
                .any(|p| p.tracking_id.as_deref() == Some(tracking_id))
    }

    /// Same checks and effects as the single database transaction.
    fn commit(&mut self, payment: NewPayment) -> DbResult<PaymentCommit> {
        if self
            .payments
            .iter()
            .any(|p| p.transaction_id == payment.transaction_id)
        {
            return Err(DbError::duplicate(PAYMENTS_TRANSACTION_ID_KEY));
        }
        if self.payments.iter().any(|p| p.tracking_id == payment.tracking_id) {
            return Err(DbError::duplicate(PAYMENTS_TRACKING_ID_KEY));
        }
        if self
            .parcels
            .values()
            .any(|p| p.tracking_id.as_deref() == Some(payment.tracking_id.as_str()))
        {
            return Err(DbError::duplicate(PARCELS_TRACKING_ID_KEY));
        }

        let mut parcel_update = ParcelUpdate::default();
        if let Some(parcel) = self.parcels.get_mut(&payment.parcel_id) {
            if parcel.is_paid() {
                return Ok(PaymentCommit::ParcelAlreadyPaid {
                    tracking_id: parcel.tracking_id.clone().unwrap_or_default(),
                });
            }
            parcel.payment_status = Some(PaymentStatus::Paid);
            parcel.tracking_id = Some(payment.tracking_id.clone());
            parcel_update.matched_count = 1;
            parcel_update.modified_count = 1;
        }

        let record = payment.into_record(Uuid::now_v7(), Utc::now());
        self.payments.push(record.clone());
        Ok(PaymentCommit::Recorded(RecordedPayment {
            parcel_update,
            record,
        }))
    }
}

/// Consumes one unit of a countdown; `usize::MAX` never runs out.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
            0 => None,
            usize::MAX => Some(n),
            n => Some(n - 1),
        })
        .is_ok()
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    commit_calls: AtomicUsize,
    fail_next_commit: AtomicBool,
    /// Commits still to fail as if their tracking id had just been taken.
    colliding_commits: AtomicUsize,
    /// Candidates still to report as taken; `usize::MAX` rejects forever.
    rejected_tracking_ids: AtomicUsize,
    checked_tracking_ids: Mutex<Vec<String>>,
    committed_tracking_ids: Mutex<Vec<String>>,
    /// A competing commit applied right after the next idempotency read.
    commit_behind_read: Mutex<Option<(String, Uuid)>>,
}

impl InMemoryLedger {
    pub fn add_parcel(&self, sender_email: &str, cost: Decimal) -> Parcel {
        let parcel = Parcel {
            id: Uuid::now_v7(),
            sender_email: sender_email.to_string(),
            parcel_name: "Test parcel".to_string(),
            cost,
            details: Json(serde_json::json!({})),
            payment_status: None,
            tracking_id: None,
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .unwrap()
            .parcels
            .insert(parcel.id, parcel.clone());
        parcel
    }

    pub fn parcel(&self, id: Uuid) -> Option<Parcel> {
        self.state.lock().unwrap().parcels.get(&id).cloned()
    }

    pub fn records(&self) -> Vec<PaymentRecord> {
        self.state.lock().unwrap().payments.clone()
    }

    pub fn insert_record(&self, payment: NewPayment, paid_at: DateTime<Utc>) {
        let record = payment.into_record(Uuid::now_v7(), paid_at);
        self.state.lock().unwrap().payments.push(record);
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub fn reject_all_tracking_ids(&self) {
        self.rejected_tracking_ids.store(usize::MAX, Ordering::SeqCst);
    }

    pub fn reject_next_tracking_ids(&self, count: usize) {
        self.rejected_tracking_ids.store(count, Ordering::SeqCst);
    }

    /// Every candidate passed to `tracking_id_taken`, in order.
    pub fn checked_tracking_ids(&self) -> Vec<String> {
        self.checked_tracking_ids.lock().unwrap().clone()
    }

    /// The next `count` commits fail on the tracking id unique key.
    pub fn collide_next_commits(&self, count: usize) {
        self.colliding_commits.store(count, Ordering::SeqCst);
    }

    /// Tracking id carried by every commit attempt, in order.
    pub fn committed_tracking_ids(&self) -> Vec<String> {
        self.committed_tracking_ids.lock().unwrap().clone()
    }

    pub fn commit_behind_next_read(&self, transaction_id: &str, parcel_id: Uuid) {
        *self.commit_behind_read.lock().unwrap() = Some((transaction_id.to_string(), parcel_id));
    }
}

impl PaymentLedger for InMemoryLedger {
    async fn find_by_transaction(&self, transaction_id: &str) -> DbResult<Option<PaymentRecord>> {
        let found = self
            .state
            .lock()
            .unwrap()
            .payments
            .iter()
            .find(|p| p.transaction_id == transaction_id)
            .cloned();

        let competing = self.commit_behind_read.lock().unwrap().take();
        if let Some((transaction_id, parcel_id)) = competing {
            let mut payment = new_payment(&transaction_id, "a@x.com");
            payment.parcel_id = parcel_id;
            self.state.lock().unwrap().commit(payment)?;
        }

        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn tracking_id_taken(&self, tracking_id: &str) -> DbResult<bool> {
        self.checked_tracking_ids
            .lock()
            .unwrap()
            .push(tracking_id.to_string());
        if take_one(&self.rejected_tracking_ids) {
            return Ok(true);
        }
        Ok(self.state.lock().unwrap().tracking_id_taken(tracking_id))
    }

    async fn commit_payment(&self, payment: NewPayment) -> DbResult<PaymentCommit> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        self.committed_tracking_ids
            .lock()
            .unwrap()
            .push(payment.tracking_id.clone());
        tokio::task::yield_now().await;
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(DbError::connection("simulated connection reset"));
        }
        if take_one(&self.colliding_commits) {
            return Err(DbError::duplicate(PAYMENTS_TRACKING_ID_KEY));
        }
        self.state.lock().unwrap().commit(payment)
    }

    async fn payment_history(&self, customer_email: Option<&str>) -> DbResult<Vec<PaymentRecord>> {
        let mut payments: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .payments
            .iter()
            .filter(|p| customer_email.is_none() || p.customer_email.as_deref() == customer_email)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        Ok(payments)
    }
}
