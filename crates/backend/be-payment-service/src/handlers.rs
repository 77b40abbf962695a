use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use be_remote_db::PaymentRecord;
use tracing::info;

use crate::analytics;
use crate::auth::AuthUser;
use crate::error::PaymentError;
use crate::ledger::{PaymentLedger, list_payments as list_ledger_payments};
use crate::provider::CheckoutProvider;
use crate::reconcile::ReconciliationResult;
use crate::service::AppState;
use crate::types::{CheckoutRequest, CheckoutResponse, PaymentsQuery, SessionQuery};

// ---------------------------------------------------------------------------
// POST /payment-checkout-session
// ---------------------------------------------------------------------------

/// Opens a hosted checkout page for the parcel and returns its URL.
pub async fn create_checkout_session<P: CheckoutProvider, L: PaymentLedger>(
    State(state): State<Arc<AppState<P, L>>>,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, PaymentError> {
    // The provider owns email validation; its rejections come back as `Provider`.
    let url = state
        .checkout
        .create_checkout_session(body.parcel_id, body.cost, &body.parcel_name, &body.sender_email)
        .await?;

    Ok(Json(CheckoutResponse { url }))
}

// ---------------------------------------------------------------------------
// PATCH /payment-success?session_id=cs_xxx
// ---------------------------------------------------------------------------

/// Confirms a checkout session after the customer is redirected back.
pub async fn payment_success<P: CheckoutProvider, L: PaymentLedger>(
    State(state): State<Arc<AppState<P, L>>>,
    Query(params): Query<SessionQuery>,
) -> Result<Json<ReconciliationResult>, PaymentError> {
    let session_id = params
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(PaymentError::InvalidField("session_id"))?;

    match state.reconciler.reconcile_payment(&session_id).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            analytics::track_payment_reconciliation_failed(e.kind());
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// GET /payments?email=a@x.com
// ---------------------------------------------------------------------------

/// Payment history, newest first. Requires a bearer token.
pub async fn list_payments<P: CheckoutProvider, L: PaymentLedger>(
    State(state): State<Arc<AppState<P, L>>>,
    AuthUser(claims): AuthUser,
    Query(params): Query<PaymentsQuery>,
) -> Result<Json<Vec<PaymentRecord>>, PaymentError> {
    let payments = list_ledger_payments(state.ledger.as_ref(), params.email.as_deref()).await?;

    info!(caller = %claims.sub, count = payments.len(), "Payment history requested");
    analytics::track_payment_history_listed(params.email.is_some(), payments.len());

    Ok(Json(payments))
}
