//! Seam between the payment flow and the hosted checkout provider.

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;

use be_remote_db::PaymentStatus;
use stripe::{Client, ClientBuilder, RequestStrategy, StripeError};
use stripe_checkout::checkout_session::{
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, ProductData, RetrieveCheckoutSession,
};
use stripe_checkout::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus,
};
use stripe_types::Currency;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::error::PaymentError;

/// Metadata key carrying the originating parcel on a checkout session.
pub const PARCEL_ID_METADATA_KEY: &str = "parcel_id";

/// Everything the provider needs to host a one-item payment page.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckoutSession {
    pub parcel_id: Uuid,
    pub product_name: String,
    /// Price in minor currency units.
    pub unit_amount: i64,
    pub currency: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub id: String,
    pub url: String,
}

/// Read-only view of a provider session, as needed for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionSnapshot {
    pub id: String,
    /// Total in minor currency units.
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    pub metadata: HashMap<String, String>,
    pub payment_status: PaymentStatus,
    pub payment_intent: Option<String>,
}

impl CheckoutSessionSnapshot {
    /// Idempotency key for the ledger: the payment intent, or the session id
    /// when the provider has not attached one.
    pub fn transaction_id(&self) -> &str {
        self.payment_intent.as_deref().unwrap_or(&self.id)
    }

    pub fn parcel_id(&self) -> Option<&str> {
        self.metadata
            .get(PARCEL_ID_METADATA_KEY)
            .map(String::as_str)
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Hosted checkout provider.
pub trait CheckoutProvider: Send + Sync + 'static {
    fn create_session(
        &self,
        session: NewCheckoutSession,
    ) -> impl Future<Output = Result<CreatedSession, PaymentError>> + Send;

    /// Fails with [`PaymentError::SessionNotFound`] when the provider does not
    /// know the session.
    fn retrieve_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<CheckoutSessionSnapshot, PaymentError>> + Send;
}

/// Stripe Checkout backed provider.
pub struct StripeCheckout {
    client: Client,
}

impl StripeCheckout {
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = ClientBuilder::new(&config.stripe_secret_key)
            .request_strategy(RequestStrategy::ExponentialBackoff(3))
            .build()
            .map_err(|e| PaymentError::Config(format!("Failed to build Stripe client: {e}")))?;
        Ok(Self { client })
    }
}

fn map_stripe_error(err: StripeError, session_id: Option<&str>) -> PaymentError {
    match (&err, session_id) {
        (StripeError::Stripe(_, 404), Some(id)) => PaymentError::SessionNotFound(id.to_string()),
        _ => {
            warn!(error = %err, "Stripe request failed");
            PaymentError::Provider(err.to_string())
        }
    }
}

fn snapshot(session: CheckoutSession) -> CheckoutSessionSnapshot {
    let payment_status = match session.payment_status {
        CheckoutSessionPaymentStatus::Paid => PaymentStatus::Paid,
        CheckoutSessionPaymentStatus::NoPaymentRequired => PaymentStatus::NoPaymentRequired,
        _ => PaymentStatus::Unpaid,
    };

    let customer_email = session.customer_email.clone().or_else(|| {
        session
            .customer_details
            .as_ref()
            .and_then(|d| d.email.clone())
    });

    CheckoutSessionSnapshot {
        id: session.id.to_string(),
        amount_total: session.amount_total,
        currency: session.currency.as_ref().map(|c| c.to_string()),
        customer_email,
        metadata: session.metadata.unwrap_or_default(),
        payment_status,
        payment_intent: session.payment_intent.as_ref().map(|pi| pi.id().to_string()),
    }
}

impl CheckoutProvider for StripeCheckout {
    async fn create_session(
        &self,
        session: NewCheckoutSession,
    ) -> Result<CreatedSession, PaymentError> {
        let currency = Currency::from_str(&session.currency)
            .map_err(|_| PaymentError::InvalidField("currency"))?;

        let mut price_data = CreateCheckoutSessionLineItemsPriceData::new(currency);
        price_data.unit_amount = Some(session.unit_amount);
        price_data.product_data = Some(ProductData::new(session.product_name.clone()));

        let line_items = vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(price_data),
            ..Default::default()
        }];

        let metadata = HashMap::from([(
            PARCEL_ID_METADATA_KEY.to_string(),
            session.parcel_id.to_string(),
        )]);

        let created = CreateCheckoutSession::new()
            .mode(CheckoutSessionMode::Payment)
            .line_items(line_items)
            .metadata(metadata)
            .customer_email(&session.customer_email)
            .success_url(&session.success_url)
            .cancel_url(&session.cancel_url)
            .send(&self.client)
            .await
            .map_err(|e| map_stripe_error(e, None))?;

        let url = created
            .url
            .ok_or_else(|| PaymentError::Provider("checkout session has no URL".into()))?;

        debug!(session_id = %created.id, parcel_id = %session.parcel_id, "Stripe checkout session created");

        Ok(CreatedSession {
            id: created.id.to_string(),
            url,
        })
    }

    async fn retrieve_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionSnapshot, PaymentError> {
        let session = RetrieveCheckoutSession::new(CheckoutSessionId::from(session_id))
            .send(&self.client)
            .await
            .map_err(|e| map_stripe_error(e, Some(session_id)))?;

        Ok(snapshot(session))
    }
}
