use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::analytics;
use crate::config::PaymentConfig;
use crate::error::PaymentError;
use crate::provider::{CheckoutProvider, NewCheckoutSession};

/// Converts a price in currency units to minor units, truncating sub-cent digits.
pub fn to_minor_units(cost: Decimal) -> Option<i64> {
    cost.checked_mul(Decimal::ONE_HUNDRED)?.trunc().to_i64()
}

/// Converts a provider amount in minor units back to currency units.
pub fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

/// Opens hosted checkout pages for unpaid parcels.
pub struct CheckoutInitiator<P> {
    provider: Arc<P>,
    success_url: String,
    cancel_url: String,
    currency: String,
}

impl<P: CheckoutProvider> CheckoutInitiator<P> {
    pub fn new(provider: Arc<P>, config: &PaymentConfig) -> Self {
        Self {
            provider,
            success_url: config.success_url(),
            cancel_url: config.cancel_url(),
            currency: config.currency.clone(),
        }
    }

    /// Creates a provider session for the parcel and returns the URL of the
    /// hosted payment page. No local state changes.
    #[instrument(skip(self, parcel_name, sender_email))]
    pub async fn create_checkout_session(
        &self,
        parcel_id: Uuid,
        cost: Decimal,
        parcel_name: &str,
        sender_email: &str,
    ) -> Result<String, PaymentError> {
        if cost <= Decimal::ZERO {
            return Err(PaymentError::InvalidField("cost"));
        }
        let unit_amount = to_minor_units(cost)
            .filter(|amount| *amount > 0)
            .ok_or(PaymentError::InvalidField("cost"))?;

        let result = self
            .provider
            .create_session(NewCheckoutSession {
                parcel_id,
                product_name: format!("Please pay for : {parcel_name}"),
                unit_amount,
                currency: self.currency.clone(),
                customer_email: sender_email.to_string(),
                success_url: self.success_url.clone(),
                cancel_url: self.cancel_url.clone(),
            })
            .await;

        match result {
            Ok(session) => {
                info!(session_id = %session.id, unit_amount, "Checkout session created");
                analytics::track_checkout_session_created(&self.currency);
                Ok(session.url)
            }
            Err(e) => {
                analytics::track_checkout_session_creation_failed(e.kind());
                Err(e)
            }
        }
    }
}
