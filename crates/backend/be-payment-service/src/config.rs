use axum::http::HeaderValue;

use crate::error::PaymentError;

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub stripe_secret_key: String,
    pub site_domain: String,
    /// `site_domain` as a CORS origin, validated once at load time.
    pub site_origin: HeaderValue,
    pub currency: String,
}

impl PaymentConfig {
    pub fn new(
        stripe_secret_key: impl Into<String>,
        site_domain: impl Into<String>,
        currency: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        let site_domain = site_domain.into().trim_end_matches('/').to_string();

        let site_origin = HeaderValue::from_str(&site_domain).map_err(|e| {
            PaymentError::Config(format!(
                "SITE_DOMAIN '{site_domain}' is not a valid header value: {e}"
            ))
        })?;

        Ok(Self {
            stripe_secret_key: stripe_secret_key.into(),
            site_domain,
            site_origin,
            currency: currency.into().to_lowercase(),
        })
    }

    pub fn from_env() -> Result<Self, PaymentError> {
        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY").map_err(|_| {
            PaymentError::Config("STRIPE_SECRET_KEY environment variable must be set".into())
        })?;

        let site_domain =
            std::env::var("SITE_DOMAIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        let currency = std::env::var("CHECKOUT_CURRENCY").unwrap_or_else(|_| "usd".to_string());

        Self::new(stripe_secret_key, site_domain, currency)
    }

    /// Where the provider sends the customer after paying. The provider
    /// substitutes the literal `{CHECKOUT_SESSION_ID}` placeholder.
    pub fn success_url(&self) -> String {
        format!(
            "{}/dashboard/payment-success?session_id={{CHECKOUT_SESSION_ID}}",
            self.site_domain
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/dashboard/payment-cancelled", self.site_domain)
    }
}
