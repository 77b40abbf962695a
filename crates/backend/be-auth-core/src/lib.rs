use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
}

/// Verifies bearer credentials presented to protected routes.
#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_encoding_key: EncodingKey,
    pub access_token_decoding_key: DecodingKey,

    pub access_token_expiry_hours: i64,

    pub validation: Validation,
}

impl JwtConfig {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            access_token_encoding_key: EncodingKey::from_secret(secret),
            access_token_decoding_key: DecodingKey::from_secret(secret),
            access_token_expiry_hours: 1,
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Reads the shared HMAC secret from `JWT_SECRET`.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow!("JWT_SECRET environment variable must be set"))?;
        if secret.trim().is_empty() {
            return Err(anyhow!("JWT_SECRET must not be empty"));
        }
        Ok(Self::from_secret(secret.as_bytes()))
    }

    pub fn generate_access_token(&self, sub: &str, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: sub.to_string(),
            email: email.to_string(),
            exp: (now + Duration::hours(self.access_token_expiry_hours)).timestamp(),
            iat: now.timestamp(),
            token_type: "access".to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.access_token_encoding_key,
        )
        .map_err(|e| anyhow!("Failed to encode token: {}", e))
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.access_token_decoding_key, &self.validation)
            .map_err(|e| anyhow!("Invalid token: {}", e))?;

        if token_data.claims.token_type != "access" {
            tracing::debug!(sub = %token_data.claims.sub, "Rejected non-access token");
            return Err(anyhow!("Invalid token type: expected access token"));
        }

        Ok(token_data.claims)
    }
}
