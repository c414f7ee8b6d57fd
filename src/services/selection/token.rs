use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::SelectionConfig,
    error::{AppError, Result},
    infrastructure::db::entities::selection_token::TokenPurpose,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionClaims {
    pub order_id: i32,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl SelectionClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

pub struct SelectionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    view_ttl: Duration,
    action_ttl: Duration,
}

impl SelectionTokenService {
    pub fn new(selection_config: &SelectionConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(selection_config.token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(selection_config.token_secret.as_bytes()),
            view_ttl: selection_config.view_token_ttl,
            action_ttl: selection_config.action_token_ttl,
        }
    }

    pub fn ttl_for(&self, purpose: TokenPurpose) -> Duration {
        match purpose {
            TokenPurpose::View => self.view_ttl,
            TokenPurpose::Pick | TokenPurpose::Confirm => self.action_ttl,
        }
    }

    /// Signs a fresh token. `now` comes from the injected clock, not the wall.
    pub fn issue(
        &self,
        order_id: i32,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> Result<(String, SelectionClaims)> {
        let iat = now.timestamp();
        let claims = SelectionClaims {
            order_id,
            purpose,
            iat,
            exp: iat + self.ttl_for(purpose).as_secs() as i64,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        Ok((token, claims))
    }

    /// Verifies the signature and purpose. Expiry is judged by the caller
    /// against the clock and the persisted row.
    pub fn decode(&self, token: &str, expected: TokenPurpose) -> Result<SelectionClaims> {
        let mut validation = Validation::default();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<SelectionClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AppError::InvalidToken)?;

        let claims = data.claims;
        if claims.purpose != expected {
            return Err(AppError::InvalidToken);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str) -> SelectionTokenService {
        SelectionTokenService::new(&SelectionConfig::with_secret(secret))
    }

    #[test]
    fn tokens_round_trip_with_purpose() {
        let tokens = service("a-very-long-selection-secret-for-tests");
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        let (token, issued) = tokens.issue(42, TokenPurpose::Pick, now).unwrap();
        let decoded = tokens.decode(&token, TokenPurpose::Pick).unwrap();

        assert_eq!(decoded, issued);
        assert_eq!(decoded.expires_at(), now + chrono::Duration::hours(2));
    }

    #[test]
    fn wrong_purpose_or_secret_is_rejected() {
        let tokens = service("a-very-long-selection-secret-for-tests");
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let (token, _) = tokens.issue(42, TokenPurpose::View, now).unwrap();

        assert!(matches!(
            tokens.decode(&token, TokenPurpose::Confirm),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            service("another-secret-that-is-long-enough!!").decode(&token, TokenPurpose::View),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn stale_tokens_still_decode() {
        let tokens = service("a-very-long-selection-secret-for-tests");
        let long_ago = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
        let (token, _) = tokens.issue(7, TokenPurpose::View, long_ago).unwrap();

        assert_eq!(tokens.decode(&token, TokenPurpose::View).unwrap().order_id, 7);
    }
}
