//! HS256 bearer tokens naming the user a request acts for.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::UserId;

/// Registered claims only; the subject is the booking owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Random per token, for log correlation.
    pub jti: Uuid,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtService {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Sign a token for `user_id` that stops verifying after `ttl`.
    pub fn create_token(&self, user_id: UserId, ttl: Duration) -> Result<String> {
        let issued_at = Utc::now();
        let claims = Claims {
            sub: user_id,
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to sign token")
    }

    /// Signature, issuer and `exp` must all hold.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("Token rejected")?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "event-booker";

    fn signer(secret: &str, issuer: &str) -> JwtService {
        JwtService::new(secret, issuer.to_string())
    }

    #[test]
    fn test_token_names_its_user() {
        let jwt = signer("s3cret", ISSUER);
        let user_id = UserId::new();

        let claims = jwt
            .verify_token(&jwt.create_token(user_id, Duration::minutes(5)).unwrap())
            .unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn test_each_token_gets_its_own_id() {
        let jwt = signer("s3cret", ISSUER);
        let user_id = UserId::new();

        let first = jwt
            .verify_token(&jwt.create_token(user_id, Duration::hours(1)).unwrap())
            .unwrap();
        let second = jwt
            .verify_token(&jwt.create_token(user_id, Duration::hours(1)).unwrap())
            .unwrap();
        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn test_rejections() {
        let jwt = signer("s3cret", ISSUER);
        let user_id = UserId::new();

        let other_key = signer("other", ISSUER)
            .create_token(user_id, Duration::hours(1))
            .unwrap();
        let other_issuer = signer("s3cret", "someone-else")
            .create_token(user_id, Duration::hours(1))
            .unwrap();
        // Far enough back to clear the default leeway
        let stale = jwt.create_token(user_id, Duration::minutes(-10)).unwrap();

        for token in [other_key.as_str(), other_issuer.as_str(), stale.as_str(), "garbage"] {
            assert!(jwt.verify_token(token).is_err(), "{token} verified");
        }
    }
}
