//! Access-token issue and validation.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// Identity carried by a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JwtSecret {
    secret: String,
    ttl: Duration,
}

impl JwtSecret {
    pub fn new(secret: String, ttl_secs: i64) -> Self {
        Self {
            secret,
            ttl: Duration::seconds(ttl_secs.max(1)),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.len() >= 32
    }

    /// Issue an access token; returns the token and its expiry.
    pub fn issue(&self, user_id: Uuid, email: &str) -> AppResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Jwt(e.to_string()))?;
        Ok((token, expires_at))
    }

    pub fn validate(&self, token: &str) -> AppResult<AccessClaims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| AppError::Jwt(e.to_string()))?;
        let user_id =
            Uuid::parse_str(&data.claims.sub).map_err(|e| AppError::Jwt(e.to_string()))?;
        let expires_at = Utc
            .timestamp_opt(data.claims.exp, 0)
            .single()
            .ok_or_else(|| AppError::Jwt("invalid exp".to_string()))?;
        Ok(AccessClaims {
            user_id,
            email: data.claims.email,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-jwt-secret-with-at-least-32-chars";

    #[test]
    fn issue_then_validate() {
        let jwt = JwtSecret::new(SECRET.to_string(), 3600);
        let id = Uuid::new_v4();
        let (token, expires_at) = jwt.issue(id, "a@b.co").unwrap();
        let claims = jwt.validate(&token).unwrap();
        assert_eq!(claims.user_id, id);
        assert_eq!(claims.email, "a@b.co");
        assert_eq!(claims.expires_at.timestamp(), expires_at.timestamp());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let jwt = JwtSecret::new(SECRET.to_string(), 3600);
        let other = JwtSecret::new("another-secret-another-secret-another".to_string(), 3600);
        let (token, _) = jwt.issue(Uuid::new_v4(), "a@b.co").unwrap();
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = JwtSecret::new(SECRET.to_string(), 3600);
        let past = Utc::now() - Duration::hours(2);
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "a@b.co".to_string(),
            exp: past.timestamp(),
            iat: (past - Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(jwt.validate(&token).is_err());
    }

    #[test]
    fn short_secret_is_not_configured() {
        assert!(!JwtSecret::new("short".to_string(), 60).is_configured());
        assert!(JwtSecret::new(SECRET.to_string(), 60).is_configured());
    }
}
