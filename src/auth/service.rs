//! Password hashing, email validation, and refresh-token material.

use crate::db::{user_create, user_find_by_email, user_touch_sign_in, DbPool, UserRow};
use crate::error::{AppError, AppResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::ValidateEmail;

pub struct AuthAppService;

impl AuthAppService {
    pub fn hash_password(password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("hash: {}", e)))?
            .to_string();
        Ok(hash)
    }

    pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| AppError::Internal(anyhow::anyhow!("parse hash: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    pub fn validate_email(email: &str) -> AppResult<()> {
        if !email.validate_email() {
            return Err(AppError::Validation("Invalid email".to_string()));
        }
        Ok(())
    }

    /// Create a password account. Duplicate email is a conflict.
    pub async fn sign_up(pool: &DbPool, name: &str, email: &str, password: &str) -> AppResult<UserRow> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 255 {
            return Err(AppError::Validation("Name must be 1-255 characters".to_string()));
        }
        let email = email.trim();
        Self::validate_email(email)?;
        let len = password.chars().count();
        if !(8..=128).contains(&len) {
            return Err(AppError::Validation(
                "Password must be 8-128 characters".to_string(),
            ));
        }
        if user_find_by_email(pool, email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        let password_hash = Self::hash_password(password)?;
        user_create(pool, name, email, &password_hash).await
    }

    /// Check credentials and stamp the sign-in time.
    pub async fn sign_in(pool: &DbPool, email: &str, password: &str) -> AppResult<UserRow> {
        let invalid = || AppError::Auth("Invalid email or password".to_string());
        let mut user = user_find_by_email(pool, email.trim())
            .await?
            .ok_or_else(invalid)?;
        if !Self::verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }
        user_touch_sign_in(pool, user.id).await?;
        user.last_sign_in_at = Some(chrono::Utc::now());
        Ok(user)
    }

    /// 256 bits of randomness, hex encoded.
    pub fn generate_refresh_token() -> String {
        let mut bytes = Vec::with_capacity(32);
        bytes.extend_from_slice(Uuid::new_v4().as_bytes());
        bytes.extend_from_slice(Uuid::new_v4().as_bytes());
        hex::encode(bytes)
    }

    /// Stored form of a refresh token.
    pub fn hash_refresh_token(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_password() {
        let hash = AuthAppService::hash_password("mypassword").unwrap();
        assert!(AuthAppService::verify_password("mypassword", &hash).unwrap());
        assert!(!AuthAppService::verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn validate_email_accepts_valid() {
        assert!(AuthAppService::validate_email("user@example.com").is_ok());
        assert!(AuthAppService::validate_email("a@b.co").is_ok());
    }

    #[test]
    fn validate_email_rejects_invalid() {
        assert!(AuthAppService::validate_email("invalid").is_err());
        assert!(AuthAppService::validate_email("@nodomain").is_err());
        assert!(AuthAppService::validate_email("").is_err());
    }

    #[test]
    fn refresh_tokens_are_unique_and_hashed() {
        let a = AuthAppService::generate_refresh_token();
        let b = AuthAppService::generate_refresh_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        let hash = AuthAppService::hash_refresh_token(&a);
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, a);
        assert_eq!(hash, AuthAppService::hash_refresh_token(&a));
    }

    #[test]
    fn refresh_hash_matches_sha256() {
        assert_eq!(
            AuthAppService::hash_refresh_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
