//! Password hashing and access tokens.
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

/// Hash a password with a fresh random salt. The result is `salt || hash`.
pub fn password_hash_create(password: &str) -> Vec<u8> {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect();

    let hash = argon2rs::argon2i_simple(password, &salt);

    let mut out = Vec::with_capacity(SALT_LENGTH + HASH_LENGTH);
    out.extend_from_slice(salt.as_bytes());
    out.extend_from_slice(&hash);
    out
}

pub fn password_hash_verify(stored: &[u8], password: &str) -> bool {
    if stored.len() != SALT_LENGTH + HASH_LENGTH {
        return false;
    }

    let (salt, hash) = stored.split_at(SALT_LENGTH);
    let salt = match std::str::from_utf8(salt) {
        Ok(salt) => salt,
        Err(_) => return false,
    };

    argon2rs::argon2i_simple(password, salt).as_slice() == hash
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User id
    sub: String,
    iat: i64,
    exp: i64,
}

/// Signs and verifies bearer tokens carrying the user id as subject.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime,
        }
    }

    /// Create a token for `user_id`, returns the token and its expiry.
    pub fn issue(&self, user_id: u64) -> ServiceResult<(String, DateTime<Utc>)> {
        let issued_at = Utc::now();
        let valid_until = issued_at + self.lifetime;

        let claims = Claims {
            sub: user_id.to_string(),
            iat: issued_at.timestamp(),
            exp: valid_until.timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| ServiceError::InternalServerError(err.to_string()))?;

        Ok((token, valid_until))
    }

    /// Verify signature and expiry, returns the user id and the token expiry.
    pub fn verify(&self, token: &str) -> ServiceResult<(u64, DateTime<Utc>)> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;

        let user_id = data
            .claims
            .sub
            .parse::<u64>()
            .map_err(|_| ServiceError::Unauthorized("Invalid access token"))?;
        let valid_until = Utc
            .timestamp_opt(data.claims.exp, 0)
            .single()
            .ok_or(ServiceError::Unauthorized("Invalid access token"))?;

        Ok((user_id, valid_until))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let hash = password_hash_create("correct horse");
        assert_eq!(hash.len(), SALT_LENGTH + HASH_LENGTH);
        assert!(password_hash_verify(&hash, "correct horse"));
        assert!(!password_hash_verify(&hash, "battery staple"));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let first = password_hash_create("secret");
        let second = password_hash_create("secret");
        assert_ne!(first, second);
        assert!(password_hash_verify(&second, "secret"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!password_hash_verify(&[], "secret"));
        assert!(!password_hash_verify(&[13u8; 32], "secret"));
    }

    #[test]
    fn token_carries_user_id() {
        let keys = TokenKeys::new(b"unit-test-secret", Duration::hours(24));
        let (token, valid_until) = keys.issue(42).unwrap();

        let (user_id, verified_until) = keys.verify(&token).unwrap();
        assert_eq!(user_id, 42);
        assert_eq!(verified_until.timestamp(), valid_until.timestamp());
        assert!(valid_until > Utc::now() + Duration::hours(23));
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = TokenKeys::new(b"unit-test-secret", Duration::hours(-2));
        let (token, _) = keys.issue(42).unwrap();

        assert!(matches!(
            keys.verify(&token),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let keys = TokenKeys::new(b"unit-test-secret", Duration::hours(24));
        let other = TokenKeys::new(b"another-secret", Duration::hours(24));
        let (token, _) = other.issue(42).unwrap();

        assert!(matches!(
            keys.verify(&token),
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(keys.verify("not-a-token").is_err());
    }
}
