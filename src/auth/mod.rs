use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Session token claims. The same shape is minted by the external sign-in
/// integration and by invitation acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: &str, role: &str, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id,
            email: email.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp,
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("JWT generation error: {0}")]
    Encode(jsonwebtoken::errors::Error),

    #[error("Session token expired")]
    Expired,

    #[error("Invalid session token")]
    Invalid,
}

pub fn generate_jwt(secret: &str, claims: &Claims) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(JwtError::Encode)
}

pub fn decode_jwt(secret: &str, token: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::MissingSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid,
        })
}

/// Fresh single-use invitation token: 64 hex chars carrying the 244 random
/// bits of two v4 UUIDs
pub fn generate_invitation_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Only this digest is stored; the raw token leaves the server once
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn jwt_round_trip_keeps_claims() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, "ada@example.com", "manager", 1);
        let token = generate_jwt(SECRET, &claims).unwrap();
        let decoded = decode_jwt(SECRET, &token).unwrap();
        assert_eq!(decoded.sub, user_id);
        assert_eq!(decoded.role, "manager");
        assert!(decoded.exp > decoded.iat);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let claims = Claims::new(Uuid::new_v4(), "a@b.c", "viewer", 1);
        let token = generate_jwt(SECRET, &claims).unwrap();
        assert!(matches!(decode_jwt("other", &token), Err(JwtError::Invalid)));

        let mut expired = Claims::new(Uuid::new_v4(), "a@b.c", "viewer", 1);
        expired.exp = Utc::now().timestamp() - 3600;
        let token = generate_jwt(SECRET, &expired).unwrap();
        assert!(matches!(decode_jwt(SECRET, &token), Err(JwtError::Expired)));

        assert!(matches!(generate_jwt("", &claims), Err(JwtError::MissingSecret)));
    }

    #[test]
    fn invitation_tokens_are_unique_and_hashed() {
        let a = generate_invitation_token();
        let b = generate_invitation_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        // version nibble of each half is fixed, not random
        assert_eq!(&a[12..13], "4");
        assert_eq!(&a[44..45], "4");
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), a);
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
