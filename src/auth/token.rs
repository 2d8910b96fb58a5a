use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Shortest HMAC secret accepted by [`JwtMaker::new`].
pub const MIN_SECRET_KEY_SIZE: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is invalid")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,

    #[error("invalid key size: must be at least {0} characters")]
    InvalidKeySize(usize),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "jti")]
    pub token_id: Uuid,
    /// Principal id
    pub id: i64,
    pub username: String,
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl Payload {
    pub fn new(id: i64, username: impl Into<String>, duration: Duration) -> Self {
        let issued_at = Utc::now().trunc_subsecs(0);
        Self {
            token_id: Uuid::new_v4(),
            id,
            username: username.into(),
            issued_at,
            expires_at: issued_at + duration,
        }
    }

    pub fn valid(&self) -> Result<(), TokenError> {
        if Utc::now() > self.expires_at {
            return Err(TokenError::ExpiredToken);
        }
        Ok(())
    }

    /// Lifetime left on the token, never negative.
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).max(Duration::zero())
    }
}

/// Issues and verifies signed, time-bounded session tokens.
pub trait TokenMaker: Send + Sync {
    fn create_token(&self, id: i64, username: &str, duration: Duration) -> Result<(String, Payload), TokenError>;
    fn verify_token(&self, token: &str) -> Result<Payload, TokenError>;
}

/// HS256 JWT token maker. Tokens signed with any other algorithm, including
/// unsigned `none` tokens, are rejected as invalid.
pub struct JwtMaker {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtMaker {
    const ALGORITHM: Algorithm = Algorithm::HS256;

    pub fn new(secret_key: &str) -> Result<Self, TokenError> {
        if secret_key.len() < MIN_SECRET_KEY_SIZE {
            return Err(TokenError::InvalidKeySize(MIN_SECRET_KEY_SIZE));
        }

        let mut validation = Validation::new(Self::ALGORITHM);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret_key.as_bytes()),
            validation,
        })
    }
}

impl TokenMaker for JwtMaker {
    fn create_token(&self, id: i64, username: &str, duration: Duration) -> Result<(String, Payload), TokenError> {
        let payload = Payload::new(id, username, duration);
        let token = encode(&Header::new(Self::ALGORITHM), &payload, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok((token, payload))
    }

    fn verify_token(&self, token: &str) -> Result<Payload, TokenError> {
        let data = decode::<Payload>(token, &self.decoding_key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::ExpiredToken,
            _ => TokenError::InvalidToken,
        })?;

        data.claims.valid()?;
        Ok(data.claims)
    }
}
