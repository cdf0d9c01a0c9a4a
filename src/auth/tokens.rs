//! Token Service
//! Mission: Issue and verify session JWTs, mint one-time password reset tokens

use crate::auth::models::{Claims, Identity, UserRole};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

/// Reset tokens are valid for ten minutes
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;
const RESET_TOKEN_BYTES: usize = 20;

/// Why a session token was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    InvalidToken,
    ExpiredToken,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::InvalidToken => write!(f, "Invalid token"),
            TokenError::ExpiredToken => write!(f, "Token expired"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Freshly minted reset token. Only `hashed` and `expires_at` are persisted.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub plain: String,
    pub hashed: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and checks session tokens with a shared secret
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
}

impl TokenService {
    pub fn new(secret: &str, expiry: std::time::Duration) -> Result<Self> {
        let expiry = Duration::from_std(expiry).context("Token expiry out of range")?;
        Ok(Self::with_expiry(secret, expiry))
    }

    /// Build with a signed chrono duration; negative values mint already-expired tokens
    pub fn with_expiry(secret: &str, expiry: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry,
        }
    }

    /// Generate a session token for a user
    pub fn issue(&self, user_id: Uuid, role: UserRole) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(self.expiry)
            .context("Invalid timestamp")?;

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp().max(0) as usize,
            exp: expiration.timestamp().max(0) as usize,
        };

        debug!(
            "Issuing session token for user {} ({}), expires {}",
            user_id,
            role.as_str(),
            expiration
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to generate JWT")
    }

    /// Validate a token and extract the identity it carries
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let decoded =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::ExpiredToken,
                    _ => TokenError::InvalidToken,
                }
            })?;

        let user_id =
            Uuid::parse_str(&decoded.claims.sub).map_err(|_| TokenError::InvalidToken)?;

        Ok(Identity {
            user_id,
            role: decoded.claims.role,
        })
    }

    /// Mint a random reset token plus the digest and expiry to store
    pub fn create_reset_token(&self) -> ResetToken {
        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let plain = hex::encode(bytes);

        ResetToken {
            hashed: Self::hash_for_lookup(&plain),
            plain,
            expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        }
    }

    /// SHA-256 hex digest used to match an incoming reset token against storage
    pub fn hash_for_lookup(plain: &str) -> String {
        hex::encode(Sha256::digest(plain.as_bytes()))
    }
}
