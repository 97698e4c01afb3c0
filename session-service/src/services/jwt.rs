use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::services::ServiceError;

/// Which half of a token pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionClaims {
    /// Subject (user ID)
    #[serde(rename = "user_id")]
    #[schema(example = 1)]
    pub subject: u64,
    /// Per-mint marker matched against the session record
    #[serde(rename = "uid")]
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub unique_id: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Not before (Unix timestamp)
    #[serde(rename = "nbf")]
    pub not_before: i64,
    /// Expiration time (Unix timestamp)
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(rename = "iss")]
    #[schema(example = "session-service")]
    pub issuer: String,
}

/// A freshly minted token and the claims it was signed with.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub claims: SessionClaims,
}

/// Mints and verifies HS256 session tokens. Holds no state besides the key
/// material and lifetimes it was built with.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_token_expiry_seconds: i64,
    refresh_token_expiry_seconds: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let secret = config.secret.expose_secret().as_bytes();
        if secret.is_empty() {
            return Err(anyhow::anyhow!("JWT signing secret must not be empty"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss"]);

        tracing::info!(issuer = %config.issuer, "JWT service initialized with HS256 secret");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer: config.issuer.clone(),
            access_token_expiry_seconds: config.access_token_expiry_seconds,
            refresh_token_expiry_seconds: config.refresh_token_expiry_seconds,
        })
    }

    /// Sign a new token of `kind` for `subject`.
    pub fn mint(&self, subject: u64, kind: TokenKind) -> Result<SignedToken, ServiceError> {
        let claims = self.new_claims(subject, kind)?;
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(ServiceError::Signing)?;

        Ok(SignedToken { token, claims })
    }

    /// Check signature, time bounds and issuer, returning the claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, ServiceError> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token verification failed");
                ServiceError::InvalidToken
            })
    }

    pub fn lifetime_seconds(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_token_expiry_seconds,
            TokenKind::Refresh => self.refresh_token_expiry_seconds,
        }
    }

    fn new_claims(&self, subject: u64, kind: TokenKind) -> Result<SessionClaims, ServiceError> {
        let now = Utc::now().timestamp();
        let expires_at = now
            .checked_add(self.lifetime_seconds(kind))
            .ok_or(ServiceError::LifetimeOverflow { kind })?;

        Ok(SessionClaims {
            subject,
            unique_id: Uuid::new_v4().to_string(),
            kind,
            issued_at: now,
            not_before: now,
            expires_at,
            issuer: self.issuer.clone(),
        })
    }
}
