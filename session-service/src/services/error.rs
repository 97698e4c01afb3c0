use thiserror::Error;

use crate::services::TokenKind;

/// Failures of the session lifecycle operations.
///
/// `InvalidToken` carries no cause; verification failures are logged where
/// they happen.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid token type: expected {expected}, got {actual}")]
    InvalidTokenType {
        expected: TokenKind,
        actual: TokenKind,
    },

    #[error("Token expired or revoked")]
    ExpiredOrRevoked,

    #[error("Token pair subjects do not match")]
    MismatchedSubjects,

    #[error("Session store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Token lifetime for {kind} overflows the expiry timestamp")]
    LifetimeOverflow { kind: TokenKind },

    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}
