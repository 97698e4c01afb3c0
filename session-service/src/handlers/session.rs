use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::session::{LoginRequest, RefreshRequest},
    middleware::BearerToken,
    services::{metrics::record_session_operation, ServiceError},
    utils::ValidatedJson,
    AppState,
};

/// Label for `session_operations_total`.
fn outcome(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::InvalidToken => "invalid_token",
        ServiceError::InvalidTokenType { .. } => "wrong_kind",
        ServiceError::ExpiredOrRevoked => "revoked",
        ServiceError::MismatchedSubjects | ServiceError::Store(_) => "store_error",
        ServiceError::Signing(_) | ServiceError::LifetimeOverflow { .. } => "signing_error",
    }
}

/// Client-facing message; causes stay in the logs.
fn public_message(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::InvalidToken => "Invalid token",
        ServiceError::InvalidTokenType { .. } => "Invalid token type",
        ServiceError::ExpiredOrRevoked => "Token expired or revoked",
        ServiceError::MismatchedSubjects
        | ServiceError::Store(_)
        | ServiceError::Signing(_)
        | ServiceError::LifetimeOverflow { .. } => "Failed to process session",
    }
}

fn failed(operation: &str, err: ServiceError) -> anyhow::Error {
    record_session_operation(operation, outcome(&err));
    match &err {
        ServiceError::Store(_)
        | ServiceError::Signing(_)
        | ServiceError::LifetimeOverflow { .. }
        | ServiceError::MismatchedSubjects => {
            tracing::error!(operation, error = %err, "Session operation failed")
        }
        _ => tracing::info!(operation, error = %err, "Session operation rejected"),
    }
    anyhow::anyhow!(public_message(&err))
}

/// Issue a token pair for an already authenticated user
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = TokenPair),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 500, description = "Session could not be stored", body = ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pair = state
        .sessions
        .login(req.user_id)
        .await
        .map_err(|e| AppError::InternalError(failed("login", e)))?;

    record_session_operation("login", "success");
    Ok((StatusCode::OK, Json(pair)))
}

/// Rotate a session: exchange a live refresh token for a new pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Session rotated", body = TokenPair),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 500, description = "Invalid, expired, revoked or wrong-kind token", body = ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pair = state
        .sessions
        .refresh(&req.refresh)
        .await
        .map_err(|e| AppError::InternalError(failed("refresh", e)))?;

    record_session_operation("refresh", "success");
    Ok((StatusCode::OK, Json(pair)))
}

/// Revoke the session named by either token of the pair
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session revoked"),
        (status = 400, description = "Missing authorization header", body = ErrorResponse),
        (status = 500, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "Session",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .logout(&token)
        .await
        .map_err(|e| AppError::InternalError(failed("logout", e)))?;

    record_session_operation("logout", "success");
    Ok(StatusCode::OK)
}

/// Check an access token against the live session and return its claims
#[utoipa::path(
    get,
    path = "/auth/authenticate",
    responses(
        (status = 200, description = "Token is live", body = SessionClaims),
        (status = 400, description = "Missing header or invalid, expired, revoked or wrong-kind token", body = ErrorResponse)
    ),
    tag = "Session",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn authenticate(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<impl IntoResponse, AppError> {
    let claims = state
        .sessions
        .authenticate(&token)
        .await
        .map_err(|e| AppError::BadRequest(failed("authenticate", e)))?;

    record_session_operation("authenticate", "success");
    Ok(Json(claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::TokenKind;

    #[test]
    fn test_public_messages_hide_causes() {
        let err = ServiceError::Store(anyhow::anyhow!("redis://10.0.0.5:6379 refused"));
        assert_eq!(public_message(&err), "Failed to process session");
        assert_eq!(outcome(&err), "store_error");

        let err = ServiceError::InvalidTokenType {
            expected: TokenKind::Access,
            actual: TokenKind::Refresh,
        };
        assert_eq!(public_message(&err), "Invalid token type");
        assert_eq!(outcome(&err), "wrong_kind");
    }
}
