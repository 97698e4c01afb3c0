use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::{JwtService, ServiceError, SessionClaims, SessionStore, TokenKind};

/// Access and refresh token strings handed to a caller after login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access: String,
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub refresh: String,
}

/// Session lifecycle: login, refresh with rotation, logout and the per-request
/// authentication check.
#[derive(Clone)]
pub struct SessionManager {
    jwt: JwtService,
    store: SessionStore,
}

impl SessionManager {
    pub fn new(jwt: JwtService, store: SessionStore) -> Self {
        Self { jwt, store }
    }

    /// Issue a fresh pair for `subject`, replacing any session it already had.
    pub async fn login(&self, subject: u64) -> Result<TokenPair, ServiceError> {
        let access = self.jwt.mint(subject, TokenKind::Access)?;
        let refresh = self.jwt.mint(subject, TokenKind::Refresh)?;

        self.store
            .save(subject, &access.claims, &refresh.claims)
            .await?;

        tracing::info!(user_id = subject, "Session issued");

        Ok(TokenPair {
            access: access.token,
            refresh: refresh.token,
        })
    }

    /// Exchange a live refresh token for a new pair. Both old tokens stop
    /// working once the new record is saved.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        let claims = self.live_claims(refresh_token, TokenKind::Refresh).await?;
        self.login(claims.subject).await
    }

    /// Revoke the session named by either token of the pair.
    pub async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        let claims = self.jwt.verify(token)?;
        self.store.revoke(claims.subject).await;

        tracing::info!(user_id = claims.subject, kind = %claims.kind, "Session revoked");
        Ok(())
    }

    /// Check an access token against the live session and slide the
    /// auto-logout window forward.
    pub async fn authenticate(&self, access_token: &str) -> Result<SessionClaims, ServiceError> {
        let claims = self.live_claims(access_token, TokenKind::Access).await?;
        self.store.extend_ttl(claims.subject);
        Ok(claims)
    }

    async fn live_claims(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> Result<SessionClaims, ServiceError> {
        let claims = self.jwt.verify(token)?;

        if claims.kind != expected {
            tracing::debug!(
                user_id = claims.subject,
                expected = %expected,
                actual = %claims.kind,
                "Token of the wrong kind presented"
            );
            return Err(ServiceError::InvalidTokenType {
                expected,
                actual: claims.kind,
            });
        }

        match self.store.is_live(&claims).await {
            Ok(true) => Ok(claims),
            Ok(false) => {
                tracing::debug!(user_id = claims.subject, kind = %claims.kind, "Token is not the live marker");
                Err(ServiceError::ExpiredOrRevoked)
            }
            Err(e) => {
                tracing::error!(user_id = claims.subject, error = %e, "Session lookup failed");
                Err(ServiceError::ExpiredOrRevoked)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::services::{MockSessionCache, SessionCache};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use secrecy::Secret;
    use std::sync::Arc;
    use std::time::Duration;

    const SECRET: &str = "session_manager_test_secret";
    const WINDOW: u64 = 120;

    fn jwt(secret: &str) -> JwtService {
        JwtService::new(&JwtConfig {
            secret: Secret::new(secret.to_string()),
            issuer: "test-issuer".to_string(),
            access_token_expiry_seconds: 900,
            refresh_token_expiry_seconds: 3600,
        })
        .unwrap()
    }

    fn manager() -> (Arc<MockSessionCache>, SessionManager) {
        let cache = Arc::new(MockSessionCache::new());
        let store = SessionStore::new(cache.clone(), WINDOW);
        (cache, SessionManager::new(jwt(SECRET), store))
    }

    #[tokio::test]
    async fn test_login_then_authenticate() {
        let (_, manager) = manager();
        let pair = manager.login(42).await.unwrap();

        let claims = manager.authenticate(&pair.access).await.unwrap();
        assert_eq!(claims.subject, 42);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.issuer, "test-issuer");
    }

    #[tokio::test]
    async fn test_refresh_rotates_pair() {
        let (_, manager) = manager();
        let first = manager.login(1).await.unwrap();

        let second = manager.refresh(&first.refresh).await.unwrap();
        assert_ne!(second.access, first.access);
        assert_ne!(second.refresh, first.refresh);

        assert!(matches!(
            manager.authenticate(&first.access).await,
            Err(ServiceError::ExpiredOrRevoked)
        ));
        assert!(matches!(
            manager.refresh(&first.refresh).await,
            Err(ServiceError::ExpiredOrRevoked)
        ));
        assert_eq!(manager.authenticate(&second.access).await.unwrap().subject, 1);
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let (_, manager) = manager();
        let pair = manager.login(1).await.unwrap();

        manager.logout(&pair.access).await.unwrap();

        // The signature still verifies, only the session is gone
        assert!(manager.jwt.verify(&pair.access).is_ok());
        assert!(matches!(
            manager.authenticate(&pair.access).await,
            Err(ServiceError::ExpiredOrRevoked)
        ));
        assert!(matches!(
            manager.refresh(&pair.refresh).await,
            Err(ServiceError::ExpiredOrRevoked)
        ));
    }

    #[tokio::test]
    async fn test_logout_accepts_refresh_token_and_is_repeatable() {
        let (_, manager) = manager();
        let pair = manager.login(1).await.unwrap();

        manager.logout(&pair.refresh).await.unwrap();
        manager.logout(&pair.refresh).await.unwrap();

        assert!(matches!(
            manager.authenticate(&pair.access).await,
            Err(ServiceError::ExpiredOrRevoked)
        ));
    }

    #[tokio::test]
    async fn test_logout_rejects_invalid_token() {
        let (_, manager) = manager();
        assert!(matches!(
            manager.logout("not-a-token").await,
            Err(ServiceError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_foreign_token_is_invalid_regardless_of_store() {
        let (_, manager) = manager();
        manager.login(1).await.unwrap();

        let foreign = jwt("some_other_secret").mint(1, TokenKind::Access).unwrap();
        assert!(matches!(
            manager.authenticate(&foreign.token).await,
            Err(ServiceError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_is_invalid_regardless_of_store() {
        let (_, manager) = manager();
        let pair = manager.login(1).await.unwrap();
        let mut claims = manager.jwt.verify(&pair.access).unwrap();

        // Same marker as the live record, but already past its expiry
        claims.issued_at -= 1000;
        claims.not_before -= 1000;
        claims.expires_at = claims.issued_at + 1;
        let expired = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            manager.authenticate(&expired).await,
            Err(ServiceError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_second_login_invalidates_first_pair() {
        let (_, manager) = manager();
        let first = manager.login(1).await.unwrap();
        let second = manager.login(1).await.unwrap();

        assert!(matches!(
            manager.authenticate(&first.access).await,
            Err(ServiceError::ExpiredOrRevoked)
        ));
        assert!(matches!(
            manager.refresh(&first.refresh).await,
            Err(ServiceError::ExpiredOrRevoked)
        ));
        assert!(manager.authenticate(&second.access).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_kind_is_rejected() {
        let (_, manager) = manager();
        let pair = manager.login(1).await.unwrap();

        assert!(matches!(
            manager.authenticate(&pair.refresh).await,
            Err(ServiceError::InvalidTokenType {
                expected: TokenKind::Access,
                actual: TokenKind::Refresh,
            })
        ));
        assert!(matches!(
            manager.refresh(&pair.access).await,
            Err(ServiceError::InvalidTokenType {
                expected: TokenKind::Refresh,
                actual: TokenKind::Access,
            })
        ));

        // A rejected kind leaves the session untouched
        assert!(manager.authenticate(&pair.access).await.is_ok());
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let (_, manager) = manager();

        let first = manager.login(1).await.unwrap();
        manager.authenticate(&first.access).await.unwrap();

        let second = manager.refresh(&first.refresh).await.unwrap();
        assert_ne!(second.access, first.access);
        assert!(manager.authenticate(&first.access).await.is_err());

        manager.logout(&second.access).await.unwrap();
        assert!(manager.authenticate(&second.access).await.is_err());
    }

    #[tokio::test]
    async fn test_sessions_are_independent_per_subject() {
        let (_, manager) = manager();
        let alice = manager.login(1).await.unwrap();
        let bob = manager.login(2).await.unwrap();

        manager.logout(&alice.access).await.unwrap();

        assert!(manager.authenticate(&alice.access).await.is_err());
        assert_eq!(manager.authenticate(&bob.access).await.unwrap().subject, 2);
    }

    #[tokio::test]
    async fn test_login_with_overflowing_lifetime_fails_cleanly() {
        let cache = Arc::new(MockSessionCache::new());
        let jwt = JwtService::new(&JwtConfig {
            secret: Secret::new(SECRET.to_string()),
            issuer: "test-issuer".to_string(),
            access_token_expiry_seconds: i64::MAX,
            refresh_token_expiry_seconds: 3600,
        })
        .unwrap();
        let manager = SessionManager::new(jwt, SessionStore::new(cache.clone(), WINDOW));

        assert!(matches!(
            manager.login(1).await,
            Err(ServiceError::LifetimeOverflow { .. })
        ));
        assert!(cache.get_cache("session:1").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_ignores_extend_failure() {
        let (cache, manager) = manager();
        let pair = manager.login(1).await.unwrap();
        cache.set_expire_failing(true);

        tokio::time::advance(Duration::from_secs(WINDOW - 20)).await;
        let claims = manager.authenticate(&pair.access).await.unwrap();
        assert_eq!(claims.subject, 1);
        tokio::task::yield_now().await;

        // The window was not slid, so the record keeps its original deadline
        assert_eq!(cache.ttl("session:1"), Some(Duration::from_secs(20)));
        assert!(manager.authenticate(&pair.access).await.is_ok());
    }

    #[tokio::test]
    async fn test_subject_zero_is_valid() {
        let (_, manager) = manager();
        let pair = manager.login(0).await.unwrap();
        assert_eq!(manager.authenticate(&pair.access).await.unwrap().subject, 0);
    }

    #[tokio::test]
    async fn test_store_outage() {
        let (cache, manager) = manager();
        let pair = manager.login(1).await.unwrap();

        cache.set_unavailable(true);

        assert!(matches!(manager.login(2).await, Err(ServiceError::Store(_))));
        assert!(matches!(
            manager.authenticate(&pair.access).await,
            Err(ServiceError::ExpiredOrRevoked)
        ));
        assert!(matches!(
            manager.refresh(&pair.refresh).await,
            Err(ServiceError::ExpiredOrRevoked)
        ));
        // Revocation failures are logged, not returned
        assert!(manager.logout(&pair.access).await.is_ok());

        cache.set_unavailable(false);
        assert!(manager.authenticate(&pair.access).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_logout_after_idle_window() {
        let (_, manager) = manager();
        let pair = manager.login(1).await.unwrap();

        tokio::time::advance(Duration::from_secs(WINDOW + 1)).await;

        assert!(matches!(
            manager.authenticate(&pair.access).await,
            Err(ServiceError::ExpiredOrRevoked)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_slides_auto_logout_window() {
        let (cache, manager) = manager();
        let pair = manager.login(1).await.unwrap();

        // Keep the session busy well past one window
        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(WINDOW - 20)).await;
            manager.authenticate(&pair.access).await.unwrap();
            tokio::task::yield_now().await;
            assert_eq!(cache.ttl("session:1"), Some(Duration::from_secs(WINDOW)));
        }

        tokio::time::advance(Duration::from_secs(WINDOW + 1)).await;
        assert!(cache.get_cache("session:1").await.unwrap().is_none());
        assert!(manager.authenticate(&pair.access).await.is_err());
    }
}
