use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::{ServiceError, SessionCache, SessionClaims, TokenKind};

/// Markers of the token pair currently live for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "access_uid")]
    pub access_unique_id: String,
    #[serde(rename = "refresh_uid")]
    pub refresh_unique_id: String,
}

impl SessionRecord {
    fn marker(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_unique_id,
            TokenKind::Refresh => &self.refresh_unique_id,
        }
    }
}

pub fn session_key(subject: u64) -> String {
    format!("session:{}", subject)
}

/// Single source of truth for which tokens are live. One record per
/// subject, written whole, with a sliding expiry of `auto_logout_seconds`.
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn SessionCache>,
    auto_logout_seconds: u64,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn SessionCache>, auto_logout_seconds: u64) -> Self {
        Self {
            cache,
            auto_logout_seconds,
        }
    }

    /// Replace the subject's session record with the markers of a new pair.
    pub async fn save(
        &self,
        subject: u64,
        access: &SessionClaims,
        refresh: &SessionClaims,
    ) -> Result<(), ServiceError> {
        if access.subject != subject || refresh.subject != subject {
            tracing::error!(
                user_id = subject,
                access_subject = access.subject,
                refresh_subject = refresh.subject,
                "Refusing to save session for mismatched subjects"
            );
            return Err(ServiceError::MismatchedSubjects);
        }

        let record = SessionRecord {
            access_unique_id: access.unique_id.clone(),
            refresh_unique_id: refresh.unique_id.clone(),
        };
        let value = serde_json::to_string(&record)
            .map_err(|e| ServiceError::Store(anyhow::anyhow!("Failed to encode session record: {}", e)))?;

        // One SET carries both markers, so readers never see half a pair.
        self.cache
            .set_cache(&session_key(subject), &value, self.auto_logout_seconds)
            .await
            .map_err(ServiceError::Store)?;

        tracing::debug!(user_id = subject, "Session record saved");
        Ok(())
    }

    /// Push the record's expiry out to the full window in the background.
    /// The caller never waits on or hears about the outcome.
    pub fn extend_ttl(&self, subject: u64) {
        let cache = self.cache.clone();
        let ttl = self.auto_logout_seconds;
        tokio::spawn(async move {
            match cache.expire(&session_key(subject), ttl).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(user_id = subject, "No session record to extend")
                }
                Err(e) => {
                    tracing::warn!(user_id = subject, error = %e, "Failed to extend session expiry")
                }
            }
        });
    }

    /// Whether `claims` names the marker currently stored for its subject and
    /// kind. A missing record means no active session, not an error.
    pub async fn is_live(&self, claims: &SessionClaims) -> Result<bool, ServiceError> {
        let cached = self
            .cache
            .get_cache(&session_key(claims.subject))
            .await
            .map_err(ServiceError::Store)?;

        let Some(cached) = cached else {
            return Ok(false);
        };

        let record: SessionRecord = serde_json::from_str(&cached).map_err(|e| {
            ServiceError::Store(anyhow::anyhow!("Failed to decode session record: {}", e))
        })?;

        Ok(record.marker(claims.kind) == claims.unique_id)
    }

    /// Drop the subject's session. Idempotent; cache failures are only logged.
    pub async fn revoke(&self, subject: u64) {
        if let Err(e) = self.cache.delete(&session_key(subject)).await {
            tracing::warn!(user_id = subject, error = %e, "Failed to delete session record");
        }
    }
}
