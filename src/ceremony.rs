//! Short-lived challenge records backing WebAuthn ceremonies.
//!
//! Registration sessions are bound to the user that started them, login
//! sessions are unowned. Either kind can be consumed exactly once and is
//! rejected once past its expiry, even if the cleanup job has not removed
//! it yet.

use crate::error::AppError;
use crate::store::{CeremonySession, CeremonyStore, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CeremonyError {
    #[error("ceremony session not found")]
    NotFound,
    #[error("ceremony session expired")]
    Expired,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CeremonyError> for AppError {
    fn from(err: CeremonyError) -> Self {
        match err {
            CeremonyError::NotFound => Self::CeremonyNotFound,
            CeremonyError::Expired => Self::CeremonyExpired,
            CeremonyError::Store(err) => err.into(),
        }
    }
}

/// Everything needed to open a ceremony session.
#[derive(Debug, Clone)]
pub struct NewCeremony {
    pub challenge: String,
    pub expires_at: DateTime<Utc>,
    pub user_verification: String,
    pub user_id: Option<Uuid>,
    pub state: serde_json::Value,
}

#[derive(Clone)]
pub struct CeremonySessions {
    store: Arc<dyn CeremonyStore>,
}

impl CeremonySessions {
    #[must_use]
    pub fn new(store: Arc<dyn CeremonyStore>) -> Self {
        Self { store }
    }

    /// Persist a new session and return its id.
    ///
    /// # Errors
    /// Returns error if the session cannot be stored.
    pub async fn create(&self, ceremony: NewCeremony) -> Result<Uuid, CeremonyError> {
        let session = CeremonySession {
            id: Uuid::new_v4(),
            challenge: ceremony.challenge,
            expires_at: ceremony.expires_at,
            user_verification: ceremony.user_verification,
            user_id: ceremony.user_id,
            state: ceremony.state,
        };
        self.store.create_session(&session).await?;
        Ok(session.id)
    }

    /// Remove and return the session, failing if it is absent or expired.
    ///
    /// # Errors
    /// Returns `NotFound` or `Expired`, or a store error.
    pub async fn consume(&self, id: Uuid) -> Result<CeremonySession, CeremonyError> {
        self.consume_at(id, Utc::now()).await
    }

    async fn consume_at(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CeremonySession, CeremonyError> {
        let session = self
            .store
            .take_session(id)
            .await?
            .ok_or(CeremonyError::NotFound)?;
        if session.expires_at <= now {
            return Err(CeremonyError::Expired);
        }
        Ok(session)
    }
}
