//! Persistence contracts.
//!
//! Services depend on these traits only. `memory` backs tests and
//! single-node development runs, `postgres` backs production.
//!
//! Every `take_*` method is an atomic delete-and-return: at most one caller
//! can ever observe a given record, which is what makes ceremony sessions,
//! authorization codes and one-time tokens single-use.

pub mod memory;
pub mod models;
pub mod postgres;

use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use models::*;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} is already in use")]
    AlreadyInUse(&'static str),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("failed to decode stored value")]
    Decode(#[from] serde_json::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyInUse(field) => Self::AlreadyInUse(field),
            other => Self::Internal(other.into()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn count_users(&self) -> StoreResult<u64>;
    /// Insert a user with its groups and custom claims.
    async fn create_user(&self, user: &User) -> StoreResult<()>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn list_credentials(&self, user_id: Uuid) -> StoreResult<Vec<Credential>>;
    async fn create_credential(&self, credential: &Credential) -> StoreResult<()>;
    async fn rename_credential(
        &self,
        user_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> StoreResult<Option<Credential>>;
    /// Delete one credential. Refuses to remove the owner's last one.
    async fn delete_credential(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> StoreResult<DeleteCredentialOutcome>;
}

#[async_trait]
pub trait CeremonyStore: Send + Sync {
    async fn create_session(&self, session: &CeremonySession) -> StoreResult<()>;
    async fn take_session(&self, id: Uuid) -> StoreResult<Option<CeremonySession>>;
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn get_client(&self, id: &str) -> StoreResult<Option<Client>>;
    async fn create_client(&self, client: &Client) -> StoreResult<()>;
    async fn update_client_secret(&self, id: &str, secret_hash: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait ConsentStore: Send + Sync {
    async fn get_consent(&self, user_id: Uuid, client_id: &str)
        -> StoreResult<Option<ClientConsent>>;
    /// Insert, or replace the scope of an existing (user, client) row.
    async fn upsert_consent(&self, consent: &ClientConsent) -> StoreResult<()>;
}

#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    async fn create_code(&self, code: &AuthorizationCode) -> StoreResult<()>;
    async fn take_code(&self, code: &str) -> StoreResult<Option<AuthorizationCode>>;
    async fn delete_expired_codes(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn create_audit_log(&self, entry: &AuditLog) -> StoreResult<()>;
    async fn count_audit_logs(
        &self,
        user_id: Uuid,
        ip_address: &str,
        user_agent: &str,
    ) -> StoreResult<i64>;
    async fn delete_audit_logs_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait OneTimeTokenStore: Send + Sync {
    async fn create_one_time_token(&self, token: &OneTimeAccessToken) -> StoreResult<()>;
    async fn take_one_time_token(&self, token: &str) -> StoreResult<Option<OneTimeAccessToken>>;
    async fn delete_expired_one_time_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Handles to every repository, all backed by the same storage engine.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub ceremonies: Arc<dyn CeremonyStore>,
    pub clients: Arc<dyn ClientStore>,
    pub consents: Arc<dyn ConsentStore>,
    pub codes: Arc<dyn AuthorizationCodeStore>,
    pub audit_logs: Arc<dyn AuditLogStore>,
    pub one_time_tokens: Arc<dyn OneTimeTokenStore>,
}

impl Stores {
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: UserStore
            + CredentialStore
            + CeremonyStore
            + ClientStore
            + ConsentStore
            + AuthorizationCodeStore
            + AuditLogStore
            + OneTimeTokenStore
            + 'static,
    {
        Self {
            users: backend.clone(),
            credentials: backend.clone(),
            ceremonies: backend.clone(),
            clients: backend.clone(),
            consents: backend.clone(),
            codes: backend.clone(),
            audit_logs: backend.clone(),
            one_time_tokens: backend,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(memory::MemoryStore::default()))
    }
}
