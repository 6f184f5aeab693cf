//! In-process store. One lock over all tables keeps multi-row operations
//! (last-credential check, delete-and-return) atomic.

use super::{
    AuditLog, AuditLogStore, AuthorizationCode, AuthorizationCodeStore, CeremonySession,
    CeremonyStore, Client, ClientConsent, ClientStore, ConsentStore, Credential, CredentialStore,
    DeleteCredentialOutcome, OneTimeAccessToken, OneTimeTokenStore, StoreError, StoreResult, User,
    UserStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    credentials: Vec<Credential>,
    sessions: HashMap<Uuid, CeremonySession>,
    clients: HashMap<String, Client>,
    consents: HashMap<(Uuid, String), ClientConsent>,
    codes: HashMap<String, AuthorizationCode>,
    audit_logs: Vec<AuditLog>,
    one_time_tokens: HashMap<String, OneTimeAccessToken>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn count_users(&self) -> StoreResult<u64> {
        Ok(count(self.tables.lock().await.users.len()))
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::AlreadyInUse("username"));
        }
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::AlreadyInUse("email"));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn list_credentials(&self, user_id: Uuid) -> StoreResult<Vec<Credential>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .credentials
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_credential(&self, credential: &Credential) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables
            .credentials
            .iter()
            .any(|c| c.credential_id == credential.credential_id)
        {
            return Err(StoreError::AlreadyInUse("passkey"));
        }
        tables.credentials.push(credential.clone());
        Ok(())
    }

    async fn rename_credential(
        &self,
        user_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> StoreResult<Option<Credential>> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .credentials
            .iter_mut()
            .find(|c| c.id == id && c.user_id == user_id)
            .map(|c| {
                c.name = name.to_string();
                c.clone()
            }))
    }

    async fn delete_credential(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> StoreResult<DeleteCredentialOutcome> {
        let mut tables = self.tables.lock().await;
        let owned = tables
            .credentials
            .iter()
            .filter(|c| c.user_id == user_id)
            .count();
        let Some(index) = tables
            .credentials
            .iter()
            .position(|c| c.id == id && c.user_id == user_id)
        else {
            return Ok(DeleteCredentialOutcome::NotFound);
        };
        if owned <= 1 {
            return Ok(DeleteCredentialOutcome::LastCredential);
        }
        tables.credentials.remove(index);
        Ok(DeleteCredentialOutcome::Deleted)
    }
}

#[async_trait]
impl CeremonyStore for MemoryStore {
    async fn create_session(&self, session: &CeremonySession) -> StoreResult<()> {
        self.tables
            .lock()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn take_session(&self, id: Uuid) -> StoreResult<Option<CeremonySession>> {
        Ok(self.tables.lock().await.sessions.remove(&id))
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.expires_at > now);
        Ok(count(before - tables.sessions.len()))
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn get_client(&self, id: &str) -> StoreResult<Option<Client>> {
        Ok(self.tables.lock().await.clients.get(id).cloned())
    }

    async fn create_client(&self, client: &Client) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.clients.contains_key(&client.id) {
            return Err(StoreError::AlreadyInUse("client id"));
        }
        tables.clients.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn update_client_secret(&self, id: &str, secret_hash: &str) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        Ok(tables.clients.get_mut(id).map_or(false, |client| {
            client.secret_hash = Some(secret_hash.to_string());
            true
        }))
    }
}

#[async_trait]
impl ConsentStore for MemoryStore {
    async fn get_consent(
        &self,
        user_id: Uuid,
        client_id: &str,
    ) -> StoreResult<Option<ClientConsent>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .consents
            .get(&(user_id, client_id.to_string()))
            .cloned())
    }

    async fn upsert_consent(&self, consent: &ClientConsent) -> StoreResult<()> {
        self.tables.lock().await.consents.insert(
            (consent.user_id, consent.client_id.clone()),
            consent.clone(),
        );
        Ok(())
    }
}

#[async_trait]
impl AuthorizationCodeStore for MemoryStore {
    async fn create_code(&self, code: &AuthorizationCode) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.codes.contains_key(&code.code) {
            return Err(StoreError::AlreadyInUse("authorization code"));
        }
        tables.codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn take_code(&self, code: &str) -> StoreResult<Option<AuthorizationCode>> {
        Ok(self.tables.lock().await.codes.remove(code))
    }

    async fn delete_expired_codes(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.codes.len();
        tables.codes.retain(|_, c| c.expires_at > now);
        Ok(count(before - tables.codes.len()))
    }
}

#[async_trait]
impl AuditLogStore for MemoryStore {
    async fn create_audit_log(&self, entry: &AuditLog) -> StoreResult<()> {
        self.tables.lock().await.audit_logs.push(entry.clone());
        Ok(())
    }

    async fn count_audit_logs(
        &self,
        user_id: Uuid,
        ip_address: &str,
        user_agent: &str,
    ) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        let n = tables
            .audit_logs
            .iter()
            .filter(|l| {
                l.user_id == user_id && l.ip_address == ip_address && l.user_agent == user_agent
            })
            .count();
        Ok(i64::try_from(n).unwrap_or(i64::MAX))
    }

    async fn delete_audit_logs_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.audit_logs.len();
        tables.audit_logs.retain(|l| l.created_at >= cutoff);
        Ok(count(before - tables.audit_logs.len()))
    }
}

#[async_trait]
impl OneTimeTokenStore for MemoryStore {
    async fn create_one_time_token(&self, token: &OneTimeAccessToken) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.one_time_tokens.contains_key(&token.token) {
            return Err(StoreError::AlreadyInUse("token"));
        }
        tables
            .one_time_tokens
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn take_one_time_token(&self, token: &str) -> StoreResult<Option<OneTimeAccessToken>> {
        Ok(self.tables.lock().await.one_time_tokens.remove(token))
    }

    async fn delete_expired_one_time_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.one_time_tokens.len();
        tables.one_time_tokens.retain(|_, t| t.expires_at > now);
        Ok(count(before - tables.one_time_tokens.len()))
    }
}
