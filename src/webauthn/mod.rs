//! Passkey registration and login ceremonies.
//!
//! Each ceremony is two calls: `begin_*` parks the verifier state in a
//! ceremony session and hands the browser its options, `finish_*` consumes
//! that session (once) and verifies the authenticator response.

pub mod verifier;

use crate::audit::AuditLogger;
use crate::ceremony::{CeremonySessions, NewCeremony};
use crate::error::AppError;
use crate::store::{
    AuditLogData, Credential, CredentialStore, DeleteCredentialOutcome, Stores, User, UserStore,
};
use crate::token::TokenService;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use verifier::{PasskeyError, PasskeyVerifier};

/// Lifetime of both registration and login ceremonies.
pub const CEREMONY_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CREDENTIAL_NAME: &str = "New Passkey";

#[derive(Debug, Clone)]
pub struct CeremonyStart {
    pub options: Value,
    pub session_id: Uuid,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub access_token: String,
}

#[derive(Clone)]
pub struct WebauthnService {
    verifier: Arc<dyn PasskeyVerifier>,
    sessions: CeremonySessions,
    users: Arc<dyn UserStore>,
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    audit: AuditLogger,
}

fn internal(err: PasskeyError) -> AppError {
    AppError::Internal(err.into())
}

impl WebauthnService {
    #[must_use]
    pub fn new(
        verifier: Arc<dyn PasskeyVerifier>,
        stores: &Stores,
        tokens: Arc<TokenService>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            verifier,
            sessions: CeremonySessions::new(stores.ceremonies.clone()),
            users: stores.users.clone(),
            credentials: stores.credentials.clone(),
            tokens,
            audit,
        }
    }

    async fn open_session(
        &self,
        challenge: verifier::Challenge,
        user_id: Option<Uuid>,
    ) -> Result<CeremonyStart, AppError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(CEREMONY_TIMEOUT).map_err(anyhow::Error::from)?;
        let session_id = self
            .sessions
            .create(NewCeremony {
                challenge: challenge.challenge,
                expires_at,
                user_verification: challenge.user_verification,
                user_id,
                state: challenge.state,
            })
            .await?;
        Ok(CeremonyStart {
            options: challenge.options,
            session_id,
            timeout: CEREMONY_TIMEOUT,
        })
    }

    /// # Errors
    /// Returns `ResourceNotFound` for an unknown user.
    #[instrument(skip(self))]
    pub async fn begin_registration(&self, user_id: Uuid) -> Result<CeremonyStart, AppError> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(AppError::ResourceNotFound("user"))?;
        let existing = self.credentials.list_credentials(user_id).await?;
        let challenge = self
            .verifier
            .start_registration(&user, &existing, CEREMONY_TIMEOUT)
            .map_err(internal)?;
        self.open_session(challenge, Some(user_id)).await
    }

    /// # Errors
    /// Fails if the session is missing, expired or owned by someone else, or
    /// if the attestation does not verify.
    #[instrument(skip(self, response))]
    pub async fn finish_registration(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        response: &Value,
    ) -> Result<Credential, AppError> {
        let session = self.sessions.consume(session_id).await?;
        if session.user_id != Some(user_id) {
            debug!("Registration session belongs to another user");
            return Err(AppError::CeremonyNotFound);
        }

        let passkey = self
            .verifier
            .finish_registration(response, &session.state)
            .map_err(|err| match err {
                PasskeyError::State(_) => internal(err),
                _ => {
                    debug!("Registration rejected: {err}");
                    AppError::PasskeyVerificationFailed
                }
            })?;

        let credential = Credential {
            id: Uuid::new_v4(),
            name: DEFAULT_CREDENTIAL_NAME.to_string(),
            credential_id: passkey.credential_id,
            public_key: passkey.public_key,
            attestation_type: passkey.attestation_type,
            transports: passkey.transports,
            backup_eligible: passkey.backup_eligible,
            backup_state: passkey.backup_state,
            user_id,
            created_at: Utc::now(),
        };
        self.credentials.create_credential(&credential).await?;
        info!(credential = %credential.id, "Passkey registered");
        Ok(credential)
    }

    /// # Errors
    /// Returns error if the session cannot be stored.
    #[instrument(skip(self))]
    pub async fn begin_login(&self) -> Result<CeremonyStart, AppError> {
        let challenge = self
            .verifier
            .start_login(CEREMONY_TIMEOUT)
            .map_err(internal)?;
        self.open_session(challenge, None).await
    }

    /// Verify a discoverable assertion, issue a session access token and
    /// record the sign-in.
    ///
    /// # Errors
    /// Returns `InvalidCredentials` when no user or credential matches or the
    /// signature does not verify.
    #[instrument(skip(self, assertion, user_agent))]
    pub async fn finish_login(
        &self,
        session_id: Uuid,
        assertion: &Value,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<SignedIn, AppError> {
        let session = self.sessions.consume(session_id).await?;
        if session.user_id.is_some() {
            debug!("Login attempted with a registration session");
            return Err(AppError::CeremonyNotFound);
        }
        let rejected = |err: PasskeyError| match err {
            PasskeyError::State(_) => internal(err),
            _ => {
                debug!("Login rejected: {err}");
                AppError::InvalidCredentials
            }
        };

        let user_id = self.verifier.identify_user(assertion).map_err(rejected)?;
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        let credentials = self.credentials.list_credentials(user.id).await?;
        if credentials.is_empty() {
            return Err(AppError::InvalidCredentials);
        }
        self.verifier
            .finish_login(assertion, &session.state, &credentials)
            .map_err(rejected)?;

        let access_token = self.tokens.issue_access_token(&user, None)?;
        self.audit
            .record_sign_in_with_notification(ip_address, user_agent, user.id, AuditLogData::new())
            .await;
        info!(user = %user.id, "Passkey sign-in");
        Ok(SignedIn { user, access_token })
    }

    /// # Errors
    /// Returns error if the store fails.
    pub async fn list_credentials(&self, user_id: Uuid) -> Result<Vec<Credential>, AppError> {
        Ok(self.credentials.list_credentials(user_id).await?)
    }

    /// # Errors
    /// Returns `EmptyCredentialName` for a blank name and `ResourceNotFound`
    /// if the user owns no such credential.
    pub async fn rename_credential(
        &self,
        user_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> Result<Credential, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::EmptyCredentialName);
        }
        self.credentials
            .rename_credential(user_id, id, name)
            .await?
            .ok_or(AppError::ResourceNotFound("credential"))
    }

    /// # Errors
    /// Returns `ResourceNotFound` for an unknown credential and
    /// `LastCredential` when it is the user's only passkey.
    pub async fn delete_credential(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        match self.credentials.delete_credential(user_id, id).await? {
            DeleteCredentialOutcome::Deleted => Ok(()),
            DeleteCredentialOutcome::NotFound => Err(AppError::ResourceNotFound("credential")),
            DeleteCredentialOutcome::LastCredential => Err(AppError::LastCredential),
        }
    }
}
