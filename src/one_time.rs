//! One-time access tokens: short random strings an administrator hands to a
//! user who has no passkey yet, exchanged once for a session access token.

use crate::audit::AuditLogger;
use crate::error::AppError;
use crate::oidc::codes::random_string;
use crate::store::{
    AuditLogData, AuditLogEvent, CredentialStore, CustomClaims, OneTimeAccessToken,
    OneTimeTokenStore, StoreError, Stores, User, UserStore,
};
use crate::token::TokenService;
use crate::webauthn::SignedIn;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub const ONE_TIME_TOKEN_LENGTH: usize = 16;
pub const INITIAL_ADMIN_USERNAME: &str = "admin";

fn initial_admin() -> User {
    User {
        id: Uuid::new_v4(),
        username: INITIAL_ADMIN_USERNAME.to_string(),
        email: "admin@admin.com".to_string(),
        first_name: "Admin".to_string(),
        last_name: "Admin".to_string(),
        is_admin: true,
        groups: vec![],
        custom_claims: CustomClaims::new(),
    }
}

#[derive(Clone)]
pub struct OneTimeTokenService {
    store: Arc<dyn OneTimeTokenStore>,
    users: Arc<dyn UserStore>,
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    audit: AuditLogger,
}

impl OneTimeTokenService {
    #[must_use]
    pub fn new(stores: &Stores, tokens: Arc<TokenService>, audit: AuditLogger) -> Self {
        Self {
            store: stores.one_time_tokens.clone(),
            users: stores.users.clone(),
            credentials: stores.credentials.clone(),
            tokens,
            audit,
        }
    }

    /// # Errors
    /// Returns `ResourceNotFound` for an unknown user.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        if self.users.get_user(user_id).await?.is_none() {
            return Err(AppError::ResourceNotFound("user"));
        }
        let token = OneTimeAccessToken {
            token: random_string(ONE_TIME_TOKEN_LENGTH),
            user_id,
            expires_at,
        };
        self.store.create_one_time_token(&token).await?;
        info!(user = %user_id, %expires_at, "One-time access token created");
        Ok(token.token)
    }

    /// # Errors
    /// Returns `TokenInvalidOrExpired` if the token is unknown, used or expired.
    #[instrument(skip(self, token, user_agent))]
    pub async fn exchange(
        &self,
        token: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<SignedIn, AppError> {
        let record = self
            .store
            .take_one_time_token(token)
            .await?
            .ok_or(AppError::TokenInvalidOrExpired)?;
        if record.expires_at <= Utc::now() {
            return Err(AppError::TokenInvalidOrExpired);
        }
        let user = self
            .users
            .get_user(record.user_id)
            .await?
            .ok_or(AppError::TokenInvalidOrExpired)?;

        let access_token = self.tokens.issue_access_token(&user, None)?;
        self.audit
            .record(
                AuditLogEvent::OneTimeAccessTokenSignIn,
                ip_address,
                user_agent,
                user.id,
                AuditLogData::new(),
            )
            .await;
        Ok(SignedIn { user, access_token })
    }

    /// Sign in as the initial administrator, creating it on an empty store.
    ///
    /// Can be repeated until the administrator registers a passkey, so a
    /// setup abandoned before that step is not a dead end.
    ///
    /// # Errors
    /// Returns `SetupAlreadyCompleted` once any other user exists or the
    /// administrator owns a passkey.
    #[instrument(skip(self))]
    pub async fn setup_initial_admin(&self) -> Result<SignedIn, AppError> {
        if self.users.count_users().await? > 1 {
            return Err(AppError::SetupAlreadyCompleted);
        }

        let admin = match self.users.get_user_by_username(INITIAL_ADMIN_USERNAME).await? {
            Some(admin) if admin.is_admin => admin,
            Some(_) => return Err(AppError::SetupAlreadyCompleted),
            None => {
                if self.users.count_users().await? > 0 {
                    return Err(AppError::SetupAlreadyCompleted);
                }
                let admin = initial_admin();
                match self.users.create_user(&admin).await {
                    Ok(()) => {}
                    Err(StoreError::AlreadyInUse(_)) => {
                        return Err(AppError::SetupAlreadyCompleted)
                    }
                    Err(err) => return Err(err.into()),
                }
                info!(user = %admin.id, "Initial administrator created");
                admin
            }
        };

        if !self.credentials.list_credentials(admin.id).await?.is_empty() {
            return Err(AppError::SetupAlreadyCompleted);
        }

        let access_token = self.tokens.issue_access_token(&admin, None)?;
        Ok(SignedIn {
            user: admin,
            access_token,
        })
    }
}
