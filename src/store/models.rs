use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Extra string claims released under the `profile` scope, keyed by claim name.
pub type CustomClaims = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserGroup {
    pub id: Uuid,
    pub name: String,
    pub custom_claims: CustomClaims,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
    pub groups: Vec<UserGroup>,
    pub custom_claims: CustomClaims,
}

impl User {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A registered passkey. `public_key` holds the serialized verifier state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: Uuid,
    pub name: String,
    pub credential_id: Vec<u8>,
    pub public_key: Vec<u8>,
    pub attestation_type: String,
    pub transports: Vec<String>,
    pub backup_eligible: bool,
    pub backup_state: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteCredentialOutcome {
    Deleted,
    NotFound,
    LastCredential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CeremonySession {
    pub id: Uuid,
    pub challenge: String,
    pub expires_at: DateTime<Utc>,
    pub user_verification: String,
    pub user_id: Option<Uuid>,
    /// Opaque verifier state needed to finish the ceremony.
    pub state: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    /// bcrypt hash; `None` marks a public client that authenticates with PKCE.
    pub secret_hash: Option<String>,
    pub name: String,
    pub callback_urls: Vec<String>,
    pub allowed_group_ids: Vec<Uuid>,
    pub created_by: Option<Uuid>,
}

impl Client {
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.secret_hash.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConsent {
    pub user_id: Uuid,
    pub client_id: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub user_id: Uuid,
    pub scope: String,
    pub nonce: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method_sha256: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeAccessToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLogEvent {
    SignIn,
    OneTimeAccessTokenSignIn,
    ClientAuthorization,
    NewClientAuthorization,
}

impl AuditLogEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignIn => "SIGN_IN",
            Self::OneTimeAccessTokenSignIn => "ONE_TIME_ACCESS_TOKEN_SIGN_IN",
            Self::ClientAuthorization => "CLIENT_AUTHORIZATION",
            Self::NewClientAuthorization => "NEW_CLIENT_AUTHORIZATION",
        }
    }
}

pub type AuditLogData = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLog {
    pub id: Uuid,
    pub event: AuditLogEvent,
    pub ip_address: String,
    pub user_agent: String,
    pub user_id: Uuid,
    pub country: Option<String>,
    pub city: Option<String>,
    pub data: AuditLogData,
    pub created_at: DateTime<Utc>,
}
