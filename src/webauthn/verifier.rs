//! Protocol-level passkey verification.
//!
//! [`PasskeyVerifier`] isolates the attestation and assertion checks so the
//! orchestrator can be driven without a real authenticator. The production
//! implementation wraps `webauthn-rs`; its ceremony state round-trips through
//! JSON so it can be parked in a ceremony session between begin and finish.

use crate::store::{Credential, User};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use url::Url;
use uuid::Uuid;
use webauthn_rs::prelude::{
    CredentialID, DiscoverableAuthentication, DiscoverableKey, Passkey, PasskeyRegistration,
    PublicKeyCredential, RegisterPublicKeyCredential, Webauthn, WebauthnBuilder,
};

#[derive(Debug, Error)]
pub enum PasskeyError {
    #[error("malformed authenticator response")]
    Malformed(#[source] serde_json::Error),
    #[error("corrupt ceremony state")]
    State(#[source] serde_json::Error),
    #[error("passkey rejected: {0}")]
    Rejected(String),
}

/// Options for the browser plus the state needed to finish the ceremony.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub options: Value,
    pub challenge: String,
    pub user_verification: String,
    pub state: Value,
}

/// Attested credential ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredPasskey {
    pub credential_id: Vec<u8>,
    pub public_key: Vec<u8>,
    pub attestation_type: String,
    pub transports: Vec<String>,
    pub backup_eligible: bool,
    pub backup_state: bool,
}

pub trait PasskeyVerifier: Send + Sync {
    /// Registration options requiring a resident key and excluding `existing`.
    ///
    /// # Errors
    /// Returns error if the options cannot be built.
    fn start_registration(
        &self,
        user: &User,
        existing: &[Credential],
        timeout: Duration,
    ) -> Result<Challenge, PasskeyError>;

    /// # Errors
    /// Returns error if the attestation does not verify against `state`.
    fn finish_registration(
        &self,
        response: &Value,
        state: &Value,
    ) -> Result<RegisteredPasskey, PasskeyError>;

    /// Usernameless login options.
    ///
    /// # Errors
    /// Returns error if the options cannot be built.
    fn start_login(&self, timeout: Duration) -> Result<Challenge, PasskeyError>;

    /// User handle embedded in a discoverable assertion.
    ///
    /// # Errors
    /// Returns error if the assertion is malformed or carries no handle.
    fn identify_user(&self, assertion: &Value) -> Result<Uuid, PasskeyError>;

    /// Verify `assertion` against the user's stored credentials and return the
    /// id of the credential that signed it.
    ///
    /// # Errors
    /// Returns error if no credential matches or the signature is invalid.
    fn finish_login(
        &self,
        assertion: &Value,
        state: &Value,
        credentials: &[Credential],
    ) -> Result<Vec<u8>, PasskeyError>;
}

pub struct WebauthnVerifier {
    webauthn: Webauthn,
}

impl WebauthnVerifier {
    /// Relying party id is the host of `app_url`, the origin is `app_url` itself.
    ///
    /// # Errors
    /// Returns error if the URL has no host or is rejected as an origin.
    pub fn new(app_url: &Url, rp_name: &str) -> anyhow::Result<Self> {
        let rp_id = app_url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("app url has no host: {app_url}"))?;
        let webauthn = WebauthnBuilder::new(rp_id, app_url)?
            .rp_name(rp_name)
            .build()?;
        Ok(Self { webauthn })
    }
}

fn rejected(err: impl std::fmt::Display) -> PasskeyError {
    PasskeyError::Rejected(err.to_string())
}

fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

fn challenge_of(options: &Value) -> String {
    options["publicKey"]["challenge"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

impl PasskeyVerifier for WebauthnVerifier {
    fn start_registration(
        &self,
        user: &User,
        existing: &[Credential],
        timeout: Duration,
    ) -> Result<Challenge, PasskeyError> {
        let exclude: Vec<CredentialID> = existing
            .iter()
            .map(|credential| credential.credential_id.clone().into())
            .collect();
        let display_name = match user.full_name() {
            name if name.is_empty() => user.username.clone(),
            name => name,
        };
        let (ccr, registration) = self
            .webauthn
            .start_passkey_registration(user.id, &user.username, &display_name, Some(exclude))
            .map_err(rejected)?;

        let mut options = serde_json::to_value(&ccr).map_err(PasskeyError::State)?;
        let public_key = &mut options["publicKey"];
        public_key["timeout"] = json!(timeout_millis(timeout));
        public_key["authenticatorSelection"]["residentKey"] = json!("required");
        public_key["authenticatorSelection"]["requireResidentKey"] = json!(true);
        let user_verification = public_key["authenticatorSelection"]["userVerification"]
            .as_str()
            .unwrap_or("required")
            .to_string();

        Ok(Challenge {
            challenge: challenge_of(&options),
            user_verification,
            state: serde_json::to_value(&registration).map_err(PasskeyError::State)?,
            options,
        })
    }

    fn finish_registration(
        &self,
        response: &Value,
        state: &Value,
    ) -> Result<RegisteredPasskey, PasskeyError> {
        let response: RegisterPublicKeyCredential =
            serde_json::from_value(response.clone()).map_err(PasskeyError::Malformed)?;
        let registration: PasskeyRegistration =
            serde_json::from_value(state.clone()).map_err(PasskeyError::State)?;
        let passkey = self
            .webauthn
            .finish_passkey_registration(&response, &registration)
            .map_err(rejected)?;

        let stored = serde_json::to_value(&passkey).map_err(PasskeyError::State)?;
        let cred = &stored["cred"];
        let transports = cred["transports"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default();
        let attestation_type = cred["attestation_format"]
            .as_str()
            .map_or_else(|| "none".to_string(), str::to_lowercase);

        Ok(RegisteredPasskey {
            credential_id: passkey.cred_id().as_slice().to_vec(),
            public_key: serde_json::to_vec(&passkey).map_err(PasskeyError::State)?,
            attestation_type,
            transports,
            backup_eligible: cred["backup_eligible"].as_bool().unwrap_or(false),
            backup_state: cred["backup_state"].as_bool().unwrap_or(false),
        })
    }

    fn start_login(&self, timeout: Duration) -> Result<Challenge, PasskeyError> {
        let (rcr, authentication) = self
            .webauthn
            .start_discoverable_authentication()
            .map_err(rejected)?;

        let mut options = serde_json::to_value(&rcr).map_err(PasskeyError::State)?;
        options["publicKey"]["timeout"] = json!(timeout_millis(timeout));
        let user_verification = options["publicKey"]["userVerification"]
            .as_str()
            .unwrap_or("required")
            .to_string();

        Ok(Challenge {
            challenge: challenge_of(&options),
            user_verification,
            state: serde_json::to_value(&authentication).map_err(PasskeyError::State)?,
            options,
        })
    }

    fn identify_user(&self, assertion: &Value) -> Result<Uuid, PasskeyError> {
        let credential: PublicKeyCredential =
            serde_json::from_value(assertion.clone()).map_err(PasskeyError::Malformed)?;
        let (user_id, _) = self
            .webauthn
            .identify_discoverable_authentication(&credential)
            .map_err(rejected)?;
        Ok(user_id)
    }

    fn finish_login(
        &self,
        assertion: &Value,
        state: &Value,
        credentials: &[Credential],
    ) -> Result<Vec<u8>, PasskeyError> {
        let credential: PublicKeyCredential =
            serde_json::from_value(assertion.clone()).map_err(PasskeyError::Malformed)?;
        let authentication: DiscoverableAuthentication =
            serde_json::from_value(state.clone()).map_err(PasskeyError::State)?;

        let passkeys: Vec<Passkey> = credentials
            .iter()
            .filter_map(|stored| serde_json::from_slice(&stored.public_key).ok())
            .collect();
        let keys: Vec<DiscoverableKey> = passkeys.iter().map(DiscoverableKey::from).collect();

        let result = self
            .webauthn
            .finish_discoverable_authentication(&credential, authentication, &keys)
            .map_err(rejected)?;
        Ok(result.cred_id().as_slice().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "tim".to_string(),
            email: "tim.cook@test.com".to_string(),
            first_name: "Tim".to_string(),
            last_name: "Cook".to_string(),
            is_admin: false,
            groups: vec![],
            custom_claims: crate::store::CustomClaims::new(),
        }
    }

    fn verifier() -> Result<WebauthnVerifier> {
        WebauthnVerifier::new(&Url::parse("https://id.example.com")?, "Portero")
    }

    #[test]
    fn registration_options_require_resident_key() -> Result<()> {
        let challenge =
            verifier()?.start_registration(&user(), &[], Duration::from_secs(60))?;
        let public_key = &challenge.options["publicKey"];
        assert_eq!(public_key["timeout"], 60_000);
        assert_eq!(public_key["rp"]["id"], "id.example.com");
        assert_eq!(public_key["authenticatorSelection"]["residentKey"], "required");
        assert!(!challenge.challenge.is_empty());
        assert!(challenge.state.is_object());
        Ok(())
    }

    #[test]
    fn login_options_are_discoverable() -> Result<()> {
        let challenge = verifier()?.start_login(Duration::from_secs(60))?;
        let public_key = &challenge.options["publicKey"];
        assert_eq!(public_key["timeout"], 60_000);
        assert!(public_key["allowCredentials"]
            .as_array()
            .map_or(true, Vec::is_empty));
        assert!(challenge.state.is_object());
        Ok(())
    }

    #[test]
    fn garbage_responses_are_malformed() -> Result<()> {
        let verifier = verifier()?;
        let result = verifier.identify_user(&json!({ "id": 1 }));
        assert!(matches!(result, Err(PasskeyError::Malformed(_))));
        Ok(())
    }

    #[test]
    fn rejects_url_without_host() -> Result<()> {
        assert!(WebauthnVerifier::new(&Url::parse("data:text/plain,hi")?, "Portero").is_err());
        Ok(())
    }
}
