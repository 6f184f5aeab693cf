//! Access and ID token issuance and verification.
//!
//! All tokens are RS256 JWS signed with the single key held by
//! [`KeyManager`]. Session access tokens are bound to the application
//! hostname and expire after the live session duration; OIDC tokens are
//! bound to a client id and expire after one hour.

pub mod claims;
pub mod jwks;
pub mod jwt;

use crate::{error::AppError, keys::KeyManager, settings::AppSettings, store::User};
use chrono::Utc;
use claims::Audience;
use jwks::Jwks;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const ID_TOKEN_LIFETIME_SECONDS: i64 = 60 * 60;
pub const OAUTH_ACCESS_TOKEN_LIFETIME_SECONDS: i64 = 60 * 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("unknown key id: {0}")]
    UnknownKid(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("application URL has no host: {0}")]
    InvalidAppUrl(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Json(_) | TokenError::InvalidAppUrl(_) => Self::Internal(err.into()),
            _ => Self::InvalidToken,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    pub aud: Audience,
    pub exp: i64,
    pub iat: i64,
    #[serde(rename = "isAdmin", default, skip_serializing_if = "is_false")]
    pub is_admin: bool,
}

pub struct TokenService {
    keys: Arc<KeyManager>,
    settings: Arc<AppSettings>,
    issuer: String,
    hostname: String,
}

impl TokenService {
    /// # Errors
    /// Returns error if `app_url` has no host.
    pub fn new(
        keys: Arc<KeyManager>,
        settings: Arc<AppSettings>,
        app_url: &Url,
    ) -> Result<Self, TokenError> {
        let hostname = app_url
            .host_str()
            .ok_or_else(|| TokenError::InvalidAppUrl(app_url.to_string()))?
            .to_string();
        Ok(Self {
            keys,
            settings,
            issuer: app_url.as_str().trim_end_matches('/').to_string(),
            hostname,
        })
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Session access token. `audience` defaults to the application hostname.
    ///
    /// # Errors
    /// Returns error if the claims cannot be encoded.
    pub fn issue_access_token(
        &self,
        user: &User,
        audience: Option<&str>,
    ) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let minutes = i64::from(self.settings.session_duration_minutes());
        let claims = AccessTokenClaims {
            sub: user.id.to_string(),
            iss: None,
            aud: Audience::single(audience.unwrap_or(&self.hostname)),
            exp: now + minutes * 60,
            iat: now,
            is_admin: user.is_admin,
        };
        jwt::sign(self.keys.signing_key(), self.keys.kid(), &claims)
    }

    /// Client-scoped access token handed to relying parties.
    ///
    /// # Errors
    /// Returns error if the claims cannot be encoded.
    pub fn issue_oauth_access_token(
        &self,
        user: &User,
        client_id: &str,
    ) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = AccessTokenClaims {
            sub: user.id.to_string(),
            iss: Some(self.issuer.clone()),
            aud: Audience::single(client_id),
            exp: now + OAUTH_ACCESS_TOKEN_LIFETIME_SECONDS,
            iat: now,
            is_admin: false,
        };
        jwt::sign(self.keys.signing_key(), self.keys.kid(), &claims)
    }

    /// Scope-gated claims of `user`, with `email_verified` taken from the
    /// current settings.
    #[must_use]
    pub fn user_claims(&self, user: &User, scope: &str) -> Map<String, Value> {
        claims::user_claims(user, scope, self.settings.emails_verified())
    }

    /// ID token carrying the scope-gated claims of `user`.
    ///
    /// # Errors
    /// Returns error if the claims cannot be encoded.
    pub fn issue_id_token(
        &self,
        user: &User,
        client_id: &str,
        scope: &str,
        nonce: &str,
    ) -> Result<String, TokenError> {
        self.issue_id_token_with_claims(self.user_claims(user, scope), client_id, nonce)
    }

    /// ID token over precomputed user claims.
    ///
    /// # Errors
    /// Returns error if the claims cannot be encoded.
    pub fn issue_id_token_with_claims(
        &self,
        user_claims: Map<String, Value>,
        client_id: &str,
        nonce: &str,
    ) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let mut claims = user_claims;
        claims.insert("aud".to_string(), json!(client_id));
        claims.insert("iss".to_string(), json!(self.issuer));
        claims.insert("iat".to_string(), json!(now));
        claims.insert(
            "exp".to_string(),
            json!(now + ID_TOKEN_LIFETIME_SECONDS),
        );
        if !nonce.is_empty() {
            claims.insert("nonce".to_string(), json!(nonce));
        }
        jwt::sign(self.keys.signing_key(), self.keys.kid(), &Value::Object(claims))
    }

    /// Verify a session access token: signature, expiry, and audience bound
    /// to the application hostname.
    ///
    /// # Errors
    /// Returns error if any of the checks fail.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let claims = self.verify_signed(token)?;
        if !claims.aud.contains(&self.hostname) {
            debug!("Access token audience mismatch");
            return Err(TokenError::InvalidAudience);
        }
        Ok(claims)
    }

    /// Verify a client-scoped access token. The audience is returned to the
    /// caller, who resolves it as the client id.
    ///
    /// # Errors
    /// Returns error if the signature or expiry checks fail.
    pub fn verify_oauth_access_token(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        self.verify_signed(token)
    }

    fn verify_signed(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let claims: AccessTokenClaims =
            jwt::verify(self.keys.verifying_key(), self.keys.kid(), token)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Client id named by an ID token we issued. Expiry is ignored so a
    /// stale token can still serve as a logout hint.
    ///
    /// # Errors
    /// Returns error if the signature does not verify or `aud` is missing.
    pub fn id_token_hint_client(&self, token: &str) -> Result<String, TokenError> {
        let claims: Value = jwt::verify(self.keys.verifying_key(), self.keys.kid(), token)?;
        let audience: Audience =
            serde_json::from_value(claims["aud"].clone()).map_err(|_| TokenError::TokenFormat)?;
        audience
            .first()
            .map(str::to_string)
            .ok_or(TokenError::InvalidAudience)
    }

    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks::single(self.keys.export_jwk())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::tests::test_key_manager;
    use crate::settings::SettingsValues;
    use anyhow::Result;
    use base64ct::{Base64UrlUnpadded, Encoding};
    use uuid::Uuid;

    fn service() -> Result<(TokenService, Arc<AppSettings>)> {
        let settings = Arc::new(AppSettings::new(SettingsValues::default()));
        let url = Url::parse("https://id.example.com")?;
        let tokens = TokenService::new(Arc::new(test_key_manager()), settings.clone(), &url)?;
        Ok((tokens, settings))
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "craig".to_string(),
            email: "craig@example.com".to_string(),
            first_name: "Craig".to_string(),
            last_name: "Federighi".to_string(),
            is_admin: true,
            groups: vec![],
            custom_claims: crate::store::CustomClaims::new(),
        }
    }

    fn payload(token: &str) -> Result<Value> {
        let part = token
            .split('.')
            .nth(1)
            .ok_or_else(|| anyhow::anyhow!("missing payload"))?;
        let bytes = Base64UrlUnpadded::decode_vec(part).map_err(|_| anyhow::anyhow!("base64"))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[test]
    fn access_token_round_trip() -> Result<()> {
        let (tokens, _) = service()?;
        let user = user();
        let token = tokens.issue_access_token(&user, None)?;

        let claims = tokens.verify_access_token(&token)?;
        assert_eq!(claims.sub, user.id.to_string());
        assert!(claims.aud.contains("id.example.com"));
        assert!(claims.is_admin);
        assert_eq!(claims.exp - claims.iat, 60 * 60);
        Ok(())
    }

    #[test]
    fn session_duration_is_read_live() -> Result<()> {
        let (tokens, settings) = service()?;
        settings.update(|values| values.session_duration_minutes = 5);

        let claims = tokens.verify_access_token(&tokens.issue_access_token(&user(), None)?)?;
        assert_eq!(claims.exp - claims.iat, 5 * 60);
        Ok(())
    }

    #[test]
    fn access_token_for_other_audience_is_rejected() -> Result<()> {
        let (tokens, _) = service()?;
        let token = tokens.issue_access_token(&user(), Some("acme"))?;
        assert!(matches!(
            tokens.verify_access_token(&token),
            Err(TokenError::InvalidAudience)
        ));
        Ok(())
    }

    #[test]
    fn expired_access_token_is_rejected() -> Result<()> {
        let (tokens, _) = service()?;
        let keys = test_key_manager();
        let now = Utc::now().timestamp();
        let claims = AccessTokenClaims {
            sub: "someone".to_string(),
            iss: None,
            aud: Audience::single("id.example.com"),
            exp: now - 1,
            iat: now - 3600,
            is_admin: false,
        };
        let token = jwt::sign(keys.signing_key(), "1", &claims)?;
        assert!(matches!(
            tokens.verify_access_token(&token),
            Err(TokenError::Expired)
        ));
        Ok(())
    }

    #[test]
    fn access_token_signed_by_other_key_is_rejected() -> Result<()> {
        let (tokens, _) = service()?;
        let other = KeyManager::from_private_key(rsa::RsaPrivateKey::new(
            &mut rand::rngs::OsRng,
            1024,
        )?);
        let now = Utc::now().timestamp();
        let claims = AccessTokenClaims {
            sub: "someone".to_string(),
            iss: None,
            aud: Audience::single("id.example.com"),
            exp: now + 60,
            iat: now,
            is_admin: true,
        };
        let token = jwt::sign(other.signing_key(), "1", &claims)?;
        assert!(matches!(
            tokens.verify_access_token(&token),
            Err(TokenError::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn id_token_carries_scope_claims_and_nonce() -> Result<()> {
        let (tokens, _) = service()?;
        let token = tokens.issue_id_token(&user(), "acme", "openid profile", "n-0S6")?;
        let claims = payload(&token)?;

        assert_eq!(claims["aud"], "acme");
        assert_eq!(claims["iss"], "https://id.example.com");
        assert_eq!(claims["nonce"], "n-0S6");
        assert_eq!(claims["given_name"], "Craig");
        assert_eq!(claims["preferred_username"], "craig");
        assert!(claims.get("email").is_none());
        let lifetime = claims["exp"].as_i64().unwrap_or_default()
            - claims["iat"].as_i64().unwrap_or_default();
        assert_eq!(lifetime, ID_TOKEN_LIFETIME_SECONDS);
        Ok(())
    }

    #[test]
    fn email_verified_claim_is_read_live() -> Result<()> {
        let (tokens, settings) = service()?;
        let before = payload(&tokens.issue_id_token(&user(), "acme", "openid email", "")?)?;
        assert_eq!(before["email_verified"], false);

        settings.update(|values| values.emails_verified = true);
        let after = payload(&tokens.issue_id_token(&user(), "acme", "openid email", "")?)?;
        assert_eq!(after["email_verified"], true);
        Ok(())
    }

    #[test]
    fn id_token_omits_empty_nonce() -> Result<()> {
        let (tokens, _) = service()?;
        let token = tokens.issue_id_token(&user(), "acme", "openid", "")?;
        assert!(payload(&token)?.get("nonce").is_none());
        Ok(())
    }

    #[test]
    fn oauth_access_token_is_bound_to_client() -> Result<()> {
        let (tokens, _) = service()?;
        let token = tokens.issue_oauth_access_token(&user(), "acme")?;

        let claims = tokens.verify_oauth_access_token(&token)?;
        assert_eq!(claims.aud.first(), Some("acme"));
        assert_eq!(claims.iss.as_deref(), Some("https://id.example.com"));
        assert!(!claims.is_admin);
        assert!(tokens.verify_access_token(&token).is_err());
        Ok(())
    }

    #[test]
    fn id_token_hint_names_its_client() -> Result<()> {
        let (tokens, _) = service()?;
        let token = tokens.issue_id_token(&user(), "acme", "openid", "")?;
        assert_eq!(tokens.id_token_hint_client(&token)?, "acme");
        assert!(tokens.id_token_hint_client("a.b.c").is_err());
        Ok(())
    }
}
