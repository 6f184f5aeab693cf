//! OpenID Connect authorization-code flow.
//!
//! A signed-in user authorizes a client, either against consent recorded
//! earlier (`authorize`) or by granting it now (`authorize_new_client`).
//! Both issue a single-use code that the relying party redeems at the token
//! endpoint (`create_tokens`) for an ID token and a client-bound access token.

pub mod codes;
pub mod pkce;

use crate::audit::AuditLogger;
use crate::error::AppError;
use crate::store::{
    AuditLogData, AuditLogEvent, AuthorizationCode, AuthorizationCodeStore, Client,
    ClientConsent, ClientStore, ConsentStore, Stores, User, UserStore,
};
use crate::token::{TokenService, OAUTH_ACCESS_TOKEN_LIFETIME_SECONDS};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";
pub const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

#[derive(Debug, Clone, Default)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub scope: String,
    pub nonce: String,
    /// Empty selects the client's first registered callback URL.
    pub callback_url: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeResponse {
    pub code: String,
    pub callback_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: String,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub code_verifier: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    pub expires_in: i64,
}

/// Where the caller of a request came from, for audit entries.
#[derive(Debug, Clone, Default)]
pub struct RequestOrigin {
    pub ip_address: String,
    pub user_agent: String,
}

#[derive(Clone)]
pub struct OidcService {
    clients: Arc<dyn ClientStore>,
    consents: Arc<dyn ConsentStore>,
    codes: Arc<dyn AuthorizationCodeStore>,
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
    audit: AuditLogger,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|value| !value.is_empty())
}

/// `input` if registered for the client, the first registered URL if empty.
fn callback_url(client: &Client, input: &str) -> Result<String, AppError> {
    if input.is_empty() {
        return client
            .callback_urls
            .first()
            .cloned()
            .ok_or(AppError::OidcInvalidCallbackUrl);
    }
    if client.callback_urls.iter().any(|url| url == input) {
        Ok(input.to_string())
    } else {
        Err(AppError::OidcInvalidCallbackUrl)
    }
}

fn user_may_access(client: &Client, user: &User) -> bool {
    client.allowed_group_ids.is_empty()
        || user
            .groups
            .iter()
            .any(|group| client.allowed_group_ids.contains(&group.id))
}

async fn verify_secret(secret: String, hash: String) -> Result<bool, AppError> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(secret, &hash))
        .await
        .context("bcrypt task failed")?;
    Ok(verified.unwrap_or(false))
}

impl OidcService {
    #[must_use]
    pub fn new(stores: &Stores, tokens: Arc<TokenService>, audit: AuditLogger) -> Self {
        Self {
            clients: stores.clients.clone(),
            consents: stores.consents.clone(),
            codes: stores.codes.clone(),
            users: stores.users.clone(),
            tokens,
            audit,
        }
    }

    async fn client(&self, client_id: &str) -> Result<Client, AppError> {
        self.clients
            .get_client(client_id)
            .await?
            .ok_or(AppError::ResourceNotFound("client"))
    }

    async fn user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.users
            .get_user(user_id)
            .await?
            .ok_or(AppError::ResourceNotFound("user"))
    }

    /// Checks shared by both authorize paths. Returns the client and the
    /// callback URL the code will be delivered to.
    async fn admit(
        &self,
        request: &AuthorizeRequest,
        user_id: Uuid,
    ) -> Result<(Client, String), AppError> {
        let client = self.client(&request.client_id).await?;
        let user = self.user(user_id).await?;
        if !user_may_access(&client, &user) {
            return Err(AppError::MissingAccessToUser);
        }
        let callback_url = callback_url(&client, &request.callback_url)?;
        if client.is_public() && non_empty(request.code_challenge.as_ref()).is_none() {
            return Err(AppError::OidcMissingCodeChallenge);
        }
        Ok((client, callback_url))
    }

    /// Issue a code against consent already on record.
    ///
    /// # Errors
    /// Returns `OidcMissingAuthorization` unless the stored consent scope equals
    /// the requested scope exactly.
    #[instrument(skip(self, request, origin), fields(client = %request.client_id))]
    pub async fn authorize(
        &self,
        request: &AuthorizeRequest,
        user_id: Uuid,
        origin: &RequestOrigin,
    ) -> Result<AuthorizeResponse, AppError> {
        let (client, callback_url) = self.admit(request, user_id).await?;

        let consent = self.consents.get_consent(user_id, &client.id).await?;
        if consent.map_or(true, |consent| consent.scope != request.scope) {
            debug!("No matching consent on record");
            return Err(AppError::OidcMissingAuthorization);
        }

        let code = self.create_code(request, user_id, Utc::now()).await?;
        self.record(AuditLogEvent::ClientAuthorization, &client, user_id, origin)
            .await;
        Ok(AuthorizeResponse { code, callback_url })
    }

    /// Record consent for the requested scope, then issue a code.
    ///
    /// # Errors
    /// Returns error if the client, callback URL or PKCE checks fail.
    #[instrument(skip(self, request, origin), fields(client = %request.client_id))]
    pub async fn authorize_new_client(
        &self,
        request: &AuthorizeRequest,
        user_id: Uuid,
        origin: &RequestOrigin,
    ) -> Result<AuthorizeResponse, AppError> {
        let (client, callback_url) = self.admit(request, user_id).await?;

        self.consents
            .upsert_consent(&ClientConsent {
                user_id,
                client_id: client.id.clone(),
                scope: request.scope.clone(),
            })
            .await?;

        let code = self.create_code(request, user_id, Utc::now()).await?;
        self.record(AuditLogEvent::NewClientAuthorization, &client, user_id, origin)
            .await;
        Ok(AuthorizeResponse { code, callback_url })
    }

    async fn create_code(
        &self,
        request: &AuthorizeRequest,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let code_challenge = non_empty(request.code_challenge.as_ref()).map(str::to_string);
        let code = AuthorizationCode {
            code: codes::random_string(codes::AUTHORIZATION_CODE_LENGTH),
            client_id: request.client_id.clone(),
            user_id,
            scope: request.scope.clone(),
            nonce: request.nonce.clone(),
            code_challenge_method_sha256: code_challenge.is_some()
                && pkce::is_sha256(request.code_challenge_method.as_deref()),
            code_challenge,
            expires_at: now + Duration::minutes(codes::AUTHORIZATION_CODE_LIFETIME_MINUTES),
        };
        self.codes.create_code(&code).await?;
        Ok(code.code)
    }

    async fn record(
        &self,
        event: AuditLogEvent,
        client: &Client,
        user_id: Uuid,
        origin: &RequestOrigin,
    ) {
        let data = AuditLogData::from([("clientName".to_string(), client.name.clone())]);
        self.audit
            .record(event, &origin.ip_address, &origin.user_agent, user_id, data)
            .await;
    }

    /// Redeem an authorization code.
    ///
    /// The code is removed before it is validated, so a redemption attempt by
    /// the wrong client also burns it. A code is rejected when it belongs to
    /// another client or has expired; either condition alone suffices.
    ///
    /// # Errors
    /// Returns the OIDC error kind matching the failed check.
    #[instrument(skip(self, request))]
    pub async fn create_tokens(&self, request: TokenRequest) -> Result<TokenSet, AppError> {
        self.create_tokens_at(request, Utc::now()).await
    }

    async fn create_tokens_at(
        &self,
        request: TokenRequest,
        now: DateTime<Utc>,
    ) -> Result<TokenSet, AppError> {
        if request.grant_type != GRANT_TYPE_AUTHORIZATION_CODE {
            return Err(AppError::OidcUnsupportedGrantType);
        }
        let client_id =
            non_empty(request.client_id.as_ref()).ok_or(AppError::OidcMissingClientCredentials)?;
        let client = self
            .clients
            .get_client(client_id)
            .await?
            .ok_or(AppError::OidcInvalidClientSecret)?;

        match &client.secret_hash {
            Some(hash) => {
                let secret = request
                    .client_secret
                    .as_ref()
                    .map(ExposeSecret::expose_secret)
                    .filter(|secret| !secret.is_empty())
                    .ok_or(AppError::OidcMissingClientCredentials)?;
                if !verify_secret(secret.to_string(), hash.clone()).await? {
                    return Err(AppError::OidcInvalidClientSecret);
                }
            }
            None => {
                if non_empty(request.code_verifier.as_ref()).is_none() {
                    return Err(AppError::OidcMissingClientCredentials);
                }
            }
        }

        let code = self
            .codes
            .take_code(&request.code)
            .await?
            .ok_or(AppError::OidcInvalidAuthorizationCode)?;
        if code.client_id != client.id || code.expires_at <= now {
            debug!("Authorization code is expired or belongs to another client");
            return Err(AppError::OidcInvalidAuthorizationCode);
        }

        if let Some(challenge) = &code.code_challenge {
            let verifier =
                non_empty(request.code_verifier.as_ref()).ok_or(AppError::OidcInvalidCodeVerifier)?;
            if !pkce::verify(verifier, challenge, code.code_challenge_method_sha256) {
                return Err(AppError::OidcInvalidCodeVerifier);
            }
        }

        let user = self
            .users
            .get_user(code.user_id)
            .await?
            .ok_or(AppError::OidcInvalidAuthorizationCode)?;
        let scope = self
            .consents
            .get_consent(user.id, &client.id)
            .await?
            .map_or(code.scope, |consent| consent.scope);

        let id_token = self.tokens.issue_id_token_with_claims(
            self.tokens.user_claims(&user, &scope),
            &client.id,
            &code.nonce,
        )?;
        let access_token = self.tokens.issue_oauth_access_token(&user, &client.id)?;
        info!(client = %client.id, user = %user.id, "Authorization code redeemed");
        Ok(TokenSet {
            id_token,
            access_token,
            expires_in: OAUTH_ACCESS_TOKEN_LIFETIME_SECONDS,
        })
    }

    /// Claims released to `client_id` under the scope the user consented to.
    ///
    /// # Errors
    /// Returns `OidcMissingAuthorization` if the user never authorized the client.
    pub async fn get_user_claims_for_client(
        &self,
        user_id: Uuid,
        client_id: &str,
    ) -> Result<Map<String, Value>, AppError> {
        let consent = self
            .consents
            .get_consent(user_id, client_id)
            .await?
            .ok_or(AppError::OidcMissingAuthorization)?;
        let user = self.user(user_id).await?;
        Ok(self.tokens.user_claims(&user, &consent.scope))
    }

    /// Userinfo for a client-bound access token.
    ///
    /// # Errors
    /// Returns `InvalidToken` if the token does not verify.
    pub async fn userinfo(&self, access_token: &str) -> Result<Map<String, Value>, AppError> {
        let claims = self.tokens.verify_oauth_access_token(access_token)?;
        let client_id = claims.aud.first().ok_or(AppError::InvalidToken)?;
        let user_id: Uuid = claims.sub.parse().map_err(|_| AppError::InvalidToken)?;
        self.get_user_claims_for_client(user_id, client_id).await
    }

    /// Generate a new client secret, store its hash and return the plaintext.
    ///
    /// # Errors
    /// Returns `ResourceNotFound` for an unknown client.
    pub async fn create_client_secret(&self, client_id: &str) -> Result<String, AppError> {
        let secret = codes::random_string(codes::CLIENT_SECRET_LENGTH);
        let plain = secret.clone();
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(plain, BCRYPT_COST))
            .await
            .context("bcrypt task failed")?
            .context("failed to hash client secret")?;
        if !self.clients.update_client_secret(client_id, &hash).await? {
            return Err(AppError::ResourceNotFound("client"));
        }
        info!(client = %client_id, "Client secret rotated");
        Ok(secret)
    }

    /// Post-logout redirect target, only when it is registered for the client
    /// named by `id_token_hint` or `client_id`.
    pub async fn end_session_redirect(
        &self,
        id_token_hint: Option<&str>,
        client_id: Option<&str>,
        post_logout_redirect_uri: Option<&str>,
    ) -> Option<String> {
        let redirect = post_logout_redirect_uri.filter(|uri| !uri.is_empty())?;
        let client_id = match id_token_hint.filter(|hint| !hint.is_empty()) {
            Some(hint) => self.tokens.id_token_hint_client(hint).ok()?,
            None => client_id?.to_string(),
        };
        let client = self.clients.get_client(&client_id).await.ok()??;
        client
            .callback_urls
            .iter()
            .any(|url| url == redirect)
            .then(|| redirect.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::geo::NoopGeoLookup;
    use crate::keys::tests::test_key_manager;
    use crate::settings::{AppSettings, SettingsValues};
    use crate::store::{CustomClaims, UserGroup};
    use anyhow::Result;
    use base64ct::{Base64UrlUnpadded, Encoding};
    use url::Url;

    const SECRET: &str = "s3cr3t-for-acme";
    const CALLBACK: &str = "https://acme.example.com/callback";

    struct Fixture {
        service: OidcService,
        stores: Stores,
        tokens: Arc<TokenService>,
        user: User,
    }

    fn origin() -> RequestOrigin {
        RequestOrigin {
            ip_address: "127.0.0.1".to_string(),
            user_agent: "test".to_string(),
        }
    }

    fn client(id: &str, secret_hash: Option<String>) -> Client {
        Client {
            id: id.to_string(),
            secret_hash,
            name: format!("{id} app"),
            callback_urls: vec![CALLBACK.to_string()],
            allowed_group_ids: vec![],
            created_by: None,
        }
    }

    async fn fixture() -> Result<Fixture> {
        let stores = Stores::in_memory();
        let settings = Arc::new(AppSettings::new(SettingsValues::default()));
        let tokens = Arc::new(TokenService::new(
            Arc::new(test_key_manager()),
            settings.clone(),
            &Url::parse("https://id.example.com")?,
        )?);
        let audit = AuditLogger::new(
            stores.audit_logs.clone(),
            stores.users.clone(),
            Arc::new(NoopGeoLookup),
            settings,
        );
        let user = User {
            id: Uuid::new_v4(),
            username: "tim".to_string(),
            email: "tim.cook@test.com".to_string(),
            first_name: "Tim".to_string(),
            last_name: "Cook".to_string(),
            is_admin: false,
            groups: vec![UserGroup {
                id: Uuid::new_v4(),
                name: "developers".to_string(),
                custom_claims: CustomClaims::new(),
            }],
            custom_claims: CustomClaims::new(),
        };
        stores.users.create_user(&user).await?;
        let hash = bcrypt::hash(SECRET, 4)?;
        stores.clients.create_client(&client("acme", Some(hash))).await?;
        stores.clients.create_client(&client("spa", None)).await?;
        let service = OidcService::new(&stores, tokens.clone(), audit);
        Ok(Fixture {
            service,
            stores,
            tokens,
            user,
        })
    }

    fn request(client_id: &str, scope: &str) -> AuthorizeRequest {
        AuthorizeRequest {
            client_id: client_id.to_string(),
            scope: scope.to_string(),
            nonce: "n-0S6".to_string(),
            ..AuthorizeRequest::default()
        }
    }

    fn redeem(code: &str, secret: &str) -> TokenRequest {
        TokenRequest {
            grant_type: GRANT_TYPE_AUTHORIZATION_CODE.to_string(),
            code: code.to_string(),
            client_id: Some("acme".to_string()),
            client_secret: Some(SecretString::from(secret.to_string())),
            code_verifier: None,
        }
    }

    fn payload(token: &str) -> Result<Value> {
        let part = token.split('.').nth(1).unwrap_or_default();
        let bytes = Base64UrlUnpadded::decode_vec(part).map_err(|_| anyhow::anyhow!("base64"))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn consent_must_match_scope_exactly() -> Result<()> {
        let f = fixture().await?;
        let result = f
            .service
            .authorize(&request("acme", "openid profile"), f.user.id, &origin())
            .await;
        assert!(matches!(result, Err(AppError::OidcMissingAuthorization)));

        f.service
            .authorize_new_client(&request("acme", "openid profile"), f.user.id, &origin())
            .await?;
        let granted = f
            .service
            .authorize(&request("acme", "openid profile"), f.user.id, &origin())
            .await?;
        assert_eq!(granted.callback_url, CALLBACK);
        assert_eq!(granted.code.len(), codes::AUTHORIZATION_CODE_LENGTH);

        for scope in ["openid", "openid profile email"] {
            let result = f
                .service
                .authorize(&request("acme", scope), f.user.id, &origin())
                .await;
            assert!(matches!(result, Err(AppError::OidcMissingAuthorization)), "{scope}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn code_redeems_exactly_once() -> Result<()> {
        let f = fixture().await?;
        let granted = f
            .service
            .authorize_new_client(&request("acme", "openid profile"), f.user.id, &origin())
            .await?;

        let tokens = f.service.create_tokens(redeem(&granted.code, SECRET)).await?;
        let id_token = payload(&tokens.id_token)?;
        assert_eq!(id_token["aud"], "acme");
        assert_eq!(id_token["nonce"], "n-0S6");
        assert_eq!(id_token["given_name"], "Tim");
        assert!(id_token.get("email").is_none());
        let access = f.tokens.verify_oauth_access_token(&tokens.access_token)?;
        assert_eq!(access.aud.first(), Some("acme"));

        let replay = f.service.create_tokens(redeem(&granted.code, SECRET)).await;
        assert!(matches!(replay, Err(AppError::OidcInvalidAuthorizationCode)));
        Ok(())
    }

    #[tokio::test]
    async fn token_request_errors_are_specific() -> Result<()> {
        let f = fixture().await?;
        let granted = f
            .service
            .authorize_new_client(&request("acme", "openid"), f.user.id, &origin())
            .await?;

        let mut wrong_grant = redeem(&granted.code, SECRET);
        wrong_grant.grant_type = "password".to_string();
        assert!(matches!(
            f.service.create_tokens(wrong_grant).await,
            Err(AppError::OidcUnsupportedGrantType)
        ));

        let mut no_secret = redeem(&granted.code, SECRET);
        no_secret.client_secret = None;
        assert!(matches!(
            f.service.create_tokens(no_secret).await,
            Err(AppError::OidcMissingClientCredentials)
        ));

        assert!(matches!(
            f.service.create_tokens(redeem(&granted.code, "wrong")).await,
            Err(AppError::OidcInvalidClientSecret)
        ));

        assert!(matches!(
            f.service.create_tokens(redeem("not-a-code", SECRET)).await,
            Err(AppError::OidcInvalidAuthorizationCode)
        ));

        // Failed credential checks leave the code redeemable.
        f.service.create_tokens(redeem(&granted.code, SECRET)).await?;
        Ok(())
    }

    #[tokio::test]
    async fn expired_or_foreign_codes_are_rejected() -> Result<()> {
        let f = fixture().await?;
        let granted = f
            .service
            .authorize_new_client(&request("acme", "openid"), f.user.id, &origin())
            .await?;
        let later = Utc::now() + Duration::minutes(codes::AUTHORIZATION_CODE_LIFETIME_MINUTES + 1);
        assert!(matches!(
            f.service.create_tokens_at(redeem(&granted.code, SECRET), later).await,
            Err(AppError::OidcInvalidAuthorizationCode)
        ));

        let hash = bcrypt::hash("other-secret", 4)?;
        f.stores.clients.create_client(&client("other", Some(hash))).await?;
        let granted = f
            .service
            .authorize_new_client(&request("acme", "openid"), f.user.id, &origin())
            .await?;
        let mut foreign = redeem(&granted.code, "other-secret");
        foreign.client_id = Some("other".to_string());
        assert!(matches!(
            f.service.create_tokens(foreign).await,
            Err(AppError::OidcInvalidAuthorizationCode)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn public_clients_use_pkce() -> Result<()> {
        let f = fixture().await?;
        let missing = f
            .service
            .authorize_new_client(&request("spa", "openid"), f.user.id, &origin())
            .await;
        assert!(matches!(missing, Err(AppError::OidcMissingCodeChallenge)));

        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let mut with_challenge = request("spa", "openid");
        with_challenge.code_challenge = Some(pkce::s256_challenge(verifier));
        with_challenge.code_challenge_method = Some("S256".to_string());

        let granted = f
            .service
            .authorize_new_client(&with_challenge, f.user.id, &origin())
            .await?;
        let mut wrong = TokenRequest {
            grant_type: GRANT_TYPE_AUTHORIZATION_CODE.to_string(),
            code: granted.code,
            client_id: Some("spa".to_string()),
            client_secret: None,
            code_verifier: Some("wrong-verifier".to_string()),
        };
        assert!(matches!(
            f.service.create_tokens(wrong.clone()).await,
            Err(AppError::OidcInvalidCodeVerifier)
        ));

        let granted = f
            .service
            .authorize_new_client(&with_challenge, f.user.id, &origin())
            .await?;
        wrong.code = granted.code;
        wrong.code_verifier = Some(verifier.to_string());
        f.service.create_tokens(wrong).await?;
        Ok(())
    }

    #[tokio::test]
    async fn callback_url_must_be_registered() -> Result<()> {
        let f = fixture().await?;
        let mut req = request("acme", "openid");
        req.callback_url = "https://evil.example.com/callback".to_string();
        let result = f.service.authorize_new_client(&req, f.user.id, &origin()).await;
        assert!(matches!(result, Err(AppError::OidcInvalidCallbackUrl)));
        Ok(())
    }

    #[tokio::test]
    async fn group_restricted_clients() -> Result<()> {
        let f = fixture().await?;
        let mut restricted = client("internal", Some(bcrypt::hash(SECRET, 4)?));
        restricted.allowed_group_ids = vec![Uuid::new_v4()];
        f.stores.clients.create_client(&restricted).await?;
        let result = f
            .service
            .authorize_new_client(&request("internal", "openid"), f.user.id, &origin())
            .await;
        assert!(matches!(result, Err(AppError::MissingAccessToUser)));

        let mut allowed = client("team", Some(bcrypt::hash(SECRET, 4)?));
        allowed.allowed_group_ids = vec![f.user.groups[0].id];
        f.stores.clients.create_client(&allowed).await?;
        f.service
            .authorize_new_client(&request("team", "openid"), f.user.id, &origin())
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn userinfo_follows_consent_scope() -> Result<()> {
        let f = fixture().await?;
        let granted = f
            .service
            .authorize_new_client(&request("acme", "openid email"), f.user.id, &origin())
            .await?;
        let tokens = f.service.create_tokens(redeem(&granted.code, SECRET)).await?;

        let claims = f.service.userinfo(&tokens.access_token).await?;
        assert_eq!(claims["sub"], f.user.id.to_string());
        assert_eq!(claims["email"], "tim.cook@test.com");
        assert!(!claims.contains_key("given_name"));
        Ok(())
    }

    #[tokio::test]
    async fn rotated_secret_replaces_the_old_one() -> Result<()> {
        let f = fixture().await?;
        let secret = f.service.create_client_secret("acme").await?;
        assert_eq!(secret.len(), codes::CLIENT_SECRET_LENGTH);

        let granted = f
            .service
            .authorize_new_client(&request("acme", "openid"), f.user.id, &origin())
            .await?;
        assert!(matches!(
            f.service.create_tokens(redeem(&granted.code, SECRET)).await,
            Err(AppError::OidcInvalidClientSecret)
        ));
        f.service.create_tokens(redeem(&granted.code, &secret)).await?;

        assert!(matches!(
            f.service.create_client_secret("missing").await,
            Err(AppError::ResourceNotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn end_session_only_redirects_to_registered_urls() -> Result<()> {
        let f = fixture().await?;
        let hint = f.tokens.issue_id_token(&f.user, "acme", "openid", "")?;
        assert_eq!(
            f.service
                .end_session_redirect(Some(&hint), None, Some(CALLBACK))
                .await
                .as_deref(),
            Some(CALLBACK)
        );
        assert_eq!(
            f.service
                .end_session_redirect(None, Some("acme"), Some("https://evil.example.com"))
                .await,
            None
        );
        assert_eq!(f.service.end_session_redirect(None, None, Some(CALLBACK)).await, None);
        Ok(())
    }
}
