#![allow(dead_code)]

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, Response},
    Router,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{Duration as ChronoDuration, Utc};
use portero::{
    api::{self, AppState, StateParts},
    audit::geo::NoopGeoLookup,
    keys::KeyManager,
    rate_limit::RateLimiter,
    settings::{AppSettings, SettingsValues},
    store::{Client, Credential, CustomClaims, Stores, User},
    webauthn::verifier::{Challenge, PasskeyError, PasskeyVerifier, RegisteredPasskey},
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;

pub const APP_URL: &str = "http://localhost:8080";
pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");

/// Authenticator stand-in: the browser response is accepted when it echoes
/// the challenge, and `id` doubles as credential id and public key.
pub struct EchoVerifier;

fn echo(challenge: String) -> Challenge {
    Challenge {
        options: json!({ "publicKey": { "challenge": challenge } }),
        state: json!({ "challenge": challenge }),
        challenge,
        user_verification: "required".to_string(),
    }
}

fn echoes(response: &Value, state: &Value) -> Result<(), PasskeyError> {
    if response["challenge"] == state["challenge"] {
        Ok(())
    } else {
        Err(PasskeyError::Rejected("challenge mismatch".to_string()))
    }
}

impl PasskeyVerifier for EchoVerifier {
    fn start_registration(
        &self,
        _user: &User,
        _existing: &[Credential],
        _timeout: Duration,
    ) -> Result<Challenge, PasskeyError> {
        Ok(echo(Uuid::new_v4().simple().to_string()))
    }

    fn finish_registration(
        &self,
        response: &Value,
        state: &Value,
    ) -> Result<RegisteredPasskey, PasskeyError> {
        echoes(response, state)?;
        let id = response["id"].as_str().unwrap_or_default().as_bytes().to_vec();
        Ok(RegisteredPasskey {
            credential_id: id.clone(),
            public_key: id,
            attestation_type: "none".to_string(),
            transports: vec!["internal".to_string()],
            backup_eligible: false,
            backup_state: false,
        })
    }

    fn start_login(&self, _timeout: Duration) -> Result<Challenge, PasskeyError> {
        Ok(echo(Uuid::new_v4().simple().to_string()))
    }

    fn identify_user(&self, assertion: &Value) -> Result<Uuid, PasskeyError> {
        assertion["userHandle"]
            .as_str()
            .and_then(|handle| handle.parse().ok())
            .ok_or_else(|| PasskeyError::Rejected("no user handle".to_string()))
    }

    fn finish_login(
        &self,
        assertion: &Value,
        state: &Value,
        credentials: &[Credential],
    ) -> Result<Vec<u8>, PasskeyError> {
        echoes(assertion, state)?;
        let id = assertion["id"].as_str().unwrap_or_default().as_bytes();
        credentials
            .iter()
            .find(|credential| credential.credential_id == id)
            .map(|credential| credential.credential_id.clone())
            .ok_or_else(|| PasskeyError::Rejected("unknown credential".to_string()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub stores: Stores,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        Self::with_rate_limiter(RateLimiter::disabled())
    }

    pub fn with_rate_limiter(rate_limiter: RateLimiter) -> Result<Self> {
        let stores = Stores::in_memory();
        let state = AppState::new(StateParts {
            stores: stores.clone(),
            keys: Arc::new(KeyManager::from_pem(SIGNING_KEY_PEM)?),
            settings: Arc::new(AppSettings::new(SettingsValues::default())),
            app_url: Url::parse(APP_URL)?,
            verifier: Arc::new(EchoVerifier),
            geo: Arc::new(NoopGeoLookup),
            emails: None,
            rate_limiter: Arc::new(rate_limiter),
        })?;
        Ok(Self {
            router: api::router(state.clone()),
            state,
            stores,
        })
    }

    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        Ok(self.router.clone().oneshot(request).await?)
    }

    pub async fn seed_user(&self, username: &str, is_admin: bool) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            first_name: "Tim".to_string(),
            last_name: "Cook".to_string(),
            is_admin,
            groups: vec![],
            custom_claims: CustomClaims::new(),
        };
        self.stores.users.create_user(&user).await?;
        Ok(user)
    }

    /// Register a client; `secret_hash` of `None` makes it public.
    pub async fn seed_client(&self, id: &str, secret_hash: Option<String>) -> Result<Client> {
        let client = Client {
            id: id.to_string(),
            secret_hash,
            name: format!("{id} app"),
            callback_urls: vec![format!("https://{id}.example.com/callback")],
            allowed_group_ids: vec![],
            created_by: None,
        };
        self.stores.clients.create_client(&client).await?;
        Ok(client)
    }

    /// Sign `user` in through a one-time access token and return the cookie pair.
    pub async fn sign_in(&self, user: &User) -> Result<String> {
        let token = self
            .state
            .one_time
            .create(user.id, Utc::now() + ChronoDuration::minutes(5))
            .await?;
        let response = self
            .send(post_empty(&format!("/one-time-access-token/{token}"))?)
            .await?;
        anyhow::ensure!(
            response.status().is_success(),
            "one-time sign-in failed: {}",
            response.status()
        );
        cookie_pair(response.headers(), self.state.cookies.access_token)
            .context("no access token cookie")
    }
}

pub fn post_empty(uri: &str) -> Result<Request<Body>> {
    Ok(Request::post(uri).body(Body::empty())?)
}

pub fn post_json(uri: &str, cookie: Option<&str>, body: &Value) -> Result<Request<Body>> {
    let mut request = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    Ok(request.body(Body::from(serde_json::to_vec(body)?))?)
}

pub fn get(uri: &str, cookie: Option<&str>) -> Result<Request<Body>> {
    let mut request = Request::get(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    Ok(request.body(Body::empty())?)
}

pub fn post_form(uri: &str, form: &str, basic: Option<&str>) -> Result<Request<Body>> {
    let mut request =
        Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(credentials) = basic {
        request = request.header(
            header::AUTHORIZATION,
            format!("Basic {}", base64ct::Base64::encode_string(credentials.as_bytes())),
        );
    }
    Ok(request.body(Body::from(form.to_string()))?)
}

pub async fn json_body(response: Response<Body>) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `name=value` from the `Set-Cookie` headers, ready to send back.
pub fn cookie_pair(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| pair.split_once('=').is_some_and(|(key, _)| key == name))
        .map(str::to_string)
}

/// Payload of a compact JWS, without verifying it.
pub fn jwt_claims(token: &str) -> Result<Value> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| anyhow!("not a compact JWS"))?;
    let bytes = Base64UrlUnpadded::decode_vec(payload).map_err(|e| anyhow!("{e}"))?;
    Ok(serde_json::from_slice(&bytes)?)
}
