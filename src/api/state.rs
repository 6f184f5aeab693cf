//! Services shared by every handler, built once at startup.

use super::cookies::CookieNames;
use crate::audit::{email::EmailQueue, geo::GeoLookup, AuditLogger};
use crate::keys::KeyManager;
use crate::oidc::OidcService;
use crate::one_time::OneTimeTokenService;
use crate::rate_limit::RateLimiter;
use crate::settings::AppSettings;
use crate::store::Stores;
use crate::token::TokenService;
use crate::webauthn::{verifier::PasskeyVerifier, WebauthnService};
use anyhow::Result;
use std::sync::Arc;
use url::Url;

/// Everything [`AppState::new`] wires together.
pub struct StateParts {
    pub stores: Stores,
    pub keys: Arc<KeyManager>,
    pub settings: Arc<AppSettings>,
    pub app_url: Url,
    pub verifier: Arc<dyn PasskeyVerifier>,
    pub geo: Arc<dyn GeoLookup>,
    pub emails: Option<EmailQueue>,
    pub rate_limiter: Arc<RateLimiter>,
}

#[derive(Clone)]
pub struct AppState {
    pub app_url: Url,
    pub tokens: Arc<TokenService>,
    pub webauthn: WebauthnService,
    pub oidc: OidcService,
    pub one_time: OneTimeTokenService,
    pub rate_limiter: Arc<RateLimiter>,
    pub settings: Arc<AppSettings>,
    pub cookies: CookieNames,
}

impl AppState {
    /// # Errors
    /// Returns error if the application URL has no host.
    pub fn new(parts: StateParts) -> Result<Self> {
        let tokens = Arc::new(TokenService::new(
            parts.keys,
            parts.settings.clone(),
            &parts.app_url,
        )?);
        let mut audit = AuditLogger::new(
            parts.stores.audit_logs.clone(),
            parts.stores.users.clone(),
            parts.geo,
            parts.settings.clone(),
        );
        if let Some(emails) = parts.emails {
            audit = audit.with_email_queue(emails);
        }

        Ok(Self {
            cookies: CookieNames::for_url(&parts.app_url),
            webauthn: WebauthnService::new(
                parts.verifier,
                &parts.stores,
                tokens.clone(),
                audit.clone(),
            ),
            oidc: OidcService::new(&parts.stores, tokens.clone(), audit.clone()),
            one_time: OneTimeTokenService::new(&parts.stores, tokens.clone(), audit),
            app_url: parts.app_url,
            tokens,
            rate_limiter: parts.rate_limiter,
            settings: parts.settings,
        })
    }

    /// Application URL without a trailing slash, joined with `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.tokens.issuer())
    }
}
