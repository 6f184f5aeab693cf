//! Request extractors: the signed-in user and the calling client.

use super::{cookies, state::AppState};
use crate::error::AppError;
use crate::rate_limit::{RateLimitDecision, RateLimitPolicy};
use anyhow::anyhow;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{
        header::{AUTHORIZATION, USER_AGENT},
        request::Parts,
        HeaderMap,
    },
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use uuid::Uuid;

/// Bearer token from the `Authorization` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// First `X-Forwarded-For` entry; the proxy in front is trusted.
#[must_use]
pub fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .and_then(|value| value.parse().ok())
}

fn app_state(parts: &Parts) -> Result<&AppState, AppError> {
    parts
        .extensions
        .get::<AppState>()
        .ok_or_else(|| AppError::Internal(anyhow!("application state not installed")))
}

/// User behind the session access token (cookie or bearer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub is_admin: bool,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = app_state(parts)?;
        let token = cookies::read(&parts.headers, state.cookies.access_token)
            .or_else(|| bearer_token(&parts.headers))
            .ok_or(AppError::AuthenticationMissing)?;
        let claims = state
            .tokens
            .verify_access_token(&token)
            .map_err(|_| AppError::AuthenticationMissing)?;
        let id = claims
            .sub
            .parse()
            .map_err(|_| AppError::AuthenticationMissing)?;
        Ok(Self {
            id,
            is_admin: claims.is_admin,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::PermissionDenied);
        }
        Ok(Self(user))
    }
}

/// Caller address and user agent, for audit entries and rate limiting.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<IpAddr>,
    pub user_agent: String,
}

impl ClientInfo {
    #[must_use]
    pub fn ip_address(&self) -> String {
        self.ip.map(|ip| ip.to_canonical().to_string()).unwrap_or_default()
    }

    #[must_use]
    pub fn origin(&self) -> crate::oidc::RequestOrigin {
        crate::oidc::RequestOrigin {
            ip_address: self.ip_address(),
            user_agent: self.user_agent.clone(),
        }
    }

    /// # Errors
    /// Returns `TooManyRequests` when the caller's bucket is empty.
    pub fn enforce(&self, state: &AppState, policy: RateLimitPolicy) -> Result<(), AppError> {
        let decision = match self.ip {
            Some(ip) => state.rate_limiter.check_ip(ip, policy),
            None => state.rate_limiter.check("unknown", policy),
        };
        match decision {
            RateLimitDecision::Allowed => Ok(()),
            RateLimitDecision::Limited => Err(AppError::TooManyRequests),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = forwarded_ip(&parts.headers).or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        });
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Ok(Self { ip, user_agent })
    }
}
