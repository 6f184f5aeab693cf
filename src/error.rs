//! Boundary error type.
//!
//! Domain services return their own `thiserror` enums; everything that
//! crosses into the HTTP layer is folded into [`AppError`], which owns the
//! mapping to a fixed status code and a single-sentence message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("you are not signed in")]
    AuthenticationMissing,
    #[error("you don't have permission to perform this action")]
    PermissionDenied,
    #[error("token is invalid or expired")]
    TokenInvalidOrExpired,
    #[error("token is invalid")]
    InvalidToken,
    #[error("missing authorization")]
    OidcMissingAuthorization,
    #[error("grant type not supported")]
    OidcUnsupportedGrantType,
    #[error("client id or secret not provided")]
    OidcMissingClientCredentials,
    #[error("invalid client secret")]
    OidcInvalidClientSecret,
    #[error("invalid authorization code")]
    OidcInvalidAuthorizationCode,
    #[error("invalid callback URL")]
    OidcInvalidCallbackUrl,
    #[error("code challenge is required for public clients")]
    OidcMissingCodeChallenge,
    #[error("invalid code verifier")]
    OidcInvalidCodeVerifier,
    #[error("you are not allowed to access this service")]
    MissingAccessToUser,
    #[error("missing session id")]
    MissingSessionId,
    #[error("no user found with provided credentials")]
    InvalidCredentials,
    #[error("ceremony session not found")]
    CeremonyNotFound,
    #[error("ceremony session has expired")]
    CeremonyExpired,
    #[error("passkey verification failed")]
    PasskeyVerificationFailed,
    #[error("{0} not found")]
    ResourceNotFound(&'static str),
    #[error("{0} is already in use")]
    AlreadyInUse(&'static str),
    #[error("you must keep at least one passkey")]
    LastCredential,
    #[error("passkey name must not be empty")]
    EmptyCredentialName,
    #[error("setup already completed")]
    SetupAlreadyCompleted,
    #[error("too many requests, please wait a while before trying again")]
    TooManyRequests,
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthenticationMissing | Self::InvalidToken | Self::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            Self::PermissionDenied | Self::OidcMissingAuthorization | Self::MissingAccessToUser => {
                StatusCode::FORBIDDEN
            }
            Self::TokenInvalidOrExpired
            | Self::OidcUnsupportedGrantType
            | Self::OidcMissingClientCredentials
            | Self::OidcInvalidClientSecret
            | Self::OidcInvalidAuthorizationCode
            | Self::OidcInvalidCallbackUrl
            | Self::OidcMissingCodeChallenge
            | Self::OidcInvalidCodeVerifier
            | Self::MissingSessionId
            | Self::CeremonyNotFound
            | Self::CeremonyExpired
            | Self::PasskeyVerificationFailed
            | Self::AlreadyInUse(_)
            | Self::LastCredential
            | Self::EmptyCredentialName
            | Self::SetupAlreadyCompleted => StatusCode::BAD_REQUEST,
            Self::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human readable message, first letter capitalized.
    #[must_use]
    pub fn message(&self) -> String {
        if matches!(self, Self::Internal(_)) {
            return "Something went wrong".to_string();
        }
        capitalize(&self.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("Unhandled error: {err:#}");
        }
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(
            AppError::AuthenticationMissing.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::PermissionDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::TokenInvalidOrExpired.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::OidcMissingAuthorization.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::OidcInvalidAuthorizationCode.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::ResourceNotFound("client").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::TooManyRequests.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::SetupAlreadyCompleted.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn messages_are_capitalized() {
        assert_eq!(
            AppError::OidcInvalidClientSecret.message(),
            "Invalid client secret"
        );
        assert_eq!(
            AppError::AlreadyInUse("email").message(),
            "Email is already in use"
        );
        assert_eq!(
            AppError::SetupAlreadyCompleted.message(),
            "Setup already completed"
        );
    }

    #[test]
    fn internal_errors_do_not_leak() {
        let err = AppError::from(anyhow::anyhow!("connection refused on 10.0.0.4"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Something went wrong");
    }
}
