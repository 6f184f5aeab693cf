//! Public discovery endpoints.

use crate::api::state::AppState;
use crate::token::jwks::Jwks;
use axum::{extract::Extension, Json};
use serde::Serialize;
use utoipa::ToSchema;

#[utoipa::path(
    get,
    path = "/.well-known/jwks.json",
    responses(
        (status = 200, description = "Public signing keys", body = Jwks),
    ),
    tag = "oidc"
)]
pub async fn jwks(Extension(state): Extension<AppState>) -> Json<Jwks> {
    Json(state.tokens.jwks())
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OpenIdConfiguration {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub end_session_endpoint: String,
    pub jwks_uri: String,
    pub scopes_supported: Vec<String>,
    pub claims_supported: Vec<String>,
    pub response_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/.well-known/openid-configuration",
    responses(
        (status = 200, description = "OpenID provider metadata", body = OpenIdConfiguration),
    ),
    tag = "oidc"
)]
pub async fn openid_configuration(
    Extension(state): Extension<AppState>,
) -> Json<OpenIdConfiguration> {
    Json(OpenIdConfiguration {
        issuer: state.tokens.issuer().to_string(),
        authorization_endpoint: state.url("/authorize"),
        token_endpoint: state.url("/oidc/token"),
        userinfo_endpoint: state.url("/oidc/userinfo"),
        end_session_endpoint: state.url("/oidc/end-session"),
        jwks_uri: state.url("/.well-known/jwks.json"),
        scopes_supported: strings(&["openid", "profile", "email", "groups"]),
        claims_supported: strings(&[
            "sub",
            "given_name",
            "family_name",
            "name",
            "email",
            "email_verified",
            "preferred_username",
            "groups",
        ]),
        response_types_supported: strings(&["code", "id_token"]),
        subject_types_supported: strings(&["public"]),
        grant_types_supported: strings(&["authorization_code"]),
        id_token_signing_alg_values_supported: strings(&["RS256"]),
        code_challenge_methods_supported: strings(&["plain", "S256"]),
    })
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}
