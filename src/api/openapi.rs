#![allow(clippy::needless_for_each)]

use super::handlers::{health, oidc, one_time, webauthn, well_known, UserResponse};
use crate::token::jwks::{Jwk, Jwks};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        well_known::jwks,
        well_known::openid_configuration,
        webauthn::register_start,
        webauthn::register_finish,
        webauthn::login_start,
        webauthn::login_finish,
        webauthn::logout,
        webauthn::list_credentials,
        webauthn::update_credential,
        webauthn::delete_credential,
        oidc::authorize,
        oidc::authorize_new_client,
        oidc::token,
        oidc::userinfo,
        oidc::end_session,
        oidc::create_client_secret,
        one_time::create,
        one_time::exchange,
        one_time::setup,
    ),
    components(schemas(
        health::Health,
        UserResponse,
        Jwk,
        Jwks,
        well_known::OpenIdConfiguration,
        webauthn::CredentialResponse,
        webauthn::UpdateCredentialRequest,
        oidc::AuthorizeBody,
        oidc::AuthorizeResponseBody,
        oidc::TokenForm,
        oidc::TokenResponseBody,
        oidc::ClientSecretResponse,
        one_time::CreateOneTimeTokenRequest,
        one_time::OneTimeTokenResponse,
    )),
    tags(
        (name = "health", description = "Service health"),
        (
            name = "webauthn",
            description = "Passkey registration, sign-in and credential management"
        ),
        (name = "oidc", description = "OpenID Connect provider"),
        (name = "one-time-access-token", description = "Single-use sign-in links"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
