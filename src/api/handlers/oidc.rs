//! OpenID Connect endpoints.

use crate::api::{
    request::{bearer_token, AdminUser, ClientInfo, CurrentUser},
    state::AppState,
};
use crate::error::AppError;
use crate::oidc::{AuthorizeRequest, TokenRequest};
use crate::rate_limit::RateLimitPolicy;
use axum::{
    extract::{Extension, Path, Query},
    http::{
        header::{AUTHORIZATION, CACHE_CONTROL, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use base64ct::{Base64, Encoding};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeBody {
    pub client_id: String,
    pub scope: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default, rename = "callbackURL")]
    pub callback_url: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

impl From<AuthorizeBody> for AuthorizeRequest {
    fn from(body: AuthorizeBody) -> Self {
        Self {
            client_id: body.client_id,
            scope: body.scope,
            nonce: body.nonce,
            callback_url: body.callback_url,
            code_challenge: body.code_challenge,
            code_challenge_method: body.code_challenge_method,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorizeResponseBody {
    pub code: String,
    #[serde(rename = "callbackURL")]
    pub callback_url: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TokenForm {
    #[serde(default)]
    pub grant_type: String,
    #[serde(default)]
    pub code: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code_verifier: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponseBody {
    pub id_token: String,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EndSessionQuery {
    pub id_token_hint: Option<String>,
    pub client_id: Option<String>,
    pub post_logout_redirect_uri: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientSecretResponse {
    pub secret: String,
}

/// `client_id:client_secret` from HTTP Basic credentials.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = String::from_utf8(Base64::decode_vec(encoded.trim()).ok()?).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

fn token_request(form: TokenForm, headers: &HeaderMap) -> TokenRequest {
    let filled = |value: Option<String>| value.filter(|value| !value.is_empty());
    let (mut client_id, mut client_secret) = (filled(form.client_id), filled(form.client_secret));
    if client_id.is_none() || client_secret.is_none() {
        if let Some((basic_id, basic_secret)) = basic_credentials(headers) {
            client_id = client_id.or(Some(basic_id));
            client_secret = client_secret.or(Some(basic_secret));
        }
    }
    TokenRequest {
        grant_type: form.grant_type,
        code: form.code,
        client_id,
        client_secret: client_secret.map(SecretString::from),
        code_verifier: filled(form.code_verifier),
    }
}

#[utoipa::path(
    post,
    path = "/oidc/authorize",
    request_body = AuthorizeBody,
    responses(
        (status = 200, description = "Authorization code issued", body = AuthorizeResponseBody),
        (status = 403, description = "No matching consent, or user not allowed"),
    ),
    tag = "oidc"
)]
pub async fn authorize(
    Extension(state): Extension<AppState>,
    user: CurrentUser,
    client: ClientInfo,
    Json(body): Json<AuthorizeBody>,
) -> Result<Json<AuthorizeResponseBody>, AppError> {
    let granted = state
        .oidc
        .authorize(&body.into(), user.id, &client.origin())
        .await?;
    Ok(Json(AuthorizeResponseBody {
        code: granted.code,
        callback_url: granted.callback_url,
    }))
}

#[utoipa::path(
    post,
    path = "/oidc/authorize/new-client",
    request_body = AuthorizeBody,
    responses(
        (
            status = 200,
            description = "Consent recorded and code issued",
            body = AuthorizeResponseBody
        ),
        (status = 400, description = "Invalid callback URL or missing code challenge"),
    ),
    tag = "oidc"
)]
pub async fn authorize_new_client(
    Extension(state): Extension<AppState>,
    user: CurrentUser,
    client: ClientInfo,
    Json(body): Json<AuthorizeBody>,
) -> Result<Json<AuthorizeResponseBody>, AppError> {
    let granted = state
        .oidc
        .authorize_new_client(&body.into(), user.id, &client.origin())
        .await?;
    Ok(Json(AuthorizeResponseBody {
        code: granted.code,
        callback_url: granted.callback_url,
    }))
}

#[utoipa::path(
    post,
    path = "/oidc/token",
    request_body(content = TokenForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "ID token and access token", body = TokenResponseBody),
        (status = 400, description = "Invalid grant, client credentials or code"),
        (status = 429, description = "Rate limited"),
    ),
    tag = "oidc"
)]
pub async fn token(
    Extension(state): Extension<AppState>,
    client: ClientInfo,
    headers: HeaderMap,
    Form(form): Form<TokenForm>,
) -> Result<impl IntoResponse, AppError> {
    client.enforce(&state, RateLimitPolicy::TOKEN)?;
    let tokens = state.oidc.create_tokens(token_request(form, &headers)).await?;
    Ok((
        [(CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(TokenResponseBody {
            id_token: tokens.id_token,
            access_token: tokens.access_token,
            token_type: "Bearer".to_string(),
            expires_in: tokens.expires_in,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/oidc/userinfo",
    responses(
        (status = 200, description = "Claims released to the client"),
        (status = 401, description = "Missing or invalid access token"),
    ),
    tag = "oidc"
)]
pub async fn userinfo(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<Json<Map<String, Value>>, AppError> {
    let token = bearer_token(&headers).ok_or(AppError::AuthenticationMissing)?;
    Ok(Json(state.oidc.userinfo(&token).await?))
}

#[utoipa::path(
    get,
    path = "/oidc/end-session",
    params(EndSessionQuery),
    responses(
        (status = 303, description = "Redirect to the registered post-logout URI"),
        (status = 204, description = "Signed out"),
    ),
    tag = "oidc"
)]
pub async fn end_session(
    Extension(state): Extension<AppState>,
    Query(query): Query<EndSessionQuery>,
) -> Response {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = state.cookies.clear(state.cookies.access_token) {
        headers.insert(SET_COOKIE, cookie);
    }
    let redirect = state
        .oidc
        .end_session_redirect(
            query.id_token_hint.as_deref(),
            query.client_id.as_deref(),
            query.post_logout_redirect_uri.as_deref(),
        )
        .await;
    match redirect {
        Some(uri) => (headers, Redirect::to(&uri)).into_response(),
        None => (StatusCode::NO_CONTENT, headers).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/oidc/clients/{id}/secret",
    params(("id" = String, Path, description = "Client id")),
    responses(
        (status = 200, description = "New client secret, shown once", body = ClientSecretResponse),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "No such client"),
    ),
    tag = "oidc"
)]
pub async fn create_client_secret(
    Extension(state): Extension<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<ClientSecretResponse>, AppError> {
    let secret = state.oidc.create_client_secret(&id).await?;
    Ok(Json(ClientSecretResponse { secret }))
}
