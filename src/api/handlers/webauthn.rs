//! Passkey ceremonies and credential self-service.

use super::{access_token_cookie, UserResponse};
use crate::api::{
    cookies,
    request::{ClientInfo, CurrentUser},
    state::AppState,
};
use crate::error::AppError;
use crate::rate_limit::RateLimitPolicy;
use crate::store::Credential;
use crate::webauthn::CeremonyStart;
use axum::{
    extract::{Extension, Path},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialResponse {
    pub id: Uuid,
    pub name: String,
    /// base64url, unpadded
    pub credential_id: String,
    pub transports: Vec<String>,
    pub backup_eligible: bool,
    pub backup_state: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Credential> for CredentialResponse {
    fn from(credential: &Credential) -> Self {
        Self {
            id: credential.id,
            name: credential.name.clone(),
            credential_id: Base64UrlUnpadded::encode_string(&credential.credential_id),
            transports: credential.transports.clone(),
            backup_eligible: credential.backup_eligible,
            backup_state: credential.backup_state,
            created_at: credential.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCredentialRequest {
    pub name: String,
}

/// Browser options plus the session cookie pointing at the parked ceremony.
fn ceremony_response(state: &AppState, start: CeremonyStart) -> Response {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = state.cookies.build(
        state.cookies.session,
        &start.session_id.to_string(),
        start.timeout.as_secs(),
    ) {
        headers.insert(SET_COOKIE, cookie);
    }
    (headers, Json(start.options)).into_response()
}

fn session_id(state: &AppState, headers: &HeaderMap) -> Result<Uuid, AppError> {
    cookies::read(headers, state.cookies.session)
        .and_then(|value| value.parse().ok())
        .ok_or(AppError::MissingSessionId)
}

fn clear_session(state: &AppState, headers: &mut HeaderMap) {
    if let Some(cookie) = state.cookies.clear(state.cookies.session) {
        headers.append(SET_COOKIE, cookie);
    }
}

#[utoipa::path(
    post,
    path = "/webauthn/register/start",
    responses(
        (
            status = 200,
            description = "Credential creation options; sets the ceremony session cookie"
        ),
        (status = 401, description = "Not signed in"),
    ),
    tag = "webauthn"
)]
pub async fn register_start(
    Extension(state): Extension<AppState>,
    user: CurrentUser,
) -> Result<Response, AppError> {
    let start = state.webauthn.begin_registration(user.id).await?;
    Ok(ceremony_response(&state, start))
}

#[utoipa::path(
    post,
    path = "/webauthn/register/finish",
    responses(
        (status = 200, description = "Passkey stored", body = CredentialResponse),
        (status = 400, description = "Missing, expired or failed ceremony"),
        (status = 401, description = "Not signed in"),
    ),
    tag = "webauthn"
)]
pub async fn register_finish(
    Extension(state): Extension<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Json(response): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = session_id(&state, &headers)?;
    let credential = state
        .webauthn
        .finish_registration(session_id, user.id, &response)
        .await?;

    let mut response_headers = HeaderMap::new();
    clear_session(&state, &mut response_headers);
    Ok((response_headers, Json(CredentialResponse::from(&credential))))
}

#[utoipa::path(
    get,
    path = "/webauthn/login/start",
    responses(
        (
            status = 200,
            description = "Credential request options; sets the ceremony session cookie"
        ),
    ),
    tag = "webauthn"
)]
pub async fn login_start(Extension(state): Extension<AppState>) -> Result<Response, AppError> {
    let start = state.webauthn.begin_login().await?;
    Ok(ceremony_response(&state, start))
}

#[utoipa::path(
    post,
    path = "/webauthn/login/finish",
    responses(
        (
            status = 200,
            description = "Signed in; sets the access token cookie",
            body = UserResponse
        ),
        (status = 400, description = "Missing or expired ceremony"),
        (status = 401, description = "Passkey not recognized"),
        (status = 429, description = "Rate limited"),
    ),
    tag = "webauthn"
)]
pub async fn login_finish(
    Extension(state): Extension<AppState>,
    client: ClientInfo,
    headers: HeaderMap,
    Json(assertion): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    client.enforce(&state, RateLimitPolicy::LOGIN_FINISH)?;
    let session_id = session_id(&state, &headers)?;
    let signed_in = state
        .webauthn
        .finish_login(session_id, &assertion, &client.ip_address(), &client.user_agent)
        .await?;

    let mut response_headers = HeaderMap::new();
    clear_session(&state, &mut response_headers);
    access_token_cookie(&state, &signed_in, &mut response_headers);
    Ok((response_headers, Json(UserResponse::from(&signed_in.user))))
}

#[utoipa::path(
    post,
    path = "/webauthn/logout",
    responses(
        (status = 204, description = "Access token cookie cleared"),
    ),
    tag = "webauthn"
)]
pub async fn logout(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = state.cookies.clear(state.cookies.access_token) {
        headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, headers)
}

#[utoipa::path(
    get,
    path = "/webauthn/credentials",
    responses(
        (status = 200, description = "Passkeys of the current user", body = [CredentialResponse]),
        (status = 401, description = "Not signed in"),
    ),
    tag = "webauthn"
)]
pub async fn list_credentials(
    Extension(state): Extension<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<CredentialResponse>>, AppError> {
    let credentials = state.webauthn.list_credentials(user.id).await?;
    Ok(Json(credentials.iter().map(CredentialResponse::from).collect()))
}

#[utoipa::path(
    patch,
    path = "/webauthn/credentials/{id}",
    params(("id" = Uuid, Path, description = "Credential id")),
    request_body = UpdateCredentialRequest,
    responses(
        (status = 200, description = "Renamed", body = CredentialResponse),
        (status = 404, description = "No such credential"),
    ),
    tag = "webauthn"
)]
pub async fn update_credential(
    Extension(state): Extension<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCredentialRequest>,
) -> Result<Json<CredentialResponse>, AppError> {
    let credential = state
        .webauthn
        .rename_credential(user.id, id, &request.name)
        .await?;
    Ok(Json(CredentialResponse::from(&credential)))
}

#[utoipa::path(
    delete,
    path = "/webauthn/credentials/{id}",
    params(("id" = Uuid, Path, description = "Credential id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Last remaining passkey"),
        (status = 404, description = "No such credential"),
    ),
    tag = "webauthn"
)]
pub async fn delete_credential(
    Extension(state): Extension<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.webauthn.delete_credential(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
