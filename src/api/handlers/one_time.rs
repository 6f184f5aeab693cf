//! One-time access tokens.

use super::{access_token_cookie, UserResponse};
use crate::api::{
    request::{AdminUser, ClientInfo},
    state::AppState,
};
use crate::error::AppError;
use crate::rate_limit::RateLimitPolicy;
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOneTimeTokenRequest {
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OneTimeTokenResponse {
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/users/{id}/one-time-access-token",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = CreateOneTimeTokenRequest,
    responses(
        (status = 201, description = "Token issued", body = OneTimeTokenResponse),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "No such user"),
    ),
    tag = "one-time-access-token"
)]
pub async fn create(
    Extension(state): Extension<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<Uuid>,
    Json(request): Json<CreateOneTimeTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = state.one_time.create(user_id, request.expires_at).await?;
    Ok((StatusCode::CREATED, Json(OneTimeTokenResponse { token })))
}

#[utoipa::path(
    post,
    path = "/one-time-access-token/{token}",
    params(("token" = String, Path, description = "One-time access token")),
    responses(
        (
            status = 200,
            description = "Signed in; sets the access token cookie",
            body = UserResponse
        ),
        (status = 400, description = "Token unknown, used or expired"),
        (status = 429, description = "Rate limited"),
    ),
    tag = "one-time-access-token"
)]
pub async fn exchange(
    Extension(state): Extension<AppState>,
    client: ClientInfo,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    client.enforce(&state, RateLimitPolicy::ONE_TIME_TOKEN)?;
    let signed_in = state
        .one_time
        .exchange(&token, &client.ip_address(), &client.user_agent)
        .await?;

    let mut headers = HeaderMap::new();
    access_token_cookie(&state, &signed_in, &mut headers);
    Ok((headers, Json(UserResponse::from(&signed_in.user))))
}

#[utoipa::path(
    post,
    path = "/one-time-access-token/setup",
    responses(
        (
            status = 200,
            description = "Signed in as the initial administrator; sets the access token cookie",
            body = UserResponse
        ),
        (status = 400, description = "Setup already completed"),
    ),
    tag = "one-time-access-token"
)]
pub async fn setup(Extension(state): Extension<AppState>) -> Result<impl IntoResponse, AppError> {
    let signed_in = state.one_time.setup_initial_admin().await?;

    let mut headers = HeaderMap::new();
    access_token_cookie(&state, &signed_in, &mut headers);
    Ok((headers, Json(UserResponse::from(&signed_in.user))))
}
