pub mod health;
pub mod oidc;
pub mod one_time;
pub mod webauthn;
pub mod well_known;

use super::state::AppState;
use crate::store::User;
use crate::webauthn::SignedIn;
use axum::http::{header::SET_COOKIE, HeaderMap};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// `Set-Cookie` for a fresh session access token.
fn access_token_cookie(state: &AppState, signed_in: &SignedIn, headers: &mut HeaderMap) {
    let max_age = u64::from(state.settings.session_duration_minutes()) * 60;
    if let Some(cookie) =
        state
            .cookies
            .build(state.cookies.access_token, &signed_in.access_token, max_age)
    {
        headers.append(SET_COOKIE, cookie);
    }
}
