//! Cookie names and `Set-Cookie` values.
//!
//! Over https the `__Host-` prefixed names are used, which browsers only
//! accept with `Secure`, `Path=/` and no `Domain`.

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieNames {
    pub access_token: &'static str,
    pub session: &'static str,
    secure: bool,
}

impl CookieNames {
    #[must_use]
    pub fn for_url(app_url: &Url) -> Self {
        if app_url.scheme() == "https" {
            Self {
                access_token: "__Host-access_token",
                session: "__Host-session",
                secure: true,
            }
        } else {
            Self {
                access_token: "access_token",
                session: "session",
                secure: false,
            }
        }
    }

    /// `HttpOnly` cookie living for `max_age` seconds; zero expires it.
    #[must_use]
    pub fn build(&self, name: &str, value: &str, max_age: u64) -> Option<HeaderValue> {
        let mut cookie =
            format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).ok()
    }

    #[must_use]
    pub fn clear(&self, name: &str) -> Option<HeaderValue> {
        self.build(name, "", 0)
    }
}

/// Value of the cookie `name` from the request headers.
#[must_use]
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
