//! # Portero
//!
//! Passkey-only identity provider that doubles as an `OpenID Connect` authority.
//!
//! Users register and sign in exclusively with `WebAuthn` passkeys; a signed-in
//! session can then authorize relying-party clients through the authorization
//! code flow (optionally with `PKCE`) and receive `RS256` ID and access tokens.
//!
//! Storage is pluggable: an in-memory backend for tests and local runs, and a
//! `PostgreSQL` backend for deployments.

pub mod api;
pub mod audit;
pub mod ceremony;
pub mod cleanup;
pub mod cli;
pub mod error;
pub mod keys;
pub mod oidc;
pub mod one_time;
pub mod periodic;
pub mod rate_limit;
pub mod settings;
pub mod store;
pub mod token;
pub mod webauthn;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
