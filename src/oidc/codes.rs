//! Random opaque strings: authorization codes, client secrets, one-time tokens.

use rand::{distributions::Alphanumeric, Rng};

pub const AUTHORIZATION_CODE_LENGTH: usize = 32;
pub const AUTHORIZATION_CODE_LIFETIME_MINUTES: i64 = 15;
pub const CLIENT_SECRET_LENGTH: usize = 32;

#[must_use]
pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
