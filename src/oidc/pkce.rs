//! Proof Key for Code Exchange (RFC 7636).

use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// `true` when the method selects the S256 transform; anything else is plain.
#[must_use]
pub fn is_sha256(method: Option<&str>) -> bool {
    method == Some("S256")
}

#[must_use]
pub fn s256_challenge(verifier: &str) -> String {
    Base64UrlUnpadded::encode_string(&Sha256::digest(verifier.as_bytes()))
}

#[must_use]
pub fn verify(verifier: &str, challenge: &str, sha256: bool) -> bool {
    let computed = if sha256 {
        s256_challenge(verifier)
    } else {
        verifier.to_string()
    };
    computed.as_bytes().ct_eq(challenge.as_bytes()).into()
}
