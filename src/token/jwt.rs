//! Compact RS256 JWS encoding.

use super::TokenError;
use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub alg: String,
    pub typ: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Header {
    fn rs256(kid: &str) -> Self {
        Self {
            alg: "RS256".to_string(),
            typ: "JWT".to_string(),
            kid: Some(kid.to_string()),
        }
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: DeserializeOwned>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Sign `claims` into a compact JWS.
///
/// # Errors
/// Returns an error if the header or claims cannot be encoded.
pub fn sign<C: Serialize>(
    signing_key: &SigningKey<Sha256>,
    kid: &str,
    claims: &C,
) -> Result<String, TokenError> {
    let signing_input = format!("{}.{}", b64e_json(&Header::rs256(kid))?, b64e_json(claims)?);
    let signature: Signature = signing_key.sign(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());
    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Check the signature of a compact JWS and decode its claims.
///
/// Claim validation (expiry, audience) is left to the caller.
///
/// # Errors
/// Returns an error if the token is malformed, signed with another algorithm
/// or key id, or the signature does not verify.
pub fn verify<C: DeserializeOwned>(
    verifying_key: &VerifyingKey<Sha256>,
    kid: &str,
    token: &str,
) -> Result<C, TokenError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
    if parts.next().is_some() {
        return Err(TokenError::TokenFormat);
    }

    let header: Header = b64d_json(header_b64).map_err(malformed)?;
    if header.alg != "RS256" {
        return Err(TokenError::UnsupportedAlg(header.alg));
    }
    if let Some(token_kid) = header.kid {
        if token_kid != kid {
            return Err(TokenError::UnknownKid(token_kid));
        }
    }

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature_bytes =
        Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
    let signature = Signature::try_from(signature_bytes.as_slice())
        .map_err(|_| TokenError::InvalidSignature)?;
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    b64d_json(claims_b64).map_err(malformed)
}

fn malformed(err: TokenError) -> TokenError {
    match err {
        TokenError::Json(_) => TokenError::TokenFormat,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::tests::test_key_manager;
    use serde_json::{json, Value};

    #[test]
    fn sign_and_verify() -> Result<(), TokenError> {
        let keys = test_key_manager();
        let token = sign(keys.signing_key(), "1", &json!({ "sub": "abc" }))?;
        let claims: Value = verify(keys.verifying_key(), "1", &token)?;
        assert_eq!(claims["sub"], "abc");
        Ok(())
    }

    #[test]
    fn rejects_tampered_payload() -> Result<(), TokenError> {
        let keys = test_key_manager();
        let token = sign(keys.signing_key(), "1", &json!({ "sub": "abc" }))?;
        let parts: Vec<&str> = token.split('.').collect();
        let forged = Base64UrlUnpadded::encode_string(br#"{"sub":"root"}"#);
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);

        let result: Result<Value, _> = verify(keys.verifying_key(), "1", &tampered);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_foreign_kid_and_alg() -> Result<(), TokenError> {
        let keys = test_key_manager();
        let token = sign(keys.signing_key(), "2", &json!({}))?;
        let result: Result<Value, _> = verify(keys.verifying_key(), "1", &token);
        assert!(matches!(result, Err(TokenError::UnknownKid(kid)) if kid == "2"));

        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"none","typ":"JWT"}"#);
        let body = Base64UrlUnpadded::encode_string(b"{}");
        let result: Result<Value, _> =
            verify(keys.verifying_key(), "1", &format!("{header}.{body}."));
        assert!(matches!(result, Err(TokenError::UnsupportedAlg(alg)) if alg == "none"));
        Ok(())
    }

    #[test]
    fn rejects_malformed_tokens() {
        let keys = test_key_manager();
        for token in ["", "abc", "a.b", "a.b.c.d"] {
            let result: Result<Value, _> = verify(keys.verifying_key(), "1", token);
            assert!(result.is_err(), "{token} must be rejected");
        }
    }
}
