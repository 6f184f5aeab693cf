//! Scope-gated user claims shared by ID tokens and userinfo.

use crate::store::{CustomClaims, User};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Names a custom claim may never take.
pub const RESERVED_CLAIMS: &[&str] = &[
    "given_name",
    "family_name",
    "name",
    "email",
    "email_verified",
    "preferred_username",
    "groups",
    "sub",
    "iss",
    "aud",
    "exp",
    "iat",
    "auth_time",
    "nonce",
    "acr",
    "amr",
    "azp",
    "nbf",
    "jti",
];

#[must_use]
pub fn is_reserved_claim(key: &str) -> bool {
    RESERVED_CLAIMS.contains(&key)
}

/// Custom claims of `user` merged with those of its groups. A key set on the
/// user wins over the same key on any group.
#[must_use]
pub fn custom_claims(user: &User) -> CustomClaims {
    let mut merged = CustomClaims::new();
    for group in &user.groups {
        for (key, value) in &group.custom_claims {
            merged.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    for (key, value) in &user.custom_claims {
        merged.insert(key.clone(), value.clone());
    }
    merged.retain(|key, _| !is_reserved_claim(key));
    merged
}

/// Claims about `user` released under `scope`.
///
/// Scope names are matched as substrings, so "profile" and "email" are
/// checked independently of each other.
#[must_use]
pub fn user_claims(user: &User, scope: &str, email_verified: bool) -> Map<String, Value> {
    let mut claims = Map::new();
    claims.insert("sub".to_string(), json!(user.id.to_string()));

    if scope.contains("profile") {
        claims.insert("given_name".to_string(), json!(user.first_name));
        claims.insert("family_name".to_string(), json!(user.last_name));
        claims.insert("name".to_string(), json!(user.full_name()));
        claims.insert("preferred_username".to_string(), json!(user.username));
        for (key, value) in custom_claims(user) {
            claims.insert(key, json!(value));
        }
    }

    if scope.contains("email") {
        claims.insert("email".to_string(), json!(user.email));
        claims.insert("email_verified".to_string(), json!(email_verified));
    }

    if scope.contains("groups") {
        let groups: Vec<&str> = user.groups.iter().map(|g| g.name.as_str()).collect();
        claims.insert("groups".to_string(), json!(groups));
    }

    claims
}

/// JWT `aud`: a single string on the wire when it has one entry, an array otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audience(pub Vec<String>);

impl Audience {
    #[must_use]
    pub fn single(value: impl Into<String>) -> Self {
        Self(vec![value.into()])
    }

    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|aud| aud == value)
    }

    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Serialize for Audience {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [one] => serializer.serialize_str(one),
            many => many.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Audience {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(aud) => Self(vec![aud]),
            OneOrMany::Many(aud) => Self(aud),
        })
    }
}
