// CmsVault — Plaintext secret
//
// SECURITY: the password lives in zeroize-on-drop memory and never appears in
// Debug or Display output. The serialized form is the canonical JSON that
// gets sealed into an envelope, also used to carry a secret to a remote agent.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

/// A username/password pair.
#[derive(Clone)]
pub struct Secret {
    username: String,
    password: Zeroizing<String>,
}

#[derive(Serialize)]
struct CanonicalSecret<'a> {
    #[serde(rename = "Username")]
    username: &'a str,
    #[serde(rename = "Password")]
    password: &'a str,
}

#[derive(Deserialize)]
struct ParsedSecret {
    #[serde(rename = "Username")]
    username: Option<String>,
    #[serde(rename = "Password")]
    password: Option<String>,
}

impl Secret {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The raw password. Callers must not log it.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// `{"Username":…,"Password":…}` with that field order.
    pub fn to_canonical_json(&self) -> Result<Zeroizing<Vec<u8>>> {
        let json = serde_json::to_vec(&CanonicalSecret {
            username: &self.username,
            password: &self.password,
        })
        .map_err(|e| VaultError::MalformedSecret(e.to_string()))?;
        Ok(Zeroizing::new(json))
    }

    /// Parse decrypted plaintext. Both fields must be present and non-empty.
    pub fn from_json(plaintext: &[u8]) -> Result<Self> {
        let parsed: ParsedSecret = serde_json::from_slice(plaintext)
            .map_err(|_| VaultError::MalformedSecret("payload is not a JSON credential".into()))?;
        Self::from_parsed(parsed)
    }

    /// Both fields must be non-empty. Protect checks this before anything
    /// is sealed so that every written credential reads back.
    pub fn validate(&self) -> Result<()> {
        check_fields(&self.username, &self.password)
    }

    fn from_parsed(parsed: ParsedSecret) -> Result<Self> {
        let secret = Self {
            username: parsed.username.unwrap_or_default(),
            password: Zeroizing::new(parsed.password.unwrap_or_default()),
        };
        secret.validate()?;
        Ok(secret)
    }
}

fn check_fields(username: &str, password: &str) -> Result<()> {
    if username.is_empty() {
        return Err(VaultError::MalformedSecret("Username is missing or empty".into()));
    }
    if password.is_empty() {
        return Err(VaultError::MalformedSecret("Password is missing or empty".into()));
    }
    Ok(())
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        CanonicalSecret {
            username: &self.username,
            password: &self.password,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let parsed = ParsedSecret::deserialize(deserializer)?;
        Self::from_parsed(parsed).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / [REDACTED]", self.username)
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username && *self.password == *other.password
    }
}

impl Eq for Secret {}
