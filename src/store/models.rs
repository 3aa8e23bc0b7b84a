// CmsVault — Certificate store data models
//
// A protection certificate never carries its private key. Key material is
// reachable only through `CertificateStore::open_private_key`, which checks
// the key's DACL against the caller.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VaultError;

/// Every protection certificate subject starts with this.
pub const SUBJECT_PREFIX: &str = "cms-";

const MAX_IDENTITY_LEN: usize = 128;

const FORBIDDEN_IDENTITY_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

// ─── Identity ────────────────────────────────────────────────────────────────

/// Name of a logical secret, e.g. `Zenoss`. One identity owns a history of
/// certificates, one per rotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse(value: &str) -> Result<Self, VaultError> {
        let invalid = |why: &str| VaultError::InvalidArgument(format!("identity '{}' {}", value, why));

        if value.is_empty() {
            return Err(invalid("is empty"));
        }
        if value.trim() != value {
            return Err(invalid("has surrounding whitespace"));
        }
        if value.chars().count() > MAX_IDENTITY_LEN {
            return Err(invalid("is too long"));
        }
        if value
            .chars()
            .any(|c| c.is_control() || FORBIDDEN_IDENTITY_CHARS.contains(&c))
        {
            return Err(invalid("contains characters not allowed in file names"));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `cms-{identity}-`
    pub fn subject_prefix(&self) -> String {
        format!("{}{}-", SUBJECT_PREFIX, self.0)
    }

    /// A fresh, never-before-used subject: `cms-{identity}-{guid}`.
    pub fn new_subject(&self) -> String {
        format!("{}{}", self.subject_prefix(), Uuid::new_v4())
    }

    /// True if `subject` is `cms-{identity}-{guid}` for exactly this identity.
    /// `svc` does not own `cms-svc-1-{guid}`.
    pub fn owns_subject(&self, subject: &str) -> bool {
        subject
            .strip_prefix(&self.subject_prefix())
            .is_some_and(|rest| is_hyphenated_guid(rest))
    }

    /// Split `cms-{identity}-{guid}` into its identity.
    pub fn from_subject(subject: &str) -> Option<Self> {
        let rest = subject.strip_prefix(SUBJECT_PREFIX)?;
        // GUID is 36 chars plus the separating hyphen
        if rest.len() < 38 || !rest.is_char_boundary(rest.len() - 37) {
            return None;
        }
        let (identity, tail) = rest.split_at(rest.len() - 37);
        let guid = tail.strip_prefix('-')?;
        if !is_hyphenated_guid(guid) {
            return None;
        }
        Self::parse(identity).ok()
    }
}

fn is_hyphenated_guid(value: &str) -> bool {
    value.len() == 36 && Uuid::try_parse(value).is_ok()
}

impl TryFrom<String> for Identity {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Certificates ────────────────────────────────────────────────────────────

/// A key pair plus self-signed certificate protecting one credential generation.
#[derive(Debug, Clone)]
pub struct ProtectionCertificate {
    /// Uppercase hex SHA-256 of the certificate DER.
    pub thumbprint: String,
    pub subject: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub exportable: bool,
    pub has_private_key: bool,
    /// Store insertion order; breaks `not_before` ties.
    pub sequence: i64,
    /// SubjectPublicKeyInfo DER.
    pub public_key_der: Vec<u8>,
    pub cert_pem: String,
}

impl ProtectionCertificate {
    pub fn summary(&self) -> CertificateSummary {
        CertificateSummary {
            thumbprint: self.thumbprint.clone(),
            subject: self.subject.clone(),
            not_before: self.not_before,
            not_after: self.not_after,
            exportable: self.exportable,
            has_private_key: self.has_private_key,
        }
    }
}

impl fmt::Display for ProtectionCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] from {}",
            self.subject,
            self.thumbprint,
            self.not_before.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Listing view of a certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateSummary {
    pub thumbprint: String,
    pub subject: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub exportable: bool,
    pub has_private_key: bool,
}

/// Opaque reference to the storage object holding a certificate's private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHandle {
    thumbprint: String,
}

impl KeyHandle {
    pub fn new(thumbprint: &str) -> Self {
        Self {
            thumbprint: thumbprint.to_ascii_uppercase(),
        }
    }

    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.thumbprint)
    }
}

/// One row of the store audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub thumbprint: String,
    pub action: String,
    pub actor: String,
    pub details: Option<String>,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} by '{}'",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.action,
            self.actor
        )?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_validation() {
        assert!(Identity::parse("Zenoss").is_ok());
        assert!(Identity::parse("svc-backup_01").is_ok());
        for bad in ["", " svc", "svc ", "a/b", "a\\b", "c:d", "x*", "line\nbreak"] {
            assert!(
                matches!(Identity::parse(bad), Err(VaultError::InvalidArgument(_))),
                "{:?} must be rejected",
                bad
            );
        }
        assert!(Identity::parse(&"x".repeat(MAX_IDENTITY_LEN + 1)).is_err());
    }

    #[test]
    fn test_new_subject_has_identity_prefix_and_guid() {
        let id = Identity::parse("Zenoss").unwrap();
        let subject = id.new_subject();
        assert!(subject.starts_with("cms-Zenoss-"));
        assert!(id.owns_subject(&subject));
        assert_ne!(subject, id.new_subject(), "each rotation gets a distinct subject");
    }

    #[test]
    fn test_owns_subject_does_not_claim_longer_identities() {
        let svc = Identity::parse("svc").unwrap();
        let svc1 = Identity::parse("svc-1").unwrap();
        let subject = svc1.new_subject();

        assert!(svc1.owns_subject(&subject));
        assert!(!svc.owns_subject(&subject));
        assert!(!svc.owns_subject("cms-svc-not-a-guid"));
    }

    #[test]
    fn test_identity_from_subject() {
        let id = Identity::parse("svc-1").unwrap();
        let subject = id.new_subject();
        assert_eq!(Identity::from_subject(&subject), Some(id));
        assert_eq!(Identity::from_subject("cms-short"), None);
        assert_eq!(Identity::from_subject("other-svc-1"), None);
    }

    #[test]
    fn test_identity_serde_validates() {
        let ok: Identity = serde_json::from_str("\"Zenoss\"").unwrap();
        assert_eq!(ok.as_str(), "Zenoss");
        assert!(serde_json::from_str::<Identity>("\"a/b\"").is_err());
    }

    #[test]
    fn test_key_handle_normalizes_case() {
        assert_eq!(KeyHandle::new("ab12"), KeyHandle::new("AB12"));
        assert_eq!(KeyHandle::new("ab12").to_string(), "AB12");
    }

    #[test]
    fn test_audit_entry_display() {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            thumbprint: "AB".to_string(),
            action: "acl_granted".to_string(),
            actor: "CORP\\admin".to_string(),
            details: Some("CORP\\user1".to_string()),
        };
        let text = entry.to_string();
        assert!(text.contains("acl_granted by 'CORP\\admin'"));
        assert!(text.ends_with("(CORP\\user1)"));
    }
}
