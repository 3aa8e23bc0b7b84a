// CmsVault — Access coordination
//
// Grant, Revoke, Reset and ShowAccess on the private key of an identity's
// current certificate (or a certificate named by thumbprint). Resolution
// mirrors protect, except that a missing certificate is an error: access
// changes never create certificates.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::acl::{AccessEntry, AclSnapshot, Caller, KeyRights, PrincipalResolver, PrivateKeyAcl};
use crate::error::{Result, VaultError};
use crate::lifecycle::{newest_certificate, pinned_certificate};
use crate::store::{AuditEntry, CertificateStore, Identity, KeyHandle, ProtectionCertificate};

/// Which certificate an access operation applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateTarget {
    /// Newest certificate of the identity.
    Identity(Identity),
    Thumbprint(String),
}

impl std::fmt::Display for CertificateTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertificateTarget::Identity(identity) => write!(f, "identity '{}'", identity),
            CertificateTarget::Thumbprint(thumbprint) => write!(f, "certificate {}", thumbprint),
        }
    }
}

/// The DACL of one certificate's private key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessReport {
    pub thumbprint: String,
    pub subject: String,
    pub entries: Vec<AccessEntry>,
}

impl AccessReport {
    fn new(cert: &ProtectionCertificate, acl: &AclSnapshot) -> Self {
        Self {
            thumbprint: cert.thumbprint.clone(),
            subject: cert.subject.clone(),
            entries: acl.entries().to_vec(),
        }
    }
}

pub struct AccessCoordinator<'a, S: CertificateStore + ?Sized> {
    store: &'a S,
    resolver: &'a PrincipalResolver,
    caller: &'a Caller,
}

impl<'a, S: CertificateStore + ?Sized> AccessCoordinator<'a, S> {
    pub fn new(store: &'a S, resolver: &'a PrincipalResolver, caller: &'a Caller) -> Self {
        Self {
            store,
            resolver,
            caller,
        }
    }

    fn resolve(&self, target: &CertificateTarget) -> Result<ProtectionCertificate> {
        match target {
            CertificateTarget::Thumbprint(thumbprint) => pinned_certificate(self.store, thumbprint, None),
            CertificateTarget::Identity(identity) => newest_certificate(self.store, identity)?
                .ok_or_else(|| VaultError::NotFound(format!("no certificate for identity '{}'", identity))),
        }
    }

    fn locate(&self, target: &CertificateTarget) -> Result<(ProtectionCertificate, KeyHandle)> {
        let cert = self.resolve(target)?;
        let handle = self.store.locate_private_key(&cert, self.caller)?;
        Ok((cert, handle))
    }

    /// Give each principal Read on the key. Names are resolved before any
    /// change is made.
    pub fn grant(&self, target: &CertificateTarget, principals: &[String]) -> Result<AccessReport> {
        let (cert, handle) = self.locate(target)?;
        let resolved = self.resolver.resolve_all(principals)?;
        let acl = PrivateKeyAcl::new(self.store, self.caller).grant(&handle, &resolved, KeyRights::Read)?;
        Ok(AccessReport::new(&cert, &acl))
    }

    pub fn revoke(&self, target: &CertificateTarget, principals: &[String]) -> Result<AccessReport> {
        let (cert, handle) = self.locate(target)?;
        let resolved = self.resolver.resolve_all(principals)?;
        let acl = PrivateKeyAcl::new(self.store, self.caller).revoke(&handle, &resolved)?;
        Ok(AccessReport::new(&cert, &acl))
    }

    /// Restore the trusted-only DACL. Destructive, so it needs `confirmed`.
    pub fn reset(&self, target: &CertificateTarget, confirmed: bool) -> Result<AccessReport> {
        let (cert, handle) = self.locate(target)?;
        if !confirmed {
            return Err(VaultError::ConfirmationRequired(format!(
                "resetting the DACL of {} removes every non-administrative grant",
                cert.thumbprint
            )));
        }
        let acl = PrivateKeyAcl::new(self.store, self.caller).reset(&handle)?;
        Ok(AccessReport::new(&cert, &acl))
    }

    pub fn show_access(&self, target: &CertificateTarget) -> Result<AccessReport> {
        let (cert, handle) = self.locate(target)?;
        let acl = PrivateKeyAcl::new(self.store, self.caller).read(&handle)?;
        Ok(AccessReport::new(&cert, &acl))
    }

    /// PKCS#8 PEM of an exportable key.
    pub fn export_private_key(&self, target: &CertificateTarget) -> Result<Zeroizing<String>> {
        let cert = self.resolve(target)?;
        let pem = self.store.export_private_key(&cert, self.caller)?;
        tracing::info!(thumbprint = %cert.thumbprint, principal = %self.caller, "Private key exported");
        Ok(pem)
    }

    pub fn audit_log(&self, target: &CertificateTarget) -> Result<Vec<AuditEntry>> {
        match target {
            // Deleted certificates keep their audit trail
            CertificateTarget::Thumbprint(thumbprint) => Ok(self.store.audit_log(thumbprint)?),
            CertificateTarget::Identity(_) => {
                let cert = self.resolve(target)?;
                Ok(self.store.audit_log(&cert.thumbprint)?)
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
