// CmsVault — Credential lifecycle
//
// Protect, Get, Remove and Show for one identity at a time. Lifecycle state
// is never stored: it is read back from the certificate store and the
// credential directory on every call.
//
//   NoCertificate ──protect──▶ HasCertificates(oldest … newest)
//                               current = newest by (NotBefore, sequence)
//                               unless a thumbprint pins an older one

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::acl::Caller;
use crate::codec::{Secret, SecretCodec};
use crate::error::{Result, VaultError};
use crate::files::{CredentialFileStore, FileSummary};
use crate::store::{
    CertificateStore, CertificateSummary, Identity, ProtectionCertificate, SUBJECT_PREFIX,
};

/// Generations kept by the cleanup that follows every protect.
pub const DEFAULT_PROTECT_RETAIN: usize = 1;

// ─── Requests & outcomes ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectOptions {
    /// Pin an existing certificate of the identity instead of the newest.
    pub thumbprint: Option<String>,
    /// Always create a new certificate (rotate).
    pub reset: bool,
    pub skip_cleanup: bool,
    /// Write here instead of the configured credential directory.
    pub output_dir: Option<PathBuf>,
    /// Replace an existing credential file without asking.
    pub overwrite: bool,
    /// Allow the new private key to be exported. Ignored for existing keys.
    pub exportable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectOutcome {
    pub path: String,
    pub subject: String,
    pub thumbprint: String,
    pub created_certificate: bool,
    pub cleanup: Option<RemoveOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoveOutcome {
    pub deleted_files: Vec<String>,
    pub deleted_certificates: Vec<String>,
}

/// Where `get` reads a credential from.
#[derive(Debug, Clone)]
pub enum SecretSource {
    /// Newest credential file of the identity.
    Identity(Identity),
    File(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub identities: Vec<IdentityInventory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityInventory {
    pub identity: Identity,
    /// Oldest first.
    pub certificates: Vec<CertificateSummary>,
    /// Oldest first.
    pub files: Vec<FileSummary>,
}

// ─── Certificate resolution ──────────────────────────────────────────────────

/// Certificates of `identity`, oldest first.
pub(crate) fn certificates_for<S: CertificateStore + ?Sized>(
    store: &S,
    identity: &Identity,
) -> Result<Vec<ProtectionCertificate>> {
    Ok(store
        .find_certificates(&identity.subject_prefix())?
        .into_iter()
        .filter(|c| identity.owns_subject(&c.subject))
        .collect())
}

pub(crate) fn newest_certificate<S: CertificateStore + ?Sized>(
    store: &S,
    identity: &Identity,
) -> Result<Option<ProtectionCertificate>> {
    Ok(certificates_for(store, identity)?.pop())
}

/// Look up a pinned certificate. When `identity` is given the certificate
/// must belong to it.
pub(crate) fn pinned_certificate<S: CertificateStore + ?Sized>(
    store: &S,
    thumbprint: &str,
    identity: Option<&Identity>,
) -> Result<ProtectionCertificate> {
    let cert = store
        .find_by_thumbprint(thumbprint)?
        .ok_or_else(|| VaultError::NotFound(format!("certificate {}", thumbprint)))?;
    if let Some(identity) = identity {
        if !identity.owns_subject(&cert.subject) {
            return Err(VaultError::NotFound(format!(
                "certificate {} does not belong to identity '{}'",
                thumbprint, identity
            )));
        }
    }
    Ok(cert)
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

pub struct CredentialLifecycle<'a, S: CertificateStore + ?Sized> {
    store: &'a S,
    files: CredentialFileStore,
    caller: &'a Caller,
}

impl<'a, S: CertificateStore + ?Sized> CredentialLifecycle<'a, S> {
    pub fn new(store: &'a S, files: CredentialFileStore, caller: &'a Caller) -> Self {
        Self {
            store,
            files,
            caller,
        }
    }

    /// Encrypt `secret` to the identity's current certificate (creating one
    /// if needed) and write it as the newest credential file.
    ///
    /// A failing cleanup does not undo the write; it is reported as
    /// `CleanupFailed` naming the written file.
    pub fn protect(
        &self,
        identity: &Identity,
        secret: &Secret,
        options: &ProtectOptions,
    ) -> Result<ProtectOutcome> {
        secret.validate()?;

        let resolved = match (&options.thumbprint, options.reset) {
            (Some(thumbprint), _) => Some(pinned_certificate(self.store, thumbprint, Some(identity))?),
            (None, false) => newest_certificate(self.store, identity)?,
            (None, true) => None,
        };

        let (cert, created_certificate) = match resolved {
            Some(cert) => (cert, false),
            None => (
                self.store
                    .create_certificate(identity, options.exportable, self.caller)?,
                true,
            ),
        };

        let files = match &options.output_dir {
            Some(dir) => CredentialFileStore::new(dir),
            None => self.files.clone(),
        };
        // Cleanup only prunes `files`, but certificates are per identity:
        // those still named by a file in the credential directory must stay.
        let also_live = (files.dir() != self.files.dir()).then_some(&self.files);

        let target = files.path_for(&cert.subject);
        if target.exists() && !options.overwrite {
            return Err(VaultError::ConfirmationRequired(format!(
                "{} already exists; confirm to overwrite it",
                target.display()
            )));
        }

        let ciphertext = SecretCodec::new(self.store, self.caller).encrypt(secret, &cert)?;
        let path = files.write(&cert.subject, &ciphertext, options.overwrite)?;

        tracing::info!(
            identity = %identity,
            subject = %cert.subject,
            thumbprint = %cert.thumbprint,
            path = %path.display(),
            "Credential protected"
        );

        let cleanup = if options.skip_cleanup {
            None
        } else {
            match remove_in(
                self.store,
                &files,
                also_live,
                self.caller,
                identity,
                DEFAULT_PROTECT_RETAIN,
            ) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::warn!(identity = %identity, error = %e, "Cleanup after protect failed");
                    return Err(VaultError::CleanupFailed {
                        written: path.display().to_string(),
                        source: Box::new(e),
                    });
                }
            }
        };

        Ok(ProtectOutcome {
            path: path.display().to_string(),
            subject: cert.subject,
            thumbprint: cert.thumbprint,
            created_certificate,
            cleanup,
        })
    }

    pub fn get(&self, source: &SecretSource) -> Result<Secret> {
        let path = match source {
            SecretSource::File(path) => path.clone(),
            SecretSource::Identity(identity) => {
                self.files
                    .find_latest(identity)?
                    .ok_or_else(|| {
                        VaultError::NotFound(format!("no credential file for identity '{}'", identity))
                    })?
                    .path
            }
        };

        let armored = self.files.read(&path)?;
        let secret = SecretCodec::new(self.store, self.caller).decrypt(&armored)?;
        tracing::debug!(path = %path.display(), "Credential read");
        Ok(secret)
    }

    /// Keep the newest `retain` files and certificates of `identity`, delete
    /// the rest. Stops at the first failure.
    pub fn remove(&self, identity: &Identity, retain: usize) -> Result<RemoveOutcome> {
        remove_in(self.store, &self.files, None, self.caller, identity, retain)
    }

    /// Certificates and files per identity. Nothing is decrypted.
    pub fn show(&self, identity: Option<&Identity>) -> Result<Inventory> {
        let identities: Vec<Identity> = match identity {
            Some(identity) => vec![identity.clone()],
            None => {
                let mut all: BTreeSet<String> = self
                    .files
                    .list_identities()?
                    .into_iter()
                    .map(String::from)
                    .collect();
                for cert in self.store.find_certificates(SUBJECT_PREFIX)? {
                    if let Some(identity) = Identity::from_subject(&cert.subject) {
                        all.insert(identity.into());
                    }
                }
                all.iter().map(|name| Identity::parse(name)).collect::<Result<_>>()?
            }
        };

        let mut inventory = Inventory::default();
        for identity in identities {
            let certificates = certificates_for(self.store, &identity)?
                .iter()
                .map(ProtectionCertificate::summary)
                .collect();
            let files = self
                .files
                .list_all(&identity)?
                .iter()
                .map(|f| f.summary())
                .collect();
            inventory.identities.push(IdentityInventory {
                identity,
                certificates,
                files,
            });
        }
        Ok(inventory)
    }
}

fn remove_in<S: CertificateStore + ?Sized>(
    store: &S,
    files: &CredentialFileStore,
    also_live: Option<&CredentialFileStore>,
    caller: &Caller,
    identity: &Identity,
    retain: usize,
) -> Result<RemoveOutcome> {
    let mut outcome = RemoveOutcome::default();

    let all_files = files.list_all(identity)?;
    let file_cut = all_files.len().saturating_sub(retain);
    let (stale_files, kept_files) = all_files.split_at(file_cut);
    for file in stale_files {
        files.delete(file)?;
        outcome.deleted_files.push(file.path.display().to_string());
    }

    // A certificate whose file survived stays, even if it is not among the
    // newest `retain` certificates.
    let mut live_subjects: BTreeSet<String> = kept_files.iter().map(|f| f.subject.clone()).collect();
    if let Some(other) = also_live {
        live_subjects.extend(other.list_all(identity)?.into_iter().map(|f| f.subject));
    }
    let certificates = certificates_for(store, identity)?;
    let cert_cut = certificates.len().saturating_sub(retain);
    for cert in &certificates[..cert_cut] {
        if live_subjects.contains(&cert.subject) {
            tracing::debug!(subject = %cert.subject, "Keeping certificate of a retained file");
            continue;
        }
        store.delete_certificate(cert, caller)?;
        outcome.deleted_certificates.push(cert.thumbprint.clone());
    }

    if !outcome.deleted_files.is_empty() || !outcome.deleted_certificates.is_empty() {
        tracing::info!(
            identity = %identity,
            retain,
            files = outcome.deleted_files.len(),
            certificates = outcome.deleted_certificates.len(),
            "Removed old generations"
        );
    }
    Ok(outcome)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{KeyRights, Principal, PrivateKeyAcl};
    use crate::store::{Database, KeyHandle, SqliteCertificateStore};

    struct Fixture {
        db: Database,
        dir: tempfile::TempDir,
        caller: Caller,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                db: Database::open_in_memory().unwrap(),
                dir: tempfile::tempdir().unwrap(),
                caller: Caller::new(Principal::account("WEB01", "operator")),
            }
        }

        fn store(&self) -> SqliteCertificateStore<'_> {
            SqliteCertificateStore::new(&self.db)
        }

        fn files(&self) -> CredentialFileStore {
            CredentialFileStore::new(self.dir.path())
        }
    }

    fn id(name: &str) -> Identity {
        Identity::parse(name).unwrap()
    }

    fn rotate() -> ProtectOptions {
        ProtectOptions {
            reset: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_protect_then_get_round_trip() {
        let fx = Fixture::new();
        let store = fx.store();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);

        let outcome = lifecycle
            .protect(&id("svc1"), &Secret::new("admin", "P@ss1"), &ProtectOptions::default())
            .unwrap();
        assert!(outcome.created_certificate);
        assert!(outcome.path.ends_with(&format!("{}.txt", outcome.subject)));

        let secret = lifecycle.get(&SecretSource::Identity(id("svc1"))).unwrap();
        assert_eq!(secret, Secret::new("admin", "P@ss1"));

        let by_path = lifecycle.get(&SecretSource::File(PathBuf::from(&outcome.path))).unwrap();
        assert_eq!(by_path, secret);
    }

    #[test]
    fn test_round_trip_for_assorted_values() {
        let fx = Fixture::new();
        let store = fx.store();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);

        let cases = [
            ("Zenoss", "svc_zenoss", "hunter2"),
            ("db.primary", "CORP\\sql", "päss wörd \"quoted\" {json}"),
            ("x", "u", "p"),
        ];
        for (identity, user, pass) in cases {
            lifecycle
                .protect(&id(identity), &Secret::new(user, pass), &rotate())
                .unwrap();
            let got = lifecycle.get(&SecretSource::Identity(id(identity))).unwrap();
            assert_eq!((got.username(), got.password()), (user, pass));
        }
    }

    #[test]
    fn test_reset_three_times_keeps_only_newest() {
        let fx = Fixture::new();
        let store = fx.store();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);

        for n in 1..=3 {
            lifecycle
                .protect(&id("svc1"), &Secret::new("admin", format!("P@ss{}", n)), &rotate())
                .unwrap();
        }

        let certs = store.find_certificates("cms-svc1-").unwrap();
        assert_eq!(certs.len(), 1);
        assert_eq!(fx.files().list_all(&id("svc1")).unwrap().len(), 1);
        let secret = lifecycle.get(&SecretSource::Identity(id("svc1"))).unwrap();
        assert_eq!(secret.password(), "P@ss3");
    }

    #[test]
    fn test_protect_reuses_newest_and_guards_overwrite() {
        let fx = Fixture::new();
        let store = fx.store();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);

        let first = lifecycle
            .protect(&id("svc1"), &Secret::new("a", "1"), &ProtectOptions::default())
            .unwrap();
        let err = lifecycle
            .protect(&id("svc1"), &Secret::new("a", "2"), &ProtectOptions::default())
            .unwrap_err();
        assert!(matches!(err, VaultError::ConfirmationRequired(_)));

        let overwrite = ProtectOptions {
            overwrite: true,
            ..Default::default()
        };
        let second = lifecycle.protect(&id("svc1"), &Secret::new("a", "2"), &overwrite).unwrap();
        assert!(!second.created_certificate);
        assert_eq!(second.thumbprint, first.thumbprint);
        assert_eq!(lifecycle.get(&SecretSource::Identity(id("svc1"))).unwrap().password(), "2");
    }

    #[test]
    fn test_explicit_retention_keeps_newest_generations() {
        let fx = Fixture::new();
        let store = fx.store();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);
        let keep_all = ProtectOptions {
            reset: true,
            skip_cleanup: true,
            ..Default::default()
        };

        let outcomes: Vec<_> = (0..4)
            .map(|n| {
                lifecycle
                    .protect(&id("svc"), &Secret::new("u", format!("p{}", n)), &keep_all)
                    .unwrap()
            })
            .collect();

        for (retain, expected) in [(5, 4), (2, 2), (0, 0)] {
            lifecycle.remove(&id("svc"), retain).unwrap();
            let certs = certificates_for(&store, &id("svc")).unwrap();
            let files = fx.files().list_all(&id("svc")).unwrap();
            assert_eq!(certs.len(), expected);
            assert_eq!(files.len(), expected);
            if expected == 2 {
                let kept: Vec<_> = certs.iter().map(|c| c.thumbprint.clone()).collect();
                assert_eq!(kept, vec![outcomes[2].thumbprint.clone(), outcomes[3].thumbprint.clone()]);
            }
        }
    }

    #[test]
    fn test_remove_leaves_other_identities_alone() {
        let fx = Fixture::new();
        let store = fx.store();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);
        lifecycle.protect(&id("svc"), &Secret::new("u", "p"), &rotate()).unwrap();
        lifecycle.protect(&id("svc-1"), &Secret::new("u", "p"), &rotate()).unwrap();

        let outcome = lifecycle.remove(&id("svc"), 0).unwrap();
        assert_eq!(outcome.deleted_files.len(), 1);
        assert_eq!(outcome.deleted_certificates.len(), 1);
        assert!(lifecycle.get(&SecretSource::Identity(id("svc-1"))).is_ok());
    }

    #[test]
    fn test_pinned_thumbprint_must_belong_to_identity() {
        let fx = Fixture::new();
        let store = fx.store();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);
        let other = lifecycle.protect(&id("other"), &Secret::new("u", "p"), &rotate()).unwrap();

        let pinned = ProtectOptions {
            thumbprint: Some(other.thumbprint),
            ..Default::default()
        };
        let err = lifecycle.protect(&id("svc"), &Secret::new("u", "p"), &pinned).unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));

        let unknown = ProtectOptions {
            thumbprint: Some("00FF".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            lifecycle.protect(&id("svc"), &Secret::new("u", "p"), &unknown),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_pinning_older_generation_keeps_its_certificate() {
        let fx = Fixture::new();
        let store = fx.store();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);
        let keep_all = ProtectOptions {
            reset: true,
            skip_cleanup: true,
            ..Default::default()
        };
        let old = lifecycle.protect(&id("svc"), &Secret::new("u", "old"), &keep_all).unwrap();
        lifecycle.protect(&id("svc"), &Secret::new("u", "new"), &keep_all).unwrap();

        let pinned = ProtectOptions {
            thumbprint: Some(old.thumbprint.clone()),
            overwrite: true,
            ..Default::default()
        };
        lifecycle.protect(&id("svc"), &Secret::new("u", "pinned"), &pinned).unwrap();

        let secret = lifecycle.get(&SecretSource::Identity(id("svc"))).unwrap();
        assert_eq!(secret.password(), "pinned");
        assert!(store.find_by_thumbprint(&old.thumbprint).unwrap().is_some());
    }

    #[test]
    fn test_cleanup_failure_keeps_written_file() {
        let fx = Fixture::new();
        let store = fx.store();
        let alice = Caller::new(Principal::account("WEB01", "alice"));
        let bob = Caller::new(Principal::account("WEB01", "bob"));

        CredentialLifecycle::new(&store, fx.files(), &alice)
            .protect(&id("svc"), &Secret::new("u", "alice"), &rotate())
            .unwrap();

        // bob cannot delete alice's certificate
        let err = CredentialLifecycle::new(&store, fx.files(), &bob)
            .protect(&id("svc"), &Secret::new("u", "bob"), &rotate())
            .unwrap_err();
        match err {
            VaultError::CleanupFailed { written, source } => {
                assert!(matches!(*source, VaultError::StoreAccess(_)));
                assert!(std::path::Path::new(&written).exists());
            }
            other => panic!("expected CleanupFailed, got {:?}", other),
        }

        let secret = CredentialLifecycle::new(&store, fx.files(), &bob)
            .get(&SecretSource::Identity(id("svc")))
            .unwrap();
        assert_eq!(secret.password(), "bob");
    }

    #[test]
    fn test_get_missing_identity_is_not_found() {
        let fx = Fixture::new();
        let store = fx.store();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);
        let err = lifecycle
            .get(&SecretSource::Identity(id("nonexistent-identity")))
            .unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
    }

    #[test]
    fn test_get_requires_key_access() {
        let fx = Fixture::new();
        let store = fx.store();
        let user1 = Caller::new(Principal::account("DOMAIN", "User1"));
        let stranger = Caller::new(Principal::account("DOMAIN", "User2"));

        CredentialLifecycle::new(&store, fx.files(), &fx.caller)
            .protect(&id("svc1"), &Secret::new("admin", "P@ss1"), &ProtectOptions::default())
            .unwrap();
        let cert = newest_certificate(&store, &id("svc1")).unwrap().unwrap();
        PrivateKeyAcl::new(&store, &fx.caller)
            .grant(
                &KeyHandle::new(&cert.thumbprint),
                &[user1.principal().clone()],
                KeyRights::Read,
            )
            .unwrap();

        let source = SecretSource::Identity(id("svc1"));
        assert!(matches!(
            CredentialLifecycle::new(&store, fx.files(), &stranger).get(&source),
            Err(VaultError::Decryption(_))
        ));
        let secret = CredentialLifecycle::new(&store, fx.files(), &user1).get(&source).unwrap();
        assert_eq!(secret.password(), "P@ss1");
    }

    #[test]
    fn test_output_dir_override() {
        let fx = Fixture::new();
        let store = fx.store();
        let elsewhere = tempfile::tempdir().unwrap();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);

        let options = ProtectOptions {
            output_dir: Some(elsewhere.path().to_path_buf()),
            ..Default::default()
        };
        let outcome = lifecycle.protect(&id("svc"), &Secret::new("u", "p"), &options).unwrap();
        assert!(outcome.path.starts_with(&elsewhere.path().display().to_string()));
        assert!(fx.files().list_all(&id("svc")).unwrap().is_empty());
    }

    #[test]
    fn test_rotating_into_output_dir_keeps_credential_directory_readable() {
        let fx = Fixture::new();
        let store = fx.store();
        let elsewhere = tempfile::tempdir().unwrap();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);

        let first = lifecycle
            .protect(&id("svc"), &Secret::new("u", "p1"), &ProtectOptions::default())
            .unwrap();
        let options = ProtectOptions {
            reset: true,
            output_dir: Some(elsewhere.path().to_path_buf()),
            ..Default::default()
        };
        let second = lifecycle.protect(&id("svc"), &Secret::new("u", "p2"), &options).unwrap();

        assert_eq!(second.cleanup, Some(RemoveOutcome::default()));
        assert_eq!(store.find_certificates("cms-svc-").unwrap().len(), 2);
        assert!(store.find_by_thumbprint(&first.thumbprint).unwrap().is_some());

        let secret = lifecycle.get(&SecretSource::Identity(id("svc"))).unwrap();
        assert_eq!(secret.password(), "p1");
        let moved = lifecycle.get(&SecretSource::File(PathBuf::from(&second.path))).unwrap();
        assert_eq!(moved.password(), "p2");
    }

    #[test]
    fn test_protect_rejects_empty_fields_before_creating_a_certificate() {
        let fx = Fixture::new();
        let store = fx.store();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);

        for secret in [Secret::new("", "pw"), Secret::new("svc_user", "")] {
            let err = lifecycle
                .protect(&id("svc"), &secret, &ProtectOptions::default())
                .unwrap_err();
            assert!(matches!(err, VaultError::MalformedSecret(_)));
        }
        assert!(store.find_certificates("cms-svc-").unwrap().is_empty());
        assert!(fx.files().list_all(&id("svc")).unwrap().is_empty());
    }

    #[test]
    fn test_show_lists_certificates_and_files() {
        let fx = Fixture::new();
        let store = fx.store();
        let lifecycle = CredentialLifecycle::new(&store, fx.files(), &fx.caller);
        lifecycle.protect(&id("b-svc"), &Secret::new("u", "p"), &rotate()).unwrap();
        lifecycle.protect(&id("a-svc"), &Secret::new("u", "p"), &rotate()).unwrap();

        let all = lifecycle.show(None).unwrap();
        let names: Vec<_> = all.identities.iter().map(|i| i.identity.as_str()).collect();
        assert_eq!(names, vec!["a-svc", "b-svc"]);
        assert!(all.identities.iter().all(|i| i.certificates.len() == 1 && i.files.len() == 1));

        let one = lifecycle.show(Some(&id("a-svc"))).unwrap();
        assert_eq!(one.identities.len(), 1);
        let json = serde_json::to_string(&one).unwrap();
        assert!(!json.contains("\"p\""));
    }
}
