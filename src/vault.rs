// CmsVault — Local vault
//
// One open certificate store, the credential directory, a principal resolver
// and the caller, bundled so every operation runs against the same context.
// This is what the dispatcher runs in-process for the local host, and what
// the agent runs on behalf of a remote dispatcher.

use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::access::{AccessCoordinator, AccessReport, CertificateTarget};
use crate::acl::{Caller, PrincipalResolver, ResolutionCache};
use crate::codec::Secret;
use crate::config::Settings;
use crate::dispatch::{Operation, OperationOutput, OperationRunner};
use crate::enclave::EnclaveError;
use crate::error::Result;
use crate::files::CredentialFileStore;
use crate::lifecycle::{
    CredentialLifecycle, Inventory, ProtectOptions, ProtectOutcome, RemoveOutcome, SecretSource,
};
use crate::store::{AuditEntry, Database, Identity, SqliteCertificateStore, StoreError};

pub struct Vault {
    db: Database,
    files: CredentialFileStore,
    resolver: PrincipalResolver,
    caller: Caller,
}

impl Vault {
    /// Create the master secret, the certificate store and the credential
    /// directory. Safe to run again on an initialized host.
    pub fn init(settings: &Settings) -> Result<PathBuf> {
        std::fs::create_dir_all(&settings.store_dir)?;
        std::fs::create_dir_all(&settings.credential_dir)?;

        let key = settings.key_provider().store_key_hex()?;
        let path = settings.store_path();
        Database::open(&path, &key)?;

        tracing::info!(path = %path.display(), "Certificate store initialized");
        Ok(path)
    }

    /// Open an initialized store as the current user.
    pub fn open(settings: &Settings) -> Result<Self> {
        let provider = settings.key_provider();
        let path = settings.store_path();
        if !provider.has_master_secret()? {
            return Err(EnclaveError::MasterSecretNotFound.into());
        }
        if !path.is_file() {
            return Err(StoreError::NotInitialized.into());
        }

        let key = provider.store_key_hex()?;
        let db = Database::open(&path, &key)?;
        let resolver = PrincipalResolver::new(settings.directory_context(), ResolutionCache::default());
        let caller = settings.caller(&resolver)?;
        tracing::debug!(caller = %caller, host = %settings.host.short_name(), "Vault opened");

        Ok(Self::from_parts(
            db,
            CredentialFileStore::new(&settings.credential_dir),
            resolver,
            caller,
        ))
    }

    pub fn from_parts(
        db: Database,
        files: CredentialFileStore,
        resolver: PrincipalResolver,
        caller: Caller,
    ) -> Self {
        Self {
            db,
            files,
            resolver,
            caller,
        }
    }

    fn store(&self) -> SqliteCertificateStore<'_> {
        SqliteCertificateStore::new(&self.db)
    }

    fn lifecycle<'s>(
        &'s self,
        store: &'s SqliteCertificateStore<'s>,
    ) -> CredentialLifecycle<'s, SqliteCertificateStore<'s>> {
        CredentialLifecycle::new(store, self.files.clone(), &self.caller)
    }

    fn access<'s>(
        &'s self,
        store: &'s SqliteCertificateStore<'s>,
    ) -> AccessCoordinator<'s, SqliteCertificateStore<'s>> {
        AccessCoordinator::new(store, &self.resolver, &self.caller)
    }

    pub fn protect(
        &self,
        identity: &Identity,
        secret: &Secret,
        options: &ProtectOptions,
    ) -> Result<ProtectOutcome> {
        let store = self.store();
        self.lifecycle(&store).protect(identity, secret, options)
    }

    pub fn get(&self, source: &SecretSource) -> Result<Secret> {
        let store = self.store();
        self.lifecycle(&store).get(source)
    }

    pub fn remove(&self, identity: &Identity, retain: usize) -> Result<RemoveOutcome> {
        let store = self.store();
        self.lifecycle(&store).remove(identity, retain)
    }

    pub fn show(&self, identity: Option<&Identity>) -> Result<Inventory> {
        let store = self.store();
        self.lifecycle(&store).show(identity)
    }

    pub fn grant(&self, target: &CertificateTarget, principals: &[String]) -> Result<AccessReport> {
        let store = self.store();
        self.access(&store).grant(target, principals)
    }

    pub fn revoke(&self, target: &CertificateTarget, principals: &[String]) -> Result<AccessReport> {
        let store = self.store();
        self.access(&store).revoke(target, principals)
    }

    pub fn reset(&self, target: &CertificateTarget, confirmed: bool) -> Result<AccessReport> {
        let store = self.store();
        self.access(&store).reset(target, confirmed)
    }

    pub fn show_access(&self, target: &CertificateTarget) -> Result<AccessReport> {
        let store = self.store();
        self.access(&store).show_access(target)
    }

    pub fn export_private_key(&self, target: &CertificateTarget) -> Result<Zeroizing<String>> {
        let store = self.store();
        self.access(&store).export_private_key(target)
    }

    pub fn audit_log(&self, target: &CertificateTarget) -> Result<Vec<AuditEntry>> {
        let store = self.store();
        self.access(&store).audit_log(target)
    }
}

impl OperationRunner for Vault {
    fn run(&self, operation: &Operation) -> Result<OperationOutput> {
        match operation {
            Operation::Protect {
                identity,
                secret,
                options,
            } => self.protect(identity, secret, options).map(OperationOutput::Protected),
            Operation::Remove { identity, retain } => {
                self.remove(identity, *retain).map(OperationOutput::Removed)
            }
            Operation::Show { identity } => self.show(identity.as_ref()).map(OperationOutput::Inventory),
            Operation::Grant { target, principals } => {
                self.grant(target, principals).map(OperationOutput::Access)
            }
            Operation::Revoke { target, principals } => {
                self.revoke(target, principals).map(OperationOutput::Access)
            }
            Operation::Reset { target, confirmed } => {
                self.reset(target, *confirmed).map(OperationOutput::Access)
            }
            Operation::ShowAccess { target } => self.show_access(target).map(OperationOutput::Access),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
