// CmsVault — Private-key ACL Module
//
// Who may decrypt a credential is decided by the DACL on the protecting
// certificate's private key, not by a separate authorization layer.
// `PrivateKeyAcl` performs read-modify-write cycles on that DACL through
// whatever store backs the key.

mod principal;
mod resolver;
mod snapshot;

pub use principal::{Caller, Principal};
pub use resolver::{
    DirectoryContext, DomainInfo, PrincipalResolver, ResolutionCache, DEFAULT_RESOLUTION_TTL,
};
pub use snapshot::{AccessEntry, AceKind, AclSnapshot, KeyRights};

use crate::error::Result;
use crate::store::{KeyHandle, StoreError};

/// Backing object store for private-key DACLs.
pub trait KeyAclStore {
    fn read_acl(&self, handle: &KeyHandle) -> std::result::Result<AclSnapshot, StoreError>;

    /// Replace the DACL. The store decides whether `caller` may change it.
    fn write_acl(
        &self,
        handle: &KeyHandle,
        acl: &AclSnapshot,
        caller: &Caller,
        action: &str,
    ) -> std::result::Result<(), StoreError>;
}

/// DACL operations on one private key at a time, on behalf of one caller.
///
/// Concurrent writers on the same key are last-writer-wins.
pub struct PrivateKeyAcl<'a, S: KeyAclStore + ?Sized> {
    store: &'a S,
    caller: &'a Caller,
}

impl<'a, S: KeyAclStore + ?Sized> PrivateKeyAcl<'a, S> {
    pub fn new(store: &'a S, caller: &'a Caller) -> Self {
        Self { store, caller }
    }

    pub fn read(&self, handle: &KeyHandle) -> Result<AclSnapshot> {
        Ok(self.store.read_acl(handle)?)
    }

    /// Add an allow entry per principal; existing entries stay.
    pub fn grant(
        &self,
        handle: &KeyHandle,
        principals: &[Principal],
        rights: KeyRights,
    ) -> Result<AclSnapshot> {
        let mut acl = self.store.read_acl(handle)?;
        let mut changed = false;
        for principal in principals {
            if acl.grant(principal.clone(), rights) {
                tracing::info!(thumbprint = %handle, principal = %principal, %rights, "Granting key access");
                changed = true;
            }
        }
        if changed {
            self.store.write_acl(handle, &acl, self.caller, "acl_granted")?;
        }
        Ok(acl)
    }

    /// Remove all entries for each principal.
    pub fn revoke(&self, handle: &KeyHandle, principals: &[Principal]) -> Result<AclSnapshot> {
        let mut acl = self.store.read_acl(handle)?;
        let mut removed = 0;
        for principal in principals {
            if principal.is_trusted_builtin() {
                tracing::warn!(
                    thumbprint = %handle,
                    principal = %principal,
                    "Revoking a trusted built-in principal; run reset to restore it"
                );
            }
            removed += acl.revoke(principal);
        }
        if removed > 0 {
            tracing::info!(thumbprint = %handle, removed, "Revoking key access");
            self.store.write_acl(handle, &acl, self.caller, "acl_revoked")?;
        }
        Ok(acl)
    }

    /// Replace the DACL with SYSTEM and Administrators at full control.
    pub fn reset(&self, handle: &KeyHandle) -> Result<AclSnapshot> {
        let mut acl = self.store.read_acl(handle)?;
        acl.reset();
        tracing::info!(thumbprint = %handle, "Resetting key DACL to trusted defaults");
        self.store.write_acl(handle, &acl, self.caller, "acl_reset")?;
        Ok(acl)
    }
}
