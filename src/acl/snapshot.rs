// CmsVault — DACL snapshots
//
// An `AclSnapshot` is the typed, ordered list of access entries on one
// private key. The serialized form is only produced and parsed at the store
// boundary (`to_bytes` / `from_bytes`).

use serde::{Deserialize, Serialize};

use crate::store::StoreError;

use super::principal::{Caller, Principal};

/// Current serialized DACL format.
const ACL_FORMAT_VERSION: u32 = 1;

/// Rights on a private key. `FullControl` includes `Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRights {
    Read,
    FullControl,
}

impl KeyRights {
    pub fn includes(self, requested: KeyRights) -> bool {
        self >= requested
    }
}

impl std::fmt::Display for KeyRights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyRights::Read => f.write_str("Read"),
            KeyRights::FullControl => f.write_str("FullControl"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AceKind {
    Allow,
    Deny,
}

/// One DACL entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEntry {
    pub principal: Principal,
    pub rights: KeyRights,
    pub kind: AceKind,
}

impl AccessEntry {
    pub fn allow(principal: Principal, rights: KeyRights) -> Self {
        Self {
            principal,
            rights,
            kind: AceKind::Allow,
        }
    }

    pub fn deny(principal: Principal, rights: KeyRights) -> Self {
        Self {
            principal,
            rights,
            kind: AceKind::Deny,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SerializedAcl {
    version: u32,
    entries: Vec<AccessEntry>,
}

/// The DACL of a private key at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclSnapshot {
    entries: Vec<AccessEntry>,
}

impl AclSnapshot {
    pub fn new(entries: Vec<AccessEntry>) -> Self {
        Self { entries }
    }

    /// SYSTEM and built-in Administrators with full control, nothing else.
    pub fn trusted_default() -> Self {
        Self::new(vec![
            AccessEntry::allow(Principal::system(), KeyRights::FullControl),
            AccessEntry::allow(Principal::administrators(), KeyRights::FullControl),
        ])
    }

    /// DACL applied to a freshly created key: the trusted set plus the creator.
    pub fn for_new_key(creator: &Principal) -> Self {
        let mut acl = Self::trusted_default();
        acl.grant(creator.clone(), KeyRights::FullControl);
        acl
    }

    pub fn entries(&self) -> &[AccessEntry] {
        &self.entries
    }

    pub fn entries_for<'a>(&'a self, principal: &'a Principal) -> impl Iterator<Item = &'a AccessEntry> {
        self.entries.iter().filter(move |e| &e.principal == principal)
    }

    /// Add an allow entry unless an allow entry with equal or stronger
    /// rights already exists. Existing entries are never removed.
    /// Returns true if the DACL changed.
    pub fn grant(&mut self, principal: Principal, rights: KeyRights) -> bool {
        let covered = self
            .entries_for(&principal)
            .any(|e| e.kind == AceKind::Allow && e.rights.includes(rights));
        if covered {
            return false;
        }
        self.entries.push(AccessEntry::allow(principal, rights));
        true
    }

    /// Add a deny entry.
    pub fn deny(&mut self, principal: Principal, rights: KeyRights) {
        self.entries.push(AccessEntry::deny(principal, rights));
    }

    /// Remove every entry (allow and deny) for `principal`.
    /// Returns the number of entries removed.
    pub fn revoke(&mut self, principal: &Principal) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| &e.principal != principal);
        before - self.entries.len()
    }

    /// Purge every entry and re-establish exactly the trusted set.
    pub fn reset(&mut self) {
        *self = Self::trusted_default();
    }

    /// Evaluate the DACL for `caller`. A matching deny entry wins over any
    /// allow entry; no matching allow entry means no access.
    pub fn allows(&self, caller: &Caller, requested: KeyRights) -> bool {
        let applicable = |e: &&AccessEntry| caller.matches(&e.principal);

        // Both rights levels overlap on Read, so any applicable deny blocks.
        let denied = self
            .entries
            .iter()
            .filter(applicable)
            .any(|e| e.kind == AceKind::Deny);
        if denied {
            return false;
        }

        self.entries
            .iter()
            .filter(applicable)
            .any(|e| e.kind == AceKind::Allow && e.rights.includes(requested))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(&SerializedAcl {
            version: ACL_FORMAT_VERSION,
            entries: self.entries.clone(),
        })?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let parsed: SerializedAcl = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Corrupt(format!("DACL: {}", e)))?;
        if parsed.version != ACL_FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported DACL format version {}",
                parsed.version
            )));
        }
        Ok(Self::new(parsed.entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Principal {
        Principal::account("CORP", "alice")
    }

    #[test]
    fn test_reset_leaves_exactly_trusted_set() {
        let mut acl = AclSnapshot::for_new_key(&alice());
        acl.grant(Principal::account("CORP", "bob"), KeyRights::Read);
        acl.deny(Principal::everyone(), KeyRights::Read);

        acl.reset();

        assert_eq!(acl.entries().len(), 2);
        assert!(acl
            .entries()
            .iter()
            .all(|e| e.principal.is_trusted_builtin()
                && e.rights == KeyRights::FullControl
                && e.kind == AceKind::Allow));
    }

    #[test]
    fn test_grant_is_idempotent_and_keeps_existing_entries() {
        let mut acl = AclSnapshot::trusted_default();
        assert!(acl.grant(alice(), KeyRights::Read));
        assert!(!acl.grant(alice(), KeyRights::Read));
        assert_eq!(acl.entries().len(), 3);

        // Stronger grant adds an entry, weaker one is already covered
        assert!(acl.grant(alice(), KeyRights::FullControl));
        assert!(!acl.grant(alice(), KeyRights::Read));
        assert_eq!(acl.entries_for(&alice()).count(), 2);
    }

    #[test]
    fn test_revoke_removes_all_entries_for_principal() {
        let mut acl = AclSnapshot::trusted_default();
        acl.grant(alice(), KeyRights::Read);
        acl.deny(alice(), KeyRights::FullControl);

        assert_eq!(acl.revoke(&alice()), 2);
        assert_eq!(acl.entries_for(&alice()).count(), 0);
        assert_eq!(acl.revoke(&alice()), 0);
    }

    #[test]
    fn test_allows_requires_matching_allow_entry() {
        let mut acl = AclSnapshot::trusted_default();
        let caller = Caller::new(alice());
        assert!(!acl.allows(&caller, KeyRights::Read));

        acl.grant(alice(), KeyRights::Read);
        assert!(acl.allows(&caller, KeyRights::Read));
        assert!(!acl.allows(&caller, KeyRights::FullControl));
    }

    #[test]
    fn test_group_grant_applies_to_members() {
        let mut acl = AclSnapshot::trusted_default();
        acl.grant(Principal::everyone(), KeyRights::Read);
        assert!(acl.allows(&Caller::new(alice()), KeyRights::Read));
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let mut acl = AclSnapshot::trusted_default();
        acl.grant(Principal::everyone(), KeyRights::Read);
        acl.deny(alice(), KeyRights::Read);

        assert!(!acl.allows(&Caller::new(alice()), KeyRights::Read));
        assert!(acl.allows(&Caller::new(Principal::account("CORP", "bob")), KeyRights::Read));
    }

    #[test]
    fn test_administrators_read_through_group_entry() {
        let acl = AclSnapshot::trusted_default();
        assert!(acl.allows(&Caller::administrator(alice()), KeyRights::Read));
        assert!(acl.allows(&Caller::system(), KeyRights::FullControl));
    }

    #[test]
    fn test_bytes_round_trip_and_version_check() {
        let mut acl = AclSnapshot::for_new_key(&alice());
        acl.deny(Principal::everyone(), KeyRights::Read);
        let parsed = AclSnapshot::from_bytes(&acl.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, acl);

        let future = br#"{"version":9,"entries":[]}"#;
        assert!(AclSnapshot::from_bytes(future).is_err());
        assert!(AclSnapshot::from_bytes(b"not json").is_err());
    }
}
