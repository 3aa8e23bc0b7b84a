// CmsVault — Principals and Callers
//
// A principal is either a well-known SID or an account qualified by its
// authority (`DOMAIN\name`). Equality is by canonical id only, so the same
// account spelled with different casing compares equal.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

pub const SID_SYSTEM: &str = "S-1-5-18";
pub const SID_ADMINISTRATORS: &str = "S-1-5-32-544";
pub const SID_USERS: &str = "S-1-5-32-545";
pub const SID_EVERYONE: &str = "S-1-1-0";
pub const SID_AUTHENTICATED_USERS: &str = "S-1-5-11";
pub const SID_LOCAL_SERVICE: &str = "S-1-5-19";
pub const SID_NETWORK_SERVICE: &str = "S-1-5-20";

/// Built-in principals that resolve on every host: (sid, display name, aliases).
pub(crate) const BUILTIN_PRINCIPALS: &[(&str, &str, &[&str])] = &[
    (
        SID_SYSTEM,
        "NT AUTHORITY\\SYSTEM",
        &["SYSTEM", "NT AUTHORITY\\SYSTEM", "LocalSystem", "Local System"],
    ),
    (
        SID_ADMINISTRATORS,
        "BUILTIN\\Administrators",
        &["Administrators", "BUILTIN\\Administrators"],
    ),
    (SID_USERS, "BUILTIN\\Users", &["Users", "BUILTIN\\Users"]),
    (SID_EVERYONE, "Everyone", &["Everyone", "World"]),
    (
        SID_AUTHENTICATED_USERS,
        "NT AUTHORITY\\Authenticated Users",
        &["Authenticated Users", "NT AUTHORITY\\Authenticated Users"],
    ),
    (
        SID_LOCAL_SERVICE,
        "NT AUTHORITY\\LOCAL SERVICE",
        &["LOCAL SERVICE", "NT AUTHORITY\\LOCAL SERVICE"],
    ),
    (
        SID_NETWORK_SERVICE,
        "NT AUTHORITY\\NETWORK SERVICE",
        &["NETWORK SERVICE", "NT AUTHORITY\\NETWORK SERVICE"],
    ),
];

/// Group names that only exist in an Active Directory domain.
pub(crate) const DOMAIN_ONLY_GROUPS: &[&str] = &[
    "Domain Admins",
    "Domain Users",
    "Domain Computers",
    "Domain Controllers",
    "Enterprise Admins",
];

/// A resolved security principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    id: String,
    name: String,
}

impl Principal {
    /// Principal for a SID string. Well-known SIDs get their display name.
    pub fn from_sid(sid: &str) -> Self {
        let canonical = sid.trim().to_ascii_uppercase();
        let name = BUILTIN_PRINCIPALS
            .iter()
            .find(|(known, _, _)| *known == canonical)
            .map(|(_, name, _)| name.to_string())
            .unwrap_or_else(|| canonical.clone());
        Self {
            id: canonical,
            name,
        }
    }

    /// Account principal `DOMAIN\name`.
    pub fn account(authority: &str, name: &str) -> Self {
        let authority = authority.trim().to_ascii_uppercase();
        let name = name.trim();
        Self {
            id: format!("{}\\{}", authority, name.to_lowercase()),
            name: format!("{}\\{}", authority, name),
        }
    }

    pub fn system() -> Self {
        Self::from_sid(SID_SYSTEM)
    }

    pub fn administrators() -> Self {
        Self::from_sid(SID_ADMINISTRATORS)
    }

    pub fn everyone() -> Self {
        Self::from_sid(SID_EVERYONE)
    }

    pub fn authenticated_users() -> Self {
        Self::from_sid(SID_AUTHENTICATED_USERS)
    }

    /// Canonical identifier used for comparisons and storage.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_system(&self) -> bool {
        self.id == SID_SYSTEM
    }

    pub fn is_administrators(&self) -> bool {
        self.id == SID_ADMINISTRATORS
    }

    /// SYSTEM or built-in Administrators.
    pub fn is_trusted_builtin(&self) -> bool {
        self.is_system() || self.is_administrators()
    }
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Principal {}

impl Hash for Principal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ─── Caller ──────────────────────────────────────────────────────────────────

/// The principal on whose behalf store operations run, with its groups.
#[derive(Debug, Clone)]
pub struct Caller {
    principal: Principal,
    groups: Vec<Principal>,
}

impl Caller {
    /// A caller with the implicit Everyone and Authenticated Users memberships.
    pub fn new(principal: Principal) -> Self {
        let mut caller = Self {
            principal,
            groups: vec![Principal::everyone(), Principal::authenticated_users()],
        };
        if caller.principal.is_system() {
            caller = caller.with_group(Principal::administrators());
        }
        caller
    }

    #[cfg(test)]
    pub fn system() -> Self {
        Self::new(Principal::system())
    }

    /// A member of built-in Administrators.
    pub fn administrator(principal: Principal) -> Self {
        Self::new(principal).with_group(Principal::administrators())
    }

    pub fn with_group(mut self, group: Principal) -> Self {
        if !self.groups.contains(&group) && group != self.principal {
            self.groups.push(group);
        }
        self
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn groups(&self) -> &[Principal] {
        &self.groups
    }

    /// The caller's own principal followed by all its groups.
    pub fn identities(&self) -> impl Iterator<Item = &Principal> {
        std::iter::once(&self.principal).chain(self.groups.iter())
    }

    pub fn matches(&self, principal: &Principal) -> bool {
        self.identities().any(|p| p == principal)
    }

    pub fn is_system(&self) -> bool {
        self.principal.is_system()
    }

    pub fn is_administrator(&self) -> bool {
        self.is_system() || self.groups.iter().any(Principal::is_administrators)
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_equality_ignores_name_case() {
        let a = Principal::account("corp", "User1");
        let b = Principal::account("CORP", "user1");
        assert_eq!(a, b);
        assert_eq!(a.name(), "CORP\\User1");
        assert_eq!(a.id(), "CORP\\user1");
    }

    #[test]
    fn test_well_known_sid_gets_display_name() {
        let p = Principal::from_sid("s-1-5-18");
        assert!(p.is_system());
        assert_eq!(p.name(), "NT AUTHORITY\\SYSTEM");

        let custom = Principal::from_sid("S-1-5-21-1-2-3-1001");
        assert_eq!(custom.name(), "S-1-5-21-1-2-3-1001");
        assert!(!custom.is_trusted_builtin());
    }

    #[test]
    fn test_system_caller_is_administrator() {
        let caller = Caller::system();
        assert!(caller.is_system());
        assert!(caller.is_administrator());
        assert!(caller.matches(&Principal::administrators()));
    }

    #[test]
    fn test_plain_caller_has_implicit_groups_only() {
        let caller = Caller::new(Principal::account("CORP", "alice"));
        assert!(!caller.is_administrator());
        assert!(caller.matches(&Principal::everyone()));
        assert!(caller.matches(&Principal::authenticated_users()));
        assert!(!caller.matches(&Principal::administrators()));
        assert_eq!(caller.identities().count(), 3);
    }

    #[test]
    fn test_with_group_deduplicates() {
        let caller = Caller::administrator(Principal::account("CORP", "bob"))
            .with_group(Principal::administrators());
        assert_eq!(
            caller.groups().iter().filter(|g| g.is_administrators()).count(),
            1
        );
    }
}
