// CmsVault — Principal resolution
//
// Turns the names callers type (`CORP\svc`, `svc@corp.example.com`, `svc`,
// `Administrators`, `S-1-5-18`) into canonical principals. Lookups are
// memoized in a `ResolutionCache` owned by whoever builds the resolver.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Result, VaultError};

use super::principal::{Principal, BUILTIN_PRINCIPALS, DOMAIN_ONLY_GROUPS};

/// Default lifetime of a cached resolution.
pub const DEFAULT_RESOLUTION_TTL: Duration = Duration::from_secs(300);

/// The Active Directory domain this host is joined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    /// NetBIOS name, e.g. `CORP`.
    pub netbios: String,
    /// DNS name, e.g. `corp.example.com`.
    pub dns: Option<String>,
}

/// Naming context a resolver works in.
#[derive(Debug, Clone)]
pub struct DirectoryContext {
    /// Short name of the local host; authority for local accounts.
    pub local_host: String,
    pub domain: Option<DomainInfo>,
}

impl DirectoryContext {
    pub fn local(host: &str) -> Self {
        Self {
            local_host: host.to_string(),
            domain: None,
        }
    }

    pub fn joined(host: &str, domain: DomainInfo) -> Self {
        Self {
            local_host: host.to_string(),
            domain: Some(domain),
        }
    }

    /// Authority for bare names: the domain when joined, else the local host.
    pub fn default_authority(&self) -> &str {
        self.domain
            .as_ref()
            .map(|d| d.netbios.as_str())
            .unwrap_or(self.local_host.as_str())
    }

    /// Map an authority spelled as NetBIOS, DNS name or `.` to its canonical form.
    fn canonical_authority(&self, authority: &str) -> Option<String> {
        if authority == "." || authority.eq_ignore_ascii_case(&self.local_host) {
            return Some(self.local_host.clone());
        }
        let domain = self.domain.as_ref()?;
        let matches_dns = domain
            .dns
            .as_deref()
            .is_some_and(|dns| dns.eq_ignore_ascii_case(authority));
        if authority.eq_ignore_ascii_case(&domain.netbios) || matches_dns {
            return Some(domain.netbios.clone());
        }
        None
    }
}

/// Memoized name → principal lookups with a time-to-live.
pub struct ResolutionCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Principal)>>,
}

impl ResolutionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, key: &str) -> Option<Principal> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((at, principal)) if at.elapsed() < self.ttl => Some(principal.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert(&self, key: String, principal: Principal) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, (Instant::now(), principal));
        }
    }

    /// Drop every cached resolution.
    pub fn reset(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION_TTL)
    }
}

/// Resolves principal names against a `DirectoryContext`.
pub struct PrincipalResolver {
    context: DirectoryContext,
    cache: ResolutionCache,
}

impl PrincipalResolver {
    pub fn new(context: DirectoryContext, cache: ResolutionCache) -> Self {
        Self { context, cache }
    }

    pub fn context(&self) -> &DirectoryContext {
        &self.context
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn resolve_all(&self, names: &[String]) -> Result<Vec<Principal>> {
        names.iter().map(|n| self.resolve(n)).collect()
    }

    pub fn resolve(&self, name: &str) -> Result<Principal> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(VaultError::unresolved(name, "empty principal name"));
        }

        let key = trimmed.to_lowercase();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let principal = self.resolve_uncached(trimmed)?;
        tracing::debug!(input = %trimmed, principal = %principal, "Resolved principal");
        self.cache.insert(key, principal.clone());
        Ok(principal)
    }

    fn resolve_uncached(&self, name: &str) -> Result<Principal> {
        // Already-resolved identifier
        if is_sid(name) {
            return Ok(Principal::from_sid(name));
        }

        if let Some(builtin) = lookup_builtin(name) {
            return Ok(builtin);
        }

        if let Some(group) = DOMAIN_ONLY_GROUPS
            .iter()
            .find(|g| g.eq_ignore_ascii_case(name))
        {
            return match &self.context.domain {
                Some(domain) => Ok(Principal::account(&domain.netbios, group)),
                None => Err(VaultError::unresolved(
                    name,
                    "domain group names only resolve on domain-joined hosts",
                )),
            };
        }

        if let Some((authority, account)) = name.split_once('\\') {
            return self.qualified(name, authority, account);
        }

        if let Some((account, suffix)) = name.rsplit_once('@') {
            return self.qualified(name, suffix, account);
        }

        Ok(Principal::account(self.context.default_authority(), name))
    }

    fn qualified(&self, input: &str, authority: &str, account: &str) -> Result<Principal> {
        if authority.is_empty() || account.is_empty() || account.contains('\\') {
            return Err(VaultError::unresolved(input, "malformed account name"));
        }

        // `DOMAIN\Domain Admins` and friends
        if let Some(group) = DOMAIN_ONLY_GROUPS
            .iter()
            .find(|g| g.eq_ignore_ascii_case(account))
        {
            if self.context.domain.is_none() {
                return Err(VaultError::unresolved(
                    input,
                    "domain group names only resolve on domain-joined hosts",
                ));
            }
            return match self.context.canonical_authority(authority) {
                Some(canonical) => Ok(Principal::account(&canonical, group)),
                None => Err(VaultError::unresolved(input, "unknown domain")),
            };
        }

        match self.context.canonical_authority(authority) {
            Some(canonical) => Ok(Principal::account(&canonical, account)),
            // Trusted domains we cannot enumerate keep their spelling, but a
            // DNS-style suffix we don't know cannot be mapped to an authority.
            None if !authority.contains('.') => Ok(Principal::account(authority, account)),
            None => Err(VaultError::unresolved(
                input,
                format!("unknown domain '{}'", authority),
            )),
        }
    }
}

fn lookup_builtin(name: &str) -> Option<Principal> {
    BUILTIN_PRINCIPALS
        .iter()
        .find(|(_, _, aliases)| aliases.iter().any(|a| a.eq_ignore_ascii_case(name)))
        .map(|(sid, _, _)| Principal::from_sid(sid))
}

/// `S-1-<authority>(-<sub>)*` with decimal components.
fn is_sid(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    let Some(rest) = upper.strip_prefix("S-1-") else {
        return false;
    };
    !rest.is_empty()
        && rest
            .split('-')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}
