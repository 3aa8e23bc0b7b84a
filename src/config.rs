// CmsVault — Configuration
//
// Global command-line options, each with an environment fallback, resolved
// into `Settings`. Anything not given falls back to the platform data
// directory and what the environment says about this host and user.

use std::path::PathBuf;

use clap::Args;

use crate::acl::{Caller, DirectoryContext, DomainInfo, Principal, PrincipalResolver};
use crate::dispatch::{HostIdentity, SshExecutor, DEFAULT_REMOTE_COMMAND, DEFAULT_SSH_PROGRAM};
use crate::enclave::{KdfParams, KeyFileProvider, KeyringProvider, StoreKeyProvider};
use crate::error::{Result, VaultError};
use crate::store::STORE_FILE_NAME;

const APP_DIR: &str = "cmsvault";
const CREDENTIALS_DIR: &str = "credentials";

/// OS group whose members are treated as members of Administrators.
pub const ADMIN_GROUP: &str = "cmsvault-admins";

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Directory holding the certificate store.
    #[arg(long, global = true, env = "CMSVAULT_HOME")]
    pub store_dir: Option<PathBuf>,

    /// Directory for credential files.
    #[arg(long, global = true, env = "CMSVAULT_CREDENTIAL_DIR")]
    pub credential_dir: Option<PathBuf>,

    /// NetBIOS name of the domain this host is joined to.
    #[arg(long, global = true, env = "CMSVAULT_DOMAIN")]
    pub domain: Option<String>,

    /// DNS name of the joined domain.
    #[arg(long, global = true, env = "CMSVAULT_DOMAIN_DNS")]
    pub domain_dns: Option<String>,

    /// Short name of this host.
    #[arg(long, global = true, env = "CMSVAULT_HOST")]
    pub host_name: Option<String>,

    #[arg(long, global = true, env = "CMSVAULT_HOST_FQDN")]
    pub host_fqdn: Option<String>,

    /// Keep the store master secret in this file instead of the keyring.
    #[arg(long, global = true, env = "CMSVAULT_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// SSH client used to reach remote hosts.
    #[arg(long = "ssh", global = true, env = "CMSVAULT_SSH", default_value = DEFAULT_SSH_PROGRAM)]
    pub ssh_program: String,

    /// Command that starts the agent on a remote host.
    #[arg(long, global = true, env = "CMSVAULT_REMOTE_COMMAND", default_value = DEFAULT_REMOTE_COMMAND)]
    pub remote_command: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub store_dir: PathBuf,
    pub credential_dir: PathBuf,
    pub host: HostIdentity,
    pub domain: Option<DomainInfo>,
    pub key_file: Option<PathBuf>,
    pub kdf: KdfParams,
    pub ssh_program: String,
    pub remote_command: String,
}

impl Settings {
    pub fn from_args(args: ConfigArgs) -> Self {
        let store_dir = args.store_dir.unwrap_or_else(default_store_dir);
        let credential_dir = args
            .credential_dir
            .unwrap_or_else(|| store_dir.join(CREDENTIALS_DIR));
        let host = host_identity(args.host_name, args.host_fqdn);
        let domain = args.domain.filter(|d| !d.trim().is_empty()).map(|netbios| DomainInfo {
            netbios: netbios.trim().to_uppercase(),
            dns: args.domain_dns.filter(|d| !d.trim().is_empty()),
        });

        Self {
            store_dir,
            credential_dir,
            host,
            domain,
            key_file: args.key_file,
            kdf: KdfParams::default(),
            ssh_program: args.ssh_program,
            remote_command: args.remote_command,
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_dir.join(STORE_FILE_NAME)
    }

    pub fn directory_context(&self) -> DirectoryContext {
        match &self.domain {
            Some(domain) => DirectoryContext::joined(self.host.short_name(), domain.clone()),
            None => DirectoryContext::local(self.host.short_name()),
        }
    }

    pub fn key_provider(&self) -> Box<dyn StoreKeyProvider> {
        match &self.key_file {
            Some(path) => Box::new(KeyFileProvider::new(path).with_params(self.kdf)),
            None => Box::new(KeyringProvider::new()),
        }
    }

    pub fn remote_executor(&self) -> SshExecutor {
        SshExecutor::new(&self.ssh_program, &self.remote_command)
    }

    /// The caller for the account this process runs as.
    pub fn caller(&self, resolver: &PrincipalResolver) -> Result<Caller> {
        Ok(caller_for(&ProcessAccount::current()?, resolver))
    }
}

/// The account this process runs as, as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessAccount {
    pub name: String,
    pub superuser: bool,
    pub groups: Vec<String>,
}

impl ProcessAccount {
    /// Effective uid and group memberships. The environment is never consulted.
    #[cfg(unix)]
    pub fn current() -> Result<Self> {
        use nix::unistd::{geteuid, Group, User};

        let uid = geteuid();
        let name = match User::from_uid(uid) {
            Ok(Some(user)) => user.name,
            Ok(None) => uid.to_string(),
            Err(e) => {
                return Err(VaultError::InvalidArgument(format!(
                    "cannot look up uid {}: {}",
                    uid, e
                )))
            }
        };

        let mut groups: Vec<String> = Vec::new();
        for gid in process_gids() {
            if let Ok(Some(group)) = Group::from_gid(gid) {
                if !groups.contains(&group.name) {
                    groups.push(group.name);
                }
            }
        }

        Ok(Self {
            name,
            superuser: uid.is_root(),
            groups,
        })
    }

    #[cfg(not(unix))]
    pub fn current() -> Result<Self> {
        Err(VaultError::InvalidArgument(
            "caller identity is only available on Unix hosts".into(),
        ))
    }
}

#[cfg(target_os = "linux")]
fn process_gids() -> Vec<nix::unistd::Gid> {
    let mut gids = nix::unistd::getgroups().unwrap_or_default();
    gids.push(nix::unistd::getegid());
    gids
}

#[cfg(all(unix, not(target_os = "linux")))]
fn process_gids() -> Vec<nix::unistd::Gid> {
    vec![nix::unistd::getegid()]
}

/// Accounts and groups are qualified with the directory's default authority
/// directly, so an account named like a built-in never maps onto it.
/// Administrators are uid 0 and members of `ADMIN_GROUP`.
pub fn caller_for(account: &ProcessAccount, resolver: &PrincipalResolver) -> Caller {
    let authority = resolver.context().default_authority();
    let principal = Principal::account(authority, &account.name);

    let mut is_admin = account.superuser;
    let mut groups = Vec::with_capacity(account.groups.len());
    for group in &account.groups {
        if group == ADMIN_GROUP {
            is_admin = true;
        }
        groups.push(Principal::account(authority, group));
    }

    let mut caller = if is_admin {
        Caller::administrator(principal)
    } else {
        Caller::new(principal)
    };
    for group in groups {
        caller = caller.with_group(group);
    }
    tracing::debug!(caller = %caller, administrator = caller.is_administrator(), "Resolved caller");
    caller
}

fn default_store_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Explicit names win; otherwise the environment, then `/etc/hostname`.
/// A dotted name supplies the FQDN and its first label the short name.
fn host_identity(short_name: Option<String>, fqdn: Option<String>) -> HostIdentity {
    let detected = short_name
        .filter(|h| !h.trim().is_empty())
        .or_else(|| env_non_empty("HOSTNAME"))
        .or_else(|| env_non_empty("COMPUTERNAME"))
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string());
    let detected = detected.trim().to_string();

    match detected.split_once('.') {
        Some((short, _)) => HostIdentity::new(short, fqdn.or(Some(detected.clone()))),
        None => HostIdentity::new(detected, fqdn),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
