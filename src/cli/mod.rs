// CmsVault — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, protect, get, remove, show, grant, revoke, reset,
// access, audit, export, agent.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::access::CertificateTarget;
use crate::config::ConfigArgs;
use crate::store::Identity;

pub use commands::execute;

/// CmsVault — certificate-protected service credentials.
#[derive(Parser, Debug)]
#[command(name = "cmsvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the store master secret, the certificate store and the credential directory.
    Init,

    /// Encrypt a credential for an identity and write it as the newest credential file.
    Protect {
        /// Identity the credential belongs to (e.g. "Zenoss").
        #[arg(value_parser = parse_identity)]
        identity: Identity,

        #[arg(long)]
        username: String,

        /// The password. Read from stdin when omitted.
        /// Prefer stdin to keep the password out of shell history.
        #[arg(long, env = "CMSVAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Use this certificate of the identity instead of the newest one.
        #[arg(long, conflicts_with = "reset")]
        thumbprint: Option<String>,

        /// Create a new certificate (rotate).
        #[arg(long)]
        reset: bool,

        /// Keep older credential files and certificates.
        #[arg(long)]
        skip_cleanup: bool,

        /// Write the credential file here instead of the credential directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Allow a newly created private key to be exported.
        #[arg(long)]
        exportable: bool,

        /// Overwrite without asking.
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        hosts: HostArgs,
    },

    /// Decrypt a credential.
    Get {
        /// Read the newest credential file of this identity.
        #[arg(value_parser = parse_identity, required_unless_present = "file")]
        identity: Option<Identity>,

        /// Read this credential file.
        #[arg(long, conflicts_with = "identity")]
        file: Option<PathBuf>,

        /// Print the username and password in clear.
        #[arg(long)]
        plain: bool,
    },

    /// Delete all but the newest credential files and certificates of an identity.
    Remove {
        #[arg(value_parser = parse_identity)]
        identity: Identity,

        /// Generations to keep.
        #[arg(long, default_value = "0")]
        retain: usize,

        #[command(flatten)]
        hosts: HostArgs,
    },

    /// List certificates and credential files.
    Show {
        /// Only this identity.
        #[arg(value_parser = parse_identity)]
        identity: Option<Identity>,

        #[command(flatten)]
        hosts: HostArgs,
    },

    /// Allow principals to read a private key.
    Grant {
        #[command(flatten)]
        target: TargetArgs,

        /// Principal to grant (repeatable, or comma-separated).
        #[arg(long = "principal", required = true, value_delimiter = ',')]
        principals: Vec<String>,

        #[command(flatten)]
        hosts: HostArgs,
    },

    /// Remove every explicit entry for principals from a private key's DACL.
    Revoke {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(long = "principal", required = true, value_delimiter = ',')]
        principals: Vec<String>,

        #[command(flatten)]
        hosts: HostArgs,
    },

    /// Replace a private key's DACL with the trusted default set.
    Reset {
        #[command(flatten)]
        target: TargetArgs,

        /// Do not ask for confirmation.
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        hosts: HostArgs,
    },

    /// Show a private key's DACL.
    Access {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        hosts: HostArgs,
    },

    /// View the audit log of a certificate.
    Audit {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Export an exportable private key as PKCS#8 PEM.
    Export {
        #[command(flatten)]
        target: TargetArgs,

        /// Write the key to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Serve JSON-RPC on stdin/stdout for a remote dispatcher.
    Agent,
}

/// Which certificate an access command applies to.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Identity whose newest certificate is used.
    #[arg(value_parser = parse_identity, required_unless_present = "thumbprint")]
    pub identity: Option<Identity>,

    /// A specific certificate.
    #[arg(long, conflicts_with = "identity")]
    pub thumbprint: Option<String>,
}

impl TargetArgs {
    pub fn target(&self) -> Option<CertificateTarget> {
        match (&self.identity, &self.thumbprint) {
            (_, Some(thumbprint)) => Some(CertificateTarget::Thumbprint(thumbprint.clone())),
            (Some(identity), None) => Some(CertificateTarget::Identity(identity.clone())),
            (None, None) => None,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct HostArgs {
    /// Run on these hosts (comma-separated). The local host runs first.
    #[arg(long, value_delimiter = ',')]
    pub hosts: Vec<String>,
}

fn parse_identity(value: &str) -> Result<Identity, String> {
    Identity::parse(value).map_err(|e| e.to_string())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_remove_defaults_to_zero_retention() {
        let cli = Cli::try_parse_from(["cmsvault", "remove", "svc"]).unwrap();
        match cli.command {
            Commands::Remove { identity, retain, hosts } => {
                assert_eq!(identity.as_str(), "svc");
                assert_eq!(retain, 0);
                assert!(hosts.hosts.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_hosts_and_principals_split_on_commas() {
        let cli = Cli::try_parse_from([
            "cmsvault", "grant", "svc", "--principal", "CORP\\a,CORP\\b", "--hosts", "web01,web02",
        ])
        .unwrap();
        match cli.command {
            Commands::Grant { target, principals, hosts } => {
                assert_eq!(target.target(), Some(CertificateTarget::Identity(Identity::parse("svc").unwrap())));
                assert_eq!(principals, vec!["CORP\\a", "CORP\\b"]);
                assert_eq!(hosts.hosts, vec!["web01", "web02"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_target_by_thumbprint() {
        let cli = Cli::try_parse_from(["cmsvault", "access", "--thumbprint", "AB12"]).unwrap();
        match cli.command {
            Commands::Access { target, .. } => {
                assert_eq!(target.target(), Some(CertificateTarget::Thumbprint("AB12".into())));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Cli::try_parse_from(["cmsvault", "access"]).is_err());
    }

    #[test]
    fn test_invalid_identity_is_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["cmsvault", "remove", "bad/name"]).is_err());
    }
}
