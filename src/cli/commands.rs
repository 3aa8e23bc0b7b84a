// CmsVault — CLI Command Handlers
//
// Each function handles one CLI subcommand. Commands that accept `--hosts`
// build an `Operation` and hand it to the `HostDispatcher`; the local store
// is opened only if the local host is actually part of the run.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::access::{AccessReport, CertificateTarget};
use crate::codec::Secret;
use crate::config::Settings;
use crate::dispatch::{HostDispatcher, HostResult, Operation, OperationOutput, OperationRunner};
use crate::error::{Result, VaultError};
use crate::gateway::Agent;
use crate::lifecycle::{Inventory, ProtectOptions, ProtectOutcome, RemoveOutcome, SecretSource};
use crate::store::{Identity, StoreError};
use crate::vault::Vault;

use zeroize::Zeroizing;

use super::{Cli, Commands, TargetArgs};

/// Execute the parsed CLI command.
pub fn execute(cli: Cli) -> Result<()> {
    let settings = Settings::from_args(cli.config);
    let json = cli.json;

    match cli.command {
        Commands::Init => cmd_init(&settings),
        Commands::Protect {
            identity,
            username,
            password,
            thumbprint,
            reset,
            skip_cleanup,
            output_dir,
            exportable,
            force,
            hosts,
        } => {
            let password = match password {
                Some(password) => password,
                None => read_password(&username)?,
            };
            let options = ProtectOptions {
                thumbprint,
                reset,
                skip_cleanup,
                output_dir,
                overwrite: force,
                exportable,
            };
            cmd_protect(&settings, identity, Secret::new(username, password), options, &hosts.hosts, json)
        }
        Commands::Get {
            identity,
            file,
            plain,
        } => {
            let source = match (identity, file) {
                (_, Some(path)) => SecretSource::File(path),
                (Some(identity), None) => SecretSource::Identity(identity),
                (None, None) => {
                    return Err(VaultError::InvalidArgument("an identity or --file is required".into()))
                }
            };
            cmd_get(&settings, &source, plain, json)
        }
        Commands::Remove {
            identity,
            retain,
            hosts,
        } => run_and_print(&settings, &Operation::Remove { identity, retain }, &hosts.hosts, json),
        Commands::Show { identity, hosts } => {
            run_and_print(&settings, &Operation::Show { identity }, &hosts.hosts, json)
        }
        Commands::Grant {
            target,
            principals,
            hosts,
        } => {
            let operation = Operation::Grant {
                target: target_of(&target)?,
                principals,
            };
            run_and_print(&settings, &operation, &hosts.hosts, json)
        }
        Commands::Revoke {
            target,
            principals,
            hosts,
        } => {
            let operation = Operation::Revoke {
                target: target_of(&target)?,
                principals,
            };
            run_and_print(&settings, &operation, &hosts.hosts, json)
        }
        Commands::Reset {
            target,
            force,
            hosts,
        } => cmd_reset(&settings, target_of(&target)?, force, &hosts.hosts, json),
        Commands::Access { target, hosts } => {
            let operation = Operation::ShowAccess {
                target: target_of(&target)?,
            };
            run_and_print(&settings, &operation, &hosts.hosts, json)
        }
        Commands::Audit { target } => cmd_audit(&settings, &target_of(&target)?, json),
        Commands::Export { target, out } => cmd_export(&settings, &target_of(&target)?, out),
        Commands::Agent => cmd_agent(&settings),
    }
}

fn target_of(args: &TargetArgs) -> Result<CertificateTarget> {
    args.target()
        .ok_or_else(|| VaultError::InvalidArgument("an identity or --thumbprint is required".into()))
}

// ─── Local runner ────────────────────────────────────────────────────────────

/// Opens the local vault on first use, so remote-only runs work on hosts
/// without a local store.
struct LocalRunner<'a> {
    settings: &'a Settings,
    vault: RefCell<Option<Vault>>,
}

impl<'a> LocalRunner<'a> {
    fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            vault: RefCell::new(None),
        }
    }
}

impl OperationRunner for LocalRunner<'_> {
    fn run(&self, operation: &Operation) -> Result<OperationOutput> {
        let mut slot = self.vault.borrow_mut();
        if slot.is_none() {
            *slot = Some(Vault::open(self.settings)?);
        }
        match slot.as_ref() {
            Some(vault) => vault.run(operation),
            None => Err(StoreError::NotInitialized.into()),
        }
    }
}

fn dispatch(settings: &Settings, operation: &Operation, hosts: &[String]) -> Result<Vec<HostResult>> {
    let runner = LocalRunner::new(settings);
    let remote = settings.remote_executor();
    HostDispatcher::new(&settings.host, &runner, &remote).dispatch(operation, hosts)
}

fn run_and_print(settings: &Settings, operation: &Operation, hosts: &[String], json: bool) -> Result<()> {
    let results = dispatch(settings, operation, hosts)?;
    print_results(&results, json)
}

// ─── Init ────────────────────────────────────────────────────────────────────

fn cmd_init(settings: &Settings) -> Result<()> {
    let path = Vault::init(settings)?;

    println!("✓ CmsVault initialized");
    println!("  Certificate store: {}", path.display());
    println!("  Credential files:  {}", settings.credential_dir.display());
    match &settings.key_file {
        Some(key_file) => println!("  Master secret in key file {}", key_file.display()),
        None => println!("  Master secret stored in platform keyring"),
    }
    println!();
    println!("Next: protect a credential with `cmsvault protect <identity> --username <name>`");
    Ok(())
}

// ─── Protect & Get ───────────────────────────────────────────────────────────

fn cmd_protect(
    settings: &Settings,
    identity: Identity,
    secret: Secret,
    mut options: ProtectOptions,
    hosts: &[String],
    json: bool,
) -> Result<()> {
    let build = |options: &ProtectOptions| Operation::Protect {
        identity: identity.clone(),
        secret: secret.clone(),
        options: options.clone(),
    };

    let results = match dispatch(settings, &build(&options), hosts) {
        Ok(results) => results,
        Err(e) if !options.overwrite => {
            let Some(prompt) = e.confirmation_prompt() else {
                return Err(e);
            };
            if !confirm(prompt)? {
                println!("Aborted.");
                return Ok(());
            }
            options.overwrite = true;
            dispatch(settings, &build(&options), hosts)?
        }
        Err(e) => return Err(e),
    };
    print_results(&results, json)
}

fn cmd_get(settings: &Settings, source: &SecretSource, plain: bool, json: bool) -> Result<()> {
    let vault = Vault::open(settings)?;
    let secret = vault.get(source)?;
    println!("{}", render_secret(&secret, plain, json)?.as_str());
    Ok(())
}

/// The password is only included with `--plain`.
fn render_secret(secret: &Secret, plain: bool, json: bool) -> Result<Zeroizing<String>> {
    let text = match (plain, json) {
        (true, true) => String::from_utf8_lossy(&secret.to_canonical_json()?).into_owned(),
        (true, false) => format!(
            "Username: {}\nPassword: {}",
            secret.username(),
            secret.password()
        ),
        (false, true) => {
            serde_json::json!({ "Username": secret.username(), "Password": "[REDACTED]" }).to_string()
        }
        (false, false) => format!(
            "Username: {}\nPassword: [REDACTED] (use --plain to print it)",
            secret.username()
        ),
    };
    Ok(Zeroizing::new(text))
}

/// Read the password from stdin, prompting on stderr.
fn read_password(username: &str) -> Result<String> {
    eprint!("Password for {}: ", username);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(VaultError::InvalidArgument("password must not be empty".into()));
    }
    Ok(password)
}

// ─── Access ──────────────────────────────────────────────────────────────────

fn cmd_reset(
    settings: &Settings,
    target: CertificateTarget,
    force: bool,
    hosts: &[String],
    json: bool,
) -> Result<()> {
    if !force {
        let prompt = format!(
            "Replace the private-key ACL of {} with the trusted default set?",
            target
        );
        if !confirm(&prompt)? {
            println!("Aborted.");
            return Ok(());
        }
    }
    let operation = Operation::Reset {
        target,
        confirmed: true,
    };
    run_and_print(settings, &operation, hosts, json)
}

fn cmd_audit(settings: &Settings, target: &CertificateTarget, json: bool) -> Result<()> {
    let vault = Vault::open(settings)?;
    let entries = vault.audit_log(target)?;

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No audit entries for {}", target);
        return Ok(());
    }

    println!("Audit log for {}", target);
    println!("{:-<80}", "");
    println!("{:<32} | {:<20} | {:<24}", "Timestamp", "Action", "Actor");
    println!("{:-<80}", "");
    for entry in &entries {
        println!(
            "{:<32} | {:<20} | {:<24}",
            entry.timestamp.to_rfc3339(),
            entry.action,
            entry.actor
        );
        if let Some(details) = &entry.details {
            println!("  {}", details);
        }
    }
    Ok(())
}

fn cmd_export(settings: &Settings, target: &CertificateTarget, out: Option<PathBuf>) -> Result<()> {
    let vault = Vault::open(settings)?;
    let pem = vault.export_private_key(target)?;

    match out {
        Some(path) => {
            write_private(&path, pem.as_bytes())?;
            println!("✓ Private key written to {}", path.display());
        }
        None => print!("{}", pem.as_str()),
    }
    Ok(())
}

/// Create `path` readable by the owner only.
fn write_private(path: &std::path::Path, contents: &[u8]) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

// ─── Agent ───────────────────────────────────────────────────────────────────

fn cmd_agent(settings: &Settings) -> Result<()> {
    let vault = Vault::open(settings)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    Agent::new(&vault).serve(stdin.lock(), stdout.lock())
}

// ─── Output ──────────────────────────────────────────────────────────────────

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{} [y/N] ", prompt);
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| VaultError::Store(StoreError::Json(e)))?;
    println!("{}", text);
    Ok(())
}

fn print_results(results: &[HostResult], json: bool) -> Result<()> {
    if json {
        return print_json(&results);
    }

    let labelled = results.len() > 1 || results.iter().any(|r| !r.local);
    for result in results {
        if labelled {
            println!("── {} ──", result.host);
        }
        match &result.output {
            OperationOutput::Protected(outcome) => print_protected(outcome),
            OperationOutput::Removed(outcome) => print_removed(outcome),
            OperationOutput::Inventory(inventory) => print_inventory(inventory),
            OperationOutput::Access(report) => print_access(report),
        }
    }
    Ok(())
}

fn print_protected(outcome: &ProtectOutcome) {
    println!("✓ Credential protected");
    println!("  File:        {}", outcome.path);
    println!(
        "  Certificate: {} ({})",
        outcome.thumbprint,
        if outcome.created_certificate { "new" } else { "existing" }
    );
    if let Some(cleanup) = &outcome.cleanup {
        if !cleanup.deleted_files.is_empty() || !cleanup.deleted_certificates.is_empty() {
            println!(
                "  Cleanup:     {} file(s), {} certificate(s) removed",
                cleanup.deleted_files.len(),
                cleanup.deleted_certificates.len()
            );
        }
    }
}

fn print_removed(outcome: &RemoveOutcome) {
    if outcome.deleted_files.is_empty() && outcome.deleted_certificates.is_empty() {
        println!("Nothing to remove.");
        return;
    }
    for file in &outcome.deleted_files {
        println!("✓ Deleted file {}", file);
    }
    for thumbprint in &outcome.deleted_certificates {
        println!("✓ Deleted certificate {}", thumbprint);
    }
}

fn print_inventory(inventory: &Inventory) {
    if inventory.identities.is_empty() {
        println!("No protected credentials.");
        return;
    }

    for entry in &inventory.identities {
        println!("{}", entry.identity);
        println!("  Certificates:");
        if entry.certificates.is_empty() {
            println!("    (none)");
        }
        for cert in &entry.certificates {
            println!(
                "    {}  {}  {}{}",
                cert.thumbprint,
                cert.subject,
                cert.not_before.format("%Y-%m-%d %H:%M:%S"),
                match (cert.has_private_key, cert.exportable) {
                    (false, _) => "  [no private key]",
                    (true, true) => "  [exportable]",
                    (true, false) => "",
                }
            );
        }
        println!("  Files:");
        if entry.files.is_empty() {
            println!("    (none)");
        }
        for file in &entry.files {
            println!("    {}  {}", file.modified.format("%Y-%m-%d %H:%M:%S"), file.path);
        }
    }
}

fn print_access(report: &AccessReport) {
    println!("Private key ACL for {} ({})", report.subject, report.thumbprint);
    if report.entries.is_empty() {
        println!("  (empty)");
    }
    for entry in &report.entries {
        let kind = match entry.kind {
            crate::acl::AceKind::Allow => "Allow",
            crate::acl::AceKind::Deny => "Deny",
        };
        println!("  {:<5}  {:<12}  {}", kind, entry.rights.to_string(), entry.principal);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_get_prints_username_and_password() {
        let secret = Secret::new("svc_zenoss", "hunter2");
        let text = render_secret(&secret, true, false).unwrap();
        assert_eq!(text.as_str(), "Username: svc_zenoss\nPassword: hunter2");

        let json = render_secret(&secret, true, true).unwrap();
        assert_eq!(json.as_str(), r#"{"Username":"svc_zenoss","Password":"hunter2"}"#);
    }

    #[test]
    fn test_default_get_redacts_password() {
        let secret = Secret::new("svc_zenoss", "hunter2");
        for json in [false, true] {
            let text = render_secret(&secret, false, json).unwrap();
            assert!(text.contains("svc_zenoss"));
            assert!(!text.contains("hunter2"));
        }
    }
}
