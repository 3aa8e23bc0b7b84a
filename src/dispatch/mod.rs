// CmsVault — Host fan-out
//
// Runs one operation on a list of hosts: the local host first (in-process),
// then each remote host in the order given. The first failure stops the run;
// hosts that already completed keep their new state.

mod descriptor;
mod ssh;

pub use descriptor::{Operation, OperationDescriptor, OperationOutput, DESCRIPTOR_VERSION};
pub use ssh::{SshExecutor, DEFAULT_REMOTE_COMMAND, DEFAULT_SSH_PROGRAM};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// Executes operations against this host's own stores.
pub trait OperationRunner {
    fn run(&self, operation: &Operation) -> Result<OperationOutput>;
}

/// Executes a descriptor on another host.
pub trait RemoteExecutor {
    fn execute(&self, host: &str, descriptor: &OperationDescriptor) -> Result<OperationOutput>;
}

/// The names this host answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    short_name: String,
    fqdn: Option<String>,
}

impl HostIdentity {
    pub fn new(short_name: impl Into<String>, fqdn: Option<String>) -> Self {
        Self {
            short_name: short_name.into(),
            fqdn,
        }
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn fqdn(&self) -> Option<&str> {
        self.fqdn.as_deref()
    }

    /// Case-insensitive match on short name or FQDN; `localhost` and `.` too.
    pub fn is_local(&self, host: &str) -> bool {
        let host = host.trim();
        host == "."
            || host.eq_ignore_ascii_case("localhost")
            || host.eq_ignore_ascii_case(&self.short_name)
            || self
                .fqdn
                .as_deref()
                .is_some_and(|fqdn| fqdn.eq_ignore_ascii_case(host))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostResult {
    pub host: String,
    pub local: bool,
    pub output: OperationOutput,
}

/// Trimmed, non-empty host names with case-insensitive duplicates removed.
/// The first spelling of each host wins.
pub fn dedupe_hosts(hosts: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut unique = Vec::new();
    for host in hosts.iter().map(|h| h.trim()).filter(|h| !h.is_empty()) {
        let key = host.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            unique.push(host.to_string());
        }
    }
    unique
}

pub struct HostDispatcher<'a> {
    local: &'a HostIdentity,
    runner: &'a dyn OperationRunner,
    remote: &'a dyn RemoteExecutor,
}

impl<'a> HostDispatcher<'a> {
    pub fn new(
        local: &'a HostIdentity,
        runner: &'a dyn OperationRunner,
        remote: &'a dyn RemoteExecutor,
    ) -> Self {
        Self {
            local,
            runner,
            remote,
        }
    }

    /// Run `operation` on `hosts`, or only locally when `hosts` is empty.
    ///
    /// With explicit hosts, a failure is reported as `DispatchFailed` naming
    /// the failing host and every host that completed before it.
    pub fn dispatch(&self, operation: &Operation, hosts: &[String]) -> Result<Vec<HostResult>> {
        let hosts = dedupe_hosts(hosts);
        if hosts.is_empty() {
            let output = self.runner.run(operation)?;
            return Ok(vec![HostResult {
                host: self.local.short_name().to_string(),
                local: true,
                output,
            }]);
        }

        let (local, remote): (Vec<String>, Vec<String>) =
            hosts.into_iter().partition(|h| self.local.is_local(h));

        let mut results = Vec::new();
        let mut completed: Vec<String> = Vec::new();

        // Aliases of this host collapse into one local run.
        if let Some(host) = local.into_iter().next() {
            tracing::info!(host = %host, operation = operation.name(), "Running operation locally");
            let output = self
                .runner
                .run(operation)
                .map_err(|e| aborted(&host, &completed, e))?;
            completed.push(host.clone());
            results.push(HostResult {
                host,
                local: true,
                output,
            });
        }

        let descriptor = OperationDescriptor::new(operation.clone());
        for host in remote {
            tracing::info!(host = %host, operation = operation.name(), "Running operation on remote host");
            let output = self
                .remote
                .execute(&host, &descriptor)
                .map_err(|e| aborted(&host, &completed, e))?;
            completed.push(host.clone());
            results.push(HostResult {
                host,
                local: false,
                output,
            });
        }

        Ok(results)
    }
}

fn aborted(host: &str, completed: &[String], source: VaultError) -> VaultError {
    tracing::error!(host = %host, completed = completed.len(), error = %source, "Dispatch aborted");
    VaultError::DispatchFailed {
        host: host.to_string(),
        completed: completed.to_vec(),
        source: Box::new(source),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
