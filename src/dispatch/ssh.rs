// CmsVault — SSH remote executor
//
// Runs `ssh -o BatchMode=yes <host> <remote command>` and speaks one JSON-RPC
// exchange with the agent on the other end: one request line on stdin, one
// response line on stdout. The agent's stderr passes through to ours.

use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

use serde_json::Value;

use crate::error::{Result, VaultError};
use crate::gateway::{JsonRpcRequest, JsonRpcResponse};

use super::{OperationDescriptor, OperationOutput, RemoteExecutor};

pub const DEFAULT_SSH_PROGRAM: &str = "ssh";
pub const DEFAULT_REMOTE_COMMAND: &str = "cmsvault agent";

#[derive(Debug, Clone)]
pub struct SshExecutor {
    program: String,
    remote_command: String,
}

impl SshExecutor {
    pub fn new(program: impl Into<String>, remote_command: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            remote_command: remote_command.into(),
        }
    }

    fn command(&self, host: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-o")
            .arg("BatchMode=yes")
            .arg(host)
            .arg(&self.remote_command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        command
    }
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_SSH_PROGRAM, DEFAULT_REMOTE_COMMAND)
    }
}

impl RemoteExecutor for SshExecutor {
    fn execute(&self, host: &str, descriptor: &OperationDescriptor) -> Result<OperationOutput> {
        let remote = |message: String| VaultError::Remote {
            host: host.to_string(),
            message,
        };

        let params = serde_json::to_value(descriptor)
            .map_err(|e| remote(format!("cannot encode operation: {}", e)))?;
        let mut request = serde_json::to_string(&JsonRpcRequest::new("execute", params, Value::from(1)))
            .map_err(|e| remote(format!("cannot encode request: {}", e)))?;
        request.push('\n');

        tracing::debug!(host = %host, program = %self.program, "Starting remote agent");
        let mut child = self
            .command(host)
            .spawn()
            .map_err(|e| remote(format!("cannot start '{}': {}", self.program, e)))?;

        // Dropping stdin after the request tells the agent there is nothing more.
        let write_result = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(request.as_bytes()).and_then(|_| stdin.flush()),
            None => Ok(()),
        };

        let mut line = String::new();
        if let Some(stdout) = child.stdout.take() {
            BufReader::new(stdout)
                .read_line(&mut line)
                .map_err(|e| remote(format!("cannot read agent response: {}", e)))?;
        }
        let status = child
            .wait()
            .map_err(|e| remote(format!("cannot wait for '{}': {}", self.program, e)))?;

        if line.trim().is_empty() {
            return Err(match write_result {
                Err(e) => remote(format!("agent closed the connection ({}); {}", e, status)),
                Ok(()) => remote(format!("agent exited without a response ({})", status)),
            });
        }
        parse_response(host, &line)
    }
}

/// Decode one agent response line into the operation's output.
pub(crate) fn parse_response(host: &str, line: &str) -> Result<OperationOutput> {
    let remote = |message: String| VaultError::Remote {
        host: host.to_string(),
        message,
    };

    let response: JsonRpcResponse = serde_json::from_str(line.trim())
        .map_err(|e| remote(format!("agent sent invalid JSON-RPC: {}", e)))?;
    let result = response
        .into_result()
        .map_err(|e| remote(e.to_string()))?;
    serde_json::from_value(result).map_err(|e| remote(format!("unexpected agent result: {}", e)))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
