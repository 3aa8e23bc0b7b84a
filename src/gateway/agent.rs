// CmsVault — Remote agent
//
// Serves newline-delimited JSON-RPC 2.0 on stdin/stdout for a dispatcher on
// another host. Each request line gets exactly one response line. Logging
// goes to stderr only; stdout carries protocol traffic and nothing else.
//
// Methods:
//   ping     → { "version": <crate version>, "descriptor_version": 1 }
//   execute  → params: operation descriptor, result: operation output

use std::io::{BufRead, Write};

use serde_json::Value;

use crate::dispatch::{OperationDescriptor, OperationRunner, DESCRIPTOR_VERSION};
use crate::error::{Result, VaultError};
use crate::store::StoreError;

use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND,
    OPERATION_FAILED,
};

pub struct Agent<'a> {
    runner: &'a dyn OperationRunner,
}

impl<'a> Agent<'a> {
    pub fn new(runner: &'a dyn OperationRunner) -> Self {
        Self { runner }
    }

    /// Answer requests until `input` reaches end of file.
    pub fn serve<R: BufRead, W: Write>(&self, input: R, mut output: W) -> Result<()> {
        tracing::info!("Agent serving JSON-RPC on stdio");
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let response = self.process_request(&line);
            let mut json = serde_json::to_string(&response)
                .map_err(|e| VaultError::Store(StoreError::Json(e)))?;
            json.push('\n');
            output.write_all(json.as_bytes())?;
            output.flush()?;
        }
        tracing::debug!("Agent input closed");
        Ok(())
    }

    /// Parse and dispatch a single JSON-RPC request.
    pub fn process_request(&self, raw: &str) -> JsonRpcResponse {
        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(e) => return JsonRpcResponse::parse_error(format!("Parse error: {}", e)),
        };

        if let Err(e) = request.validate() {
            return JsonRpcResponse::failure(request.id, e);
        }

        match request.method.as_str() {
            "ping" => JsonRpcResponse::success(
                request.id,
                serde_json::json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "descriptor_version": DESCRIPTOR_VERSION,
                }),
            ),
            "execute" => self.handle_execute(request.id, request.params),
            _ => JsonRpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Unknown method: {}", request.method),
            ),
        }
    }

    fn handle_execute(&self, id: Value, params: Value) -> JsonRpcResponse {
        let descriptor: OperationDescriptor = match serde_json::from_value(params) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid descriptor: {}", e))
            }
        };
        if let Err(e) = descriptor.check_version() {
            return JsonRpcResponse::error(id, INVALID_PARAMS, e.to_string());
        }

        let operation = &descriptor.operation;
        match self.runner.run(operation) {
            Ok(output) => match serde_json::to_value(&output) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
            },
            Err(e) => {
                tracing::warn!(operation = operation.name(), error = %e, "Operation failed");
                JsonRpcResponse::error(id, OPERATION_FAILED, e.to_string())
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
