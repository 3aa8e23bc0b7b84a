// CmsVault — Top-level error types
//
// The crate-boundary taxonomy. Enclave and store errors are folded into the
// taxonomy variants where they have a direct meaning, and carried verbatim
// otherwise.

use thiserror::Error;

use crate::enclave::EnclaveError;
use crate::store::StoreError;

/// Top-level error type for all CmsVault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Certificate creation failed: {0}")]
    CertificateCreation(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("No accessible private key for certificate {0}")]
    NoPrivateKey(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Malformed secret: {0}")]
    MalformedSecret(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Certificate store access denied: {0}")]
    StoreAccess(String),

    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("Cannot resolve principal '{name}': {reason}")]
    UnresolvedPrincipal { name: String, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The credential was written, but pruning older generations failed.
    #[error("Credential written to {written}, but cleanup failed: {source}")]
    CleanupFailed {
        written: String,
        #[source]
        source: Box<VaultError>,
    },

    #[error("Remote host '{host}': {message}")]
    Remote { host: String, message: String },

    /// Dispatch stopped at `host`; hosts in `completed` keep their new state.
    #[error("Dispatch aborted at host '{host}' (completed: [{}]): {source}", completed.join(", "))]
    DispatchFailed {
        host: String,
        completed: Vec<String>,
        #[source]
        source: Box<VaultError>,
    },

    #[error("Enclave error: {0}")]
    Enclave(#[from] EnclaveError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for VaultError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => VaultError::NotFound(what),
            StoreError::KeyGeneration(msg) => VaultError::KeyGeneration(msg),
            StoreError::Certificate(msg) => VaultError::CertificateCreation(msg),
            StoreError::NoPrivateKey(thumbprint) => VaultError::NoPrivateKey(thumbprint),
            StoreError::AccessDenied(msg) => VaultError::StoreAccess(msg),
            other => VaultError::Store(other),
        }
    }
}

impl VaultError {
    pub(crate) fn unresolved(name: &str, reason: impl Into<String>) -> Self {
        VaultError::UnresolvedPrincipal {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// The question to put to the user, if retrying with confirmation could
    /// succeed. A dispatch that stopped before any host changed counts too.
    pub fn confirmation_prompt(&self) -> Option<&str> {
        match self {
            VaultError::ConfirmationRequired(prompt) => Some(prompt.as_str()),
            VaultError::DispatchFailed {
                completed, source, ..
            } if completed.is_empty() => source.confirmation_prompt(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        let err: VaultError = StoreError::NoPrivateKey("ABCD".to_string()).into();
        assert!(matches!(err, VaultError::NoPrivateKey(ref t) if t == "ABCD"));

        let err: VaultError = StoreError::AccessDenied("nope".to_string()).into();
        assert!(matches!(err, VaultError::StoreAccess(_)));

        let err: VaultError = StoreError::NotInitialized.into();
        assert!(matches!(err, VaultError::Store(StoreError::NotInitialized)));
    }

    #[test]
    fn test_dispatch_failure_lists_completed_hosts() {
        let err = VaultError::DispatchFailed {
            host: "web02".to_string(),
            completed: vec!["web00".to_string(), "web01".to_string()],
            source: Box::new(VaultError::Remote {
                host: "web02".to_string(),
                message: "connection refused".to_string(),
            }),
        };
        let text = err.to_string();
        assert!(text.contains("web02"));
        assert!(text.contains("web00, web01"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_confirmation_prompt_only_before_any_host_changed() {
        let prompt = || Box::new(VaultError::ConfirmationRequired("overwrite?".to_string()));
        assert_eq!(
            VaultError::ConfirmationRequired("overwrite?".to_string()).confirmation_prompt(),
            Some("overwrite?")
        );

        let untouched = VaultError::DispatchFailed {
            host: "web00".to_string(),
            completed: vec![],
            source: prompt(),
        };
        assert_eq!(untouched.confirmation_prompt(), Some("overwrite?"));

        let partial = VaultError::DispatchFailed {
            host: "web01".to_string(),
            completed: vec!["web00".to_string()],
            source: prompt(),
        };
        assert!(partial.confirmation_prompt().is_none());
        assert!(VaultError::NotFound("x".to_string()).confirmation_prompt().is_none());
    }
}
