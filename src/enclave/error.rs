// CmsVault — Enclave error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnclaveError {
    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("Key file error: {0}")]
    KeyFile(String),

    #[error("Key derivation error: {0}")]
    Derivation(String),

    #[error("Master secret not found — run `cmsvault init` first")]
    MasterSecretNotFound,

    #[error("Master secret has wrong length ({0} bytes, expected {1})")]
    BadSecretLength(usize, usize),
}
