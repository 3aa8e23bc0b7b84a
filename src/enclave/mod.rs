// CmsVault — Enclave Module
//
// Holds the machine master secret that unlocks the certificate store and
// derives the SQLCipher key from it. The secret lives in the OS keyring, or
// in an owner-only key file on hosts without a keyring session.

mod error;
mod provider;

pub use error::EnclaveError;
pub use provider::{KdfParams, KeyFileProvider, KeyringProvider, StoreKeyProvider};

#[cfg(test)]
pub use provider::mock;
