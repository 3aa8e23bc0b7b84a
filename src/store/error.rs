// CmsVault — Certificate store error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Certificate not found: {0}")]
    NotFound(String),

    #[error("Key pair generation failed: {0}")]
    KeyGeneration(String),

    #[error("Certificate build failed: {0}")]
    Certificate(String),

    /// Carries the certificate thumbprint.
    #[error("No accessible private key for certificate {0}")]
    NoPrivateKey(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Corrupt store record: {0}")]
    Corrupt(String),

    #[error("Certificate store not initialized — run `cmsvault init` first")]
    NotInitialized,

    #[error("Invalid store key — database may be corrupted or the master secret changed")]
    InvalidKey,
}
