// CmsVault — Certificate Store Module
//
// The machine certificate store: protection certificates, their private keys
// and each key's DACL, in a SQLCipher database. Every key access and DACL
// change is audit-logged.

mod db;
mod error;
mod models;
mod repository;

pub use db::{Database, STORE_FILE_NAME};
pub use error::StoreError;
pub use models::{
    AuditEntry, CertificateSummary, Identity, KeyHandle, ProtectionCertificate, SUBJECT_PREFIX,
};
pub use repository::{CertificateStore, SqliteCertificateStore};
