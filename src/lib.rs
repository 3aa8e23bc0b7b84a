// CmsVault — Library root
//
// Certificate store and private-key ACLs, the secret codec, credential files
// and their lifecycle, access coordination, host fan-out and the remote
// agent gateway.

pub mod access;
pub mod acl;
pub mod cli;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod enclave;
pub mod error;
pub mod files;
pub mod gateway;
pub mod lifecycle;
pub mod store;
pub mod vault;

pub use error::{Result, VaultError};
