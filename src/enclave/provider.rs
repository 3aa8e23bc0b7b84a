// CmsVault — Store Key Providers
//
// The certificate store is a SQLCipher database. Its key is never stored: it
// is derived on every open from a machine master secret.
//
// Flow:
//   1. `get_or_create_master_secret()` — load the master secret, or generate + persist one
//   2. `derive_store_key()` — Argon2id(master, salt) -> 32-byte SQLCipher key
//   3. the hex form goes into `PRAGMA key` and is dropped (zeroized) right after

use std::io::Write;
use std::path::{Path, PathBuf};

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::EnclaveError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Keyring service under which the machine master secret is filed.
const KEYRING_SERVICE: &str = "cmsvault-certificate-store";

/// Keyring account for the master secret entry.
const KEYRING_ACCOUNT: &str = "machine-master-secret";

/// Master secret length (256-bit entropy).
const MASTER_SECRET_LEN: usize = 32;

/// Derived SQLCipher key length.
const STORE_KEY_LEN: usize = 32;

// ─── KDF parameters ──────────────────────────────────────────────────────────

/// Argon2id cost parameters for the store key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Iterations.
    pub t_cost: u32,
    /// Parallel lanes.
    pub p_cost: u32,
}

impl Default for KdfParams {
    /// m=64 MiB, t=3, p=4.
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Source of the master secret that unlocks the certificate store.
pub trait StoreKeyProvider {
    /// Load the master secret, generating and persisting one on first use.
    fn get_or_create_master_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError>;

    /// Derive the SQLCipher key from the master secret.
    fn derive_store_key(&self, master_secret: &[u8]) -> Result<Zeroizing<Vec<u8>>, EnclaveError>;

    fn has_master_secret(&self) -> Result<bool, EnclaveError>;

    /// Load the secret and return the derived key, hex-encoded for `PRAGMA key`.
    fn store_key_hex(&self) -> Result<Zeroizing<String>, EnclaveError> {
        let master = self.get_or_create_master_secret()?;
        let key = self.derive_store_key(&master)?;
        Ok(Zeroizing::new(
            key.iter().map(|b| format!("{:02x}", b)).collect(),
        ))
    }
}

fn generate_master_secret() -> Zeroizing<Vec<u8>> {
    let mut secret = Zeroizing::new(vec![0u8; MASTER_SECRET_LEN]);
    rand::rng().fill_bytes(&mut secret);
    secret
}

/// Salt = SHA-256(service || "::" || account), stable per installation label.
fn build_salt(service: &str, account: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(service.as_bytes());
    hasher.update(b"::");
    hasher.update(account.as_bytes());
    hasher.finalize().to_vec()
}

fn argon2id_derive(
    master_secret: &[u8],
    salt: &[u8],
    params: KdfParams,
) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
    if master_secret.len() != MASTER_SECRET_LEN {
        return Err(EnclaveError::BadSecretLength(
            master_secret.len(),
            MASTER_SECRET_LEN,
        ));
    }

    let params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(STORE_KEY_LEN))
        .map_err(|e| EnclaveError::Derivation(format!("invalid Argon2 params: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new(vec![0u8; STORE_KEY_LEN]);
    argon2
        .hash_password_into(master_secret, salt, &mut key)
        .map_err(|e| EnclaveError::Derivation(format!("Argon2id hash failed: {}", e)))?;
    Ok(key)
}

// ─── Keyring backend ─────────────────────────────────────────────────────────

/// Master secret in the platform keyring (Credential Manager, Keychain,
/// Secret Service).
pub struct KeyringProvider {
    service: String,
    account: String,
    params: KdfParams,
}

impl KeyringProvider {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
            account: KEYRING_ACCOUNT.to_string(),
            params: KdfParams::default(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, EnclaveError> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| EnclaveError::Keyring(format!("failed to open keyring entry: {}", e)))
    }
}

impl Default for KeyringProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreKeyProvider for KeyringProvider {
    fn get_or_create_master_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        let entry = self.entry()?;
        match entry.get_secret() {
            Ok(secret) => {
                tracing::debug!("Loaded store master secret from keyring");
                Ok(Zeroizing::new(secret))
            }
            Err(keyring::Error::NoEntry) => {
                tracing::info!("No store master secret in keyring — generating one");
                let secret = generate_master_secret();
                entry.set_secret(&secret).map_err(|e| {
                    EnclaveError::Keyring(format!("failed to store master secret: {}", e))
                })?;
                Ok(secret)
            }
            Err(e) => Err(EnclaveError::Keyring(format!(
                "failed to read master secret: {}",
                e
            ))),
        }
    }

    fn derive_store_key(&self, master_secret: &[u8]) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        argon2id_derive(
            master_secret,
            &build_salt(&self.service, &self.account),
            self.params,
        )
    }

    fn has_master_secret(&self) -> Result<bool, EnclaveError> {
        match self.entry()?.get_secret() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(EnclaveError::Keyring(format!(
                "failed to check master secret: {}",
                e
            ))),
        }
    }
}

// ─── Key file backend ────────────────────────────────────────────────────────

/// Master secret in a raw 32-byte file, created owner-only on Unix.
/// Used by headless hosts (remote agents) that have no keyring session.
pub struct KeyFileProvider {
    path: PathBuf,
    params: KdfParams,
}

impl KeyFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            params: KdfParams::default(),
        }
    }

    pub fn with_params(mut self, params: KdfParams) -> Self {
        self.params = params;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_new(&self, secret: &[u8]) -> Result<(), EnclaveError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EnclaveError::KeyFile(format!("{}: {}", parent.display(), e)))?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(&self.path)
            .map_err(|e| EnclaveError::KeyFile(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(secret)
            .and_then(|_| file.sync_all())
            .map_err(|e| EnclaveError::KeyFile(format!("{}: {}", self.path.display(), e)))
    }
}

impl StoreKeyProvider for KeyFileProvider {
    fn get_or_create_master_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => {
                let secret = Zeroizing::new(bytes);
                if secret.len() != MASTER_SECRET_LEN {
                    return Err(EnclaveError::BadSecretLength(secret.len(), MASTER_SECRET_LEN));
                }
                Ok(secret)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "Generating store master secret file");
                let secret = generate_master_secret();
                self.write_new(&secret)?;
                Ok(secret)
            }
            Err(e) => Err(EnclaveError::KeyFile(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn derive_store_key(&self, master_secret: &[u8]) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        let label = self.path.to_string_lossy();
        argon2id_derive(master_secret, &build_salt(KEYRING_SERVICE, &label), self.params)
    }

    fn has_master_secret(&self) -> Result<bool, EnclaveError> {
        Ok(self.path.is_file())
    }
}

// ─── In-Memory Mock for Testing ──────────────────────────────────────────────

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Keeps the master secret in memory and uses cheap KDF parameters.
    pub struct MockKeyProvider {
        secret: Mutex<Option<Vec<u8>>>,
    }

    pub const TEST_PARAMS: KdfParams = KdfParams {
        m_cost: 64,
        t_cost: 1,
        p_cost: 1,
    };

    impl MockKeyProvider {
        pub fn new() -> Self {
            Self {
                secret: Mutex::new(None),
            }
        }

        pub fn with_secret(secret: Vec<u8>) -> Self {
            Self {
                secret: Mutex::new(Some(secret)),
            }
        }
    }

    impl StoreKeyProvider for MockKeyProvider {
        fn get_or_create_master_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
            let mut guard = self.secret.lock().unwrap();
            let secret = guard.get_or_insert_with(|| generate_master_secret().to_vec());
            Ok(Zeroizing::new(secret.clone()))
        }

        fn derive_store_key(
            &self,
            master_secret: &[u8],
        ) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
            argon2id_derive(master_secret, &build_salt("cmsvault-test", "mock"), TEST_PARAMS)
        }

        fn has_master_secret(&self) -> Result<bool, EnclaveError> {
            Ok(self.secret.lock().unwrap().is_some())
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mock::{MockKeyProvider, TEST_PARAMS};
    use super::*;

    #[test]
    fn test_master_secret_is_stable_once_created() {
        let provider = MockKeyProvider::new();
        let first = provider.get_or_create_master_secret().unwrap();
        let second = provider.get_or_create_master_secret().unwrap();
        assert_eq!(first.len(), MASTER_SECRET_LEN);
        assert_eq!(first.as_slice(), second.as_slice());
    }

    #[test]
    fn test_store_key_derivation_is_deterministic() {
        let provider = MockKeyProvider::with_secret(vec![7u8; MASTER_SECRET_LEN]);
        let a = provider.store_key_hex().unwrap();
        let b = provider.store_key_hex().unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert_eq!(a.len(), STORE_KEY_LEN * 2, "hex key must be 64 chars");
    }

    #[test]
    fn test_different_secrets_derive_different_keys() {
        let a = MockKeyProvider::with_secret(vec![1u8; MASTER_SECRET_LEN]);
        let b = MockKeyProvider::with_secret(vec![2u8; MASTER_SECRET_LEN]);
        assert_ne!(
            a.store_key_hex().unwrap().as_str(),
            b.store_key_hex().unwrap().as_str()
        );
    }

    #[test]
    fn test_short_master_secret_is_rejected() {
        let provider = MockKeyProvider::with_secret(vec![1u8; 8]);
        let err = provider.store_key_hex().unwrap_err();
        assert!(matches!(err, EnclaveError::BadSecretLength(8, MASTER_SECRET_LEN)));
    }

    #[test]
    fn test_key_file_provider_creates_and_reloads_secret() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            KeyFileProvider::new(dir.path().join("keys").join("master.key")).with_params(TEST_PARAMS);

        assert!(!provider.has_master_secret().unwrap());
        let first = provider.get_or_create_master_secret().unwrap();
        assert!(provider.has_master_secret().unwrap());
        let second = provider.get_or_create_master_secret().unwrap();
        assert_eq!(first.as_slice(), second.as_slice());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(provider.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "key file must be owner-only");
        }
    }

    #[test]
    fn test_key_file_with_wrong_length_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");
        std::fs::write(&path, b"too short").unwrap();
        let provider = KeyFileProvider::new(&path).with_params(TEST_PARAMS);
        assert!(matches!(
            provider.get_or_create_master_secret(),
            Err(EnclaveError::BadSecretLength(9, MASTER_SECRET_LEN))
        ));
    }
}
