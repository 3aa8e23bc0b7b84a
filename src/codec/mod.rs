// CmsVault — Secret Codec
//
// Serializes a `Secret` to canonical JSON and seals it to a protection
// certificate. Opening goes through the certificate store on behalf of a
// caller, so the private key's DACL decides who can read a credential.

mod envelope;
mod secret;

pub use envelope::{Envelope, ARMOR_BEGIN, ARMOR_END};
pub use secret::Secret;

use zeroize::Zeroizing;

use crate::acl::Caller;
use crate::error::{Result, VaultError};
use crate::store::{CertificateStore, ProtectionCertificate};

pub struct SecretCodec<'a, S: CertificateStore + ?Sized> {
    store: &'a S,
    caller: &'a Caller,
}

impl<'a, S: CertificateStore + ?Sized> SecretCodec<'a, S> {
    pub fn new(store: &'a S, caller: &'a Caller) -> Self {
        Self { store, caller }
    }

    /// Armored ciphertext of `secret`, readable by holders of `recipient`'s key.
    pub fn encrypt(&self, secret: &Secret, recipient: &ProtectionCertificate) -> Result<String> {
        let plaintext = secret.to_canonical_json()?;
        self.encrypt_bytes(&plaintext, recipient)
    }

    pub fn decrypt(&self, armored: &str) -> Result<Secret> {
        let plaintext = self.decrypt_bytes(armored)?;
        Secret::from_json(&plaintext)
    }

    /// Seal arbitrary bytes. Only the public key is needed.
    pub fn encrypt_bytes(&self, plaintext: &[u8], recipient: &ProtectionCertificate) -> Result<String> {
        envelope::seal(plaintext, &recipient.thumbprint, &recipient.public_key_der)?.to_armored()
    }

    /// Open an armored message with the recipient key named inside it.
    /// A missing key and an ACL denial are both decryption failures.
    pub fn decrypt_bytes(&self, armored: &str) -> Result<Zeroizing<Vec<u8>>> {
        let message = Envelope::from_armored(armored)?;
        let key = self
            .store
            .open_private_key(&message.recipient, self.caller)
            .map_err(|e| {
                tracing::debug!(thumbprint = %message.recipient, error = %e, "No usable recipient key");
                VaultError::Decryption(format!(
                    "no accessible private key for recipient {}",
                    message.recipient
                ))
            })?;
        envelope::open(&message, &key)
    }
}
