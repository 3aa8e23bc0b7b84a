// CmsVault — Envelope encryption
//
// ECDH-ES key agreement on P-384 against the recipient certificate's public
// key, a single-block concatenation KDF over SHA-384, then AES-256-GCM. The
// recipient thumbprint and ephemeral public key are bound in as associated
// data. The envelope is JSON, base64-encoded and armored as `CMS` text.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use p384::elliptic_curve::sec1::ToEncodedPoint;
use p384::pkcs8::{DecodePrivateKey, DecodePublicKey};
use p384::{PublicKey, SecretKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha384};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

pub const ARMOR_BEGIN: &str = "-----BEGIN CMS-----";
pub const ARMOR_END: &str = "-----END CMS-----";

const ENVELOPE_VERSION: u32 = 1;
const ALGORITHM: &str = "ECDH-ES+A256GCM/P-384";
const KDF_LABEL: &[u8] = b"cmsvault-envelope-v1";
const NONCE_LEN: usize = 12;
const CONTENT_KEY_LEN: usize = 32;
const ARMOR_LINE_LEN: usize = 64;

/// Wire form of a sealed secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    /// Thumbprint of the certificate whose private key opens this envelope.
    pub recipient: String,
    pub algorithm: String,
    /// SEC1 uncompressed ephemeral public key, base64.
    pub ephemeral_key: String,
    pub nonce: String,
    pub ciphertext: String,
}

impl Envelope {
    /// Parse armored text. Anything unreadable is a decryption failure.
    pub fn from_armored(text: &str) -> Result<Self> {
        let body = text
            .trim()
            .strip_prefix(ARMOR_BEGIN)
            .and_then(|rest| rest.trim_end().strip_suffix(ARMOR_END))
            .ok_or_else(|| VaultError::Decryption("not a CMS message".into()))?;
        let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
        let json = STANDARD
            .decode(compact)
            .map_err(|e| VaultError::Decryption(format!("bad message encoding: {}", e)))?;
        let envelope: Envelope = serde_json::from_slice(&json)
            .map_err(|e| VaultError::Decryption(format!("bad envelope: {}", e)))?;

        if envelope.version != ENVELOPE_VERSION || envelope.algorithm != ALGORITHM {
            return Err(VaultError::Decryption(format!(
                "unsupported envelope version {} / algorithm {}",
                envelope.version, envelope.algorithm
            )));
        }
        Ok(envelope)
    }

    pub fn to_armored(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| VaultError::Encryption(format!("cannot encode envelope: {}", e)))?;
        let encoded = STANDARD.encode(json);

        let mut armored = String::with_capacity(encoded.len() + encoded.len() / ARMOR_LINE_LEN + 40);
        armored.push_str(ARMOR_BEGIN);
        armored.push('\n');
        for line in encoded.as_bytes().chunks(ARMOR_LINE_LEN) {
            // base64 output is ASCII
            armored.push_str(&String::from_utf8_lossy(line));
            armored.push('\n');
        }
        armored.push_str(ARMOR_END);
        armored.push('\n');
        Ok(armored)
    }
}

/// Seal `plaintext` to the certificate with thumbprint `recipient` and
/// SubjectPublicKeyInfo `recipient_spki`.
pub fn seal(plaintext: &[u8], recipient: &str, recipient_spki: &[u8]) -> Result<Envelope> {
    let recipient_key = PublicKey::from_public_key_der(recipient_spki)
        .map_err(|e| VaultError::Encryption(format!("bad recipient public key: {}", e)))?;

    let ephemeral = SecretKey::random(&mut aes_gcm::aead::OsRng);
    let ephemeral_public = ephemeral.public_key().to_encoded_point(false);
    let shared = p384::ecdh::diffie_hellman(ephemeral.to_nonzero_scalar(), recipient_key.as_affine());

    let content_key = concat_kdf(shared.raw_secret_bytes(), ephemeral_public.as_bytes(), recipient);
    let cipher = Aes256Gcm::new_from_slice(content_key.as_slice())
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let aad = associated_data(recipient, ephemeral_public.as_bytes());
    let ciphertext = cipher
        .encrypt(
            &Nonce::from(nonce_bytes),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| VaultError::Encryption("AES-GCM seal failed".into()))?;

    Ok(Envelope {
        version: ENVELOPE_VERSION,
        recipient: recipient.to_string(),
        algorithm: ALGORITHM.to_string(),
        ephemeral_key: STANDARD.encode(ephemeral_public.as_bytes()),
        nonce: STANDARD.encode(nonce_bytes),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

/// Open an envelope with the recipient's PKCS#8 private key.
pub fn open(envelope: &Envelope, private_key_der: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let decode = |field: &str, value: &str| {
        STANDARD
            .decode(value)
            .map_err(|e| VaultError::Decryption(format!("bad {}: {}", field, e)))
    };
    let ephemeral_bytes = decode("ephemeral key", &envelope.ephemeral_key)?;
    let nonce_bytes: [u8; NONCE_LEN] = decode("nonce", &envelope.nonce)?
        .try_into()
        .map_err(|_| VaultError::Decryption("invalid nonce length".into()))?;
    let ciphertext = decode("ciphertext", &envelope.ciphertext)?;

    let secret = SecretKey::from_pkcs8_der(private_key_der)
        .map_err(|e| VaultError::Decryption(format!("unusable private key: {}", e)))?;
    let ephemeral = PublicKey::from_sec1_bytes(&ephemeral_bytes)
        .map_err(|_| VaultError::Decryption("invalid ephemeral key".into()))?;
    let shared = p384::ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());

    let content_key = concat_kdf(shared.raw_secret_bytes(), &ephemeral_bytes, &envelope.recipient);
    let cipher = Aes256Gcm::new_from_slice(content_key.as_slice())
        .map_err(|e| VaultError::Decryption(e.to_string()))?;
    let aad = associated_data(&envelope.recipient, &ephemeral_bytes);

    let plaintext = cipher
        .decrypt(
            &Nonce::from(nonce_bytes),
            Payload {
                msg: &ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| VaultError::Decryption("message authentication failed".into()))?;
    Ok(Zeroizing::new(plaintext))
}

/// NIST SP 800-56A concatenation KDF, one SHA-384 block truncated to 256 bits.
fn concat_kdf(shared: &[u8], ephemeral_public: &[u8], recipient: &str) -> Zeroizing<Vec<u8>> {
    let mut hasher = Sha384::new();
    hasher.update(1u32.to_be_bytes());
    hasher.update(shared);
    hasher.update(KDF_LABEL);
    hasher.update(ephemeral_public);
    hasher.update(recipient.as_bytes());
    let mut block = hasher.finalize().to_vec();
    block.truncate(CONTENT_KEY_LEN);
    Zeroizing::new(block)
}

fn associated_data(recipient: &str, ephemeral_public: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(recipient.len() + ephemeral_public.len());
    aad.extend_from_slice(recipient.as_bytes());
    aad.extend_from_slice(ephemeral_public);
    aad
}
