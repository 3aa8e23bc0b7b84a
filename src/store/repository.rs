// CmsVault — Certificate Store Repository
//
// Protection certificates and their private keys live in separate tables.
// Listing and lookup never touch key material; `open_private_key` is the only
// way to read it, and it evaluates the key's DACL against the caller and
// writes an audit log entry either way.

use chrono::{DateTime, SecondsFormat, Utc};
use p384::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, KeyPair,
    KeyUsagePurpose,
};
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::acl::{AclSnapshot, Caller, KeyAclStore, KeyRights};

use super::db::Database;
use super::models::{AuditEntry, Identity, KeyHandle, ProtectionCertificate};
use super::StoreError;

/// Microsoft "Document Encryption" extended key usage (1.3.6.1.4.1.311.80.1).
const DOCUMENT_ENCRYPTION_EKU: &[u64] = &[1, 3, 6, 1, 4, 1, 311, 80, 1];

/// Protection certificates are valid for 100 years.
const VALIDITY_DAYS: i64 = 36_525;

const CERT_COLUMNS: &str = "c.id, c.thumbprint, c.subject, c.not_before, c.not_after,
     c.exportable, c.public_key, c.cert_pem, k.thumbprint IS NOT NULL";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the machine certificate store.
pub trait CertificateStore: KeyAclStore {
    /// Generate a key pair and self-signed certificate with subject
    /// `cms-{identity}-{guid}`. The creator gets full control of the key.
    fn create_certificate(
        &self,
        identity: &Identity,
        exportable: bool,
        caller: &Caller,
    ) -> Result<ProtectionCertificate, StoreError>;

    /// Certificates whose subject starts with `prefix`, oldest first.
    fn find_certificates(&self, prefix: &str) -> Result<Vec<ProtectionCertificate>, StoreError>;

    /// Case-insensitive thumbprint lookup.
    fn find_by_thumbprint(&self, thumbprint: &str)
        -> Result<Option<ProtectionCertificate>, StoreError>;

    /// Remove the certificate and its key material in one transaction.
    fn delete_certificate(
        &self,
        cert: &ProtectionCertificate,
        caller: &Caller,
    ) -> Result<(), StoreError>;

    /// Handle to the storage object of `cert`'s private key.
    fn locate_private_key(
        &self,
        cert: &ProtectionCertificate,
        caller: &Caller,
    ) -> Result<KeyHandle, StoreError>;

    /// PKCS#8 DER of the private key, if the DACL grants `caller` Read.
    fn open_private_key(
        &self,
        thumbprint: &str,
        caller: &Caller,
    ) -> Result<Zeroizing<Vec<u8>>, StoreError>;

    /// PKCS#8 PEM of an exportable key, for callers with full control.
    fn export_private_key(
        &self,
        cert: &ProtectionCertificate,
        caller: &Caller,
    ) -> Result<Zeroizing<String>, StoreError>;

    fn log_access(
        &self,
        thumbprint: &str,
        action: &str,
        actor: &str,
        details: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Audit entries for a thumbprint, oldest first.
    fn audit_log(&self, thumbprint: &str) -> Result<Vec<AuditEntry>, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

pub struct SqliteCertificateStore<'a> {
    db: &'a Database,
}

impl<'a> SqliteCertificateStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn row_to_certificate(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProtectionCertificate> {
        let not_before: String = row.get(3)?;
        let not_after: String = row.get(4)?;

        Ok(ProtectionCertificate {
            sequence: row.get(0)?,
            thumbprint: row.get(1)?,
            subject: row.get(2)?,
            not_before: parse_timestamp(3, &not_before)?,
            not_after: parse_timestamp(4, &not_after)?,
            exportable: row.get(5)?,
            public_key_der: row.get(6)?,
            cert_pem: row.get(7)?,
            has_private_key: row.get(8)?,
        })
    }

    fn load_key_row(&self, thumbprint: &str) -> Result<Option<(Vec<u8>, AclSnapshot)>, StoreError> {
        let row: Option<(Vec<u8>, Vec<u8>)> = self
            .db
            .conn()
            .query_row(
                "SELECT key_der, acl FROM private_keys WHERE thumbprint = ?1",
                params![thumbprint],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((key_der, acl)) => Ok(Some((key_der, AclSnapshot::from_bytes(&acl)?))),
            None => Ok(None),
        }
    }

    fn load_acl(&self, thumbprint: &str) -> Result<Option<AclSnapshot>, StoreError> {
        let acl: Option<Vec<u8>> = self
            .db
            .conn()
            .query_row(
                "SELECT acl FROM private_keys WHERE thumbprint = ?1",
                params![thumbprint],
                |row| row.get(0),
            )
            .optional()?;
        acl.map(|bytes| AclSnapshot::from_bytes(&bytes)).transpose()
    }

    /// SYSTEM and administrators may always manage keys; anyone else needs
    /// full control on the key itself.
    fn may_manage(caller: &Caller, acl: Option<&AclSnapshot>) -> bool {
        caller.is_administrator() || acl.is_some_and(|a| a.allows(caller, KeyRights::FullControl))
    }

    fn generate(
        &self,
        identity: &Identity,
    ) -> Result<(ProtectionCertificate, Zeroizing<Vec<u8>>), StoreError> {
        let secret = p384::SecretKey::random(&mut aes_gcm::aead::OsRng);
        let key_der = secret
            .to_pkcs8_der()
            .map_err(|e| StoreError::KeyGeneration(e.to_string()))?;
        let key_pem = secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| StoreError::KeyGeneration(e.to_string()))?;
        let public_key_der = secret
            .public_key()
            .to_public_key_der()
            .map_err(|e| StoreError::KeyGeneration(e.to_string()))?
            .into_vec();
        let key_pair =
            KeyPair::from_pem(&key_pem).map_err(|e| StoreError::KeyGeneration(e.to_string()))?;

        let subject = identity.new_subject();
        let created = Utc::now();

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, subject.as_str());
        params.distinguished_name = dn;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyAgreement,
            KeyUsagePurpose::DataEncipherment,
        ];
        params.extended_key_usages =
            vec![ExtendedKeyUsagePurpose::Other(DOCUMENT_ENCRYPTION_EKU.to_vec())];
        let not_before = time::OffsetDateTime::from_unix_timestamp(created.timestamp())
            .map_err(|e| StoreError::Certificate(e.to_string()))?;
        params.not_before = not_before;
        params.not_after = not_before + time::Duration::days(VALIDITY_DAYS);

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| StoreError::Certificate(e.to_string()))?;

        let protection = ProtectionCertificate {
            thumbprint: thumbprint_of(cert.der()),
            subject,
            not_before: created,
            not_after: created + chrono::Duration::days(VALIDITY_DAYS),
            exportable: false,
            has_private_key: true,
            sequence: 0,
            public_key_der,
            cert_pem: cert.pem(),
        };
        Ok((protection, Zeroizing::new(key_der.as_bytes().to_vec())))
    }
}

impl<'a> CertificateStore for SqliteCertificateStore<'a> {
    fn create_certificate(
        &self,
        identity: &Identity,
        exportable: bool,
        caller: &Caller,
    ) -> Result<ProtectionCertificate, StoreError> {
        let (mut cert, key_der) = self.generate(identity)?;
        cert.exportable = exportable;
        let acl = AclSnapshot::for_new_key(caller.principal()).to_bytes()?;

        let tx = self.db.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO certificates
                (thumbprint, subject, not_before, not_after, exportable, public_key, cert_pem)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                cert.thumbprint,
                cert.subject,
                format_timestamp(&cert.not_before),
                format_timestamp(&cert.not_after),
                cert.exportable,
                cert.public_key_der,
                cert.cert_pem,
            ],
        )
        .map_err(|e| StoreError::Certificate(e.to_string()))?;
        cert.sequence = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO private_keys (thumbprint, key_der, acl) VALUES (?1, ?2, ?3)",
            params![cert.thumbprint, key_der.as_slice(), acl],
        )
        .map_err(|e| StoreError::Certificate(e.to_string()))?;
        tx.commit()?;

        self.log_access(
            &cert.thumbprint,
            "created",
            caller.principal().name(),
            Some(&cert.subject),
        )?;

        tracing::info!(
            identity = %identity,
            subject = %cert.subject,
            thumbprint = %cert.thumbprint,
            exportable,
            "Protection certificate created"
        );
        Ok(cert)
    }

    fn find_certificates(&self, prefix: &str) -> Result<Vec<ProtectionCertificate>, StoreError> {
        let sql = format!(
            "SELECT {} FROM certificates c
             LEFT JOIN private_keys k ON k.thumbprint = c.thumbprint
             WHERE substr(c.subject, 1, length(?1)) = ?1
             ORDER BY c.not_before ASC, c.id ASC",
            CERT_COLUMNS
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![prefix], Self::row_to_certificate)?;

        let mut certs = Vec::new();
        for row in rows {
            certs.push(row?);
        }
        Ok(certs)
    }

    fn find_by_thumbprint(
        &self,
        thumbprint: &str,
    ) -> Result<Option<ProtectionCertificate>, StoreError> {
        let sql = format!(
            "SELECT {} FROM certificates c
             LEFT JOIN private_keys k ON k.thumbprint = c.thumbprint
             WHERE c.thumbprint = ?1",
            CERT_COLUMNS
        );
        Ok(self
            .db
            .conn()
            .query_row(
                &sql,
                params![thumbprint.trim().to_ascii_uppercase()],
                Self::row_to_certificate,
            )
            .optional()?)
    }

    fn delete_certificate(
        &self,
        cert: &ProtectionCertificate,
        caller: &Caller,
    ) -> Result<(), StoreError> {
        if self.find_by_thumbprint(&cert.thumbprint)?.is_none() {
            return Err(StoreError::NotFound(format!("certificate {}", cert.thumbprint)));
        }
        let acl = self.load_acl(&cert.thumbprint)?;
        if !Self::may_manage(caller, acl.as_ref()) {
            return Err(StoreError::AccessDenied(format!(
                "{} may not delete certificate {}",
                caller, cert.thumbprint
            )));
        }

        let tx = self.db.conn().unchecked_transaction()?;
        let removed = tx.execute(
            "DELETE FROM certificates WHERE thumbprint = ?1",
            params![cert.thumbprint],
        )?;
        tx.execute(
            "DELETE FROM private_keys WHERE thumbprint = ?1",
            params![cert.thumbprint],
        )?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("certificate {}", cert.thumbprint)));
        }
        tx.commit()?;

        self.log_access(
            &cert.thumbprint,
            "deleted",
            caller.principal().name(),
            Some(&cert.subject),
        )?;
        tracing::info!(subject = %cert.subject, thumbprint = %cert.thumbprint, "Certificate deleted");
        Ok(())
    }

    fn locate_private_key(
        &self,
        cert: &ProtectionCertificate,
        caller: &Caller,
    ) -> Result<KeyHandle, StoreError> {
        let acl = self
            .load_acl(&cert.thumbprint)?
            .ok_or_else(|| StoreError::NoPrivateKey(cert.thumbprint.clone()))?;

        if !caller.is_administrator() && !acl.allows(caller, KeyRights::Read) {
            return Err(StoreError::NoPrivateKey(cert.thumbprint.clone()));
        }
        Ok(KeyHandle::new(&cert.thumbprint))
    }

    fn open_private_key(
        &self,
        thumbprint: &str,
        caller: &Caller,
    ) -> Result<Zeroizing<Vec<u8>>, StoreError> {
        let thumbprint = thumbprint.trim().to_ascii_uppercase();
        let (key_der, acl) = self
            .load_key_row(&thumbprint)?
            .ok_or_else(|| StoreError::NoPrivateKey(thumbprint.clone()))?;
        let key_der = Zeroizing::new(key_der);

        if !acl.allows(caller, KeyRights::Read) {
            self.log_access(&thumbprint, "private_key_denied", caller.principal().name(), None)?;
            tracing::warn!(thumbprint = %thumbprint, principal = %caller, "Private key access denied");
            return Err(StoreError::AccessDenied(format!(
                "{} has no read access to the private key of {}",
                caller, thumbprint
            )));
        }

        self.log_access(&thumbprint, "private_key_used", caller.principal().name(), None)?;
        Ok(key_der)
    }

    fn export_private_key(
        &self,
        cert: &ProtectionCertificate,
        caller: &Caller,
    ) -> Result<Zeroizing<String>, StoreError> {
        if !cert.exportable {
            return Err(StoreError::AccessDenied(format!(
                "the private key of {} is not exportable",
                cert.thumbprint
            )));
        }
        let (key_der, acl) = self
            .load_key_row(&cert.thumbprint)?
            .ok_or_else(|| StoreError::NoPrivateKey(cert.thumbprint.clone()))?;
        let key_der = Zeroizing::new(key_der);

        if !acl.allows(caller, KeyRights::FullControl) {
            self.log_access(&cert.thumbprint, "export_denied", caller.principal().name(), None)?;
            return Err(StoreError::AccessDenied(format!(
                "{} lacks full control of the private key of {}",
                caller, cert.thumbprint
            )));
        }

        let secret = p384::SecretKey::from_pkcs8_der(&key_der)
            .map_err(|e| StoreError::Corrupt(format!("private key: {}", e)))?;
        let pem = secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| StoreError::Corrupt(format!("private key: {}", e)))?;

        self.log_access(&cert.thumbprint, "private_key_exported", caller.principal().name(), None)?;
        Ok(pem)
    }

    fn log_access(
        &self,
        thumbprint: &str,
        action: &str,
        actor: &str,
        details: Option<&str>,
    ) -> Result<(), StoreError> {
        self.db.conn().execute(
            "INSERT INTO audit_log (thumbprint, action, actor, timestamp, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![thumbprint, action, actor, Utc::now().to_rfc3339(), details],
        )?;

        tracing::debug!(
            thumbprint = %thumbprint,
            action = %action,
            actor = %actor,
            "Audit log entry recorded"
        );
        Ok(())
    }

    fn audit_log(&self, thumbprint: &str) -> Result<Vec<AuditEntry>, StoreError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT thumbprint, action, actor, timestamp, details FROM audit_log
             WHERE thumbprint = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![thumbprint.trim().to_ascii_uppercase()], |row| {
            let timestamp: String = row.get(3)?;
            Ok(AuditEntry {
                thumbprint: row.get(0)?,
                action: row.get(1)?,
                actor: row.get(2)?,
                timestamp: parse_timestamp(3, &timestamp)?,
                details: row.get(4)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

impl<'a> KeyAclStore for SqliteCertificateStore<'a> {
    fn read_acl(&self, handle: &KeyHandle) -> Result<AclSnapshot, StoreError> {
        self.load_acl(handle.thumbprint())?
            .ok_or_else(|| StoreError::NoPrivateKey(handle.thumbprint().to_string()))
    }

    fn write_acl(
        &self,
        handle: &KeyHandle,
        acl: &AclSnapshot,
        caller: &Caller,
        action: &str,
    ) -> Result<(), StoreError> {
        let current = self.read_acl(handle)?;
        if !Self::may_manage(caller, Some(&current)) {
            return Err(StoreError::AccessDenied(format!(
                "{} may not change the DACL of {}",
                caller, handle
            )));
        }

        self.db.conn().execute(
            "UPDATE private_keys SET acl = ?1 WHERE thumbprint = ?2",
            params![acl.to_bytes()?, handle.thumbprint()],
        )?;

        let summary = acl
            .entries()
            .iter()
            .map(|e| format!("{:?} {} {}", e.kind, e.principal, e.rights))
            .collect::<Vec<_>>()
            .join("; ");
        self.log_access(handle.thumbprint(), action, caller.principal().name(), Some(&summary))?;
        Ok(())
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Uppercase hex SHA-256 of the certificate DER.
pub(crate) fn thumbprint_of(der: &[u8]) -> String {
    Sha256::digest(der).iter().map(|b| format!("{:02X}", b)).collect()
}

/// Fixed-width RFC 3339 with nanoseconds, so lexical order is time order.
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
