// CmsVault — SQLCipher Database Management
//
// Opens and initializes the encrypted certificate store. The encryption key
// is derived from the machine master secret in the enclave module and is set
// via PRAGMA before any tables are accessed.

use std::path::Path;

use rusqlite::Connection;

use super::StoreError;

/// File name of the certificate store inside the store directory.
pub const STORE_FILE_NAME: &str = "certstore.db";

/// Wrapper around a SQLCipher-encrypted SQLite connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) an encrypted database at the given path.
    /// The `hex_key` must be the hex-encoded 32-byte key derived from Argon2id.
    pub fn open(path: &Path, hex_key: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "key", format!("x'{}'", hex_key))?;

        // A wrong key surfaces here as "file is not a database"
        conn.execute_batch("SELECT count(*) FROM sqlite_master;")
            .map_err(|_| StoreError::InvalidKey)?;

        let db = Self { conn };
        db.run_migrations()?;

        tracing::debug!(path = %path.display(), "Certificate store opened");
        Ok(db)
    }

    /// Open an in-memory database (unencrypted, for testing only).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS certificates (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                thumbprint      TEXT NOT NULL UNIQUE,
                subject         TEXT NOT NULL,
                not_before      TEXT NOT NULL,
                not_after       TEXT NOT NULL,
                exportable      INTEGER NOT NULL DEFAULT 0,
                public_key      BLOB NOT NULL,
                cert_pem        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS private_keys (
                thumbprint      TEXT PRIMARY KEY,
                key_der         BLOB NOT NULL,
                acl             BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                thumbprint      TEXT NOT NULL,
                action          TEXT NOT NULL,
                actor           TEXT NOT NULL,
                timestamp       TEXT NOT NULL,
                details         TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_certificates_subject
                ON certificates(subject);

            CREATE INDEX IF NOT EXISTS idx_audit_thumbprint
                ON audit_log(thumbprint);
            ",
        )?;

        tracing::debug!("Database migrations completed successfully");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
