// CmsVault — Credential file store
//
// One armored ciphertext per generation, named `{subject}.txt`. Files are
// superseded, never edited in place. Generation order is last-write time,
// and every write is stamped strictly later than its siblings so coarse
// file-system clocks cannot reorder generations.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::store::Identity;

const EXTENSION: &str = "txt";

/// Minimum gap between the write stamps of two generations.
const STAMP_STEP: Duration = Duration::from_millis(1);

/// A credential file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialFile {
    pub path: PathBuf,
    pub subject: String,
    pub modified: SystemTime,
}

impl CredentialFile {
    pub fn summary(&self) -> FileSummary {
        FileSummary {
            path: self.path.display().to_string(),
            subject: self.subject.clone(),
            modified: DateTime::<Utc>::from(self.modified),
        }
    }
}

/// Listing view of a credential file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub subject: String,
    pub modified: DateTime<Utc>,
}

/// Credential files under one directory.
#[derive(Debug, Clone)]
pub struct CredentialFileStore {
    dir: PathBuf,
}

impl CredentialFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, subject: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", subject, EXTENSION))
    }

    /// Write `contents` as the newest generation for `subject`.
    ///
    /// Fails with `ConfirmationRequired` if the file exists and `overwrite`
    /// is false. The write is atomic: readers see the old file or the new one.
    pub fn write(&self, subject: &str, contents: &str, overwrite: bool) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(subject);
        if path.exists() && !overwrite {
            return Err(VaultError::ConfirmationRequired(format!(
                "{} already exists; confirm to overwrite it",
                path.display()
            )));
        }

        let tmp = self.dir.join(format!(".{}.tmp", subject));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        if let Some(identity) = Identity::from_subject(subject) {
            self.stamp_after_siblings(&identity, &path)?;
        }

        tracing::debug!(path = %path.display(), "Credential file written");
        Ok(path)
    }

    /// Bump `path`'s last-write time past every other file of `identity`.
    fn stamp_after_siblings(&self, identity: &Identity, path: &Path) -> Result<()> {
        let newest_sibling = self
            .list_all(identity)?
            .into_iter()
            .filter(|f| f.path != path)
            .map(|f| f.modified)
            .max();
        let Some(newest) = newest_sibling else {
            return Ok(());
        };

        let current = fs::metadata(path)?.modified()?;
        if current <= newest {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_modified(newest + STAMP_STEP)?;
        }
        Ok(())
    }

    pub fn read(&self, path: &Path) -> Result<String> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(VaultError::NotFound(
                format!("credential file {}", path.display()),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Files of `identity`, oldest first by (last-write time, file name).
    pub fn list_all(&self, identity: &Identity) -> Result<Vec<CredentialFile>> {
        let mut files: Vec<_> = self
            .scan()?
            .into_iter()
            .filter(|f| identity.owns_subject(&f.subject))
            .collect();
        files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        Ok(files)
    }

    pub fn find_latest(&self, identity: &Identity) -> Result<Option<CredentialFile>> {
        Ok(self.list_all(identity)?.pop())
    }

    /// Every identity with at least one file here, sorted.
    pub fn list_identities(&self) -> Result<Vec<Identity>> {
        let mut identities: Vec<Identity> = self
            .scan()?
            .iter()
            .filter_map(|f| Identity::from_subject(&f.subject))
            .collect();
        identities.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        identities.dedup();
        Ok(identities)
    }

    pub fn delete(&self, file: &CredentialFile) -> Result<()> {
        fs::remove_file(&file.path)?;
        tracing::info!(path = %file.path.display(), "Credential file deleted");
        Ok(())
    }

    fn scan(&self) -> Result<Vec<CredentialFile>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(subject) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            files.push(CredentialFile {
                modified: metadata.modified()?,
                path,
                subject,
            });
        }
        Ok(files)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn svc() -> Identity {
        Identity::parse("svc").unwrap()
    }

    #[test]
    fn test_write_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialFileStore::new(dir.path().join("nested"));
        let subject = svc().new_subject();

        let path = store.write(&subject, "ciphertext", false).unwrap();
        assert_eq!(path, store.path_for(&subject));
        assert_eq!(store.read(&path).unwrap(), "ciphertext");
    }

    #[test]
    fn test_overwrite_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialFileStore::new(dir.path());
        let subject = svc().new_subject();
        store.write(&subject, "one", false).unwrap();

        let err = store.write(&subject, "two", false).unwrap_err();
        assert!(matches!(err, VaultError::ConfirmationRequired(_)));

        let path = store.write(&subject, "two", true).unwrap();
        assert_eq!(store.read(&path).unwrap(), "two");
    }

    #[test]
    fn test_generations_are_strictly_ordered_by_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialFileStore::new(dir.path());
        let subjects: Vec<_> = (0..5).map(|_| svc().new_subject()).collect();
        for subject in &subjects {
            store.write(subject, "x", false).unwrap();
        }

        let listed: Vec<_> = store.list_all(&svc()).unwrap().into_iter().map(|f| f.subject).collect();
        assert_eq!(listed, subjects);
        assert_eq!(store.find_latest(&svc()).unwrap().unwrap().subject, subjects[4]);
    }

    #[test]
    fn test_rewrite_moves_file_to_newest() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialFileStore::new(dir.path());
        let first = svc().new_subject();
        let second = svc().new_subject();
        store.write(&first, "a", false).unwrap();
        store.write(&second, "b", false).unwrap();
        store.write(&first, "c", true).unwrap();

        assert_eq!(store.find_latest(&svc()).unwrap().unwrap().subject, first);
    }

    #[test]
    fn test_listing_is_scoped_to_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialFileStore::new(dir.path());
        let svc1 = Identity::parse("svc-1").unwrap();
        store.write(&svc().new_subject(), "a", false).unwrap();
        store.write(&svc1.new_subject(), "b", false).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a credential").unwrap();

        assert_eq!(store.list_all(&svc()).unwrap().len(), 1);
        assert_eq!(store.list_all(&svc1).unwrap().len(), 1);
        assert_eq!(store.list_identities().unwrap(), vec![svc(), svc1]);
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialFileStore::new(dir.path().join("absent"));
        assert!(store.list_all(&svc()).unwrap().is_empty());
        assert!(store.find_latest(&svc()).unwrap().is_none());
        assert!(matches!(
            store.read(&store.path_for("cms-svc-x")),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialFileStore::new(dir.path());
        store.write(&svc().new_subject(), "a", false).unwrap();
        let file = store.find_latest(&svc()).unwrap().unwrap();

        store.delete(&file).unwrap();
        assert!(store.list_all(&svc()).unwrap().is_empty());
        assert!(matches!(store.delete(&file), Err(VaultError::Io(_))));
    }
}
