use std::fs;
use std::path::PathBuf;

use anyhow::Context;

use crate::application::AppError;

/// Flat filesystem storage for loan application paperwork. Documents are
/// stored directly under a root directory, keyed by file name; saving an
/// existing name replaces the previous upload.
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Open a store rooted at the given directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create document root {}", root.display()))?;
        Ok(Self { root })
    }

    /// Save a document, replacing any existing one with the same name.
    pub fn save(&self, name: &str, contents: &[u8]) -> Result<PathBuf, AppError> {
        let path = self.root.join(name);
        fs::write(&path, contents)
            .with_context(|| format!("Failed to save document {}", path.display()))?;
        Ok(path)
    }

    /// Load a document's contents by name.
    pub fn load(&self, name: &str) -> Result<Vec<u8>, AppError> {
        let path = self.root.join(name);
        if !path.exists() {
            return Err(AppError::DocumentNotFound(name.to_string()));
        }
        Ok(fs::read(&path)
            .with_context(|| format!("Failed to load document {}", path.display()))?)
    }

    /// List the names of all stored documents.
    pub fn list(&self) -> Result<Vec<String>, AppError> {
        let mut names = Vec::new();
        let dir = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read document root {}", self.root.display()))?;

        for dir_entry in dir {
            let dir_entry = dir_entry.context("Failed to read document directory entry")?;
            if dir_entry.path().is_file() {
                names.push(dir_entry.file_name().to_string_lossy().into_owned());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Bulk delete of every stored document. Deliberately inert: the
    /// recursive delete this once performed also removed the storage root
    /// itself and was disabled after review. Kept as a documented no-op.
    pub fn purge(&self) {}
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn test_store() -> (DocumentStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = DocumentStore::open(temp_dir.path().join("documents")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_save_and_load() {
        let (store, _temp) = test_store();
        store.save("income-proof.pdf", b"statement").unwrap();

        let contents = store.load("income-proof.pdf").unwrap();
        assert_eq!(contents, b"statement");
    }

    #[test]
    fn test_save_replaces_existing() {
        let (store, _temp) = test_store();
        store.save("contract.pdf", b"v1").unwrap();
        store.save("contract.pdf", b"v2").unwrap();

        assert_eq!(store.load("contract.pdf").unwrap(), b"v2");
    }

    #[test]
    fn test_load_missing_document() {
        let (store, _temp) = test_store();
        let err = store.load("nope.pdf").unwrap_err();
        assert!(matches!(err, AppError::DocumentNotFound(_)));
    }

    #[test]
    fn test_list_is_sorted() {
        let (store, _temp) = test_store();
        store.save("b.pdf", b"b").unwrap();
        store.save("a.pdf", b"a").unwrap();

        assert_eq!(store.list().unwrap(), vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn test_purge_is_inert() {
        let (store, _temp) = test_store();
        store.save("keep.pdf", b"keep").unwrap();

        store.purge();

        assert_eq!(store.list().unwrap(), vec!["keep.pdf"]);
    }
}
