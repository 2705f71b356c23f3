//! Filesystem vault store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

use super::{NoteMetadata, NoteStore};
use crate::error::StoreError;
use crate::security::path::is_within_root;
use crate::security::ValidatedPath;

/// Notes stored as plain files under a root directory.
pub struct FsNoteStore {
    root: PathBuf,
}

impl FsNoteStore {
    /// The root must exist; it is canonicalized once here so symlinked roots work.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root).map_err(|source| StoreError::Io {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, path: &ValidatedPath) -> PathBuf {
        path.resolve(&self.root)
    }

    /// Canonicalize the deepest existing ancestor of `target` and make sure it is
    /// still under the root. Catches symlinks that point out of the vault.
    async fn check_contained(&self, path: &ValidatedPath, target: &Path) -> Result<(), StoreError> {
        let mut cursor = target.to_path_buf();
        loop {
            match tokio::fs::canonicalize(&cursor).await {
                Ok(real) => {
                    return if is_within_root(&self.root, &real) {
                        Ok(())
                    } else {
                        tracing::warn!(path = %path, real = %real.display(), "vault escape blocked");
                        Err(StoreError::OutsideRoot(path.to_string()))
                    };
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    if !cursor.pop() {
                        return Err(StoreError::OutsideRoot(path.to_string()));
                    }
                }
                Err(source) => {
                    return Err(StoreError::Io {
                        path: path.to_string(),
                        source,
                    })
                }
            }
        }
    }

    fn io_error(path: &ValidatedPath, source: std::io::Error) -> StoreError {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_string())
        } else {
            StoreError::Io {
                path: path.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl NoteStore for FsNoteStore {
    async fn read(&self, path: &ValidatedPath) -> Result<String, StoreError> {
        let target = self.locate(path);
        self.check_contained(path, &target).await?;
        tokio::fs::read_to_string(&target)
            .await
            .map_err(|e| Self::io_error(path, e))
    }

    async fn write(&self, path: &ValidatedPath, content: &str) -> Result<(), StoreError> {
        let target = self.locate(path);
        self.check_contained(path, &target).await?;
        if let Some(parent) = path.parent() {
            self.create_folder(&parent).await?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| Self::io_error(path, e))?;
        tracing::debug!(path = %path, bytes = content.len(), "note written");
        Ok(())
    }

    async fn create(&self, path: &ValidatedPath, content: &str) -> Result<(), StoreError> {
        let target = self.locate(path);
        self.check_contained(path, &target).await?;
        if let Some(parent) = path.parent() {
            self.create_folder(&parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.to_string()),
                _ => Self::io_error(path, e),
            })?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Self::io_error(path, e))?;
        file.flush().await.map_err(|e| Self::io_error(path, e))?;
        tracing::debug!(path = %path, bytes = content.len(), "note created");
        Ok(())
    }

    async fn exists(&self, path: &ValidatedPath) -> Result<bool, StoreError> {
        let target = self.locate(path);
        self.check_contained(path, &target).await?;
        tokio::fs::try_exists(&target)
            .await
            .map_err(|e| Self::io_error(path, e))
    }

    async fn list_markdown_files(&self) -> Result<Vec<String>, StoreError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || collect_markdown(&root))
            .await
            .map_err(|e| StoreError::Io {
                path: String::new(),
                source: std::io::Error::other(format!("listing task failed: {e}")),
            })?
    }

    async fn create_folder(&self, path: &ValidatedPath) -> Result<(), StoreError> {
        let target = self.locate(path);
        self.check_contained(path, &target).await?;
        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| Self::io_error(path, e))
    }

    async fn metadata(&self, path: &ValidatedPath) -> Result<NoteMetadata, StoreError> {
        let target = self.locate(path);
        self.check_contained(path, &target).await?;
        let meta = tokio::fs::metadata(&target)
            .await
            .map_err(|e| Self::io_error(path, e))?;
        Ok(NoteMetadata {
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }
}

/// Walk the vault, skipping hidden entries and symlinks.
fn collect_markdown(root: &Path) -> Result<Vec<String>, StoreError> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });

    let mut out = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| root.display().to_string());
            StoreError::Io {
                path,
                source: e.into(),
            }
        })?;
        if !entry.file_type().is_file()
            || !entry.file_name().to_string_lossy().to_ascii_lowercase().ends_with(".md")
        {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            let rel: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(rel.join("/"));
        }
    }

    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::PathValidator;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FsNoteStore, PathValidator) {
        let tmp = TempDir::new().unwrap();
        let store = FsNoteStore::open(tmp.path()).unwrap();
        let validator = PathValidator::new(store.root());
        (tmp, store, validator)
    }

    #[tokio::test]
    async fn write_then_read_creates_parent_folders() {
        let (_tmp, store, v) = setup();
        let path = v.validate("Projects/deep/a.md").unwrap();
        store.write(&path, "# A").await.unwrap();
        assert_eq!(store.read(&path).await.unwrap(), "# A");
        assert!(store.exists(&path).await.unwrap());
        assert_eq!(store.metadata(&path).await.unwrap().size, 3);
    }

    #[tokio::test]
    async fn missing_note_is_not_found() {
        let (_tmp, store, v) = setup();
        let path = v.validate("nope.md").unwrap();
        assert!(matches!(
            store.read(&path).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn listing_skips_hidden_and_non_markdown() {
        let (tmp, store, v) = setup();
        store.write(&v.validate("b.md").unwrap(), "b").await.unwrap();
        store.write(&v.validate("x/a.md").unwrap(), "a").await.unwrap();
        std::fs::write(tmp.path().join("image.png"), b"png").unwrap();
        std::fs::create_dir_all(tmp.path().join(".obsidian")).unwrap();
        std::fs::write(tmp.path().join(".obsidian/config.md"), "hidden").unwrap();

        let files = store.list_markdown_files().await.unwrap();
        assert_eq!(files, vec!["b.md".to_string(), "x/a.md".to_string()]);
    }

    #[tokio::test]
    async fn create_never_replaces_an_existing_note() {
        let (_tmp, store, v) = setup();
        let path = v.validate("Inbox/new.md").unwrap();
        store.create(&path, "first").await.unwrap();
        assert!(matches!(
            store.create(&path, "second").await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert_eq!(store.read(&path).await.unwrap(), "first");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn listing_does_not_follow_symlinks() {
        let (tmp, store, v) = setup();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("elsewhere.md"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();
        store.write(&v.validate("kept.md").unwrap(), "k").await.unwrap();

        let files = store.list_markdown_files().await.unwrap();
        assert_eq!(files, vec!["kept.md".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_out_of_vault_is_refused() {
        let (tmp, store, v) = setup();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.md"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();

        let path = v.validate("link/secret.md").unwrap();
        assert!(matches!(
            store.read(&path).await,
            Err(StoreError::OutsideRoot(_))
        ));
        assert!(matches!(
            store.write(&path, "pwned").await,
            Err(StoreError::OutsideRoot(_))
        ));
    }
}
