//! Note storage behind the trust boundary.
//!
//! Provides the [`NoteStore`] trait consumed by the tool layer and a
//! filesystem-backed implementation, [`FsNoteStore`]. Stores only accept
//! [`ValidatedPath`]s and still re-check containment themselves.

pub mod fs;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::security::ValidatedPath;

pub use fs::FsNoteStore;

/// Size and modification time of a note.
#[derive(Debug, Clone, Serialize)]
pub struct NoteMetadata {
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn read(&self, path: &ValidatedPath) -> Result<String, StoreError>;

    /// Create or replace the note, creating parent folders as needed.
    async fn write(&self, path: &ValidatedPath, content: &str) -> Result<(), StoreError>;

    /// Create the note only if nothing is there yet. Fails with
    /// [`StoreError::AlreadyExists`] otherwise, atomically with the check.
    async fn create(&self, path: &ValidatedPath, content: &str) -> Result<(), StoreError>;

    async fn exists(&self, path: &ValidatedPath) -> Result<bool, StoreError>;

    /// Every markdown note in the vault as a root-relative `/`-separated path, sorted.
    async fn list_markdown_files(&self) -> Result<Vec<String>, StoreError>;

    async fn create_folder(&self, path: &ValidatedPath) -> Result<(), StoreError>;

    async fn metadata(&self, path: &ValidatedPath) -> Result<NoteMetadata, StoreError>;
}
