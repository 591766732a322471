//! Local filesystem upload storage

use super::{StorageError, StorageResult, StoredUpload, UploadStore, UploadedFile};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Filesystem storage backend
///
/// Each upload gets its own UUID directory under the storage root so that
/// original filenames never collide:
///
/// ```text
/// form_uploads/
/// ├── 550e8400-e29b-41d4-a716-446655440000/
/// │   └── resume.pdf
/// └── a3bb189e-8bf9-4a9a-b5c7-9f9c3b8e5d7a/
///     └── photo.png
/// ```
///
/// The entry's directory modification time doubles as its age for the
/// garbage-collection sweep.
#[derive(Debug, Clone)]
pub struct LocalUploadStore {
    root: PathBuf,
}

impl LocalUploadStore {
    /// Create a store rooted at `root`
    ///
    /// The directory is created on first write, not here.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidPath`] if `root` exists but is not a
    /// directory.
    pub fn new(root: PathBuf) -> StorageResult<Self> {
        if root.exists() && !root.is_dir() {
            return Err(StorageError::InvalidPath(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Storage root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a stored relative path against the root, rejecting anything
    /// that would escape it
    fn resolve(&self, relative: &str) -> StorageResult<PathBuf> {
        let path = Path::new(relative);
        let safe = path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || path.components().count() != 2 {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(path))
    }

    /// Strip directory components from a client-supplied filename
    fn sanitize_filename(filename: &str) -> String {
        let name = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();
        if name.is_empty() || name == "." || name == ".." {
            "upload".to_string()
        } else {
            name.to_string()
        }
    }
}

#[async_trait]
impl UploadStore for LocalUploadStore {
    async fn store(&self, file: UploadedFile) -> StorageResult<StoredUpload> {
        let id = Uuid::new_v4().to_string();
        let name = Self::sanitize_filename(&file.filename);

        let dir = self.root.join(&id);
        fs::create_dir_all(&dir).await?;

        let path = dir.join(&name);
        let mut f = fs::File::create(&path).await?;
        f.write_all(&file.data).await?;
        f.flush().await?;

        Ok(StoredUpload {
            path: format!("{id}/{name}"),
            name,
            size: file.size(),
        })
    }

    async fn read(&self, upload: &StoredUpload) -> StorageResult<Vec<u8>> {
        let path = self.resolve(&upload.path)?;
        if !path.exists() {
            return Err(StorageError::NotFound(upload.path.clone()));
        }
        Ok(fs::read(&path).await?)
    }

    async fn delete(&self, upload: &StoredUpload) -> StorageResult<()> {
        let path = self.resolve(&upload.path)?;
        // Remove the whole UUID directory; idempotent when already gone
        if let Some(dir) = path.parent() {
            if dir.exists() {
                fs::remove_dir_all(dir).await?;
            }
        }
        Ok(())
    }

    async fn sweep(&self, grace: Duration) -> StorageResult<u64> {
        if !self.root.exists() {
            return Ok(0);
        }
        let cutoff = SystemTime::now()
            .checked_sub(grace)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut removed = 0;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            if modified <= cutoff {
                fs::remove_dir_all(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
