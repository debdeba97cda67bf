//! Local filesystem storage.
//!
//! Objects live in one directory per collection under the uploads root and
//! the reference is the file path itself.

use super::naming;
use super::traits::FileStorage;
use super::types::{ContributionUpload, ObjectStream, StorageError};
use futures_util::StreamExt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio_util::io::ReaderStream;

#[derive(Clone, Debug)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a reference to a path, refusing anything outside the root.
    fn resolve(&self, reference: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(reference);
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir));
        if escapes || !path.starts_with(&self.root) {
            return Err(StorageError::InvalidReference(reference.to_owned()));
        }
        Ok(path.to_path_buf())
    }
}

impl FileStorage for LocalDisk {
    type Error = StorageError;

    async fn put(&self, upload: ContributionUpload) -> Result<String, Self::Error> {
        let dir = self.root.join(upload.collection_id.to_string());
        // create_dir_all is a no-op for existing directories, so racing uploads are fine.
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(naming::local_file_name(&upload));
        tokio::fs::write(&path, &upload.content).await?;

        tracing::debug!(path = %path.display(), size = upload.content.len(), "Stored contribution on disk");
        Ok(path.to_string_lossy().into_owned())
    }

    async fn open_read_stream(&self, reference: &str) -> Result<ObjectStream, Self::Error> {
        let path = self.resolve(reference)?;
        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound(reference.to_owned())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(ReaderStream::new(file).boxed())
    }

    fn derive_filename(&self, reference: &str) -> String {
        Path::new(reference)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| reference.to_owned())
    }

    async fn delete(&self, reference: &str) -> Result<bool, Self::Error> {
        let path = self.resolve(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn could_connected(&self) -> bool {
        tokio::fs::create_dir_all(&self.root).await.is_ok()
    }
}
