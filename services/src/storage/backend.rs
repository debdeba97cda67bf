//! Backend chosen once at startup.

use super::local::LocalDisk;
use super::s3::S3Disk;
use super::traits::FileStorage;
use super::types::{ContributionUpload, ObjectStream, StorageError};
use crate::config::Config;

/// The configured storage strategy, injected into the router state.
#[derive(Clone)]
pub enum StorageBackend {
    Local(LocalDisk),
    S3(S3Disk),
}

impl StorageBackend {
    /// `ENABLE_S3` selects object storage, otherwise files go under `UPLOADS_DIR`.
    pub fn from_config(config: &Config) -> Result<Self, StorageError> {
        match config.s3() {
            Some(settings) => {
                tracing::info!(
                    bucket = %settings.bucket,
                    region = %settings.region,
                    "Using S3 storage backend"
                );
                Ok(Self::S3(S3Disk::new(settings)?))
            }
            None => {
                tracing::info!(
                    root = %config.uploads_dir().display(),
                    "Using local storage backend"
                );
                Ok(Self::Local(LocalDisk::new(config.uploads_dir())))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::S3(_) => "s3",
        }
    }
}

impl FileStorage for StorageBackend {
    type Error = StorageError;

    async fn put(&self, upload: ContributionUpload) -> Result<String, Self::Error> {
        match self {
            Self::Local(disk) => disk.put(upload).await,
            Self::S3(disk) => disk.put(upload).await,
        }
    }

    async fn open_read_stream(&self, reference: &str) -> Result<ObjectStream, Self::Error> {
        match self {
            Self::Local(disk) => disk.open_read_stream(reference).await,
            Self::S3(disk) => disk.open_read_stream(reference).await,
        }
    }

    fn derive_filename(&self, reference: &str) -> String {
        match self {
            Self::Local(disk) => disk.derive_filename(reference),
            Self::S3(disk) => disk.derive_filename(reference),
        }
    }

    async fn delete(&self, reference: &str) -> Result<bool, Self::Error> {
        match self {
            Self::Local(disk) => disk.delete(reference).await,
            Self::S3(disk) => disk.delete(reference).await,
        }
    }

    async fn could_connected(&self) -> bool {
        match self {
            Self::Local(disk) => disk.could_connected().await,
            Self::S3(disk) => disk.could_connected().await,
        }
    }
}
