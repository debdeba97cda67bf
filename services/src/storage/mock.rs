//! Mock file storage for testing.

use super::naming;
use super::traits::FileStorage;
use super::types::{ContributionUpload, ObjectStream, StorageError};
use bytes::Bytes;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const SCHEME: &str = "memory://";
const CHUNK_SIZE: usize = 8 * 1024;

/// In-memory implementation of `FileStorage` for testing.
///
/// Keys follow the local-disk layout; references are `memory://<key>`.
#[derive(Clone, Default)]
pub struct MockFileStorage {
    files: Arc<RwLock<HashMap<String, Bytes>>>,
    unreachable: bool,
}

impl MockFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A storage whose health check fails.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.files.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.files
            .read()
            .expect("lock poisoned")
            .contains_key(reference)
    }

    /// Drop an object behind the record store's back.
    pub fn lose(&self, reference: &str) -> bool {
        self.files
            .write()
            .expect("lock poisoned")
            .remove(reference)
            .is_some()
    }

    pub fn references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self
            .files
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        refs.sort();
        refs
    }
}

impl FileStorage for MockFileStorage {
    type Error = StorageError;

    async fn put(&self, upload: ContributionUpload) -> Result<String, Self::Error> {
        let reference = format!(
            "{}{}/{}",
            SCHEME,
            upload.collection_id,
            naming::local_file_name(&upload)
        );
        self.files
            .write()
            .expect("lock poisoned")
            .insert(reference.clone(), Bytes::from(upload.content));
        Ok(reference)
    }

    async fn open_read_stream(&self, reference: &str) -> Result<ObjectStream, Self::Error> {
        if !reference.starts_with(SCHEME) {
            return Err(StorageError::InvalidReference(reference.to_owned()));
        }
        let content = self
            .files
            .read()
            .expect("lock poisoned")
            .get(reference)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(reference.to_owned()))?;

        let chunks: Vec<std::io::Result<Bytes>> = (0..content.len())
            .step_by(CHUNK_SIZE)
            .map(|start| Ok(content.slice(start..(start + CHUNK_SIZE).min(content.len()))))
            .collect();
        Ok(futures_util::stream::iter(chunks).boxed())
    }

    fn derive_filename(&self, reference: &str) -> String {
        naming::last_segment(reference).to_owned()
    }

    async fn delete(&self, reference: &str) -> Result<bool, Self::Error> {
        Ok(self.lose(reference))
    }

    async fn could_connected(&self) -> bool {
        !self.unreachable
    }
}
