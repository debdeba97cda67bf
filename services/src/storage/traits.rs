//! Storage trait definitions.

use super::types::{ContributionUpload, ObjectStream};
use std::future::Future;

/// Generic interface over the places contribution images live.
///
/// A reference returned by [`FileStorage::put`] must be enough for the same
/// backend to find the bytes again without any other state.
///
/// See [module documentation](super) for the available backends.
pub trait FileStorage: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist an upload and return its reference.
    fn put(
        &self,
        upload: ContributionUpload,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;

    /// Open the object behind `reference` for incremental reading.
    fn open_read_stream(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<ObjectStream, Self::Error>> + Send;

    /// Name the object should carry when handed to a user.
    fn derive_filename(&self, reference: &str) -> String;

    /// Remove the object. Returns `false` if nothing was stored there.
    fn delete(&self, reference: &str) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Check whether the backend is reachable.
    fn could_connected(&self) -> impl Future<Output = bool> + Send;
}
