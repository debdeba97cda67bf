//! Contribution file storage.
//!
//! [`FileStorage`] is implemented by:
//! - [`LocalDisk`]: one directory per collection under the uploads root
//! - [`S3Disk`]: S3 (or compatible) object storage through OpenDAL
//! - [`MockFileStorage`]: in-memory, for tests
//!
//! [`StorageBackend`] picks between the first two from configuration.

mod backend;
mod local;
mod mock;
pub mod naming;
mod s3;
mod traits;
mod types;

pub use backend::StorageBackend;
pub use local::LocalDisk;
pub use mock::MockFileStorage;
pub use s3::S3Disk;
pub use traits::FileStorage;
pub use types::{
    CONTRIBUTION_CONTENT_TYPE, ContributionUpload, DEFAULT_UPLOAD_NAME, ObjectStream,
    StorageError,
};
