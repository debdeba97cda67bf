//! Streaming zip export.
//!
//! The archive is written on a spawned task into one half of an in-memory
//! pipe while the response body reads the other half, so at most
//! [`PIPE_CAPACITY`] bytes of compressed output are buffered and a slow
//! client back-pressures the storage reads.

use crate::storage::{FileStorage, StorageError};
use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, DeflateOption, ZipEntryBuilder};
use axum::body::Body;
use bytes::Bytes;
use futures_util::io::AsyncWriteExt;
use futures_util::{StreamExt, TryStreamExt, future, stream};
use std::io;
use tokio::io::DuplexStream;
use tokio_util::io::ReaderStream;

pub const PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to read {reference}: {source}")]
    Source {
        reference: String,
        #[source]
        source: StorageError,
    },

    #[error("Zip writer error: {0}")]
    Zip(#[from] async_zip::error::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Build a response body containing one deflated entry per reference, in
/// order, named by [`FileStorage::derive_filename`].
///
/// Any failure aborts the body with an error instead of finishing the
/// archive, so a client never mistakes a partial download for a complete one.
pub fn stream_archive<F>(storage: F, references: Vec<String>) -> Body
where
    F: FileStorage<Error = StorageError>,
{
    let (sink, source) = tokio::io::duplex(PIPE_CAPACITY);
    let entries = references.len();
    let writer = tokio::spawn(write_archive(storage, references, sink));

    let outcome = stream::once(async move {
        let tail: Option<io::Result<Bytes>> = match writer.await {
            Ok(Ok(())) => {
                tracing::debug!(entries, "Zip export finished");
                None
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Zip export aborted");
                Some(Err(io::Error::other(e)))
            }
            Err(e) => {
                tracing::error!(error = %e, "Zip export task panicked");
                Some(Err(io::Error::other(e)))
            }
        };
        tail
    })
    .filter_map(future::ready);

    Body::from_stream(ReaderStream::new(source).chain(outcome))
}

async fn write_archive<F>(
    storage: F,
    references: Vec<String>,
    sink: DuplexStream,
) -> Result<(), ArchiveError>
where
    F: FileStorage<Error = StorageError>,
{
    let mut zip = ZipFileWriter::with_tokio(sink);

    for reference in &references {
        let mut object = storage.open_read_stream(reference).await.map_err(|source| {
            ArchiveError::Source {
                reference: reference.clone(),
                source,
            }
        })?;

        let name = storage.derive_filename(reference);
        let builder = ZipEntryBuilder::new(name.into(), Compression::Deflate)
            .deflate_option(DeflateOption::Maximum);
        let mut entry = zip.write_entry_stream(builder).await?;

        while let Some(chunk) = object.try_next().await.map_err(|e| ArchiveError::Source {
            reference: reference.clone(),
            source: StorageError::Io(e),
        })? {
            entry.write_all(&chunk).await?;
        }
        entry.close().await?;
    }

    zip.close().await?;
    Ok(())
}
