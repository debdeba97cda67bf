//! `GET /collections/{id}/zip`

use axum::{
    extract::{Path, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;

use super::AppState;
use crate::archive;
use crate::auth::RequireAuth;
use crate::database::SqlStorage;
use crate::error::ApiError;
use crate::storage::{FileStorage, StorageError};

pub fn archive_file_name(collection_id: i64) -> String {
    format!("collection_{collection_id}_contributions.zip")
}

/// Stream every contribution of a collection as one zip archive.
///
/// Headers are sent as soon as the contribution list is known; a storage
/// failure afterwards aborts the body.
pub async fn export_zip<S, F>(
    State(state): State<AppState<S, F>>,
    auth: RequireAuth,
    WithRejection(Path(collection_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Response, ApiError>
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    let contributions = state
        .sql_storage
        .contributions_list_by_collection(collection_id)
        .await
        .map_err(|e| ApiError::database("Failed to create zip", e))?;

    if contributions.is_empty() {
        return Err(ApiError::not_found("No contributions found"));
    }

    tracing::info!(
        collection_id,
        user_id = auth.user_id(),
        entries = contributions.len(),
        "Starting zip export"
    );

    let references: Vec<String> = contributions.into_iter().map(|c| c.file_url).collect();
    let body = archive::stream_archive(state.file_storage.clone(), references);

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "application/zip".to_owned()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", archive_file_name(collection_id)),
            ),
        ],
        body,
    )
        .into_response())
}
