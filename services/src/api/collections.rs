//! Collection CRUD handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use super::AppState;
use super::types::{
    CollectionCreateRequest, CollectionDetail, CollectionItem, CollectionsListQuery,
    CollectionsListResponse, MessageResponse,
};
use crate::auth::RequireAuth;
use crate::database::{CollectionCreate, CollectionsSearchParams, SqlStorage};
use crate::error::ApiError;
use crate::storage::{FileStorage, StorageError};

/// Search collections by name, newest first.
pub async fn list<S, F>(
    State(state): State<AppState<S, F>>,
    _auth: RequireAuth,
    WithRejection(Query(query), _): WithRejection<Query<CollectionsListQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError>
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    let params = CollectionsSearchParams {
        query: query.query.clone(),
        limit: query.limit(),
        offset: query.offset(),
    };

    let rows = state
        .sql_storage
        .collections_search(params)
        .await
        .map_err(|e| ApiError::database("Failed to fetch collections", e))?;
    let total = state
        .sql_storage
        .collections_count(query.query.clone())
        .await
        .map_err(|e| ApiError::database("Failed to fetch collections", e))?;

    Ok(Json(CollectionsListResponse {
        collections: rows.into_iter().map(CollectionItem::from).collect(),
        total,
        page: query.page(),
        limit: query.limit(),
    }))
}

pub async fn list_owned<S, F>(
    State(state): State<AppState<S, F>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError>
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    let rows = state
        .sql_storage
        .collections_list_owned(auth.user_id())
        .await
        .map_err(|e| ApiError::database("Server error", e))?;

    Ok(Json(
        rows.into_iter()
            .map(CollectionItem::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn get<S, F>(
    State(state): State<AppState<S, F>>,
    _auth: RequireAuth,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError>
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    let collection = state
        .sql_storage
        .collections_get(id)
        .await
        .map_err(|e| ApiError::database("Internal server error", e))?
        .ok_or_else(|| ApiError::not_found("collection not found"))?;

    let contribution_count = state
        .sql_storage
        .contributions_count(id)
        .await
        .map_err(|e| ApiError::database("Internal server error", e))?;

    Ok(Json(CollectionDetail {
        id: collection.id,
        name: collection.name,
        description: collection.description,
        contribution_count,
    }))
}

pub async fn create<S, F>(
    State(state): State<AppState<S, F>>,
    auth: RequireAuth,
    WithRejection(Json(payload), _): WithRejection<Json<CollectionCreateRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError>
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Collection name is required"));
    }

    let input = CollectionCreate {
        name: name.to_owned(),
        description: payload
            .description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty()),
        created_by: auth.user_id(),
    };

    let row = state
        .sql_storage
        .collections_create(input)
        .await
        .map_err(|e| ApiError::database("Failed to create collection", e))?;

    tracing::info!(collection_id = row.id, owner = row.created_by, "Collection created");

    Ok((StatusCode::CREATED, Json(CollectionItem::from(row))))
}

/// Delete an owned collection and, best effort, its stored objects.
///
/// The row and its contribution records go in one transaction that also
/// returns every removed reference; objects are removed after the commit so a
/// failure here can only leave unreferenced objects behind.
pub async fn delete<S, F>(
    State(state): State<AppState<S, F>>,
    auth: RequireAuth,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError>
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    let owned = state
        .sql_storage
        .collections_get(id)
        .await
        .map_err(|e| ApiError::database("Server error", e))?
        .is_some_and(|c| c.created_by == auth.user_id());
    if !owned {
        return Err(ApiError::not_found(
            "collection not found or not owned by user",
        ));
    }

    let references = state
        .sql_storage
        .collections_delete(id, auth.user_id())
        .await
        .map_err(|e| ApiError::database("Server error", e))?
        .ok_or_else(|| ApiError::not_found("collection not found or not owned by user"))?;

    let mut removed = 0usize;
    for reference in &references {
        match state.file_storage.delete(reference).await {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => tracing::warn!(reference = %reference, error = %e, "Failed to remove object"),
        }
    }

    tracing::info!(
        collection_id = id,
        owner = auth.user_id(),
        objects = references.len(),
        removed,
        "Collection deleted"
    );

    Ok(Json(MessageResponse::new("collection deleted successfully")))
}
