//! HTTP handlers.
//!
//! - `contribute` - image upload into a collection
//! - `export` - zip download of a collection's contributions
//! - `collections` - collection CRUD
//! - `types` - request/response bodies

pub mod collections;
pub mod contribute;
pub mod export;
pub mod types;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::database::SqlStorage;
use crate::rate_limit::RateLimiter;
use crate::storage::{FileStorage, StorageError};

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState<S, F> {
    pub sql_storage: S,
    pub file_storage: F,
    pub rate_limiter: RateLimiter,
}

impl<S, F> AppState<S, F> {
    pub fn new(sql_storage: S, file_storage: F, rate_limiter: RateLimiter) -> Self {
        Self {
            sql_storage,
            file_storage,
            rate_limiter,
        }
    }
}

/// Routes requiring a bearer token.
pub fn routes<S, F>(max_upload_bytes: usize) -> Router<AppState<S, F>>
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    Router::new()
        .route(
            "/contribute/{collection_id}",
            post(contribute::contribute::<S, F>)
                .layer(DefaultBodyLimit::max(contribute::body_limit(max_upload_bytes))),
        )
        .route(
            "/collections",
            get(collections::list::<S, F>).post(collections::create::<S, F>),
        )
        .route("/collections/owned", get(collections::list_owned::<S, F>))
        .route(
            "/collections/{id}",
            get(collections::get::<S, F>).delete(collections::delete::<S, F>),
        )
        .route("/collections/{id}/zip", get(export::export_zip::<S, F>))
}
