//! Collaborative image collections: contributions are normalized, stored on
//! local disk or S3, recorded in PostgreSQL and exported as streamed zips.

use crate::api::AppState;
use crate::config::Config;
use crate::database::SqlStorage;
use crate::rate_limit::RateLimiter;
use crate::storage::{FileStorage, StorageError};
use axum::{
    Router,
    extract::{Extension, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{any, get},
};
use opentelemetry::{global, propagation::Extractor};
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub mod api;
pub mod archive;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod imaging;
pub mod rate_limit;
pub mod storage;
pub mod telemetry;

pub const BUILD_DATE: &str = env!("BUILD_DATE");
pub const BUILD_COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_BRANCH: &str = env!("BUILD_BRANCH");

/// `<package version>+<commit>`, reported by the health check.
pub fn service_version() -> String {
    format!("{}+{}", env!("CARGO_PKG_VERSION"), BUILD_COMMIT)
}

struct HeaderExtractor<'a>(&'a axum::http::HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Build the application router.
///
/// The rate limiter is created here from `config`, so every router owns its
/// own contribution window.
pub fn routes<S, F>(sql_storage: S, file_storage: F, config: Config) -> Router
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    let rate_limiter = RateLimiter::new(
        config.contribution_rate_limit(),
        config.contribution_rate_window(),
    );
    routes_with_limiter(sql_storage, file_storage, config, rate_limiter)
}

/// Like [`routes`], sharing an existing limiter (e.g. one pruned by a
/// background task).
pub fn routes_with_limiter<S, F>(
    sql_storage: S,
    file_storage: F,
    config: Config,
    rate_limiter: RateLimiter,
) -> Router
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    let state = AppState::new(sql_storage, file_storage, rate_limiter);

    Router::new()
        .route("/is-health", get(health_check::<S, F>))
        .merge(api::routes::<S, F>(config.max_upload_bytes()))
        .fallback(any(catch_all))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let parent_context = global::get_text_map_propagator(|propagator| {
                    propagator.extract(&HeaderExtractor(request.headers()))
                });

                let span = tracing::info_span!(
                    "http_request",
                    http_request.method = ?request.method(),
                    http_request.uri = ?request.uri(),
                    http_request.version = ?request.version(),
                    http_request.user_agent = ?request.headers().get(axum::http::header::USER_AGENT),
                );
                span.set_parent(parent_context);

                span
            }),
        )
        .layer(Extension(config))
        .with_state(state)
}

/// 200 when both the database and the file storage answer, 502 otherwise.
async fn health_check<S, F>(
    State(state): State<AppState<S, F>>,
    Extension(config): Extension<Config>,
) -> impl IntoResponse
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    let database_ok = state.sql_storage.is_connected().await;
    let storage_ok = state.file_storage.could_connected().await;

    let mut response = if database_ok && storage_ok {
        (StatusCode::OK, "OK").into_response()
    } else {
        tracing::warn!(database_ok, storage_ok, "Health check failed");
        (StatusCode::BAD_GATEWAY, "502").into_response()
    };

    let headers = response.headers_mut();
    if let Ok(env) = HeaderValue::from_str(&config.environment().to_string()) {
        headers.insert(HeaderName::from_static("x-service-env"), env);
    }
    if let Ok(version) = HeaderValue::from_str(&service_version()) {
        headers.insert(HeaderName::from_static("x-service-version"), version);
    }

    response
}

async fn catch_all() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}
