//! `POST /contribute/{collectionId}`

use axum::{
    Json,
    extract::{Extension, FromRequest, Multipart, Path, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use axum_extra::extract::WithRejection;

use super::AppState;
use super::types::{ContributeJson, ContributeResponse};
use crate::auth::RequireAuth;
use crate::config::Config;
use crate::database::{ContributionInsert, SqlStorage};
use crate::error::ApiError;
use crate::imaging;
use crate::storage::{ContributionUpload, FileStorage, StorageError};

const SAVE_FAILED: &str = "Failed to save contribution";
const NO_IMAGE: &str = "No base64 image provided";

/// Room for the JSON or multipart envelope around the image.
const ENVELOPE_SLACK: usize = 16 * 1024;

/// Multipart fields accepted as the image.
const IMAGE_FIELDS: [&str; 2] = ["image", "file"];

/// Standard alphabet, padding optional.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug)]
struct RawImage {
    bytes: Vec<u8>,
    file_name: Option<String>,
}

/// Accept an image for a collection.
///
/// Steps, in order: authenticate (extractor), check the collection exists,
/// apply the per-user rate limit, read and normalize the image, store the
/// object, record it. If recording fails the stored object is removed again.
pub async fn contribute<S, F>(
    State(state): State<AppState<S, F>>,
    Extension(config): Extension<Config>,
    auth: RequireAuth,
    WithRejection(Path(collection_id), _): WithRejection<Path<i64>, ApiError>,
    request: Request,
) -> Result<impl IntoResponse, ApiError>
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    let user_id = auth.user_id();

    match state.sql_storage.collections_get(collection_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(ApiError::not_found("collection not found")),
        Err(e) => return Err(ApiError::database(SAVE_FAILED, e)),
    }

    state.rate_limiter.check(user_id).map_err(|retry_after| {
        tracing::info!(
            user_id,
            collection_id,
            retry_after_secs = retry_after.as_secs(),
            "Contribution rate limit exceeded"
        );
        ApiError::RateLimited { retry_after }
    })?;

    let raw = read_image(request, config.max_upload_bytes()).await?;
    let received = raw.bytes.len();
    let normalized = imaging::normalize_image_blocking(raw.bytes).await?;

    let mut upload = ContributionUpload::new(collection_id, user_id, normalized);
    if let Some(name) = raw.file_name {
        upload = upload.with_original_name(name);
    }

    let file_url = state
        .file_storage
        .put(upload)
        .await
        .map_err(|e| ApiError::storage(SAVE_FAILED, e))?;

    let insert = ContributionInsert {
        collection_id,
        user_id,
        file_url: file_url.clone(),
    };

    match state.sql_storage.contributions_insert(insert).await {
        Ok(row) => {
            tracing::info!(
                contribution_id = row.id,
                collection_id,
                user_id,
                received,
                file_url = %row.file_url,
                "Contribution stored"
            );
            Ok((
                StatusCode::CREATED,
                Json(ContributeResponse {
                    message: "Contribution uploaded".to_owned(),
                    file_url: row.file_url,
                }),
            ))
        }
        Err(e) => {
            discard_orphan(&state.file_storage, &file_url).await;
            Err(ApiError::database(SAVE_FAILED, e))
        }
    }
}

/// Best-effort removal of an object whose record could not be written.
async fn discard_orphan<F>(storage: &F, file_url: &str)
where
    F: FileStorage<Error = StorageError>,
{
    match storage.delete(file_url).await {
        Ok(_) => tracing::warn!(file_url, "Removed object left without a record"),
        Err(e) => tracing::error!(file_url, error = %e, "Failed to remove orphaned object"),
    }
}

/// Request body cap for an image of at most `max_image_bytes`.
///
/// Sized for the base64 form, so both upload paths accept the same images;
/// the decoded size is checked against `max_image_bytes` afterwards.
pub fn body_limit(max_image_bytes: usize) -> usize {
    max_image_bytes
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(ENVELOPE_SLACK)
}

fn ensure_within(bytes: &[u8], limit: usize) -> Result<(), ApiError> {
    if bytes.len() > limit {
        return Err(ApiError::PayloadTooLarge { limit });
    }
    Ok(())
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

async fn read_image(request: Request, limit: usize) -> Result<RawImage, ApiError> {
    if is_multipart(&request) {
        read_multipart(request, limit).await
    } else {
        read_json(request, limit).await
    }
}

async fn read_multipart(request: Request, limit: usize) -> Result<RawImage, ApiError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ApiError::validation(e.body_text()))?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(ApiError::validation(NO_IMAGE)),
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(ApiError::PayloadTooLarge { limit });
            }
            Err(e) => return Err(ApiError::validation(e.body_text())),
        };

        if !field.name().is_some_and(|name| IMAGE_FIELDS.contains(&name)) {
            continue;
        }

        let file_name = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge { limit }
            } else {
                ApiError::validation(e.body_text())
            }
        })?;

        if bytes.is_empty() {
            return Err(ApiError::validation(NO_IMAGE));
        }
        ensure_within(&bytes, limit)?;
        return Ok(RawImage {
            bytes: bytes.to_vec(),
            file_name,
        });
    }
}

async fn read_json(request: Request, limit: usize) -> Result<RawImage, ApiError> {
    let Json(body) = Json::<ContributeJson>::from_request(request, &())
        .await
        .map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge { limit }
            } else {
                ApiError::validation(e.body_text())
            }
        })?;

    let encoded = body
        .image
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation(NO_IMAGE))?;

    let bytes = decode_base64_image(encoded)?;
    ensure_within(&bytes, limit)?;

    Ok(RawImage {
        bytes,
        file_name: body.name,
    })
}

/// Decode a bare base64 payload or a `data:<mime>;base64,<payload>` URL.
fn decode_base64_image(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match encoded.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| ApiError::validation("Malformed data URL"))?,
        None => encoded,
    };

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = LENIENT_BASE64
        .decode(compact)
        .map_err(|_| ApiError::validation("Image is not valid base64"))?;

    if bytes.is_empty() {
        return Err(ApiError::validation(NO_IMAGE));
    }
    Ok(bytes)
}
