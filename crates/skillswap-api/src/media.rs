use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

use skillswap_media::Append;
use skillswap_types::api::{Claims, UploadOffsetQuery, UploadStatus};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Largest single chunk accepted by `PUT /uploads/{id}`.
pub const MAX_CHUNK_BYTES: usize = 64 * 1024 * 1024;

/// POST /uploads: start a staged upload for a fresh recording.
pub async fn create_upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let id = Uuid::new_v4();
    state
        .media
        .create_upload(&claims.sub.to_string(), &id.to_string())
        .await?;
    debug!("{} started upload {}", claims.sub, id);

    Ok((
        StatusCode::CREATED,
        Json(UploadStatus {
            id,
            bytes_received: 0,
        }),
    ))
}

/// GET /uploads/{id}: where to resume from.
pub async fn upload_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(upload_id): Path<Uuid>,
) -> ApiResult<Json<UploadStatus>> {
    let bytes_received = state
        .media
        .upload_size(&claims.sub.to_string(), &upload_id.to_string())
        .await?
        .ok_or(ApiError::NotFound("upload"))?;

    Ok(Json(UploadStatus {
        id: upload_id,
        bytes_received,
    }))
}

/// PUT /uploads/{id}?offset=N: append the body if N is where the upload ends.
pub async fn append_upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(upload_id): Path<Uuid>,
    Query(query): Query<UploadOffsetQuery>,
    body: Bytes,
) -> ApiResult<Json<UploadStatus>> {
    let outcome = state
        .media
        .append(
            &claims.sub.to_string(),
            &upload_id.to_string(),
            query.offset,
            &body,
        )
        .await?;

    match outcome {
        Append::Written { bytes_received } => Ok(Json(UploadStatus {
            id: upload_id,
            bytes_received,
        })),
        Append::OffsetMismatch { expected } => Err(ApiError::UploadOffset { expected }),
        Append::NotFound => Err(ApiError::NotFound("upload")),
    }
}

/// DELETE /uploads/{id}: abandon a recording before it is published.
pub async fn discard_upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(upload_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let (owner, id) = (claims.sub.to_string(), upload_id.to_string());
    if state.media.upload_size(&owner, &id).await?.is_none() {
        return Err(ApiError::NotFound("upload"));
    }
    state.media.discard_upload(&owner, &id).await?;
    debug!("{} discarded upload {}", claims.sub, upload_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /media/{*path}: public download of a promoted blob.
pub async fn download(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let file_path = state.media.public_path(&path).ok_or(ApiError::NotFound("media"))?;

    let file = match tokio::fs::File::open(&file_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("media"));
        }
        Err(e) => return Err(ApiError::Internal(format!("open {}: {}", file_path.display(), e))),
    };
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .len();

    let headers = [
        (header::CONTENT_TYPE, content_type(&path).to_string()),
        (header::CONTENT_LENGTH, len.to_string()),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))))
}

fn content_type(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("webm") => "video/webm",
        Some("mp4") => "video/mp4",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
