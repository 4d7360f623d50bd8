use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::remote_error;
use crate::api::response::{ApiError, AppQuery, JSend, JSendPaginated, Pagination};
use crate::auth::AuthUser;
use crate::storage::models::FileRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub hash: String,
    pub filename: String,
    pub byte_size: u64,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub fid: String,
    pub filename: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub hash: String,
    pub filename: String,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

/// Removes the spool file when dropped, so the upload artifact is cleaned
/// up on every exit path.
struct SpoolGuard {
    path: PathBuf,
}

impl Drop for SpoolGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove spool file");
            }
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<JSend<UploadResponse>>, ApiError> {
    let spool_dir = state.spool_dir();
    tokio::fs::create_dir_all(&spool_dir)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let mut spooled: Option<(SpoolGuard, String, Option<String>, u64)> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        if field.name() != Some("file") {
            // Ignore unknown fields
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload.bin".to_string());
        let content_type = field.content_type().map(|s| s.to_string());

        let path = spool_dir.join(uuid::Uuid::new_v4().to_string());
        let guard = SpoolGuard { path: path.clone() };

        let mut out = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;

        let mut size: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?
        {
            size += chunk.len() as u64;
            if size > state.config.max_upload_size {
                return Err(ApiError::payload_too_large(format!(
                    "File exceeds maximum upload size of {} bytes",
                    state.config.max_upload_size
                )));
            }
            out.write_all(&chunk)
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;
        }
        out.flush()
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;

        spooled = Some((guard, filename, content_type, size));
    }

    let (guard, filename, content_type, size) =
        spooled.ok_or_else(|| ApiError::bad_request("file field is required"))?;

    // Determine MIME type: from multipart Content-Type, or guess from filename, or fallback
    let mime_type = content_type
        .filter(|ct| ct != "application/octet-stream")
        .or_else(|| {
            mime_guess::from_path(&filename)
                .first()
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    // Phase 1: Forward the spooled bytes to the remote store
    let fid = state
        .remote
        .upload(&guard.path, &filename, &mime_type)
        .await
        .map_err(remote_error)?;

    // Phase 2: Mirror the metadata locally. A record only exists once the
    // remote store has confirmed the object, so a failure here leaves an
    // orphaned remote object rather than a dangling local row.
    let record = FileRecord {
        hash: fid.clone(),
        user_id,
        byte_size: size,
        filename: filename.clone(),
        created_at: Utc::now(),
    };
    if let Err(e) = state.db.put_file(&record) {
        tracing::error!(fid = %fid, error = %e, "Stored object has no local metadata row");
        return Err(ApiError::internal(e.to_string()));
    }

    tracing::debug!(fid = %fid, user_id = %record.user_id, size, "Uploaded file");

    Ok(JSend::success(UploadResponse {
        fid,
        filename,
        size,
    }))
}

pub async fn download_file(
    State(state): State<Arc<AppState>>,
    AuthUser(_user_id): AuthUser,
    Path(hash): Path<String>,
) -> Result<Response, ApiError> {
    // Look up local metadata by hash
    let file = state
        .db
        .get_file(&hash)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    // Pipe the remote byte stream straight through. Errors mid-stream, after
    // headers have gone out, terminate the connection instead of producing a
    // response.
    let stream = state.remote.download(&hash).await.map_err(remote_error)?;

    let mut response = (StatusCode::OK, Body::from_stream(stream)).into_response();
    let headers = response.headers_mut();

    let mime_type = mime_guess::from_path(&file.filename).first_or_octet_stream();
    headers.insert(
        header::CONTENT_TYPE,
        mime_type
            .as_ref()
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        header::HeaderValue::from(file.byte_size),
    );

    let disposition = format!(
        "attachment; filename=\"{}\"",
        disposition_filename(&file.filename)
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        header::HeaderValue::from_str(&disposition)
            .unwrap_or_else(|_| header::HeaderValue::from_static("attachment")),
    );

    Ok(response)
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(hash): Path<String>,
) -> Result<Json<JSend<DeleteResponse>>, ApiError> {
    // Verify the file exists AND belongs to the caller
    let file = state
        .db
        .get_file_owned(&hash, &user_id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| {
            ApiError::not_found("File not found or you do not have permission to delete this file")
        })?;

    // Phase 1: Remove the object from the remote store
    state.remote.delete(&hash).await.map_err(remote_error)?;

    // Phase 2: Remove the local row. Zero rows removed after a successful
    // remote delete means the mirror is inconsistent.
    let removed = state
        .db
        .delete_file(&hash)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !removed {
        tracing::error!(fid = %hash, "Remote delete succeeded but no local row was removed");
        return Err(ApiError::internal("File metadata inconsistent after delete"));
    }

    tracing::debug!(fid = %hash, user_id = %user_id, "Deleted file");

    Ok(JSend::success(DeleteResponse {
        hash,
        filename: file.filename,
        size: file.byte_size,
    }))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<JSendPaginated<FileResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    match state.db.list_files_by_user(&user_id) {
        Ok(files) => {
            let total = files.len() as u64;
            let items: Vec<FileResponse> = files
                .iter()
                .skip(params.offset as usize)
                .take(params.limit as usize)
                .map(file_to_response)
                .collect();

            Ok(JSendPaginated::success(
                items,
                Pagination {
                    limit: params.limit,
                    offset: params.offset,
                    total,
                },
            ))
        }
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn file_to_response(file: &FileRecord) -> FileResponse {
    FileResponse {
        hash: file.hash.clone(),
        filename: file.filename.clone(),
        byte_size: file.byte_size,
        created_at: file.created_at.to_rfc3339(),
    }
}

/// Quoted-string safe rendition of the stored filename. Characters that a
/// header value cannot carry, or that would close the quotes, become
/// underscores.
fn disposition_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect()
}
