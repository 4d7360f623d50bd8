mod accounts;
mod admin;
mod files;

use axum::http::StatusCode;

use crate::api::response::ApiError;
use crate::remote::RemoteError;

pub use accounts::{login, register};
pub use admin::{admin_purge, health};
pub use files::{delete_file, download_file, list_files, upload_file};

/// Map a RemoteError to an ApiError, propagating the gateway's status code
/// and message where available.
fn remote_error(e: RemoteError) -> ApiError {
    match e {
        RemoteError::NotFound(hash) => ApiError::not_found(format!("Object not found: {hash}")),
        RemoteError::Gateway { status, message } => {
            match StatusCode::from_u16(status) {
                Ok(code) if code.is_client_error() => ApiError::Fail(code, message),
                Ok(code) if code.is_server_error() => ApiError::Error(code, message),
                _ => ApiError::internal(message),
            }
        }
        RemoteError::Transport(msg) => {
            ApiError::unavailable(format!("Storage network unavailable: {msg}"))
        }
        RemoteError::Io(e) => ApiError::internal(e.to_string()),
    }
}
