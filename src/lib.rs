//! chainvault - REST gateway for a decentralized storage network
//!
//! This crate provides user accounts and file proxying with:
//! - Password-hashed accounts and signed bearer tokens (argon2 + JWT)
//! - Swappable remote storage backends (CESS-style HTTP gateway, local filesystem)
//! - redb embedded database mirroring file metadata (ACID, MVCC, crash-safe)
//! - REST API with multipart upload and streaming download

pub mod api;
pub mod auth;
pub mod config;
pub mod remote;
pub mod storage;

use std::sync::Arc;

use config::Config;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub remote: Arc<dyn remote::RemoteStore>,
}

impl AppState {
    /// Directory where incoming uploads are spooled before being forwarded
    /// to the remote store.
    pub fn spool_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.config.node.data_dir).join("spool")
    }
}
