use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account stored in redb.
///
/// Rows are created on registration and read on login; they are never
/// updated or deleted in-app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password_hash: String,
    pub wallet: String,
    pub created_at: DateTime<Utc>,
}

/// Metadata mirror of an object held by the remote storage network.
///
/// A record exists locally only once the remote store has confirmed the
/// object (best-effort, no two-phase commit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Content identifier (fid) returned by the remote store
    pub hash: String,
    /// Owning user uuid
    pub user_id: String,
    pub byte_size: u64,
    /// Original filename as supplied at upload
    pub filename: String,
    pub created_at: DateTime<Utc>,
}
