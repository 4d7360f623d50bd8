mod cess;
mod local;

pub use cess::CessStore;
pub use local::LocalStore;

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Gateway error ({status}): {message}")]
    Gateway { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Streaming body handed back from a remote download.
pub type ByteStream = BoxStream<'static, Result<Bytes, RemoteError>>;

/// Abstraction over the external storage network.
///
/// Objects are addressed by the content identifier (fid) the network hands
/// back at upload time; the metadata DB is the only map from users to fids.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload the spooled file, returning the content identifier assigned
    /// by the remote store.
    async fn upload(
        &self,
        spool_path: &Path,
        filename: &str,
        mime_type: &str,
    ) -> Result<String, RemoteError>;

    /// Stream the object's bytes.
    async fn download(&self, hash: &str) -> Result<ByteStream, RemoteError>;

    /// Remove the object from the remote store.
    async fn delete(&self, hash: &str) -> Result<(), RemoteError>;
}
