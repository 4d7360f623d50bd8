use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::TryStreamExt;
use tokio_util::io::ReaderStream;

use super::{ByteStream, RemoteError, RemoteStore};

/// Local filesystem remote store for development and testing.
///
/// Content identifiers are generated uuids rather than network hashes.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn object_path(&self, hash: &str) -> PathBuf {
        self.base_path.join(hash)
    }
}

#[async_trait]
impl RemoteStore for LocalStore {
    async fn upload(
        &self,
        spool_path: &Path,
        _filename: &str,
        _mime_type: &str,
    ) -> Result<String, RemoteError> {
        let hash = uuid::Uuid::new_v4().to_string();
        tokio::fs::copy(spool_path, self.object_path(&hash)).await?;
        Ok(hash)
    }

    async fn download(&self, hash: &str) -> Result<ByteStream, RemoteError> {
        let path = self.object_path(hash);
        if !path.exists() {
            return Err(RemoteError::NotFound(hash.to_string()));
        }
        let file = tokio::fs::File::open(&path).await?;
        Ok(Box::pin(ReaderStream::new(file).map_err(RemoteError::from)))
    }

    async fn delete(&self, hash: &str) -> Result<(), RemoteError> {
        let path = self.object_path(hash);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }
}
