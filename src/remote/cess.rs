use std::path::Path;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::config::RemoteConfig;

use super::{ByteStream, RemoteError, RemoteStore};

/// Client for a CESS deoss gateway.
///
/// Every request carries the four fixed credential headers (`Territory`,
/// `Account`, `Message`, `Signature`) from configuration. No retries or
/// explicit timeouts; a transient gateway failure surfaces to the caller.
pub struct CessStore {
    base_url: String,
    client: Client,
    territory: String,
    account: String,
    message: String,
    signature: String,
}

/// Envelope wrapping every gateway JSON response.
#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<GatewayData>,
}

#[derive(Debug, Deserialize)]
struct GatewayData {
    #[serde(default)]
    fid: Option<String>,
}

impl CessStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, anyhow::Error> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("CESS base URL is not configured"))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder().build()?,
            territory: config.territory.clone(),
            account: config.account.clone(),
            message: config.message.clone(),
            signature: config.signature.clone(),
        })
    }

    fn with_credentials(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Territory", &self.territory)
            .header("Account", &self.account)
            .header("Message", &self.message)
            .header("Signature", &self.signature)
    }

    fn upload_url(&self) -> String {
        format!("{}/file", self.base_url)
    }

    fn download_url(&self, hash: &str) -> String {
        format!("{}/file/download/{hash}", self.base_url)
    }

    fn delete_url(&self, hash: &str) -> String {
        format!("{}/file/{hash}", self.base_url)
    }
}

/// Turn a non-success HTTP response into a gateway error carrying the
/// upstream status and message.
async fn gateway_error(resp: reqwest::Response) -> RemoteError {
    let status = resp.status().as_u16();
    let message = match resp.json::<GatewayResponse>().await {
        Ok(body) => body.msg.unwrap_or_else(|| "gateway request failed".into()),
        Err(_) => "gateway request failed".into(),
    };
    RemoteError::Gateway { status, message }
}

#[async_trait]
impl RemoteStore for CessStore {
    async fn upload(
        &self,
        spool_path: &Path,
        filename: &str,
        mime_type: &str,
    ) -> Result<String, RemoteError> {
        let file = tokio::fs::File::open(spool_path).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let part = Part::stream(body)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        let resp = self
            .with_credentials(self.client.put(self.upload_url()))
            .multipart(form)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(gateway_error(resp).await);
        }

        let body: GatewayResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if body.code != 200 {
            return Err(RemoteError::Gateway {
                status: body.code.try_into().unwrap_or(500),
                message: body.msg.unwrap_or_else(|| "upload failed".into()),
            });
        }

        body.data
            .and_then(|d| d.fid)
            .ok_or_else(|| RemoteError::Gateway {
                status: 500,
                message: "gateway returned no fid".into(),
            })
    }

    async fn download(&self, hash: &str) -> Result<ByteStream, RemoteError> {
        let resp = self
            .with_credentials(self.client.get(self.download_url(hash)))
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(hash.to_string()));
        }

        if !resp.status().is_success() {
            return Err(gateway_error(resp).await);
        }

        Ok(Box::pin(
            resp.bytes_stream()
                .map_err(|e| RemoteError::Transport(e.to_string())),
        ))
    }

    async fn delete(&self, hash: &str) -> Result<(), RemoteError> {
        let resp = self
            .with_credentials(self.client.delete(self.delete_url(hash)))
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(gateway_error(resp).await);
        }

        let body: GatewayResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if body.code != 200 {
            return Err(RemoteError::Gateway {
                status: body.code.try_into().unwrap_or(500),
                message: body.msg.unwrap_or_else(|| "delete failed".into()),
            });
        }

        Ok(())
    }
}
