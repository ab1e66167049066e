use async_trait::async_trait;
use serde_json::json;

use crate::config::BlockchainConfig;
use crate::error::{AiRegistryError, Result};
use crate::interfaces::collaborators::{BlobPayload, BlockchainRecorder, TransactionRef};
use crate::providers::http::JsonEndpoint;

/// Client for the chain gateway (`POST /ais`, `POST /blobs`).
pub struct HttpBlockchainRecorder {
    endpoint: JsonEndpoint,
    explorer_url: Option<String>,
}

impl HttpBlockchainRecorder {
    pub fn new(config: &BlockchainConfig) -> Result<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new(
                "blockchain",
                &config.base_url,
                config.api_key.clone(),
                config.timeout(),
            )?,
            explorer_url: config
                .explorer_url
                .as_ref()
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
        })
    }

    fn tx_url(&self, digest: &str) -> String {
        match &self.explorer_url {
            Some(explorer) => format!("{explorer}/tx/{digest}"),
            None => digest.to_string(),
        }
    }
}

#[async_trait]
impl BlockchainRecorder for HttpBlockchainRecorder {
    async fn register_ai(&self, ai_id: &str, owner_address: &str) -> Result<()> {
        self.endpoint
            .post(
                "ais",
                &json!({"ai_id": ai_id, "creator_address": owner_address}),
            )
            .await?;
        Ok(())
    }

    async fn store_blob(&self, payload: &BlobPayload) -> Result<TransactionRef> {
        let response = self.endpoint.post("blobs", payload).await?;
        let digest = response
            .get("digest")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|digest| !digest.is_empty())
            .ok_or_else(|| {
                AiRegistryError::collaborator(
                    self.endpoint.service(),
                    "blob response did not contain a transaction digest",
                )
            })?;
        Ok(TransactionRef {
            digest: digest.to_string(),
            url: self.tx_url(digest),
        })
    }
}
