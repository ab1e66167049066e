use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::CollaboratorConfig;
use crate::error::{AiRegistryError, Result};
use crate::interfaces::collaborators::{EmbeddingIndex, TextMetadata};
use crate::providers::http::JsonEndpoint;

/// Client for the vector-index service (`POST /add_text`, `POST /delete_text`).
pub struct HttpEmbeddingIndex {
    endpoint: JsonEndpoint,
}

impl HttpEmbeddingIndex {
    pub fn new(config: &CollaboratorConfig) -> Result<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new(
                "embedding",
                &config.base_url,
                config.api_key.clone(),
                config.timeout(),
            )?,
        })
    }
}

#[async_trait]
impl EmbeddingIndex for HttpEmbeddingIndex {
    async fn add_text(
        &self,
        contents: Vec<String>,
        metadata: Vec<TextMetadata>,
        handles: Vec<String>,
    ) -> Result<Value> {
        if contents.len() != handles.len() || contents.len() != metadata.len() {
            return Err(AiRegistryError::Validation(
                "contents, metadata and handles must have the same length".to_string(),
            ));
        }
        self.endpoint
            .post(
                "add_text",
                &json!({"contents": contents, "metadatas": metadata, "ids": handles}),
            )
            .await
    }

    async fn delete_texts(&self, handles: Vec<String>) -> Result<()> {
        if handles.is_empty() {
            return Ok(());
        }
        self.endpoint
            .post("delete_text", &json!({"ids": handles}))
            .await?;
        Ok(())
    }
}
