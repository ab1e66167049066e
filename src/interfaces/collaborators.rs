use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domains::ai::UserRecord;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMetadata {
    pub source: String,
}

/// Reference to a transaction recorded by the blockchain service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRef {
    pub digest: String,
    pub url: String,
}

/// Content committed on chain for one RAG log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobPayload {
    pub ai_id: String,
    pub creator_address: String,
    pub name: String,
    pub category: String,
    pub contents: String,
    pub comments: String,
    pub content_hash: String,
    pub embedding: Value,
}

/// External vector index holding the RAG contents.
#[async_trait]
pub trait EmbeddingIndex: Send + Sync {
    /// Indexes `contents[i]` under `handles[i]`. The result is opaque to the registry.
    async fn add_text(
        &self,
        contents: Vec<String>,
        metadata: Vec<TextMetadata>,
        handles: Vec<String>,
    ) -> Result<Value>;

    async fn delete_texts(&self, handles: Vec<String>) -> Result<()>;
}

#[async_trait]
pub trait BlockchainRecorder: Send + Sync {
    async fn register_ai(&self, ai_id: &str, owner_address: &str) -> Result<()>;
    async fn store_blob(&self, payload: &BlobPayload) -> Result<TransactionRef>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup_user(&self, address: &str) -> Result<Option<UserRecord>>;
}
