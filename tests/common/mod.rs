#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use ai_registry::config::ListingConfig;
use ai_registry::domains::ai::{CreateAiRequest, NewAi};
use ai_registry::error::{AiRegistryError, Result};
use ai_registry::interfaces::collaborators::{
    BlobPayload, BlockchainRecorder, EmbeddingIndex, TextMetadata, TransactionRef,
};
use ai_registry::services::registry::AiRegistry;
use ai_registry::store::AiStore;

#[derive(Debug, Clone)]
pub struct IndexedText {
    pub content: String,
    pub source: String,
    pub handle: String,
}

#[derive(Default)]
pub struct FakeIndex {
    pub fail_add: AtomicBool,
    pub fail_delete: AtomicBool,
    pub added: Mutex<Vec<IndexedText>>,
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl EmbeddingIndex for FakeIndex {
    async fn add_text(
        &self,
        contents: Vec<String>,
        metadata: Vec<TextMetadata>,
        handles: Vec<String>,
    ) -> Result<Value> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(AiRegistryError::collaborator("embedding", "index unavailable"));
        }
        let mut added = self.added.lock().await;
        for ((content, meta), handle) in contents.into_iter().zip(metadata).zip(handles.clone()) {
            added.push(IndexedText {
                content,
                source: meta.source,
                handle,
            });
        }
        Ok(json!([[0.25, 0.5], handles]))
    }

    async fn delete_texts(&self, handles: Vec<String>) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AiRegistryError::collaborator("embedding", "index unavailable"));
        }
        self.deleted.lock().await.extend(handles);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeChain {
    pub fail_register: AtomicBool,
    pub fail_blob: AtomicBool,
    pub register_delay_ms: AtomicU64,
    pub registered: Mutex<Vec<(String, String)>>,
    pub blobs: Mutex<Vec<BlobPayload>>,
}

#[async_trait]
impl BlockchainRecorder for FakeChain {
    async fn register_ai(&self, ai_id: &str, owner_address: &str) -> Result<()> {
        let delay = self.register_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(AiRegistryError::collaborator("blockchain", "rejected"));
        }
        self.registered
            .lock()
            .await
            .push((ai_id.to_string(), owner_address.to_string()));
        Ok(())
    }

    async fn store_blob(&self, payload: &BlobPayload) -> Result<TransactionRef> {
        if self.fail_blob.load(Ordering::SeqCst) {
            return Err(AiRegistryError::collaborator("blockchain", "gas exhausted"));
        }
        let mut blobs = self.blobs.lock().await;
        blobs.push(payload.clone());
        let digest = format!("digest-{}", blobs.len());
        Ok(TransactionRef {
            url: format!("https://explorer.test/tx/{digest}"),
            digest,
        })
    }
}

pub struct Harness {
    pub db: NamedTempFile,
    pub store: Arc<AiStore>,
    pub index: Arc<FakeIndex>,
    pub chain: Arc<FakeChain>,
    pub registry: Arc<AiRegistry>,
}

pub async fn harness() -> Harness {
    harness_with_listing(ListingConfig::default()).await
}

pub async fn harness_with_listing(listing: ListingConfig) -> Harness {
    let db = NamedTempFile::new().unwrap();
    let store = Arc::new(AiStore::new(db.path().to_str().unwrap()).await.unwrap());
    let index = Arc::new(FakeIndex::default());
    let chain = Arc::new(FakeChain::default());
    let registry = Arc::new(AiRegistry::new(
        store.clone(),
        store.clone(),
        index.clone(),
        chain.clone(),
        listing,
    ));
    Harness {
        db,
        store,
        index,
        chain,
        registry,
    }
}

pub async fn temp_store() -> (NamedTempFile, AiStore) {
    let db = NamedTempFile::new().unwrap();
    let store = AiStore::new(db.path().to_str().unwrap()).await.unwrap();
    (db, store)
}

pub fn new_ai(creator: &str, name: &str, category: &str) -> NewAi {
    NewAi {
        creator_address: creator.to_string(),
        name: name.to_string(),
        image_url: format!("https://img.test/{name}.png"),
        category: category.to_string(),
        introductions: format!("I am {name}"),
    }
}

pub fn create_request(creator: &str, name: &str, contents: &str) -> CreateAiRequest {
    CreateAiRequest {
        creator_address: creator.to_string(),
        name: name.to_string(),
        image_url: String::new(),
        category: "assistant".to_string(),
        introductions: String::new(),
        rag_contents: contents.to_string(),
        rag_comments: "initial knowledge".to_string(),
    }
}
