use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{Config, ListingConfig};
use crate::domains::ai::{
    AiDetail, AiEntity, AiOverview, CreateAiRequest, DeleteAiRequest, DeletedAi, NewRagLog, Page,
    RagLogEntry, UpdateAiRequest, UsagePatch,
};
use crate::error::{AiRegistryError, Result};
use crate::ids::{content_digest, derive_ai_id, new_index_handle, validate_creator_address};
use crate::interfaces::collaborators::{
    BlobPayload, BlockchainRecorder, EmbeddingIndex, TextMetadata, UserDirectory,
};
use crate::providers::blockchain::HttpBlockchainRecorder;
use crate::providers::embedding::HttpEmbeddingIndex;
use crate::services::saga::{Compensation, Saga};
use crate::store::AiStore;

/// Entry point for every AI operation exposed to the HTTP layer.
pub struct AiRegistry {
    store: Arc<AiStore>,
    users: Arc<dyn UserDirectory>,
    embeddings: Arc<dyn EmbeddingIndex>,
    chain: Arc<dyn BlockchainRecorder>,
    listing: ListingConfig,
}

/// Collaborators a multi-step write holds on to once it is detached from the caller.
#[derive(Clone)]
struct Writer {
    store: Arc<AiStore>,
    embeddings: Arc<dyn EmbeddingIndex>,
    chain: Arc<dyn BlockchainRecorder>,
}

impl AiRegistry {
    pub fn new(
        store: Arc<AiStore>,
        users: Arc<dyn UserDirectory>,
        embeddings: Arc<dyn EmbeddingIndex>,
        chain: Arc<dyn BlockchainRecorder>,
        listing: ListingConfig,
    ) -> Self {
        Self {
            store,
            users,
            embeddings,
            chain,
            listing,
        }
    }

    /// Opens the SQLite store and HTTP collaborators described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(AiStore::new(config.sqlite_path()).await?);
        let embeddings = Arc::new(HttpEmbeddingIndex::new(&config.embedding)?);
        let chain = Arc::new(HttpBlockchainRecorder::new(&config.blockchain)?);
        Ok(Self::new(
            store.clone(),
            store,
            embeddings,
            chain,
            config.listing(),
        ))
    }

    pub async fn list_ais(&self, offset: i64, limit: Option<i64>) -> Result<Vec<AiEntity>> {
        self.store.list_ais(self.page(offset, limit)).await
    }

    pub async fn get_ai(&self, ai_id: &str) -> Result<Option<AiEntity>> {
        self.store.get_ai(ai_id).await
    }

    pub async fn get_detail(&self, ai_id: &str) -> Result<Option<AiDetail>> {
        self.store.get_detail(ai_id).await
    }

    pub async fn recent_overview(&self) -> Result<Vec<AiOverview>> {
        self.store
            .recent_overview(self.listing.today_count())
            .await
    }

    pub async fn list_trending(
        &self,
        offset: i64,
        limit: Option<i64>,
        category: Option<&str>,
    ) -> Result<Vec<AiEntity>> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        self.store
            .list_by_weekly_users(self.page(offset, limit), category)
            .await
    }

    pub async fn search_by_name(&self, fragment: &str) -> Result<Vec<AiEntity>> {
        self.store.search_by_name(fragment).await
    }

    pub async fn list_by_creator(&self, creator_address: &str) -> Result<Vec<AiEntity>> {
        self.store.list_by_creator(creator_address).await
    }

    pub async fn list_rag_entries(&self, ai_id: &str) -> Result<Vec<RagLogEntry>> {
        self.store.list_rag_entries(ai_id).await
    }

    pub async fn update_usage(&self, ai_id: &str, patch: &UsagePatch) -> Result<Option<AiEntity>> {
        self.store.update_usage(ai_id, patch).await
    }

    /// Creates an AI: local checks, row reservation, index write, chain
    /// registration, chain blob, RAG row. A failure reverts what it can.
    ///
    /// Everything after the local checks runs on a detached task, so a caller
    /// that stops waiting never leaves a half-created AI behind.
    pub async fn create_ai(&self, request: &CreateAiRequest) -> Result<AiEntity> {
        let request = request.trimmed();
        validate_creator_address(&request.creator_address)?;
        if request.name.is_empty() {
            return Err(AiRegistryError::Validation("name must not be blank".to_string()));
        }
        if request.rag_contents.trim().is_empty() {
            return Err(AiRegistryError::Validation(
                "rag_contents must not be blank".to_string(),
            ));
        }

        let ai_id = derive_ai_id(&request.creator_address, &request.name);
        if self.store.ai_exists(&ai_id).await? {
            return Err(AiRegistryError::Conflict(format!(
                "AI {ai_id} already exists"
            )));
        }
        if self
            .users
            .lookup_user(&request.creator_address)
            .await?
            .is_none()
        {
            return Err(AiRegistryError::NotAuthorized(format!(
                "{} is not a registered user",
                request.creator_address
            )));
        }

        let writer = self.writer();
        detached(async move { writer.create(ai_id, request).await }).await
    }

    /// Owner-only profile update, optionally appending new RAG content.
    pub async fn update_ai(&self, request: &UpdateAiRequest) -> Result<AiEntity> {
        let ai = self.owned_ai(&request.ai_id, &request.creator_address).await?;

        if let Some(contents) = request
            .contents
            .as_deref()
            .filter(|contents| !contents.trim().is_empty())
        {
            let writer = self.writer();
            let (target, contents, comments) =
                (ai.clone(), contents.to_string(), request.comments.clone());
            detached(async move { writer.append(target, contents, comments).await }).await?;
        }

        self.store
            .update_profile(&ai.ai_id, &request.profile)
            .await?
            .ok_or_else(|| not_found(&ai.ai_id))
    }

    /// Owner-only delete of the AI and its RAG logs, then of their index entries.
    pub async fn delete_ai(&self, request: &DeleteAiRequest) -> Result<DeletedAi> {
        let ai = self.owned_ai(&request.ai_id, &request.creator_address).await?;
        let deleted = self
            .store
            .delete_ai_cascade(&ai.ai_id)
            .await?
            .ok_or_else(|| not_found(&ai.ai_id))?;

        let handles: Vec<String> = deleted
            .rag_logs
            .iter()
            .map(|log| log.faiss_id.clone())
            .collect();
        if !handles.is_empty() {
            if let Err(err) = self.embeddings.delete_texts(handles).await {
                warn!(ai_id = %ai.ai_id, error = %err, "failed to remove embedding handles");
            }
        }
        info!(ai_id = %ai.ai_id, logs = deleted.rag_logs.len(), "AI deleted");
        Ok(deleted)
    }

    async fn owned_ai(&self, ai_id: &str, creator_address: &str) -> Result<AiEntity> {
        let ai = self
            .store
            .get_ai(ai_id)
            .await?
            .ok_or_else(|| not_found(ai_id))?;
        if ai.creator_address != creator_address.trim() {
            return Err(AiRegistryError::NotAuthorized(format!(
                "{creator_address} is not the owner of AI {ai_id}"
            )));
        }
        Ok(ai)
    }

    fn writer(&self) -> Writer {
        Writer {
            store: self.store.clone(),
            embeddings: self.embeddings.clone(),
            chain: self.chain.clone(),
        }
    }

    fn page(&self, offset: i64, limit: Option<i64>) -> Page {
        let limit = limit
            .unwrap_or_else(|| self.listing.default_page_size())
            .clamp(0, self.listing.max_page_size());
        Page::new(offset.max(0), limit)
    }
}

impl Writer {
    async fn create(self, ai_id: String, request: CreateAiRequest) -> Result<AiEntity> {
        let ai = self.store.create_ai(&ai_id, &request.new_ai()).await?;
        let mut saga = Saga::new(&ai_id);
        saga.compensate_with(Compensation::RemoveEntity);

        match self
            .append_rag_log(&ai, &request.rag_contents, &request.rag_comments, true, &mut saga)
            .await
        {
            Ok(entry) => {
                info!(ai_id = %ai.ai_id, creator = %ai.creator_address, tx = %entry.tx_hash, "AI created");
                Ok(ai)
            }
            Err(err) => Err(saga
                .abort(&self.store, self.embeddings.as_ref(), err)
                .await),
        }
    }

    async fn append(self, ai: AiEntity, contents: String, comments: String) -> Result<RagLogEntry> {
        let mut saga = Saga::for_update(&ai.ai_id);
        match self
            .append_rag_log(&ai, &contents, &comments, false, &mut saga)
            .await
        {
            Ok(entry) => {
                info!(ai_id = %ai.ai_id, tx = %entry.tx_hash, "RAG content appended");
                Ok(entry)
            }
            Err(err) => Err(saga
                .abort(&self.store, self.embeddings.as_ref(), err)
                .await),
        }
    }

    async fn append_rag_log(
        &self,
        ai: &AiEntity,
        contents: &str,
        comments: &str,
        register: bool,
        saga: &mut Saga,
    ) -> Result<RagLogEntry> {
        let handle = new_index_handle();
        let embedding = self
            .embeddings
            .add_text(
                vec![contents.to_string()],
                vec![TextMetadata {
                    source: ai.ai_id.clone(),
                }],
                vec![handle.clone()],
            )
            .await?;
        saga.compensate_with(Compensation::RemoveEmbeddings(vec![handle.clone()]));

        if register {
            self.chain
                .register_ai(&ai.ai_id, &ai.creator_address)
                .await?;
            saga.irreversible(format!("chain registration of {}", ai.ai_id));
        }

        let payload = BlobPayload {
            ai_id: ai.ai_id.clone(),
            creator_address: ai.creator_address.clone(),
            name: ai.name.clone(),
            category: ai.category.clone(),
            contents: contents.to_string(),
            comments: comments.to_string(),
            content_hash: content_digest(contents),
            embedding,
        };
        let tx = self.chain.store_blob(&payload).await?;
        saga.irreversible(format!("chain blob {}", tx.digest));

        self.store
            .create_rag_entry(&NewRagLog {
                ai_id: ai.ai_id.clone(),
                comments: comments.to_string(),
                tx_hash: tx.digest,
                tx_url: tx.url,
                faiss_id: handle,
            })
            .await
    }
}

/// Runs `write` on its own task; dropping the awaiting future does not cancel it.
async fn detached<T, F>(write: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(write)
        .await
        .map_err(|e| AiRegistryError::Runtime(e.to_string()))?
}

fn not_found(ai_id: &str) -> AiRegistryError {
    AiRegistryError::NotFound(format!("AI {ai_id} not found"))
}
