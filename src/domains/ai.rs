use serde::{Deserialize, Serialize};

/// One AI persona as stored in the `ais` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiEntity {
    pub ai_id: String,
    pub creator_address: String,
    pub created_at: i64,
    pub name: String,
    pub image_url: String,
    pub category: String,
    pub introductions: String,
    pub chat_counts: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub weekly_users: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagLogEntry {
    pub id: i32,
    pub ai_id: String,
    pub created_at: i64,
    pub comments: String,
    pub tx_hash: String,
    pub tx_url: String,
    pub faiss_id: String,
}

/// Fields of a RAG log supplied by the creation and update flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRagLog {
    pub ai_id: String,
    pub comments: String,
    pub tx_hash: String,
    pub tx_url: String,
    pub faiss_id: String,
}

/// Read-only rendering of a RAG log inside [`AiDetail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagLog {
    pub created_at: i64,
    pub comments: String,
    pub tx_hash: String,
    pub tx_url: String,
    pub faiss_id: String,
}

impl From<RagLogEntry> for RagLog {
    fn from(entry: RagLogEntry) -> Self {
        Self {
            created_at: entry.created_at,
            comments: entry.comments,
            tx_hash: entry.tx_hash,
            tx_url: entry.tx_url,
            faiss_id: entry.faiss_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_address: String,
    pub nickname: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiDetail {
    #[serde(flatten)]
    pub ai: AiEntity,
    pub logs: Vec<RagLog>,
}

/// An AI with its creator's nickname in place of the raw address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiOverview {
    #[serde(flatten)]
    pub ai: AiEntity,
    pub creator: String,
}

/// Caller-supplied fields of a new AI; identity, timestamps and counters are filled in by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAi {
    pub creator_address: String,
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub introductions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAiRequest {
    pub creator_address: String,
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub introductions: String,
    pub rag_contents: String,
    #[serde(default)]
    pub rag_comments: String,
}

impl CreateAiRequest {
    /// Copy with the identity fields trimmed, so stored values match the derived id.
    pub fn trimmed(&self) -> Self {
        Self {
            creator_address: self.creator_address.trim().to_string(),
            name: self.name.trim().to_string(),
            ..self.clone()
        }
    }

    pub fn new_ai(&self) -> NewAi {
        NewAi {
            creator_address: self.creator_address.clone(),
            name: self.name.clone(),
            image_url: self.image_url.clone(),
            category: self.category.clone(),
            introductions: self.introductions.clone(),
        }
    }
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub introductions: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.image_url.is_none()
            && self.category.is_none()
            && self.introductions.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePatch {
    pub chat_counts: Option<i64>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub weekly_users: Option<i64>,
}

impl UsagePatch {
    pub fn is_empty(&self) -> bool {
        self.chat_counts.is_none()
            && self.prompt_tokens.is_none()
            && self.completion_tokens.is_none()
            && self.weekly_users.is_none()
    }
}

/// Owner-issued update; `contents` appends a new RAG log when present and non-blank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAiRequest {
    pub ai_id: String,
    pub creator_address: String,
    #[serde(flatten)]
    pub profile: ProfilePatch,
    pub contents: Option<String>,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAiRequest {
    pub ai_id: String,
    pub creator_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedAi {
    pub ai: AiEntity,
    pub rag_logs: Vec<RagLogEntry>,
}

/// Offset plus page size. Both are clamped to sane values by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }
}
