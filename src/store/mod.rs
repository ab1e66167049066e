use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel::sql_types::BigInt;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, RunQueryDsl, SimpleAsyncConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::sync::{Mutex, MutexGuard};

use crate::domains::ai::{
    AiEntity, DeletedAi, NewAi, NewRagLog, Page, ProfilePatch, RagLogEntry, UsagePatch,
    UserRecord,
};
use crate::error::{AiRegistryError, Result};
use crate::interfaces::collaborators::UserDirectory;

mod detail;
mod schema;
use schema::{ais, rag_logs, users};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
const BUSY_TIMEOUT_MS: u32 = 5_000;

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Queryable)]
struct AiRow {
    ai_id: String,
    creator_address: String,
    created_at: i64,
    name: String,
    image_url: String,
    category: String,
    introductions: String,
    chat_counts: i64,
    prompt_tokens: i64,
    completion_tokens: i64,
    weekly_users: i64,
}

#[derive(Queryable)]
struct RagRow {
    id: i32,
    ai_id: String,
    created_at: i64,
    comments: String,
    tx_hash: String,
    tx_url: String,
    faiss_id: String,
}

#[derive(Queryable)]
struct UserRow {
    user_address: String,
    nickname: String,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = ais)]
struct NewAiRow<'a> {
    ai_id: &'a str,
    creator_address: &'a str,
    created_at: i64,
    name: &'a str,
    image_url: &'a str,
    category: &'a str,
    introductions: &'a str,
    chat_counts: i64,
    prompt_tokens: i64,
    completion_tokens: i64,
    weekly_users: i64,
}

#[derive(Insertable)]
#[diesel(table_name = rag_logs)]
struct NewRagRow<'a> {
    ai_id: &'a str,
    created_at: i64,
    comments: &'a str,
    tx_hash: &'a str,
    tx_url: &'a str,
    faiss_id: &'a str,
}

#[derive(AsChangeset)]
#[diesel(table_name = ais)]
struct ProfileChanges<'a> {
    name: Option<&'a str>,
    image_url: Option<&'a str>,
    category: Option<&'a str>,
    introductions: Option<&'a str>,
}

#[derive(AsChangeset)]
#[diesel(table_name = ais)]
struct UsageChanges {
    chat_counts: Option<i64>,
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    weekly_users: Option<i64>,
}

/// Persistence for AI entities, their RAG logs and the user directory.
///
/// Reads run concurrently on the pool; writes from this process are serialized through `writes`.
pub struct AiStore {
    pool: SqlitePool,
    writes: Mutex<()>,
}

impl AiStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        Ok(Self {
            pool,
            writes: Mutex::new(()),
        })
    }

    pub async fn list_ais(&self, page: Page) -> Result<Vec<AiEntity>> {
        let (offset, limit) = bounds(page);
        let mut conn = self.conn().await?;
        let rows: Vec<AiRow> = ais::table
            .order(sql::<BigInt>("ais.rowid").asc())
            .offset(offset)
            .limit(limit)
            .load(&mut conn)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(map_ai).collect())
    }

    pub async fn get_ai(&self, ai_id: &str) -> Result<Option<AiEntity>> {
        let mut conn = self.conn().await?;
        let row: Option<AiRow> = ais::table
            .find(ai_id)
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        Ok(row.map(map_ai))
    }

    pub async fn ai_exists(&self, ai_id: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let count: i64 = ais::table
            .filter(ais::ai_id.eq(ai_id))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    pub async fn list_by_creator(&self, creator_address: &str) -> Result<Vec<AiEntity>> {
        let mut conn = self.conn().await?;
        let rows: Vec<AiRow> = ais::table
            .filter(ais::creator_address.eq(creator_address))
            .order(sql::<BigInt>("ais.rowid").asc())
            .load(&mut conn)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(map_ai).collect())
    }

    /// Most used first, optionally restricted to one category.
    pub async fn list_by_weekly_users(
        &self,
        page: Page,
        category: Option<&str>,
    ) -> Result<Vec<AiEntity>> {
        let (offset, limit) = bounds(page);
        let mut conn = self.conn().await?;
        let mut query = ais::table.into_boxed();
        if let Some(category) = category {
            query = query.filter(ais::category.eq(category));
        }
        let rows: Vec<AiRow> = query
            .order(ais::weekly_users.desc())
            .then_order_by(sql::<BigInt>("ais.rowid").asc())
            .offset(offset)
            .limit(limit)
            .load(&mut conn)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(map_ai).collect())
    }

    /// Names containing `fragment`; wildcard characters in the input match literally.
    pub async fn search_by_name(&self, fragment: &str) -> Result<Vec<AiEntity>> {
        let pattern = format!("%{}%", escape_like(fragment));
        let mut conn = self.conn().await?;
        let rows: Vec<AiRow> = ais::table
            .filter(ais::name.like(pattern).escape('\\'))
            .order(sql::<BigInt>("ais.rowid").asc())
            .load(&mut conn)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(map_ai).collect())
    }

    /// Inserts a fresh AI with zeroed counters, failing with `Conflict` if `ai_id` is taken.
    pub async fn create_ai(&self, ai_id: &str, new: &NewAi) -> Result<AiEntity> {
        let _write = self.write_lock().await;
        let now = now_ts();
        let row = NewAiRow {
            ai_id,
            creator_address: &new.creator_address,
            created_at: now,
            name: &new.name,
            image_url: &new.image_url,
            category: &new.category,
            introductions: &new.introductions,
            chat_counts: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            weekly_users: 0,
        };
        let mut conn = self.conn().await?;
        conn.transaction::<_, AiRegistryError, _>(|conn| {
            async move {
                let existing: i64 = ais::table
                    .filter(ais::ai_id.eq(ai_id))
                    .count()
                    .get_result(conn)
                    .await?;
                if existing > 0 {
                    return Err(conflict(ai_id));
                }
                match diesel::insert_into(ais::table)
                    .values(&row)
                    .execute(conn)
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(diesel::result::Error::DatabaseError(
                        DatabaseErrorKind::UniqueViolation,
                        _,
                    )) => Err(conflict(ai_id)),
                    Err(err) => Err(err.into()),
                }
            }
            .scope_boxed()
        })
        .await?;

        Ok(AiEntity {
            ai_id: ai_id.to_string(),
            creator_address: new.creator_address.clone(),
            created_at: now,
            name: new.name.clone(),
            image_url: new.image_url.clone(),
            category: new.category.clone(),
            introductions: new.introductions.clone(),
            chat_counts: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            weekly_users: 0,
        })
    }

    /// Applies only the supplied profile fields. `None` when the AI does not exist.
    pub async fn update_profile(
        &self,
        ai_id: &str,
        patch: &ProfilePatch,
    ) -> Result<Option<AiEntity>> {
        let _write = self.write_lock().await;
        if patch.is_empty() {
            return self.get_ai(ai_id).await;
        }
        let changes = ProfileChanges {
            name: patch.name.as_deref(),
            image_url: patch.image_url.as_deref(),
            category: patch.category.as_deref(),
            introductions: patch.introductions.as_deref(),
        };
        let mut conn = self.conn().await?;
        let count = diesel::update(ais::table.find(ai_id))
            .set(&changes)
            .execute(&mut conn)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        drop(conn);
        if count == 0 {
            return Ok(None);
        }
        self.get_ai(ai_id).await
    }

    /// Overwrites only the supplied usage counters. `None` when the AI does not exist.
    pub async fn update_usage(&self, ai_id: &str, patch: &UsagePatch) -> Result<Option<AiEntity>> {
        let _write = self.write_lock().await;
        if patch.is_empty() {
            return self.get_ai(ai_id).await;
        }
        let changes = UsageChanges {
            chat_counts: patch.chat_counts,
            prompt_tokens: patch.prompt_tokens,
            completion_tokens: patch.completion_tokens,
            weekly_users: patch.weekly_users,
        };
        let mut conn = self.conn().await?;
        let count = diesel::update(ais::table.find(ai_id))
            .set(&changes)
            .execute(&mut conn)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        drop(conn);
        if count == 0 {
            return Ok(None);
        }
        self.get_ai(ai_id).await
    }

    /// Removes the AI row only. RAG logs are left in place; see [`AiStore::delete_ai_cascade`].
    pub async fn delete_ai(&self, ai_id: &str) -> Result<Option<AiEntity>> {
        let _write = self.write_lock().await;
        let mut conn = self.conn().await?;
        let deleted = conn
            .transaction::<_, AiRegistryError, _>(|conn| {
                async move {
                    let row: Option<AiRow> =
                        ais::table.find(ai_id).first(conn).await.optional()?;
                    if row.is_some() {
                        diesel::delete(ais::table.find(ai_id)).execute(conn).await?;
                    }
                    Ok(row)
                }
                .scope_boxed()
            })
            .await?;
        Ok(deleted.map(map_ai))
    }

    /// Removes the AI and every RAG log that references it in one transaction.
    pub async fn delete_ai_cascade(&self, ai_id: &str) -> Result<Option<DeletedAi>> {
        let _write = self.write_lock().await;
        let mut conn = self.conn().await?;
        let deleted = conn
            .transaction::<_, AiRegistryError, _>(|conn| {
                async move {
                    let Some(row) = ais::table
                        .find(ai_id)
                        .first::<AiRow>(conn)
                        .await
                        .optional()?
                    else {
                        return Ok(None);
                    };
                    let logs: Vec<RagRow> = rag_logs::table
                        .filter(rag_logs::ai_id.eq(ai_id))
                        .order(rag_logs::id.asc())
                        .load(conn)
                        .await?;
                    diesel::delete(rag_logs::table.filter(rag_logs::ai_id.eq(ai_id)))
                        .execute(conn)
                        .await?;
                    diesel::delete(ais::table.find(ai_id)).execute(conn).await?;
                    Ok(Some((row, logs)))
                }
                .scope_boxed()
            })
            .await?;
        Ok(deleted.map(|(row, logs)| DeletedAi {
            ai: map_ai(row),
            rag_logs: logs.into_iter().map(map_rag).collect(),
        }))
    }

    pub async fn list_rag_entries(&self, ai_id: &str) -> Result<Vec<RagLogEntry>> {
        let mut conn = self.conn().await?;
        let rows: Vec<RagRow> = rag_logs::table
            .filter(rag_logs::ai_id.eq(ai_id))
            .order(rag_logs::id.asc())
            .load(&mut conn)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(map_rag).collect())
    }

    pub async fn create_rag_entry(&self, entry: &NewRagLog) -> Result<RagLogEntry> {
        let _write = self.write_lock().await;
        let row = NewRagRow {
            ai_id: &entry.ai_id,
            created_at: now_ts(),
            comments: &entry.comments,
            tx_hash: &entry.tx_hash,
            tx_url: &entry.tx_url,
            faiss_id: &entry.faiss_id,
        };
        let mut conn = self.conn().await?;
        let inserted: RagRow = conn
            .transaction::<_, AiRegistryError, _>(|conn| {
                async move {
                    diesel::insert_into(rag_logs::table)
                        .values(&row)
                        .execute(conn)
                        .await?;
                    let inserted: RagRow = rag_logs::table
                        .filter(rag_logs::ai_id.eq(row.ai_id))
                        .order(rag_logs::id.desc())
                        .first(conn)
                        .await?;
                    Ok(inserted)
                }
                .scope_boxed()
            })
            .await?;
        Ok(map_rag(inserted))
    }

    /// Deletes every RAG log of `ai_id`, returning them, or `None` if there were none.
    pub async fn delete_rag_entries(&self, ai_id: &str) -> Result<Option<Vec<RagLogEntry>>> {
        let _write = self.write_lock().await;
        let mut conn = self.conn().await?;
        let rows = conn
            .transaction::<_, AiRegistryError, _>(|conn| {
                async move {
                    let rows: Vec<RagRow> = rag_logs::table
                        .filter(rag_logs::ai_id.eq(ai_id))
                        .order(rag_logs::id.asc())
                        .load(conn)
                        .await?;
                    if !rows.is_empty() {
                        diesel::delete(rag_logs::table.filter(rag_logs::ai_id.eq(ai_id)))
                            .execute(conn)
                            .await?;
                    }
                    Ok(rows)
                }
                .scope_boxed()
            })
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.into_iter().map(map_rag).collect()))
    }

    /// Inserts or renames a user in the directory.
    pub async fn put_user(&self, user_address: &str, nickname: &str) -> Result<UserRecord> {
        let _write = self.write_lock().await;
        let now = now_ts();
        let mut conn = self.conn().await?;
        diesel::insert_into(users::table)
            .values((
                users::user_address.eq(user_address),
                users::nickname.eq(nickname),
                users::created_at.eq(now),
            ))
            .on_conflict(users::user_address)
            .do_update()
            .set(users::nickname.eq(nickname))
            .execute(&mut conn)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        let row: UserRow = users::table
            .find(user_address)
            .first(&mut conn)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        Ok(map_user(row))
    }

    pub async fn get_user(&self, user_address: &str) -> Result<Option<UserRecord>> {
        let mut conn = self.conn().await?;
        let row: Option<UserRow> = users::table
            .find(user_address)
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        Ok(row.map(map_user))
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        conn.batch_execute(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"))
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        Ok(conn)
    }

    async fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().await
    }
}

#[async_trait]
impl UserDirectory for AiStore {
    async fn lookup_user(&self, address: &str) -> Result<Option<UserRecord>> {
        self.get_user(address).await
    }
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AiRegistryError::Runtime(e.to_string()))?;
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}; PRAGMA journal_mode = WAL;"
        ))
        .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;
        Ok::<_, AiRegistryError>(())
    })
    .await
    .map_err(|e| AiRegistryError::Runtime(e.to_string()))??;
    Ok(())
}

fn bounds(page: Page) -> (i64, i64) {
    (page.offset.max(0), page.limit.max(0))
}

fn escape_like(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn conflict(ai_id: &str) -> AiRegistryError {
    AiRegistryError::Conflict(format!("AI {ai_id} already exists"))
}

fn map_ai(row: AiRow) -> AiEntity {
    AiEntity {
        ai_id: row.ai_id,
        creator_address: row.creator_address,
        created_at: row.created_at,
        name: row.name,
        image_url: row.image_url,
        category: row.category,
        introductions: row.introductions,
        chat_counts: row.chat_counts,
        prompt_tokens: row.prompt_tokens,
        completion_tokens: row.completion_tokens,
        weekly_users: row.weekly_users,
    }
}

fn map_rag(row: RagRow) -> RagLogEntry {
    RagLogEntry {
        id: row.id,
        ai_id: row.ai_id,
        created_at: row.created_at,
        comments: row.comments,
        tx_hash: row.tx_hash,
        tx_url: row.tx_url,
        faiss_id: row.faiss_id,
    }
}

fn map_user(row: UserRow) -> UserRecord {
    UserRecord {
        user_address: row.user_address,
        nickname: row.nickname,
        created_at: row.created_at,
    }
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn negative_pages_clamp_to_zero() {
        assert_eq!(bounds(Page::new(-5, -1)), (0, 0));
        assert_eq!(bounds(Page::new(2, 10)), (2, 10));
    }
}
