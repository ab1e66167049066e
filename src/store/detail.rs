use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel_async::RunQueryDsl;

use super::schema::{ais, rag_logs, users};
use super::{map_ai, map_rag, AiRow, AiStore, RagRow};
use crate::domains::ai::{AiDetail, AiOverview, RagLog};
use crate::error::{AiRegistryError, Result};

impl AiStore {
    /// The AI together with its RAG logs in insertion order.
    ///
    /// An AI without logs yields an empty `logs` list; `None` means the AI is absent.
    pub async fn get_detail(&self, ai_id: &str) -> Result<Option<AiDetail>> {
        let mut conn = self.conn().await?;
        let rows: Vec<(AiRow, Option<RagRow>)> = ais::table
            .left_join(rag_logs::table)
            .filter(ais::ai_id.eq(ai_id))
            .order(rag_logs::id.asc())
            .load(&mut conn)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;

        let mut rows = rows.into_iter();
        let Some((ai, first_log)) = rows.next() else {
            return Ok(None);
        };
        let logs: Vec<RagLog> = first_log
            .into_iter()
            .chain(rows.filter_map(|(_, log)| log))
            .map(|row| RagLog::from(map_rag(row)))
            .collect();

        Ok(Some(AiDetail {
            ai: map_ai(ai),
            logs,
        }))
    }

    /// Newest AIs whose creator is a known user, labelled with the creator's nickname.
    pub async fn recent_overview(&self, count: i64) -> Result<Vec<AiOverview>> {
        let mut conn = self.conn().await?;
        let rows: Vec<(AiRow, String)> = ais::table
            .inner_join(users::table.on(ais::creator_address.eq(users::user_address)))
            .order(ais::created_at.desc())
            .then_order_by(sql::<BigInt>("ais.rowid").desc())
            .limit(count.max(0))
            .select((ais::all_columns, users::nickname))
            .load(&mut conn)
            .await
            .map_err(|e| AiRegistryError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(ai, nickname)| AiOverview {
                ai: map_ai(ai),
                creator: nickname,
            })
            .collect())
    }
}
