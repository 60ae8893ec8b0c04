//! Cached project-wide message digests for a time window.
//!
//! A digest covers every message in a project created within `[start_ts, end_ts]`,
//! grouped by thread. Computing one requires scanning and re-summarizing every
//! thread in the window, so repeated requests for roughly the same window reuse
//! the cached row instead of recomputing (see `find_cached`).

use crate::Ctx;
use crate::Result;
use crate::model::ModelManager;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Reuse tolerance for `find_cached`: a new request whose window falls within
/// this many minutes of a cached row's window returns the cached row.
const CACHE_TOLERANCE_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: i64,
    pub project_id: i64,
    pub start_ts: NaiveDateTime,
    pub end_ts: NaiveDateTime,
    pub source_message_count: i64,
    pub source_thread_ids: Vec<String>,
    pub summary_text: String,
    pub llm_model: Option<String>,
    pub cost_usd: Option<f64>,
    pub created_ts: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct MessageSummaryForCreate {
    pub project_id: i64,
    pub start_ts: NaiveDateTime,
    pub end_ts: NaiveDateTime,
    pub source_message_count: i64,
    pub source_thread_ids: Vec<String>,
    pub summary_text: String,
    pub llm_model: Option<String>,
    pub cost_usd: Option<f64>,
}

/// Backend Model Controller for cached recent-window digests.
pub struct MessageSummaryBmc;

impl MessageSummaryBmc {
    pub async fn create(
        _ctx: &Ctx,
        mm: &ModelManager,
        c: MessageSummaryForCreate,
    ) -> Result<i64> {
        let db = mm.db();
        let created_ts = chrono::Utc::now().naive_utc();
        let source_thread_ids_json = serde_json::to_string(&c.source_thread_ids)?;

        let stmt = db
            .prepare(
                r#"
            INSERT INTO message_summaries
                (project_id, start_ts, end_ts, source_message_count, source_thread_ids,
                 summary_text, llm_model, cost_usd, created_ts)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
            )
            .await?;

        let params: Vec<libsql::Value> = vec![
            c.project_id.into(),
            c.start_ts.format("%Y-%m-%d %H:%M:%S").to_string().into(),
            c.end_ts.format("%Y-%m-%d %H:%M:%S").to_string().into(),
            c.source_message_count.into(),
            source_thread_ids_json.into(),
            c.summary_text.into(),
            c.llm_model.into(),
            c.cost_usd.into(),
            created_ts.format("%Y-%m-%d %H:%M:%S").to_string().into(),
        ];
        let mut rows = stmt.query(params).await?;
        let row = rows.next().await?.ok_or(crate::Error::NotFound)?;
        let id: i64 = row.get(0)?;
        Ok(id)
    }

    pub async fn get(_ctx: &Ctx, mm: &ModelManager, id: i64) -> Result<MessageSummary> {
        let db = mm.db();
        let stmt = db
            .prepare(
                r#"
            SELECT id, project_id, start_ts, end_ts, source_message_count, source_thread_ids,
                   summary_text, llm_model, cost_usd, created_ts
            FROM message_summaries WHERE id = ?
            "#,
            )
            .await?;
        let mut rows = stmt.query((id,)).await?;
        let row = rows.next().await?.ok_or(crate::Error::NotFound)?;
        Self::row_to_summary(&row)
    }

    /// Looks for a cached digest for `project_id` whose `(start_ts, end_ts)` both
    /// fall within `CACHE_TOLERANCE_MINUTES` of the requested window. Returns the
    /// most recently created match, if any.
    pub async fn find_cached(
        _ctx: &Ctx,
        mm: &ModelManager,
        project_id: i64,
        start_ts: NaiveDateTime,
        end_ts: NaiveDateTime,
    ) -> Result<Option<MessageSummary>> {
        let db = mm.db();
        let tolerance_secs = CACHE_TOLERANCE_MINUTES * 60;

        let stmt = db
            .prepare(
                r#"
            SELECT id, project_id, start_ts, end_ts, source_message_count, source_thread_ids,
                   summary_text, llm_model, cost_usd, created_ts
            FROM message_summaries
            WHERE project_id = ?
              AND ABS(strftime('%s', start_ts) - strftime('%s', ?)) <= ?
              AND ABS(strftime('%s', end_ts) - strftime('%s', ?)) <= ?
            ORDER BY created_ts DESC
            LIMIT 1
            "#,
            )
            .await?;

        let params: Vec<libsql::Value> = vec![
            project_id.into(),
            start_ts.format("%Y-%m-%d %H:%M:%S").to_string().into(),
            tolerance_secs.into(),
            end_ts.format("%Y-%m-%d %H:%M:%S").to_string().into(),
            tolerance_secs.into(),
        ];
        let mut rows = stmt.query(params).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_summary(&row)?)),
            None => Ok(None),
        }
    }

    fn row_to_summary(row: &libsql::Row) -> Result<MessageSummary> {
        let start_ts_str: String = row.get(2)?;
        let end_ts_str: String = row.get(3)?;
        let created_ts_str: String = row.get(9)?;
        let source_thread_ids_json: String = row.get(5)?;

        Ok(MessageSummary {
            id: row.get(0)?,
            project_id: row.get(1)?,
            start_ts: NaiveDateTime::parse_from_str(&start_ts_str, "%Y-%m-%d %H:%M:%S")
                .unwrap_or_default(),
            end_ts: NaiveDateTime::parse_from_str(&end_ts_str, "%Y-%m-%d %H:%M:%S")
                .unwrap_or_default(),
            source_message_count: row.get(4)?,
            source_thread_ids: serde_json::from_str(&source_thread_ids_json)?,
            summary_text: row.get(6)?,
            llm_model: row.get(7)?,
            cost_usd: row.get(8)?,
            created_ts: NaiveDateTime::parse_from_str(&created_ts_str, "%Y-%m-%d %H:%M:%S")
                .unwrap_or_default(),
        })
    }
}
