use crate::ctx::Ctx;
use crate::model::ModelManager;
use crate::Result;
use serde::{Deserialize, Serialize};
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSiblingSuggestion {
    pub id: i64,
    pub project_a_id: i64,
    pub project_b_id: i64,
    pub score: f64,
    pub rationale: String,
    pub status: String,
    pub confirmed_ts: Option<NaiveDateTime>,
    pub dismissed_ts: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSiblingSuggestionForCreate {
    pub project_a_id: i64,
    pub project_b_id: i64,
    pub score: f64,
    pub rationale: String,
}

pub struct ProjectSiblingSuggestionBmc;

impl ProjectSiblingSuggestionBmc {
    pub async fn create(
        _ctx: &Ctx,
        mm: &ModelManager,
        suggestion_c: ProjectSiblingSuggestionForCreate,
    ) -> Result<i64> {
        let db = mm.db();

        let stmt = db
            .prepare(
                r#"
                INSERT INTO project_sibling_suggestions (project_a_id, project_b_id, score, rationale)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (project_a_id, project_b_id) DO UPDATE SET
                    score = excluded.score,
                    rationale = excluded.rationale
                RETURNING id
                "#,
            )
            .await?;

        let mut rows = stmt
            .query((
                suggestion_c.project_a_id,
                suggestion_c.project_b_id,
                suggestion_c.score,
                suggestion_c.rationale.as_str(),
            ))
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(row.get::<i64>(0)?)
        } else {
            Err(crate::Error::InvalidInput(
                "Failed to create project sibling suggestion".into(),
            ))
        }
    }

    /// Lists pending suggestions touching `project_id`, highest score first.
    pub async fn list(
        _ctx: &Ctx,
        mm: &ModelManager,
        project_id: i64,
    ) -> Result<Vec<ProjectSiblingSuggestion>> {
        let db = mm.db();

        let stmt = db
            .prepare(
                r#"
                SELECT id, project_a_id, project_b_id, score, rationale, status, confirmed_ts, dismissed_ts
                FROM project_sibling_suggestions
                WHERE (project_a_id = ? OR project_b_id = ?) AND status = 'pending'
                ORDER BY score DESC
                "#,
            )
            .await?;

        let mut rows = stmt.query((project_id, project_id)).await?;
        let mut suggestions = Vec::new();
        while let Some(row) = rows.next().await? {
            suggestions.push(Self::from_row(row)?);
        }
        Ok(suggestions)
    }

    /// Moves a suggestion to "accepted" or "dismissed", stamping the matching
    /// timestamp column.
    pub async fn update_status(
        _ctx: &Ctx,
        mm: &ModelManager,
        suggestion_id: i64,
        status: &str,
    ) -> Result<()> {
        let db = mm.db();
        let now_str = chrono::Utc::now()
            .naive_utc()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        match status {
            "accepted" => {
                let stmt = db
                    .prepare(
                        "UPDATE project_sibling_suggestions SET status = ?, confirmed_ts = ? WHERE id = ?",
                    )
                    .await?;
                stmt.execute((status, now_str.as_str(), suggestion_id)).await?;
            }
            "dismissed" => {
                let stmt = db
                    .prepare(
                        "UPDATE project_sibling_suggestions SET status = ?, dismissed_ts = ? WHERE id = ?",
                    )
                    .await?;
                stmt.execute((status, now_str.as_str(), suggestion_id)).await?;
            }
            _ => {
                let stmt = db
                    .prepare("UPDATE project_sibling_suggestions SET status = ? WHERE id = ?")
                    .await?;
                stmt.execute((status, suggestion_id)).await?;
            }
        }
        Ok(())
    }

    fn from_row(row: libsql::Row) -> Result<ProjectSiblingSuggestion> {
        let confirmed_ts_str: Option<String> = row.get(6).unwrap_or_default();
        let dismissed_ts_str: Option<String> = row.get(7).unwrap_or_default();

        let confirmed_ts = confirmed_ts_str
            .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").ok());
        let dismissed_ts = dismissed_ts_str
            .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").ok());

        Ok(ProjectSiblingSuggestion {
            id: row.get(0)?,
            project_a_id: row.get(1)?,
            project_b_id: row.get(2)?,
            score: row.get(3)?,
            rationale: row.get(4)?,
            status: row.get(5)?,
            confirmed_ts,
            dismissed_ts,
        })
    }
}
