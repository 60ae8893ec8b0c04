use crate::model::ModelManager;
use crate::store::git_store;
use crate::{Ctx, Result};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::path::PathBuf;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
// Note: We don't have db_macro::FromRow, we use manual implementation usually or sqlx (now libsql).
// I will implement from_row manually as seen in other files.
pub struct Attachment {
    pub id: i64,
    pub project_id: i64,
    pub filename: String,
    pub stored_path: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub created_ts: String,
}

#[derive(Deserialize)]
pub struct AttachmentForCreate {
    pub project_id: i64,
    pub filename: String,
    pub stored_path: String,
    pub media_type: String,
    pub size_bytes: i64,
}

pub struct AttachmentBmc;



impl AttachmentBmc {
    pub async fn create(
        _ctx: &Ctx,
        mm: &ModelManager,
        attachment_c: AttachmentForCreate,
    ) -> Result<i64> {
        let db = mm.db();
        let now = chrono::Utc::now().naive_utc();
        let created_ts = now.format("%Y-%m-%d %H:%M:%S").to_string();

        let stmt = db.prepare(
            "INSERT INTO attachments (project_id, filename, stored_path, media_type, size_bytes, created_ts) VALUES (?, ?, ?, ?, ?, ?) RETURNING id"
        ).await?;
        
        let mut rows = stmt.query((
            attachment_c.project_id,
            attachment_c.filename,
            attachment_c.stored_path,
            attachment_c.media_type,
            attachment_c.size_bytes,
            created_ts,
        )).await?;

        if let Some(row) = rows.next().await? {
            Ok(row.get(0)?)
        } else {
            Err(crate::Error::InvalidInput("Failed to create attachment".into()))
        }
    }

    pub async fn get(
        _ctx: &Ctx,
        mm: &ModelManager,
        id: i64,
    ) -> Result<Attachment> {
        let db = mm.db();
        let stmt = db.prepare("SELECT id, project_id, filename, stored_path, media_type, size_bytes, created_ts FROM attachments WHERE id = ?").await?;
        let mut rows = stmt.query([id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Self::from_row(row)?)
        } else {
            Err(crate::Error::NotFound)
        }
    }

    pub async fn list_by_project(
        _ctx: &Ctx,
        mm: &ModelManager,
        project_id: i64,
    ) -> Result<Vec<Attachment>> {
        let db = mm.db();
        let stmt = db.prepare("SELECT id, project_id, filename, stored_path, media_type, size_bytes, created_ts FROM attachments WHERE project_id = ? ORDER BY id DESC").await?;
        let mut rows = stmt.query([project_id]).await?;
        
        let mut res = Vec::new();
        while let Some(row) = rows.next().await? {
            res.push(Self::from_row(row)?);
        }
        Ok(res)
    }

    fn from_row(row: libsql::Row) -> Result<Attachment> {
        Ok(Attachment {
            id: row.get(0)?,
            project_id: row.get(1)?,
            filename: row.get(2)?,
            stored_path: row.get(3)?,
            media_type: row.get(4)?,
            size_bytes: row.get(5)?,
            created_ts: row.get(6)?,
        })
    }

    /// Decodes, validates, archives and records a raw attachment.
    ///
    /// Images are run through [`crate::utils::image_processing::validate_image`]
    /// so oversized or corrupt image data is rejected before it is written to
    /// the archive; non-image attachments are stored as-is with a media type
    /// guessed from the filename extension.
    pub async fn create_from_bytes(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: i64,
        project_slug: &str,
        filename: &str,
        raw: &[u8],
    ) -> Result<Attachment> {
        let media_type = match crate::utils::image_processing::validate_image(raw) {
            Ok((format, _w, _h)) => format
                .to_mime_type()
                .to_string(),
            Err(_) => mime_guess_from_filename(filename),
        };

        let mut hasher = Sha1::new();
        hasher.update(raw);
        let digest = hex::encode(hasher.finalize());
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let rel_path = PathBuf::from("attachments")
            .join("raw")
            .join(format!("{}.{}", &digest[..16], ext));

        let _git_guard = mm.git_lock.lock().await;
        let repo_arc = mm.get_repo().await?;
        let repo = repo_arc.lock().await;
        let workdir = repo
            .workdir()
            .ok_or_else(|| crate::Error::InvalidInput("No workdir".into()))?;
        let full_path = workdir.join(&rel_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full_path, raw)?;

        git_store::commit_paths(
            &repo,
            &[rel_path.as_path()],
            &format!("attachment: {}", filename),
            "relaymail",
            "relaymail@localhost",
        )?;
        drop(repo);

        let stored_path = rel_path.to_string_lossy().replace('\\', "/");
        let attachment_c = AttachmentForCreate {
            project_id,
            filename: filename.to_string(),
            stored_path: stored_path.clone(),
            media_type,
            size_bytes: raw.len() as i64,
        };
        let id = Self::create(ctx, mm, attachment_c).await?;
        let _ = project_slug;
        Self::get(ctx, mm, id).await
    }

    /// Reads the archived bytes for an attachment from the project's working tree.
    pub async fn read_bytes(mm: &ModelManager, attachment: &Attachment) -> Result<Vec<u8>> {
        let repo_arc = mm.get_repo().await?;
        let repo = repo_arc.lock().await;
        let workdir = repo
            .workdir()
            .ok_or_else(|| crate::Error::InvalidInput("No workdir".into()))?;
        let full_path = workdir.join(&attachment.stored_path);
        Ok(std::fs::read(full_path)?)
    }
}

fn mime_guess_from_filename(filename: &str) -> String {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}
