
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

const FILE_COLUMNS: &str = "id, notebook_id, original_filename, stored_filename, upload_date, \
                            status, error_message, chunk_count, processed_at";

pub struct NotebookQueries;

impl NotebookQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, name: &str) -> Result<Notebook> {
        let now = Utc::now().naive_utc();
        let id = sqlx::query("INSERT INTO notebooks (name, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create notebook")?
            .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created notebook"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Notebook>> {
        sqlx::query_as::<_, Notebook>(
            "SELECT id, name, created_at, updated_at FROM notebooks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get notebook by id")
    }

    #[inline]
    pub async fn get_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Notebook>> {
        sqlx::query_as::<_, Notebook>(
            "SELECT id, name, created_at, updated_at FROM notebooks WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get notebook by name")
    }

    /// Most recently updated first
    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Notebook>> {
        sqlx::query_as::<_, Notebook>(
            "SELECT id, name, created_at, updated_at FROM notebooks \
             ORDER BY updated_at DESC, id DESC",
        )
        .fetch_all(pool)
        .await
        .context("Failed to list notebooks")
    }

    #[inline]
    pub async fn touch(pool: &SqlitePool, id: i64) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query("UPDATE notebooks SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update notebook timestamp")?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns whether a row was removed. File rows cascade.
    #[inline]
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notebooks WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete notebook")?;

        debug!(
            "Deleted notebook {} ({} rows)",
            id,
            result.rows_affected()
        );
        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notebooks")
            .fetch_one(pool)
            .await
            .context("Failed to count notebooks")
    }
}

pub struct FileQueries;

impl FileQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_file: &NewFileRecord) -> Result<FileRecord> {
        let now = Utc::now().naive_utc();
        let id = sqlx::query(
            "INSERT INTO files (notebook_id, original_filename, stored_filename, upload_date, status) \
             VALUES (?, ?, ?, ?, 'uploaded')",
        )
        .bind(new_file.notebook_id)
        .bind(&new_file.original_filename)
        .bind(&new_file.stored_filename)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to add file")?
        .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created file"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<FileRecord>> {
        sqlx::query_as::<_, FileRecord>(&format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get file by id")
    }

    /// Newest upload first
    #[inline]
    pub async fn list_by_notebook(pool: &SqlitePool, notebook_id: i64) -> Result<Vec<FileRecord>> {
        sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE notebook_id = ? \
             ORDER BY upload_date DESC, id DESC"
        ))
        .bind(notebook_id)
        .fetch_all(pool)
        .await
        .context("Failed to list files")
    }

    /// Every file not yet processed, oldest upload first
    #[inline]
    pub async fn list_pending(pool: &SqlitePool, notebook_id: i64) -> Result<Vec<FileRecord>> {
        sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE notebook_id = ? AND status != 'processed' \
             ORDER BY upload_date ASC, id ASC"
        ))
        .bind(notebook_id)
        .fetch_all(pool)
        .await
        .context("Failed to list pending files")
    }

    /// Writes the new status unconditionally; transition rules are checked by the caller
    #[inline]
    pub async fn update_status(
        pool: &SqlitePool,
        id: i64,
        update: &FileStatusUpdate,
    ) -> Result<Option<FileRecord>> {
        let processed_at = (update.status == FileStatus::Processed).then(|| Utc::now().naive_utc());

        sqlx::query(
            "UPDATE files SET status = ?, error_message = ?, \
             chunk_count = COALESCE(?, chunk_count), \
             processed_at = COALESCE(?, processed_at) \
             WHERE id = ?",
        )
        .bind(update.status)
        .bind(&update.error_message)
        .bind(update.chunk_count)
        .bind(processed_at)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update file status")?;

        Self::get_by_id(pool, id).await
    }

    #[inline]
    pub async fn status_counts(pool: &SqlitePool, notebook_id: i64) -> Result<FileStatusCounts> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count FROM files WHERE notebook_id = ? GROUP BY status",
        )
        .bind(notebook_id)
        .fetch_all(pool)
        .await
        .context("Failed to count files by status")?;

        let mut counts = FileStatusCounts::default();
        for row in rows {
            let status: FileStatus = row.try_get("status").context("Invalid file status")?;
            let count: i64 = row.try_get("count").context("Invalid file count")?;
            counts.record(status, count);
        }

        Ok(counts)
    }

    #[inline]
    pub async fn count_all(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(pool)
            .await
            .context("Failed to count files")
    }
}
