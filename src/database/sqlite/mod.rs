use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{
    FileRecord, FileStatus, FileStatusCounts, FileStatusUpdate, NewFileRecord, Notebook,
    normalize_notebook_name,
};
use crate::database::sqlite::queries::{FileQueries, NotebookQueries};
use crate::{NotebookError, Result};


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

fn db_error(err: &anyhow::Error) -> NotebookError {
    NotebookError::Database(format!("{err:#}"))
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|e| e.is_unique_violation())
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")
            .map_err(|e| db_error(&e))?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")
            .map_err(|e| db_error(&e))?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Open `notebooks.db` inside `base_dir`, creating the directory if needed
    #[inline]
    pub async fn initialize_in_dir(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir)?;
        Self::new(base_dir.join("notebooks.db")).await
    }

    // Notebook operations
    #[inline]
    pub async fn create_notebook(&self, name: &str) -> Result<Notebook> {
        let name = normalize_notebook_name(name).map_err(NotebookError::Validation)?;

        if self.get_notebook_by_name(&name).await?.is_some() {
            return Err(NotebookError::Validation(format!(
                "A notebook named '{name}' already exists"
            )));
        }

        match NotebookQueries::create(&self.pool, &name).await {
            Ok(notebook) => {
                info!("Created notebook '{}' ({})", notebook.name, notebook.id);
                Ok(notebook)
            }
            Err(e) if is_unique_violation(&e) => Err(NotebookError::Validation(format!(
                "A notebook named '{name}' already exists"
            ))),
            Err(e) => Err(db_error(&e)),
        }
    }

    #[inline]
    pub async fn get_notebook_by_name(&self, name: &str) -> Result<Option<Notebook>> {
        NotebookQueries::get_by_name(&self.pool, name.trim())
            .await
            .map_err(|e| db_error(&e))
    }

    #[inline]
    pub async fn get_notebook_by_id(&self, id: i64) -> Result<Option<Notebook>> {
        NotebookQueries::get_by_id(&self.pool, id)
            .await
            .map_err(|e| db_error(&e))
    }

    #[inline]
    pub async fn list_notebooks(&self) -> Result<Vec<Notebook>> {
        NotebookQueries::list_all(&self.pool)
            .await
            .map_err(|e| db_error(&e))
    }

    #[inline]
    pub async fn touch_notebook(&self, id: i64) -> Result<()> {
        NotebookQueries::touch(&self.pool, id)
            .await
            .map_err(|e| db_error(&e))?;
        Ok(())
    }

    #[inline]
    pub async fn delete_notebook(&self, id: i64) -> Result<bool> {
        NotebookQueries::delete(&self.pool, id)
            .await
            .map_err(|e| db_error(&e))
    }

    #[inline]
    pub async fn count_notebooks(&self) -> Result<i64> {
        NotebookQueries::count(&self.pool)
            .await
            .map_err(|e| db_error(&e))
    }

    // File operations
    #[inline]
    pub async fn add_file(
        &self,
        notebook_id: i64,
        original_filename: &str,
        stored_filename: &str,
    ) -> Result<FileRecord> {
        let new_file = NewFileRecord {
            notebook_id,
            original_filename: original_filename.to_string(),
            stored_filename: stored_filename.to_string(),
        };

        FileQueries::create(&self.pool, &new_file)
            .await
            .map_err(|e| db_error(&e))
    }

    #[inline]
    pub async fn get_file(&self, id: i64) -> Result<Option<FileRecord>> {
        FileQueries::get_by_id(&self.pool, id)
            .await
            .map_err(|e| db_error(&e))
    }

    /// Move a file to `status`, rejecting edges the file lifecycle does not allow
    #[inline]
    pub async fn update_file_status(
        &self,
        id: i64,
        status: FileStatus,
        error_message: Option<String>,
        chunk_count: Option<i64>,
    ) -> Result<FileRecord> {
        let current = self
            .get_file(id)
            .await?
            .ok_or_else(|| NotebookError::NotFound(format!("file {id}")))?;

        if !current.status.can_transition_to(status) {
            return Err(NotebookError::Validation(format!(
                "File '{}' cannot move from {} to {}",
                current.original_filename, current.status, status
            )));
        }

        let update = FileStatusUpdate {
            status,
            error_message,
            chunk_count,
        };

        FileQueries::update_status(&self.pool, id, &update)
            .await
            .map_err(|e| db_error(&e))?
            .ok_or_else(|| NotebookError::NotFound(format!("file {id}")))
    }

    #[inline]
    pub async fn list_files(&self, notebook_id: i64) -> Result<Vec<FileRecord>> {
        FileQueries::list_by_notebook(&self.pool, notebook_id)
            .await
            .map_err(|e| db_error(&e))
    }

    #[inline]
    pub async fn list_pending_files(&self, notebook_id: i64) -> Result<Vec<FileRecord>> {
        FileQueries::list_pending(&self.pool, notebook_id)
            .await
            .map_err(|e| db_error(&e))
    }

    #[inline]
    pub async fn file_status_counts(&self, notebook_id: i64) -> Result<FileStatusCounts> {
        FileQueries::status_counts(&self.pool, notebook_id)
            .await
            .map_err(|e| db_error(&e))
    }

    #[inline]
    pub async fn count_files(&self) -> Result<i64> {
        FileQueries::count_all(&self.pool)
            .await
            .map_err(|e| db_error(&e))
    }
}
