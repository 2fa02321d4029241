// Indexer module
// Turns a notebook's pending uploads into searchable chunk embeddings


use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{FileRecord, FileStatus, Notebook};
use crate::documents::extract_text;
use crate::embeddings::{ChunkingConfig, Embedder, chunk_text};
use crate::storage::FileStore;
use crate::{NotebookError, Result};

/// Processes the files of one notebook through extract, chunk, embed and store
pub struct Indexer<'a> {
    database: &'a Database,
    vector_store: &'a VectorStore,
    files: &'a FileStore,
    embedder: &'a dyn Embedder,
    chunking: ChunkingConfig,
    show_progress: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub filename: String,
    pub error: String,
}

/// Outcome of one processing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingReport {
    pub processed: usize,
    pub failed: Vec<FailedFile>,
    /// Files that were already processed before this run
    pub skipped: usize,
    pub chunks_created: usize,
}

impl ProcessingReport {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<'a> Indexer<'a> {
    #[inline]
    pub fn new(
        database: &'a Database,
        vector_store: &'a VectorStore,
        files: &'a FileStore,
        embedder: &'a dyn Embedder,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            database,
            vector_store,
            files,
            embedder,
            chunking,
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr when it is attended
    #[inline]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Process every file that is not yet `processed`. A failing file is marked `failed`
    /// and the run moves on to the next one.
    #[inline]
    pub async fn process_notebook(&self, notebook: &Notebook) -> Result<ProcessingReport> {
        let all_files = self.database.list_files(notebook.id).await?;
        let pending = self.database.list_pending_files(notebook.id).await?;

        let mut report = ProcessingReport {
            skipped: all_files.len().saturating_sub(pending.len()),
            ..Default::default()
        };

        if pending.is_empty() {
            info!("Nothing to process in notebook '{}'", notebook.name);
            return Ok(report);
        }
        info!(
            "Processing {} files in notebook '{}'",
            pending.len(),
            notebook.name
        );

        let bar = self.progress_bar(pending.len());
        for file in &pending {
            bar.set_message(file.original_filename.clone());

            match self.process_file(notebook, file).await {
                Ok(chunk_count) => {
                    report.processed += 1;
                    report.chunks_created += chunk_count;
                }
                Err(e) => {
                    let message = e.to_string();
                    error!("Failed to process {}: {}", file.original_filename, message);
                    if let Err(mark_error) = self
                        .database
                        .update_file_status(file.id, FileStatus::Failed, Some(message.clone()), None)
                        .await
                    {
                        warn!(
                            "Could not mark {} as failed: {}",
                            file.original_filename, mark_error
                        );
                    }
                    report.failed.push(FailedFile {
                        filename: file.original_filename.clone(),
                        error: message,
                    });
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        self.database.touch_notebook(notebook.id).await?;

        info!(
            "Notebook '{}': {} processed, {} failed, {} already done, {} chunks",
            notebook.name,
            report.processed,
            report.failed.len(),
            report.skipped,
            report.chunks_created
        );
        Ok(report)
    }

    async fn process_file(&self, notebook: &Notebook, file: &FileRecord) -> Result<usize> {
        debug!("Processing file {} ({})", file.original_filename, file.id);

        let file = self
            .database
            .update_file_status(file.id, FileStatus::Processing, None, None)
            .await?;

        let path = self.files.file_path(notebook.id, &file.stored_filename);
        let text = extract_text(&path)?;
        if text.trim().is_empty() {
            return Err(NotebookError::Processing {
                file: file.original_filename.clone(),
                message: "no text could be extracted".to_string(),
            });
        }

        let chunks = chunk_text(&text, &self.chunking)?;
        debug!(
            "{} produced {} chunks",
            file.original_filename,
            chunks.len()
        );

        let collection = notebook.collection_name();
        // Reprocessing replaces whatever an earlier attempt stored
        self.vector_store
            .delete_file_chunks(&collection, file.id)
            .await?;
        let stored = self
            .vector_store
            .embed_and_upsert(self.embedder, &collection, notebook.id, &file, &chunks)
            .await?;

        let chunk_count = i64::try_from(stored).map_err(|e| NotebookError::Other(e.into()))?;
        self.database
            .update_file_status(file.id, FileStatus::Processed, None, Some(chunk_count))
            .await?;

        info!("Indexed {} ({} chunks)", file.original_filename, stored);
        Ok(stored)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress || !console::user_attended_stderr() {
            return ProgressBar::hidden();
        }

        let style = ProgressStyle::with_template("{spinner} [{pos}/{len}] Processing {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        ProgressBar::new(len as u64).with_style(style)
    }
}
