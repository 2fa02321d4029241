
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::conversation::{ConversationManager, RetrievalOptions};
use crate::database::lancedb::{CollectionRemoval, VectorStore};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{FileRecord, FileStatusCounts, Notebook};
use crate::documents::DocumentFormat;
use crate::embeddings::{Embedder, OllamaClient};
use crate::indexer::{Indexer, ProcessingReport};
use crate::llm::LlmProvider;
use crate::storage::{DirectoryRemoval, FileStore};
use crate::{NotebookError, Result};

/// Every notebook operation, with the stores it needs opened once
pub struct Notebooks {
    config: Config,
    database: Database,
    vector_store: VectorStore,
    files: FileStore,
    embedder: Box<dyn Embedder>,
    show_progress: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookSummary {
    pub notebook: Notebook,
    pub files: FileStatusCounts,
}

/// What a notebook deletion removed, and which cleanup steps only half worked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub notebook: String,
    pub files_removed: usize,
    pub collection: Option<CollectionRemoval>,
    pub directory: Option<DirectoryRemoval>,
    pub warnings: Vec<String>,
}

impl DeletionReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub base_dir: PathBuf,
    pub notebooks: i64,
    pub files: i64,
    pub collections: usize,
    pub embedding_model: String,
    pub llm_provider: String,
    pub llm_model: String,
}

impl Notebooks {
    /// Open the stores under the configured base directory with the Ollama embedder
    #[inline]
    pub async fn open(config: Config) -> Result<Self> {
        let embedder = OllamaClient::new(&config.app.embeddings)?;
        Self::open_with_embedder(config, Box::new(embedder)).await
    }

    #[inline]
    pub async fn open_with_embedder(config: Config, embedder: Box<dyn Embedder>) -> Result<Self> {
        config.ensure_directories()?;

        let database = Database::new(config.database_path()).await?;
        let vector_store = VectorStore::new(config.vector_db_path()).await?;
        let files = FileStore::new(config.data_dir());

        let purged = vector_store.purge_stale_collections().await?;
        if !purged.is_empty() {
            info!("Removed {} collections left over from deletions", purged.len());
        }

        Ok(Self {
            config,
            database,
            vector_store,
            files,
            embedder,
            show_progress: false,
        })
    }

    #[inline]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn vector_store(&self) -> &VectorStore {
        &self.vector_store
    }

    #[inline]
    pub fn file_store(&self) -> &FileStore {
        &self.files
    }

    #[inline]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Create the notebook row and its upload directory
    #[inline]
    pub async fn create(&self, name: &str) -> Result<Notebook> {
        let notebook = self.database.create_notebook(name).await?;

        if let Err(e) = self.files.ensure_notebook_dir(notebook.id) {
            warn!("Rolling back notebook '{}': {}", notebook.name, e);
            self.database.delete_notebook(notebook.id).await?;
            return Err(e);
        }
        Ok(notebook)
    }

    #[inline]
    pub async fn list(&self) -> Result<Vec<NotebookSummary>> {
        let notebooks = self.database.list_notebooks().await?;
        let mut summaries = Vec::with_capacity(notebooks.len());
        for notebook in notebooks {
            let files = self.database.file_status_counts(notebook.id).await?;
            summaries.push(NotebookSummary { notebook, files });
        }
        Ok(summaries)
    }

    #[inline]
    pub async fn get(&self, name: &str) -> Result<Notebook> {
        self.database
            .get_notebook_by_name(name)
            .await?
            .ok_or_else(|| NotebookError::NotFound(format!("notebook '{}'", name.trim())))
    }

    #[inline]
    pub async fn files(&self, name: &str) -> Result<Vec<FileRecord>> {
        let notebook = self.get(name).await?;
        self.database.list_files(notebook.id).await
    }

    /// Copy a file from disk into the notebook
    #[inline]
    pub async fn upload<P: AsRef<Path>>(&self, name: &str, path: P) -> Result<FileRecord> {
        let path = path.as_ref();
        let original = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                NotebookError::Validation(format!("'{}' is not a file", path.display()))
            })?;
        DocumentFormat::from_path(path)?;

        let bytes = tokio::fs::read(path).await?;
        self.upload_bytes(name, &original, &bytes).await
    }

    /// Store uploaded bytes and record them as `uploaded`. The saved file is removed again
    /// when the record cannot be written.
    #[inline]
    pub async fn upload_bytes(
        &self,
        name: &str,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<FileRecord> {
        DocumentFormat::from_path(original_filename)?;
        let notebook = self.get(name).await?;

        let stored = self
            .files
            .save_upload(notebook.id, original_filename, bytes)?;

        match self
            .database
            .add_file(notebook.id, original_filename, &stored.stored_filename)
            .await
        {
            Ok(record) => {
                self.database.touch_notebook(notebook.id).await?;
                info!(
                    "Uploaded '{}' to '{}' as {}",
                    original_filename, notebook.name, stored.stored_filename
                );
                Ok(record)
            }
            Err(e) => {
                if let Err(cleanup) = self.files.remove_file(notebook.id, &stored.stored_filename) {
                    warn!("Could not remove {}: {}", stored.path.display(), cleanup);
                }
                Err(e)
            }
        }
    }

    #[inline]
    pub async fn process(&self, name: &str) -> Result<ProcessingReport> {
        let notebook = self.get(name).await?;
        Indexer::new(
            &self.database,
            &self.vector_store,
            &self.files,
            self.embedder.as_ref(),
            self.config.app.chunking,
        )
        .with_progress(self.show_progress)
        .process_notebook(&notebook)
        .await
    }

    /// Delete the rows first, then the vector collection and the upload directory.
    /// Cleanup failures after the rows are gone are reported as warnings.
    #[inline]
    pub async fn delete(&self, name: &str) -> Result<DeletionReport> {
        let notebook = self.get(name).await?;
        let files_removed = self.database.list_files(notebook.id).await?.len();

        if !self.database.delete_notebook(notebook.id).await? {
            return Err(NotebookError::NotFound(format!(
                "notebook '{}'",
                notebook.name
            )));
        }
        debug!("Deleted rows for notebook '{}'", notebook.name);

        let mut report = DeletionReport {
            notebook: notebook.name.clone(),
            files_removed,
            collection: None,
            directory: None,
            warnings: Vec::new(),
        };

        match self
            .vector_store
            .delete_collection(&notebook.collection_name())
            .await
        {
            Ok(removal) => {
                match removal {
                    CollectionRemoval::Emptied => report.warnings.push(format!(
                        "Vector collection {} was emptied but could not be dropped",
                        notebook.collection_name()
                    )),
                    CollectionRemoval::MarkedStale => report.warnings.push(format!(
                        "Vector collection {} is locked and will be removed on next start",
                        notebook.collection_name()
                    )),
                    CollectionRemoval::Dropped | CollectionRemoval::NotFound => {}
                }
                report.collection = Some(removal);
            }
            Err(e) => report
                .warnings
                .push(format!("Vector collection was not removed: {e}")),
        }

        match self.files.delete_notebook_dir(notebook.id) {
            Ok(removal) => report.directory = Some(removal),
            Err(e) => report.warnings.push(e.to_string()),
        }

        for warning in &report.warnings {
            warn!("{}", warning);
        }
        info!("Deleted notebook '{}'", notebook.name);
        Ok(report)
    }

    #[inline]
    pub async fn status(&self) -> Result<StatusReport> {
        Ok(StatusReport {
            base_dir: self.config.get_base_dir().to_path_buf(),
            notebooks: self.database.count_notebooks().await?,
            files: self.database.count_files().await?,
            collections: self.vector_store.list_collections().await?.len(),
            embedding_model: self.embedder.model().to_string(),
            llm_provider: self.config.app.llm.provider.clone(),
            llm_model: self.config.app.llm.model.clone(),
        })
    }

    /// A conversation over this service's stores with the given provider
    #[inline]
    pub fn conversation<'a>(
        &'a self,
        provider: &'a dyn LlmProvider,
        model: &str,
        retrieval: RetrievalOptions,
    ) -> ConversationManager<'a> {
        ConversationManager::new(
            &self.vector_store,
            self.embedder.as_ref(),
            provider,
            &self.config,
            model,
        )
        .with_retrieval(retrieval)
    }
}
