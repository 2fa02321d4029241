#[cfg(test)]
mod tests;

use super::{ChunkMetadata, EmbeddingRecord};
use crate::database::sqlite::models::FileRecord;
use crate::embeddings::Embedder;
use crate::embeddings::chunking::TextChunk;
use crate::retry::Backoff;
use crate::{NotebookError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const STALE_MARKER_EXTENSION: &str = "stale";

/// Vector database store using LanceDB, one table per notebook
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    backoff: Backoff,
}

/// Search result from vector similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    /// `1 - cosine distance`
    pub similarity_score: f32,
    pub distance: f32,
}

/// How a collection deletion was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionRemoval {
    Dropped,
    NotFound,
    /// The table could not be dropped, but all of its rows were deleted
    Emptied,
    /// Nothing could be removed; a marker was written so the table is purged on next open
    MarkedStale,
}

fn db_error(context: &str, err: impl std::fmt::Display) -> NotebookError {
    NotebookError::Database(format!("{context}: {err}"))
}

impl VectorStore {
    /// Connect to (and create if needed) the vector database directory
    #[inline]
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("Initializing LanceDB at path: {:?}", path);

        std::fs::create_dir_all(&path)
            .map_err(|e| db_error("Failed to create vector database directory", e))?;

        let uri = path.to_string_lossy().into_owned();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| db_error("Failed to connect to LanceDB", e))?;

        info!("Vector store initialized at {}", path.display());
        Ok(Self {
            connection,
            path,
            backoff: Backoff::default(),
        })
    }

    #[inline]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Collection name for a notebook id
    #[inline]
    pub fn collection_name(notebook_id: i64) -> String {
        crate::database::sqlite::models::collection_name(notebook_id)
    }

    #[inline]
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| db_error("Failed to list tables", e))
    }

    #[inline]
    pub async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self
            .list_collections()
            .await?
            .iter()
            .any(|name| name == collection))
    }

    async fn open_table(&self, collection: &str) -> Result<Option<Table>> {
        if !self.collection_exists(collection).await? {
            return Ok(None);
        }

        self.connection
            .open_table(collection)
            .execute()
            .await
            .map(Some)
            .map_err(|e| db_error("Failed to open table", e))
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim,
                ),
                false,
            ),
            Field::new("notebook_id", DataType::Int64, false),
            Field::new("file_id", DataType::Int64, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("char_offset", DataType::UInt32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Detect vector dimension from existing table schema
    async fn table_dimension(table: &Table) -> Result<i32> {
        let schema = table
            .schema()
            .await
            .map_err(|e| db_error("Failed to get table schema", e))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => Some(*size),
                _ => None,
            })
            .ok_or_else(|| {
                NotebookError::Database(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })
    }

    /// Insert or replace records by id. The table is created on first write using the
    /// dimension of the first record.
    #[inline]
    pub async fn upsert(&self, collection: &str, records: &[EmbeddingRecord]) -> Result<usize> {
        let Some(first) = records.first() else {
            debug!("No embeddings to store");
            return Ok(0);
        };

        let vector_dim = i32::try_from(first.vector.len())
            .map_err(|_| NotebookError::Embedding("Vector dimension too large".to_string()))?;
        if vector_dim == 0 {
            return Err(NotebookError::Embedding(
                "Embedding model returned an empty vector".to_string(),
            ));
        }

        let table = match self.open_table(collection).await? {
            Some(table) => {
                let existing = Self::table_dimension(&table).await?;
                if existing != vector_dim {
                    return Err(NotebookError::Embedding(format!(
                        "Vector dimension {} does not match collection '{}' ({})",
                        vector_dim, collection, existing
                    )));
                }
                table
            }
            None => {
                info!(
                    "Creating collection '{}' with {} dimensions",
                    collection, vector_dim
                );
                self.connection
                    .create_empty_table(collection, Self::create_schema(vector_dim))
                    .execute()
                    .await
                    .map_err(|e| db_error("Failed to create table", e))?
            }
        };

        let record_batch = Self::create_record_batch(records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| db_error("Failed to upsert embeddings", e))?;

        debug!(
            "Upserted {} embeddings into '{}'",
            records.len(),
            collection
        );
        Ok(records.len())
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(records: &[EmbeddingRecord], vector_dim: i32) -> Result<RecordBatch> {
        let len = records.len();
        let dim = vector_dim as usize;

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * dim);
        let mut notebook_ids = Vec::with_capacity(len);
        let mut file_ids = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut char_offsets = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            if record.vector.len() != dim {
                return Err(NotebookError::Embedding(format!(
                    "Record {} has {} dimensions, expected {}",
                    record.id,
                    record.vector.len(),
                    dim
                )));
            }
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            notebook_ids.push(record.metadata.notebook_id);
            file_ids.push(record.metadata.file_id);
            sources.push(record.metadata.source.as_str());
            chunk_indices.push(record.metadata.chunk_index);
            char_offsets.push(record.metadata.char_offset);
            contents.push(record.metadata.content.as_str());
            created_ats.push(record.metadata.created_at.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim, Arc::new(values_array), None)
                .map_err(|e| db_error("Failed to create vector array", e))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(Int64Array::from(notebook_ids)),
            Arc::new(Int64Array::from(file_ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(UInt32Array::from(char_offsets)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| db_error("Failed to create record batch", e))
    }

    /// Cosine similarity search. Returns at most `n_results` chunks whose similarity is
    /// at least `threshold`, best first. A missing collection yields no results.
    #[inline]
    pub async fn query(
        &self,
        collection: &str,
        query_vector: &[f32],
        n_results: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        debug!(
            "Searching '{}' (limit {}, threshold {})",
            collection, n_results, threshold
        );

        if n_results == 0 {
            return Ok(Vec::new());
        }

        let Some(table) = self.open_table(collection).await? else {
            debug!("Collection '{}' does not exist", collection);
            return Ok(Vec::new());
        };

        let results = table
            .vector_search(query_vector)
            .map_err(|e| db_error("Failed to create vector search", e))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(n_results)
            .execute()
            .await
            .map_err(|e| db_error("Failed to execute search", e))?;

        let mut search_results = Self::parse_search_results_stream(results).await?;

        search_results.retain(|r| r.similarity_score >= threshold);
        search_results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        search_results.truncate(n_results);

        debug!("{} results passed the threshold", search_results.len());
        Ok(search_results)
    }

    /// Parse search results from LanceDB stream into SearchResult structs
    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>> {
        let mut search_results = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| db_error("Failed to read result stream", e))?
        {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        Ok(search_results)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        fn column<'b, T: 'static>(batch: &'b RecordBatch, name: &str) -> Result<&'b T> {
            batch
                .column_by_name(name)
                .ok_or_else(|| NotebookError::Database(format!("Missing {name} column")))?
                .as_any()
                .downcast_ref::<T>()
                .ok_or_else(|| NotebookError::Database(format!("Invalid {name} column type")))
        }

        let notebook_ids = column::<Int64Array>(batch, "notebook_id")?;
        let file_ids = column::<Int64Array>(batch, "file_id")?;
        let sources = column::<StringArray>(batch, "source")?;
        let chunk_indices = column::<UInt32Array>(batch, "chunk_index")?;
        let char_offsets = column::<UInt32Array>(batch, "char_offset")?;
        let contents = column::<StringArray>(batch, "content")?;
        let created_ats = column::<StringArray>(batch, "created_at")?;
        let distances = column::<Float32Array>(batch, "_distance")?;

        let results = (0..batch.num_rows())
            .map(|row| {
                let distance = if distances.is_null(row) {
                    1.0
                } else {
                    distances.value(row)
                };

                SearchResult {
                    chunk_metadata: ChunkMetadata {
                        notebook_id: notebook_ids.value(row),
                        file_id: file_ids.value(row),
                        source: sources.value(row).to_string(),
                        chunk_index: chunk_indices.value(row),
                        char_offset: char_offsets.value(row),
                        content: contents.value(row).to_string(),
                        created_at: created_ats.value(row).to_string(),
                    },
                    similarity_score: 1.0 - distance,
                    distance,
                }
            })
            .collect();

        Ok(results)
    }

    /// Number of stored chunks; zero for a missing collection
    #[inline]
    pub async fn count(&self, collection: &str) -> Result<usize> {
        let Some(table) = self.open_table(collection).await? else {
            return Ok(0);
        };

        table
            .count_rows(None)
            .await
            .map_err(|e| db_error("Failed to count rows", e))
    }

    /// Remove every chunk of one file, e.g. partial data left by a failed run
    #[inline]
    pub async fn delete_file_chunks(&self, collection: &str, file_id: i64) -> Result<()> {
        let Some(table) = self.open_table(collection).await? else {
            return Ok(());
        };

        table
            .delete(&format!("file_id = {file_id}"))
            .await
            .map_err(|e| db_error("Failed to delete file chunks", e))?;

        debug!("Deleted chunks of file {} from '{}'", file_id, collection);
        Ok(())
    }

    /// Drop a collection, degrading to emptying it and finally to marking it stale
    #[inline]
    pub async fn delete_collection(&self, collection: &str) -> Result<CollectionRemoval> {
        if !self.collection_exists(collection).await? {
            self.clear_stale_marker(collection);
            return Ok(CollectionRemoval::NotFound);
        }

        let dropped = self
            .backoff
            .retry_async(&format!("Dropping collection '{collection}'"), || {
                self.connection.drop_table(collection)
            })
            .await;

        self.finish_removal(collection, dropped).await
    }

    /// Degrade from the outcome of dropping `collection` to emptying it and then to
    /// marking it stale
    async fn finish_removal<E: std::fmt::Display>(
        &self,
        collection: &str,
        dropped: std::result::Result<(), E>,
    ) -> Result<CollectionRemoval> {
        match dropped {
            Ok(()) => {
                info!("Dropped collection '{}'", collection);
                self.clear_stale_marker(collection);
                return Ok(CollectionRemoval::Dropped);
            }
            Err(e) => warn!("Could not drop collection '{}': {}", collection, e),
        }

        if let Some(table) = self.open_table(collection).await? {
            match table.delete("id IS NOT NULL").await {
                Ok(_) => {
                    warn!("Collection '{}' emptied instead of dropped", collection);
                    self.mark_stale(collection)?;
                    return Ok(CollectionRemoval::Emptied);
                }
                Err(e) => warn!("Could not empty collection '{}': {}", collection, e),
            }
        }

        self.mark_stale(collection)?;
        warn!(
            "Collection '{}' marked stale; it will be removed on next start",
            collection
        );
        Ok(CollectionRemoval::MarkedStale)
    }

    /// Drop every collection that a previous deletion could not remove
    #[inline]
    pub async fn purge_stale_collections(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(db_error("Failed to read vector directory", e)),
        };

        let stale: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == STALE_MARKER_EXTENSION)
            })
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();

        let mut purged = Vec::new();
        for collection in stale {
            if self.collection_exists(&collection).await? {
                if let Err(e) = self.connection.drop_table(&collection).await {
                    warn!("Stale collection '{}' is still locked: {}", collection, e);
                    continue;
                }
            }
            self.clear_stale_marker(&collection);
            info!("Purged stale collection '{}'", collection);
            purged.push(collection);
        }

        Ok(purged)
    }

    fn stale_marker_path(&self, collection: &str) -> PathBuf {
        self.path
            .join(format!("{collection}.{STALE_MARKER_EXTENSION}"))
    }

    fn mark_stale(&self, collection: &str) -> Result<()> {
        std::fs::write(self.stale_marker_path(collection), b"")
            .map_err(|e| db_error("Failed to write stale marker", e))
    }

    fn clear_stale_marker(&self, collection: &str) {
        let marker = self.stale_marker_path(collection);
        if marker.exists() {
            if let Err(e) = std::fs::remove_file(&marker) {
                warn!("Failed to remove stale marker {}: {}", marker.display(), e);
            }
        }
    }

    /// Embed the chunks of `file` and upsert them into the collection
    #[inline]
    pub async fn embed_and_upsert(
        &self,
        embedder: &dyn Embedder,
        collection: &str,
        notebook_id: i64,
        file: &FileRecord,
        chunks: &[TextChunk],
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder
            .embed(&texts)
            .map_err(|e| NotebookError::Embedding(format!("{e:#}")))?;

        if vectors.len() != chunks.len() {
            return Err(NotebookError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let created_at = chrono::Utc::now().to_rfc3339();
        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                EmbeddingRecord::from_chunk(notebook_id, file, chunk, vector, &created_at)
            })
            .collect();

        self.upsert(collection, &records).await
    }

    /// Embed `text` and search the collection with it
    #[inline]
    pub async fn query_text(
        &self,
        embedder: &dyn Embedder,
        collection: &str,
        text: &str,
        n_results: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        if !self.collection_exists(collection).await? {
            return Ok(Vec::new());
        }

        let vector = embedder
            .embed_query(text)
            .map_err(|e| NotebookError::Embedding(format!("{e:#}")))?;

        self.query(collection, &vector, n_results, threshold).await
    }
}
