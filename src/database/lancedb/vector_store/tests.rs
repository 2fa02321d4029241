use super::*;
use tempfile::TempDir;

async fn create_test_store() -> (VectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::new(temp_dir.path().join("vector_db"))
        .await
        .expect("should create vector store")
        .with_backoff(Backoff::immediate(2));
    (store, temp_dir)
}

fn record(file_id: i64, chunk_index: usize, vector: Vec<f32>, content: &str) -> EmbeddingRecord {
    EmbeddingRecord {
        id: EmbeddingRecord::record_id(file_id, chunk_index),
        vector,
        metadata: ChunkMetadata {
            notebook_id: 1,
            file_id,
            source: format!("file_{file_id}.txt"),
            chunk_index: chunk_index as u32,
            char_offset: 0,
            content: content.to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

fn sample_records() -> Vec<EmbeddingRecord> {
    vec![
        record(1, 0, vec![1.0, 0.0, 0.0], "exact match"),
        record(1, 1, vec![0.8, 0.6, 0.0], "close match"),
        record(2, 0, vec![0.0, 1.0, 0.0], "unrelated"),
    ]
}

/// Returns a fixed vector per known text
struct FakeEmbedder;

impl Embedder for FakeEmbedder {
    fn model(&self) -> &str {
        "fake"
    }

    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                if t.contains("cats") {
                    vec![1.0, 0.0, 0.0]
                } else {
                    vec![0.0, 0.0, 1.0]
                }
            })
            .collect())
    }
}

#[tokio::test]
async fn vector_store_initialization() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("nested").join("vector_db");

    let store = VectorStore::new(&path).await;
    assert!(store.is_ok(), "Failed to initialize VectorStore: {:?}", store.err());
    assert!(path.is_dir());
}

#[tokio::test]
async fn upsert_creates_collection_and_counts() {
    let (store, _temp_dir) = create_test_store().await;
    let collection = VectorStore::collection_name(1);
    assert_eq!(collection, "notebook_1");

    assert!(!store.collection_exists(&collection).await.expect("exists"));
    assert_eq!(store.count(&collection).await.expect("count"), 0);

    let stored = store
        .upsert(&collection, &sample_records())
        .await
        .expect("should store embeddings");
    assert_eq!(stored, 3);
    assert!(store.collection_exists(&collection).await.expect("exists"));
    assert_eq!(store.count(&collection).await.expect("count"), 3);
}

#[tokio::test]
async fn upsert_is_idempotent_by_id() {
    let (store, _temp_dir) = create_test_store().await;
    let collection = VectorStore::collection_name(1);

    store
        .upsert(&collection, &sample_records())
        .await
        .expect("first upsert");
    store
        .upsert(
            &collection,
            &[record(1, 0, vec![1.0, 0.0, 0.0], "replaced content")],
        )
        .await
        .expect("second upsert");

    assert_eq!(store.count(&collection).await.expect("count"), 3);

    let results = store
        .query(&collection, &[1.0, 0.0, 0.0], 1, 0.9)
        .await
        .expect("query");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_metadata.content, "replaced content");
}

#[tokio::test]
async fn empty_upsert_is_noop() {
    let (store, _temp_dir) = create_test_store().await;
    let stored = store.upsert("notebook_9", &[]).await.expect("upsert");
    assert_eq!(stored, 0);
    assert!(!store.collection_exists("notebook_9").await.expect("exists"));
}

#[tokio::test]
async fn query_filters_by_threshold_and_sorts() {
    let (store, _temp_dir) = create_test_store().await;
    let collection = VectorStore::collection_name(1);
    store
        .upsert(&collection, &sample_records())
        .await
        .expect("upsert");

    let results = store
        .query(&collection, &[1.0, 0.0, 0.0], 5, 0.5)
        .await
        .expect("query");

    let contents: Vec<&str> = results
        .iter()
        .map(|r| r.chunk_metadata.content.as_str())
        .collect();
    assert_eq!(contents, vec!["exact match", "close match"]);
    assert!(results[0].similarity_score >= results[1].similarity_score);
    assert!((results[1].similarity_score - 0.8).abs() < 1e-3);
    for result in &results {
        assert!(result.similarity_score >= 0.5);
        assert!((result.similarity_score + result.distance - 1.0).abs() < 1e-6);
    }
}

#[tokio::test]
async fn query_respects_result_limit() {
    let (store, _temp_dir) = create_test_store().await;
    let collection = VectorStore::collection_name(1);
    store
        .upsert(&collection, &sample_records())
        .await
        .expect("upsert");

    let results = store
        .query(&collection, &[1.0, 0.0, 0.0], 1, 0.0)
        .await
        .expect("query");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_metadata.content, "exact match");
}

#[tokio::test]
async fn threshold_above_one_returns_nothing() {
    let (store, _temp_dir) = create_test_store().await;
    let collection = VectorStore::collection_name(1);
    store
        .upsert(&collection, &sample_records())
        .await
        .expect("upsert");

    let results = store
        .query(&collection, &[1.0, 0.0, 0.0], 5, 1.1)
        .await
        .expect("query");
    assert!(results.is_empty());
}

#[tokio::test]
async fn missing_collection_returns_empty() {
    let (store, _temp_dir) = create_test_store().await;
    let results = store
        .query("notebook_404", &[1.0, 0.0, 0.0], 5, 0.0)
        .await
        .expect("query");
    assert!(results.is_empty());
}

#[tokio::test]
async fn dimension_mismatch_is_rejected() {
    let (store, _temp_dir) = create_test_store().await;
    let collection = VectorStore::collection_name(1);
    store
        .upsert(&collection, &sample_records())
        .await
        .expect("upsert");

    let result = store
        .upsert(&collection, &[record(3, 0, vec![1.0, 0.0], "too short")])
        .await;
    assert!(matches!(result, Err(NotebookError::Embedding(_))));

    let mixed = vec![
        record(4, 0, vec![1.0, 0.0, 0.0], "ok"),
        record(4, 1, vec![1.0], "bad"),
    ];
    assert!(matches!(
        store.upsert("notebook_2", &mixed).await,
        Err(NotebookError::Embedding(_))
    ));
}

#[tokio::test]
async fn delete_file_chunks_only_removes_that_file() {
    let (store, _temp_dir) = create_test_store().await;
    let collection = VectorStore::collection_name(1);
    store
        .upsert(&collection, &sample_records())
        .await
        .expect("upsert");

    store
        .delete_file_chunks(&collection, 1)
        .await
        .expect("delete chunks");
    assert_eq!(store.count(&collection).await.expect("count"), 1);

    // Missing collection is not an error
    store
        .delete_file_chunks("notebook_77", 1)
        .await
        .expect("delete from missing collection");
}

#[tokio::test]
async fn delete_collection_drops_then_reports_not_found() {
    let (store, _temp_dir) = create_test_store().await;
    let collection = VectorStore::collection_name(1);
    store
        .upsert(&collection, &sample_records())
        .await
        .expect("upsert");

    assert_eq!(
        store.delete_collection(&collection).await.expect("delete"),
        CollectionRemoval::Dropped
    );
    assert!(!store.collection_exists(&collection).await.expect("exists"));
    assert_eq!(
        store.delete_collection(&collection).await.expect("delete"),
        CollectionRemoval::NotFound
    );
}

#[tokio::test]
async fn undroppable_collection_is_emptied() {
    let (store, _temp_dir) = create_test_store().await;
    let collection = VectorStore::collection_name(3);
    store
        .upsert(&collection, &sample_records())
        .await
        .expect("upsert");

    let removal = store
        .finish_removal(&collection, Err::<(), _>("table is in use"))
        .await
        .expect("should degrade");
    assert_eq!(removal, CollectionRemoval::Emptied);
    assert_eq!(store.count(&collection).await.expect("count"), 0);
    assert!(store.stale_marker_path(&collection).exists());

    // The emptied table goes away on the next purge
    let purged = store.purge_stale_collections().await.expect("purge");
    assert_eq!(purged, vec![collection.clone()]);
    assert!(!store.collection_exists(&collection).await.expect("exists"));
}

#[tokio::test]
async fn unopenable_collection_is_marked_stale() {
    let (store, _temp_dir) = create_test_store().await;
    let collection = VectorStore::collection_name(4);

    let removal = store
        .finish_removal(&collection, Err::<(), _>("table is locked"))
        .await
        .expect("should degrade");
    assert_eq!(removal, CollectionRemoval::MarkedStale);
    assert!(store.stale_marker_path(&collection).exists());

    let purged = store.purge_stale_collections().await.expect("purge");
    assert_eq!(purged, vec![collection.clone()]);
    assert!(!store.stale_marker_path(&collection).exists());
}

#[tokio::test]
async fn stale_collections_are_purged() {
    let (store, _temp_dir) = create_test_store().await;
    let collection = VectorStore::collection_name(5);
    store
        .upsert(&collection, &sample_records())
        .await
        .expect("upsert");

    store.mark_stale(&collection).expect("mark stale");
    assert!(store.stale_marker_path(&collection).exists());

    let purged = store.purge_stale_collections().await.expect("purge");
    assert_eq!(purged, vec![collection.clone()]);
    assert!(!store.collection_exists(&collection).await.expect("exists"));
    assert!(!store.stale_marker_path(&collection).exists());

    assert!(
        store
            .purge_stale_collections()
            .await
            .expect("purge")
            .is_empty()
    );
}

#[tokio::test]
async fn embed_and_query_text() {
    let (store, _temp_dir) = create_test_store().await;
    let collection = VectorStore::collection_name(1);
    let now = chrono::Utc::now().naive_utc();
    let file = FileRecord {
        id: 10,
        notebook_id: 1,
        original_filename: "pets.txt".to_string(),
        stored_filename: "pets.txt".to_string(),
        upload_date: now,
        status: crate::database::sqlite::models::FileStatus::Processing,
        error_message: None,
        chunk_count: 0,
        processed_at: None,
    };
    let chunks = vec![
        TextChunk {
            content: "All about cats".to_string(),
            chunk_index: 0,
            char_offset: 0,
        },
        TextChunk {
            content: "Nothing relevant".to_string(),
            chunk_index: 1,
            char_offset: 15,
        },
    ];

    let stored = store
        .embed_and_upsert(&FakeEmbedder, &collection, 1, &file, &chunks)
        .await
        .expect("embed and upsert");
    assert_eq!(stored, 2);

    let results = store
        .query_text(&FakeEmbedder, &collection, "tell me about cats", 5, 0.5)
        .await
        .expect("query text");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_metadata.source, "pets.txt");
    assert_eq!(results[0].chunk_metadata.chunk_index, 0);

    assert!(
        store
            .query_text(&FakeEmbedder, "notebook_3", "cats", 5, 0.0)
            .await
            .expect("query missing")
            .is_empty()
    );
}
