#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// HTTP behavior of the Ollama embedding client and the LLM providers

use serde_json::json;
use serial_test::serial;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notebook_rag::NotebookError;
use notebook_rag::config::{AppConfig, EmbeddingConfig};
use notebook_rag::embeddings::{Embedder, OllamaClient};
use notebook_rag::llm::{GroqProvider, LlmProvider, Prompt, ProviderError, create_provider};

fn embedding_client(host: &str) -> OllamaClient {
    let config = EmbeddingConfig {
        host: host.to_string(),
        model: "all-minilm:latest".to_string(),
        batch_size: 8,
    };
    OllamaClient::new(&config)
        .expect("can create client")
        .with_retry_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn embedding_server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = embedding_client(&server.uri());
    let result = tokio::task::spawn_blocking(move || client.embed(&["text".to_string()]))
        .await
        .expect("task panicked");

    assert!(result.is_err());
}

#[tokio::test]
async fn embedding_client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let client = embedding_client(&server.uri());
    let result = tokio::task::spawn_blocking(move || client.embed(&["text".to_string()]))
        .await
        .expect("task panicked");

    assert!(result.is_err());
}

#[tokio::test]
async fn health_check_reports_missing_model() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "nomic-embed-text:latest" }]
        })))
        .mount(&server)
        .await;

    let client = embedding_client(&server.uri());
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("task panicked");

    let message = result.expect_err("model is missing").to_string();
    assert!(message.contains("ollama pull all-minilm:latest"));
}

#[tokio::test]
async fn provider_failure_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GroqProvider::new(format!("{}/openai/v1", server.uri()), "key");
    let result = tokio::task::spawn_blocking(move || {
        provider.generate(&Prompt::new("hello"), "llama-3.1-8b-instant")
    })
    .await
    .expect("task panicked");

    assert!(matches!(
        result,
        Err(ProviderError::Rejected { status: 500, .. })
    ));
}

#[test]
#[serial]
fn groq_requires_api_key() {
    let mut config = AppConfig::default();
    if let Some(groq) = config.providers.get_mut("groq") {
        groq.api_key_env = Some("NOTEBOOK_RAG_INTEGRATION_MISSING_KEY".to_string());
    }
    // SAFETY: serialized with every other test touching the environment
    unsafe { std::env::remove_var("NOTEBOOK_RAG_INTEGRATION_MISSING_KEY") };

    assert!(matches!(
        create_provider(&config, "groq"),
        Err(NotebookError::Provider(ProviderError::MissingApiKey(_)))
    ));
}
