use super::*;
use tempfile::TempDir;

#[test]
fn load_existing_config_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config(temp_dir.path()).expect("config loaded successfully");
    assert!(!config.app.llm.model.is_empty());
    assert!(config.app.embeddings.batch_size > 0);
}

#[test]
fn init_writes_defaults_once() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = init_config(temp_dir.path(), false).expect("should write defaults");
    assert!(config.app_config_path().exists());
    assert!(config.prompt_config_path().exists());
    assert!(config.data_dir().is_dir());

    let mut edited = config.clone();
    edited.app.vectordb.n_results = 9;
    edited.save().expect("should save edit");

    let reloaded = init_config(temp_dir.path(), false).expect("should keep existing files");
    assert_eq!(reloaded.app.vectordb.n_results, 9);

    let reset = init_config(temp_dir.path(), true).expect("should overwrite files");
    assert_eq!(reset.app.vectordb.n_results, 5);
}

#[test]
fn provider_choices_point_at_current() {
    let mut app = AppConfig::default();
    let (names, current) = provider_choices(&app);
    assert_eq!(names[current], "groq");

    app.llm.provider = "ollama".to_string();
    let (names, current) = provider_choices(&app);
    assert_eq!(names[current], "ollama");
}

#[test]
fn unreachable_ollama_is_reported() {
    assert!(!test_ollama_connection("http://127.0.0.1:1"));
}
