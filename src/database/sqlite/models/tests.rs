use super::*;

#[test]
fn file_status_transitions() {
    use FileStatus::{Failed, Processed, Processing, Uploaded};

    assert!(Uploaded.can_transition_to(Processing));
    assert!(Processing.can_transition_to(Processed));
    assert!(Processing.can_transition_to(Failed));
    assert!(Processing.can_transition_to(Processing));
    assert!(Failed.can_transition_to(Processing));

    assert!(!Uploaded.can_transition_to(Processed));
    assert!(!Uploaded.can_transition_to(Failed));
    assert!(!Failed.can_transition_to(Processed));
    for next in [Uploaded, Processing, Processed, Failed] {
        assert!(!Processed.can_transition_to(next));
    }

    assert!(Processed.is_terminal());
    assert!(!Failed.is_terminal());
}

#[test]
fn status_display_and_str() {
    assert_eq!(FileStatus::Uploaded.to_string(), "Uploaded");
    assert_eq!(FileStatus::Processed.as_str(), "processed");
    assert_eq!(
        serde_json::to_string(&FileStatus::Failed).expect("should serialize status"),
        "\"failed\""
    );
}

#[test]
fn notebook_name_rules() {
    assert_eq!(
        normalize_notebook_name("  Research  ").expect("valid name"),
        "Research"
    );
    assert!(normalize_notebook_name("ab").is_err());
    assert!(normalize_notebook_name("  ab  ").is_err());
    assert!(normalize_notebook_name("").is_err());
    // Three characters that take more than three bytes
    assert!(normalize_notebook_name("日本語").is_ok());
    assert!(normalize_notebook_name("日本").is_err());
}

#[test]
fn notebook_naming() {
    let now = chrono::Utc::now().naive_utc();
    let notebook = Notebook {
        id: 42,
        name: "Papers".to_string(),
        created_at: now,
        updated_at: now,
    };
    assert_eq!(notebook.collection_name(), "notebook_42");
    assert_eq!(notebook.storage_dir_name(), "notebook_42");
}

#[test]
fn status_counts() {
    let mut counts = FileStatusCounts::default();
    counts.record(FileStatus::Uploaded, 2);
    counts.record(FileStatus::Processed, 3);
    counts.record(FileStatus::Failed, 1);

    assert_eq!(counts.total(), 6);
    assert_eq!(counts.pending(), 3);
}
