use console::style;
use dialoguer::Confirm;
use std::path::PathBuf;
use tracing::{error, info};

use crate::Result;
use crate::config::Config;
use crate::conversation::RetrievalOptions;
use crate::database::lancedb::CollectionRemoval;
use crate::database::sqlite::models::FileStatus;
use crate::embeddings::OllamaClient;
use crate::llm::{LlmSelection, create_provider};
use crate::notebooks::Notebooks;
use crate::storage::DirectoryRemoval;

/// Command-line overrides for a single question
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AskOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub n_results: Option<usize>,
    pub threshold: Option<f32>,
}

#[inline]
pub async fn create_notebook(service: &Notebooks, name: &str) -> Result<()> {
    let notebook = service.create(name).await?;
    println!(
        "{} Created notebook {} (ID: {})",
        style("✓").green(),
        style(&notebook.name).bold(),
        notebook.id
    );
    println!("Upload documents with 'notebook-rag upload \"{}\" <files>'", notebook.name);
    Ok(())
}

/// List notebooks with their file counts, most recently updated first
#[inline]
pub async fn list_notebooks(service: &Notebooks) -> Result<()> {
    let summaries = service.list().await?;

    if summaries.is_empty() {
        println!("No notebooks have been created yet.");
        println!("Use 'notebook-rag create <name>' to create one.");
        return Ok(());
    }

    println!("Notebooks ({} total):", summaries.len());
    println!();

    for summary in &summaries {
        let notebook = &summary.notebook;
        let files = &summary.files;
        println!("📓 {} (ID: {})", style(&notebook.name).bold(), notebook.id);
        println!(
            "   Files: {} ({} processed, {} pending, {} failed)",
            files.total(),
            files.processed,
            files.uploaded + files.processing,
            files.failed
        );
        println!(
            "   Updated: {}",
            notebook.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!();
    }

    Ok(())
}

/// Delete a notebook after confirmation, reporting any cleanup that only half worked
#[inline]
pub async fn delete_notebook(service: &Notebooks, name: &str, assume_yes: bool) -> Result<()> {
    let notebook = service.get(name).await?;
    let files = service.database().list_files(notebook.id).await?;

    println!(
        "Notebook {} has {} files.",
        style(&notebook.name).bold(),
        files.len()
    );
    println!("This deletes its documents, embeddings and history. It cannot be undone.");

    if !assume_yes
        && !Confirm::new()
            .with_prompt("Delete this notebook?")
            .default(false)
            .interact()
            .map_err(anyhow::Error::from)?
    {
        println!("Nothing deleted.");
        return Ok(());
    }

    let report = service.delete(&notebook.name).await?;
    println!("{} Notebook records deleted", style("✓").green());
    match report.collection {
        Some(CollectionRemoval::Dropped) => {
            println!("{} Vector embeddings deleted", style("✓").green());
        }
        Some(CollectionRemoval::NotFound) => println!("  No vector embeddings to delete"),
        _ => {}
    }
    match report.directory {
        Some(DirectoryRemoval::Removed) => {
            println!("{} Uploaded files deleted", style("✓").green());
        }
        Some(DirectoryRemoval::NotFound) => println!("  No uploaded files to delete"),
        None => {}
    }
    for warning in &report.warnings {
        println!("{} {}", style("⚠").yellow(), warning);
    }

    Ok(())
}

/// Upload each file, continuing past individual failures
#[inline]
pub async fn upload_files(service: &Notebooks, notebook: &str, paths: &[PathBuf]) -> Result<()> {
    let notebook = service.get(notebook).await?;
    let mut uploaded = 0;

    for path in paths {
        match service.upload(&notebook.name, path).await {
            Ok(record) => {
                uploaded += 1;
                println!(
                    "{} {} uploaded",
                    style("✓").green(),
                    record.original_filename
                );
            }
            Err(e) => {
                error!("Upload of {} failed: {}", path.display(), e);
                println!("{} {}: {}", style("✗").red(), path.display(), e);
            }
        }
    }

    println!();
    println!(
        "Uploaded {} of {} files to {}.",
        uploaded,
        paths.len(),
        style(&notebook.name).bold()
    );
    if uploaded > 0 {
        println!(
            "Run 'notebook-rag process \"{}\"' to make them searchable.",
            notebook.name
        );
    }
    Ok(())
}

#[inline]
pub async fn list_files(service: &Notebooks, notebook: &str) -> Result<()> {
    let notebook = service.get(notebook).await?;
    let files = service.database().list_files(notebook.id).await?;

    if files.is_empty() {
        println!("No files in {} yet.", style(&notebook.name).bold());
        return Ok(());
    }

    println!("Files in {} ({} total):", style(&notebook.name).bold(), files.len());
    println!();
    for file in &files {
        let status = match file.status {
            FileStatus::Processed => style(file.status.as_str()).green(),
            FileStatus::Failed => style(file.status.as_str()).red(),
            FileStatus::Uploaded | FileStatus::Processing => style(file.status.as_str()).yellow(),
        };
        println!("📄 {} [{}]", file.original_filename, status);
        println!(
            "   Uploaded: {}",
            file.upload_date.format("%Y-%m-%d %H:%M:%S")
        );
        if file.status == FileStatus::Processed {
            println!("   Chunks: {}", file.chunk_count);
        }
        if let Some(error) = &file.error_message {
            println!("   ⚠️  Error: {}", error);
        }
    }
    Ok(())
}

#[inline]
pub async fn process_notebook(service: &Notebooks, notebook: &str) -> Result<()> {
    let report = service.process(notebook).await?;

    if report.processed == 0 && report.failed.is_empty() {
        println!("Nothing to process; all {} files are up to date.", report.skipped);
        return Ok(());
    }

    println!(
        "{} Processed {} files ({} chunks)",
        style("✓").green(),
        report.processed,
        report.chunks_created
    );
    if report.skipped > 0 {
        println!("  {} files were already processed", report.skipped);
    }
    for failed in &report.failed {
        println!(
            "{} {}: {}",
            style("✗").red(),
            failed.filename,
            failed.error
        );
    }
    Ok(())
}

/// Answer one question without keeping history
#[inline]
pub async fn ask_question(
    service: &Notebooks,
    notebook: &str,
    question: &str,
    options: &AskOptions,
) -> Result<()> {
    let notebook = service.get(notebook).await?;
    let app = &service.config().app;

    let selection = LlmSelection::resolve(app, options.provider.as_deref(), options.model.as_deref())?;
    let provider = create_provider(app, &selection.provider)?;
    let retrieval = RetrievalOptions::from_config(&app.vectordb)
        .with_overrides(options.n_results, options.threshold)?;

    info!(
        "Asking {} ({}) about '{}'",
        selection.model, selection.provider, notebook.name
    );
    let manager = service.conversation(provider.as_ref(), &selection.model, retrieval);
    let answer = manager.respond(&notebook, question, &[]).await?;

    println!("{}", answer.text);
    let sources = answer.source_names();
    if !sources.is_empty() {
        println!();
        println!("{} {}", style("Sources:").dim(), sources.join(", "));
    }
    Ok(())
}

/// Configured providers and their models, plus the models installed in Ollama
#[inline]
pub fn list_models(config: &Config) {
    let app = &config.app;
    println!("{}", style("Language models").bold());
    for (name, provider) in &app.providers {
        println!("  {}", style(name).cyan());
        if provider.models.is_empty() {
            println!("    (any model)");
        }
        for model in &provider.models {
            let active = *name == app.llm.provider && *model == app.llm.model;
            if active {
                println!("    {} {}", style("*").green(), style(model).bold());
            } else {
                println!("      {model}");
            }
        }
    }

    println!();
    println!("{}", style("Installed in Ollama").bold());
    match OllamaClient::new(&app.embeddings).and_then(|client| client.list_models()) {
        Ok(models) if models.is_empty() => println!("  (none)"),
        Ok(models) => {
            for model in models {
                match model.size {
                    Some(bytes) => println!("  {} ({} MB)", model.name, bytes / 1_000_000),
                    None => println!("  {}", model.name),
                }
            }
        }
        Err(e) => println!(
            "  {} Could not reach Ollama at {}: {}",
            style("⚠").yellow(),
            app.embeddings.host,
            e
        ),
    }
}

#[inline]
pub async fn show_status(service: &Notebooks) -> Result<()> {
    let status = service.status().await?;
    let config = service.config();

    println!("📊 Notebook RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Storage:");
    println!("   Home: {}", status.base_dir.display());
    println!("   Notebooks: {}", status.notebooks);
    println!("   Files: {}", status.files);
    println!("   Vector collections: {}", status.collections);
    println!();

    println!("🤖 Embeddings:");
    println!("   Model: {}", status.embedding_model);
    match OllamaClient::new(&config.app.embeddings).and_then(|client| client.health_check()) {
        Ok(()) => println!("   ✅ Ollama: Connected ({})", config.app.embeddings.host),
        Err(e) => println!("   ⚠️  Ollama: {}", e),
    }
    println!();

    println!("💬 Language model:");
    println!("   Provider: {}", status.llm_provider);
    println!("   Model: {}", status.llm_model);
    match create_provider(&config.app, &status.llm_provider) {
        Ok(_) => println!("   ✅ Provider configured"),
        Err(e) => println!("   ⚠️  {}", e),
    }

    Ok(())
}
