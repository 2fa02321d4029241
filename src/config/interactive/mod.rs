#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{AppConfig, Config, ConfigError, MemoryStrategyKind};

/// Interactive provider/model selection plus retrieval and embedding settings
#[inline]
pub fn run_interactive_settings(base_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Notebook RAG Settings").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(base_dir)?;

    eprintln!("{}", style("Language Model").bold().yellow());
    eprintln!("Choose the provider and model used to answer questions.");
    eprintln!();
    select_llm(&mut config.app)?;

    eprintln!();
    eprintln!("{}", style("Retrieval").bold().yellow());
    configure_retrieval(&mut config.app)?;

    eprintln!();
    eprintln!("{}", style("Embeddings").bold().yellow());
    eprintln!("Configure the Ollama instance used to embed document chunks.");
    configure_embeddings(&mut config.app)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.app.embeddings.host) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before processing files.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save settings?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Settings saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.app_config_path().display()).cyan()
        );
    } else {
        eprintln!("Settings not saved.");
    }

    Ok(())
}

/// Write default configuration files, keeping existing ones unless `force` is set
#[inline]
pub fn init_config(base_dir: &Path, force: bool) -> Result<Config> {
    let config = Config::with_base_dir(base_dir);

    if !force && (config.app_config_path().exists() || config.prompt_config_path().exists()) {
        eprintln!(
            "{}",
            style("Configuration files already exist; leaving them untouched.").yellow()
        );
        return Config::load(base_dir);
    }

    config.save().context("Failed to write default configuration")?;
    config.ensure_directories()?;

    eprintln!("{}", style("✓ Default configuration written").green());
    eprintln!("  {}", style(config.app_config_path().display()).cyan());
    eprintln!("  {}", style(config.prompt_config_path().display()).cyan());

    Ok(config)
}

#[inline]
pub fn show_config(config: &Config) {
    let app = &config.app;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Language Model:").bold().yellow());
    eprintln!("  Provider: {}", style(&app.llm.provider).cyan());
    eprintln!("  Model: {}", style(&app.llm.model).cyan());

    eprintln!();
    eprintln!("{}", style("Providers:").bold().yellow());
    for (name, provider) in &app.providers {
        let endpoint = provider
            .base_url
            .as_deref()
            .or(provider.host.as_deref())
            .unwrap_or("-");
        eprintln!("  {} ({})", style(name).bold(), style(endpoint).dim());
        for model in &provider.models {
            eprintln!("    - {model}");
        }
        if let Some(key_env) = &provider.api_key_env {
            let present = std::env::var(key_env).is_ok_and(|v| !v.trim().is_empty());
            let marker = if present {
                style("set").green()
            } else {
                style("missing").red()
            };
            eprintln!("    API key: ${key_env} ({marker})");
        }
    }

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Threshold: {}", style(app.vectordb.threshold).cyan());
    eprintln!("  Results: {}", style(app.vectordb.n_results).cyan());

    eprintln!();
    eprintln!("{}", style("Memory:").bold().yellow());
    let memory = &app.memory_strategies;
    match memory.strategy {
        MemoryStrategyKind::Trimming => eprintln!(
            "  Strategy: {} (window {})",
            style("trimming").cyan(),
            memory.trimming_window_size
        ),
        MemoryStrategyKind::Summarization => eprintln!(
            "  Strategy: {} (max {} tokens, keep {} recent)",
            style("summarization").cyan(),
            memory.summarization_max_tokens,
            memory.summarization_keep_recent
        ),
    }

    eprintln!();
    eprintln!("{}", style("Chunking & Embeddings:").bold().yellow());
    eprintln!(
        "  Chunk Size: {} (overlap {})",
        style(app.chunking.chunk_size).cyan(),
        app.chunking.chunk_overlap
    );
    eprintln!("  Ollama Host: {}", style(&app.embeddings.host).cyan());
    eprintln!("  Embedding Model: {}", style(&app.embeddings.model).cyan());
    eprintln!("  Batch Size: {}", style(app.embeddings.batch_size).cyan());

    eprintln!();
    eprintln!("Base directory: {}", style(config.base_dir.display()).dim());
    eprintln!("Config file: {}", style(config.app_config_path().display()).dim());
    eprintln!("Prompt file: {}", style(config.prompt_config_path().display()).dim());
}

fn load_existing_config(base_dir: &Path) -> Result<Config> {
    let config = Config::load(base_dir)?;
    if config.app_config_path().exists() {
        eprintln!("{}", style("Found existing configuration.").green());
    } else {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
    }
    Ok(config)
}

/// Provider names paired with the index of the current one
fn provider_choices(app: &AppConfig) -> (Vec<String>, usize) {
    let names: Vec<String> = app.providers.keys().cloned().collect();
    let current = names
        .iter()
        .position(|name| *name == app.llm.provider)
        .unwrap_or(0);
    (names, current)
}

fn select_llm(app: &mut AppConfig) -> Result<()> {
    let (providers, current) = provider_choices(app);
    if providers.is_empty() {
        anyhow::bail!("No LLM providers are configured");
    }

    let provider_index = Select::new()
        .with_prompt("LLM provider")
        .default(current)
        .items(&providers)
        .interact()?;
    let provider = &providers[provider_index];

    let models = app.provider(provider)?.models.clone();
    let model = if models.is_empty() {
        Input::new()
            .with_prompt("Model name")
            .default(app.llm.model.clone())
            .interact_text()?
    } else {
        let default_index = models
            .iter()
            .position(|m| *m == app.llm.model)
            .unwrap_or(0);
        let model_index = Select::new()
            .with_prompt("Model")
            .default(default_index)
            .items(&models)
            .interact()?;
        models[model_index].clone()
    };

    app.select_llm(provider, &model)?;
    Ok(())
}

fn configure_retrieval(app: &mut AppConfig) -> Result<()> {
    let threshold: f32 = Input::new()
        .with_prompt("Similarity threshold (0-1)")
        .default(app.vectordb.threshold)
        .validate_with(|input: &f32| -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(input) {
                Ok(())
            } else {
                Err(ConfigError::InvalidThreshold(*input))
            }
        })
        .interact_text()?;

    let n_results: usize = Input::new()
        .with_prompt("Number of chunks to retrieve")
        .default(app.vectordb.n_results)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Must retrieve at least one chunk")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let strategies = ["trimming", "summarization"];
    let default_index = match app.memory_strategies.strategy {
        MemoryStrategyKind::Trimming => 0,
        MemoryStrategyKind::Summarization => 1,
    };
    let strategy_index = Select::new()
        .with_prompt("Conversation memory strategy")
        .default(default_index)
        .items(&strategies)
        .interact()?;

    app.vectordb.threshold = threshold;
    app.vectordb.n_results = n_results;
    app.memory_strategies.strategy = if strategy_index == 0 {
        MemoryStrategyKind::Trimming
    } else {
        MemoryStrategyKind::Summarization
    };
    app.vectordb.validate()?;

    Ok(())
}

fn configure_embeddings(app: &mut AppConfig) -> Result<()> {
    let host: String = Input::new()
        .with_prompt("Ollama URL")
        .default(app.embeddings.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            url::Url::parse(input).map_err(|_| ConfigError::InvalidUrl(input.clone()))?;
            Ok(())
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(app.embeddings.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(app.embeddings.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    app.embeddings.host = host;
    app.embeddings.model = model;
    app.embeddings.batch_size = batch_size;
    app.embeddings.validate()?;

    Ok(())
}

fn test_ollama_connection(host: &str) -> bool {
    let url = format!("{}/api/version", host.trim_end_matches('/'));

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
