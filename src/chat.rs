use console::style;
use dialoguer::Input;
use tracing::{debug, error};

use crate::Result;
use crate::conversation::{RetrievalOptions, Turn};
use crate::database::lancedb::SearchResult;
use crate::llm::{LlmSelection, create_provider};
use crate::notebooks::Notebooks;

/// One line of chat input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Question(String),
    Clear,
    Sources,
    Help,
    Exit,
    Empty,
    Unknown(String),
}

impl ChatInput {
    #[inline]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if !line.starts_with('/') {
            return Self::Question(line.to_string());
        }

        match line.to_lowercase().as_str() {
            "/clear" => Self::Clear,
            "/sources" => Self::Sources,
            "/help" => Self::Help,
            "/exit" | "/quit" => Self::Exit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// Interactive chat with one notebook. History lives only for the session.
#[inline]
pub async fn run_chat(
    service: &Notebooks,
    notebook: &str,
    provider: Option<&str>,
    model: Option<&str>,
) -> Result<()> {
    let notebook = service.get(notebook).await?;
    let app = &service.config().app;
    let selection = LlmSelection::resolve(app, provider, model)?;
    let provider = create_provider(app, &selection.provider)?;
    let manager = service.conversation(
        provider.as_ref(),
        &selection.model,
        RetrievalOptions::from_config(&app.vectordb),
    );

    eprintln!(
        "{} {}",
        style("💬 Chatting with").bold().cyan(),
        style(&notebook.name).bold()
    );
    eprintln!(
        "Using {} via {}. Type /help for commands.",
        style(&selection.model).cyan(),
        selection.provider
    );
    eprintln!();

    let mut history: Vec<Turn> = Vec::new();
    let mut last_sources: Vec<SearchResult> = Vec::new();

    loop {
        let line = match Input::<String>::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(e) => {
                debug!("Input closed: {}", e);
                break;
            }
        };

        match ChatInput::parse(&line) {
            ChatInput::Empty => {}
            ChatInput::Exit => break,
            ChatInput::Help => print_help(),
            ChatInput::Clear => {
                history.clear();
                last_sources.clear();
                eprintln!("{}", style("History cleared.").dim());
            }
            ChatInput::Sources => print_sources(&last_sources),
            ChatInput::Unknown(command) => {
                eprintln!(
                    "{} Unknown command {}; type /help",
                    style("⚠").yellow(),
                    command
                );
            }
            ChatInput::Question(question) => {
                match manager.respond(&notebook, &question, &history).await {
                    Ok(answer) => {
                        println!();
                        println!("{} {}", style("Assistant:").bold().green(), answer.text);
                        println!();
                        history = answer.history;
                        last_sources = answer.sources;
                    }
                    Err(e) => {
                        error!("Chat request failed: {}", e);
                        eprintln!("{} {}", style("Error:").red().bold(), e);
                    }
                }
            }
        }
    }

    eprintln!("Goodbye!");
    Ok(())
}

fn print_help() {
    eprintln!("  /sources  show the chunks behind the last answer");
    eprintln!("  /clear    forget the conversation so far");
    eprintln!("  /exit     leave the chat");
}

fn print_sources(sources: &[SearchResult]) {
    if sources.is_empty() {
        eprintln!("{}", style("No sources for the last answer.").dim());
        return;
    }

    for (i, source) in sources.iter().enumerate() {
        let metadata = &source.chunk_metadata;
        eprintln!(
            "[{}] {} (chunk {}, similarity {:.2})",
            i + 1,
            style(&metadata.source).bold(),
            metadata.chunk_index,
            source.similarity_score
        );
        eprintln!("    {}", preview(&metadata.content, 160));
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}
