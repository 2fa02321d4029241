use clap::{Parser, Subcommand};
use std::path::PathBuf;

use notebook_rag::Result;
use notebook_rag::chat::run_chat;
use notebook_rag::commands::{
    AskOptions, ask_question, create_notebook, delete_notebook, list_files, list_models,
    list_notebooks, process_notebook, show_status, upload_files,
};
use notebook_rag::config::{Config, init_config, run_interactive_settings, show_config};
use notebook_rag::notebooks::Notebooks;

#[derive(Parser)]
#[command(name = "notebook-rag")]
#[command(about = "Chat with your documents, organized into notebooks")]
#[command(version)]
struct Cli {
    /// Directory holding configuration, databases and uploads
    #[arg(long, global = true, env = "NOTEBOOK_RAG_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or initialize the configuration files
    Config {
        /// Show current configuration
        #[arg(long, conflicts_with = "init")]
        show: bool,
        /// Write default configuration files
        #[arg(long)]
        init: bool,
        /// Overwrite existing files with --init
        #[arg(long, requires = "init")]
        force: bool,
    },
    /// Choose the LLM provider and model interactively
    Settings,
    /// List available language models
    Models,
    /// Create a new notebook
    Create {
        /// Notebook name (at least 3 characters)
        name: String,
    },
    /// List all notebooks
    List,
    /// Delete a notebook with its documents and embeddings
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Upload documents (PDF, TXT, MD) into a notebook
    Upload {
        notebook: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List the files of a notebook
    Files { notebook: String },
    /// Extract, chunk and embed the notebook's pending files
    Process { notebook: String },
    /// Ask a single question about a notebook
    Ask {
        notebook: String,
        question: String,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Number of chunks to retrieve
        #[arg(long)]
        n_results: Option<usize>,
        /// Minimum similarity between 0 and 1
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Start an interactive chat with a notebook
    Chat {
        notebook: String,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Show storage and model status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = match cli.home {
        Some(dir) => dir,
        None => Config::default_base_dir()?,
    };

    match cli.command {
        Commands::Config { show, init, force } => {
            if init {
                init_config(&base_dir, force)?;
            } else {
                let config = Config::load(&base_dir)?;
                if !show {
                    eprintln!("Configuration directory: {}", config.config_dir().display());
                    eprintln!();
                }
                show_config(&config);
            }
        }
        Commands::Settings => run_interactive_settings(&base_dir)?,
        Commands::Models => {
            let config = load_config(&base_dir)?;
            list_models(&config);
        }
        command => {
            let config = load_config(&base_dir)?;
            let service = Notebooks::open(config).await?.with_progress(true);
            run_notebook_command(&service, command).await?;
        }
    }

    Ok(())
}

fn load_config(base_dir: &std::path::Path) -> Result<Config> {
    let config = Config::load(base_dir)?;
    config.load_env()?;
    Ok(config)
}

async fn run_notebook_command(service: &Notebooks, command: Commands) -> Result<()> {
    match command {
        Commands::Create { name } => create_notebook(service, &name).await,
        Commands::List => list_notebooks(service).await,
        Commands::Delete { name, yes } => delete_notebook(service, &name, yes).await,
        Commands::Upload { notebook, files } => upload_files(service, &notebook, &files).await,
        Commands::Files { notebook } => list_files(service, &notebook).await,
        Commands::Process { notebook } => process_notebook(service, &notebook).await,
        Commands::Ask {
            notebook,
            question,
            provider,
            model,
            n_results,
            threshold,
        } => {
            let options = AskOptions {
                provider,
                model,
                n_results,
                threshold,
            };
            ask_question(service, &notebook, &question, &options).await
        }
        Commands::Chat {
            notebook,
            provider,
            model,
        } => run_chat(service, &notebook, provider.as_deref(), model.as_deref()).await,
        Commands::Status => show_status(service).await,
        Commands::Config { .. } | Commands::Settings | Commands::Models => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["notebook-rag", "list"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::List));
        }
    }

    #[test]
    fn home_override() {
        let cli = Cli::try_parse_from(["notebook-rag", "status", "--home", "/tmp/nb"])
            .expect("should parse");
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/nb")));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn upload_requires_files() {
        let cli = Cli::try_parse_from(["notebook-rag", "upload", "Research"]);
        assert!(cli.is_err());

        let cli = Cli::try_parse_from(["notebook-rag", "upload", "Research", "a.pdf", "b.md"])
            .expect("should parse");
        if let Commands::Upload { notebook, files } = cli.command {
            assert_eq!(notebook, "Research");
            assert_eq!(files, vec![PathBuf::from("a.pdf"), PathBuf::from("b.md")]);
        } else {
            panic!("expected upload command");
        }
    }

    #[test]
    fn ask_with_overrides() {
        let cli = Cli::try_parse_from([
            "notebook-rag",
            "ask",
            "Research",
            "What is RAG?",
            "--provider",
            "ollama",
            "--model",
            "llama3.2",
            "--n-results",
            "3",
            "--threshold",
            "0.5",
        ])
        .expect("should parse");

        if let Commands::Ask {
            notebook,
            question,
            provider,
            model,
            n_results,
            threshold,
        } = cli.command
        {
            assert_eq!(notebook, "Research");
            assert_eq!(question, "What is RAG?");
            assert_eq!(provider.as_deref(), Some("ollama"));
            assert_eq!(model.as_deref(), Some("llama3.2"));
            assert_eq!(n_results, Some(3));
            assert_eq!(threshold, Some(0.5));
        } else {
            panic!("expected ask command");
        }
    }

    #[test]
    fn delete_with_yes() {
        let cli = Cli::try_parse_from(["notebook-rag", "delete", "Research", "-y"])
            .expect("should parse");
        assert!(matches!(cli.command, Commands::Delete { yes: true, .. }));
    }

    #[test]
    fn config_flags() {
        let cli = Cli::try_parse_from(["notebook-rag", "config", "--init", "--force"])
            .expect("should parse");
        assert!(matches!(
            cli.command,
            Commands::Config {
                show: false,
                init: true,
                force: true
            }
        ));

        assert!(Cli::try_parse_from(["notebook-rag", "config", "--force"]).is_err());
        assert!(Cli::try_parse_from(["notebook-rag", "config", "--show", "--init"]).is_err());
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["notebook-rag", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["notebook-rag", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
