pub mod interactive;
pub mod prompts;
pub mod settings;

pub use interactive::{init_config, run_interactive_settings, show_config};
pub use prompts::{PromptConfig, PromptTemplate, TextOrList};
pub use settings::{
    AppConfig, Config, ConfigError, EmbeddingConfig, LlmConfig, MemoryConfig,
    MemoryStrategyKind, ProviderConfig, VectorDbConfig,
};
