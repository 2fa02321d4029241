use super::*;
use crate::config::settings::AppConfig;

#[test]
fn default_prompts_validate() {
    let app = AppConfig::default();
    let prompts = PromptConfig::default();
    assert!(prompts.validate(&app.reasoning_strategies).is_ok());
    assert_eq!(
        prompts.rag_assistant_prompt.reasoning_strategy.as_deref(),
        Some("CoT")
    );
}

#[test]
fn list_or_string_fields() {
    let yaml = r#"
rag_assistant_prompt:
  instruction: Answer the question.
  output_constraints:
    - Be brief.
    - Cite sources.
  examples: "Q: hi A: hello"
"#;
    let prompts: PromptConfig = serde_yaml::from_str(yaml).expect("should parse prompt yaml");

    assert_eq!(
        prompts.rag_assistant_prompt.instruction,
        Some(TextOrList::Text("Answer the question.".to_string()))
    );
    assert_eq!(
        prompts.rag_assistant_prompt.output_constraints,
        Some(TextOrList::List(vec![
            "Be brief.".to_string(),
            "Cite sources.".to_string()
        ]))
    );
    // Keys that are absent fall back to the default templates
    assert_eq!(
        prompts.summarization_prompt,
        PromptConfig::default().summarization_prompt
    );
}

#[test]
fn missing_role_is_rejected() {
    let strategies = AppConfig::default().reasoning_strategies;
    let mut prompts = PromptConfig::default();
    prompts.ai_assistant_system_prompt_advanced.role = Some("   ".to_string());

    assert!(matches!(
        prompts.validate(&strategies),
        Err(ConfigError::MissingPromptField { field: "role", .. })
    ));
}

#[test]
fn missing_instruction_is_rejected() {
    let strategies = AppConfig::default().reasoning_strategies;
    let mut prompts = PromptConfig::default();
    prompts.rag_assistant_prompt.instruction = None;

    assert!(matches!(
        prompts.validate(&strategies),
        Err(ConfigError::MissingPromptField {
            prompt: "rag_assistant_prompt",
            field: "instruction"
        })
    ));
}

#[test]
fn unknown_reasoning_strategy_is_rejected() {
    let strategies = AppConfig::default().reasoning_strategies;
    let mut prompts = PromptConfig::default();

    prompts.rag_assistant_prompt.reasoning_strategy = Some("TreeOfThought".to_string());
    assert!(matches!(
        prompts.validate(&strategies),
        Err(ConfigError::UnknownReasoningStrategy(_))
    ));

    prompts.rag_assistant_prompt.reasoning_strategy = Some("None".to_string());
    assert!(prompts.validate(&strategies).is_ok());
}
