#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::settings::ConfigError;

/// Reasoning strategy key that disables the strategy section
pub const NO_REASONING_STRATEGY: &str = "None";

/// Contents of `prompt_config.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PromptConfig {
    pub ai_assistant_system_prompt_advanced: PromptTemplate,
    pub rag_assistant_prompt: PromptTemplate,
    pub summarization_prompt: PromptTemplate,
}

/// A prompt section that may be written as a single string or a list of items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TextOrList {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PromptTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<TextOrList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_constraints: Option<TextOrList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_or_tone: Option<TextOrList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<TextOrList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<TextOrList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_strategy: Option<String>,
}

impl TextOrList {
    #[inline]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::List(items) => items.iter().all(|item| item.trim().is_empty()),
        }
    }
}

impl From<&str> for TextOrList {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<&str>> for TextOrList {
    #[inline]
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            ai_assistant_system_prompt_advanced: PromptTemplate {
                role: Some("A helpful research assistant that answers questions about the user's documents".to_string()),
                output_constraints: Some(
                    vec![
                        "Only answer from the provided document content and conversation.",
                        "If the documents do not contain the answer, say so plainly.",
                        "Never invent citations, figures or quotes.",
                    ]
                    .into(),
                ),
                style_or_tone: Some(
                    vec!["Clear and concise.", "Professional but approachable."].into(),
                ),
                output_format: Some(
                    vec![
                        "Use short paragraphs or bullet points.",
                        "Mention the source document names you relied on.",
                    ]
                    .into(),
                ),
                goal: Some(
                    "Help the user understand and use the content of their notebook.".to_string(),
                ),
                ..Default::default()
            },
            rag_assistant_prompt: PromptTemplate {
                role: Some("An expert assistant answering questions with retrieved document excerpts".to_string()),
                instruction: Some(
                    "Answer the user's question using the relevant documents provided below. \
                     Take the conversation so far into account when it is relevant."
                        .into(),
                ),
                output_constraints: Some(
                    vec![
                        "Base the answer only on the relevant documents.",
                        "If the documents are not sufficient, say what is missing.",
                    ]
                    .into(),
                ),
                style_or_tone: Some(vec!["Direct and factual."].into()),
                goal: Some("A correct, well-grounded answer to the user's question.".to_string()),
                reasoning_strategy: Some("CoT".to_string()),
                ..Default::default()
            },
            summarization_prompt: PromptTemplate {
                role: Some("An assistant that condenses conversations".to_string()),
                instruction: Some(
                    "Summarize the conversation below so it can replace the original messages."
                        .into(),
                ),
                output_constraints: Some(
                    vec![
                        "Keep every fact, name and open question the user raised.",
                        "Do not add information that is not in the conversation.",
                    ]
                    .into(),
                ),
                output_format: Some("A few short paragraphs.".into()),
                reasoning_strategy: Some(NO_REASONING_STRATEGY.to_string()),
                ..Default::default()
            },
        }
    }
}

impl PromptConfig {
    /// Check the required fields of each template and that every referenced reasoning
    /// strategy exists
    #[inline]
    pub fn validate(&self, strategies: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        let system = &self.ai_assistant_system_prompt_advanced;
        if system.role.as_deref().is_none_or(|role| role.trim().is_empty()) {
            return Err(ConfigError::MissingPromptField {
                prompt: "ai_assistant_system_prompt_advanced",
                field: "role",
            });
        }

        for (prompt, template) in [
            ("rag_assistant_prompt", &self.rag_assistant_prompt),
            ("summarization_prompt", &self.summarization_prompt),
        ] {
            if template.instruction.as_ref().is_none_or(TextOrList::is_blank) {
                return Err(ConfigError::MissingPromptField {
                    prompt,
                    field: "instruction",
                });
            }
        }

        for template in [
            system,
            &self.rag_assistant_prompt,
            &self.summarization_prompt,
        ] {
            if let Some(key) = template.reasoning_strategy.as_deref() {
                if key != NO_REASONING_STRATEGY && !strategies.contains_key(key) {
                    return Err(ConfigError::UnknownReasoningStrategy(key.to_string()));
                }
            }
        }

        Ok(())
    }
}
