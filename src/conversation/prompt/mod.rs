
use std::collections::BTreeMap;

use crate::config::prompts::NO_REASONING_STRATEGY;
use crate::config::{ConfigError, PromptTemplate, TextOrList};

const SECTION_SEPARATOR: &str = "\n\n";
const CLOSING_LINE: &str = "Now perform the task as instructed above.";

/// Render a task prompt. `instruction` is required; `input` is wrapped in content
/// markers and the template's reasoning strategy, if any, is appended from `strategies`.
#[inline]
pub fn build_prompt(
    prompt_name: &'static str,
    template: &PromptTemplate,
    input: &str,
    strategies: &BTreeMap<String, String>,
) -> Result<String, ConfigError> {
    let mut parts = Vec::new();

    if let Some(role) = non_blank(template.role.as_deref()) {
        parts.push(role_line(role));
    }

    let instruction = template
        .instruction
        .as_ref()
        .filter(|instruction| !instruction.is_blank())
        .ok_or(ConfigError::MissingPromptField {
            prompt: prompt_name,
            field: "instruction",
        })?;
    parts.push(section("Your task is as follows:", instruction));

    if let Some(context) = non_blank(template.context.as_deref()) {
        parts.push(format!("Here's some background that may help you:\n{context}"));
    }
    if let Some(constraints) = &template.output_constraints {
        parts.push(section("Ensure your response follows these rules:", constraints));
    }
    if let Some(tone) = &template.style_or_tone {
        parts.push(section(
            "Follow these style and tone guidelines in your response:",
            tone,
        ));
    }
    if let Some(format) = &template.output_format {
        parts.push(section("Structure your response as follows:", format));
    }

    if let Some(examples) = &template.examples {
        parts.push("Here are some examples to guide your response:".to_string());
        match examples {
            TextOrList::Text(text) => parts.push(text.clone()),
            TextOrList::List(items) => parts.extend(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, example)| format!("Example {}:\n{}", i + 1, example)),
            ),
        }
    }

    if let Some(goal) = non_blank(template.goal.as_deref()) {
        parts.push(format!(
            "Your goal is to achieve the following outcome:\n{goal}"
        ));
    }

    let input = input.trim();
    if !input.is_empty() {
        parts.push(format!(
            "Here is the content you need to work with:\n<<<BEGIN CONTENT>>>\n```\n{input}\n```\n<<<END CONTENT>>>"
        ));
    }

    if let Some(key) = template.reasoning_strategy.as_deref() {
        if key != NO_REASONING_STRATEGY {
            let strategy = strategies
                .get(key)
                .ok_or_else(|| ConfigError::UnknownReasoningStrategy(key.to_string()))?;
            parts.push(strategy.trim().to_string());
        }
    }

    parts.push(CLOSING_LINE.to_string());
    Ok(parts.join(SECTION_SEPARATOR))
}

/// Render a system prompt. `role` is required.
#[inline]
pub fn build_system_prompt(
    prompt_name: &'static str,
    template: &PromptTemplate,
    document_content: &str,
) -> Result<String, ConfigError> {
    let role = non_blank(template.role.as_deref()).ok_or(ConfigError::MissingPromptField {
        prompt: prompt_name,
        field: "role",
    })?;
    let mut parts = vec![role_line(role)];

    if let Some(constraints) = &template.output_constraints {
        parts.push(section("Follow these important guidelines:", constraints));
    }
    if let Some(tone) = &template.style_or_tone {
        parts.push(section("Communication style:", tone));
    }
    if let Some(format) = &template.output_format {
        parts.push(section("Response formatting:", format));
    }
    if let Some(goal) = non_blank(template.goal.as_deref()) {
        parts.push(format!("Your primary objective: {goal}"));
    }

    let document_content = document_content.trim();
    if !document_content.is_empty() {
        parts.push(format!(
            "Base your responses on this document content:\n\n=== DOCUMENT CONTENT ===\n{document_content}\n=== END DOCUMENT CONTENT ==="
        ));
    }

    Ok(parts.join(SECTION_SEPARATOR))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn role_line(role: &str) -> String {
    format!("You are {}.", lowercase_first_char(role))
}

fn section(lead_in: &str, value: &TextOrList) -> String {
    match value {
        TextOrList::Text(text) => format!("{lead_in}\n{text}"),
        TextOrList::List(items) => {
            let lines: Vec<String> = items.iter().map(|item| format!("- {item}")).collect();
            format!("{}\n{}", lead_in, lines.join("\n"))
        }
    }
}

fn lowercase_first_char(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
