//! Prompt templates: per-role string wrappers with a placeholder
//! substitution point, used to adapt free-form chat history to a specific
//! model's expected input framing.
//!
//! Templates ship in model metadata JSON, so the struct deserializes
//! directly from that format. A template is immutable once constructed and
//! is shared read-only across sessions.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::message::{ChatMessage, Role};

/// Substitution point inside a template fragment.
pub const TEMPLATE_PLACEHOLDER: &str = "{{CONTENT}}";

/// Per-role prompt fragments plus the stop sequences that end generation.
///
/// Each fragment, when present, contains [`TEMPLATE_PLACEHOLDER`] exactly
/// once; rendering replaces the placeholder with the message text. An
/// absent (or whitespace-only) fragment passes the text through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplate {
    pub system: Option<String>,
    pub user: Option<String>,
    pub assistant: Option<String>,
    pub stop: Vec<String>,
}

impl PromptTemplate {
    /// Render an ordered conversation history into a single prompt string.
    ///
    /// A system message is only legal at the first position. When the
    /// template has no system fragment, the system text is folded into the
    /// first user message instead of being dropped. When an assistant
    /// fragment exists, its pre-placeholder prefix is appended at the end
    /// to prime the model to continue as the assistant.
    pub fn render(&self, history: &[ChatMessage]) -> Result<String> {
        if history.is_empty() {
            return Ok(String::new());
        }

        let system_frag = fragment(&self.system);
        let user_frag = fragment(&self.user);
        let assistant_frag = fragment(&self.assistant);

        // No fragments configured at all: plain passthrough join.
        if system_frag.is_none() && user_frag.is_none() && assistant_frag.is_none() {
            let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
            return Ok(texts.join(". "));
        }

        let mut prompt = String::new();
        let mut stashed_system = String::new();

        for (i, message) in history.iter().enumerate() {
            match message.role {
                Role::System => {
                    if i > 0 {
                        return Err(ClientError::InvalidConversation(
                            "only the first message can be a system message".to_string(),
                        ));
                    }
                    match system_frag {
                        // No system fragment: hold the text back and fold
                        // it into the first user message.
                        None => stashed_system = message.text.clone(),
                        Some(frag) => {
                            prompt.push_str(&frag.replace(TEMPLATE_PLACEHOLDER, &message.text));
                        }
                    }
                }
                Role::User => {
                    let text = if i == 1 && !stashed_system.trim().is_empty() {
                        format!("{} {}", stashed_system, message.text)
                    } else {
                        message.text.clone()
                    };
                    match user_frag {
                        None => prompt.push_str(&text),
                        Some(frag) => prompt.push_str(&frag.replace(TEMPLATE_PLACEHOLDER, &text)),
                    }
                }
                Role::Assistant => match assistant_frag {
                    None => prompt.push_str(&message.text),
                    Some(frag) => {
                        prompt.push_str(&frag.replace(TEMPLATE_PLACEHOLDER, &message.text));
                    }
                },
            }
        }

        // Generation-priming suffix: open the assistant turn without
        // closing it.
        if let Some(frag) = assistant_frag {
            if let Some(idx) = frag.find(TEMPLATE_PLACEHOLDER) {
                prompt.push_str(&frag[..idx]);
            }
        }

        Ok(prompt)
    }

    /// Whether any stop sequence is configured.
    pub fn has_stop_sequences(&self) -> bool {
        !self.stop.is_empty()
    }
}

/// Treat whitespace-only fragments as absent.
fn fragment(f: &Option<String>) -> Option<&str> {
    f.as_deref().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruct_template() -> PromptTemplate {
        PromptTemplate {
            system: Some("<|system|>{{CONTENT}}<|end|>".to_string()),
            user: Some("<|user|>{{CONTENT}}<|end|>".to_string()),
            assistant: Some("<|assistant|>{{CONTENT}}<|end|>".to_string()),
            stop: vec!["<|end|>".to_string()],
        }
    }

    #[test]
    fn empty_history_renders_empty() {
        let prompt = instruct_template().render(&[]).unwrap();
        assert_eq!(prompt, "");
    }

    #[test]
    fn no_fragments_joins_with_dot_space() {
        let template = PromptTemplate::default();
        let history = [
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
        ];
        assert_eq!(template.render(&history).unwrap(), "be brief. hello. hi");
    }

    #[test]
    fn whitespace_fragments_count_as_absent() {
        let template = PromptTemplate {
            system: Some("   ".to_string()),
            user: Some("".to_string()),
            assistant: None,
            stop: vec![],
        };
        let history = [ChatMessage::user("a"), ChatMessage::assistant("b")];
        assert_eq!(template.render(&history).unwrap(), "a. b");
    }

    #[test]
    fn full_template_renders_in_order_with_priming_suffix() {
        let template = instruct_template();
        let history = [
            ChatMessage::system("S"),
            ChatMessage::user("U"),
            ChatMessage::assistant("A"),
            ChatMessage::user("U2"),
        ];
        let prompt = template.render(&history).unwrap();
        assert_eq!(
            prompt,
            "<|system|>S<|end|><|user|>U<|end|><|assistant|>A<|end|><|user|>U2<|end|><|assistant|>"
        );
        // Rendered system fragment appears exactly once.
        assert_eq!(prompt.matches("<|system|>").count(), 1);
    }

    #[test]
    fn system_message_not_first_is_rejected() {
        let template = instruct_template();
        let history = [ChatMessage::user("U"), ChatMessage::system("S")];
        let err = template.render(&history).unwrap_err();
        assert!(matches!(err, ClientError::InvalidConversation(_)));
    }

    #[test]
    fn second_system_message_is_rejected() {
        let template = instruct_template();
        let history = [
            ChatMessage::system("S1"),
            ChatMessage::system("S2"),
            ChatMessage::user("U"),
        ];
        assert!(template.render(&history).is_err());
    }

    #[test]
    fn missing_system_fragment_folds_into_first_user_message() {
        let template = PromptTemplate {
            system: None,
            user: Some("[u]{{CONTENT}}[/u]".to_string()),
            assistant: None,
            stop: vec![],
        };
        let history = [ChatMessage::system("S"), ChatMessage::user("U")];
        let prompt = template.render(&history).unwrap();
        assert!(prompt.contains("S U"));
        assert_eq!(prompt, "[u]S U[/u]");
    }

    #[test]
    fn stash_only_applies_to_user_at_index_one() {
        let template = PromptTemplate {
            system: None,
            user: Some("[u]{{CONTENT}}[/u]".to_string()),
            assistant: None,
            stop: vec![],
        };
        let history = [
            ChatMessage::system("S"),
            ChatMessage::user("U1"),
            ChatMessage::user("U2"),
        ];
        let prompt = template.render(&history).unwrap();
        assert_eq!(prompt, "[u]S U1[/u][u]U2[/u]");
    }

    #[test]
    fn user_only_scenario() {
        let template = PromptTemplate {
            user: Some("<<{{CONTENT}}>>".to_string()),
            ..Default::default()
        };
        let history = [ChatMessage::user("hi")];
        assert_eq!(template.render(&history).unwrap(), "<<hi>>");
    }

    #[test]
    fn render_is_idempotent() {
        let template = instruct_template();
        let history = [ChatMessage::system("S"), ChatMessage::user("U")];
        let first = template.render(&history).unwrap();
        let second = template.render(&history).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn deserializes_from_model_metadata_json() {
        let json = r#"{
            "system": "<|system|>{{CONTENT}}<|end|>",
            "user": "<|user|>{{CONTENT}}<|end|>",
            "assistant": "<|assistant|>{{CONTENT}}<|end|>",
            "stop": ["<|end|>", "<|user|>"]
        }"#;
        let template: PromptTemplate = serde_json::from_str(json).unwrap();
        assert!(template.has_stop_sequences());
        assert_eq!(template.stop.len(), 2);
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let template: PromptTemplate = serde_json::from_str("{}").unwrap();
        assert_eq!(template, PromptTemplate::default());
        assert!(!template.has_stop_sequences());
    }
}
