//! Prompt assembly for the completion call.
//!
//! The full conversation is sent verbatim after a single system message.
//! There is no truncation: a long enough conversation will exceed the
//! model's context window and the completion API will reject it.

use parley_types::config::DEFAULT_SYSTEM_PROMPT;
use parley_types::llm::PromptMessage;
use parley_types::message::{Message, MessageRole};

/// Builds the ordered prompt array for one completion call.
#[derive(Debug, Clone)]
pub struct HistoryAssembler {
    system_prompt: String,
}

impl HistoryAssembler {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// System prompt first, then every stored message as `{role, content}`.
    pub fn assemble(&self, conversation: &[Message]) -> Vec<PromptMessage> {
        let mut prompt = Vec::with_capacity(conversation.len() + 1);
        prompt.push(PromptMessage::new(MessageRole::System, &self.system_prompt));
        prompt.extend(
            conversation
                .iter()
                .map(|m| PromptMessage::new(m.role, m.content.clone())),
        );
        prompt
    }
}

impl Default for HistoryAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}
