//! Completion request and response types

use crate::Message;
use serde::{Deserialize, Serialize};

/// Output length and sampling settings
///
/// Serializes to the camelCase shape Gemini expects in `generationConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: usize,
    /// Provider default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 2048,
            temperature: None,
        }
    }
}

/// One model call: the conversation so far plus generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,

    /// Turns in order; the last one is normally from the user
    pub messages: Vec<Message>,

    /// System instruction sent alongside the turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub generation: GenerationConfig,
}

impl CompletionRequest {
    pub fn builder(model: impl Into<String>) -> CompletionRequestBuilder {
        CompletionRequestBuilder::new(model)
    }

    /// Text of the most recent user turn
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::Role::User)
            .and_then(Message::text)
    }
}

/// The model's reply to a [`CompletionRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Reply text, `None` when the model produced none
    pub fn text(&self) -> Option<&str> {
        self.message.text()
    }
}

/// Why generation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model finished its turn
    EndTurn,

    /// Output was cut at `max_output_tokens`
    MaxTokens,

    /// Output withheld by the provider's safety filters
    Safety,

    /// Anything the provider reports that has no mapping above
    Other,
}

impl StopReason {
    pub fn is_truncated(self) -> bool {
        self == StopReason::MaxTokens
    }
}

/// Prompt and output token counts reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

/// Builder for [`CompletionRequest`]
#[derive(Debug)]
pub struct CompletionRequestBuilder {
    request: CompletionRequest,
}

impl CompletionRequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            request: CompletionRequest {
                model: model.into(),
                messages: Vec::new(),
                system: None,
                generation: GenerationConfig::default(),
            },
        }
    }

    /// Replace the conversation
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.request.messages = messages;
        self
    }

    pub fn add_message(mut self, message: Message) -> Self {
        self.request.messages.push(message);
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.request.system = Some(system.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.request.generation.max_output_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.request.generation.temperature = Some(temperature);
        self
    }

    pub fn generation(mut self, generation: GenerationConfig) -> Self {
        self.request.generation = generation;
        self
    }

    pub fn build(self) -> CompletionRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_generation() {
        let request = CompletionRequest::builder("gemini-1.5-flash-latest")
            .add_message(Message::user("Hello"))
            .system("You are a financial analyst")
            .max_tokens(4096)
            .temperature(0.4)
            .build();

        assert_eq!(request.model, "gemini-1.5-flash-latest");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(
            request.generation,
            GenerationConfig {
                max_output_tokens: 4096,
                temperature: Some(0.4),
            }
        );
    }

    #[test]
    fn test_generation_config_wire_shape() {
        let json = serde_json::to_value(GenerationConfig::default()).unwrap();
        assert_eq!(json, serde_json::json!({"maxOutputTokens": 2048}));
    }

    #[test]
    fn test_last_user_text_skips_assistant_turns() {
        let request = CompletionRequest::builder("m")
            .messages(vec![
                Message::user("first"),
                Message::assistant("reply"),
                Message::user("second"),
                Message::assistant("pending"),
            ])
            .build();
        assert_eq!(request.last_user_text(), Some("second"));
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
        assert!(StopReason::MaxTokens.is_truncated());
        assert!(!StopReason::EndTurn.is_truncated());
    }
}
