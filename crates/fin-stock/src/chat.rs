//! Chat transcript for one analyzed ticker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only transcript anchored on the initial analysis
///
/// The first message is always the assistant's initial analysis. The prompt
/// that produced it is kept separately so follow-ups can resend it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    initial_prompt: Option<String>,
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the transcript with the initial prompt and its analysis
    pub fn start(&mut self, prompt: impl Into<String>, analysis: impl Into<String>) {
        self.initial_prompt = Some(prompt.into());
        self.messages = vec![ChatMessage::new(ChatRole::Assistant, analysis)];
    }

    pub fn is_started(&self) -> bool {
        self.initial_prompt.is_some()
    }

    /// The initial (prompt, analysis) pair
    pub fn anchor(&self) -> Option<(&str, &str)> {
        let prompt = self.initial_prompt.as_deref()?;
        let analysis = self.messages.first()?;
        Some((prompt, analysis.text.as_str()))
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::new(ChatRole::User, text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::new(ChatRole::Assistant, text));
    }

    /// Remove a trailing user message that never got an answer
    pub fn pop_pending_user(&mut self) -> Option<ChatMessage> {
        if self.messages.len() > 1 && self.messages.last()?.role == ChatRole::User {
            self.messages.pop()
        } else {
            None
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `max` turns after the anchor, starting on a user message
    pub fn window(&self, max: usize) -> &[ChatMessage] {
        let turns = self.messages.get(1..).unwrap_or_default();
        let mut start = turns.len().saturating_sub(max);
        while start < turns.len() && turns[start].role != ChatRole::User {
            start += 1;
        }
        &turns[start..]
    }

    pub fn clear(&mut self) {
        self.initial_prompt = None;
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_with_turns(turns: usize) -> ChatHistory {
        let mut history = ChatHistory::new();
        history.start("prompt", "analysis");
        for i in 0..turns {
            history.push_user(format!("q{i}"));
            history.push_assistant(format!("a{i}"));
        }
        history
    }

    #[test]
    fn test_start_anchors_analysis() {
        let history = history_with_turns(0);
        assert_eq!(history.anchor(), Some(("prompt", "analysis")));
        assert_eq!(history.messages()[0].role, ChatRole::Assistant);
        assert!(history.window(20).is_empty());
    }

    #[test]
    fn test_window_starts_on_user() {
        let history = history_with_turns(5);
        let window = history.window(3);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].text, "q4");
        assert_eq!(window[0].role, ChatRole::User);

        assert_eq!(history.window(100).len(), 10);
    }

    #[test]
    fn test_pop_pending_user() {
        let mut history = history_with_turns(1);
        history.push_user("unanswered");
        assert_eq!(history.pop_pending_user().unwrap().text, "unanswered");
        assert!(history.pop_pending_user().is_none());
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_never_pops_anchor() {
        let mut history = ChatHistory::new();
        history.push_user("orphan");
        assert!(history.pop_pending_user().is_none());
    }

    #[test]
    fn test_clear() {
        let mut history = history_with_turns(2);
        history.clear();
        assert!(history.is_empty());
        assert!(!history.is_started());
        assert!(history.anchor().is_none());
    }
}
