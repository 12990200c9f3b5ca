//! UI-agnostic conversation state
//!
//! This module contains the data structures a chat front end renders. They
//! don't depend on any specific UI framework or on the HTTP transport.

use serde::{Deserialize, Serialize};

/// Prompts offered while a conversation is still empty.
pub const CONVERSATION_STARTERS: [&str; 5] = [
    "What t-shirts sizes are available?",
    "Tell me about new products.",
    "What are your payment options?",
    "Can I return my order?",
    "What are the delivery costs?",
];

/// A chat message in the storefront conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered message history of one conversation.
///
/// Only the tail can change, and only while it is the pending assistant
/// reply of an in-flight send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationLog {
    messages: Vec<ChatMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Append the user's turn followed by an empty assistant placeholder.
    pub fn begin_exchange(&mut self, text: &str) {
        self.messages.push(ChatMessage::user(text));
        self.messages.push(ChatMessage::assistant(String::new()));
    }

    /// Append streamed text to the pending reply. Returns false when the
    /// tail is not an assistant message.
    pub fn append_to_pending(&mut self, chunk: &str) -> bool {
        match self.messages.last_mut() {
            Some(msg) if msg.role == ChatRole::Assistant => {
                msg.content.push_str(chunk);
                true
            }
            _ => false,
        }
    }

    /// Replace the pending reply's content outright.
    pub fn overwrite_pending(&mut self, content: &str) -> bool {
        match self.messages.last_mut() {
            Some(msg) if msg.role == ChatRole::Assistant => {
                msg.content = content.to_string();
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl From<Vec<ChatMessage>> for ConversationLog {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}

/// Where the client is in the lifecycle of a single send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    /// Request dispatched, no body bytes yet
    Sending,
    /// At least one body chunk received
    Streaming,
}

impl ChatPhase {
    pub fn is_loading(&self) -> bool {
        !matches!(self, ChatPhase::Idle)
    }
}

/// Snapshot published to the UI after every change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    pub log: ConversationLog,
    pub phase: ChatPhase,
}

impl ChatState {
    pub fn is_loading(&self) -> bool {
        self.phase.is_loading()
    }

    /// Starters are only offered before the first message.
    pub fn show_starters(&self) -> bool {
        self.log.is_empty() && !self.is_loading()
    }
}
