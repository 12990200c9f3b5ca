pub mod chat;
pub mod config;
pub mod error;
pub mod framing;
pub mod state;
pub mod token;

// Re-export main types for convenience
pub use chat::{IgnoreReason, SendOutcome, StreamingChatClient, ERROR_MESSAGE};
pub use config::Config;
pub use error::ChatError;
pub use framing::{FrameDecoder, FramingMode, StreamFrame};
pub use state::{ChatMessage, ChatPhase, ChatRole, ChatState, ConversationLog, CONVERSATION_STARTERS};
pub use token::{AuthSession, FileTokenStore, MemoryTokenStore, TokenStore};
