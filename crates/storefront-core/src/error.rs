use thiserror::Error;

/// Why a chat exchange failed.
///
/// These never reach the UI as values: every variant ends up as the same
/// apology text in the pending message. They exist so the failure can be
/// logged with its cause.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request could not be dispatched: {0}")]
    RequestDispatch(#[from] reqwest::Error),

    #[error("chat service responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("chat stream read failed: {0}")]
    StreamRead(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("malformed stream frame {line:?}: {source}")]
    FrameParse {
        line: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ChatError {
    /// Short label for structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::RequestDispatch(_) => "request_dispatch",
            ChatError::Status(_) => "status",
            ChatError::StreamRead(_) => "stream_read",
            ChatError::FrameParse { .. } => "frame_parse",
        }
    }
}
