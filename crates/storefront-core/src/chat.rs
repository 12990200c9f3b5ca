use std::future::Future;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ChatError;
use crate::framing::{parse_frame, FrameDecoder, FramingMode};
use crate::state::{ChatMessage, ChatPhase, ChatState};

/// Shown in place of the reply when an exchange fails for any reason.
pub const ERROR_MESSAGE: &str = "Sorry, an error has occurred.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyInput,
    InFlight,
}

/// What a call to [`StreamingChatClient::send`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Completed,
    Failed,
    Ignored(IgnoreReason),
}

/// Client for the storefront chat service.
///
/// Owns one conversation. Clones share it, so a UI can keep one handle for
/// reading and move another into the task that drives a send.
#[derive(Clone)]
pub struct StreamingChatClient {
    client: Client,
    endpoint: String,
    framing: FramingMode,
    state: Arc<watch::Sender<ChatState>>,
}

impl StreamingChatClient {
    pub fn new(base_url: &str) -> Self {
        let (state, _) = watch::channel(ChatState::default());
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat", base_url.trim_end_matches('/')),
            framing: FramingMode::default(),
            state: Arc::new(state),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.chat_base_url).with_framing(config.framing)
    }

    pub fn with_framing(mut self, framing: FramingMode) -> Self {
        self.framing = framing;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn framing(&self) -> FramingMode {
        self.framing
    }

    /// Receiver notified after every appended frame and phase change
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ChatState {
        ChatState::clone(&self.state.borrow())
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.borrow().log.messages().to_vec()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Start a new conversation. Refused while a reply is streaming.
    pub fn reset(&self) -> bool {
        self.state.send_if_modified(|chat| {
            if chat.is_loading() || chat.log.is_empty() {
                return false;
            }
            chat.log.clear();
            true
        })
    }

    /// Send `text` and stream the reply into the conversation.
    ///
    /// Resolves once the reply stream ends or fails. Blank input, or input
    /// arriving while another reply is in flight, is ignored without
    /// touching the conversation.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let client = &self.client;
        let endpoint = self.endpoint.as_str();
        self.run(text, move || async move {
            let response = client
                .post(endpoint)
                .json(&ChatRequest { message: text })
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(ChatError::Status(response.status()));
            }

            Ok::<_, ChatError>(response.bytes_stream())
        })
        .await
    }

    async fn run<F, Fut, S, B, E>(&self, text: &str, open: F) -> SendOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, ChatError>>,
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if text.trim().is_empty() {
            debug!("ignoring blank chat input");
            return SendOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        let accepted = self.state.send_if_modified(|chat| {
            if chat.is_loading() {
                return false;
            }
            chat.log.begin_exchange(text);
            chat.phase = ChatPhase::Sending;
            true
        });
        if !accepted {
            debug!("ignoring chat input while a reply is in flight");
            return SendOutcome::Ignored(IgnoreReason::InFlight);
        }

        let mut guard = InFlightGuard::new(&self.state);
        debug!(endpoint = %self.endpoint, framing = %self.framing, "chat request dispatched");

        let result = match open().await {
            Ok(body) => self.read_stream(body).await,
            Err(err) => Err(err),
        };
        guard.disarm();

        match result {
            Ok(frames) => {
                info!(frames, "chat reply completed");
                self.state.send_modify(|chat| chat.phase = ChatPhase::Idle);
                SendOutcome::Completed
            }
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "chat reply failed");
                self.state.send_modify(|chat| {
                    chat.log.overwrite_pending(ERROR_MESSAGE);
                    chat.phase = ChatPhase::Idle;
                });
                SendOutcome::Failed
            }
        }
    }

    async fn read_stream<S, B, E>(&self, body: S) -> Result<usize, ChatError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        futures_util::pin_mut!(body);
        let mut decoder = FrameDecoder::new(self.framing);
        let mut frames = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ChatError::StreamRead(e.into()))?;
            self.state.send_if_modified(|chat| {
                if chat.phase == ChatPhase::Sending {
                    chat.phase = ChatPhase::Streaming;
                    true
                } else {
                    false
                }
            });

            for line in decoder.push(chunk.as_ref()) {
                self.apply_record(&line)?;
                frames += 1;
            }
        }

        for line in decoder.finish() {
            self.apply_record(&line)?;
            frames += 1;
        }

        Ok(frames)
    }

    fn apply_record(&self, line: &str) -> Result<(), ChatError> {
        let frame = parse_frame(line)?;
        self.state.send_modify(|chat| {
            chat.log.append_to_pending(frame.text());
        });
        Ok(())
    }
}

/// Returns the client to idle if a send future is dropped mid-flight.
struct InFlightGuard<'a> {
    state: &'a watch::Sender<ChatState>,
    armed: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(state: &'a watch::Sender<ChatState>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!("chat reply abandoned");
            self.state.send_modify(|chat| chat.phase = ChatPhase::Idle);
        }
    }
}
