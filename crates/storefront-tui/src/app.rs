use storefront_core::{
    AuthSession, ChatState, Config, SendOutcome, StreamingChatClient, TokenStore,
    CONVERSATION_STARTERS,
};
use tokio::task::JoinHandle;
use tracing::warn;

/// Token storage chosen at startup
pub type Session = AuthSession<Box<dyn TokenStore>>;

/// Convert a character index to a byte index for UTF-8 safe string operations
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,

    // Conversation
    pub chat: StreamingChatClient,
    pub view: ChatState, // last snapshot, refreshed on every chat event
    pub send_task: Option<JoinHandle<SendOutcome>>,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Chat scroll
    pub scroll: u16,
    pub follow_tail: bool,
    pub chat_height: u16, // inner height of the chat area, set during render
    pub chat_width: u16,  // inner width of the chat area, set during render

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub session: Session,
    pub auth_url: String, // where guests go to sign in
    pub status: Option<String>,
}

impl App {
    pub fn new(config: &Config, session: Session) -> Self {
        let chat = StreamingChatClient::from_config(config);
        let view = chat.snapshot();
        Self {
            should_quit: false,
            chat,
            view,
            send_task: None,
            input: String::new(),
            cursor: 0,
            scroll: 0,
            follow_tail: true,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            session,
            auth_url: config.auth_base_url.clone(),
            status: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.view.is_loading()
    }

    /// Pull the latest conversation snapshot from the client.
    pub fn sync(&mut self) {
        self.view = self.chat.snapshot();
        if self.send_task.as_ref().is_some_and(|task| task.is_finished()) {
            self.send_task = None;
        }
        if self.follow_tail {
            self.scroll_to_bottom();
        }
    }

    /// Hand `text` to the chat client on a background task.
    pub fn submit(&mut self, text: String) -> bool {
        if text.trim().is_empty() || self.chat.is_loading() {
            return false;
        }
        let chat = self.chat.clone();
        self.send_task = Some(tokio::spawn(async move { chat.send(&text).await }));
        self.follow_tail = true;
        self.status = None;
        true
    }

    /// Send whatever is in the input box and clear it.
    pub fn submit_input(&mut self) {
        if self.is_loading() {
            return;
        }
        let text = std::mem::take(&mut self.input);
        self.cursor = 0;
        self.submit(text);
    }

    /// Send starter `n` (1-based). Only offered on an empty conversation.
    pub fn submit_starter(&mut self, n: usize) -> bool {
        if !self.view.show_starters() {
            return false;
        }
        match n.checked_sub(1).and_then(|i| CONVERSATION_STARTERS.get(i)) {
            Some(starter) => self.submit(starter.to_string()),
            None => false,
        }
    }

    pub fn new_conversation(&mut self) {
        if self.chat.reset() {
            self.scroll = 0;
            self.follow_tail = true;
            self.sync();
        }
    }

    /// Adopt a token issued by the auth service.
    pub fn sign_in(&mut self, token: &str) {
        match self.session.login(token) {
            Ok(true) => self.status = Some("Signed in".to_string()),
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "login failed");
                self.status = Some(format!("Login failed: {}", e));
            }
        }
    }

    pub fn logout(&mut self) {
        match self.session.logout() {
            Ok(()) => self.status = Some("Signed out".to_string()),
            Err(e) => {
                warn!(error = %e, "logout failed");
                self.status = Some(format!("Logout failed: {}", e));
            }
        }
    }

    /// Abandon any in-flight reply before exiting.
    pub fn quit(&mut self) {
        if let Some(task) = self.send_task.take() {
            task.abort();
        }
        self.should_quit = true;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    // Scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.scroll = self.scroll.saturating_add(lines).min(max);
        self.follow_tail = self.scroll >= max;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
    }

    fn max_scroll(&self) -> u16 {
        self.total_chat_lines().saturating_sub(self.chat_height)
    }

    /// Rendered line count of the conversation at the current width
    pub fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;
        for msg in self.view.log.messages() {
            total_lines = total_lines.saturating_add(1); // Role line ("You:" or "Assistant:")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                total_lines = total_lines.saturating_add(char_count / wrap_width + 1);
            }
            total_lines = total_lines.saturating_add(1); // Spacer
        }
        // Paragraph scroll offsets are u16
        u16::try_from(total_lines).unwrap_or(u16::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::{ChatMessage, MemoryTokenStore};

    fn test_app() -> App {
        let mut config = Config::new();
        // Nothing listens here; sends fail fast with a refused connection
        config.chat_base_url = "http://127.0.0.1:9".to_string();
        let session = AuthSession::init(Box::new(MemoryTokenStore::with_token("t")) as Box<dyn TokenStore>)
            .unwrap();
        App::new(&config, session)
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 0), 0);
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("héllo", 99), 6);
    }

    #[test]
    fn test_input_editing_is_utf8_safe() {
        let mut app = test_app();
        for c in "zażółć".chars() {
            app.insert_char(c);
        }
        app.cursor_left();
        app.backspace();
        assert_eq!(app.input, "zażóć");
        app.cursor_home();
        app.delete();
        assert_eq!(app.input, "ażóć");
        app.cursor_end();
        assert_eq!(app.cursor, 4);
    }

    #[tokio::test]
    async fn test_blank_input_is_not_submitted() {
        let mut app = test_app();
        app.input = "   ".to_string();
        app.submit_input();
        assert!(app.send_task.is_none());
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_starter_submission_runs_exchange() {
        let mut app = test_app();
        assert!(!app.submit_starter(0));
        assert!(!app.submit_starter(6));
        assert!(app.submit_starter(1));

        let outcome = app.send_task.take().unwrap().await.unwrap();
        assert_eq!(outcome, SendOutcome::Failed);

        app.sync();
        assert_eq!(
            app.view.log.messages()[0],
            ChatMessage::user(CONVERSATION_STARTERS[0])
        );
        assert!(!app.view.show_starters());
        assert!(!app.submit_starter(2));
    }

    #[tokio::test]
    async fn test_new_conversation_and_logout() {
        let mut app = test_app();
        app.input = "Hi".to_string();
        app.submit_input();
        app.send_task.take().unwrap().await.unwrap();

        app.new_conversation();
        assert!(app.view.log.is_empty());

        assert!(app.session.is_authenticated());
        app.logout();
        assert!(!app.session.is_authenticated());
        assert_eq!(app.status.as_deref(), Some("Signed out"));
    }

    #[test]
    fn test_sign_in_persists_token() {
        let mut app = test_app();
        app.logout();
        assert!(!app.session.is_authenticated());

        app.sign_in("  ");
        assert!(!app.session.is_authenticated());
        assert_eq!(app.status.as_deref(), Some("Signed out"));

        app.sign_in("jwt.token.value");
        assert_eq!(app.session.token(), Some("jwt.token.value"));
        assert_eq!(app.status.as_deref(), Some("Signed in"));
    }

    #[test]
    fn test_line_count_wraps_long_content() {
        let mut app = test_app();
        app.chat_width = 10;
        app.view.log = vec![
            ChatMessage::user("short"),
            ChatMessage::assistant("x".repeat(25)),
        ]
        .into();
        // role + 1 line + spacer, role + 3 wrapped lines + spacer
        assert_eq!(app.total_chat_lines(), 3 + 5);

        app.chat_height = 4;
        app.scroll_to_bottom();
        assert_eq!(app.scroll, 4);
        app.scroll_up(10);
        assert_eq!(app.scroll, 0);
        assert!(!app.follow_tail);
        app.scroll_down(100);
        assert!(app.follow_tail);
    }

    #[test]
    fn test_line_count_saturates_for_huge_reply() {
        let mut app = test_app();
        app.chat_width = 10;
        app.chat_height = 20;
        app.view.log = vec![
            ChatMessage::user("Hello"),
            ChatMessage::assistant("line\n".repeat(70_000)),
        ]
        .into();
        assert_eq!(app.total_chat_lines(), u16::MAX);

        app.view.log = vec![ChatMessage::assistant("x".repeat(10 * 70_000))].into();
        assert_eq!(app.total_chat_lines(), u16::MAX);

        app.scroll_to_bottom();
        assert_eq!(app.scroll, u16::MAX - 20);
        app.scroll_down(100);
        assert_eq!(app.scroll, u16::MAX - 20);
        assert!(app.follow_tail);
    }
}
