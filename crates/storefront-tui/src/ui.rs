use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use storefront_core::{ChatRole, ChatState, CONVERSATION_STARTERS};

use crate::app::App;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let header = Paragraph::new(header_line(app)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn header_line(app: &App) -> Line<'static> {
    let mut spans = vec![Span::styled(
        " Storefront Assistant ",
        Style::default().fg(Color::Cyan).bold(),
    )];

    // Signed-in and guest sessions get different badges
    if app.session.is_authenticated() {
        spans.push(Span::styled(" signed in ", Style::default().fg(Color::Black).bg(Color::Green)));
    } else {
        spans.push(Span::styled(" guest ", Style::default().fg(Color::White).bg(Color::Red)));
        spans.push(Span::styled(
            format!(" sign in at {}", app.auth_url),
            Style::default().fg(Color::White),
        ));
    }

    spans.push(Span::raw(" "));
    spans.push(Span::styled(
        format!("v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::DarkGray),
    ));
    Line::from(spans)
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![("Enter", "send"), ("PgUp/PgDn", "scroll"), ("^N", "new chat")];
    if app.view.show_starters() {
        hints.insert(1, ("1-5", "starter"));
    }
    if app.session.is_authenticated() {
        hints.push(("^L", "sign out"));
    }
    hints.push(("Esc", "quit"));

    let mut spans = Vec::new();
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }
    if let Some(status) = &app.status {
        spans.push(Span::styled(format!("  {}", status), Style::default().fg(Color::Yellow)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);
    if app.follow_tail {
        app.scroll_to_bottom();
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Chat: {} ", app.chat.endpoint()));

    let chat = Paragraph::new(chat_text(&app.view, app.animation_frame))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn chat_text(view: &ChatState, animation_frame: u8) -> Text<'static> {
    if view.show_starters() {
        let mut lines = vec![
            Line::from(Span::styled(
                "How can I help you?",
                Style::default().fg(Color::DarkGray),
            )),
            Line::default(),
        ];
        for (i, starter) in CONVERSATION_STARTERS.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled(format!(" {} ", i + 1), Style::default().fg(Color::Black).bg(Color::Cyan)),
                Span::raw(format!(" {}", starter)),
            ]));
        }
        return Text::from(lines);
    }

    let mut lines: Vec<Line> = Vec::new();
    let messages = view.log.messages();

    for (idx, msg) in messages.iter().enumerate() {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled(
                    "Assistant:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
            }
        }

        let pending = view.is_loading() && idx + 1 == messages.len();
        if pending && msg.content.is_empty() {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat(animation_frame as usize + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        } else {
            for line in msg.content.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        lines.push(Line::default());
    }

    Text::from(lines)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let loading = app.is_loading();
    let (border_color, title) = if loading {
        (Color::DarkGray, " Waiting for reply... ")
    } else {
        (Color::Yellow, " Ask me a question... ")
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 {
        0
    } else if app.cursor >= inner_width {
        app.cursor - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input_style = if loading {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };
    frame.render_widget(Paragraph::new(visible_text).style(input_style).block(block), area);

    if !loading {
        let cursor_x = (app.cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}
