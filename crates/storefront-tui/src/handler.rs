use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::App;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Chat | AppEvent::Resize => app.sync(),
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any state
    match key.code {
        KeyCode::Char('c') if ctrl => return app.quit(),
        KeyCode::Esc => return app.quit(),
        KeyCode::Char('n') if ctrl => return app.new_conversation(),
        KeyCode::Char('l') if ctrl => return app.logout(),
        KeyCode::PageUp => return app.scroll_up(app.chat_height.max(2) / 2),
        KeyCode::PageDown => return app.scroll_down(app.chat_height.max(2) / 2),
        KeyCode::Up => return app.scroll_up(1),
        KeyCode::Down => return app.scroll_down(1),
        _ => {}
    }

    // The input box is disabled while a reply is streaming
    if app.is_loading() {
        return;
    }

    match key.code {
        KeyCode::Enter => app.submit_input(),
        KeyCode::Char(c) if c.is_ascii_digit() && app.input.is_empty() && app.view.show_starters() => {
            let n = c.to_digit(10).unwrap_or(0) as usize;
            if !app.submit_starter(n) {
                app.insert_char(c);
            }
        }
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(3),
        MouseEventKind::ScrollDown => app.scroll_down(3),
        _ => {}
    }
}
