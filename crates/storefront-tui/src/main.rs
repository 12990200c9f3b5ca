use anyhow::Result;
use storefront_core::{AuthSession, Config, FileTokenStore, TokenStore};
use tracing::info;

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    let _log_guard = logging::init(config.log_dir.as_deref())?;

    let store: Box<dyn TokenStore> = Box::new(FileTokenStore::default_location()?);
    let session = AuthSession::init(store)?;

    let mut app = App::new(&config, session);
    // Token handed over by the auth service's login redirect
    if let Ok(token) = std::env::var("STOREFRONT_TOKEN") {
        app.sign_in(&token);
    }
    info!(
        endpoint = app.chat.endpoint(),
        framing = %config.framing,
        authenticated = app.session.is_authenticated(),
        "starting storefront chat"
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(app.chat.subscribe());

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
