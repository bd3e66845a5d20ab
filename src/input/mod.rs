pub(crate) mod editing;
pub(crate) mod navigate;
pub(crate) mod popups;

use crate::{
    app::App,
    models::{InputMode, Screen},
};
use crossterm::event::{Event, KeyEventKind};

pub fn handle_event(app: &mut App, event: Event) {
    if let Event::Key(key) = event
        && key.kind == KeyEventKind::Press
    {
        if popups::handle_popup_events(app, key) {
            return;
        }
        match (app.screen, app.input_mode) {
            (Screen::Login, _) => navigate::handle_login_screen(app, key),
            (Screen::Tasks, InputMode::Navigate) => navigate::handle_normal_mode(app, key),
            (Screen::Tasks, InputMode::Composing) => editing::handle_composer(app, key),
        }
    }
}
