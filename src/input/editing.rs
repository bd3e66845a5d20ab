use crate::{
    actions,
    app::App,
    config::key_match,
    date_input::parse_date_input,
    models::ComposerField,
    tasks::{format_date, today},
};
use chrono::Duration;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tui_textarea::{CursorMove, TextArea};

pub fn handle_composer(app: &mut App, key: KeyEvent) {
    // Plain letters are text here; only a modified quit binding leaves.
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && key_match(&key, &app.config.keybindings.global.quit)
    {
        actions::quit(app);
        return;
    }

    if key_match(&key, &app.config.keybindings.composer.submit) {
        actions::submit_composer(app);
        return;
    }

    if key_match(&key, &app.config.keybindings.composer.cancel) {
        app.stop_composing();
        return;
    }

    if key_match(&key, &app.config.keybindings.composer.switch_field) {
        app.composer_field = app.composer_field.other();
        return;
    }

    match app.composer_field {
        ComposerField::Title => {
            app.title_input.input(key);
        }
        ComposerField::Date => match key.code {
            KeyCode::Up => shift_date(app, 1),
            KeyCode::Down => shift_date(app, -1),
            _ => {
                app.date_input.input(key);
            }
        },
    }
}

/// Steps the date field by whole days, starting from today when it does not parse.
fn shift_date(app: &mut App, days: i64) {
    let base = today();
    let current = parse_date_input(&app.composer_date(), base).unwrap_or(base);
    let next = current
        .checked_add_signed(Duration::days(days))
        .unwrap_or(current);
    let mut date = TextArea::new(vec![format_date(next)]);
    date.set_placeholder_text(crate::app::PLACEHOLDER_DATE);
    date.move_cursor(CursorMove::End);
    app.date_input = date;
}
