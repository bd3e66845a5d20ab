use crate::{actions, app::App, config::key_match};
use crossterm::event::{KeyCode, KeyEvent};

pub fn handle_popup_events(app: &mut App, key: KeyEvent) -> bool {
    if app.alert.is_some() {
        handle_alert_popup(app, key);
        return true;
    }
    if app.sign_in_display.is_some() {
        handle_sign_in_popup(app, key);
        return true;
    }
    if app.show_help_popup {
        if key.code == KeyCode::Esc || key_match(&key, &app.config.keybindings.global.help) {
            app.show_help_popup = false;
        }
        return true;
    }
    if app
        .controller
        .as_ref()
        .is_some_and(|controller| controller.pending_delete().is_some())
    {
        handle_delete_task_popup(app, key);
        return true;
    }
    false
}

fn handle_alert_popup(app: &mut App, key: KeyEvent) {
    if key_match(&key, &app.config.keybindings.popup.confirm)
        || key_match(&key, &app.config.keybindings.popup.cancel)
        || key.code == KeyCode::Esc
    {
        app.alert = None;
    }
}

fn handle_sign_in_popup(app: &mut App, key: KeyEvent) {
    if key_match(&key, &app.config.keybindings.popup.confirm) {
        actions::reopen_sign_in_url(app);
        return;
    }

    if key_match(&key, &app.config.keybindings.popup.cancel) || key.code == KeyCode::Esc {
        actions::cancel_sign_in(app);
    }
}

fn handle_delete_task_popup(app: &mut App, key: KeyEvent) {
    if key_match(&key, &app.config.keybindings.popup.confirm) {
        actions::confirm_delete(app);
    } else if key_match(&key, &app.config.keybindings.popup.cancel) || key.code == KeyCode::Esc {
        actions::cancel_delete(app);
    }
}
