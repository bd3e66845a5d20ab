use crate::{actions, app::App, config::key_match, controller::TaskFilter};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

pub fn handle_login_screen(app: &mut App, key: KeyEvent) {
    if key_match(&key, &app.config.keybindings.global.quit) {
        actions::quit(app);
    } else if key_match(&key, &app.config.keybindings.global.help) {
        app.show_help_popup = true;
    } else if key.code == KeyCode::Enter {
        actions::begin_sign_in(app);
    }
}

pub fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    let list = app.config.keybindings.list.clone();

    if key_match(&key, &app.config.keybindings.global.help) {
        app.show_help_popup = true;
    } else if key_match(&key, &app.config.keybindings.global.quit) {
        actions::quit(app);
    } else if key_match(&key, &list.compose) {
        app.start_composing();
    } else if key_match(&key, &list.up) {
        app.select_prev();
    } else if key_match(&key, &list.down) {
        app.select_next();
    // `g` also matches shift+g, so bottom goes first.
    } else if key_match(&key, &list.bottom) {
        app.select_last();
    } else if key_match(&key, &list.top) {
        app.select_first();
    } else if key_match(&key, &list.toggle) {
        actions::toggle_selected(app);
    } else if key_match(&key, &list.delete) {
        actions::request_delete_selected(app);
    } else if key_match(&key, &list.cycle_filter) {
        actions::cycle_filter(app);
    } else if key_match(&key, &list.toggle_completed) {
        actions::toggle_show_completed(app);
    } else if key_match(&key, &list.refresh) {
        actions::refresh(app);
    } else if let KeyCode::Char(c @ '1'..='3') = key.code
        && !key.modifiers.contains(KeyModifiers::CONTROL)
    {
        let index = c as usize - '1' as usize;
        actions::set_filter(app, TaskFilter::all()[index]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StoreBackend};
    use crate::identity::{Credential, Principal, Session};
    use chrono::Utc;

    fn task_app(titles: &[&str]) -> App<'static> {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        let mut app = App::new(config);
        app.enter_task_screen(Session {
            principal: Principal::new("keys@example.com"),
            credential: Credential {
                id_token: String::new(),
                refresh_token: String::new(),
                expires_at: Utc::now(),
            },
        })
        .expect("enter");
        if let Some(controller) = app.controller.as_mut() {
            for title in titles {
                controller.add_task(title, None);
            }
            assert!(controller.settle().is_empty());
        }
        app.clamp_selection();
        app
    }

    fn press(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        handle_normal_mode(app, KeyEvent::new(code, modifiers));
    }

    #[test]
    fn shift_g_jumps_to_bottom_and_g_to_top() {
        let mut app = task_app(&["a", "b", "c"]);

        press(&mut app, KeyCode::Char('G'), KeyModifiers::SHIFT);
        assert_eq!(app.tasks_state.selected(), Some(2));

        press(&mut app, KeyCode::Char('g'), KeyModifiers::NONE);
        assert_eq!(app.tasks_state.selected(), Some(0));
    }

    #[test]
    fn number_keys_pick_filter() {
        let mut app = task_app(&[]);
        press(&mut app, KeyCode::Char('3'), KeyModifiers::NONE);
        let controller = app.controller.as_ref().expect("controller");
        assert_eq!(controller.filter(), TaskFilter::Leftover);
    }

    #[test]
    fn delete_key_opens_confirmation_only() {
        let mut app = task_app(&["keep me"]);
        press(&mut app, KeyCode::Char('d'), KeyModifiers::NONE);

        let controller = app.controller.as_mut().expect("controller");
        assert!(controller.pending_delete().is_some());
        assert!(controller.settle().is_empty());
        assert_eq!(controller.tasks().len(), 1);
    }

    #[test]
    fn compose_key_enters_composer() {
        let mut app = task_app(&[]);
        press(&mut app, KeyCode::Char('i'), KeyModifiers::NONE);
        assert_eq!(app.input_mode, crate::models::InputMode::Composing);
    }
}
