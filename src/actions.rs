use crate::{
    app::App,
    controller::TaskFilter,
    date_input::parse_date_input,
    identity,
    tasks::today,
};
use log::{info, warn};
use std::sync::atomic::Ordering;

pub fn begin_sign_in(app: &mut App) {
    if app.is_signing_in() {
        app.toast("Sign-in already in progress.");
        return;
    }

    match identity::start_sign_in(&app.config.google, &app.config.firebase) {
        Ok(flow) => {
            let display = flow.display.clone();
            app.sign_in_cancel = Some(flow.cancel_handle());
            app.sign_in_receiver = Some(identity::spawn_sign_in(
                app.config.google.clone(),
                app.config.firebase.clone(),
                flow,
            ));
            if open::that(&display.auth_url).is_err() {
                app.toast("Open the URL shown to continue.");
            }
            app.sign_in_display = Some(display);
        }
        Err(err) => {
            warn!("event=sign_in_start_failed module=actions error={err}");
            app.show_alert("Login Failed", err.user_message());
        }
    }
}

pub fn reopen_sign_in_url(app: &mut App) {
    if let Some(display) = app.sign_in_display.as_ref()
        && open::that(&display.auth_url).is_err()
    {
        app.toast("Failed to open browser.");
    }
}

pub fn cancel_sign_in(app: &mut App) {
    if let Some(cancel) = app.sign_in_cancel.take() {
        cancel.store(true, Ordering::Relaxed);
    }
    app.sign_in_receiver = None;
    app.sign_in_display = None;
    info!("event=sign_in_abandoned module=actions");
}

pub fn submit_composer(app: &mut App) {
    let title = app.composer_title();
    let date_text = app.composer_date();
    let date = if date_text.trim().is_empty() {
        None
    } else {
        match parse_date_input(&date_text, today()) {
            Some(date) => Some(date),
            None => {
                app.toast_error(format!("Unrecognized date: {}", date_text.trim()));
                return;
            }
        }
    };

    let Some(controller) = app.controller.as_mut() else {
        return;
    };
    if controller.add_task(&title, date) {
        app.reset_composer();
        app.stop_composing();
    } else {
        app.toast("Type a task first.");
    }
}

pub fn toggle_selected(app: &mut App) {
    let Some(id) = app.selected_task_id() else {
        return;
    };
    let Some(controller) = app.controller.as_mut() else {
        return;
    };
    if controller.toggle_task(&id) {
        return;
    }
    let message = if controller.is_deleting(&id) {
        "Task is being deleted."
    } else {
        "Task not found."
    };
    app.toast(message);
}

pub fn request_delete_selected(app: &mut App) {
    let Some(id) = app.selected_task_id() else {
        app.toast("No task selected.");
        return;
    };
    if let Some(controller) = app.controller.as_mut() {
        controller.request_delete(&id);
    }
}

pub fn confirm_delete(app: &mut App) {
    if let Some(controller) = app.controller.as_mut() {
        controller.confirm_delete();
    }
}

pub fn cancel_delete(app: &mut App) {
    if let Some(controller) = app.controller.as_mut() {
        controller.cancel_delete();
    }
}

pub fn cycle_filter(app: &mut App) {
    let Some(controller) = app.controller.as_mut() else {
        return;
    };
    let next = controller.filter().next();
    controller.set_filter(next);
    app.clamp_selection();
    app.toast(format!("Filter: {}", next.as_str()));
}

pub fn set_filter(app: &mut App, filter: TaskFilter) {
    if let Some(controller) = app.controller.as_mut() {
        controller.set_filter(filter);
        app.clamp_selection();
    }
}

pub fn toggle_show_completed(app: &mut App) {
    let Some(controller) = app.controller.as_mut() else {
        return;
    };
    let show = !controller.show_completed();
    controller.set_show_completed(show);
    app.clamp_selection();
    app.toast(if show {
        "Showing completed tasks."
    } else {
        "Hiding completed tasks."
    });
}

pub fn refresh(app: &mut App) {
    if let Some(controller) = app.controller.as_mut() {
        controller.refresh();
    }
}

/// Lets queued mutations finish before leaving.
pub fn quit(app: &mut App) {
    if app.is_signing_in() {
        cancel_sign_in(app);
    }
    if let Some(controller) = app.controller.as_mut() {
        for failure in controller.settle() {
            warn!(
                "event=command_failed_on_exit module=actions kind={:?} error={}",
                failure.kind, failure.error
            );
        }
    }
    app.should_quit = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StoreBackend};
    use crate::identity::{Credential, Principal, Session};
    use crate::models::InputMode;
    use crate::tasks::format_date;
    use chrono::{Duration, Utc};

    fn signed_in_app() -> App<'static> {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        let mut app = App::new(config);
        app.enter_task_screen(Session {
            principal: Principal::new("act@example.com"),
            credential: Credential {
                id_token: String::new(),
                refresh_token: String::new(),
                expires_at: Utc::now(),
            },
        })
        .expect("enter");
        app
    }

    fn settle(app: &mut App) {
        if let Some(controller) = app.controller.as_mut() {
            assert!(controller.settle().is_empty());
        }
        app.clamp_selection();
    }

    #[test]
    fn submit_adds_task_and_resets_composer() {
        let mut app = signed_in_app();
        app.start_composing();
        app.title_input.insert_str("Water plants");
        app.date_input = tui_textarea::TextArea::new(vec!["tomorrow".to_string()]);

        submit_composer(&mut app);
        settle(&mut app);

        let controller = app.controller.as_ref().expect("controller");
        assert_eq!(controller.tasks().len(), 1);
        assert_eq!(controller.tasks()[0].title, "Water plants");
        assert_eq!(
            controller.tasks()[0].date,
            format_date(today() + Duration::days(1))
        );
        assert_eq!(app.composer_title(), "");
        assert_eq!(app.composer_date(), format_date(today()));
        assert_eq!(app.input_mode, InputMode::Navigate);
    }

    #[test]
    fn blank_title_keeps_composer_open() {
        let mut app = signed_in_app();
        app.start_composing();
        app.title_input.insert_str("   ");

        submit_composer(&mut app);
        settle(&mut app);

        assert_eq!(app.input_mode, InputMode::Composing);
        assert!(app.controller.as_ref().expect("controller").tasks().is_empty());
        assert_eq!(app.toast_message.as_deref(), Some("Type a task first."));
    }

    #[test]
    fn bad_date_is_reported_without_adding() {
        let mut app = signed_in_app();
        app.title_input.insert_str("A");
        app.date_input = tui_textarea::TextArea::new(vec!["someday".to_string()]);

        submit_composer(&mut app);
        settle(&mut app);

        assert!(app.toast_is_error);
        assert!(app.controller.as_ref().expect("controller").tasks().is_empty());
        assert_eq!(app.composer_title(), "A");
    }

    #[test]
    fn toggle_and_confirmed_delete_through_selection() {
        let mut app = signed_in_app();
        app.title_input.insert_str("A");
        submit_composer(&mut app);
        settle(&mut app);

        toggle_selected(&mut app);
        settle(&mut app);
        assert!(app.controller.as_ref().expect("controller").tasks()[0].done);

        request_delete_selected(&mut app);
        cancel_delete(&mut app);
        settle(&mut app);
        assert_eq!(app.controller.as_ref().expect("controller").tasks().len(), 1);

        request_delete_selected(&mut app);
        confirm_delete(&mut app);
        settle(&mut app);
        assert!(app.controller.as_ref().expect("controller").tasks().is_empty());
        assert_eq!(app.tasks_state.selected(), None);
    }

    #[test]
    fn view_toggles_stay_local() {
        let mut app = signed_in_app();
        cycle_filter(&mut app);
        toggle_show_completed(&mut app);
        let controller = app.controller.as_ref().expect("controller");
        assert_eq!(controller.filter(), TaskFilter::Today);
        assert!(!controller.show_completed());
    }
}
