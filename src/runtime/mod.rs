use crate::{app::App, controller::Failure, models::Screen};
use chrono::Local;
use log::{info, warn};
use std::sync::mpsc::TryRecvError;

pub fn tick(app: &mut App) {
    handle_sign_in(app);
    handle_task_outcomes(app);

    if let Some(expiry) = app.toast_expiry
        && Local::now() >= expiry
    {
        app.toast_expiry = None;
        app.toast_message = None;
        app.toast_is_error = false;
    }
}

fn handle_sign_in(app: &mut App) {
    let result = {
        let Some(receiver) = app.sign_in_receiver.as_ref() else {
            return;
        };
        receiver.try_recv()
    };

    match result {
        Ok(Ok(session)) => {
            clear_sign_in(app);
            let email = session.principal.email().to_string();
            match app.enter_task_screen(session) {
                Ok(()) => app.toast(format!("Welcome, {email}!")),
                Err(err) => {
                    warn!("event=store_open_failed module=runtime error={err}");
                    app.show_alert("Login Failed", err.to_string());
                }
            }
        }
        Ok(Err(err)) => {
            clear_sign_in(app);
            info!(
                "event=sign_in_failed module=runtime category={:?}",
                err.category()
            );
            app.show_alert("Login Failed", err.user_message());
        }
        Err(TryRecvError::Empty) => {}
        Err(TryRecvError::Disconnected) => {
            clear_sign_in(app);
            app.toast("Sign-in stopped.");
        }
    }
}

fn clear_sign_in(app: &mut App) {
    app.sign_in_receiver = None;
    app.sign_in_cancel = None;
    app.sign_in_display = None;
}

fn handle_task_outcomes(app: &mut App) {
    if app.screen != Screen::Tasks {
        return;
    }
    let Some(controller) = app.controller.as_mut() else {
        return;
    };

    let failures = controller.poll();
    app.clamp_selection();
    if let Some(message) = failure_toast(&failures) {
        app.toast_error(message);
    }
}

/// The newest failure, with a count of the others that arrived alongside it.
fn failure_toast(failures: &[Failure]) -> Option<String> {
    let last = failures.last()?;
    match failures.len() - 1 {
        0 => Some(last.message()),
        others => Some(format!("{} (+{others} more)", last.message())),
    }
}
