use crate::config::Config;
use crate::controller::TaskListController;
use crate::error::{AuthError, StoreError};
use crate::identity::{Session, SignInDisplay};
use crate::models::{Alert, ComposerField, InputMode, Screen};
use crate::store;
use crate::tasks::{TaskRepo, format_date, today};
use chrono::{DateTime, Duration, Local};
use log::info;
use ratatui::widgets::ListState;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Receiver;
use tui_textarea::TextArea;

pub const PLACEHOLDER_TITLE: &str = "What's your next task?";
pub const PLACEHOLDER_DATE: &str = "YYYY-MM-DD, today, +3d, fri…";
const TOAST_SECONDS: i64 = 4;

pub struct App<'a> {
    pub config: Config,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub composer_field: ComposerField,
    pub title_input: TextArea<'a>,
    pub date_input: TextArea<'a>,

    // Sign-in flow in progress
    pub sign_in_display: Option<SignInDisplay>,
    pub sign_in_receiver: Option<Receiver<Result<Session, AuthError>>>,
    pub sign_in_cancel: Option<Arc<AtomicBool>>,

    pub controller: Option<TaskListController>,
    pub tasks_state: ListState,

    pub alert: Option<Alert>,
    pub show_help_popup: bool,
    pub toast_message: Option<String>,
    pub toast_is_error: bool,
    pub toast_expiry: Option<DateTime<Local>>,
    pub should_quit: bool,
}

impl<'a> App<'a> {
    pub fn new(config: Config) -> App<'a> {
        let mut app = App {
            config,
            screen: Screen::Login,
            input_mode: InputMode::Navigate,
            composer_field: ComposerField::Title,
            title_input: TextArea::default(),
            date_input: TextArea::default(),
            sign_in_display: None,
            sign_in_receiver: None,
            sign_in_cancel: None,
            controller: None,
            tasks_state: ListState::default(),
            alert: None,
            show_help_popup: false,
            toast_message: None,
            toast_is_error: false,
            toast_expiry: None,
            should_quit: false,
        };
        app.reset_composer();
        app
    }

    pub fn toast(&mut self, message: impl Into<String>) {
        self.toast_message = Some(message.into());
        self.toast_is_error = false;
        self.toast_expiry = Some(Local::now() + Duration::seconds(TOAST_SECONDS));
    }

    pub fn toast_error(&mut self, message: impl Into<String>) {
        self.toast(message);
        self.toast_is_error = true;
    }

    pub fn show_alert(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.alert = Some(Alert {
            title: title.into(),
            message: message.into(),
        });
    }

    pub fn is_signing_in(&self) -> bool {
        self.sign_in_receiver.is_some()
    }

    /// Moves to the task screen for a signed-in user and starts the first load.
    pub fn enter_task_screen(&mut self, session: Session) -> Result<(), StoreError> {
        let store = store::open_store(&self.config, &session)?;
        let mut controller = TaskListController::new(session.principal.clone(), TaskRepo::new(store));
        controller.set_filter(self.config.view.default_filter);
        controller.set_show_completed(self.config.view.show_completed);
        controller.refresh();

        info!(
            "event=screen_changed module=app screen=tasks backend={:?}",
            self.config.store.backend
        );
        self.controller = Some(controller);
        self.screen = Screen::Tasks;
        self.input_mode = InputMode::Navigate;
        self.tasks_state = ListState::default();
        self.reset_composer();
        Ok(())
    }

    pub fn start_composing(&mut self) {
        self.input_mode = InputMode::Composing;
        self.composer_field = ComposerField::Title;
    }

    pub fn stop_composing(&mut self) {
        self.input_mode = InputMode::Navigate;
    }

    /// Empty title, date back to today.
    pub fn reset_composer(&mut self) {
        let mut title = TextArea::default();
        title.set_placeholder_text(PLACEHOLDER_TITLE);
        self.title_input = title;

        let mut date = TextArea::new(vec![format_date(today())]);
        date.set_placeholder_text(PLACEHOLDER_DATE);
        date.move_cursor(tui_textarea::CursorMove::End);
        self.date_input = date;
        self.composer_field = ComposerField::Title;
    }

    pub fn composer_title(&self) -> String {
        self.title_input.lines().join(" ")
    }

    pub fn composer_date(&self) -> String {
        self.date_input.lines().join(" ")
    }

    /// Id of the highlighted row among the visible tasks.
    pub fn selected_task_id(&self) -> Option<String> {
        let controller = self.controller.as_ref()?;
        let index = self.tasks_state.selected()?;
        controller
            .visible_tasks()
            .get(index)
            .map(|task| task.id.clone())
    }

    pub fn visible_count(&self) -> usize {
        self.controller
            .as_ref()
            .map(|c| c.visible_tasks().len())
            .unwrap_or(0)
    }

    pub fn select_next(&mut self) {
        let len = self.visible_count();
        if len == 0 {
            return;
        }
        let next = match self.tasks_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.tasks_state.select(Some(next));
    }

    pub fn select_prev(&mut self) {
        if self.visible_count() == 0 {
            return;
        }
        let prev = self.tasks_state.selected().unwrap_or(0).saturating_sub(1);
        self.tasks_state.select(Some(prev));
    }

    pub fn select_first(&mut self) {
        if self.visible_count() > 0 {
            self.tasks_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        let len = self.visible_count();
        if len > 0 {
            self.tasks_state.select(Some(len - 1));
        }
    }

    /// Keeps the highlight on a row after the visible list changed size.
    pub fn clamp_selection(&mut self) {
        let len = self.visible_count();
        match (len, self.tasks_state.selected()) {
            (0, _) => self.tasks_state.select(None),
            (_, None) => self.tasks_state.select(Some(0)),
            (len, Some(i)) if i >= len => self.tasks_state.select(Some(len - 1)),
            _ => {}
        }
    }
}
