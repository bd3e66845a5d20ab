use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, Paragraph, Tabs},
};
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::controller::TaskFilter;
use crate::models::{ComposerField, InputMode, Screen};
use crate::tasks::{Task, format_date, today};

pub mod color_parser;
pub mod components;
pub mod popups;
pub mod theme;

use components::{centered_column, truncate_to_width};
use popups::{render_alert_popup, render_delete_task_popup, render_help_popup, render_sign_in_popup};
use theme::ThemeTokens;

const CONTENT_WIDTH: u16 = 100;

pub fn ui(f: &mut Frame, app: &mut App) {
    let tokens = ThemeTokens::from_theme(&app.config.theme);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(f.area());
    let (main_area, status_area) = (chunks[0], chunks[1]);

    match app.screen {
        Screen::Login => render_login_screen(f, main_area, app, &tokens),
        Screen::Tasks => render_task_screen(f, main_area, app, &tokens),
    }
    render_status_bar(f, status_area, app, &tokens);

    if app.show_help_popup {
        render_help_popup(f, app);
    }
    if app
        .controller
        .as_ref()
        .is_some_and(|controller| controller.pending_delete().is_some())
    {
        render_delete_task_popup(f, app);
    }
    if app.sign_in_display.is_some() {
        render_sign_in_popup(f, app);
    }
    if app.alert.is_some() {
        render_alert_popup(f, app);
    }
}

fn render_login_screen(f: &mut Frame, area: Rect, app: &App, tokens: &ThemeTokens) {
    let column = centered_column(area, 50);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Length(7),
            Constraint::Min(0),
        ])
        .split(column);

    let prompt = if app.is_signing_in() {
        "Waiting for Google…"
    } else {
        "Press Enter to sign in with Google"
    };
    let lines = vec![
        Line::from(Span::styled(
            "Daily Todo",
            Style::default()
                .fg(tokens.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(prompt),
        Line::from(""),
        Line::from(Span::styled(
            "?: help  q: quit",
            Style::default().fg(tokens.muted),
        )),
    ];
    let card = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(tokens.border_default)),
    );
    f.render_widget(card, rows[1]);
}

fn render_task_screen(f: &mut Frame, area: Rect, app: &mut App, tokens: &ThemeTokens) {
    let column = centered_column(area, CONTENT_WIDTH);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(column);

    render_composer(f, rows[0], app, tokens);
    render_filter_bar(f, rows[1], app, tokens);
    render_task_list(f, rows[2], app, tokens);
}

fn render_composer(f: &mut Frame, area: Rect, app: &mut App, tokens: &ThemeTokens) {
    let parts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(24)])
        .split(area);

    let composing = app.input_mode == InputMode::Composing;
    let border = |focused: bool| {
        if focused {
            Style::default().fg(tokens.border_editing)
        } else {
            Style::default().fg(tokens.border_default)
        }
    };
    let cursor = |focused: bool| {
        if focused {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        }
    };

    let title_focused = composing && app.composer_field == ComposerField::Title;
    let date_focused = composing && app.composer_field == ComposerField::Date;

    app.title_input.set_block(
        Block::default()
            .title(" New task ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border(title_focused)),
    );
    app.title_input.set_cursor_style(cursor(title_focused));
    app.title_input.set_cursor_line_style(Style::default());
    app.title_input
        .set_placeholder_style(Style::default().fg(tokens.muted));

    app.date_input.set_block(
        Block::default()
            .title(" Date ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border(date_focused)),
    );
    app.date_input.set_cursor_style(cursor(date_focused));
    app.date_input.set_cursor_line_style(Style::default());
    app.date_input
        .set_placeholder_style(Style::default().fg(tokens.muted));
    app.date_input.set_style(Style::default().fg(tokens.date));

    f.render_widget(&app.title_input, parts[0]);
    f.render_widget(&app.date_input, parts[1]);
}

fn render_filter_bar(f: &mut Frame, area: Rect, app: &App, tokens: &ThemeTokens) {
    let Some(controller) = app.controller.as_ref() else {
        return;
    };
    let parts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(18)])
        .split(area);

    let titles: Vec<String> = TaskFilter::all()
        .iter()
        .map(|filter| filter.as_str().to_string())
        .collect();
    let selected = TaskFilter::all()
        .iter()
        .position(|filter| *filter == controller.filter())
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .style(Style::default().fg(tokens.muted))
        .highlight_style(
            Style::default()
                .fg(tokens.accent)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, parts[0]);

    let completed = if controller.show_completed() {
        "done: shown"
    } else {
        "done: hidden"
    };
    let indicator = Paragraph::new(completed)
        .style(Style::default().fg(tokens.muted))
        .alignment(Alignment::Right);
    f.render_widget(indicator, parts[1]);
}

fn render_task_list(f: &mut Frame, area: Rect, app: &mut App, tokens: &ThemeTokens) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(tokens.border_default));
    let inner_width = block.inner(area).width as usize;

    let Some(controller) = app.controller.as_ref() else {
        return;
    };

    let today_label = format_date(today());
    let items: Vec<ListItem<'static>> = controller
        .visible_tasks()
        .into_iter()
        .map(|task| task_item(task, &today_label, inner_width, tokens))
        .collect();

    if items.is_empty() {
        let message = if !controller.is_loaded() && controller.is_busy() {
            "Loading tasks…".to_string()
        } else if !controller.is_loaded() {
            "Tasks could not be loaded. Press r to retry.".to_string()
        } else if controller.tasks().is_empty() {
            let compose = app
                .config
                .keybindings
                .list
                .compose
                .first()
                .cloned()
                .unwrap_or_else(|| "i".to_string());
            format!("No tasks yet. Press {compose} to add one.")
        } else {
            "Nothing matches this filter.".to_string()
        };
        let empty = Paragraph::new(message)
            .style(Style::default().fg(tokens.muted))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(tokens.selection_bg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("› ");
    f.render_stateful_widget(list, area, &mut app.tasks_state);
}

fn task_item(task: &Task, today: &str, width: usize, tokens: &ThemeTokens) -> ListItem<'static> {
    let checkbox = if task.done { "[x] " } else { "[ ] " };
    let overdue = !task.done && task.date.as_str() < today;
    let date_label = if task.date == today {
        "today".to_string()
    } else {
        task.date.clone()
    };

    let title_style = if task.done {
        Style::default()
            .fg(tokens.task_done)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default().fg(tokens.task_open)
    };
    let date_style = if overdue {
        Style::default().fg(tokens.toast_error)
    } else {
        Style::default().fg(tokens.date)
    };

    // Two cells for the highlight symbol, one for the gap before the date.
    let reserved = 2 + checkbox.width() + date_label.width() + 1;
    let title_width = width.saturating_sub(reserved);
    let title = truncate_to_width(&task.title, title_width);
    let pad = title_width.saturating_sub(title.width());

    ListItem::new(Line::from(vec![
        Span::styled(checkbox, title_style),
        Span::styled(title, title_style),
        Span::raw(" ".repeat(pad + 1)),
        Span::styled(date_label, date_style),
    ]))
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App, tokens: &ThemeTokens) {
    if area.height == 0 || area.width == 0 {
        return;
    }

    let mode_label = match (app.screen, app.input_mode) {
        (Screen::Login, _) => "LOGIN",
        (Screen::Tasks, InputMode::Navigate) => "LIST",
        (Screen::Tasks, InputMode::Composing) => "COMPOSE",
    };

    let mut left_spans = vec![Span::styled(
        format!(" {mode_label} "),
        Style::default()
            .fg(tokens.accent)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(controller) = app.controller.as_ref() {
        left_spans.push(Span::raw(" "));
        left_spans.push(Span::raw(controller.principal().email().to_string()));
        let open = controller.tasks().iter().filter(|task| !task.done).count();
        left_spans.push(Span::styled(
            format!("  {open} open / {} total", controller.tasks().len()),
            Style::default().fg(tokens.muted),
        ));
        if controller.is_busy() {
            left_spans.push(Span::styled(
                "  syncing…",
                Style::default().fg(tokens.muted),
            ));
        }
    }

    let status_message = app
        .toast_message
        .as_deref()
        .filter(|toast| !toast.is_empty())
        .map(|toast| {
            let color = if app.toast_is_error {
                tokens.toast_error
            } else {
                tokens.toast_info
            };
            (toast, color)
        });

    let Some((message, color)) = status_message else {
        f.render_widget(Paragraph::new(Line::from(left_spans)), area);
        return;
    };

    let right_width = toast_width(message, area.width);

    let status_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(right_width)])
        .split(area);

    f.render_widget(Paragraph::new(Line::from(left_spans)), status_chunks[0]);

    let right = Paragraph::new(Span::styled(
        truncate_to_width(message, right_width as usize),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Right);
    f.render_widget(right, status_chunks[1]);
}

/// Columns for the toast, leaving at least ten for the left side.
fn toast_width(message: &str, area_width: u16) -> u16 {
    let max_right = area_width.saturating_sub(10);
    u16::try_from(UnicodeWidthStr::width(message))
        .unwrap_or(u16::MAX)
        .min(max_right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StoreBackend, Theme};
    use crate::identity::{Credential, Principal, Session};
    use chrono::Utc;
    use ratatui::{Terminal, backend::TestBackend, buffer::Buffer};

    fn buffer_text(buffer: &Buffer) -> String {
        let area = buffer.area;
        let mut out = String::new();
        for y in area.y..area.y + area.height {
            for x in area.x..area.x + area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).expect("terminal");
        terminal.draw(|f| ui(f, app)).expect("draw");
        buffer_text(terminal.backend().buffer())
    }

    fn task_app() -> App<'static> {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        let mut app = App::new(config);
        app.enter_task_screen(Session {
            principal: Principal::new("draw@example.com"),
            credential: Credential {
                id_token: String::new(),
                refresh_token: String::new(),
                expires_at: Utc::now(),
            },
        })
        .expect("enter");
        app
    }

    #[test]
    fn login_screen_prompts_for_sign_in() {
        let mut app = App::new(Config::default());
        let screen = draw(&mut app);
        assert!(screen.contains("Press Enter to sign in with Google"));
        assert!(screen.contains("LOGIN"));
    }

    #[test]
    fn task_screen_lists_tasks_and_filter_tabs() {
        let mut app = task_app();
        if let Some(controller) = app.controller.as_mut() {
            controller.add_task("Buy milk", None);
            assert!(controller.settle().is_empty());
        }
        app.clamp_selection();

        let screen = draw(&mut app);
        assert!(screen.contains("Buy milk"));
        assert!(screen.contains("today"));
        assert!(screen.contains("Leftover"));
        assert!(screen.contains("draw@example.com"));
        assert!(screen.contains("1 open / 1 total"));
    }

    #[test]
    fn delete_confirmation_names_the_task() {
        let mut app = task_app();
        if let Some(controller) = app.controller.as_mut() {
            controller.add_task("Old chore", None);
            assert!(controller.settle().is_empty());
            let id = controller.tasks()[0].id.clone();
            controller.request_delete(&id);
        }

        let screen = draw(&mut app);
        assert!(screen.contains("Delete this task?"));
        assert!(screen.contains("Enter/y: delete"));
    }

    #[test]
    fn task_rows_fill_the_list_width() {
        let tokens = ThemeTokens::from_theme(&Theme::default());
        let task = Task {
            id: "a".to_string(),
            title: "late".to_string(),
            date: "2000-01-01".to_string(),
            done: false,
        };
        let item = task_item(&task, "2025-01-01", 40, &tokens);
        assert_eq!(item.height(), 1);
        assert_eq!(item.width(), 40 - 2);

        let long = Task {
            title: "x".repeat(200),
            ..task
        };
        assert_eq!(task_item(&long, "2025-01-01", 40, &tokens).width(), 40 - 2);
    }

    #[test]
    fn oversized_toast_fills_the_status_bar() {
        let huge = "x".repeat(65_537);
        assert_eq!(toast_width(&huge, 100), 90);
        assert_eq!(toast_width("saved", 100), 5);
        assert_eq!(toast_width("saved", 4), 0);

        let mut app = task_app();
        app.toast_error(huge);
        let text = draw(&mut app);
        assert!(text.contains(&"x".repeat(80)));
    }
}
