use super::components::{centered_rect, truncate_to_width};
use crate::app::App;
use crate::ui::theme::ThemeTokens;
use chrono::Local;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

pub fn render_sign_in_popup(f: &mut Frame, app: &App) {
    let tokens = ThemeTokens::from_theme(&app.config.theme);
    let block = Block::default()
        .title(" Sign in with Google ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(tokens.border_default));
    let area = centered_rect(70, 45, f.area());
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let text_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(100)])
        .margin(2)
        .split(area);

    let mut lines = vec![
        Line::from(Span::styled(
            "Finish signing in from your browser",
            Style::default()
                .fg(tokens.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    if let Some(display) = app.sign_in_display.as_ref() {
        let remaining_seconds = display
            .expires_at
            .signed_duration_since(Local::now())
            .num_seconds()
            .max(0);
        let remaining_text = if remaining_seconds > 0 {
            format!(
                "Expires in {:02}m {:02}s",
                remaining_seconds / 60,
                remaining_seconds % 60
            )
        } else {
            "Sign-in expired. Press Esc and try again.".to_string()
        };

        lines.push(Line::from("If no browser opened, visit:"));
        lines.push(Line::from(Span::styled(
            display.auth_url.as_str(),
            Style::default().fg(tokens.accent),
        )));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Google redirects back to {}", display.listen_addr),
            Style::default().fg(tokens.muted),
        )));
        lines.push(Line::from(Span::styled(
            remaining_text,
            Style::default().fg(tokens.muted),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "[Enter] Open browser    [Esc] Cancel",
        Style::default().fg(tokens.muted),
    )));

    let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true });
    f.render_widget(paragraph, text_area[0]);
}

pub fn render_alert_popup(f: &mut Frame, app: &App) {
    let Some(alert) = app.alert.as_ref() else {
        return;
    };
    let tokens = ThemeTokens::from_theme(&app.config.theme);
    let block = Block::default()
        .title(format!(" {} ", alert.title))
        .borders(Borders::ALL)
        .style(Style::default().fg(tokens.toast_error));
    let area = centered_rect(50, 25, f.area());
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let text_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .margin(2)
        .split(area);

    let body = Paragraph::new(alert.message.as_str())
        .style(Style::default().add_modifier(Modifier::BOLD))
        .wrap(Wrap { trim: true });
    let help_text =
        Paragraph::new("Enter/Esc: dismiss").style(Style::default().fg(Color::DarkGray));

    f.render_widget(body, text_area[0]);
    f.render_widget(help_text, text_area[1]);
}

pub fn render_delete_task_popup(f: &mut Frame, app: &App) {
    let Some(controller) = app.controller.as_ref() else {
        return;
    };
    let Some(task) = controller
        .pending_delete()
        .and_then(|id| controller.task(id))
    else {
        return;
    };

    let block = Block::default()
        .title(" Delete this task? ")
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::LightRed));
    let area = centered_rect(50, 20, f.area());
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let text_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .margin(2)
        .split(area);

    let title_width = text_area[0].width.saturating_sub(2) as usize;
    let body = Paragraph::new(vec![
        Line::from(Span::styled(
            truncate_to_width(&task.title, title_width),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            task.date.as_str(),
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .wrap(Wrap { trim: true });

    let help_text = Paragraph::new("Enter/y: delete  Esc/n: cancel")
        .style(Style::default().fg(Color::DarkGray));

    f.render_widget(body, text_area[0]);
    f.render_widget(help_text, text_area[1]);
}

pub fn render_help_popup(f: &mut Frame, app: &App) {
    let tokens = ThemeTokens::from_theme(&app.config.theme);
    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(tokens.border_default));
    let area = centered_rect(70, 80, f.area());
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let inner_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .margin(2)
        .split(area);

    let key_style = Style::default()
        .fg(tokens.accent)
        .add_modifier(Modifier::BOLD);
    let header_style = key_style.add_modifier(Modifier::UNDERLINED);

    let mut lines = Vec::new();
    for (idx, section) in help_sections(app).iter().enumerate() {
        if idx > 0 {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(section.title, header_style)));
        let key_width = section
            .entries
            .iter()
            .map(|(_, keys)| keys.chars().count())
            .max()
            .unwrap_or(0);
        for (label, keys) in &section.entries {
            let pad = key_width.saturating_sub(keys.chars().count());
            lines.push(Line::from(vec![
                Span::styled(keys.clone(), key_style),
                Span::raw(" ".repeat(pad + 2)),
                Span::raw(*label),
            ]));
        }
    }

    f.render_widget(Paragraph::new(lines), inner_area[0]);
    f.render_widget(
        Paragraph::new("Esc/?: close").style(Style::default().fg(tokens.muted)),
        inner_area[1],
    );
}

struct HelpSection {
    title: &'static str,
    entries: Vec<(&'static str, String)>,
}

fn help_sections(app: &App) -> Vec<HelpSection> {
    let kb = &app.config.keybindings;
    vec![
        HelpSection {
            title: "Tasks",
            entries: vec![
                ("Move", join_key_groups(&[fmt_keys(&kb.list.up), fmt_keys(&kb.list.down)])),
                (
                    "Top / bottom",
                    join_key_groups(&[fmt_keys(&kb.list.top), fmt_keys(&kb.list.bottom)]),
                ),
                ("Toggle done", fmt_keys(&kb.list.toggle)),
                ("Delete", fmt_keys(&kb.list.delete)),
                ("New task", fmt_keys(&kb.list.compose)),
                ("Next filter", fmt_keys(&kb.list.cycle_filter)),
                ("All / Today / Leftover", "1 / 2 / 3".to_string()),
                ("Show or hide completed", fmt_keys(&kb.list.toggle_completed)),
                ("Reload", fmt_keys(&kb.list.refresh)),
            ],
        },
        HelpSection {
            title: "Composer",
            entries: vec![
                ("Add task", fmt_keys(&kb.composer.submit)),
                ("Title / date", fmt_keys(&kb.composer.switch_field)),
                ("Date +1 / -1 day", "up / down".to_string()),
                ("Back to list", fmt_keys(&kb.composer.cancel)),
            ],
        },
        HelpSection {
            title: "General",
            entries: vec![
                ("Help", fmt_keys(&kb.global.help)),
                ("Quit", fmt_keys(&kb.global.quit)),
            ],
        },
    ]
}

fn join_key_groups(groups: &[String]) -> String {
    let filtered: Vec<&str> = groups
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty() && *value != "-")
        .collect();
    if filtered.is_empty() {
        "-".to_string()
    } else {
        filtered.join(" | ")
    }
}

fn fmt_keys(keys: &[String]) -> String {
    if keys.is_empty() {
        return "-".to_string();
    }
    keys.join(" / ")
}
