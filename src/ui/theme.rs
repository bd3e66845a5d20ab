use crate::config::Theme;
use crate::ui::color_parser::parse_color;
use ratatui::style::Color;

/// Theme strings resolved to terminal colors once per frame.
#[derive(Debug, Clone)]
pub struct ThemeTokens {
    pub border_default: Color,
    pub border_editing: Color,
    pub accent: Color,
    pub muted: Color,
    pub selection_bg: Color,
    pub task_done: Color,
    pub task_open: Color,
    pub date: Color,
    pub toast_info: Color,
    pub toast_error: Color,
}

impl ThemeTokens {
    pub fn from_theme(theme: &Theme) -> Self {
        Self {
            border_default: parse_color(&theme.border_default),
            border_editing: parse_color(&theme.border_editing),
            accent: parse_color(&theme.accent),
            muted: parse_color(&theme.muted),
            selection_bg: parse_color(&theme.selection_bg),
            task_done: parse_color(&theme.task_done),
            task_open: parse_color(&theme.task_open),
            date: parse_color(&theme.date),
            toast_info: parse_color(&theme.toast_info),
            toast_error: parse_color(&theme.toast_error),
        }
    }
}
