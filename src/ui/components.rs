use ratatui::layout::{Constraint, Direction, Layout, Rect};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Helper function to calculate centered popup position
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

pub fn centered_column(area: Rect, desired_width: u16) -> Rect {
    if area.width == 0 || area.height == 0 {
        return area;
    }

    let width = desired_width.max(1).min(area.width);
    let x = area.x + area.width.saturating_sub(width) / 2;

    Rect {
        x,
        y: area.y,
        width,
        height: area.height,
    }
}

/// Cuts `text` to at most `max_width` terminal cells, ending with `…` when shortened.
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > max_width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_column_clamps_to_area() {
        let area = Rect::new(0, 0, 40, 10);
        let column = centered_column(area, 20);
        assert_eq!(column.x, 10);
        assert_eq!(column.width, 20);
        assert_eq!(centered_column(area, 100).width, 40);
    }

    #[test]
    fn truncation_respects_wide_characters() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("abcdefgh", 5), "abcd…");
        assert_eq!(truncate_to_width("할일목록", 5), "할일…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }
}
