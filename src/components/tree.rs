use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use crate::nav::row::{Row, RowKind};
use crate::nav::Navigator;

/// Tree widget: one line per row, indented by level.
pub struct TreeWidget<'a> {
    nav: &'a Navigator,
    block: Option<Block<'a>>,
}

impl<'a> TreeWidget<'a> {
    pub fn new(nav: &'a Navigator) -> Self {
        Self { nav, block: None }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = block.into();
        self
    }

    /// Expansion marker shown before the name.
    fn marker(row: &Row) -> &'static str {
        match (row.is_container(), row.pending, row.expanded) {
            (false, _, _) => "  ",
            (true, true, _) => "… ",
            (true, false, true) => "▾ ",
            (true, false, false) => "▸ ",
        }
    }

    fn row_style(row: &Row, selected: bool) -> Style {
        if selected {
            return Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD);
        }
        match row.kind {
            RowKind::Directory => Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            RowKind::Index => Style::default().fg(Color::Magenta),
            RowKind::File if !row.text_error.is_empty() => Style::default().fg(Color::Red),
            RowKind::File => Style::default().fg(Color::White),
        }
    }
}

impl<'a> Widget for TreeWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_area = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        let store = self.nav.store();
        let visible_height = inner_area.height as usize;
        let width = inner_area.width as usize;
        if visible_height == 0 || width == 0 {
            return;
        }
        if store.is_empty() {
            let msg = if self.nav.is_loading() {
                "Loading…"
            } else {
                "Empty"
            };
            let line = Line::from(Span::styled(msg, Style::default().fg(Color::DarkGray)));
            buf.set_line(inner_area.x, inner_area.y, &line, inner_area.width);
            return;
        }

        let selected = self.nav.selected_index();
        let rows = (self.nav.scroll_offset..store.len())
            .filter_map(|i| store.row_at(i).map(|row| (i, row)))
            .take(visible_height);

        for (line_no, (idx, row)) in rows.enumerate() {
            let y = inner_area.y + line_no as u16;
            let style = Self::row_style(row, selected == Some(idx));

            let indent = "  ".repeat(row.level.saturating_sub(1));
            let mut label = format!("{}{}{}", indent, Self::marker(row), row.name);
            if row.filtered {
                label.push_str(" (filtered)");
            }
            let size = if row.is_file() {
                row.size_label()
            } else {
                String::new()
            };

            // Size is right-aligned; the name gives way when space runs out.
            let label_len = label.chars().count();
            let size_len = size.chars().count();
            let gap = width.saturating_sub(label_len + size_len);
            let text = if gap == 0 {
                label
            } else {
                format!("{}{}{}", label, " ".repeat(gap), size)
            };

            let line = Line::from(Span::styled(text, style));
            buf.set_line(inner_area.x, y, &line, inner_area.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing::{buffer_to_string, navigator};
    use crate::nav::preload::PreloadScheduler;
    use ratatui::widgets::Borders;
    use tokio::sync::mpsc;

    fn render(nav: &Navigator, area: Rect) -> Buffer {
        let mut buf = Buffer::empty(area);
        TreeWidget::new(nav)
            .block(Block::default().borders(Borders::ALL).title(" Tree "))
            .render(area, &mut buf);
        buf
    }

    #[test]
    fn test_rows_indented_by_level() {
        let nav = navigator();
        let area = Rect::new(0, 0, 30, 6);
        let buf = render(&nav, area);
        let lines: Vec<String> = buffer_to_string(&buf, area)
            .lines()
            .map(str::to_string)
            .collect();

        assert!(lines[1].starts_with("│  a.jpg"));
        assert!(lines[2].starts_with("│▾ sub"));
        assert!(lines[3].starts_with("│    b.jpg"));
    }

    #[test]
    fn test_size_label_right_aligned() {
        let nav = navigator();
        let area = Rect::new(0, 0, 30, 6);
        let buf = render(&nav, area);
        let label = nav.store().row_at(0).unwrap().size_label();
        let line = buffer_to_string(&buf, area)
            .lines()
            .nth(1)
            .unwrap()
            .to_string();
        assert!(line.trim_end_matches('│').ends_with(&label));
    }

    #[test]
    fn test_selected_row_highlighted() {
        let mut nav = navigator();
        nav.select_at(2).unwrap();
        let area = Rect::new(0, 0, 30, 6);
        let buf = render(&nav, area);
        let cell = buf.cell((3, 3)).unwrap();
        assert_eq!(cell.bg, Color::Blue);
        let other = buf.cell((3, 1)).unwrap();
        assert_ne!(other.bg, Color::Blue);
    }

    #[test]
    fn test_scroll_offset_skips_rows() {
        let mut nav = navigator();
        nav.scroll_offset = 1;
        let area = Rect::new(0, 0, 30, 6);
        let buf = render(&nav, area);
        let content = buffer_to_string(&buf, area);
        assert!(!content.contains("a.jpg"));
        assert!(content.contains("sub"));
    }

    #[test]
    fn test_collapsed_marker() {
        let mut nav = navigator();
        nav.select_at(1).unwrap();
        let _ = nav.toggle_current();
        let area = Rect::new(0, 0, 30, 6);
        let buf = render(&nav, area);
        let content = buffer_to_string(&buf, area);
        assert!(content.contains("▸ sub"));
        assert!(!content.contains("b.jpg"));
    }

    #[test]
    fn test_empty_tree_shows_loading() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut nav = Navigator::new(PreloadScheduler::new(1, 3), tx);
        let _ = nav.start();
        let area = Rect::new(0, 0, 20, 3);
        let buf = render(&nav, area);
        assert!(buffer_to_string(&buf, area).contains("Loading…"));
    }

    #[test]
    fn test_zero_area_no_panic() {
        let nav = navigator();
        let area = Rect::new(0, 0, 0, 0);
        let mut buf = Buffer::empty(area);
        TreeWidget::new(&nav).render(area, &mut buf);
    }
}
