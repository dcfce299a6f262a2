use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Paragraph, Widget, Wrap},
};

use crate::app::{AppMode, DialogKind, DialogState};
use crate::nav::{DialogContent, Mutation};

/// Dialog widget that renders a centered modal overlay.
pub struct DialogWidget<'a> {
    mode: &'a AppMode,
    dialog_state: &'a DialogState,
}

impl<'a> DialogWidget<'a> {
    pub fn new(mode: &'a AppMode, dialog_state: &'a DialogState) -> Self {
        Self { mode, dialog_state }
    }

    /// Calculate a centered rectangle within the given area.
    fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height.saturating_sub(height) / 2;
        let w = width.min(area.width);
        let h = height.min(area.height);
        Rect::new(x, y, w, h)
    }
}

impl<'a> Widget for DialogWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let kind = match &self.mode {
            AppMode::Dialog(kind) => kind,
            _ => return,
        };

        match kind {
            DialogKind::Message(DialogContent::Text(text)) => {
                render_message_dialog(" Message ", text, area, buf);
            }
            DialogKind::Message(DialogContent::Html(html)) => {
                render_message_dialog(" Server ", &html_to_text(html), area, buf);
            }
            DialogKind::EditCaption { folder, mutation } => {
                let title = if *folder {
                    "Folder Caption"
                } else {
                    "Caption"
                };
                let text_path = match mutation {
                    Mutation::Caption { text_path, .. } => Some(text_path.as_str()),
                    _ => None,
                };
                render_input_dialog(title, text_path, self.dialog_state, area, buf);
            }
            DialogKind::DropConfirm { mutation } => {
                render_drop_dialog(mutation, area, buf);
            }
            DialogKind::OpenPath => {
                render_input_dialog("Open Path", None, self.dialog_state, area, buf);
            }
            DialogKind::NewTab => {
                render_input_dialog(
                    "New Tab",
                    Some("path=…&publish=…&subscribe=…"),
                    self.dialog_state,
                    area,
                    buf,
                );
            }
        }
    }
}

fn hint_line(hint: &str) -> Line<'_> {
    Line::from(Span::styled(
        hint,
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::DIM),
    ))
}

fn render_input_dialog(
    title: &str,
    subtitle: Option<&str>,
    state: &DialogState,
    area: Rect,
    buf: &mut Buffer,
) {
    let dialog_width = 60.min(area.width.saturating_sub(4));
    let dialog_height = if subtitle.is_some() { 6 } else { 5 };
    let rect = DialogWidget::centered_rect(dialog_width, dialog_height, area);

    Clear.render(rect, buf);

    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .padding(Padding::horizontal(1));

    let inner = block.inner(rect);
    block.render(rect, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if let Some(subtitle) = subtitle {
        let line = Line::from(Span::styled(subtitle, Style::default().fg(Color::DarkGray)));
        buf.set_line(inner.x, inner.y, &line, inner.width);
    }

    // Render input line with cursor
    let input = &state.input;
    let cursor_pos = state.cursor_position.min(input.len());
    let max_width = inner.width as usize;

    let before = &input[..cursor_pos];
    let mut rest = input[cursor_pos..].chars();
    let cursor_char = rest.next().map(String::from).unwrap_or_else(|| " ".into());
    let after = rest.as_str();

    // Truncate from left if input is too long
    let before_len = before.chars().count();
    let keep = max_width.saturating_sub(2);
    let before_display: String = if before_len > keep {
        before.chars().skip(before_len - keep).collect()
    } else {
        before.to_string()
    };

    let input_style = Style::default().fg(Color::White);
    let cursor_style = Style::default()
        .bg(Color::White)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD);

    let line = Line::from(vec![
        Span::styled(before_display, input_style),
        Span::styled(cursor_char, cursor_style),
        Span::styled(after, input_style),
    ]);
    let input_y = if subtitle.is_some() {
        inner.y + 2
    } else {
        inner.y + inner.height / 2
    };
    if input_y < inner.y + inner.height {
        buf.set_line(inner.x, input_y, &line, inner.width);
    }

    if inner.height > 1 {
        buf.set_line(
            inner.x,
            inner.y + inner.height - 1,
            &hint_line("[Enter] Confirm  [Esc] Cancel"),
            inner.width,
        );
    }
}

fn render_drop_dialog(mutation: &Mutation, area: Rect, buf: &mut Buffer) {
    let (item, index_file) = match mutation {
        Mutation::Drop {
            item, index_file, ..
        } => (item.as_str(), index_file.as_str()),
        other => (other.path(), ""),
    };

    let longest = item.chars().count().max(index_file.chars().count());
    let dialog_width = (longest.min(200) as u16 + 10)
        .max(40)
        .min(area.width.saturating_sub(4));
    let dialog_height = 7.min(area.height.saturating_sub(2));
    let rect = DialogWidget::centered_rect(dialog_width, dialog_height, area);

    Clear.render(rect, buf);

    let block = Block::default()
        .title(" Drop from Index ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .padding(Padding::horizontal(1));

    let inner = block.inner(rect);
    block.render(rect, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let header = Line::from(Span::styled(
        "Drop this entry?",
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ));
    buf.set_line(inner.x, inner.y, &header, inner.width);

    let body = [
        format!("  • {}", item),
        format!("  from {}", index_file),
    ];
    for (i, text) in body.iter().enumerate() {
        let y = inner.y + 2 + i as u16;
        if y >= inner.y + inner.height.saturating_sub(1) {
            break;
        }
        let line = Line::from(Span::styled(text.as_str(), Style::default().fg(Color::White)));
        buf.set_line(inner.x, y, &line, inner.width);
    }

    buf.set_line(
        inner.x,
        inner.y + inner.height - 1,
        &hint_line("[y] Yes  [n/Esc] Cancel"),
        inner.width,
    );
}

fn render_message_dialog(title: &str, message: &str, area: Rect, buf: &mut Buffer) {
    let longest = message
        .lines()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0);
    let dialog_width = (longest.min(200) as u16 + 6)
        .max(30)
        .min(area.width.saturating_sub(4));
    let text_width = dialog_width.saturating_sub(4).max(1) as usize;
    // Wrapped line count, plus borders and hint.
    let wrapped: usize = message
        .lines()
        .map(|l| l.chars().count().max(1).div_ceil(text_width))
        .sum();
    let dialog_height = (wrapped.min(200) as u16 + 4).min(area.height.saturating_sub(2));
    let rect = DialogWidget::centered_rect(dialog_width, dialog_height, area);

    Clear.render(rect, buf);

    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .padding(Padding::horizontal(1));

    let inner = block.inner(rect);
    block.render(rect, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let body = Rect::new(inner.x, inner.y, inner.width, inner.height.saturating_sub(1));
    Paragraph::new(message.to_string())
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: true })
        .render(body, buf);

    if inner.height > 1 {
        buf.set_line(
            inner.x,
            inner.y + inner.height - 1,
            &hint_line("[Enter/Esc] Dismiss"),
            inner.width,
        );
    }
}

/// Reduce an HTML error page to readable text: tags dropped, block tags
/// turned into line breaks, common entities decoded.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::new();
    let mut tag = String::new();
    let mut in_tag = false;
    for c in html.chars() {
        match (in_tag, c) {
            (false, '<') => {
                in_tag = true;
                tag.clear();
            }
            (true, '>') => {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .next()
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if matches!(
                    name.as_str(),
                    "br" | "p" | "div" | "h1" | "h2" | "h3" | "li" | "tr" | "pre"
                ) {
                    out.push('\n');
                }
            }
            (true, c) => tag.push(c),
            (false, c) => out.push(c),
        }
    }
    let decoded = out
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    decoded
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Rotation;
    use crate::components::testing::buffer_to_string;

    fn render(mode: &AppMode, state: &DialogState) -> String {
        let widget = DialogWidget::new(mode, state);
        let area = Rect::new(0, 0, 80, 24);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        buffer_to_string(&buf, area)
    }

    #[test]
    fn test_open_path_dialog_renders() {
        let mode = AppMode::Dialog(DialogKind::OpenPath);
        let state = DialogState {
            input: "/2019/a.jpg".to_string(),
            cursor_position: 11,
        };
        let content = render(&mode, &state);
        assert!(content.contains("Open Path"));
        assert!(content.contains("/2019/a.jpg"));
        assert!(content.contains("[Enter] Confirm"));
    }

    #[test]
    fn test_caption_dialog_shows_text_path() {
        let mode = AppMode::Dialog(DialogKind::EditCaption {
            folder: true,
            mutation: Mutation::Caption {
                path: "/2019".into(),
                text_path: "/2019/summary.txt".into(),
                text: "Summer".into(),
            },
        });
        let state = DialogState {
            input: "Summer".to_string(),
            cursor_position: 2,
        };
        let content = render(&mode, &state);
        assert!(content.contains("Folder Caption"));
        assert!(content.contains("/2019/summary.txt"));
        assert!(content.contains("Summer"));
    }

    #[test]
    fn test_cursor_on_multibyte_char() {
        let mode = AppMode::Dialog(DialogKind::NewTab);
        let state = DialogState {
            input: "päth".to_string(),
            cursor_position: 1,
        };
        let content = render(&mode, &state);
        assert!(content.contains("päth"));
    }

    #[test]
    fn test_drop_dialog_renders() {
        let mode = AppMode::Dialog(DialogKind::DropConfirm {
            mutation: Mutation::Drop {
                path: "/best.mpr/a.jpg".into(),
                index_file: "/best.mpr".into(),
                item: "2019/a.jpg".into(),
            },
        });
        let content = render(&mode, &DialogState::default());
        assert!(content.contains("Drop from Index"));
        assert!(content.contains("2019/a.jpg"));
        assert!(content.contains("from /best.mpr"));
        assert!(content.contains("[y] Yes"));
    }

    #[test]
    fn test_drop_dialog_other_mutation_falls_back_to_path() {
        let mode = AppMode::Dialog(DialogKind::DropConfirm {
            mutation: Mutation::Rotate {
                path: "/a.jpg".into(),
                index_file: "/index.mpr".into(),
                item: "a.jpg".into(),
                rotation: Rotation::Right,
            },
        });
        let content = render(&mode, &DialogState::default());
        assert!(content.contains("/a.jpg"));
    }

    #[test]
    fn test_message_dialog_renders() {
        let mode = AppMode::Dialog(DialogKind::Message(DialogContent::Text(
            "Could not load /broken: HTTP 404: no such directory".into(),
        )));
        let content = render(&mode, &DialogState::default());
        assert!(content.contains("Message"));
        assert!(content.contains("Could not load /broken"));
    }

    #[test]
    fn test_html_message_is_stripped() {
        let mode = AppMode::Dialog(DialogKind::Message(DialogContent::Html(
            "<html><body><h1>Forbidden</h1><p>Token &amp; cookie missing</p></body></html>"
                .into(),
        )));
        let content = render(&mode, &DialogState::default());
        assert!(content.contains("Server"));
        assert!(content.contains("Forbidden"));
        assert!(content.contains("Token & cookie missing"));
        assert!(!content.contains("<h1>"));
    }

    #[test]
    fn test_html_to_text() {
        assert_eq!(
            html_to_text("<p>a &lt;b&gt;</p><br/>c   d"),
            "a <b>\nc d"
        );
        assert_eq!(html_to_text("plain"), "plain");
    }

    #[test]
    fn test_no_dialog_mode_noop() {
        let content = render(&AppMode::Normal, &DialogState::default());
        assert!(content.trim().is_empty());
    }
}
