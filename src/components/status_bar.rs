use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

const KEY_HINTS: &str = " o:open t:tab e:caption r:rotate d:drop q:quit ";

/// Status bar: tab strip, deep link, login state and key hints, or a
/// transient message across the whole width.
pub struct StatusBarWidget<'a> {
    link: &'a str,
    logged_in: bool,
    tabs: &'a [String],
    active_tab: usize,
    busy: bool,
    status_message: Option<&'a str>,
    is_error: bool,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(link: &'a str, logged_in: bool) -> Self {
        Self {
            link,
            logged_in,
            tabs: &[],
            active_tab: 0,
            busy: false,
            status_message: None,
            is_error: false,
        }
    }

    pub fn tabs(mut self, tabs: &'a [String], active: usize) -> Self {
        self.tabs = tabs;
        self.active_tab = active;
        self
    }

    /// Show a spinner-ish marker while requests are outstanding.
    pub fn busy(mut self, busy: bool) -> Self {
        self.busy = busy;
        self
    }

    pub fn status_message(mut self, msg: &'a str, is_error: bool) -> Self {
        self.status_message = Some(msg);
        self.is_error = is_error;
        self
    }
}

impl<'a> Widget for StatusBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let width = area.width as usize;

        if let Some(msg) = self.status_message {
            let style = if self.is_error {
                Style::default().bg(Color::Red).fg(Color::White)
            } else {
                Style::default().fg(Color::Green)
            };
            let display: String = msg.chars().take(width).collect();
            let display = format!("{:<width$}", display, width = width);
            let line = Line::from(Span::styled(display, style));
            buf.set_line(area.x, area.y, &line, area.width);
            return;
        }

        let mut spans = Vec::new();
        if self.tabs.len() > 1 {
            for (i, label) in self.tabs.iter().enumerate() {
                let style = if i == self.active_tab {
                    Style::default()
                        .bg(Color::Cyan)
                        .fg(Color::Black)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Cyan)
                };
                spans.push(Span::styled(format!(" {} ", label), style));
            }
            spans.push(Span::raw(" "));
        }

        let (login, login_style) = if self.logged_in {
            ("● online", Style::default().fg(Color::Green))
        } else {
            (
                "○ logged out",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )
        };
        let busy = if self.busy { "⟳ " } else { "" };

        let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
        let right_len = busy.chars().count() + login.chars().count() + KEY_HINTS.len();
        let link_budget = width.saturating_sub(used + right_len + 1);

        // Keep the end of the link; it names the selected file.
        let link = if self.link.is_empty() {
            String::new()
        } else {
            format!("?{}", self.link)
        };
        let link_len = link.chars().count();
        let link_display = if link_len > link_budget {
            let keep = link_budget.saturating_sub(1);
            let tail: String = link.chars().skip(link_len - keep).collect();
            if link_budget > 0 {
                format!("…{}", tail)
            } else {
                String::new()
            }
        } else {
            link
        };
        let gap = link_budget.saturating_sub(link_display.chars().count()) + 1;

        spans.push(Span::styled(link_display, Style::default().fg(Color::White)));
        spans.push(Span::raw(" ".repeat(gap)));
        spans.push(Span::styled(busy, Style::default().fg(Color::Yellow)));
        spans.push(Span::styled(login, login_style));
        spans.push(Span::styled(
            KEY_HINTS,
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::DIM),
        ));

        let line = Line::from(spans);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}
