use std::collections::HashMap;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget, Wrap},
};

use crate::app::WarmState;
use crate::nav::preload::{PreloadImage, Slot};
use crate::nav::Navigator;

/// Viewer panel: details of the active image and the look-ahead queue.
pub struct ViewerWidget<'a> {
    nav: &'a Navigator,
    warm: &'a HashMap<String, WarmState>,
    block: Option<Block<'a>>,
}

impl<'a> ViewerWidget<'a> {
    pub fn new(nav: &'a Navigator, warm: &'a HashMap<String, WarmState>) -> Self {
        Self {
            nav,
            warm,
            block: None,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = block.into();
        self
    }

    fn warm_marker(&self, url: &str) -> Span<'static> {
        match self.warm.get(url) {
            Some(WarmState::Ready) => Span::styled("✓", Style::default().fg(Color::Green)),
            Some(WarmState::Failed) => Span::styled("✗", Style::default().fg(Color::Red)),
            Some(WarmState::Pending) | None => {
                Span::styled("…", Style::default().fg(Color::DarkGray))
            }
        }
    }

    fn image_lines(&self) -> Vec<Line<'a>> {
        let label = Style::default().fg(Color::DarkGray);
        let Some(image) = self.nav.image() else {
            return vec![Line::from(Span::styled("No image selected", label))];
        };

        let mut lines = vec![
            Line::from(vec![
                Span::styled(
                    image.name.clone(),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
                self.warm_marker(&image.url),
            ]),
            Line::from(vec![
                Span::styled("path  ", label),
                Span::raw(image.path.clone()),
            ]),
        ];
        if image.tree_path != image.path {
            lines.push(Line::from(vec![
                Span::styled("via   ", label),
                Span::raw(image.tree_path.clone()),
            ]));
        }
        let kind = self
            .nav
            .selected_row()
            .map(|row| row.item_type.label())
            .unwrap_or_default();
        let details: Vec<&str> = [image.size_label.as_str(), image.mod_time_str.as_str(), kind]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect();
        lines.push(Line::from(vec![
            Span::styled("size  ", label),
            Span::raw(details.join("  ")),
        ]));
        let mut flags = Vec::new();
        if image.zoom {
            flags.push("zoom".to_string());
        }
        if image.version > 0 {
            flags.push(format!("v{}", image.version));
        }
        if !flags.is_empty() {
            lines.push(Line::from(vec![
                Span::styled("view  ", label),
                Span::raw(flags.join(" ")),
            ]));
        }
        lines.push(Line::from(vec![
            Span::styled("url   ", label),
            Span::styled(image.url.clone(), Style::default().fg(Color::Blue)),
        ]));
        lines.push(Line::default());

        if !image.text_error.is_empty() {
            lines.push(Line::from(Span::styled(
                image.text_error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else if !image.caption.is_empty() {
            for text in image.caption.lines() {
                lines.push(Line::from(Span::styled(
                    text.to_string(),
                    Style::default().fg(Color::Yellow),
                )));
            }
        }
        lines
    }

    fn preload_lines(&self) -> Vec<Line<'a>> {
        let queued: Vec<&PreloadImage> = [Slot::Selection, Slot::Navigation]
            .iter()
            .flat_map(|slot| self.nav.preload().entries(*slot).iter().flatten())
            .collect();
        if queued.is_empty() {
            return Vec::new();
        }
        let mut lines = vec![
            Line::default(),
            Line::from(Span::styled(
                "Preload",
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )),
        ];
        for image in queued {
            lines.push(Line::from(vec![
                self.warm_marker(&image.url),
                Span::raw(" "),
                Span::raw(image.path.clone()),
            ]));
        }
        lines
    }
}

impl<'a> Widget for ViewerWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let mut lines = self.image_lines();
        lines.extend(self.preload_lines());
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(inner, buf);
    }
}
