use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders},
    Frame,
};

use crate::app::{App, AppMode};
use crate::components::dialog::DialogWidget;
use crate::components::status_bar::StatusBarWidget;
use crate::components::tree::TreeWidget;
use crate::components::viewer::ViewerWidget;

/// Render the application UI.
pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let [main, status] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .areas(area);
    let [tree_area, viewer_area] = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .areas(main);

    let focused = Style::default().fg(Color::Cyan);
    let tree_block = Block::default()
        .borders(Borders::ALL)
        .border_style(focused);
    app.tree_area = tree_block.inner(tree_area);
    let visible_height = app.tree_area.height as usize;

    let labels: Vec<String> = app.tabs.iter().map(|t| t.id.to_string()).collect();
    let active = app.active;
    let busy = app.in_flight() > 0;
    let link;
    let logged_in;

    if let Some(tab) = app.active_tab_mut() {
        tab.nav.update_scroll(visible_height);
        let tab = &*tab;

        let title = match tab.nav.location() {
            Some(location) => format!(" {} ", location),
            None => " / ".to_string(),
        };
        frame.render_widget(
            TreeWidget::new(&tab.nav).block(tree_block.title(title)),
            tree_area,
        );
        frame.render_widget(
            ViewerWidget::new(&tab.nav, &tab.warm)
                .block(Block::default().borders(Borders::ALL).title(" Viewer ")),
            viewer_area,
        );
        link = tab.link().to_query();
        logged_in = tab.nav.logged_in();
    } else {
        frame.render_widget(tree_block, tree_area);
        link = String::new();
        logged_in = true;
    }

    let mut status_bar = StatusBarWidget::new(&link, logged_in)
        .tabs(&labels, active)
        .busy(busy);
    if let Some(msg) = &app.status_message {
        status_bar = status_bar.status_message(&msg.text, msg.is_error);
    }
    frame.render_widget(status_bar, status);

    if app.mode != AppMode::Normal {
        frame.render_widget(DialogWidget::new(&app.mode, &app.dialog_state), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{dir, file, FakeBackend};
    use crate::app::DialogKind;
    use crate::config::AppConfig;
    use crate::nav::link::LinkParams;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn loaded_app() -> App {
        let backend = FakeBackend::new().with_dir("", vec![file("a.jpg"), dir("sub")]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(Arc::new(backend), AppConfig::default(), tx);
        app.open_tab(LinkParams::parse("path=/a.jpg&publish=wall"));
        while app.in_flight() > 0 {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            app.handle_event(event);
        }
        app
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buf = terminal.backend().buffer().clone();
        crate::components::testing::buffer_to_string(&buf, buf.area)
    }

    #[tokio::test]
    async fn test_full_layout() {
        let mut app = loaded_app().await;
        app.status_message = None;
        let content = draw(&mut app);
        assert!(content.contains(" /a.jpg "));
        assert!(content.contains("Viewer"));
        assert!(content.contains("?path=/a.jpg&publish=wall"));
        assert!(content.contains("● online"));
        assert_eq!(app.tree_area.x, 1);
        assert_eq!(app.tree_area.y, 1);
    }

    #[tokio::test]
    async fn test_dialog_drawn_on_top() {
        let mut app = loaded_app().await;
        app.open_dialog(DialogKind::OpenPath);
        let content = draw(&mut app);
        assert!(content.contains("Open Path"));
    }

    #[test]
    fn test_no_tabs_does_not_panic() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(Arc::new(FakeBackend::new()), AppConfig::default(), tx);
        let content = draw(&mut app);
        assert!(content.contains("online"));
    }
}
