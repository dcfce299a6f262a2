use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::api::Rotation;
use crate::app::{App, AppMode, DialogKind};

/// Handle a key event.
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }
    match app.mode.clone() {
        AppMode::Normal => handle_normal_key(app, key),
        AppMode::Dialog(kind) => handle_dialog_key(app, key, &kind),
    }
}

fn handle_normal_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
        KeyCode::Enter => app.toggle_current(),
        KeyCode::Char('g') | KeyCode::Home => app.select_first(),
        KeyCode::Char('G') | KeyCode::End => app.select_last(),
        KeyCode::Char('z') => app.toggle_zoom(),
        KeyCode::Char('r') => app.rotate(Rotation::Right),
        KeyCode::Char('R') => app.rotate(Rotation::Left),
        KeyCode::Char('f') => app.rotate(Rotation::Flip),
        KeyCode::Char('e') => app.begin_caption_edit(false),
        KeyCode::Char('E') => app.begin_caption_edit(true),
        KeyCode::Char('d') => app.request_drop(),
        KeyCode::Char('o') => app.open_dialog(DialogKind::OpenPath),
        KeyCode::Char('t') => app.open_dialog(DialogKind::NewTab),
        KeyCode::Tab => app.next_tab(),
        KeyCode::Char('w') => app.close_active_tab(),
        _ => {}
    }
}

fn handle_dialog_key(app: &mut App, key: KeyEvent, kind: &DialogKind) {
    match kind {
        DialogKind::Message(_) => {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q')) {
                app.close_dialog();
            }
        }
        DialogKind::DropConfirm { .. } => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => app.confirm_dialog(),
            KeyCode::Char('n') | KeyCode::Esc => app.close_dialog(),
            _ => {}
        },
        DialogKind::EditCaption { .. } | DialogKind::OpenPath | DialogKind::NewTab => {
            match key.code {
                KeyCode::Enter => app.confirm_dialog(),
                KeyCode::Esc => app.close_dialog(),
                KeyCode::Backspace => app.dialog_delete_char(),
                KeyCode::Left => app.dialog_move_cursor_left(),
                KeyCode::Right => app.dialog_move_cursor_right(),
                KeyCode::Home => app.dialog_cursor_home(),
                KeyCode::End => app.dialog_cursor_end(),
                KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    app.dialog_input_char(c)
                }
                _ => {}
            }
        }
    }
}

/// Handle a mouse event: click selects a tree row, the wheel steps.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    if app.mode != AppMode::Normal {
        return;
    }
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            let area = app.tree_area;
            let inside = mouse.column >= area.x
                && mouse.column < area.x + area.width
                && mouse.row >= area.y
                && mouse.row < area.y + area.height;
            if inside {
                app.select_visible_row(usize::from(mouse.row - area.y));
            }
        }
        MouseEventKind::ScrollDown => app.select_next(),
        MouseEventKind::ScrollUp => app.select_previous(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{dir, file, FakeBackend};
    use crate::config::AppConfig;
    use crate::event::Event;
    use crate::nav::link::LinkParams;
    use ratatui::layout::Rect;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn loaded_app() -> (App, UnboundedReceiver<Event>) {
        let backend = FakeBackend::new().with_dir("", vec![file("a.jpg"), file("b.jpg"), dir("sub")]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(Arc::new(backend), AppConfig::default(), tx);
        app.open_tab(LinkParams::default());
        while app.in_flight() > 0 {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            app.handle_event(event);
        }
        (app, rx)
    }

    fn location(app: &App) -> Option<String> {
        app.active_tab()
            .and_then(|t| t.nav.location())
            .map(str::to_string)
    }

    #[tokio::test]
    async fn quit_keys() {
        let (mut app, _rx) = loaded_app().await;
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(app.should_quit);

        let (mut app, _rx) = loaded_app().await;
        handle_key_event(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn movement_keys() {
        let (mut app, _rx) = loaded_app().await;
        handle_key_event(&mut app, key(KeyCode::Char('G')));
        assert_eq!(location(&app).as_deref(), Some("/sub"));
        handle_key_event(&mut app, key(KeyCode::Char('g')));
        assert_eq!(location(&app).as_deref(), Some("/a.jpg"));
        handle_key_event(&mut app, key(KeyCode::Char('j')));
        assert_eq!(location(&app).as_deref(), Some("/b.jpg"));
        handle_key_event(&mut app, key(KeyCode::Up));
        assert_eq!(location(&app).as_deref(), Some("/a.jpg"));
    }

    #[tokio::test]
    async fn zoom_key_flips_zoom() {
        let (mut app, _rx) = loaded_app().await;
        handle_key_event(&mut app, key(KeyCode::Char('g')));
        handle_key_event(&mut app, key(KeyCode::Char('z')));
        let image = app.active_tab().unwrap().nav.image().unwrap();
        assert!(image.zoom);
    }

    #[tokio::test]
    async fn typing_goes_to_open_dialog() {
        let (mut app, _rx) = loaded_app().await;
        handle_key_event(&mut app, key(KeyCode::Char('o')));
        assert_eq!(app.mode, AppMode::Dialog(DialogKind::OpenPath));
        for c in "/b.jpq".chars() {
            handle_key_event(&mut app, key(KeyCode::Char(c)));
        }
        // 'q' is text here, not quit.
        assert!(!app.should_quit);
        handle_key_event(&mut app, key(KeyCode::Backspace));
        handle_key_event(&mut app, key(KeyCode::Char('g')));
        assert_eq!(app.dialog_state.input, "/b.jpg");

        handle_key_event(&mut app, key(KeyCode::Enter));
        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(location(&app).as_deref(), Some("/b.jpg"));
    }

    #[tokio::test]
    async fn escape_cancels_drop() {
        let (mut app, _rx) = loaded_app().await;
        handle_key_event(&mut app, key(KeyCode::Char('g')));
        handle_key_event(&mut app, key(KeyCode::Char('d')));
        assert!(matches!(
            app.mode,
            AppMode::Dialog(DialogKind::DropConfirm { .. })
        ));
        handle_key_event(&mut app, key(KeyCode::Esc));
        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.in_flight(), 0);
    }

    #[tokio::test]
    async fn message_dialog_swallows_keys() {
        let (mut app, _rx) = loaded_app().await;
        app.show_message(crate::nav::DialogContent::Text("oops".into()));
        handle_key_event(&mut app, key(KeyCode::Char('j')));
        assert_eq!(location(&app), None);
        handle_key_event(&mut app, key(KeyCode::Esc));
        assert_eq!(app.mode, AppMode::Normal);
    }

    #[tokio::test]
    async fn click_selects_visible_row() {
        let (mut app, _rx) = loaded_app().await;
        app.tree_area = Rect::new(1, 1, 30, 10);
        let click = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 5,
            row: 2,
            modifiers: KeyModifiers::NONE,
        };
        handle_mouse_event(&mut app, click);
        assert_eq!(location(&app).as_deref(), Some("/b.jpg"));

        // Outside the tree: nothing happens.
        handle_mouse_event(
            &mut app,
            MouseEvent {
                row: 20,
                ..click
            },
        );
        assert_eq!(location(&app).as_deref(), Some("/b.jpg"));
    }

    #[tokio::test]
    async fn key_releases_are_ignored() {
        let (mut app, _rx) = loaded_app().await;
        let mut release = key(KeyCode::Char('q'));
        release.kind = KeyEventKind::Release;
        handle_key_event(&mut app, release);
        assert!(!app.should_quit);
    }
}
