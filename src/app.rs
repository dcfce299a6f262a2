use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use ratatui::layout::Rect;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;

use crate::api::{Backend, Listing, Rotation};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::event::Event;
use crate::nav::crosstab::{ChannelHub, CrossTab, PeerMessage, TabId};
use crate::nav::link::LinkParams;
use crate::nav::preload::PreloadScheduler;
use crate::nav::{DialogContent, LoadRequest, Mutation, NavEvent, Navigator, Step, Toggle};

/// The kind of dialog being displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogKind {
    /// Server-supplied or error text.
    Message(DialogContent),
    /// Edits the caption planned when the editor opened, wherever the
    /// selection moves in the meantime.
    EditCaption {
        folder: bool,
        mutation: Mutation,
    },
    DropConfirm {
        mutation: Mutation,
    },
    OpenPath,
    /// Query string for a new tab.
    NewTab,
}

/// Application mode.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum AppMode {
    #[default]
    Normal,
    Dialog(DialogKind),
}

/// State for a dialog's text input.
#[derive(Debug, Default)]
pub struct DialogState {
    pub input: String,
    pub cursor_position: usize,
}

/// A transient message in the status bar.
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
    created: Instant,
}

/// Warm-up progress of a preloaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmState {
    Pending,
    Ready,
    Failed,
}

/// One independent view of the server, with its own tree and channels.
pub struct Tab {
    pub id: TabId,
    pub nav: Navigator,
    pub cross: CrossTab,
    nav_rx: UnboundedReceiver<NavEvent>,
    pub warm: HashMap<String, WarmState>,
    follower: Option<JoinHandle<()>>,
}

impl Tab {
    /// Deep link reproducing this tab.
    pub fn link(&self) -> LinkParams {
        LinkParams {
            path: self.nav.location().map(str::to_string),
            publish: self.cross.publish_channel().map(str::to_string),
            subscribe: self.cross.subscribe_channel().map(str::to_string),
        }
    }

    /// Forget warm-up state for images no longer shown or preloaded.
    fn prune_warm(&mut self) {
        let active = self.nav.image().map(|v| v.url.clone());
        let preload = self.nav.preload();
        self.warm.retain(|url, _| {
            active.as_deref() == Some(url.as_str()) || preload.pending().any(|p| &p.url == url)
        });
    }
}

impl Drop for Tab {
    fn drop(&mut self) {
        if let Some(follower) = self.follower.take() {
            follower.abort();
        }
    }
}

/// Main application state.
pub struct App {
    pub tabs: Vec<Tab>,
    pub active: usize,
    next_tab_id: TabId,
    backend: Arc<dyn Backend>,
    hub: ChannelHub,
    events: UnboundedSender<Event>,
    warm_pool: Arc<Semaphore>,
    config: AppConfig,
    in_flight: usize,
    /// Tree panel area from the last draw, for mouse hits.
    pub tree_area: Rect,
    pub should_quit: bool,
    pub mode: AppMode,
    pub dialog_state: DialogState,
    pub status_message: Option<StatusMessage>,
}

impl App {
    /// Create an App with no tabs. Network results come back on `events`.
    pub fn new(backend: Arc<dyn Backend>, config: AppConfig, events: UnboundedSender<Event>) -> Self {
        let warm_pool = Arc::new(Semaphore::new(config.max_in_flight()));
        Self {
            tabs: Vec::new(),
            active: 0,
            next_tab_id: 1,
            backend,
            hub: ChannelHub::new(),
            events,
            warm_pool,
            config,
            in_flight: 0,
            tree_area: Rect::default(),
            should_quit: false,
            mode: AppMode::Normal,
            dialog_state: DialogState::default(),
            status_message: None,
        }
    }

    // ── Tabs ───────────────────────────────────────────────────────

    /// Open a tab from deep-link parameters and make it active.
    pub fn open_tab(&mut self, link: LinkParams) -> TabId {
        let id = self.next_tab_id;
        self.next_tab_id += 1;

        let (nav_tx, nav_rx) = mpsc::unbounded_channel();
        let preload = PreloadScheduler::new(
            self.config.selection_window(),
            self.config.navigation_window(),
        );
        let mut nav = Navigator::new(preload, nav_tx);
        nav.set_viewport(self.config.viewport());

        let (cross, rx) = CrossTab::new(&self.hub, id, link.publish.clone(), link.subscribe.clone());
        let follower = rx.map(|rx| self.spawn_follower(id, rx));

        let start = nav.start();
        let open = match link.path.as_deref() {
            Some(path) => match nav.open_path(path) {
                Ok(step) => Some(step),
                Err(err) => {
                    tracing::warn!(tab = id, %err, "ignoring link path");
                    self.set_error_message(err.to_string());
                    None
                }
            },
            None => None,
        };

        self.tabs.push(Tab {
            id,
            nav,
            cross,
            nav_rx,
            warm: HashMap::new(),
            follower,
        });
        self.active = self.tabs.len() - 1;
        tracing::info!(tab = id, link = %link.to_query(), "tab opened");

        self.dispatch(id, start);
        if let Some(step) = open {
            self.dispatch(id, step);
        }
        id
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tabs.get(self.active)
    }

    pub fn active_tab_mut(&mut self) -> Option<&mut Tab> {
        self.tabs.get_mut(self.active)
    }

    fn tab_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    pub fn next_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active = (self.active + 1) % self.tabs.len();
        }
    }

    /// Close the active tab. The last tab stays open.
    pub fn close_active_tab(&mut self) {
        if self.tabs.len() <= 1 {
            self.set_error_message("Cannot close the last tab".into());
            return;
        }
        let tab = self.tabs.remove(self.active);
        tracing::info!(tab = tab.id, "tab closed");
        self.active = self.active.min(self.tabs.len() - 1);
        self.set_status_message(format!("Closed tab {}", tab.id));
    }

    /// Run `f` against the active tab's navigator.
    fn with_active<R>(&mut self, f: impl FnOnce(&mut Navigator) -> R) -> Option<(TabId, R)> {
        let tab = self.tabs.get_mut(self.active)?;
        Some((tab.id, f(&mut tab.nav)))
    }

    // ── Navigation ─────────────────────────────────────────────────

    pub fn select_next(&mut self) {
        if let Some((id, step)) = self.with_active(Navigator::select_next) {
            self.dispatch(id, step);
        }
    }

    pub fn select_previous(&mut self) {
        if let Some((id, step)) = self.with_active(Navigator::select_previous) {
            self.dispatch(id, step);
        }
    }

    pub fn select_first(&mut self) {
        self.with_active(Navigator::select_first);
    }

    pub fn select_last(&mut self) {
        self.with_active(Navigator::select_last);
    }

    /// Select the row at `offset` below the top of the tree panel.
    pub fn select_visible_row(&mut self, offset: usize) {
        let result = self.with_active(|nav| nav.select_at(nav.scroll_offset + offset));
        if let Some((_, Err(err))) = result {
            tracing::debug!(%err, "click outside the tree");
        }
    }

    pub fn toggle_current(&mut self) {
        match self.with_active(Navigator::toggle_current) {
            Some((id, Toggle::Load(request))) => self.spawn_load(id, request),
            Some((_, Toggle::Collapsed { delta })) => tracing::debug!(delta, "collapsed"),
            Some((_, Toggle::Waiting)) => self.set_status_message("Still loading…".into()),
            Some((_, Toggle::Unchanged)) | None => {}
        }
    }

    pub fn toggle_zoom(&mut self) {
        self.with_active(Navigator::toggle_zoom);
    }

    // ── Mutations ──────────────────────────────────────────────────

    pub fn rotate(&mut self, rotation: Rotation) {
        match self.with_active(|nav| nav.plan_rotate(rotation)) {
            Some((id, Ok(mutation))) => self.spawn_mutation(id, mutation),
            Some((_, Err(err))) => self.set_error_message(err.to_string()),
            None => {}
        }
    }

    /// Open the caption editor for the selected image or its folder.
    pub fn begin_caption_edit(&mut self, folder: bool) {
        match self.with_active(|nav| nav.plan_caption(folder)) {
            Some((_, Ok(mutation))) => {
                self.open_dialog(DialogKind::EditCaption { folder, mutation })
            }
            Some((_, Err(err))) => self.set_error_message(err.to_string()),
            None => {}
        }
    }

    /// Ask before dropping the selected file from its index.
    pub fn request_drop(&mut self) {
        match self.with_active(|nav| nav.plan_drop()) {
            Some((_, Ok(mutation))) => self.open_dialog(DialogKind::DropConfirm { mutation }),
            Some((_, Err(err))) => self.set_error_message(err.to_string()),
            None => {}
        }
    }

    // ── Dialogs ────────────────────────────────────────────────────

    /// Open a dialog of the given kind.
    pub fn open_dialog(&mut self, kind: DialogKind) {
        self.dialog_state = DialogState::default();
        if let DialogKind::EditCaption {
            mutation: Mutation::Caption { ref text, .. },
            ..
        } = kind
        {
            self.dialog_state.input = text.clone();
            self.dialog_state.cursor_position = text.len();
        }
        self.mode = AppMode::Dialog(kind);
    }

    /// Close the current dialog and return to normal mode.
    pub fn close_dialog(&mut self) {
        self.mode = AppMode::Normal;
        self.dialog_state = DialogState::default();
    }

    /// Show a message dialog. Showing the message already on screen hides it.
    pub fn show_message(&mut self, content: DialogContent) {
        let kind = DialogKind::Message(content);
        if self.mode == AppMode::Dialog(kind.clone()) {
            self.close_dialog();
        } else {
            self.open_dialog(kind);
        }
    }

    /// Act on the open dialog and close it.
    pub fn confirm_dialog(&mut self) {
        let AppMode::Dialog(kind) = std::mem::take(&mut self.mode) else {
            return;
        };
        let input = std::mem::take(&mut self.dialog_state.input);
        self.dialog_state = DialogState::default();

        match kind {
            DialogKind::Message(_) => {}
            DialogKind::EditCaption { mutation, .. } => {
                if let Some(id) = self.active_tab().map(|t| t.id) {
                    self.spawn_mutation(id, mutation.with_text(input));
                }
            }
            DialogKind::DropConfirm { mutation } => {
                if let Some(id) = self.active_tab().map(|t| t.id) {
                    self.spawn_mutation(id, mutation);
                }
            }
            DialogKind::OpenPath => match self.with_active(|nav| nav.open_path(input.trim())) {
                Some((id, Ok(step))) => self.dispatch(id, step),
                Some((_, Err(err))) => self.set_error_message(err.to_string()),
                None => {}
            },
            DialogKind::NewTab => {
                let link = LinkParams::parse(input.trim());
                self.open_tab(link);
            }
        }
    }

    /// Insert a character at the current cursor position.
    pub fn dialog_input_char(&mut self, c: char) {
        self.dialog_state
            .input
            .insert(self.dialog_state.cursor_position, c);
        self.dialog_state.cursor_position += c.len_utf8();
    }

    /// Delete the character before the cursor (backspace).
    pub fn dialog_delete_char(&mut self) {
        let byte_pos = self.dialog_state.cursor_position;
        if let Some(prev_char) = self.dialog_state.input[..byte_pos].chars().next_back() {
            self.dialog_state.cursor_position -= prev_char.len_utf8();
            self.dialog_state
                .input
                .remove(self.dialog_state.cursor_position);
        }
    }

    pub fn dialog_move_cursor_left(&mut self) {
        if let Some(prev_char) = self.dialog_state.input[..self.dialog_state.cursor_position]
            .chars()
            .next_back()
        {
            self.dialog_state.cursor_position -= prev_char.len_utf8();
        }
    }

    pub fn dialog_move_cursor_right(&mut self) {
        if let Some(next_char) = self.dialog_state.input[self.dialog_state.cursor_position..]
            .chars()
            .next()
        {
            self.dialog_state.cursor_position += next_char.len_utf8();
        }
    }

    pub fn dialog_cursor_home(&mut self) {
        self.dialog_state.cursor_position = 0;
    }

    pub fn dialog_cursor_end(&mut self) {
        self.dialog_state.cursor_position = self.dialog_state.input.len();
    }

    // ── Status ─────────────────────────────────────────────────────

    /// Set a status message with current timestamp.
    pub fn set_status_message(&mut self, text: String) {
        self.status_message = Some(StatusMessage {
            text,
            is_error: false,
            created: Instant::now(),
        });
    }

    pub fn set_error_message(&mut self, text: String) {
        self.status_message = Some(StatusMessage {
            text,
            is_error: true,
            created: Instant::now(),
        });
    }

    /// Clear the status message if it has been displayed for more than 3 seconds.
    pub fn clear_expired_status(&mut self) {
        if let Some(ref msg) = self.status_message {
            if msg.created.elapsed().as_secs() > 3 {
                self.status_message = None;
            }
        }
    }

    /// Network requests not yet reported back.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Quit the application.
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    // ── Background results ─────────────────────────────────────────

    /// Apply a result reported by a spawned task, then react to whatever
    /// the engines emitted.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::ListingLoaded {
                tab,
                request,
                result,
            } => self.on_listing_loaded(tab, request, result),
            Event::MutationDone {
                tab,
                mutation,
                result,
            } => self.on_mutation_done(tab, mutation, result),
            Event::PeerLocation { tab, msg } => self.on_peer_location(tab, msg),
            Event::LoginStatus { tab, result } => self.on_login_status(tab, result),
            Event::ImageWarmed { tab, url, result } => self.on_image_warmed(tab, url, result),
            Event::Key(_) | Event::Mouse(_) | Event::Tick | Event::Resize(_, _) => {}
        }
        self.process_nav_events();
    }

    fn on_listing_loaded(
        &mut self,
        tab: TabId,
        request: LoadRequest,
        result: Result<Listing, ApiError>,
    ) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Some(t) = self.tab_mut(tab) else {
            tracing::debug!(tab, dir = %request.dir, "listing for a closed tab");
            return;
        };
        let step = t.nav.complete_load(request, result);
        self.dispatch(tab, step);
    }

    fn on_mutation_done(&mut self, tab: TabId, mutation: Mutation, result: Result<(), ApiError>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Some(t) = self.tab_mut(tab) else {
            return;
        };
        let outcome = match result {
            Ok(()) => t.nav.apply(&mutation).map_err(|err| {
                tracing::warn!(%err, "confirmed mutation no longer applies");
                err.to_string()
            }),
            Err(err) => {
                tracing::error!(mutation = %mutation.describe(), %err, "mutation rejected");
                if err.is_auth() {
                    t.nav.set_logged_in(false);
                }
                Err(format!("Could not {}: {}", mutation.describe(), err))
            }
        };
        match outcome {
            Ok(()) => self.set_status_message(format!("Done: {}", mutation.describe())),
            Err(msg) => self.set_error_message(msg),
        }
    }

    fn on_peer_location(&mut self, tab: TabId, msg: PeerMessage) {
        let Some(t) = self.tab_mut(tab) else {
            return;
        };
        let Some(target) = t.cross.accept(msg) else {
            return;
        };
        if t.nav.location() == target.as_deref() {
            t.cross.forget_received();
            return;
        }
        match target {
            Some(path) => match t.nav.open_path(&path) {
                Ok(step) => self.dispatch(tab, step),
                Err(err) => {
                    tracing::warn!(tab, %err, "ignoring peer location");
                    t.cross.forget_received();
                }
            },
            None => t.nav.clear_selection(),
        }
    }

    fn on_login_status(&mut self, tab: TabId, result: Result<bool, ApiError>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Some(t) = self.tab_mut(tab) else {
            return;
        };
        match result {
            Ok(logged_in) => t.nav.set_logged_in(logged_in),
            Err(err) => tracing::warn!(tab, %err, "login probe failed"),
        }
    }

    fn on_image_warmed(&mut self, tab: TabId, url: String, result: Result<(), ApiError>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Some(t) = self.tab_mut(tab) else {
            return;
        };
        if let Some(state) = t.warm.get_mut(&url) {
            *state = if result.is_ok() {
                WarmState::Ready
            } else {
                WarmState::Failed
            };
        }
        if let Err(err) = result {
            tracing::debug!(%url, %err, "image fetch failed");
            if t.nav.image().is_some_and(|v| v.url == url) {
                t.nav.report_image_error();
            }
        }
    }

    /// Drain every tab's engine events until they stop coming.
    pub fn process_nav_events(&mut self) {
        for i in 0..self.tabs.len() {
            loop {
                let mut pending = Vec::new();
                while let Ok(event) = self.tabs[i].nav_rx.try_recv() {
                    pending.push(event);
                }
                if pending.is_empty() {
                    break;
                }
                for event in pending {
                    self.on_nav_event(i, event);
                }
            }
            self.tabs[i].prune_warm();
        }
    }

    fn on_nav_event(&mut self, index: usize, event: NavEvent) {
        let id = self.tabs[index].id;
        match event {
            NavEvent::SelectionChanged { location } => {
                tracing::debug!(tab = id, ?location, "selection changed");
                self.tabs[index].cross.publish(location.as_deref());
            }
            NavEvent::ImageChanged => {
                if let Some(url) = self.tabs[index].nav.image().map(|v| v.url.clone()) {
                    self.spawn_warm(index, url);
                }
            }
            NavEvent::Preload(image) => self.spawn_warm(index, image.url),
            NavEvent::ShowDialog(content) => self.show_message(content),
            NavEvent::CheckLogin => self.spawn_login_probe(id),
            NavEvent::LoginState(true) => self.set_status_message("Logged in".into()),
            NavEvent::LoginState(false) => {
                self.set_error_message("Not logged in: set a token with --token".into())
            }
        }
    }

    // ── Spawned requests ───────────────────────────────────────────

    fn dispatch(&mut self, tab: TabId, step: Step) {
        match step {
            Step::Load(request) => self.spawn_load(tab, request),
            Step::Waiting | Step::Done => {}
        }
    }

    fn spawn_load(&mut self, tab: TabId, request: LoadRequest) {
        self.in_flight += 1;
        let backend = Arc::clone(&self.backend);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = backend.list(&request.dir).await;
            let _ = tx.send(Event::ListingLoaded {
                tab,
                request,
                result,
            });
        });
    }

    fn spawn_mutation(&mut self, tab: TabId, mutation: Mutation) {
        self.in_flight += 1;
        tracing::info!(tab, mutation = %mutation.describe(), "sending");
        let backend = Arc::clone(&self.backend);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = mutation.send(backend.as_ref()).await;
            let _ = tx.send(Event::MutationDone {
                tab,
                mutation,
                result,
            });
        });
    }

    fn spawn_login_probe(&mut self, tab: TabId) {
        self.in_flight += 1;
        let backend = Arc::clone(&self.backend);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = backend.login_status().await;
            let _ = tx.send(Event::LoginStatus { tab, result });
        });
    }

    /// Fetch an image through the bounded pool. Images already fetched or
    /// on their way are skipped.
    fn spawn_warm(&mut self, index: usize, url: String) {
        let tab = &mut self.tabs[index];
        if matches!(
            tab.warm.get(&url),
            Some(WarmState::Pending | WarmState::Ready)
        ) {
            return;
        }
        tab.warm.insert(url.clone(), WarmState::Pending);
        let id = tab.id;

        self.in_flight += 1;
        let backend = Arc::clone(&self.backend);
        let pool = Arc::clone(&self.warm_pool);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = match pool.acquire_owned().await {
                Ok(_permit) => backend.warm_image(&url).await,
                Err(_) => Err(ApiError::Transport("preload pool closed".into())),
            };
            let _ = tx.send(Event::ImageWarmed {
                tab: id,
                url,
                result,
            });
        });
    }

    /// Forward peer messages for `tab` onto the event channel.
    fn spawn_follower(
        &self,
        tab: TabId,
        mut rx: broadcast::Receiver<PeerMessage>,
    ) -> JoinHandle<()> {
        let tx = self.events.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(msg) => {
                        if tx.send(Event::PeerLocation { tab, msg }).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(tab, skipped, "peer channel lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
