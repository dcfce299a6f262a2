//! Selection and traversal over the flattened tree.
//!
//! Every operation runs synchronously against the store. When one needs a
//! listing it returns [`Step::Load`]; the caller fetches it and hands the
//! result to [`Navigator::complete_load`], which re-resolves the container
//! by path and resumes whatever navigation was in progress. Only one such
//! navigation is tracked at a time and any explicit user action replaces it.

use tokio::sync::mpsc::UnboundedSender;

use super::preload::{image_url, Direction, PreloadImage, PreloadScheduler, Slot, Viewport};
use super::row::{parent_of, rows_from_listing, Row};
use super::store::{ListingMeta, RowId, TreeStore};
#[cfg(test)]
use crate::api::Backend;
use crate::api::Listing;
use crate::error::{ApiError, NavError};

/// Body of a dialog the host should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogContent {
    Text(String),
    Html(String),
}

/// What the viewer shows for the selected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageView {
    /// Real location of the image.
    pub path: String,
    /// Row path in the tree.
    pub tree_path: String,
    pub name: String,
    pub url: String,
    pub caption: String,
    pub text_error: String,
    pub version: u32,
    pub zoom: bool,
    pub size_label: String,
    pub mod_time_str: String,
}

impl ImageView {
    fn from_row(row: &Row, viewport: Option<Viewport>) -> Self {
        Self {
            path: row.content_path().to_string(),
            tree_path: row.path.clone(),
            name: row.name.clone(),
            url: image_url(row, viewport),
            caption: row.text_without_flags.clone(),
            text_error: row.text_error.clone(),
            version: row.version,
            zoom: row.zoom,
            size_label: row.size_label(),
            mod_time_str: row.mod_time_str.clone(),
        }
    }
}

/// Notifications from the engine to its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    /// The selection moved. `location` is the alias-aware path, or `None`
    /// when nothing is selected.
    SelectionChanged { location: Option<String> },
    /// The active image changed (see [`Navigator::image`]).
    ImageChanged,
    /// Fetch this image ahead of time.
    Preload(PreloadImage),
    ShowDialog(DialogContent),
    /// An image failed to load; the session may have expired.
    CheckLogin,
    LoginState(bool),
}

/// A listing the engine is waiting for. `dir` is `""` for the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub dir: String,
}

impl LoadRequest {
    pub fn root() -> Self {
        Self { dir: String::new() }
    }
}

/// Outcome of a navigation operation.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Done,
    /// Fetch this listing and pass it to [`Navigator::complete_load`].
    Load(LoadRequest),
    /// Blocked on a listing that is already in flight.
    Waiting,
}

/// Outcome of [`Navigator::toggle_current`].
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    Collapsed { delta: isize },
    Load(LoadRequest),
    Waiting,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Intent {
    NextFile,
    PreviousFile,
    OpenPath(String),
}

/// Where a caption edit should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTarget {
    /// Row path of the item.
    pub path: String,
    pub text_path: String,
    pub text: String,
}

/// Navigation state for one tab.
pub struct Navigator {
    store: TreeStore,
    selected: Option<RowId>,
    intent: Option<Intent>,
    preload: PreloadScheduler,
    image: Option<ImageView>,
    location: Option<String>,
    root_pending: bool,
    viewport: Option<Viewport>,
    logged_in: bool,
    /// Index of the first visible row.
    pub scroll_offset: usize,
    events: UnboundedSender<NavEvent>,
}

impl Navigator {
    pub fn new(preload: PreloadScheduler, events: UnboundedSender<NavEvent>) -> Self {
        Self {
            store: TreeStore::new(),
            selected: None,
            intent: None,
            preload,
            image: None,
            location: None,
            root_pending: false,
            viewport: None,
            logged_in: true,
            scroll_offset: 0,
            events,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut TreeStore {
        &mut self.store
    }

    pub fn selected_id(&self) -> Option<RowId> {
        self.selected
    }

    /// Position of the selection, derived from its row id.
    pub fn selected_index(&self) -> Option<usize> {
        self.selected.and_then(|id| self.store.position(id))
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.selected.and_then(|id| self.store.get(id))
    }

    pub fn image(&self) -> Option<&ImageView> {
        self.image.as_ref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn preload(&self) -> &PreloadScheduler {
        &self.preload
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Whether any listing is in flight.
    pub fn is_loading(&self) -> bool {
        self.root_pending || self.store.iter().any(|(_, r)| r.pending)
    }

    /// Whether a multi-step navigation is still in progress.
    pub fn is_navigating(&self) -> bool {
        self.intent.is_some()
    }

    // ── Loading ────────────────────────────────────────────────────

    /// Request the root listing.
    pub fn start(&mut self) -> Step {
        self.root_pending = true;
        Step::Load(LoadRequest::root())
    }

    /// Feed a finished listing back in and continue any pending navigation.
    pub fn complete_load(
        &mut self,
        request: LoadRequest,
        result: Result<Listing, ApiError>,
    ) -> Step {
        if request.dir.is_empty() {
            self.root_pending = false;
        } else {
            self.store.set_pending(&request.dir, false);
        }

        let listing = match result {
            Ok(listing) => listing,
            Err(err) if err.is_auth() => {
                tracing::warn!(dir = %request.dir, %err, "listing needs login");
                self.intent = None;
                self.set_logged_in(false);
                return Step::Done;
            }
            Err(err) => {
                tracing::error!(dir = %request.dir, %err, "listing failed");
                self.intent = None;
                self.emit(NavEvent::ShowDialog(failure_dialog(&request.dir, &err)));
                return Step::Done;
            }
        };
        self.set_logged_in(true);

        let meta = ListingMeta {
            index_name: listing.index_name.clone(),
            filtered: listing.is_filtered(),
        };
        let rows = rows_from_listing(&request.dir, listing);
        if request.dir.is_empty() {
            self.store.set_root(rows);
            if self.selected.take().is_some() {
                self.selection_changed();
            }
        } else {
            match self.store.expand(&request.dir, rows, meta) {
                Ok(expanded) => {
                    tracing::debug!(dir = %request.dir, rows = expanded.inserted, "expanded");
                    if self.selected.is_some_and(|id| expanded.replaced.contains(&id)) {
                        self.selected = None;
                        self.selection_changed();
                    }
                }
                Err(err) => tracing::warn!(%err, "dropping listing"),
            }
        }
        self.resume()
    }

    /// Await listings until `step` settles.
    #[cfg(test)]
    pub async fn drive(&mut self, backend: &dyn Backend, mut step: Step) {
        while let Step::Load(request) = step {
            let result = backend.list(&request.dir).await;
            step = self.complete_load(request, result);
        }
    }

    // ── Selection ──────────────────────────────────────────────────

    /// Select the row at `index`.
    pub fn select_at(&mut self, index: usize) -> Result<(), NavError> {
        if index >= self.store.len() {
            return Err(NavError::OutOfRange {
                index,
                len: self.store.len(),
            });
        }
        self.intent = None;
        self.select_index(index, Some((Slot::Selection, Direction::Forward)));
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.intent = None;
        self.selected = None;
        self.selection_changed();
    }

    pub fn select_first(&mut self) {
        if !self.store.is_empty() {
            self.intent = None;
            self.select_index(0, Some((Slot::Selection, Direction::Forward)));
        }
    }

    pub fn select_last(&mut self) {
        if let Some(last) = self.store.len().checked_sub(1) {
            self.intent = None;
            self.select_index(last, Some((Slot::Selection, Direction::Backward)));
        }
    }

    /// Step forward. From a file this keeps going until the next file,
    /// opening folders on the way; from a folder it moves one row.
    pub fn select_next(&mut self) -> Step {
        self.intent = None;
        let Some(i) = self.selected_index() else {
            return Step::Done;
        };
        if i + 1 >= self.store.len() {
            return Step::Done;
        }
        if self.store.row_at(i).is_some_and(Row::is_container) {
            self.select_index(i + 1, Some((Slot::Navigation, Direction::Forward)));
            return Step::Done;
        }
        self.intent = Some(Intent::NextFile);
        self.resume()
    }

    /// Step backward, mirroring [`select_next`](Self::select_next).
    pub fn select_previous(&mut self) -> Step {
        self.intent = None;
        let Some(i) = self.selected_index() else {
            return Step::Done;
        };
        if i == 0 {
            return Step::Done;
        }
        if self.store.row_at(i).is_some_and(Row::is_container) {
            self.select_index(i - 1, Some((Slot::Navigation, Direction::Backward)));
            return Step::Done;
        }
        self.intent = Some(Intent::PreviousFile);
        self.resume()
    }

    /// Nearest row before `index` that is a file or a collapsed container.
    pub fn find_previous_unexpanded_or_file(&self, index: usize) -> Option<usize> {
        (0..index.min(self.store.len())).rev().find(|&i| {
            self.store
                .row_at(i)
                .is_some_and(|r| r.is_file() || !r.expanded)
        })
    }

    /// Expand or collapse the selected container.
    pub fn toggle_current(&mut self) -> Toggle {
        self.intent = None;
        let Some(i) = self.selected_index() else {
            return Toggle::Unchanged;
        };
        let Some(row) = self.store.row_at(i) else {
            return Toggle::Unchanged;
        };
        if !row.is_container() {
            return Toggle::Unchanged;
        }
        if row.expanded {
            let removed = self.store.collapse(i);
            return Toggle::Collapsed {
                delta: -(removed.len() as isize),
            };
        }
        if row.pending {
            return Toggle::Waiting;
        }
        let dir = row.path.clone();
        self.store.set_pending(&dir, true);
        Toggle::Load(LoadRequest { dir })
    }

    /// Toggle and wait for any listing. Returns the change in row count.
    #[cfg(test)]
    pub async fn toggle_current_with(&mut self, backend: &dyn Backend) -> isize {
        let before = self.store.len() as isize;
        match self.toggle_current() {
            Toggle::Collapsed { delta } => delta,
            Toggle::Load(request) => {
                let result = backend.list(&request.dir).await;
                let step = self.complete_load(request, result);
                self.drive(backend, step).await;
                self.store.len() as isize - before
            }
            Toggle::Waiting | Toggle::Unchanged => 0,
        }
    }

    /// Open every ancestor of `path` and select it.
    pub fn open_path(&mut self, path: &str) -> Result<Step, NavError> {
        if !path.starts_with('/') {
            return Err(NavError::MalformedPath(path.to_string()));
        }
        self.intent = Some(Intent::OpenPath(path.to_string()));
        Ok(self.resume())
    }

    // ── Viewer ─────────────────────────────────────────────────────

    /// Flip unscaled display of the selected file.
    pub fn toggle_zoom(&mut self) -> bool {
        let Some(row) = self.selected.and_then(|id| self.store.get_mut(id)) else {
            return false;
        };
        if !row.is_file() {
            return false;
        }
        row.zoom = !row.zoom;
        self.refresh_image();
        true
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.viewport != Some(viewport) {
            self.viewport = Some(viewport);
            self.refresh_image();
        }
    }

    /// The active image failed to load.
    pub fn report_image_error(&mut self) {
        self.emit(NavEvent::CheckLogin);
    }

    pub fn set_logged_in(&mut self, logged_in: bool) {
        if self.logged_in != logged_in {
            self.logged_in = logged_in;
            self.emit(NavEvent::LoginState(logged_in));
        }
    }

    /// Caption file for the selected image, or for its folder.
    pub fn caption_target(&self, folder: bool) -> Result<CaptionTarget, NavError> {
        let index = self.selected_index().ok_or(NavError::NoSelection)?;
        let selected = self.store.row_at(index).ok_or(NavError::NoSelection)?;
        let row = if !folder {
            if !selected.is_file() {
                return Err(NavError::NotAFile(selected.path.clone()));
            }
            selected
        } else if selected.is_container() {
            selected
        } else {
            (0..index)
                .rev()
                .filter_map(|i| self.store.row_at(i))
                .find(|r| r.level < selected.level)
                .ok_or_else(|| NavError::NotFound(parent_of(&selected.path).to_string()))?
        };
        Ok(CaptionTarget {
            path: row.path.clone(),
            text_path: row.text_path(),
            text: row.text.clone(),
        })
    }

    /// Keep the selection inside a window of `visible_height` rows.
    pub fn update_scroll(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }
        let selected = self.selected_index().unwrap_or(0);
        if selected < self.scroll_offset {
            self.scroll_offset = selected;
        } else if selected >= self.scroll_offset + visible_height {
            self.scroll_offset = selected - visible_height + 1;
        }
    }

    // ── Internals ──────────────────────────────────────────────────

    pub(crate) fn emit(&self, event: NavEvent) {
        // The host may already be gone during shutdown.
        let _ = self.events.send(event);
    }

    /// Recompute the active image from the selection.
    pub(crate) fn refresh_image(&mut self) {
        let view = self
            .selected
            .and_then(|id| self.store.get(id))
            .filter(|r| r.is_file())
            .map(|r| ImageView::from_row(r, self.viewport));
        if view != self.image {
            self.image = view;
            self.emit(NavEvent::ImageChanged);
        }
    }

    /// Point the selection at `index` after the row that was there went
    /// away, or clear it if the tree ran out.
    pub(crate) fn reselect_near(&mut self, index: usize) {
        match self.store.len().checked_sub(1) {
            Some(last) => self.select_index(index.min(last), None),
            None => {
                self.selected = None;
                self.selection_changed();
            }
        }
    }

    fn select_index(&mut self, index: usize, preload: Option<(Slot, Direction)>) {
        let Some(id) = self.store.id_at(index) else {
            return;
        };
        self.selected = Some(id);
        self.selection_changed();
        if let Some((slot, direction)) = preload {
            let fresh = self
                .preload
                .refill(slot, &self.store, index, direction, self.viewport);
            for image in fresh {
                self.emit(NavEvent::Preload(image));
            }
        }
    }

    fn selection_changed(&mut self) {
        self.location = self.selected_row().map(Row::identity);
        self.refresh_image();
        self.emit(NavEvent::SelectionChanged {
            location: self.location.clone(),
        });
    }

    fn resume(&mut self) -> Step {
        match self.intent.clone() {
            None => Step::Done,
            Some(Intent::NextFile) => self.step_next_file(),
            Some(Intent::PreviousFile) => self.step_previous_file(),
            Some(Intent::OpenPath(path)) => self.step_open_path(&path),
        }
    }

    fn finish(&mut self) -> Step {
        self.intent = None;
        Step::Done
    }

    /// Start a listing for the container at `index`, unless one is running.
    fn load_at(&mut self, index: usize) -> Step {
        let Some(row) = self.store.row_at(index) else {
            return self.finish();
        };
        if row.pending {
            return Step::Waiting;
        }
        let dir = row.path.clone();
        self.store.set_pending(&dir, true);
        Step::Load(LoadRequest { dir })
    }

    fn step_next_file(&mut self) -> Step {
        let Some(mut i) = self.selected_index() else {
            return self.finish();
        };
        loop {
            let j = i + 1;
            let Some(row) = self.store.row_at(j) else {
                return self.finish();
            };
            if row.is_file() {
                self.intent = None;
                self.select_index(j, Some((Slot::Navigation, Direction::Forward)));
                return Step::Done;
            }
            if row.expanded {
                i = j;
                continue;
            }
            // Park on the folder while its listing loads.
            self.select_index(j, None);
            return self.load_at(j);
        }
    }

    fn step_previous_file(&mut self) -> Step {
        let Some(i) = self.selected_index() else {
            return self.finish();
        };
        let Some(j) = self.find_previous_unexpanded_or_file(i) else {
            return self.finish();
        };
        if self.store.row_at(j).is_some_and(Row::is_file) {
            self.intent = None;
            self.select_index(j, Some((Slot::Navigation, Direction::Backward)));
            return Step::Done;
        }
        self.load_at(j)
    }

    fn step_open_path(&mut self, path: &str) -> Step {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            self.intent = None;
            self.selected = None;
            self.selection_changed();
            return Step::Done;
        }
        let mut prefix = String::new();
        for (depth, segment) in segments.iter().enumerate() {
            prefix.push('/');
            prefix.push_str(segment);
            let Some(index) = self.store.find_by_path(&prefix) else {
                if self.is_loading() {
                    return Step::Waiting;
                }
                tracing::warn!(%path, missing = %prefix, "cannot open path");
                return self.finish();
            };
            if depth + 1 == segments.len() {
                self.intent = None;
                self.select_index(index, Some((Slot::Selection, Direction::Forward)));
                return Step::Done;
            }
            let Some(row) = self.store.row_at(index) else {
                return self.finish();
            };
            if !row.is_container() {
                tracing::warn!(%path, file = %prefix, "path runs through a file");
                return self.finish();
            }
            if !row.expanded {
                return self.load_at(index);
            }
        }
        self.finish()
    }
}

/// Error pages served as HTML are shown as such.
fn failure_dialog(dir: &str, err: &ApiError) -> DialogContent {
    match err {
        ApiError::Http { message, .. } if message.starts_with('<') => {
            DialogContent::Html(message.clone())
        }
        _ => {
            let dir = if dir.is_empty() { "/" } else { dir };
            DialogContent::Text(format!("Could not load {}: {}", dir, err))
        }
    }
}
