//! Look-ahead image windows.
//!
//! Two slots run side by side: a small one refilled on every direct
//! selection, and a wider one refilled while stepping through files. A slot
//! holds one entry per position; positions that land on a container or off
//! the end of the tree hold nothing.

use super::row::Row;
use super::store::TreeStore;
use crate::api::encode_path;

/// Size the viewer wants images scaled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// One image worth fetching ahead of time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadImage {
    pub path: String,
    pub url: String,
    pub caption: String,
    pub version: u32,
}

impl PreloadImage {
    pub fn from_row(row: &Row, viewport: Option<Viewport>) -> Self {
        Self {
            path: row.content_path().to_string(),
            url: image_url(row, viewport),
            caption: row.text_without_flags.clone(),
            version: row.version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn offset(self, index: usize, steps: usize) -> Option<usize> {
        match self {
            Direction::Forward => index.checked_add(steps),
            Direction::Backward => index.checked_sub(steps),
        }
    }
}

/// Which slot a refill targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Selection,
    Navigation,
}

#[derive(Debug, Default)]
struct SlotState {
    window: usize,
    direction: Option<Direction>,
    entries: Vec<Option<PreloadImage>>,
}

/// Server URL for a row's image. Zoomed rows are fetched unscaled; a
/// non-zero version defeats caches after rotations.
pub fn image_url(row: &Row, viewport: Option<Viewport>) -> String {
    let mut params = Vec::new();
    if let (false, Some(v)) = (row.zoom, viewport) {
        params.push(format!("w={}", v.width));
        params.push(format!("h={}", v.height));
    }
    if row.version != 0 {
        params.push(format!("_={}", row.version));
    }
    let base = format!("/api/image{}", encode_path(row.content_path()));
    if params.is_empty() {
        base
    } else {
        format!("{}?{}", base, params.join("&"))
    }
}

/// Resolve `count` positions starting one step from `index`.
pub fn preload_n(
    store: &TreeStore,
    index: usize,
    count: usize,
    direction: Direction,
    viewport: Option<Viewport>,
) -> Vec<Option<PreloadImage>> {
    (1..=count)
        .map(|step| {
            direction
                .offset(index, step)
                .and_then(|i| store.row_at(i))
                .filter(|row| row.is_file())
                .map(|row| PreloadImage::from_row(row, viewport))
        })
        .collect()
}

/// The two preload windows.
#[derive(Debug)]
pub struct PreloadScheduler {
    selection: SlotState,
    navigation: SlotState,
}

impl PreloadScheduler {
    pub fn new(selection_window: usize, navigation_window: usize) -> Self {
        Self {
            selection: SlotState {
                window: selection_window,
                ..Default::default()
            },
            navigation: SlotState {
                window: navigation_window,
                ..Default::default()
            },
        }
    }

    /// Refill `slot` around `index` and return the images that were not
    /// already waiting in it.
    pub fn refill(
        &mut self,
        slot: Slot,
        store: &TreeStore,
        index: usize,
        direction: Direction,
        viewport: Option<Viewport>,
    ) -> Vec<PreloadImage> {
        let state = self.slot_mut(slot);
        let entries = preload_n(store, index, state.window, direction, viewport);
        let fresh = entries
            .iter()
            .flatten()
            .filter(|img| !state.entries.iter().flatten().any(|old| old.url == img.url))
            .cloned()
            .collect();
        state.entries = entries;
        state.direction = Some(direction);
        fresh
    }

    pub fn entries(&self, slot: Slot) -> &[Option<PreloadImage>] {
        &self.slot(slot).entries
    }

    pub fn direction(&self, slot: Slot) -> Option<Direction> {
        self.slot(slot).direction
    }

    /// Every image currently held by either slot.
    pub fn pending(&self) -> impl Iterator<Item = &PreloadImage> {
        self.selection
            .entries
            .iter()
            .chain(self.navigation.entries.iter())
            .flatten()
    }

    fn slot(&self, slot: Slot) -> &SlotState {
        match slot {
            Slot::Selection => &self.selection,
            Slot::Navigation => &self.navigation,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut SlotState {
        match slot {
            Slot::Selection => &mut self.selection,
            Slot::Navigation => &mut self.navigation,
        }
    }
}
