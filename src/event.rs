use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, MouseEvent};
use tokio::sync::mpsc;

use crate::api::Listing;
use crate::error::{ApiError, Result};
use crate::nav::crosstab::{PeerMessage, TabId};
use crate::nav::{LoadRequest, Mutation};

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// A key press event.
    Key(KeyEvent),
    /// A mouse event.
    Mouse(MouseEvent),
    /// A periodic tick for rendering.
    Tick,
    /// Terminal resize event.
    Resize(u16, u16),
    /// A listing requested by a tab came back.
    ListingLoaded {
        tab: TabId,
        request: LoadRequest,
        result: std::result::Result<Listing, ApiError>,
    },
    /// The server answered a mutation.
    MutationDone {
        tab: TabId,
        mutation: Mutation,
        result: std::result::Result<(), ApiError>,
    },
    /// A peer tab announced a location on a channel this tab follows.
    PeerLocation { tab: TabId, msg: PeerMessage },
    /// Answer to a login probe.
    LoginStatus {
        tab: TabId,
        result: std::result::Result<bool, ApiError>,
    },
    /// A preload warm-up request finished.
    ImageWarmed {
        tab: TabId,
        url: String,
        result: std::result::Result<(), ApiError>,
    },
}

/// Async event handler that polls crossterm events and forwards them via a channel.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Create a new EventHandler with the given tick rate.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::spawn(async move {
            loop {
                // crossterm polling blocks; keep it off the async workers.
                let polled = tokio::task::spawn_blocking(move || {
                    if event::poll(tick_rate).unwrap_or(false) {
                        event::read().ok()
                    } else {
                        None
                    }
                })
                .await;

                let event = match polled {
                    Ok(Some(CrosstermEvent::Key(key))) => Event::Key(key),
                    Ok(Some(CrosstermEvent::Mouse(mouse))) => Event::Mouse(mouse),
                    Ok(Some(CrosstermEvent::Resize(w, h))) => Event::Resize(w, h),
                    Ok(Some(_)) => continue,
                    Ok(None) => Event::Tick,
                    Err(_) => break,
                };
                if event_tx.send(event).is_err() {
                    break;
                }
            }
        });

        Self { rx, tx }
    }

    /// Get a sender clone for network tasks to report back on.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event (blocks until available).
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| crate::error::AppError::Terminal("Event channel closed".into()))
    }
}
