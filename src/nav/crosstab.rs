//! Sharing the viewing location between tabs over named channels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

/// Identifies a tab within the process.
pub type TabId = u64;

const CHANNEL_CAPACITY: usize = 64;

/// A location announced by a tab. `None` means it cleared its selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerMessage {
    pub origin: TabId,
    pub path: Option<String>,
}

/// Process-wide registry of named broadcast channels.
#[derive(Debug, Clone, Default)]
pub struct ChannelHub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<PeerMessage>>>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender for `name`, created on first use.
    pub fn channel(&self, name: &str) -> broadcast::Sender<PeerMessage> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

/// One tab's publish/subscribe configuration.
#[derive(Debug)]
pub struct CrossTab {
    id: TabId,
    publish: Option<(String, broadcast::Sender<PeerMessage>)>,
    subscribe: Option<String>,
    /// Location most recently accepted from a peer, not yet echoed.
    last_received: Option<Option<String>>,
}

impl CrossTab {
    /// Join the hub. Returns the receiver to poll when subscribed.
    pub fn new(
        hub: &ChannelHub,
        id: TabId,
        publish: Option<String>,
        subscribe: Option<String>,
    ) -> (Self, Option<broadcast::Receiver<PeerMessage>>) {
        let publish = publish
            .filter(|name| !name.is_empty())
            .map(|name| {
                let tx = hub.channel(&name);
                (name, tx)
            });
        let subscribe = subscribe.filter(|name| !name.is_empty());
        let rx = subscribe.as_deref().map(|name| hub.channel(name).subscribe());
        let tab = Self {
            id,
            publish,
            subscribe,
            last_received: None,
        };
        (tab, rx)
    }

    pub fn publish_channel(&self) -> Option<&str> {
        self.publish.as_ref().map(|(name, _)| name.as_str())
    }

    pub fn subscribe_channel(&self) -> Option<&str> {
        self.subscribe.as_deref()
    }

    fn loops_back(&self) -> bool {
        matches!((self.publish_channel(), self.subscribe_channel()), (Some(p), Some(s)) if p == s)
    }

    /// Announce a local selection change. Returns whether anything was sent.
    pub fn publish(&mut self, location: Option<&str>) -> bool {
        let received = self.last_received.take();
        let Some((name, tx)) = &self.publish else {
            return false;
        };
        if self.loops_back() && received.as_ref().map(|r| r.as_deref()) == Some(location) {
            tracing::trace!(channel = %name, ?location, "not echoing received location");
            return false;
        }
        let msg = PeerMessage {
            origin: self.id,
            path: location.map(str::to_string),
        };
        // No subscribers is not an error.
        let _ = tx.send(msg);
        true
    }

    /// Filter a message from the subscribe channel. Returns the location to
    /// follow, or `None` for messages this tab sent itself.
    pub fn accept(&mut self, msg: PeerMessage) -> Option<Option<String>> {
        if msg.origin == self.id {
            return None;
        }
        self.last_received = Some(msg.path.clone());
        Some(msg.path)
    }

    /// Drop the accepted location when following it changed nothing
    /// locally, so a later local move to it is still published.
    pub fn forget_received(&mut self) {
        self.last_received = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn hub_reuses_channels() {
        let hub = ChannelHub::new();
        let a = hub.channel("foo");
        let mut rx = hub.channel("foo").subscribe();
        a.send(PeerMessage { origin: 1, path: some("/x") }).unwrap();
        assert_eq!(rx.try_recv().unwrap().path, some("/x"));
    }

    #[test]
    fn publish_reaches_subscriber() {
        let hub = ChannelHub::new();
        let (mut sender, _) = CrossTab::new(&hub, 1, some("foo"), None);
        let (mut receiver, rx) = CrossTab::new(&hub, 2, None, some("foo"));
        let mut rx = rx.unwrap();

        assert!(sender.publish(Some("/2019/a.jpg")));
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.origin, 1);
        assert_eq!(receiver.accept(msg), Some(some("/2019/a.jpg")));
    }

    #[test]
    fn own_messages_are_ignored() {
        let hub = ChannelHub::new();
        let (mut tab, rx) = CrossTab::new(&hub, 7, some("foo"), some("foo"));
        let mut rx = rx.unwrap();
        tab.publish(Some("/a"));
        let msg = rx.try_recv().unwrap();
        assert_eq!(tab.accept(msg), None);
    }

    #[test]
    fn same_channel_does_not_echo_received_location() {
        let hub = ChannelHub::new();
        let (mut peer, _) = CrossTab::new(&hub, 1, some("foo"), None);
        let (mut tab, rx) = CrossTab::new(&hub, 2, some("foo"), some("foo"));
        let mut rx = rx.unwrap();

        peer.publish(Some("/a.jpg"));
        let msg = rx.try_recv().unwrap();
        assert_eq!(tab.accept(msg), Some(some("/a.jpg")));

        // Following the peer selects /a.jpg locally; that must not go back out.
        assert!(!tab.publish(Some("/a.jpg")));
        assert!(rx.try_recv().is_err());

        // The next local move is published again.
        assert!(tab.publish(Some("/b.jpg")));
        assert_eq!(rx.try_recv().unwrap().path, some("/b.jpg"));
    }

    #[test]
    fn forgotten_location_is_published_again() {
        let hub = ChannelHub::new();
        let (mut tab, rx) = CrossTab::new(&hub, 2, some("foo"), some("foo"));
        let mut rx = rx.unwrap();
        tab.accept(PeerMessage { origin: 1, path: some("/a.jpg") });
        tab.forget_received();
        assert!(tab.publish(Some("/a.jpg")));
        assert_eq!(rx.try_recv().unwrap().path, some("/a.jpg"));
    }

    #[test]
    fn different_channels_forward_received_location() {
        let hub = ChannelHub::new();
        let (mut tab, _) = CrossTab::new(&hub, 2, some("out"), some("in"));
        let mut out = hub.channel("out").subscribe();
        tab.accept(PeerMessage { origin: 1, path: some("/a.jpg") });
        assert!(tab.publish(Some("/a.jpg")));
        assert_eq!(out.try_recv().unwrap().path, some("/a.jpg"));
    }

    #[test]
    fn cleared_selection_is_published_as_none() {
        let hub = ChannelHub::new();
        let (mut tab, _) = CrossTab::new(&hub, 1, some("foo"), None);
        let mut rx = hub.channel("foo").subscribe();
        assert!(tab.publish(None));
        assert_eq!(rx.try_recv().unwrap().path, None);
    }

    #[test]
    fn neither_channel_is_inert() {
        let hub = ChannelHub::new();
        let (mut tab, rx) = CrossTab::new(&hub, 1, None, Some(String::new()));
        assert!(rx.is_none());
        assert!(!tab.publish(Some("/a")));
        assert_eq!(tab.publish_channel(), None);
        assert_eq!(tab.subscribe_channel(), None);
    }
}
