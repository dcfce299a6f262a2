//! Remote content server interface.
//!
//! The engine only depends on the [`Backend`] trait. `client` talks HTTP to a
//! real server; `fake` is an in-memory stand-in for tests.

pub mod client;
#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::error::ApiError;

/// One entry of a directory (or index file) listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ListItem {
    pub name: String,
    /// Full API path when the item does not live in the listed directory.
    pub path: String,
    /// Index file the item was listed from, when not the default index.
    pub index_path: String,
    /// Item path relative to `index_path`.
    pub index_entry: String,
    pub is_dir: bool,
    pub size: u64,
    #[serde(rename = "Type")]
    pub kind: String,
    /// Seconds since the epoch.
    pub mod_time: i64,
    pub mod_time_str: String,
    pub text: String,
    pub text_error: String,
}

/// A full listing response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Listing {
    pub index_name: String,
    pub unfiltered_file_count: usize,
    #[serde(deserialize_with = "null_as_empty")]
    pub items: Vec<ListItem>,
}

impl Listing {
    /// Whether the server dropped entries that the directory actually holds.
    pub fn is_filtered(&self) -> bool {
        self.unfiltered_file_count != self.items.len()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoginStatus {
    pub logged_in: bool,
}

/// A relative rotation as understood by the index file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Right,
    Left,
    Flip,
}

impl Rotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rotation::Right => "+r",
            Rotation::Left => "-r",
            Rotation::Flip => "+rr",
        }
    }
}

/// An edit to one line of an index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    Rotate(Rotation),
    Drop,
}

impl IndexAction {
    pub fn action(&self) -> &'static str {
        match self {
            IndexAction::Rotate(_) => "deltarotation",
            IndexAction::Drop => "drop",
        }
    }

    pub fn value(&self) -> &'static str {
        match self {
            IndexAction::Rotate(r) => r.as_str(),
            IndexAction::Drop => "",
        }
    }
}

/// Everything the browser asks of the content server.
#[async_trait]
pub trait Backend: Send + Sync {
    /// List a directory or index file. `dir` is `""` for the root.
    async fn list(&self, dir: &str) -> Result<Listing, ApiError>;

    /// Replace a caption file. An empty `content` deletes it server-side.
    async fn put_text(&self, text_path: &str, content: &str) -> Result<(), ApiError>;

    /// Apply an action to `item` inside `index_file`.
    async fn update_index(
        &self,
        index_file: &str,
        item: &str,
        action: IndexAction,
    ) -> Result<(), ApiError>;

    /// Ask whether the current session is still valid.
    async fn login_status(&self) -> Result<bool, ApiError>;

    /// Fetch an image URL and discard the body, so the server and any cache
    /// between us have it ready.
    async fn warm_image(&self, url: &str) -> Result<(), ApiError>;
}

/// Go encodes empty slices as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Percent-encode each segment of an API path, keeping the slashes.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_parses_server_json() {
        let json = r#"{
            "IndexName": "index.mpr",
            "UnfilteredFileCount": 3,
            "Items": [
                {"Name": "a.jpg", "IsDir": false, "Size": 1234, "Type": "image",
                 "ModTime": 1500000000, "ModTimeStr": "1:00pm", "Text": "hi",
                 "TextError": "", "ExifDateTime": "0001-01-01T00:00:00Z"},
                {"Name": "sub", "IsDir": true}
            ]
        }"#;
        let listing: Listing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.index_name, "index.mpr");
        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.items[0].kind, "image");
        assert_eq!(listing.items[0].size, 1234);
        assert!(listing.items[1].is_dir);
        assert!(listing.is_filtered());
    }

    #[test]
    fn null_items_become_empty() {
        let listing: Listing =
            serde_json::from_str(r#"{"IndexName":"","UnfilteredFileCount":0,"Items":null}"#)
                .unwrap();
        assert!(listing.items.is_empty());
        assert!(!listing.is_filtered());
    }

    #[test]
    fn index_actions_map_to_form_values() {
        assert_eq!(IndexAction::Rotate(Rotation::Right).value(), "+r");
        assert_eq!(IndexAction::Rotate(Rotation::Flip).value(), "+rr");
        assert_eq!(IndexAction::Rotate(Rotation::Left).action(), "deltarotation");
        assert_eq!(IndexAction::Drop.action(), "drop");
    }

    #[test]
    fn encode_path_keeps_slashes() {
        assert_eq!(encode_path("/a b/c#d.jpg"), "/a%20b/c%23d.jpg");
        assert_eq!(encode_path(""), "");
    }
}
