use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Backend, IndexAction, ListItem, Listing};
use crate::error::ApiError;

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(String),
    PutText(String, String),
    UpdateIndex(String, String, IndexAction),
    LoginStatus,
    Warm(String),
}

/// In-memory backend with canned listings.
#[derive(Default)]
pub struct FakeBackend {
    listings: HashMap<String, Result<Listing, ApiError>>,
    fail_mutations: Option<ApiError>,
    fail_images: bool,
    pub calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `items` for `dir` (`""` is the root).
    pub fn with_dir(mut self, dir: &str, items: Vec<ListItem>) -> Self {
        let listing = Listing {
            index_name: String::new(),
            unfiltered_file_count: items.len(),
            items,
        };
        self.listings.insert(dir.to_string(), Ok(listing));
        self
    }

    pub fn with_error(mut self, dir: &str, err: ApiError) -> Self {
        self.listings.insert(dir.to_string(), Err(err));
        self
    }

    pub fn failing_mutations(mut self, err: ApiError) -> Self {
        self.fail_mutations = Some(err);
        self
    }

    /// Every image fetch fails with a 403.
    pub fn failing_images(mut self) -> Self {
        self.fail_images = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::List(dir) => Some(dir),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn mutation_result(&self) -> Result<(), ApiError> {
        match &self.fail_mutations {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn list(&self, dir: &str) -> Result<Listing, ApiError> {
        self.record(Call::List(dir.to_string()));
        self.listings
            .get(dir)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::from_status(404, "no such directory")))
    }

    async fn put_text(&self, text_path: &str, content: &str) -> Result<(), ApiError> {
        self.record(Call::PutText(text_path.to_string(), content.to_string()));
        self.mutation_result()
    }

    async fn update_index(
        &self,
        index_file: &str,
        item: &str,
        action: IndexAction,
    ) -> Result<(), ApiError> {
        self.record(Call::UpdateIndex(
            index_file.to_string(),
            item.to_string(),
            action,
        ));
        self.mutation_result()
    }

    async fn login_status(&self) -> Result<bool, ApiError> {
        self.record(Call::LoginStatus);
        Ok(self.fail_mutations.is_none())
    }

    async fn warm_image(&self, url: &str) -> Result<(), ApiError> {
        self.record(Call::Warm(url.to_string()));
        if self.fail_images {
            return Err(ApiError::from_status(403, "forbidden"));
        }
        Ok(())
    }
}

/// A plain image entry.
pub fn file(name: &str) -> ListItem {
    ListItem {
        name: name.to_string(),
        kind: "image".to_string(),
        size: 2048,
        ..Default::default()
    }
}

/// A directory entry.
pub fn dir(name: &str) -> ListItem {
    ListItem {
        name: name.to_string(),
        is_dir: true,
        ..Default::default()
    }
}

/// An entry listed from a custom index file, pointing at `real_path`.
pub fn indexed(name: &str, index_path: &str, entry: &str, real_path: &str) -> ListItem {
    ListItem {
        name: name.to_string(),
        path: real_path.to_string(),
        index_path: index_path.to_string(),
        index_entry: entry.to_string(),
        kind: "image".to_string(),
        ..Default::default()
    }
}
