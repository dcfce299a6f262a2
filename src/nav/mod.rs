//! Navigation tree engine.
//!
//! `store` holds the flattened tree and `cursor` moves a selection over it,
//! loading folders as it goes. The remaining modules hang off the cursor:
//! alias bookkeeping, confirmed edits, look-ahead preloading and sharing the
//! location with other tabs.

pub mod alias;
pub mod crosstab;
pub mod cursor;
pub mod link;
pub mod mutation;
pub mod preload;
pub mod row;
pub mod store;

pub use cursor::{DialogContent, LoadRequest, NavEvent, Navigator, Step, Toggle};
pub use mutation::Mutation;
