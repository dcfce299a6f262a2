use super::store::{RowId, TreeStore};

/// Copy version and caption from `source` onto each of its aliases.
///
/// Returns the aliases that were updated.
pub fn sync_aliases(store: &mut TreeStore, source: RowId) -> Vec<RowId> {
    let Some(row) = store.get(source) else {
        return Vec::new();
    };
    let version = row.version;
    let text = row.text.clone();
    let text_without_flags = row.text_without_flags.clone();

    let aliases = store.aliases_of(source);
    for id in &aliases {
        if let Some(alias) = store.get_mut(*id) {
            alias.version = version;
            alias.text = text.clone();
            alias.text_without_flags = text_without_flags.clone();
        }
    }
    if !aliases.is_empty() {
        tracing::debug!(count = aliases.len(), version, "synced aliases");
    }
    aliases
}
