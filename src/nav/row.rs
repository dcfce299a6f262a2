use crate::api::{ListItem, Listing};

/// Name of the per-directory index file that holds rotations.
pub const DEFAULT_INDEX: &str = "index.mpr";
/// Caption file for a folder.
pub const FOLDER_TEXT: &str = "summary.txt";

/// Kind of tree row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    File,
    Directory,
    /// An index file; expands like a directory into the items it lists.
    Index,
}

/// Server-side content type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemType {
    Image,
    Video,
    Index,
    Other(String),
}

impl ItemType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "image" => ItemType::Image,
            "video" => ItemType::Video,
            "index" => ItemType::Index,
            other => ItemType::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ItemType::Image => "image",
            ItemType::Video => "video",
            ItemType::Index => "index",
            ItemType::Other(tag) => tag,
        }
    }
}

/// One node of the flattened tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Position in the tree: parent path + "/" + name.
    pub path: String,
    pub name: String,
    pub level: usize,
    pub kind: RowKind,
    pub expanded: bool,
    /// A listing for this container is in flight.
    pub pending: bool,
    pub size: u64,
    pub mod_time: i64,
    pub mod_time_str: String,
    pub item_type: ItemType,
    pub text: String,
    pub text_without_flags: String,
    pub text_error: String,
    pub version: u32,
    pub zoom: bool,
    /// Real location when the server listed it from somewhere else.
    pub item_path: Option<String>,
    pub index_path: Option<String>,
    pub index_entry: Option<String>,
    /// Index the last listing of this container came from.
    pub index_name: Option<String>,
    /// The last listing held fewer items than the directory does.
    pub filtered: bool,
}

impl Row {
    /// Build a row for `item` listed in `dir` (`""` for the root).
    pub fn from_item(dir: &str, item: ListItem) -> Self {
        let kind = if item.is_dir {
            RowKind::Directory
        } else if item.kind == "index" {
            RowKind::Index
        } else {
            RowKind::File
        };
        let text_without_flags = strip_flags(&item.text);
        Self {
            path: format!("{}/{}", dir, item.name),
            level: level_of(dir),
            kind,
            expanded: false,
            pending: false,
            size: item.size,
            mod_time: item.mod_time,
            mod_time_str: item.mod_time_str,
            item_type: ItemType::from_tag(&item.kind),
            text: item.text,
            text_without_flags,
            text_error: item.text_error,
            version: 0,
            zoom: false,
            item_path: non_empty(item.path),
            index_path: non_empty(item.index_path),
            index_entry: non_empty(item.index_entry),
            index_name: None,
            filtered: false,
            name: item.name,
        }
    }

    /// Whether this row can be expanded.
    pub fn is_container(&self) -> bool {
        matches!(self.kind, RowKind::Directory | RowKind::Index)
    }

    pub fn is_file(&self) -> bool {
        self.kind == RowKind::File
    }

    /// Path used for image and text requests.
    pub fn content_path(&self) -> &str {
        self.item_path.as_deref().unwrap_or(&self.path)
    }

    /// The alias-aware path: where the item really lives.
    ///
    /// Rows from a custom index resolve through their index coordinates,
    /// so every listing of one file yields the same identity.
    pub fn identity(&self) -> String {
        match (&self.index_path, &self.index_entry) {
            (Some(index_path), Some(entry)) => {
                clean_path(&format!("{}/{}", parent_of(index_path), entry))
            }
            _ => self.content_path().to_string(),
        }
    }

    /// Same item reached through a different level or index.
    pub fn is_alias_of(&self, other: &Row) -> bool {
        self.identity() == other.identity()
            && (self.level != other.level || self.index_path != other.index_path)
    }

    /// Replace the caption, keeping the flag-stripped copy in step.
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.text_without_flags = strip_flags(text);
        self.text_error.clear();
    }

    /// Caption file for this row: `<name>.txt` next to a file, or the
    /// folder summary for containers.
    pub fn text_path(&self) -> String {
        if self.is_container() {
            return format!("{}/{}", self.path, FOLDER_TEXT);
        }
        let path = self.content_path();
        let stem_end = match (path.rfind('.'), path.rfind('/')) {
            (Some(dot), Some(slash)) if dot > slash => dot,
            (Some(dot), None) => dot,
            _ => path.len(),
        };
        format!("{}.txt", &path[..stem_end])
    }

    /// Default index file and entry name used for rotations.
    pub fn default_index_target(&self) -> (String, String) {
        let path = self.content_path();
        let name = path.rsplit('/').next().unwrap_or(&self.name).to_string();
        (format!("{}/{}", parent_of(path), DEFAULT_INDEX), name)
    }

    /// Index file and entry this row was listed from.
    pub fn own_index_target(&self) -> (String, String) {
        match (&self.index_path, &self.index_entry) {
            (Some(index_path), Some(entry)) => (index_path.clone(), entry.clone()),
            _ => self.default_index_target(),
        }
    }

    /// Human-readable size, e.g. `999B`, `1.23K`, `45.6M`.
    pub fn size_label(&self) -> String {
        size_label(self.size)
    }
}

/// Map a listing of `dir` into rows, in server order.
pub fn rows_from_listing(dir: &str, listing: Listing) -> Vec<Row> {
    listing
        .items
        .into_iter()
        .map(|item| Row::from_item(dir, item))
        .collect()
}

/// Depth of the children of `dir`: one more than its slash count.
pub fn level_of(dir: &str) -> usize {
    dir.split('/').count()
}

/// Everything before the last slash (`""` for top-level paths).
pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// Drop leading `!flag` lines from a caption.
pub fn strip_flags(text: &str) -> String {
    let mut lines = text.split('\n').peekable();
    while let Some(line) = lines.peek() {
        if !line.starts_with('!') {
            break;
        }
        lines.next();
    }
    lines.collect::<Vec<_>>().join("\n")
}

/// Resolve `.` and `..` segments of an absolute path.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn size_label(size: u64) -> String {
    let s = size as f64;
    match size {
        0..=999 => format!("{}B", size),
        1_000..=9_999 => format!("{}K", trim_float((s / 10.0).round() / 100.0)),
        10_000..=99_999 => format!("{}K", trim_float((s / 100.0).round() / 10.0)),
        100_000..=999_999 => format!("{}K", (s / 1_000.0).round()),
        1_000_000..=9_999_999 => format!("{}M", trim_float((s / 10_000.0).round() / 100.0)),
        10_000_000..=99_999_999 => format!("{}M", trim_float((s / 100_000.0).round() / 10.0)),
        _ => format!("{}M", (s / 1_000_000.0).round()),
    }
}

fn trim_float(v: f64) -> String {
    let s = format!("{:.2}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
