// Data models for the checklist

use serde::{Deserialize, Serialize};

/// One checklist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

impl Item {
    /// Create an incomplete item. `text` is expected to be trimmed and non-empty.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            completed: false,
        }
    }
}

/// Result of editing an item's text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Text replaced with a different value
    Updated,
    /// New text equal to the current text
    Unchanged,
    /// Blank text; the item was deleted
    Removed,
    /// No item with that id
    NotFound,
}

/// Summary of a snapshot import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Items now in the list
    pub imported: usize,
    /// Entries skipped because they had no usable text
    pub dropped: usize,
    /// Entries kept but given a fresh id
    pub regenerated_ids: usize,
}
