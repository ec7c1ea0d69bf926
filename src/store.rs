// Checklist store: an ordered item list persisted to a key-value store

use crate::filter::FilterMode;
use crate::id::IdGenerator;
use crate::kv::KeyValueStore;
use crate::models::{EditOutcome, ImportReport, Item};
use crate::snapshot::{self, PersistFormat, SnapshotFormat};
use eyre::{Context, Result, eyre};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Storage key used when none is configured
pub const DEFAULT_KEY: &str = "checklist";

/// Settings for a `ListStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Key the list is persisted under
    pub key: String,
    /// Encoding of the persisted value
    pub persist_format: PersistFormat,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            persist_format: PersistFormat::Pretty,
        }
    }
}

/// Ordered checklist, saved in full after every change
///
/// New items go to the front. Ids are unique within the list and text is
/// always trimmed and non-empty.
pub struct ListStore<K: KeyValueStore, G: IdGenerator> {
    items: Vec<Item>,
    kv: K,
    ids: G,
    options: StoreOptions,
}

impl<K: KeyValueStore, G: IdGenerator> ListStore<K, G> {
    /// Load the list persisted under `options.key`
    ///
    /// A missing or malformed value yields an empty list. Errors from the
    /// backend itself are returned.
    pub fn open(kv: K, mut ids: G, options: StoreOptions) -> Result<Self> {
        let raw = kv
            .load(&options.key)
            .with_context(|| format!("Failed to load persisted list '{}'", options.key))?;

        let items = match raw {
            None => {
                debug!(key = %options.key, "No persisted list, starting empty");
                Vec::new()
            }
            Some(bytes) => match snapshot::parse_snapshot(&bytes) {
                Ok(entries) => {
                    let (items, report) = snapshot::normalize(entries, &mut ids);
                    info!(
                        key = %options.key,
                        count = items.len(),
                        dropped = report.dropped,
                        "Loaded persisted list"
                    );
                    items
                }
                Err(e) => {
                    warn!(key = %options.key, error = ?e, "Persisted list is malformed, starting empty");
                    Vec::new()
                }
            },
        };

        Ok(Self {
            items,
            kv,
            ids,
            options,
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Index of the item with `id`
    pub fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items left to do
    pub fn active_count(&self) -> usize {
        self.items.iter().filter(|item| !item.completed).count()
    }

    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|item| item.completed).count()
    }

    /// Items visible under `mode`, in list order
    pub fn filter(&self, mode: FilterMode) -> Vec<&Item> {
        self.items.iter().filter(|item| mode.matches(item)).collect()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn backend(&self) -> &K {
        &self.kv
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Prepend a new item. Blank text is ignored.
    pub fn add(&mut self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let mut taken = self.taken_ids();
        let id = snapshot::fresh_id(&mut self.ids, &mut taken);
        self.items.insert(0, Item::new(id.clone(), text));
        debug!(id = %id, count = self.items.len(), "add");

        self.persist();
        Some(id)
    }

    /// Prepend one item per non-blank line, keeping line order
    pub fn add_bulk(&mut self, text: &str) -> Vec<String> {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|line| !line.is_empty()).collect();
        if lines.is_empty() {
            return Vec::new();
        }

        let mut taken = self.taken_ids();
        let new_items: Vec<Item> = lines
            .into_iter()
            .map(|line| Item::new(snapshot::fresh_id(&mut self.ids, &mut taken), line))
            .collect();
        let new_ids: Vec<String> = new_items.iter().map(|item| item.id.clone()).collect();

        self.items.splice(0..0, new_items);
        debug!(added = new_ids.len(), count = self.items.len(), "add_bulk");

        self.persist();
        new_ids
    }

    /// Delete the item with `id`. Returns false if there was none.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };

        self.items.remove(index);
        debug!(id, count = self.items.len(), "remove");

        self.persist();
        true
    }

    /// Flip `completed`, returning the new value
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let item = self.items.iter_mut().find(|item| item.id == id)?;
        item.completed = !item.completed;
        let completed = item.completed;
        debug!(id, completed, "toggle");

        self.persist();
        Some(completed)
    }

    /// Replace the text of `id`; blank text deletes the item
    pub fn edit(&mut self, id: &str, new_text: &str) -> EditOutcome {
        let new_text = new_text.trim();
        if new_text.is_empty() {
            return if self.remove(id) {
                EditOutcome::Removed
            } else {
                EditOutcome::NotFound
            };
        }

        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            return EditOutcome::NotFound;
        };
        if item.text == new_text {
            return EditOutcome::Unchanged;
        }

        item.text = new_text.to_string();
        debug!(id, "edit");

        self.persist();
        EditOutcome::Updated
    }

    /// Delete every completed item, returning how many went
    pub fn clear_completed(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !item.completed);
        let removed = before - self.items.len();

        if removed > 0 {
            debug!(removed, count = self.items.len(), "clear_completed");
            self.persist();
        }
        removed
    }

    /// Move the item at `from` to `to`, shifting the ones between
    ///
    /// Both indices must be below `len()`; otherwise the list is left alone
    /// and an error is returned.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.items.len();
        if from >= len {
            return Err(eyre!("Reorder source index {} out of bounds (len {})", from, len));
        }
        if to >= len {
            return Err(eyre!("Reorder target index {} out of bounds (len {})", to, len));
        }
        if from == to {
            return Ok(());
        }

        let item = self.items.remove(from);
        self.items.insert(to, item);
        debug!(from, to, "reorder");

        self.persist();
        Ok(())
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Pretty-printed JSON of the whole list
    pub fn export_snapshot(&self) -> Result<String> {
        snapshot::to_pretty(&self.items)
    }

    pub fn export_snapshot_as(&self, format: SnapshotFormat) -> Result<String> {
        snapshot::encode(&self.items, format)
    }

    /// Replace the whole list with a JSON snapshot
    ///
    /// On error the current list is kept as is.
    pub fn import_snapshot(&mut self, bytes: &[u8]) -> Result<ImportReport> {
        self.import_snapshot_as(bytes, SnapshotFormat::Json)
    }

    pub fn import_snapshot_as(&mut self, bytes: &[u8], format: SnapshotFormat) -> Result<ImportReport> {
        let entries = snapshot::decode(bytes, format).context("Import failed")?;
        let (items, report) = snapshot::normalize(entries, &mut self.ids);

        self.items = items;
        info!(
            imported = report.imported,
            dropped = report.dropped,
            regenerated_ids = report.regenerated_ids,
            "Imported snapshot"
        );

        self.persist();
        Ok(report)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write the full list to the backing store
    pub fn save(&mut self) -> Result<()> {
        let encoded = match self.options.persist_format {
            PersistFormat::Pretty => snapshot::to_pretty(&self.items)?,
            PersistFormat::Compact => snapshot::to_compact(&self.items)?,
        };

        self.kv
            .save(&self.options.key, encoded.as_bytes())
            .with_context(|| format!("Failed to save list '{}'", self.options.key))
    }

    fn persist(&mut self) {
        if let Err(e) = self.save() {
            warn!(key = %self.options.key, error = ?e, "Failed to persist list");
        }
    }

    fn taken_ids(&self) -> HashSet<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}
