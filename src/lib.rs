// Checklist - ordered to-do list with key-value persistence and JSON snapshots

pub mod filter;
pub mod id;
pub mod kv;
pub mod models;
pub mod snapshot;
pub mod store;

// Re-export main types for convenience
pub use filter::FilterMode;
pub use id::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use kv::{FileStore, KeyValueStore, MemoryStore, SqliteStore};
pub use models::{EditOutcome, ImportReport, Item};
pub use snapshot::{PersistFormat, SnapshotFormat};
pub use store::{DEFAULT_KEY, ListStore, StoreOptions};
