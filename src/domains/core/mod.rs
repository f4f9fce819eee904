pub mod collection;
pub mod repository;
pub mod sqlite_storage;
pub mod storage;

pub use collection::{Change, CollectionStore};
pub use repository::{AddOutcome, CollectionKey, DeleteOutcome, SyncMeta, Syncable, UpdateOutcome};
pub use sqlite_storage::SqliteKeyValueStorage;
pub use storage::{KeyValueStorage, MemoryKeyValueStorage};
