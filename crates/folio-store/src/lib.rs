//! Persistence and the editor session for folio pages.
//!
//! # Architecture
//!
//! ```text
//! BlockStore (one per editing session, &mut self)
//!     ├── Vec<Block>            authoritative in-memory state
//!     ├── PayloadDebouncer      coalesces keystroke-rate payload edits
//!     └── SharedRecordStore     Arc<dyn RecordStore>
//!             ├── SqliteRecordStore   rusqlite, bundled SQLite
//!             └── MemoryRecordStore   tests, fault injection
//!
//! BlobStore (media uploads → URLs)
//!     ├── LocalBlobStore
//!     └── MemoryBlobStore
//! ```
//!
//! The ordering logic itself lives in `folio-blocks`; this crate owns state,
//! I/O, and configuration.

pub mod blob;
pub mod config;
pub mod debounce;
pub mod editor;
pub mod error;
pub mod memory;
pub mod public;
pub mod record;
pub mod sqlite;

pub use blob::{BlobEntry, BlobStore, LocalBlobStore, MemoryBlobStore, normalize_path};
pub use config::{CONFIG_ENV, EditorConfig, FolioConfig, default_config_path, default_data_dir};
pub use debounce::{DebounceConfig, PayloadDebouncer};
pub use editor::{
    Access, BlockEvent, BlockStore, DeletePolicy, EditorSettings, MutationOutcome, PendingWrite,
};
pub use error::{ConfigError, EditError, StoreError, StoreResult};
pub use memory::{MemoryRecordStore, WriteOp};
pub use public::{load_page_tree, load_published_page, navigation};
pub use record::{
    BlockPatch, BlockRecord, NewBlockRecord, NewPage, RecordStore, SharedRecordStore,
    records_to_blocks,
};
pub use sqlite::SqliteRecordStore;
