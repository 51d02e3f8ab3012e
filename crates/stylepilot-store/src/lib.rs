//! # stylepilot-store
//!
//! Session-scoped key-value storage used by the agent loop to checkpoint
//! in-flight generations.
//!
//! Two backends share the [`StateStore`] trait:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  StateStore (get / set / remove)        │
//! ├────────────────────┬────────────────────┤
//! │  MemoryStateStore  │  SqliteStateStore  │
//! │  (moka, process)   │  (rusqlite, scoped)│
//! └────────────────────┴────────────────────┘
//! ```
//!
//! Values are arbitrary JSON documents. Both backends are ephemeral with
//! respect to the host session: the memory store dies with the process and
//! the SQLite store discards rows written under any other session scope
//! when it is opened.

pub mod db;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod state;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStateStore, MemoryStateStoreBuilder, StoreStats};
pub use sqlite::SqliteStateStore;
pub use state::StateStore;
