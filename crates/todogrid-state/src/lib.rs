//! todogrid-state — embedded document store for todogrid.
//!
//! Backed by [redb](https://docs.rs/redb). Holds two collections, `todos`
//! and `tableconfigs`, as JSON-serialized documents, plus a small `meta`
//! table with id counters and the active-config pointer.
//!
//! # Architecture
//!
//! ```text
//! StateStore (Arc<Database>, Clone + Send + Sync)
//!   ├── schema.rs   Table Schema Manager (active config, column ops)
//!   ├── rows.rs     Row Store Façade (CRUD, bulk column set/unset)
//!   └── reindex.rs  Reindexer + dead-letter log
//! ```
//!
//! Every read-modify-write runs inside one redb write transaction. redb
//! admits a single writer at a time, so serial-number assignment, the
//! duplicate field-key check and config seeding cannot interleave.

pub mod error;
pub mod reindex;
pub mod rows;
pub mod schema;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use reindex::{DeadLetterLog, ReindexFailure, ReindexReport, Reindexer, RowSource};
pub use schema::DedupeReport;
pub use store::StateStore;
pub use types::*;
