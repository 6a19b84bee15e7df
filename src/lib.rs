//! Chunked, append-only row storage for buffering intermediate query results.
//!
//! Rows are appended into column-oriented [`Chunk`]s owned by a [`RowStore`].
//! Each append returns a [`RowPtr`] for random access; [`RowStore::walk`] and
//! [`RowStore::iter`] scan rows in append order. Chunks retired by
//! [`RowStore::reset`] are recycled, and memory is reported to a shared
//! [`MemTracker`] once per chunk.

pub mod chunk;
pub mod cli;
pub mod config;
pub mod error;
pub mod growth;
pub mod input;
pub mod output;
pub mod store;
pub mod tracker;
pub mod types;

pub use chunk::{Chunk, Row};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use growth::{Doubling, Fixed, GrowthPolicy};
pub use store::{MAX_ADDRESSABLE, ROW_PTR_SIZE, RowPtr, RowStore};
pub use tracker::MemTracker;
pub use types::{ColumnType, Datum, DatumRef, Schema};
