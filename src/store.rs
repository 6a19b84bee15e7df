//! Chunked append-only row storage
//!
//! [`RowStore`] accumulates rows into a sequence of [`Chunk`]s whose capacity
//! grows from `init_capacity` up to `max_capacity`. Chunks retired by
//! [`RowStore::reset`] are kept on a freelist and refilled before anything new
//! is allocated.
//!
//! Memory is reported to the [`MemTracker`] once per chunk, when the chunk is
//! sealed (it stops receiving rows), not once per row. At any moment at most
//! the chunk currently being filled is unaccounted; a recycled chunk is
//! released from the tracker when it is handed out again and re-reported when
//! it is sealed.

use std::sync::Arc;

use tracing::debug;

use crate::chunk::{Chunk, Row};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::growth::{Doubling, GrowthPolicy};
use crate::tracker::MemTracker;
use crate::types::{Datum, Schema};

/// Label of the tracker created for stores built without one
pub const DEFAULT_TRACKER_LABEL: &str = "chunk list";

/// Size in bytes of a [`RowPtr`]
pub const ROW_PTR_SIZE: usize = size_of::<RowPtr>();

/// Address of a row inside the store that returned it.
///
/// Only valid until the next [`RowStore::reset`] or [`RowStore::clear`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RowPtr {
    pub chunk_idx: u32,
    pub row_idx: u32,
    epoch: u32,
}

/// Largest number of chunks, and of rows per chunk, a [`RowPtr`] can address
pub const MAX_ADDRESSABLE: usize = u32::MAX as usize;

#[derive(Debug)]
pub struct RowStore {
    schema: Schema,
    init_capacity: usize,
    max_capacity: usize,
    growth: Box<dyn GrowthPolicy>,
    length: usize,
    chunks: Vec<Chunk>,
    freelist: Vec<Chunk>,

    tracker: Arc<MemTracker>,
    /// Last chunk in `chunks` whose memory has been reported
    consumed_idx: Option<usize>,
    /// Bytes this store has reported to `tracker` and not yet released
    tracked_bytes: i64,
    epoch: u32,
}

impl RowStore {
    /// Create a store with its own unbounded tracker
    pub fn new(schema: Schema, config: StoreConfig) -> Self {
        Self::with_tracker(schema, config, MemTracker::new(DEFAULT_TRACKER_LABEL))
    }

    pub fn with_tracker(schema: Schema, config: StoreConfig, tracker: Arc<MemTracker>) -> Self {
        Self {
            schema,
            init_capacity: config.init_capacity,
            max_capacity: config.max_capacity.min(MAX_ADDRESSABLE),
            growth: Box::new(Doubling),
            length: 0,
            chunks: Vec::new(),
            freelist: Vec::new(),
            tracker,
            consumed_idx: None,
            tracked_bytes: 0,
            epoch: 0,
        }
    }

    /// Replace the capacity growth policy used for new chunks
    pub fn with_growth_policy(mut self, growth: impl GrowthPolicy + 'static) -> Self {
        self.growth = Box::new(growth);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn tracker(&self) -> &Arc<MemTracker> {
        &self.tracker
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn num_rows_of_chunk(&self, chunk_idx: usize) -> Option<usize> {
        self.chunks.get(chunk_idx).map(Chunk::num_rows)
    }

    pub fn chunk(&self, chunk_idx: usize) -> Option<&Chunk> {
        self.chunks.get(chunk_idx)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Retired chunks waiting to be reused
    pub fn freelist(&self) -> &[Chunk] {
        &self.freelist
    }

    /// Index of the last chunk whose memory has been reported
    pub fn sealed_idx(&self) -> Option<usize> {
        self.consumed_idx
    }

    /// Bytes currently reported to the tracker on behalf of this store
    pub fn tracked_bytes(&self) -> i64 {
        self.tracked_bytes
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Copy `row` into the store and return its address
    pub fn append_row(&mut self, row: Row<'_>) -> Result<RowPtr> {
        let row_schema = row.chunk().schema();
        if *row_schema != self.schema {
            return Err(StoreError::SchemaMismatch(format!(
                "row has columns {:?}, store has {:?}",
                row_schema.columns(),
                self.schema.columns()
            )));
        }
        let chunk_idx = self.writable_chunk()?;
        let ptr = self.next_ptr(chunk_idx)?;
        self.chunks[chunk_idx].push_row(row);
        self.length += 1;
        Ok(ptr)
    }

    /// Append one row of owned values and return its address
    pub fn append_values(&mut self, values: &[Datum]) -> Result<RowPtr> {
        self.schema.check_values(values)?;
        let chunk_idx = self.writable_chunk()?;
        let ptr = self.next_ptr(chunk_idx)?;
        self.chunks[chunk_idx].push_values(values);
        self.length += 1;
        Ok(ptr)
    }

    /// Address of the row about to be appended to chunk `chunk_idx`
    fn next_ptr(&self, chunk_idx: usize) -> Result<RowPtr> {
        let row_idx = self.chunks[chunk_idx].num_rows();
        let (Ok(chunk_idx), Ok(row_idx)) = (u32::try_from(chunk_idx), u32::try_from(row_idx)) else {
            return Err(StoreError::StoreFull(format!(
                "row at chunk {}, row {} is not addressable",
                chunk_idx, row_idx
            )));
        };
        Ok(RowPtr {
            chunk_idx,
            row_idx,
            epoch: self.epoch,
        })
    }

    fn check_chunk_slot(&self) -> Result<()> {
        if self.chunks.len() >= MAX_ADDRESSABLE {
            return Err(StoreError::StoreFull(format!(
                "{} chunks is the most a row pointer can address",
                MAX_ADDRESSABLE
            )));
        }
        Ok(())
    }

    /// Index of the chunk the next row goes into, rotating to a new chunk
    /// when the last one is full or already sealed.
    fn writable_chunk(&mut self) -> Result<usize> {
        if let Some(last) = self.chunks.len().checked_sub(1) {
            let sealed = self.consumed_idx == Some(last);
            if !sealed && !self.chunks[last].is_full() {
                return Ok(last);
            }
            self.check_chunk_slot()?;
            if !sealed {
                self.seal(last)?;
            }
        }
        let chunk = self.alloc_chunk();
        self.chunks.push(chunk);
        Ok(self.chunks.len() - 1)
    }

    /// Report the memory of chunk `idx` and mark it as the last sealed chunk
    fn seal(&mut self, idx: usize) -> Result<()> {
        let bytes = self.chunks[idx].memory_usage() as i64;
        self.tracker.try_consume(bytes)?;
        self.tracked_bytes += bytes;
        self.consumed_idx = Some(idx);
        debug!(chunk = idx, bytes, "sealed chunk");
        Ok(())
    }

    fn alloc_chunk(&mut self) -> Chunk {
        if let Some(mut chunk) = self.freelist.pop() {
            let stale = chunk.memory_usage() as i64;
            self.tracker.release(stale);
            self.tracked_bytes -= stale;
            chunk.reset();
            debug!(capacity = chunk.capacity(), released = stale, "reused chunk");
            return chunk;
        }
        let chunk = match self.chunks.last() {
            Some(last) => last.renew(self.growth.as_ref(), self.max_capacity),
            None => Chunk::new(
                &self.schema,
                self.growth
                    .initial_capacity(self.init_capacity, self.max_capacity),
                self.max_capacity,
            ),
        };
        debug!(capacity = chunk.capacity(), "allocated chunk");
        chunk
    }

    /// Take ownership of a fully built chunk.
    ///
    /// The chunk is sealed on arrival: its memory is reported immediately
    /// and later single-row appends go into a new chunk.
    pub fn add_chunk(&mut self, chunk: Chunk) -> Result<()> {
        if chunk.is_empty() {
            return Err(StoreError::EmptyChunk);
        }
        if *chunk.schema() != self.schema {
            return Err(StoreError::SchemaMismatch(format!(
                "chunk has columns {:?}, store has {:?}",
                chunk.schema().columns(),
                self.schema.columns()
            )));
        }
        if chunk.num_rows() > MAX_ADDRESSABLE {
            return Err(StoreError::StoreFull(format!(
                "chunk of {} rows has rows a row pointer cannot address",
                chunk.num_rows()
            )));
        }
        self.check_chunk_slot()?;
        if let Some(last) = self.chunks.len().checked_sub(1) {
            if self.consumed_idx != Some(last) {
                self.seal(last)?;
            }
        }
        let bytes = chunk.memory_usage() as i64;
        self.tracker.try_consume(bytes)?;
        self.tracked_bytes += bytes;
        self.length += chunk.num_rows();
        self.chunks.push(chunk);
        self.consumed_idx = Some(self.chunks.len() - 1);
        debug!(
            chunk = self.chunks.len() - 1,
            rows = self.chunks[self.chunks.len() - 1].num_rows(),
            bytes,
            "added chunk"
        );
        Ok(())
    }

    /// Get a row by the pointer returned when it was appended
    pub fn get_row(&self, ptr: RowPtr) -> Result<Row<'_>> {
        if ptr.epoch != self.epoch {
            return Err(StoreError::StaleRowPtr {
                ptr_epoch: ptr.epoch,
                store_epoch: self.epoch,
            });
        }
        self.chunks
            .get(ptr.chunk_idx as usize)
            .and_then(|chunk| chunk.row(ptr.row_idx as usize))
            .ok_or(StoreError::RowOutOfBounds {
                chunk_idx: ptr.chunk_idx,
                row_idx: ptr.row_idx,
            })
    }

    /// Move all chunks to the freelist and forget every row.
    ///
    /// The chunks stay accounted in the tracker until they are reused.
    /// Pointers issued before the reset become stale.
    pub fn reset(&mut self) {
        if let Some(last) = self.chunks.len().checked_sub(1) {
            if self.consumed_idx != Some(last) {
                // Already allocated, so account for it even over budget.
                let bytes = self.chunks[last].memory_usage() as i64;
                self.tracker.consume(bytes);
                self.tracked_bytes += bytes;
            }
        }
        debug!(
            chunks = self.chunks.len(),
            rows = self.length,
            freelist = self.freelist.len() + self.chunks.len(),
            "reset row store"
        );
        self.freelist.append(&mut self.chunks);
        self.length = 0;
        self.consumed_idx = None;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Drop every chunk, including the freelist, and return all tracked
    /// memory to the tracker
    pub fn clear(&mut self) {
        self.tracker.release(self.tracked_bytes);
        debug!(released = self.tracked_bytes, "cleared row store");
        self.tracked_bytes = 0;
        self.freelist = Vec::new();
        self.chunks = Vec::new();
        self.length = 0;
        self.consumed_idx = None;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Visit every row in append order, stopping at the first error.
    ///
    /// The visitor's error is returned as the source of
    /// [`StoreError::Walk`] together with the failing row's position.
    pub fn walk<F, E>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(Row<'_>) -> std::result::Result<(), E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        for (chunk_idx, chunk) in self.chunks.iter().enumerate() {
            for row in chunk.rows() {
                let row_idx = row.idx();
                f(row).map_err(|e| StoreError::Walk {
                    chunk_idx,
                    row_idx,
                    source: e.into(),
                })?;
            }
        }
        Ok(())
    }

    /// Iterate rows in append order
    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.rows())
    }
}

impl Drop for RowStore {
    fn drop(&mut self) {
        if self.tracked_bytes != 0 {
            self.tracker.release(self.tracked_bytes);
        }
    }
}
