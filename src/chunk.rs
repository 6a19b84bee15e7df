//! Column-oriented row batches
//!
//! A [`Chunk`] holds up to `capacity` rows, one buffer per column. Storage is
//! reserved up front for `capacity` rows and kept across [`Chunk::reset`], so
//! a recycled chunk refills without allocating.

use crate::error::{Result, StoreError};
use crate::growth::GrowthPolicy;
use crate::types::{ColumnType, Datum, DatumRef, Schema};

/// Bytes reserved per row for variable-length columns
const ESTIMATED_VALUE_LEN: usize = 8;

#[derive(Debug)]
enum ColumnData {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Bytes { offsets: Vec<usize>, data: Vec<u8> },
}

#[derive(Debug)]
struct Column {
    data: ColumnData,
    validity: Vec<bool>,
}

impl Column {
    fn with_capacity(ty: ColumnType, capacity: usize) -> Self {
        let data = match ty {
            ColumnType::Int64 => ColumnData::Int64(Vec::with_capacity(capacity)),
            ColumnType::Float64 => ColumnData::Float64(Vec::with_capacity(capacity)),
            ColumnType::Bytes => {
                let mut offsets = Vec::with_capacity(capacity + 1);
                offsets.push(0);
                ColumnData::Bytes {
                    offsets,
                    data: Vec::with_capacity(capacity * ESTIMATED_VALUE_LEN),
                }
            }
        };
        Self {
            data,
            validity: Vec::with_capacity(capacity),
        }
    }

    /// Push one value; the caller has checked that it fits the column type
    fn push(&mut self, value: DatumRef<'_>) {
        self.validity.push(!value.is_null());
        match &mut self.data {
            ColumnData::Int64(values) => values.push(match value {
                DatumRef::Int64(v) => v,
                _ => 0,
            }),
            ColumnData::Float64(values) => values.push(match value {
                DatumRef::Float64(v) => v,
                _ => 0.0,
            }),
            ColumnData::Bytes { offsets, data } => {
                if let DatumRef::Bytes(v) = value {
                    data.extend_from_slice(v);
                }
                offsets.push(data.len());
            }
        }
    }

    fn get(&self, idx: usize) -> DatumRef<'_> {
        if !self.validity[idx] {
            return DatumRef::Null;
        }
        match &self.data {
            ColumnData::Int64(values) => DatumRef::Int64(values[idx]),
            ColumnData::Float64(values) => DatumRef::Float64(values[idx]),
            ColumnData::Bytes { offsets, data } => {
                DatumRef::Bytes(&data[offsets[idx]..offsets[idx + 1]])
            }
        }
    }

    fn memory_usage(&self) -> usize {
        let data = match &self.data {
            ColumnData::Int64(values) => values.capacity() * size_of::<i64>(),
            ColumnData::Float64(values) => values.capacity() * size_of::<f64>(),
            ColumnData::Bytes { offsets, data } => {
                offsets.capacity() * size_of::<usize>() + data.capacity()
            }
        };
        data + self.validity.capacity()
    }

    fn clear(&mut self) {
        self.validity.clear();
        match &mut self.data {
            ColumnData::Int64(values) => values.clear(),
            ColumnData::Float64(values) => values.clear(),
            ColumnData::Bytes { offsets, data } => {
                offsets.clear();
                offsets.push(0);
                data.clear();
            }
        }
    }
}

/// Fixed-capacity batch of rows stored column by column
#[derive(Debug)]
pub struct Chunk {
    schema: Schema,
    columns: Vec<Column>,
    num_rows: usize,
    capacity: usize,
}

impl Chunk {
    /// Create a chunk with capacity `min(init_capacity, max_capacity)`
    pub fn new(schema: &Schema, init_capacity: usize, max_capacity: usize) -> Self {
        Self::with_capacity(schema, init_capacity.min(max_capacity))
    }

    pub fn with_capacity(schema: &Schema, capacity: usize) -> Self {
        let columns = schema
            .columns()
            .iter()
            .map(|&ty| Column::with_capacity(ty, capacity))
            .collect();
        Self {
            schema: schema.clone(),
            columns,
            num_rows: 0,
            capacity,
        }
    }

    /// Create an empty chunk with the same schema, sized by `growth` from
    /// this chunk's capacity
    pub fn renew(&self, growth: &dyn GrowthPolicy, max_capacity: usize) -> Self {
        Self::with_capacity(&self.schema, growth.next_capacity(self.capacity, max_capacity))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn is_full(&self) -> bool {
        self.num_rows >= self.capacity
    }

    /// Copy a row from another chunk with the same column types.
    ///
    /// Appending to a full chunk still succeeds; the column buffers grow
    /// past the reserved capacity.
    pub fn append_row(&mut self, row: Row<'_>) -> Result<()> {
        if row.chunk.schema != self.schema {
            return Err(StoreError::SchemaMismatch(format!(
                "row has columns {:?}, chunk has {:?}",
                row.chunk.schema.columns(),
                self.schema.columns()
            )));
        }
        self.push_row(row);
        Ok(())
    }

    /// Append owned values, checked against the schema
    pub fn append_values(&mut self, values: &[Datum]) -> Result<()> {
        self.schema.check_values(values)?;
        self.push_values(values);
        Ok(())
    }

    pub(crate) fn push_row(&mut self, row: Row<'_>) {
        for (i, column) in self.columns.iter_mut().enumerate() {
            column.push(row.get(i));
        }
        self.num_rows += 1;
    }

    pub(crate) fn push_values(&mut self, values: &[Datum]) {
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.push(value.as_ref());
        }
        self.num_rows += 1;
    }

    /// Get a row by index.
    ///
    /// Panics if `idx >= num_rows()`; use [`Chunk::row`] for a checked read.
    pub fn get_row(&self, idx: usize) -> Row<'_> {
        assert!(
            idx < self.num_rows,
            "row index {} out of range for chunk with {} rows",
            idx,
            self.num_rows
        );
        Row { chunk: self, idx }
    }

    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        (idx < self.num_rows).then_some(Row { chunk: self, idx })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.num_rows).map(move |idx| Row { chunk: self, idx })
    }

    /// Bytes held by the column buffers, including reserved but unused space
    pub fn memory_usage(&self) -> usize {
        self.columns.iter().map(Column::memory_usage).sum()
    }

    /// Drop all rows, keeping the allocated storage
    pub fn reset(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        self.num_rows = 0;
    }
}

/// A row borrowed from a chunk
#[derive(Clone, Copy)]
pub struct Row<'a> {
    chunk: &'a Chunk,
    idx: usize,
}

impl<'a> Row<'a> {
    /// Position of this row within its chunk
    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn chunk(&self) -> &'a Chunk {
        self.chunk
    }

    pub fn len(&self) -> usize {
        self.chunk.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunk.columns.is_empty()
    }

    pub fn get(&self, col: usize) -> DatumRef<'a> {
        self.chunk.columns[col].get(self.idx)
    }

    pub fn values(&self) -> impl Iterator<Item = DatumRef<'a>> + 'a {
        let chunk = self.chunk;
        let idx = self.idx;
        chunk.columns.iter().map(move |column| column.get(idx))
    }

    pub fn to_datums(&self) -> Vec<Datum> {
        self.values().map(|v| v.to_datum()).collect()
    }
}

impl std::fmt::Debug for Row<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.values()).finish()
    }
}
