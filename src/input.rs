use std::io::BufRead;

use bstr::ByteSlice;
use tracing::debug;

use crate::chunk::Chunk;
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::store::RowStore;
use crate::types::{ColumnType, Datum, Schema};

/// Field text that stands for a NULL value in a numeric column
const NULL_FIELD: &[u8] = b"\\N";

/// Streams typed rows out of delimited text
pub struct RowReader<'a, R> {
    reader: R,
    schema: &'a Schema,
    delimiter: u8,
    separator: Option<u8>,
    record: Vec<u8>,
    records_read: usize,
}

impl<'a, R: BufRead> RowReader<'a, R> {
    pub fn new(reader: R, schema: &'a Schema, delimiter: u8, separator: Option<u8>) -> Self {
        Self {
            reader,
            schema,
            delimiter,
            separator,
            record: Vec::new(),
            records_read: 0,
        }
    }

    /// Number of records consumed so far
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Parse the next record into a row, `None` at end of input.
    ///
    /// A final record without a trailing delimiter is still returned.
    pub fn next_row(&mut self) -> Result<Option<Vec<Datum>>> {
        self.record.clear();
        if self.reader.read_until(self.delimiter, &mut self.record)? == 0 {
            return Ok(None);
        }
        if self.record.last() == Some(&self.delimiter) {
            self.record.pop();
        }
        self.records_read += 1;
        parse_record(&self.record, self.schema, self.separator).map(Some)
    }
}

/// Read and parse every record of `reader` with the schema and delimiters
/// of `config`
pub fn read_rows<R: BufRead>(reader: R, config: &Config) -> Result<Vec<Vec<Datum>>> {
    let mut rows = Vec::new();
    let mut reader = RowReader::new(
        reader,
        &config.schema,
        config.record_delimiter,
        config.field_separator,
    );
    while let Some(row) = reader.next_row()? {
        rows.push(row);
    }
    debug!(records = reader.records_read(), "read rows");
    Ok(rows)
}

/// Split record into fields based on separator
pub fn split_fields(record: &[u8], separator: Option<u8>) -> Vec<&[u8]> {
    match separator {
        Some(sep) => record.split(|&b| b == sep).collect(),
        None => {
            // Default: split on runs of whitespace (space or tab)
            let fields: Vec<&[u8]> = record
                .split(|&b| b == b' ' || b == b'\t')
                .filter(|f| !f.is_empty())
                .collect();
            if fields.is_empty() {
                vec![&record[0..0]]
            } else {
                fields
            }
        }
    }
}

/// Parse one record into a row of values for `schema`.
///
/// A single-column schema takes the whole record as its field. Missing
/// trailing fields are NULL, extra fields are an error.
pub fn parse_record(record: &[u8], schema: &Schema, separator: Option<u8>) -> Result<Vec<Datum>> {
    let fields = if schema.len() == 1 {
        vec![record]
    } else {
        split_fields(record, separator)
    };

    if fields.len() > schema.len() {
        return Err(StoreError::SchemaMismatch(format!(
            "record has {} fields, schema has {} columns",
            fields.len(),
            schema.len()
        )));
    }

    schema
        .columns()
        .iter()
        .enumerate()
        .map(|(i, &ty)| match fields.get(i) {
            Some(field) => parse_field(i + 1, field, ty),
            None => Ok(Datum::Null),
        })
        .collect()
}

/// Numeric fields that are empty or `\N` are NULL; a bytes field is
/// always taken literally.
fn parse_field(field_no: usize, field: &[u8], ty: ColumnType) -> Result<Datum> {
    let invalid = || StoreError::InvalidField {
        field: field_no,
        column_type: ty.name(),
        value: field.to_str_lossy().into_owned(),
    };
    match ty {
        ColumnType::Bytes => Ok(Datum::Bytes(field.to_vec())),
        ColumnType::Int64 | ColumnType::Float64 if field.is_empty() || field == NULL_FIELD => {
            Ok(Datum::Null)
        }
        ColumnType::Int64 => field
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .map(Datum::Int64)
            .ok_or_else(invalid),
        ColumnType::Float64 => field
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .map(Datum::Float64)
            .ok_or_else(invalid),
    }
}

/// Append rows to the store, either one at a time or as whole chunks of
/// `bulk` rows
pub fn load_rows(store: &mut RowStore, rows: &[Vec<Datum>], bulk: Option<usize>) -> Result<()> {
    match bulk {
        None => {
            for row in rows {
                store.append_values(row)?;
            }
        }
        Some(size) => {
            for batch in rows.chunks(size.max(1)) {
                let mut chunk = Chunk::with_capacity(store.schema(), batch.len());
                for row in batch {
                    chunk.append_values(row)?;
                }
                store.add_chunk(chunk)?;
            }
        }
    }
    Ok(())
}
