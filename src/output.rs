use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::chunk::Row;
use crate::config::Config;
use crate::error::Result;
use crate::store::RowStore;
use crate::types::DatumRef;

/// Write every stored row in append order
pub fn write_rows<W: Write>(writer: W, store: &RowStore, config: &Config) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    let separator = config.output_separator();
    let delimiter = config.record_delimiter;

    store.walk(|row| write_row(&mut writer, row, separator, delimiter))?;

    writer.flush()?;
    Ok(())
}

fn write_row<W: Write>(writer: &mut W, row: Row<'_>, separator: u8, delimiter: u8) -> io::Result<()> {
    for (i, value) in row.values().enumerate() {
        if i > 0 {
            writer.write_all(&[separator])?;
        }
        match value {
            // Stored bytes go out untouched, valid UTF-8 or not.
            DatumRef::Bytes(v) => writer.write_all(v)?,
            other => write!(writer, "{}", other)?,
        }
    }
    writer.write_all(&[delimiter])
}

/// Describe the chunk layout and memory accounting of a store
pub fn write_stats<W: Write>(writer: &mut W, store: &RowStore) -> io::Result<()> {
    let capacities: Vec<usize> = store.chunks().iter().map(|c| c.capacity()).collect();
    let row_counts: Vec<usize> = store.chunks().iter().map(|c| c.num_rows()).collect();
    let freelist: Vec<usize> = store.freelist().iter().map(|c| c.capacity()).collect();
    let tracker = store.tracker();

    writeln!(writer, "rows: {}", store.len())?;
    writeln!(writer, "chunks: {}", store.num_chunks())?;
    writeln!(writer, "capacities: {:?}", capacities)?;
    writeln!(writer, "row counts: {:?}", row_counts)?;
    writeln!(writer, "freelist: {:?}", freelist)?;
    match store.sealed_idx() {
        Some(idx) => writeln!(writer, "sealed: {}", idx)?,
        None => writeln!(writer, "sealed: none")?,
    }
    writeln!(writer, "epoch: {}", store.epoch())?;
    writeln!(writer, "tracked bytes: {}", store.tracked_bytes())?;
    writeln!(
        writer,
        "tracker `{}`: {} bytes, peak {}",
        tracker.label(),
        tracker.bytes_consumed(),
        tracker.peak()
    )?;
    match tracker.limit() {
        Some(limit) => writeln!(writer, "limit: {}", limit),
        None => writeln!(writer, "limit: none"),
    }
}

/// Open output file or return stdout
pub fn open_output(config: &Config) -> io::Result<Box<dyn Write>> {
    match &config.output_file {
        Some(path) => {
            let file = File::create(path)?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdout())),
    }
}
