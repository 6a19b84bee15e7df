use clap::Parser;

use crate::config::{DEFAULT_INIT_CAPACITY, DEFAULT_MAX_CAPACITY};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rowstore",
    about = "Buffer records in a chunked row store and write them back out"
)]
pub struct Args {
    /// Comma separated column types (i64, f64, bytes); in i64 and f64
    /// columns an empty field or \N is NULL
    #[arg(short = 'c', long, value_name = "TYPES", default_value = "bytes")]
    pub columns: String,

    /// Capacity of the first chunk
    #[arg(long, value_name = "ROWS", default_value_t = DEFAULT_INIT_CAPACITY)]
    pub init_capacity: usize,

    /// Maximum chunk capacity
    #[arg(long, value_name = "ROWS", default_value_t = DEFAULT_MAX_CAPACITY)]
    pub max_capacity: usize,

    /// Build chunks of ROWS rows and add them whole instead of row by row
    #[arg(long, value_name = "ROWS")]
    pub bulk: Option<usize>,

    /// Load the input this many times, resetting the store between loads
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub passes: usize,

    /// Fail when tracked memory exceeds BYTES
    #[arg(long, value_name = "BYTES")]
    pub mem_limit: Option<i64>,

    /// Print chunk layout and memory statistics to stderr
    #[arg(long)]
    pub stats: bool,

    /// Write result to FILE instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<String>,

    /// Use SEP as field separator
    #[arg(short = 't', long = "field-separator", value_name = "SEP")]
    pub delimiter: Option<String>,

    /// Use NUL as line delimiter
    #[arg(short = 'z', long = "zero-terminated")]
    pub zero_terminated: bool,

    /// Log chunk allocation and memory accounting to stderr
    #[arg(long)]
    pub debug: bool,

    /// Input files
    #[arg(value_name = "FILE")]
    pub files: Vec<String>,
}

impl Args {
    /// Parse -t argument, handling '\0' escape for NUL byte
    pub fn field_separator(&self) -> crate::error::Result<Option<u8>> {
        match &self.delimiter {
            None => Ok(None),
            Some(s) => {
                if s == "\\0" || s == "\0" {
                    Ok(Some(0u8))
                } else if s.len() == 1 {
                    Ok(Some(s.as_bytes()[0]))
                } else if s.starts_with('\\') && s.len() == 2 {
                    match s.chars().nth(1) {
                        Some('t') => Ok(Some(b'\t')),
                        Some('\\') => Ok(Some(b'\\')),
                        _ => Err(crate::error::StoreError::InvalidDelimiter),
                    }
                } else {
                    Err(crate::error::StoreError::InvalidDelimiter)
                }
            }
        }
    }

    /// Get the record delimiter (newline or NUL)
    pub fn record_delimiter(&self) -> u8 {
        if self.zero_terminated {
            0u8
        } else {
            b'\n'
        }
    }
}
