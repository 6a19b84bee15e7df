use crate::cli::Args;
use crate::error::{Result, StoreError};
use crate::store::MAX_ADDRESSABLE;
use crate::types::Schema;

/// Default capacity of the first chunk in a store
pub const DEFAULT_INIT_CAPACITY: usize = 32;
/// Default upper bound on chunk capacity
pub const DEFAULT_MAX_CAPACITY: usize = 1024;

/// Chunk growth parameters of a row store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub init_capacity: usize,
    pub max_capacity: usize,
}

impl StoreConfig {
    /// Both capacities must be positive and `max_capacity` must fit a
    /// [`RowPtr`](crate::store::RowPtr) row index; an `init_capacity` above
    /// `max_capacity` is clamped when the first chunk is built.
    pub fn new(init_capacity: usize, max_capacity: usize) -> Result<Self> {
        if init_capacity == 0 {
            return Err(StoreError::InvalidCapacity(
                "initial capacity must be >= 1".to_string(),
            ));
        }
        if max_capacity == 0 {
            return Err(StoreError::InvalidCapacity(
                "maximum capacity must be >= 1".to_string(),
            ));
        }
        if max_capacity > MAX_ADDRESSABLE {
            return Err(StoreError::InvalidCapacity(format!(
                "maximum capacity must be <= {}",
                MAX_ADDRESSABLE
            )));
        }
        Ok(Self {
            init_capacity,
            max_capacity,
        })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            init_capacity: DEFAULT_INIT_CAPACITY,
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

/// Runtime configuration derived from CLI arguments
#[derive(Clone, Debug)]
pub struct Config {
    pub store: StoreConfig,
    pub schema: Schema,
    pub record_delimiter: u8,
    pub field_separator: Option<u8>,
    /// Rows per externally built chunk, `None` to append row by row
    pub bulk: Option<usize>,
    pub passes: usize,
    pub mem_limit: Option<i64>,
    pub stats: bool,
    pub debug: bool,
    pub output_file: Option<String>,
    pub input_files: Vec<String>,
}

impl Config {
    /// Build configuration from parsed CLI arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.passes == 0 {
            return Err(StoreError::InvalidCapacity(
                "number of passes must be >= 1".to_string(),
            ));
        }
        if args.bulk == Some(0) {
            return Err(StoreError::InvalidCapacity(
                "bulk chunk size must be >= 1".to_string(),
            ));
        }

        Ok(Config {
            store: StoreConfig::new(args.init_capacity, args.max_capacity)?,
            schema: Schema::parse(&args.columns)?,
            record_delimiter: args.record_delimiter(),
            field_separator: args.field_separator()?,
            bulk: args.bulk,
            passes: args.passes,
            mem_limit: args.mem_limit,
            stats: args.stats,
            debug: args.debug,
            output_file: args.output.clone(),
            input_files: args.files.clone(),
        })
    }

    /// Byte written between output fields
    pub fn output_separator(&self) -> u8 {
        self.field_separator.unwrap_or(b'\t')
    }
}
