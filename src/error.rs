use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "memory limit exceeded for tracker `{label}`: requested {requested} bytes \
         with {consumed} already consumed, limit is {limit}"
    )]
    MemoryLimitExceeded {
        label: String,
        requested: i64,
        consumed: i64,
        limit: i64,
    },

    #[error("chunk added to a row store must have at least one row")]
    EmptyChunk,

    #[error("row does not match store schema: {0}")]
    SchemaMismatch(String),

    #[error("stale row pointer: issued in epoch {ptr_epoch}, store is at epoch {store_epoch}")]
    StaleRowPtr { ptr_epoch: u32, store_epoch: u32 },

    #[error("row pointer out of bounds: chunk {chunk_idx}, row {row_idx}")]
    RowOutOfBounds { chunk_idx: u32, row_idx: u32 },

    #[error("walk stopped at chunk {chunk_idx}, row {row_idx}: {source}")]
    Walk {
        chunk_idx: usize,
        row_idx: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("row store is full: {0}")]
    StoreFull(String),

    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("invalid column type: {0}")]
    InvalidColumnType(String),

    #[error("invalid field delimiter: must be a single byte")]
    InvalidDelimiter,

    #[error("cannot parse field {field} as {column_type}: {value:?}")]
    InvalidField {
        field: usize,
        column_type: &'static str,
        value: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
