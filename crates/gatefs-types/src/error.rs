use std::io;

/// Closed error set for denylist parsing and blocking queries.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error("malformed CID: {0}")]
    MalformedCid(String),

    #[error("double-hash is not a raw multihash (cidv0) ({file}:{line})")]
    CidV0Required { file: String, line: u64 },

    #[error("line too long ({file}:{line})")]
    LineTooLong { file: String, line: u64 },

    #[error("header not found")]
    HeaderNotFound,

    #[error("path is too short")]
    PathTooShort,

    #[error("unsupported multihash function: 0x{0:x}")]
    UnsupportedHashFunction(u64),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("watch error: {0}")]
    Watch(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Convenience alias used throughout the gatefs crates.
pub type Result<T> = std::result::Result<T, BlockError>;
