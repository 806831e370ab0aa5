use std::fmt::Debug;
use thiserror::Error;

/// Boxed error returned by caller-supplied payload deserializers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
pub enum RTreeError {
    #[error("General error: {0}")]
    General(String),

    /// A node record with neither children nor entries, or with both.
    #[error("Malformed node at offset {offset}: expected either children or entries")]
    MalformedNode { offset: usize },

    #[error("Unsupported geometry type {tag} at offset {offset}")]
    UnsupportedGeometryType { tag: u8, offset: usize },

    /// Raised by `add` and `delete` on a serialized tree.
    #[error("unsupported: structure is immutable")]
    UnsupportedMutation,

    #[error("Failed to deserialize payload of entry at offset {offset}: {source}")]
    Deserialization {
        offset: usize,
        #[source]
        source: BoxError,
    },

    #[error("Record at offset {offset} needs {len} bytes but buffer has {buffer_len}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },

    #[error("Index {index} out of range for node with {count} items")]
    IndexOutOfRange { index: usize, count: usize },
}

pub type Result<T> = std::result::Result<T, RTreeError>;
