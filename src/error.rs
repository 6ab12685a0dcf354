//! Error types for the hash table and the dictionary.

/// Failures of [`HashTable`](crate::HashTable) construction and mutation.
///
/// A value that is not found, or already present on insert, is not an
/// error; those outcomes are reported through `Option` and
/// [`Insert`](crate::Insert).
#[derive(thiserror::Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum TableError {
    /// The requested capacity is not a power of two.
    #[error("hash table capacity {0} is not a power of two")]
    InvalidCapacity(u32),

    /// The record array could not be allocated. The table is unchanged.
    #[error("failed to allocate {0} hash table records")]
    AllocFailed(u32),

    /// Every record is occupied and the table could not grow.
    #[error("hash table is full ({0} records)")]
    Full(u32),
}

/// Failures of [`Dictionary`](crate::Dictionary) interning.
#[derive(thiserror::Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum DictError {
    /// The string is longer than the dictionary can store.
    #[error("string of {len} bytes exceeds the dictionary limit of {max} bytes")]
    TooLong { len: usize, max: usize },

    /// Interned strings are NUL-free.
    #[error("interned strings must not contain NUL bytes")]
    InteriorNul,

    /// The entry already carries the maximum number of references.
    #[error("reference count of an interned string would exceed {0}")]
    RefcountOverflow(u32),
}
