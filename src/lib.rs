//! intern-table: deduplication and fast-lookup building blocks for a
//! schema/document engine.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: two small hashing engines whose invariants can be reasoned about
//!   independently, sharing one hashing discipline.
//! - Layers:
//!   - `hash`: incremental 32-bit mixer; a key may be fed in several parts
//!     and the digest does not depend on where the parts are split.
//!   - `HashTable<T, D>`: open addressing with linear probing, lazy
//!     deletion, and the cluster length cached at each home slot. Callers
//!     supply hashes and a swappable equality policy; duplicate keys are
//!     allowed and enumerated with `find_next`.
//!   - `Dictionary`: fixed 1024-bucket chaining table of refcounted,
//!     length-bounded strings behind one lock, handing out `Interned`
//!     handles.
//!
//! Constraints
//! - `HashTable` is single-threaded (`Rc` policy, no locking); callers
//!   needing sharing keep one table per thread.
//! - `Dictionary` is `Send + Sync`; every operation takes its lock for
//!   O(chain length) work. `Interned` reads content without the lock.
//! - String length is bounded to 1023 bytes and refcounts to 2^22 - 1;
//!   exceeding either is an error, never truncation or wraparound.
//!
//! Reentrancy policy
//! - `HashTable` calls user code only through the equality policy while
//!   probing. In debug builds each policy call marks the table busy, and a
//!   policy that probes the same table again panics naming the hash and
//!   slot. The mark is cleared on unwind, so a panicking policy leaves the
//!   table usable.
//!
//! Ownership of references
//! - Each successful `intern`/`share` returns a handle owning exactly one
//!   reference, backed by a linear token. It must be returned through
//!   `Dictionary::release`; dropping it instead panics in debug builds.
//!
//! Resizing
//! - An insert that brings the load to 75% doubles the table. Once the
//!   load has reached 50%, a remove that drops it under 25% halves the
//!   table (if shrinking is enabled), never below 8 records. Resizes are
//!   best-effort and never undo the insert or remove that triggered them.

mod dict;
mod error;
pub mod hash;
pub mod hash_table;
mod hash_table_proptest;
mod tokens;

// Public surface
pub use dict::{Dictionary, Interned, Released, DICT_MAX_LEN, DICT_SIZE};
pub use error::{DictError, TableError};
pub use hash::{hash_bytes, hash_str, mix, BuildMixHasher, MixHasher};
pub use hash_table::{ByValue, EqualFn, Equality, HashTable, Insert, Match, ResizeMode};
pub use tokens::DICT_MAX_REFCOUNT;
