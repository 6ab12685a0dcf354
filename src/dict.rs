//! Dictionary: reference-counted string interning.
//!
//! Equal strings share one entry. Entries hang off a fixed array of
//! [`DICT_SIZE`] chained buckets and live in a `SlotMap`, whose generational
//! keys serve both as chain links and as handle identity. Every operation
//! takes the dictionary lock for the chain scan and the refcount update;
//! handles read their content without it.

use crate::error::DictError;
use crate::hash::hash_str;
use crate::tokens::{Count, RefCount, Token, DICT_MAX_REFCOUNT};
use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Number of chain heads.
pub const DICT_SIZE: usize = 1024;
/// Longest string (in bytes) the dictionary stores.
pub const DICT_MAX_LEN: usize = 1023;

new_key_type! {
    struct EntryKey;
}

#[derive(Debug)]
struct Entry {
    value: Arc<str>,
    hash: u32,
    refcount: RefCount,
    next: Option<EntryKey>,
}

struct Chains {
    heads: Box<[Option<EntryKey>]>,
    entries: SlotMap<EntryKey, Entry>,
}

impl Chains {
    fn new() -> Self {
        Self {
            heads: vec![None; DICT_SIZE].into_boxed_slice(),
            entries: SlotMap::with_key(),
        }
    }

    #[inline]
    fn bucket(hash: u32) -> usize {
        hash as usize % DICT_SIZE
    }

    fn lookup(&self, hash: u32, value: &str) -> Option<EntryKey> {
        let mut cursor = self.heads[Self::bucket(hash)];
        while let Some(key) = cursor {
            let entry = &self.entries[key];
            if entry.value.len() == value.len() && entry.value.as_bytes() == value.as_bytes() {
                return Some(key);
            }
            cursor = entry.next;
        }
        None
    }

    /// Link a new entry with no references at the head of its chain.
    fn link(&mut self, value: Arc<str>, hash: u32) -> EntryKey {
        let bucket = Self::bucket(hash);
        let next = self.heads[bucket];
        let key = self.entries.insert(Entry {
            value,
            hash,
            refcount: RefCount::new(0),
            next,
        });
        self.heads[bucket] = Some(key);
        log::trace!("dictionary: new entry in bucket {}", bucket);
        key
    }

    fn unlink(&mut self, key: EntryKey) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        let bucket = Self::bucket(entry.hash);
        if self.heads[bucket] == Some(key) {
            self.heads[bucket] = entry.next;
        } else {
            let mut cursor = self.heads[bucket];
            while let Some(k) = cursor {
                let prev = &mut self.entries[k];
                if prev.next == Some(key) {
                    prev.next = entry.next;
                    break;
                }
                cursor = prev.next;
            }
        }
        log::trace!("dictionary: freed entry in bucket {}", bucket);
        Some(entry)
    }

    /// Take one more reference on `key` and wrap it in a handle.
    fn mint(&self, key: EntryKey) -> Result<Interned, DictError> {
        let entry = &self.entries[key];
        let token = entry
            .refcount
            .get()
            .ok_or(DictError::RefcountOverflow(DICT_MAX_REFCOUNT))?;
        Ok(Interned {
            key,
            value: Arc::clone(&entry.value),
            token,
        })
    }

    /// The entry `h` refers to. A handle from another dictionary, or one
    /// already released, is a caller bug.
    fn owned(&self, h: &Interned) -> &Entry {
        self.entries
            .get(h.key)
            .filter(|e| Arc::ptr_eq(&e.value, &h.value))
            .expect("Interned handle must belong to this dictionary")
    }
}

/// Result of releasing a handle; indicates whether the entry was freed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Released {
    Live,
    Freed,
}

/// Shared string interning dictionary.
///
/// Content is UTF-8 text without NUL bytes; the length bound counts bytes,
/// not characters.
///
/// Owned by the context that uses it: create it with [`Dictionary::new`]
/// and tear it down with [`Dictionary::clean`] (or by dropping it).
pub struct Dictionary {
    chains: Mutex<Chains>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self {
            chains: Mutex::new(Chains::new()),
        }
    }

    /// Number of distinct strings stored.
    pub fn len(&self) -> usize {
        self.chains.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.lock().entries.is_empty()
    }

    fn check(value: &str) -> Result<(), DictError> {
        if value.len() > DICT_MAX_LEN {
            return Err(DictError::TooLong {
                len: value.len(),
                max: DICT_MAX_LEN,
            });
        }
        if value.as_bytes().contains(&0) {
            return Err(DictError::InteriorNul);
        }
        Ok(())
    }

    /// Intern `value`, returning a handle that owns one reference to its
    /// entry. Each handle must be given back with [`Dictionary::release`].
    pub fn intern(&self, value: &str) -> Result<Interned, DictError> {
        Self::check(value)?;
        let hash = hash_str(value);
        let mut chains = self.chains.lock();
        let key = match chains.lookup(hash, value) {
            Some(key) => key,
            None => chains.link(Arc::from(value), hash),
        };
        chains.mint(key)
    }

    /// Intern an owned string. The dictionary takes the string; it is
    /// dropped if equal content is already interned.
    pub fn intern_owned(&self, value: String) -> Result<Interned, DictError> {
        Self::check(&value)?;
        let hash = hash_str(&value);
        let mut chains = self.chains.lock();
        let key = match chains.lookup(hash, &value) {
            Some(key) => key,
            None => chains.link(Arc::from(value), hash),
        };
        chains.mint(key)
    }

    /// Another handle to the entry `h` refers to.
    pub fn share(&self, h: &Interned) -> Result<Interned, DictError> {
        let chains = self.chains.lock();
        chains.owned(h);
        chains.mint(h.key)
    }

    /// Give back the reference `handle` owns; the entry is unlinked and
    /// freed when this was its last reference.
    pub fn release(&self, handle: Interned) -> Released {
        let mut chains = self.chains.lock();
        let entry = chains.owned(&handle);
        let Interned { key, token, .. } = handle;
        if entry.refcount.put(token) {
            chains.unlink(key);
            Released::Freed
        } else {
            Released::Live
        }
    }

    /// Current reference count of the entry `h` refers to.
    pub fn refcount(&self, h: &Interned) -> u32 {
        self.chains.lock().owned(h).refcount.current()
    }

    /// Whether `value` is interned, without taking a reference.
    pub fn contains(&self, value: &str) -> bool {
        if Self::check(value).is_err() {
            return false;
        }
        let hash = hash_str(value);
        self.chains.lock().lookup(hash, value).is_some()
    }

    /// Tear the dictionary down, freeing every entry whatever its
    /// reference count. Returns how many entries were still alive.
    pub fn clean(self) -> usize {
        let chains = self.chains.into_inner();
        let live = chains.entries.len();
        if live > 0 {
            log::debug!("dictionary: cleaning {} live entries", live);
        }
        live
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("len", &self.len())
            .finish()
    }
}

/// Handle to an interned string, owning one reference to its entry.
///
/// Reading the content needs no lock. The reference must be given back with
/// [`Dictionary::release`]; dropping the handle instead panics in debug
/// builds.
pub struct Interned {
    key: EntryKey,
    value: Arc<str>,
    token: Token<'static, RefCount>,
}

impl Interned {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl Deref for Interned {
    type Target = str;
    fn deref(&self) -> &str {
        &self.value
    }
}

impl AsRef<str> for Interned {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

/// Handles are equal when they refer to the same entry.
impl PartialEq for Interned {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && Arc::ptr_eq(&self.value, &other.value)
    }
}

impl Eq for Interned {}

impl fmt::Debug for Interned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Interned").field(&&*self.value).finish()
    }
}

impl fmt::Display for Interned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
