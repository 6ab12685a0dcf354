//! HashTable: open addressing over typed records with caller-supplied hashes.
//!
//! Collisions are resolved by linear probing with interval 1. Every home
//! slot caches the length of the cluster homed there, so a lookup scans
//! exactly that many slots instead of running until an empty slot.
//! Removal is lazy: a removed value leaves a tombstone that still counts
//! toward its cluster. When the removed slot is the cluster tail, the
//! cluster is shortened past any trailing tombstones and those slots are
//! emptied again.
//!
//! The table never hashes values itself. Callers pass the hash on every
//! call and decide what "equal" means through an [`Equality`] policy that
//! can be swapped at any time.

use crate::error::TableError;
#[cfg(debug_assertions)]
use core::cell::Cell;
use core::fmt;
use std::rc::Rc;

/// Load (in percent) at which an insert doubles the capacity.
pub const ENLARGE_PERCENTAGE: u32 = 75;
/// Load (in percent) that must be reached once before shrinking is allowed.
pub const FIRST_SHRINK_PERCENTAGE: u32 = 50;
/// Load (in percent) below which a remove halves the capacity.
pub const SHRINK_PERCENTAGE: u32 = 25;
/// The table never has fewer records than this.
pub const MIN_CAPACITY: u32 = 8;

/// Which automatic resizes a table performs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResizeMode {
    Disabled,
    Enlarge,
    EnlargeAndShrink,
}

/// Value equality policy.
///
/// `a` is the value passed to the table operation, `b` the stored one.
/// `mutating` is true when called from `insert` or `remove` and false from
/// `find`/`find_next`, so one policy can, for example, match on a key alone
/// for lookups but require full equality before refusing an insert.
pub trait Equality<T, D = ()> {
    fn equal(&self, a: &T, b: &T, mutating: bool, data: &D) -> bool;
}

impl<T, D, F> Equality<T, D> for F
where
    F: Fn(&T, &T, bool, &D) -> bool,
{
    #[inline]
    fn equal(&self, a: &T, b: &T, mutating: bool, data: &D) -> bool {
        self(a, b, mutating, data)
    }
}

/// Policy comparing values with `PartialEq`, ignoring the context.
#[derive(Copy, Clone, Debug, Default)]
pub struct ByValue;

impl<T: PartialEq, D> Equality<T, D> for ByValue {
    #[inline]
    fn equal(&self, a: &T, b: &T, _mutating: bool, _data: &D) -> bool {
        a == b
    }
}

/// Shared, swappable equality policy.
pub type EqualFn<T, D = ()> = Rc<dyn Equality<T, D>>;

/// Outcome of a successful [`HashTable::insert`].
#[derive(Debug, Eq, PartialEq)]
pub enum Insert<T> {
    Inserted,
    /// An equal value is already stored; the rejected value is handed back.
    Present(T),
}

/// A stored value found by [`HashTable::find`], remembering its slot so the
/// scan can be resumed with [`HashTable::find_next`].
pub struct Match<'a, T> {
    index: usize,
    value: &'a T,
}

impl<'a, T> Match<'a, T> {
    pub fn value(&self) -> &'a T {
        self.value
    }
}

impl<'a, T> Clone for Match<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for Match<'a, T> {}

impl<'a, T: fmt::Debug> fmt::Debug for Match<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("index", &self.index)
            .field("value", self.value)
            .finish()
    }
}

#[derive(Clone, Debug)]
enum Slot<T> {
    Empty,
    /// Tombstone: still scanned as part of its cluster.
    Deleted,
    Filled(T),
}

#[derive(Clone, Debug)]
struct Record<T> {
    hash: u32,
    /// Length of the cluster homed at this index; 0 when none is.
    cluster_len: u32,
    slot: Slot<T>,
}

impl<T> Record<T> {
    const fn empty() -> Self {
        Self {
            hash: 0,
            cluster_len: 0,
            slot: Slot::Empty,
        }
    }

    #[inline]
    fn is_filled(&self) -> bool {
        matches!(self.slot, Slot::Filled(_))
    }
}

fn alloc_records<T>(capacity: u32) -> Result<Vec<Record<T>>, TableError> {
    let mut recs = Vec::new();
    recs.try_reserve_exact(capacity as usize)
        .map_err(|_| TableError::AllocFailed(capacity))?;
    recs.resize_with(capacity as usize, Record::empty);
    Ok(recs)
}

/// Clears the in-policy flag when the policy returns or unwinds.
#[cfg(debug_assertions)]
struct PolicyCall<'a>(&'a Cell<bool>);

#[cfg(debug_assertions)]
impl Drop for PolicyCall<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Record storage and probing.
struct RawTable<T> {
    recs: Vec<Record<T>>,
    used: u32,
    /// Set while the equality policy runs; a policy that calls back into
    /// the table trips it on the nested probe.
    #[cfg(debug_assertions)]
    in_policy: Cell<bool>,
}

impl<T> RawTable<T> {
    fn new(recs: Vec<Record<T>>, used: u32) -> Self {
        Self {
            recs,
            used,
            #[cfg(debug_assertions)]
            in_policy: Cell::new(false),
        }
    }

    #[inline]
    fn capacity(&self) -> u32 {
        self.recs.len() as u32
    }

    #[inline]
    fn mask(&self) -> usize {
        self.recs.len() - 1
    }

    #[inline]
    fn home(&self, hash: u32) -> usize {
        hash as usize & self.mask()
    }

    fn load_percent(&self) -> u32 {
        (u64::from(self.used) * 100 / self.recs.len() as u64) as u32
    }

    /// Scan `budget` slots from `start` for a filled slot with `hash` whose
    /// value the policy reports equal to `value`.
    fn scan<'a, D>(
        &'a self,
        equal: &dyn Equality<T, D>,
        data: &D,
        start: usize,
        budget: usize,
        value: &T,
        hash: u32,
        mutating: bool,
    ) -> Option<Match<'a, T>> {
        let mask = self.mask();
        let mut index = start;
        for _ in 0..budget {
            let rec = &self.recs[index];
            if let Slot::Filled(stored) = &rec.slot {
                if rec.hash == hash && self.call(equal, data, value, stored, mutating, index) {
                    return Some(Match {
                        index,
                        value: stored,
                    });
                }
            }
            index = (index + 1) & mask;
        }
        None
    }

    /// Run the equality policy on the stored value at `index`. In debug
    /// builds a policy that re-enters the table panics here.
    #[inline]
    fn call<D>(
        &self,
        equal: &dyn Equality<T, D>,
        data: &D,
        value: &T,
        stored: &T,
        mutating: bool,
        index: usize,
    ) -> bool {
        #[cfg(debug_assertions)]
        let _call = {
            if self.in_policy.replace(true) {
                panic!(
                    "equality policy re-entered its hash table (probing hash {:#010x} at slot {})",
                    self.recs[index].hash, index
                );
            }
            PolicyCall(&self.in_policy)
        };
        #[cfg(not(debug_assertions))]
        let _ = index;
        equal.equal(value, stored, mutating, data)
    }

    fn probe<'a, D>(
        &'a self,
        equal: &dyn Equality<T, D>,
        data: &D,
        value: &T,
        hash: u32,
        mutating: bool,
    ) -> Option<Match<'a, T>> {
        let home = self.home(hash);
        let budget = self.recs[home].cluster_len as usize;
        self.scan(equal, data, home, budget, value, hash, mutating)
    }

    /// Store `value` in the first free slot at or after its home, growing
    /// the cluster when that slot lies past the current tail. The caller
    /// guarantees a free slot exists.
    fn place(&mut self, value: T, hash: u32) {
        let mask = self.mask();
        let home = hash as usize & mask;
        let mut index = home;
        let mut dist = 0usize;
        while self.recs[index].is_filled() {
            index = (index + 1) & mask;
            dist += 1;
            debug_assert!(dist < self.recs.len(), "place on a full table");
        }

        let rec = &mut self.recs[index];
        rec.hash = hash;
        rec.slot = Slot::Filled(value);

        let home_rec = &mut self.recs[home];
        if dist >= home_rec.cluster_len as usize {
            home_rec.cluster_len = dist as u32 + 1;
        }
        self.used += 1;
    }

    /// Turn the filled slot at `index` into a tombstone and collapse its
    /// cluster tail.
    fn take(&mut self, index: usize) -> Option<T> {
        let slot = &mut self.recs[index].slot;
        let value = match core::mem::replace(slot, Slot::Deleted) {
            Slot::Filled(value) => value,
            other => {
                *slot = other;
                return None;
            }
        };
        self.used -= 1;
        let home = self.home(self.recs[index].hash);
        self.collapse_tail(home);
        Some(value)
    }

    /// Shorten the cluster at `home` until it ends with one of its own
    /// filled members, emptying its own tombstones on the way.
    fn collapse_tail(&mut self, home: usize) {
        let mask = self.mask();
        while self.recs[home].cluster_len > 0 {
            let tail = (home + self.recs[home].cluster_len as usize - 1) & mask;
            let rec = &mut self.recs[tail];
            let member = rec.hash as usize & mask == home;
            match rec.slot {
                Slot::Filled(_) if member => break,
                Slot::Deleted if member => rec.slot = Slot::Empty,
                _ => {}
            }
            self.recs[home].cluster_len -= 1;
        }
    }

    /// Re-place every stored value into a fresh array of `capacity`
    /// records. Tombstones are dropped and cluster lengths rebuilt. On
    /// allocation failure nothing is changed.
    fn rehash(&mut self, capacity: u32) -> Result<(), TableError> {
        debug_assert!(capacity.is_power_of_two() && capacity > self.used);
        let fresh = alloc_records(capacity)?;
        let old = core::mem::replace(&mut self.recs, fresh);
        self.used = 0;
        for rec in old {
            if let Slot::Filled(value) = rec.slot {
                self.place(value, rec.hash);
            }
        }
        Ok(())
    }

    /// Best-effort resize: a failure is logged and the table stays as is.
    fn resize(&mut self, capacity: u32) {
        let old = self.capacity();
        match self.rehash(capacity) {
            Ok(()) => log::debug!(
                "resized hash table from {} to {} records ({} used)",
                old,
                capacity,
                self.used
            ),
            Err(e) => log::warn!("keeping hash table at {} records: {}", old, e),
        }
    }
}

/// Open-addressing hash table over values of type `T`, with an equality
/// policy and opaque user data of type `D`.
///
/// Duplicate values are allowed as far as the policy allows them: `insert`
/// refuses a value only if the policy (called with `mutating = true`)
/// reports an equal one already stored.
///
/// The table holds its policy behind an `Rc` and is single-threaded.
pub struct HashTable<T, D = ()> {
    raw: RawTable<T>,
    equal: EqualFn<T, D>,
    data: Rc<D>,
    resize: ResizeMode,
    /// Set once the load has reached `FIRST_SHRINK_PERCENTAGE`.
    shrink_armed: bool,
}

impl<T> HashTable<T> {
    /// Create an empty table whose policy takes no user data.
    pub fn new<E>(capacity: u32, equal: E, resize: ResizeMode) -> Result<Self, TableError>
    where
        E: Equality<T> + 'static,
    {
        Self::with_data(capacity, equal, Rc::new(()), resize)
    }
}

/// Iterator over the stored values in slot order.
pub struct Iter<'a, T> {
    it: core::slice::Iter<'a, Record<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.by_ref().find_map(|rec| match &rec.slot {
            Slot::Filled(value) => Some(value),
            _ => None,
        })
    }
}

impl<T, D> HashTable<T, D> {
    /// Create an empty table with `capacity` records.
    ///
    /// `capacity` must be a power of two; smaller than [`MIN_CAPACITY`] is
    /// raised to it.
    pub fn with_data<E>(
        capacity: u32,
        equal: E,
        data: Rc<D>,
        resize: ResizeMode,
    ) -> Result<Self, TableError>
    where
        E: Equality<T, D> + 'static,
    {
        if !capacity.is_power_of_two() {
            return Err(TableError::InvalidCapacity(capacity));
        }
        let recs = alloc_records(capacity.max(MIN_CAPACITY))?;
        Ok(Self {
            raw: RawTable::new(recs, 0),
            equal: Rc::new(equal),
            data,
            resize,
            shrink_armed: false,
        })
    }

    /// Replace the equality policy, returning the previous one.
    pub fn set_equal_fn(&mut self, equal: EqualFn<T, D>) -> EqualFn<T, D> {
        core::mem::replace(&mut self.equal, equal)
    }

    /// Replace the policy's user data, returning the previous data.
    pub fn set_equal_fn_data(&mut self, data: Rc<D>) -> Rc<D> {
        core::mem::replace(&mut self.data, data)
    }

    pub fn len(&self) -> usize {
        self.raw.used as usize
    }

    pub fn is_empty(&self) -> bool {
        self.raw.used == 0
    }

    /// Number of records currently allocated; always a power of two.
    pub fn capacity(&self) -> u32 {
        self.raw.capacity()
    }

    pub fn resize_mode(&self) -> ResizeMode {
        self.resize
    }

    /// Find the first stored value with `hash` that the policy (called with
    /// `mutating = false`) reports equal to `value`.
    pub fn find(&self, value: &T, hash: u32) -> Option<Match<'_, T>> {
        self.raw
            .probe(&*self.equal, &*self.data, value, hash, false)
    }

    /// Continue a lookup after `prev`: the next value in the same cluster
    /// with `hash` that the policy reports equal to `prev`'s value.
    pub fn find_next(&self, prev: &Match<'_, T>, hash: u32) -> Option<Match<'_, T>> {
        let mask = self.raw.mask();
        let home = self.raw.home(hash);
        let len = self.raw.recs[home].cluster_len as usize;
        let offset = prev.index.wrapping_sub(home) & mask;
        if offset >= len {
            return None;
        }
        self.raw.scan(
            &*self.equal,
            &*self.data,
            (prev.index + 1) & mask,
            len - offset - 1,
            prev.value,
            hash,
            false,
        )
    }

    /// Every stored value `find` and `find_next` would enumerate, in
    /// cluster scan order.
    pub fn matches<'a>(&'a self, value: &T, hash: u32) -> impl Iterator<Item = &'a T> + 'a {
        let mut cur = self.find(value, hash);
        core::iter::from_fn(move || {
            let m = cur?;
            cur = self.find_next(&m, hash);
            Some(m.value())
        })
    }

    pub fn contains(&self, value: &T, hash: u32) -> bool {
        self.find(value, hash).is_some()
    }

    /// Insert `value` under `hash`.
    ///
    /// Returns `Insert::Present` without touching the table if the policy
    /// (called with `mutating = true`) reports an equal stored value. A
    /// resize triggered by the insert is best-effort and never undoes it.
    pub fn insert(&mut self, value: T, hash: u32) -> Result<Insert<T>, TableError> {
        if self
            .raw
            .probe(&*self.equal, &*self.data, &value, hash, true)
            .is_some()
        {
            return Ok(Insert::Present(value));
        }
        if self.raw.used == self.raw.capacity() {
            return Err(TableError::Full(self.raw.capacity()));
        }
        self.raw.place(value, hash);

        if self.resize != ResizeMode::Disabled {
            let load = self.raw.load_percent();
            if load >= FIRST_SHRINK_PERCENTAGE {
                self.shrink_armed = true;
            }
            if load >= ENLARGE_PERCENTAGE {
                if let Some(capacity) = self.raw.capacity().checked_mul(2) {
                    self.raw.resize(capacity);
                }
            }
        }
        Ok(Insert::Inserted)
    }

    /// Remove the stored value the policy (called with `mutating = true`)
    /// reports equal to `value`, handing it back.
    pub fn remove(&mut self, value: &T, hash: u32) -> Option<T> {
        let index = self
            .raw
            .probe(&*self.equal, &*self.data, value, hash, true)?
            .index;
        let removed = self.raw.take(index)?;

        if self.resize == ResizeMode::EnlargeAndShrink
            && self.shrink_armed
            && self.raw.capacity() > MIN_CAPACITY
            && self.raw.load_percent() < SHRINK_PERCENTAGE
        {
            let capacity = self.raw.capacity() / 2;
            self.raw.resize(capacity);
        }
        Some(removed)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            it: self.raw.recs.iter(),
        }
    }

    /// Duplicate the table: same capacity, a copy of every record, and the
    /// same policy and user data (shared, not copied).
    pub fn dup(&self) -> Result<Self, TableError>
    where
        T: Clone,
    {
        let mut recs = Vec::new();
        recs.try_reserve_exact(self.raw.recs.len())
            .map_err(|_| TableError::AllocFailed(self.raw.capacity()))?;
        recs.extend(self.raw.recs.iter().cloned());
        Ok(Self {
            raw: RawTable::new(recs, self.raw.used),
            equal: Rc::clone(&self.equal),
            data: Rc::clone(&self.data),
            resize: self.resize,
            shrink_armed: self.shrink_armed,
        })
    }

    /// Check the structural invariants, panicking on the first violation.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let recs = &self.raw.recs;
        let cap = recs.len();
        assert!(cap.is_power_of_two(), "capacity {} is not a power of two", cap);
        assert!(cap >= MIN_CAPACITY as usize, "capacity {} below minimum", cap);
        let mask = cap - 1;

        let filled = recs.iter().filter(|r| r.is_filled()).count();
        assert_eq!(filled, self.raw.used as usize, "occupied count drifted");

        for (index, rec) in recs.iter().enumerate() {
            if matches!(rec.slot, Slot::Empty) {
                continue;
            }
            let home = rec.hash as usize & mask;
            let offset = index.wrapping_sub(home) & mask;
            assert!(
                offset < recs[home].cluster_len as usize,
                "slot {} lies outside the cluster homed at {}",
                index,
                home
            );
        }

        for (home, rec) in recs.iter().enumerate() {
            if rec.cluster_len == 0 {
                continue;
            }
            let tail = &recs[(home + rec.cluster_len as usize - 1) & mask];
            assert!(
                tail.is_filled() && tail.hash as usize & mask == home,
                "cluster homed at {} does not end with one of its members",
                home
            );
        }
    }
}

impl<T: fmt::Debug, D> fmt::Debug for HashTable<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field("capacity", &self.raw.capacity())
            .field("used", &self.raw.used)
            .field("resize", &self.resize)
            .field("values", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}
