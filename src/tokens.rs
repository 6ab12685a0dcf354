//! Linear reference tokens and the bounded entry counter.
//!
//! Tokens are zero-sized proofs that a unit was acquired from a
//! particular counter instance. The only valid way to dispose of one is to
//! return it to the originating counter via `Count::put`; in debug builds a
//! token dropped any other way panics.

use core::cell::Cell;
use core::marker::PhantomData;

/// Largest reference count a dictionary entry may carry (2^22 - 1).
pub const DICT_MAX_REFCOUNT: u32 = 0x003f_ffff;

/// Zero-sized, linear token tied to its originating counter via lifetime.
pub struct Token<'a, C: ?Sized> {
    // Lifetime is tracked separately from the counter type to avoid
    // imposing `'a` bounds on `C`. `fn() -> C` keeps the token Send + Sync
    // so handles can cross threads.
    _lt: PhantomData<&'a ()>,
    _ctr: PhantomData<fn() -> C>,
}

impl<'a, C: ?Sized> Token<'a, C> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            _lt: PhantomData,
            _ctr: PhantomData,
        }
    }
}

impl<'a, C: ?Sized> Drop for Token<'a, C> {
    fn drop(&mut self) {
        // Fail fast on misuse, but never turn an unwind into an abort.
        #[cfg(debug_assertions)]
        if !std::thread::panicking() {
            panic!("Token dropped without Count::put");
        }
    }
}

/// A source of counted references, enforced by linear Token flow.
pub trait Count {
    /// The token type minted by this counter.
    type Token<'a>: Sized
    where
        Self: 'a;

    /// Acquire one counted reference, or `None` when the counter is
    /// saturated.
    ///
    /// Tokens are minted with a 'static lifetime parameter. The token is
    /// still branded to this counter via its type parameter, and can be
    /// covariantly shortened when returning it via `put`.
    fn get(&self) -> Option<Self::Token<'static>>;

    /// Return (consume) a previously acquired token.
    /// Returns true if the count is now zero.
    fn put<'a>(&'a self, t: Self::Token<'a>) -> bool;
}

/// Reference counter bounded to [`DICT_MAX_REFCOUNT`].
#[derive(Debug)]
pub struct RefCount {
    count: Cell<u32>,
}

impl RefCount {
    pub fn new(initial: u32) -> Self {
        debug_assert!(initial <= DICT_MAX_REFCOUNT);
        Self {
            count: Cell::new(initial),
        }
    }

    pub fn current(&self) -> u32 {
        self.count.get()
    }
}

impl Count for RefCount {
    type Token<'a>
        = Token<'a, Self>
    where
        Self: 'a;

    #[inline]
    fn get(&self) -> Option<Self::Token<'static>> {
        let c = self.count.get();
        if c >= DICT_MAX_REFCOUNT {
            return None;
        }
        self.count.set(c + 1);
        Some(Token::<'static, Self>::new())
    }

    #[inline]
    fn put<'a>(&'a self, t: Self::Token<'a>) -> bool {
        let c = self.count.get();
        assert!(c > 0, "RefCount underflow");
        let n = c - 1;
        self.count.set(n);
        core::mem::forget(t);
        n == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_put_balance() {
        let c = RefCount::new(0);
        let t1 = c.get().unwrap();
        let t2 = c.get().unwrap();
        assert_eq!(c.current(), 2);
        assert!(!c.put(t1));
        assert!(c.put(t2));
        assert_eq!(c.current(), 0);
    }

    /// Invariant: the counter saturates at the bound instead of wrapping,
    /// and a refused `get` leaves the count unchanged.
    #[test]
    fn get_refuses_past_bound() {
        let c = RefCount::new(DICT_MAX_REFCOUNT - 1);
        let t = c.get().expect("last unit below the bound");
        assert_eq!(c.current(), DICT_MAX_REFCOUNT);
        assert!(c.get().is_none());
        assert_eq!(c.current(), DICT_MAX_REFCOUNT);
        assert!(!c.put(t));
        assert_eq!(c.current(), DICT_MAX_REFCOUNT - 1);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn dropping_token_without_put_panics() {
        let res = std::panic::catch_unwind(|| {
            let c = RefCount::new(0);
            let t = c.get().unwrap();
            drop(t);
        });
        assert!(res.is_err(), "expected panic when a token is dropped");
    }
}
