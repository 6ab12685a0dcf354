//! Incremental 32-bit string hash.
//!
//! A key made of several parts is hashed by starting from `0`, folding each
//! part in with [`mix`], and finishing with `mix(hash, None)`. The mixer is
//! byte-serial (Jenkins' one-at-a-time), so the way a key is split into
//! parts never changes the digest.

use core::hash::{BuildHasher, Hasher};

/// Fold `part` into the running `hash`, or finalize it when `part` is `None`.
#[inline]
pub fn mix(mut hash: u32, part: Option<&[u8]>) -> u32 {
    match part {
        Some(bytes) => {
            for &b in bytes {
                hash = hash.wrapping_add(u32::from(b));
                hash = hash.wrapping_add(hash << 10);
                hash ^= hash >> 6;
            }
        }
        None => {
            hash = hash.wrapping_add(hash << 3);
            hash ^= hash >> 11;
            hash = hash.wrapping_add(hash << 15);
        }
    }
    hash
}

/// Finalized hash of a single chunk.
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    mix(mix(0, Some(bytes)), None)
}

#[inline]
pub fn hash_str(s: &str) -> u32 {
    hash_bytes(s.as_bytes())
}

/// `Hasher` adapter over [`mix`] for hashing structured keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct MixHasher {
    state: u32,
}

impl MixHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finalized 32-bit digest. The running state is left untouched so
    /// more parts may still be written.
    pub fn finish32(&self) -> u32 {
        mix(self.state, None)
    }
}

impl Hasher for MixHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.state = mix(self.state, Some(bytes));
    }

    fn finish(&self) -> u64 {
        u64::from(self.finish32())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BuildMixHasher;

impl BuildHasher for BuildMixHasher {
    type Hasher = MixHasher;
    fn build_hasher(&self) -> Self::Hasher {
        MixHasher::new()
    }
}
