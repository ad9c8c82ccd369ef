/// FNV-1a hashing for key indices.
///
/// Deterministic across runs, which keeps bucket layouts reproducible in
/// tests and benches. Any other `BuildHasher` can be plugged into a
/// `MultiIndex` instead.
use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};

/// Standard 64-bit FNV offset basis.
pub const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001b3;

/// FNV-1a 64-bit hash of `data` with a configurable starting basis.
#[must_use]
pub fn fnv1a_64(data: &[u8], basis: u64) -> u64 {
    let mut hash = basis;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Streaming FNV-1a hasher.
#[derive(Debug, Clone, Copy)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    /// Starts from a custom basis (a cheap way to get independent hashers).
    pub fn with_basis(basis: u64) -> Self {
        Self { state: basis }
    }
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self::with_basis(FNV_OFFSET_BASIS)
    }
}

impl Hasher for FnvHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.state = fnv1a_64(bytes, self.state);
    }

    fn finish(&self) -> u64 {
        self.state
    }
}

/// `BuildHasher` producing [`FnvHasher`]s; the default hasher of a
/// `MultiIndex`.
pub type FnvBuildHasher = BuildHasherDefault<FnvHasher>;

/// Hashes `key` with a fresh hasher from `build`.
#[inline]
pub fn hash_key<S, Q>(build: &S, key: &Q) -> u64
where
    S: BuildHasher,
    Q: Hash + ?Sized,
{
    let mut state = build.build_hasher();
    key.hash(&mut state);
    state.finish()
}
