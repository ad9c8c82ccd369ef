//! # KeyIndex - hash-bucketed position lists
//!
//! One `KeyIndex` serves one declared key of a `MultiIndex`. It never stores
//! keys or rows, only integer positions into the row store, grouped into
//! buckets by `hash(key) % bucket_count`:
//!
//! ```text
//! bucket 0: [ 4 ]
//! bucket 1: [ 0, 3, 3', 7 ]      <- 3 and 3' share a key: one contiguous run
//! bucket 2: [ ]
//! bucket 3: [ 1, 2 ]
//! bucket 4: [ 5, 6 ]
//! ```
//!
//! The index is key-agnostic. Callers pass the hash of the key they care
//! about plus an `is_match(position) -> bool` predicate that compares the key
//! stored at a position with the query key, so hashing and equality are
//! injected per key type.
//!
//! ## Invariants (maintained together with the caller)
//!
//! - every live position sits in the bucket of its key's hash, exactly once;
//! - inside a bucket, positions whose keys compare equal are contiguous, so an
//!   equal-range lookup stops at the first mismatch after the first hit;
//! - after the row store closes a gap, [`KeyIndex::shift_down`] renumbers the
//!   positions behind it.
pub mod hash;

pub use hash::{fnv1a_64, hash_key, FnvBuildHasher, FnvHasher};

use config::{TableConfig, DEFAULT_MIN_BUCKETS};
use std::collections::TryReserveError;
use std::ops::Range;

use thiserror::Error;

/// Positions sharing one hash remainder.
pub type Bucket = Vec<usize>;

/// Errors that can occur while mutating a [`KeyIndex`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// A bucket or the bucket array could not grow.
    #[error("bucket allocation failed: {0}")]
    Alloc(#[from] TryReserveError),
}

/// A broken index invariant, reported by [`KeyIndex::verify`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("index holds {indexed} positions but the store has {rows} rows")]
    CountMismatch { indexed: usize, rows: usize },

    #[error("position {pos} is not indexed in its bucket {bucket}")]
    Missing { pos: usize, bucket: usize },

    #[error("position {pos} appears {times} times in bucket {bucket}")]
    Duplicate {
        pos: usize,
        bucket: usize,
        times: usize,
    },

    #[error("position {pos} in bucket {bucket} is past the end of the store")]
    Stale { pos: usize, bucket: usize },

    #[error("equal keys at positions {first} and {second} are split in bucket {bucket}")]
    SplitRun {
        bucket: usize,
        first: usize,
        second: usize,
    },
}

/// Where a position sits (or will sit) inside the bucket array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub bucket: usize,
    pub offset: usize,
}

/// Hash index over one key of the rows of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyIndex {
    buckets: Vec<Bucket>,
    /// Total number of positions across all buckets.
    len: usize,
    min_buckets: usize,
}

impl Default for KeyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyIndex {
    /// Creates an empty index with the default minimum of 5 buckets.
    pub fn new() -> Self {
        Self::with_min_buckets(DEFAULT_MIN_BUCKETS)
    }

    /// Creates an empty index with `min_buckets` buckets (at least 1). The
    /// bucket count never drops below this value.
    pub fn with_min_buckets(min_buckets: usize) -> Self {
        let min_buckets = min_buckets.max(1);
        Self {
            buckets: vec![Bucket::new(); min_buckets],
            len: 0,
            min_buckets,
        }
    }

    pub fn with_config(cfg: &TableConfig) -> Self {
        Self::with_min_buckets(cfg.min_buckets)
    }

    /// Number of positions stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn min_buckets(&self) -> usize {
        self.min_buckets
    }

    /// Positions stored in bucket `i`.
    pub fn bucket(&self, i: usize) -> &[usize] {
        &self.buckets[i]
    }

    #[inline]
    pub fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    /// First position whose key matches, or `None`.
    pub fn find<F>(&self, hash: u64, mut is_match: F) -> Option<usize>
    where
        F: FnMut(usize) -> bool,
    {
        self.buckets[self.bucket_of(hash)]
            .iter()
            .copied()
            .find(|&pos| is_match(pos))
    }

    /// The contiguous run of matching positions inside the key's bucket
    /// (empty on a miss). Ordered as stored in the bucket, which is not
    /// necessarily positional order.
    pub fn equal_run<F>(&self, hash: u64, is_match: F) -> &[usize]
    where
        F: FnMut(usize) -> bool,
    {
        let bucket = &self.buckets[self.bucket_of(hash)];
        match run_bounds(bucket, is_match) {
            Some(run) => &bucket[run],
            None => &[],
        }
    }

    /// Number of matching positions.
    pub fn count<F>(&self, hash: u64, is_match: F) -> usize
    where
        F: FnMut(usize) -> bool,
    {
        self.equal_run(hash, is_match).len()
    }

    pub fn contains<F>(&self, hash: u64, is_match: F) -> bool
    where
        F: FnMut(usize) -> bool,
    {
        self.find(hash, is_match).is_some()
    }

    /// Where a position with this key would be inserted: right after the
    /// existing equal run, else at the end of the bucket.
    pub fn placement<F>(&self, hash: u64, is_match: F) -> Placement
    where
        F: FnMut(usize) -> bool,
    {
        let bucket = self.bucket_of(hash);
        let slots = &self.buckets[bucket];
        let offset = run_bounds(slots, is_match).map_or(slots.len(), |run| run.end);
        Placement { bucket, offset }
    }

    /// Makes room for one more position at `placement`. Once this succeeds,
    /// [`KeyIndex::place`] cannot fail.
    pub fn reserve_at(&mut self, placement: Placement) -> Result<(), IndexError> {
        self.buckets[placement.bucket].try_reserve(1)?;
        Ok(())
    }

    /// Stores `pos` at `placement`. Call [`KeyIndex::reserve_at`] first.
    pub fn place(&mut self, placement: Placement, pos: usize) {
        self.buckets[placement.bucket].insert(placement.offset, pos);
        self.len += 1;
    }

    /// Indexes `pos` under `hash`, keeping equal keys contiguous.
    pub fn insert<F>(&mut self, pos: usize, hash: u64, is_match: F) -> Result<Placement, IndexError>
    where
        F: FnMut(usize) -> bool,
    {
        let placement = self.placement(hash, is_match);
        self.reserve_at(placement)?;
        self.place(placement, pos);
        Ok(placement)
    }

    /// Removes `pos` from the bucket of `hash` without renumbering anything.
    /// Returns where it was, or `None` if it was not there.
    pub fn unlink(&mut self, pos: usize, hash: u64) -> Option<Placement> {
        let bucket = self.bucket_of(hash);
        let offset = self.buckets[bucket].iter().position(|&p| p == pos)?;
        self.buckets[bucket].remove(offset);
        self.len -= 1;
        Some(Placement { bucket, offset })
    }

    /// Decrements by `by` every stored position that is `>= from`.
    pub fn shift_down(&mut self, from: usize, by: usize) {
        if by == 0 {
            return;
        }
        for bucket in &mut self.buckets {
            for pos in bucket.iter_mut().filter(|p| **p >= from) {
                *pos -= by;
            }
        }
    }

    /// Removes `pos` and renumbers every later position to follow the row
    /// store closing the gap. Returns whether `pos` was indexed.
    pub fn erase(&mut self, pos: usize, hash: u64) -> bool {
        let found = self.unlink(pos, hash).is_some();
        self.shift_down(pos + 1, 1);
        found
    }

    /// Range form of [`KeyIndex::erase`]: `hashes[i]` is the key hash of
    /// position `range.start + i`. One renumbering pass for the whole range.
    pub fn erase_run(&mut self, range: Range<usize>, hashes: &[u64]) -> usize {
        debug_assert_eq!(range.len(), hashes.len());
        let removed = range
            .clone()
            .zip(hashes)
            .filter(|&(pos, &hash)| self.unlink(pos, hash).is_some())
            .count();
        self.shift_down(range.end, range.len());
        removed
    }

    /// Rebuilds the buckets from scratch for rows `0..len`.
    ///
    /// `hash_of(pos)` gives the key hash of a row and `same_key(a, b)` tells
    /// whether two rows share a key. The bucket count is clamped to the
    /// minimum. On success the previous buckets are returned so a caller
    /// coordinating several indices can hand them back to
    /// [`KeyIndex::restore`]; on error the index is unchanged.
    pub fn rehash<H, E>(
        &mut self,
        bucket_count: usize,
        len: usize,
        mut hash_of: H,
        mut same_key: E,
    ) -> Result<Vec<Bucket>, IndexError>
    where
        H: FnMut(usize) -> u64,
        E: FnMut(usize, usize) -> bool,
    {
        let count = bucket_count.max(self.min_buckets);
        let mut buckets: Vec<Bucket> = Vec::new();
        buckets.try_reserve_exact(count)?;
        buckets.resize_with(count, Bucket::new);

        for pos in 0..len {
            let slots = &mut buckets[(hash_of(pos) % count as u64) as usize];
            let offset = run_bounds(slots, |p| same_key(p, pos)).map_or(slots.len(), |run| run.end);
            slots.try_reserve(1)?;
            slots.insert(offset, pos);
        }

        tracing::debug!(from = self.buckets.len(), to = count, entries = len, "key index rehashed");
        self.len = len;
        Ok(std::mem::replace(&mut self.buckets, buckets))
    }

    /// Puts back buckets returned by [`KeyIndex::rehash`].
    pub fn restore(&mut self, buckets: Vec<Bucket>) {
        self.len = buckets.iter().map(Vec::len).sum();
        self.buckets = buckets;
    }

    /// Empties every bucket, keeping the bucket count.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.len = 0;
    }

    /// Releases spare capacity held by individual buckets.
    pub fn shrink_to_fit(&mut self) {
        for bucket in &mut self.buckets {
            bucket.shrink_to_fit();
        }
    }

    /// Checks this index against a store of `rows` rows.
    pub fn verify<H, E>(&self, rows: usize, mut hash_of: H, mut same_key: E) -> Result<(), Violation>
    where
        H: FnMut(usize) -> u64,
        E: FnMut(usize, usize) -> bool,
    {
        if self.len != rows {
            return Err(Violation::CountMismatch {
                indexed: self.len,
                rows,
            });
        }

        for (bucket, slots) in self.buckets.iter().enumerate() {
            if let Some(&pos) = slots.iter().find(|&&p| p >= rows) {
                return Err(Violation::Stale { pos, bucket });
            }
        }

        for pos in 0..rows {
            let bucket = self.bucket_of(hash_of(pos));
            match self.buckets[bucket].iter().filter(|&&p| p == pos).count() {
                0 => return Err(Violation::Missing { pos, bucket }),
                1 => {}
                times => return Err(Violation::Duplicate { pos, bucket, times }),
            }
        }

        for (bucket, slots) in self.buckets.iter().enumerate() {
            // Heads of each run of equal keys; two heads must never match.
            let mut heads: Vec<usize> = Vec::new();
            for (i, &pos) in slots.iter().enumerate() {
                if i > 0 && same_key(slots[i - 1], pos) {
                    continue;
                }
                if let Some(&first) = heads.iter().find(|&&head| same_key(head, pos)) {
                    return Err(Violation::SplitRun {
                        bucket,
                        first,
                        second: pos,
                    });
                }
                heads.push(pos);
            }
        }

        Ok(())
    }
}

/// Offsets of the run of matching positions in `slots`, if any.
fn run_bounds<F>(slots: &[usize], mut is_match: F) -> Option<Range<usize>>
where
    F: FnMut(usize) -> bool,
{
    let start = slots.iter().position(|&p| is_match(p))?;
    let extra = slots[start + 1..]
        .iter()
        .take_while(|&&p| is_match(p))
        .count();
    Some(start..start + 1 + extra)
}
