/// Index set: one [`KeyIndex`] per declared key slot.
///
/// Slot `s` (1-based) lives at `indices[s - 1]`; the value slot 0 has no
/// index. Whole-row operations walk the slots in declaration order.
/// `insert` and `rehash` are transactional: when slot `j` fails, by error or
/// by a panicking `Hash`/`Eq` impl, slots `1..j` are put back before the
/// failure propagates.
use crate::error::{MultiIndexError, Result};
use crate::keys::KeySet;
use crate::row::Row;
use config::TableConfig;
use keyindex::{Bucket, IndexError, KeyIndex};
use std::hash::BuildHasher;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSet {
    indices: Vec<KeyIndex>,
}

impl IndexSet {
    pub(crate) fn new(count: usize, cfg: &TableConfig) -> Self {
        Self {
            indices: (0..count).map(|_| KeyIndex::with_config(cfg)).collect(),
        }
    }

    /// Number of indices (declared keys).
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Index of key slot `slot`, or `None` for slot 0 and undeclared slots.
    pub fn get(&self, slot: usize) -> Option<&KeyIndex> {
        slot.checked_sub(1).and_then(|i| self.indices.get(i))
    }

    /// Index of a declared key slot. Callers guarantee `1 <= slot <= len`.
    pub(crate) fn slot(&self, slot: usize) -> &KeyIndex {
        &self.indices[slot - 1]
    }

    pub(crate) fn slot_mut(&mut self, slot: usize) -> &mut KeyIndex {
        &mut self.indices[slot - 1]
    }

    /// True when some index has fewer than `buckets` buckets.
    pub(crate) fn needs_rehash(&self, buckets: usize) -> bool {
        self.indices.iter().any(|index| index.bucket_count() < buckets)
    }

    /// Indexes the row at `pos` under every key, slot 1 first.
    pub(crate) fn insert<V, K, S>(&mut self, rows: &[Row<V, K>], pos: usize, build: &S) -> std::result::Result<(), IndexError>
    where
        K: KeySet,
        S: BuildHasher,
    {
        let row = &rows[pos];
        let mut guard = InsertGuard {
            indices: &mut self.indices,
            pos,
            hashes: Vec::with_capacity(K::COUNT),
            committed: false,
        };

        for slot in 1..=K::COUNT {
            #[cfg(test)]
            refuse::check(slot)?;
            let hash = row.keys().hash_slot(slot, build);
            guard.indices[slot - 1].insert(pos, hash, |p| rows[p].keys().slot_eq(row.keys(), slot))?;
            guard.hashes.push(hash);
        }

        guard.committed = true;
        Ok(())
    }

    /// Rebuilds every index with `bucket_count` buckets (clamped to the
    /// minimum) and returns the previous buckets, slot 1 first.
    pub(crate) fn rehash<V, K, S>(
        &mut self,
        rows: &[Row<V, K>],
        bucket_count: usize,
        build: &S,
    ) -> std::result::Result<Vec<Vec<Bucket>>, IndexError>
    where
        K: KeySet,
        S: BuildHasher,
    {
        let mut guard = RehashGuard {
            indices: &mut self.indices,
            previous: Vec::with_capacity(K::COUNT),
            committed: false,
        };

        for slot in 1..=K::COUNT {
            let old = guard.indices[slot - 1].rehash(
                bucket_count,
                rows.len(),
                |p| rows[p].keys().hash_slot(slot, build),
                |a, b| rows[a].keys().slot_eq(rows[b].keys(), slot),
            )?;
            guard.previous.push(old);
        }

        guard.committed = true;
        Ok(std::mem::take(&mut guard.previous))
    }

    /// Puts back buckets returned by [`IndexSet::rehash`].
    pub(crate) fn restore(&mut self, previous: Vec<Vec<Bucket>>) {
        for (index, buckets) in self.indices.iter_mut().zip(previous) {
            index.restore(buckets);
        }
    }

    /// Removes `pos` from every index and renumbers the positions behind it.
    /// `hashes[s - 1]` is the hash of the row's key in slot `s`.
    pub(crate) fn erase(&mut self, pos: usize, hashes: &[u64]) {
        for (index, &hash) in self.indices.iter_mut().zip(hashes) {
            let found = index.erase(pos, hash);
            debug_assert!(found, "position {pos} missing from an index");
        }
    }

    /// Range form of [`IndexSet::erase`]; `hashes[s - 1][i]` belongs to
    /// position `range.start + i`.
    pub(crate) fn erase_range(&mut self, range: Range<usize>, hashes: &[Vec<u64>]) {
        for (index, slot_hashes) in self.indices.iter_mut().zip(hashes) {
            let removed = index.erase_run(range.clone(), slot_hashes);
            debug_assert_eq!(removed, range.len());
        }
    }

    /// Removes the last position from every index; nothing to renumber.
    pub(crate) fn unlink_last(&mut self, pos: usize, hashes: &[u64]) {
        for (index, &hash) in self.indices.iter_mut().zip(hashes) {
            index.unlink(pos, hash);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.indices.iter_mut().for_each(KeyIndex::clear);
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.indices.iter_mut().for_each(KeyIndex::shrink_to_fit);
    }

    /// Checks every index against `rows`.
    pub(crate) fn verify<V, K, S>(&self, rows: &[Row<V, K>], build: &S) -> Result<()>
    where
        K: KeySet,
        S: BuildHasher,
    {
        for (i, index) in self.indices.iter().enumerate() {
            let slot = i + 1;
            index
                .verify(
                    rows.len(),
                    |p| rows[p].keys().hash_slot(slot, build),
                    |a, b| rows[a].keys().slot_eq(rows[b].keys(), slot),
                )
                .map_err(|violation| MultiIndexError::Inconsistent { slot, violation })?;
        }
        Ok(())
    }
}

/// Forced allocation failures for exercising the error path of `insert`.
#[cfg(test)]
pub(crate) mod refuse {
    use keyindex::IndexError;
    use std::cell::Cell;

    thread_local! {
        static SLOT: Cell<Option<usize>> = const { Cell::new(None) };
    }

    /// Makes every insert on this thread fail at `slot`; `None` turns it off.
    pub(crate) fn insert_at(slot: Option<usize>) {
        SLOT.with(|s| s.set(slot));
    }

    pub(super) fn check(slot: usize) -> Result<(), IndexError> {
        if SLOT.with(Cell::get) != Some(slot) {
            return Ok(());
        }
        // Past isize::MAX; always refused before reaching the allocator.
        match Vec::<u8>::new().try_reserve(usize::MAX) {
            Err(err) => Err(IndexError::Alloc(err)),
            Ok(()) => Ok(()),
        }
    }
}

/// Unlinks a half-inserted position from the slots it already reached.
struct InsertGuard<'a> {
    indices: &'a mut [KeyIndex],
    pos: usize,
    /// Key hashes of the slots already inserted, slot 1 first.
    hashes: Vec<u64>,
    committed: bool,
}

impl Drop for InsertGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (index, &hash) in self.indices.iter_mut().zip(&self.hashes) {
            index.unlink(self.pos, hash);
        }
        tracing::warn!(
            pos = self.pos,
            rolled_back = self.hashes.len(),
            "index insert failed; earlier slots rolled back"
        );
    }
}

/// Restores the pre-rehash buckets of the slots already rebuilt.
struct RehashGuard<'a> {
    indices: &'a mut [KeyIndex],
    previous: Vec<Vec<Bucket>>,
    committed: bool,
}

impl Drop for RehashGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let restored = self.previous.len();
        for (index, buckets) in self.indices.iter_mut().zip(self.previous.drain(..)) {
            index.restore(buckets);
        }
        tracing::warn!(restored, "rehash failed; earlier slots restored");
    }
}
