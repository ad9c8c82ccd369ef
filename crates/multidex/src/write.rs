/// Write path: growth, append, re-keying and removal.
///
/// Appends touch the store first and then every index; removals touch every
/// index first and then compact the store. Any user code that can panic
/// (`Hash`/`Eq` of the keys) runs before the first mutation or under a
/// rollback guard, so a failed call leaves the table as it was.
use crate::error::{MultiIndexError, Result};
use crate::keys::{KeyAt, KeySet};
use crate::row::Row;
use crate::MultiIndex;
use keyindex::hash_key;
use rowstore::RowStore;
use std::hash::BuildHasher;
use std::mem;
use std::ops::Range;

impl<V, K: KeySet, S: BuildHasher> MultiIndex<V, K, S> {
    /// Grows the capacity to at least `capacity` rows and every index to at
    /// least as many buckets (never below the configured minimum).
    ///
    /// All-or-nothing: if the store cannot grow, the indices get their old
    /// buckets back.
    pub fn reserve(&mut self, capacity: usize) -> Result<()> {
        let buckets = self.config.buckets_for(capacity);
        let previous = if self.indices.needs_rehash(buckets) {
            Some(self.indices.rehash(self.rows.as_slice(), buckets, &self.hasher)?)
        } else {
            None
        };

        if let Err(err) = self.rows.reserve(capacity) {
            if let Some(previous) = previous {
                self.indices.restore(previous);
            }
            return Err(err.into());
        }

        tracing::debug!(capacity = self.rows.capacity(), buckets, "table reserved");
        Ok(())
    }

    /// Releases spare row capacity and spare bucket capacity. Bucket counts
    /// are kept.
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        self.rows.shrink_to_fit()?;
        self.indices.shrink_to_fit();
        Ok(())
    }

    /// Appends `row` and indexes it under every key. Returns its position.
    ///
    /// On error the table is unchanged and the row is dropped.
    pub fn push_back(&mut self, row: Row<V, K>) -> Result<usize> {
        if self.rows.len() == self.rows.capacity() {
            let next = self.rows.next_capacity()?;
            self.reserve(next)?;
        }

        let pos = self.rows.push(row)?;
        let mut pending = PendingRow {
            rows: &mut self.rows,
            armed: true,
        };
        self.indices.insert(pending.rows.as_slice(), pos, &self.hasher)?;
        pending.armed = false;
        Ok(pos)
    }

    /// Builds a row from its parts and appends it; see
    /// [`MultiIndex::push_back`].
    pub fn emplace_back(&mut self, value: V, keys: K) -> Result<usize> {
        self.push_back(Row::new(value, keys))
    }

    /// Replaces the key in `SLOT` of the row at `pos` and re-indexes that
    /// slot only. Returns the previous key.
    ///
    /// Writing a key equal to the current one leaves the index untouched.
    pub fn set<const SLOT: usize>(
        &mut self,
        pos: usize,
        key: <K as KeyAt<SLOT>>::Key,
    ) -> Result<<K as KeyAt<SLOT>>::Key>
    where
        K: KeyAt<SLOT>,
    {
        let len = self.rows.len();
        let current = self
            .rows
            .get(pos)
            .ok_or(MultiIndexError::OutOfRange { index: pos, len })?
            .key::<SLOT>();
        let unchanged = *current == key;
        let old_hash = hash_key(&self.hasher, current);

        if unchanged {
            return Ok(mem::replace(self.key_slot_mut::<SLOT>(pos), key));
        }

        let new_hash = hash_key(&self.hasher, &key);
        let rows = self.rows.as_slice();
        let index = self.indices.slot_mut(SLOT);
        let mut placement = index.placement(new_hash, |p| rows[p].key::<SLOT>() == &key);
        index.reserve_at(placement)?;

        let unlinked = index.unlink(pos, old_hash);
        debug_assert!(unlinked.is_some(), "position {pos} missing from slot {SLOT}");
        if let Some(old) = unlinked {
            if old.bucket == placement.bucket && old.offset < placement.offset {
                placement.offset -= 1;
            }
        }
        index.place(placement, pos);

        Ok(mem::replace(self.key_slot_mut::<SLOT>(pos), key))
    }

    /// Replaces the value (slot 0) of the row at `pos`. No index is touched.
    /// Returns the previous value.
    pub fn set_value(&mut self, pos: usize, value: V) -> Result<V> {
        let len = self.rows.len();
        let row = self
            .rows
            .get_mut(pos)
            .ok_or(MultiIndexError::OutOfRange { index: pos, len })?;
        Ok(mem::replace(&mut row.value, value))
    }

    /// Mutable access to the value of the row at `pos`.
    pub fn value_mut(&mut self, pos: usize) -> Option<&mut V> {
        self.rows.get_mut(pos).map(|row| &mut row.value)
    }

    /// Removes the row at `pos` from every index, then closes the gap in the
    /// store. Every later row moves down one position.
    pub fn erase(&mut self, pos: usize) -> Result<Row<V, K>> {
        let len = self.rows.len();
        if pos >= len {
            return Err(MultiIndexError::OutOfRange { index: pos, len });
        }

        let hashes = self.key_hashes(pos);
        self.indices.erase(pos, &hashes);
        let row = self.rows.remove(pos)?;
        tracing::trace!(pos, len = self.rows.len(), "row erased");
        Ok(row)
    }

    /// Removes the rows in `range`; later rows move down by `range.len()`.
    pub fn erase_range(&mut self, range: Range<usize>) -> Result<Vec<Row<V, K>>> {
        let len = self.rows.len();
        if range.start > range.end || range.end > len {
            return Err(MultiIndexError::InvalidRange {
                start: range.start,
                end: range.end,
                len,
            });
        }
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let hashes = self.range_hashes(range.clone());
        self.indices.erase_range(range.clone(), &hashes);
        let removed = self.rows.remove_range(range)?;
        tracing::trace!(removed = removed.len(), len = self.rows.len(), "rows erased");
        Ok(removed)
    }

    /// Removes and returns the last row.
    pub fn pop_back(&mut self) -> Option<Row<V, K>> {
        let pos = self.rows.len().checked_sub(1)?;
        let hashes = self.key_hashes(pos);
        self.indices.unlink_last(pos, &hashes);
        self.rows.pop()
    }

    /// Drops every row at or after `len`.
    pub fn truncate(&mut self, len: usize) {
        let current = self.rows.len();
        if len >= current {
            return;
        }
        let hashes = self.range_hashes(len..current);
        self.indices.erase_range(len..current, &hashes);
        self.rows.truncate(len);
    }

    /// Drops every row. Capacity and bucket counts are kept.
    pub fn clear(&mut self) {
        self.indices.clear();
        self.rows.clear();
    }

    // ---- Internal helpers ----

    /// Key hashes of the row at `pos`, slot 1 first.
    fn key_hashes(&self, pos: usize) -> Vec<u64> {
        let keys = self.rows[pos].keys();
        (1..=K::COUNT)
            .map(|slot| keys.hash_slot(slot, &self.hasher))
            .collect()
    }

    /// Key hashes of the rows in `range`, grouped per slot.
    fn range_hashes(&self, range: Range<usize>) -> Vec<Vec<u64>> {
        let rows = &self.rows.as_slice()[range];
        (1..=K::COUNT)
            .map(|slot| {
                rows.iter()
                    .map(|row| row.keys().hash_slot(slot, &self.hasher))
                    .collect()
            })
            .collect()
    }

    fn key_slot_mut<const SLOT: usize>(&mut self, pos: usize) -> &mut <K as KeyAt<SLOT>>::Key
    where
        K: KeyAt<SLOT>,
    {
        <K as KeyAt<SLOT>>::key_mut(self.rows[pos].keys_mut())
    }
}

/// Pops a freshly pushed row again unless disarmed, so a failed (or
/// panicking) index insert does not leave an unindexed row behind.
struct PendingRow<'a, T> {
    rows: &'a mut RowStore<T>,
    armed: bool,
}

impl<T> Drop for PendingRow<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            drop(self.rows.pop());
        }
    }
}
