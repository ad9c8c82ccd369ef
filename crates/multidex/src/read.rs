/// Read path: positional access and key lookups.
///
/// Key lookups only touch the index of the requested slot plus the rows it
/// points at; positional access only touches the store. A miss is `None`,
/// `false` or `0`, never an error.
use crate::error::{MultiIndexError, Result};
use crate::keys::{KeyAt, KeySet};
use crate::range::EqualRange;
use crate::row::Row;
use crate::MultiIndex;
use keyindex::hash_key;
use std::hash::BuildHasher;

impl<V, K: KeySet, S: BuildHasher> MultiIndex<V, K, S> {
    /// Row at `pos`, or `None` past the end.
    pub fn get(&self, pos: usize) -> Option<&Row<V, K>> {
        self.rows.get(pos)
    }

    /// Bounds-checked positional access.
    ///
    /// # Errors
    ///
    /// [`MultiIndexError::OutOfRange`] when `pos >= len()`.
    pub fn at(&self, pos: usize) -> Result<&Row<V, K>> {
        self.rows.get(pos).ok_or(MultiIndexError::OutOfRange {
            index: pos,
            len: self.rows.len(),
        })
    }

    pub fn first(&self) -> Option<&Row<V, K>> {
        self.rows.first()
    }

    pub fn last(&self) -> Option<&Row<V, K>> {
        self.rows.last()
    }

    /// First row whose key in `SLOT` equals `key`.
    pub fn find<const SLOT: usize>(&self, key: &<K as KeyAt<SLOT>>::Key) -> Option<&Row<V, K>>
    where
        K: KeyAt<SLOT>,
    {
        self.position::<SLOT>(key).map(|pos| &self.rows[pos])
    }

    /// Position of the first row whose key in `SLOT` equals `key`.
    pub fn position<const SLOT: usize>(&self, key: &<K as KeyAt<SLOT>>::Key) -> Option<usize>
    where
        K: KeyAt<SLOT>,
    {
        let rows = self.rows.as_slice();
        self.indices
            .slot(SLOT)
            .find(hash_key(&self.hasher, key), |p| rows[p].key::<SLOT>() == key)
    }

    /// Every row whose key in `SLOT` equals `key`, in bucket-run order.
    pub fn equal_range<const SLOT: usize>(&self, key: &<K as KeyAt<SLOT>>::Key) -> EqualRange<'_, V, K>
    where
        K: KeyAt<SLOT>,
    {
        let rows = self.rows.as_slice();
        let run = self
            .indices
            .slot(SLOT)
            .equal_run(hash_key(&self.hasher, key), |p| rows[p].key::<SLOT>() == key);
        EqualRange::new(rows, run)
    }

    /// Number of rows whose key in `SLOT` equals `key`.
    pub fn count<const SLOT: usize>(&self, key: &<K as KeyAt<SLOT>>::Key) -> usize
    where
        K: KeyAt<SLOT>,
    {
        self.equal_range::<SLOT>(key).len()
    }

    pub fn contains<const SLOT: usize>(&self, key: &<K as KeyAt<SLOT>>::Key) -> bool
    where
        K: KeyAt<SLOT>,
    {
        self.position::<SLOT>(key).is_some()
    }
}
