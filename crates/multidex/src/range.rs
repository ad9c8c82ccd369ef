use crate::row::Row;
use std::iter::FusedIterator;
use std::slice;

/// Lazy view over the rows sharing one key value.
///
/// Walks the matching run of the key's bucket, so rows come out in bucket
/// order (insertion order for rows added with that key), which is not
/// necessarily positional order. Nothing is copied.
pub struct EqualRange<'a, V, K> {
    rows: &'a [Row<V, K>],
    positions: slice::Iter<'a, usize>,
}

impl<'a, V, K> EqualRange<'a, V, K> {
    pub(crate) fn new(rows: &'a [Row<V, K>], positions: &'a [usize]) -> Self {
        Self {
            rows,
            positions: positions.iter(),
        }
    }

    /// Store positions of the rows not yet yielded.
    pub fn positions(&self) -> &'a [usize] {
        self.positions.as_slice()
    }
}

impl<V, K> Clone for EqualRange<'_, V, K> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows,
            positions: self.positions.clone(),
        }
    }
}

impl<'a, V, K> Iterator for EqualRange<'a, V, K> {
    type Item = &'a Row<V, K>;

    fn next(&mut self) -> Option<Self::Item> {
        let rows = self.rows;
        self.positions.next().map(|&pos| &rows[pos])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl<V, K> DoubleEndedIterator for EqualRange<'_, V, K> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let rows = self.rows;
        self.positions.next_back().map(|&pos| &rows[pos])
    }
}

impl<V, K> ExactSizeIterator for EqualRange<'_, V, K> {}

impl<V, K> FusedIterator for EqualRange<'_, V, K> {}

impl<V: std::fmt::Debug, K: std::fmt::Debug> std::fmt::Debug for EqualRange<'_, V, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}
