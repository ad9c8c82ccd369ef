use crate::keys::KeyAt;

/// One stored unit: the value plus its key projections.
///
/// The value (slot 0) is public and freely writable through the table; keys
/// can only be rewritten through [`crate::MultiIndex::set`] so the indices
/// stay in sync.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Row<V, K> {
    pub value: V,
    keys: K,
}

impl<V, K> Row<V, K> {
    pub fn new(value: V, keys: K) -> Self {
        Self { value, keys }
    }

    /// All keys, as the declared tuple.
    pub fn keys(&self) -> &K {
        &self.keys
    }

    /// The key in slot `SLOT` (1-based).
    pub fn key<const SLOT: usize>(&self) -> &<K as KeyAt<SLOT>>::Key
    where
        K: KeyAt<SLOT>,
    {
        <K as KeyAt<SLOT>>::key(&self.keys)
    }

    pub fn into_parts(self) -> (V, K) {
        (self.value, self.keys)
    }

    pub(crate) fn keys_mut(&mut self) -> &mut K {
        &mut self.keys
    }
}

impl<V, K> From<(V, K)> for Row<V, K> {
    fn from((value, keys): (V, K)) -> Self {
        Self::new(value, keys)
    }
}
