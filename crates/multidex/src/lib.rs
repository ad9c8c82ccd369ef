//! # Multidex - contiguous rows, many hash indices
//!
//! [`MultiIndex`] stores rows contiguously, in insertion order, and keeps one
//! hash index per declared key so a row can be found in O(1) on average by
//! any of its keys.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────────────────────────────┐
//!                 │              MultiIndex               │
//!                 │                                       │
//!   push_back ──► │ RowStore   [ r0 | r1 | r2 | r3 | .. ] │ ◄── at / iter
//!                 │               ▲    ▲    ▲    ▲        │
//!                 │     positions │    │    │    │        │
//!                 │ IndexSet  ┌───┴────┴────┴────┴─────┐  │
//!   find::<K>  ─► │  slot 1   │ KeyIndex  buckets      │  │
//!   equal_range   │  slot 2   │ KeyIndex  buckets      │  │
//!                 │  ...      │ ...                    │  │
//!                 │           └────────────────────────┘  │
//!                 └───────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module        | Purpose                                                |
//! |---------------|--------------------------------------------------------|
//! | `lib.rs`      | `MultiIndex` struct, constructors, accessors, traits   |
//! | [`keys`]      | `KeySet` / `KeyAt` over key tuples                     |
//! | [`row`]       | `Row`: value plus key tuple                            |
//! | [`index_set`] | One `KeyIndex` per slot, transactional insert/rehash   |
//! | `read`        | `find`, `position`, `equal_range`, `count`, `contains` |
//! | `write`       | `push_back`, `set`, `erase`, `pop_back`, `reserve`, …  |
//! | [`range`]     | `EqualRange` iterator                                  |
//!
//! ## Consistency
//!
//! Every mutator leaves the store and all indices agreeing on which rows
//! exist and what their keys are. Growth and insertion are all-or-nothing:
//! a failed allocation, or a panic inside a key's `Hash`/`Eq`, unwinds the
//! slots already touched. Positions shift down on erase, so positions and
//! references must not be kept across mutating calls.
//!
//! ## Example
//!
//! ```rust
//! use multidex::MultiIndex;
//!
//! const NAME: usize = 1;
//! const TEAM: usize = 2;
//!
//! let mut players: MultiIndex<u32, (String, u8)> = MultiIndex::new();
//! players.emplace_back(100, ("ann".to_string(), 1)).unwrap();
//! players.emplace_back(250, ("bob".to_string(), 2)).unwrap();
//! players.emplace_back(75, ("cid".to_string(), 1)).unwrap();
//!
//! assert_eq!(players.find::<NAME>(&"bob".to_string()).unwrap().value, 250);
//! let team: Vec<u32> = players.equal_range::<TEAM>(&1).map(|r| r.value).collect();
//! assert_eq!(team, vec![100, 75]);
//! ```
pub mod error;
pub mod index_set;
pub mod keys;
pub mod range;
pub mod row;

mod read;
mod write;

pub use config::TableConfig;
pub use error::{MultiIndexError, Result};
pub use index_set::IndexSet;
pub use keyindex::{FnvBuildHasher, KeyIndex};
pub use keys::{KeyAt, KeySet};
pub use range::EqualRange;
pub use row::Row;

use rowstore::RowStore;
use std::cmp::Ordering;
use std::fmt;
use std::hash::BuildHasher;
use std::ops::Index;
use std::slice;

/// Rows of value `V` indexed by every key of the tuple `K`, hashed with `S`.
#[derive(Clone)]
pub struct MultiIndex<V, K, S = FnvBuildHasher> {
    pub(crate) rows: RowStore<Row<V, K>>,
    pub(crate) indices: IndexSet,
    pub(crate) hasher: S,
    pub(crate) config: TableConfig,
}

impl<V, K: KeySet> MultiIndex<V, K> {
    /// Creates an empty table with the default config and FNV hashing.
    pub fn new() -> Self {
        Self::with_config(TableConfig::default())
    }

    pub fn with_config(config: TableConfig) -> Self {
        Self::with_config_and_hasher(config, FnvBuildHasher::default())
    }
}

impl<V, K: KeySet> Default for MultiIndex<V, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, K: KeySet, S: BuildHasher> MultiIndex<V, K, S> {
    /// Creates an empty table hashing every key with `hasher`.
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_config_and_hasher(TableConfig::default(), hasher)
    }

    pub fn with_config_and_hasher(config: TableConfig, hasher: S) -> Self {
        Self {
            rows: RowStore::with_config(&config),
            indices: IndexSet::new(K::COUNT, &config),
            hasher,
            config,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows the store holds before it has to grow.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    /// Number of declared keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        K::COUNT
    }

    /// Bucket count of the index for key `slot`; `None` for slot 0 and
    /// undeclared slots.
    #[must_use]
    pub fn bucket_count(&self, slot: usize) -> Option<usize> {
        self.indices.get(slot).map(KeyIndex::bucket_count)
    }

    /// Read-only view of the per-key indices.
    pub fn indices(&self) -> &IndexSet {
        &self.indices
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Rows in positional order.
    pub fn as_slice(&self) -> &[Row<V, K>] {
        self.rows.as_slice()
    }

    pub fn iter(&self) -> slice::Iter<'_, Row<V, K>> {
        self.rows.iter()
    }

    /// Exchanges the contents of two tables.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Moves every row out in positional order.
    pub fn into_rows(self) -> Vec<Row<V, K>> {
        self.rows.into_vec()
    }

    /// Verifies that every index agrees with the store: each row is indexed
    /// exactly once per key, in the right bucket, with equal keys contiguous.
    pub fn check_consistency(&self) -> Result<()> {
        self.indices.verify(self.rows.as_slice(), &self.hasher)
    }
}

impl<V: fmt::Debug, K: fmt::Debug, S> fmt::Debug for MultiIndex<V, K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiIndex")
            .field("len", &self.rows.len())
            .field("capacity", &self.rows.capacity())
            .field("key_count", &self.indices.len())
            .field("rows", &self.rows)
            .finish()
    }
}

impl<V, K, S> Index<usize> for MultiIndex<V, K, S> {
    type Output = Row<V, K>;

    /// Unchecked-by-contract access; panics past the end like a slice.
    fn index(&self, pos: usize) -> &Row<V, K> {
        &self.rows[pos]
    }
}

impl<'a, V, K, S> IntoIterator for &'a MultiIndex<V, K, S> {
    type Item = &'a Row<V, K>;
    type IntoIter = slice::Iter<'a, Row<V, K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

// Comparisons are lexicographic over the positional sequence; indices and
// hashers do not take part.

impl<V: PartialEq, K: PartialEq, S> PartialEq for MultiIndex<V, K, S> {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
    }
}

impl<V: Eq, K: Eq, S> Eq for MultiIndex<V, K, S> {}

impl<V: PartialOrd, K: PartialOrd, S> PartialOrd for MultiIndex<V, K, S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.rows.partial_cmp(&other.rows)
    }
}

impl<V: Ord, K: Ord, S> Ord for MultiIndex<V, K, S> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rows.cmp(&other.rows)
    }
}

#[cfg(test)]
mod tests;
