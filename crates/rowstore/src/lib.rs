//! # RowStore - contiguous row storage
//!
//! A growable buffer that owns every row of a `MultiIndex`. Rows live in one
//! allocation, in insertion order, with no gaps:
//!
//! ```text
//! ptr ──► [ row 0 | row 1 | ... | row len-1 | (uninit) ... ]
//!           ◄──────────── len ────────────►
//!           ◄──────────────────── cap ──────────────────────►
//! ```
//!
//! Growth goes through `realloc`, so the allocator may extend the block in
//! place. Moving a row is a bitwise copy that cannot fail; the only failure
//! during growth is the allocation itself, and in that case the old block is
//! left untouched (strong guarantee).
//!
//! A full store grows to [`config::TableConfig::next_capacity`] of its
//! capacity, which is `max(cap * 2, 5)` with the default config.
//!
//! Any capacity change, removal or pop invalidates outstanding references;
//! the borrow checker enforces this.
//!
//! ## Example
//!
//! ```rust
//! use rowstore::RowStore;
//!
//! let mut store = RowStore::new();
//! store.push("a").unwrap();
//! store.push("b").unwrap();
//! assert_eq!(store.capacity(), 5);
//! assert_eq!(store.remove(0).unwrap(), "a");
//! assert_eq!(store.as_slice(), &["b"]);
//! ```
use config::TableConfig;
use std::alloc::{self, Layout};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut, Index, IndexMut, Range};
use std::ptr::{self, NonNull};
use std::slice;

use thiserror::Error;

/// Errors reported by [`RowStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Checked positional access past the end.
    #[error("index {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize },

    /// A removal range that is reversed or extends past the end.
    #[error("range {start}..{end} out of range for length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// The requested capacity does not fit in the address space.
    #[error("capacity overflow: cannot hold {requested} rows")]
    CapacityOverflow { requested: usize },

    /// The allocator returned null.
    #[error("allocation of {bytes} bytes failed")]
    AllocFailed { bytes: usize },
}

/// Contiguous, capacity-managed storage with manual construction and
/// destruction of its elements.
pub struct RowStore<T> {
    ptr: NonNull<T>,
    len: usize,
    cap: usize,
    /// Growth policy; only `min_capacity` and `growth_factor` are read.
    config: TableConfig,
    _marker: PhantomData<T>,
}

// SAFETY: RowStore owns its elements exactly like Vec<T>.
unsafe impl<T: Send> Send for RowStore<T> {}
// SAFETY: shared access only hands out &T.
unsafe impl<T: Sync> Sync for RowStore<T> {}

impl<T> RowStore<T> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    /// Creates an empty store with the default growth policy. Does not
    /// allocate.
    pub fn new() -> Self {
        Self::with_config(&TableConfig::default())
    }

    /// Creates an empty store with a custom growth policy.
    ///
    /// `min_capacity` is clamped to at least 1 and `growth_factor` to at
    /// least 2.
    pub fn with_growth(min_capacity: usize, growth_factor: usize) -> Self {
        Self::with_config(&TableConfig {
            min_capacity,
            growth_factor,
            ..TableConfig::default()
        })
    }

    /// Creates an empty store using the growth policy of `cfg`, clamped the
    /// same way as [`RowStore::with_growth`].
    pub fn with_config(cfg: &TableConfig) -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            cap: if Self::IS_ZST { usize::MAX } else { 0 },
            config: TableConfig {
                min_capacity: cfg.min_capacity.max(1),
                growth_factor: cfg.growth_factor.max(2),
                ..*cfg
            },
            _marker: PhantomData,
        }
    }

    /// Growth policy in effect.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Creates an empty store able to hold `capacity` rows without growing.
    pub fn with_capacity(capacity: usize) -> Result<Self, StoreError> {
        let mut store = Self::new();
        store.reserve(capacity)?;
        Ok(store)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` slots are initialized; a dangling pointer is
        // valid for an empty slice.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: see `as_slice`; `&mut self` guarantees uniqueness.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Bounds-checked access.
    pub fn at(&self, index: usize) -> Result<&T, StoreError> {
        self.as_slice().get(index).ok_or(StoreError::OutOfRange {
            index,
            len: self.len,
        })
    }

    /// Bounds-checked mutable access.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T, StoreError> {
        let len = self.len;
        self.as_mut_slice()
            .get_mut(index)
            .ok_or(StoreError::OutOfRange { index, len })
    }

    /// Capacity the store grows to the next time it is full: the config's
    /// [`TableConfig::next_capacity`], never less than `len + 1`.
    pub fn next_capacity(&self) -> Result<usize, StoreError> {
        self.config
            .next_capacity(self.cap)
            .zip(self.len.checked_add(1))
            .map(|(grown, floor)| grown.max(floor))
            .ok_or(StoreError::CapacityOverflow {
                requested: usize::MAX,
            })
    }

    /// Grows the capacity to at least `capacity` rows (a total, not an
    /// increment). Never shrinks.
    ///
    /// On error nothing changes: the existing rows stay where they are.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), StoreError> {
        if capacity <= self.cap {
            return Ok(());
        }
        self.reallocate(capacity)
    }

    /// Appends `value`, growing when full, and returns its position.
    pub fn push(&mut self, value: T) -> Result<usize, StoreError> {
        if self.len == self.cap {
            let next = self.next_capacity()?;
            self.reserve(next)?;
        }
        let pos = self.len;
        // SAFETY: pos < cap after the reserve above; the slot is uninit.
        unsafe {
            ptr::write(self.ptr.as_ptr().add(pos), value);
        }
        self.len += 1;
        Ok(pos)
    }

    /// Removes and returns the last row.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the slot at the old `len - 1` was initialized and is now
        // outside the live range, so it is read exactly once.
        Some(unsafe { ptr::read(self.ptr.as_ptr().add(self.len)) })
    }

    /// Removes the row at `pos`, moving every later row down by one.
    pub fn remove(&mut self, pos: usize) -> Result<T, StoreError> {
        if pos >= self.len {
            return Err(StoreError::OutOfRange {
                index: pos,
                len: self.len,
            });
        }
        // SAFETY: pos < len. The removed row is read out before the tail is
        // copied over its slot.
        unsafe {
            let slot = self.ptr.as_ptr().add(pos);
            let value = ptr::read(slot);
            ptr::copy(slot.add(1), slot, self.len - pos - 1);
            self.len -= 1;
            Ok(value)
        }
    }

    /// Removes the rows in `range`, moving the tail down to close the gap.
    pub fn remove_range(&mut self, range: Range<usize>) -> Result<Vec<T>, StoreError> {
        let Range { start, end } = range;
        if start > end || end > self.len {
            return Err(StoreError::InvalidRange {
                start,
                end,
                len: self.len,
            });
        }

        let mut removed = Vec::with_capacity(end - start);
        // SAFETY: start..end lies within the live range. Every removed row is
        // read exactly once, then the tail is moved over the vacated slots.
        // `removed` has room for every push, so nothing in here can unwind.
        unsafe {
            let base = self.ptr.as_ptr();
            for i in start..end {
                removed.push(ptr::read(base.add(i)));
            }
            ptr::copy(base.add(end), base.add(start), self.len - end);
        }
        self.len -= end - start;
        Ok(removed)
    }

    /// Drops every row at or after `len`.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        // SAFETY: `len..self.len` are initialized. `self.len` is lowered
        // first so a panicking destructor cannot cause a double drop.
        unsafe {
            let tail = ptr::slice_from_raw_parts_mut(self.ptr.as_ptr().add(len), self.len - len);
            self.len = len;
            ptr::drop_in_place(tail);
        }
    }

    /// Drops every row, keeping the allocation.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Shrinks the allocation to exactly `len` rows (freeing it when empty).
    pub fn shrink_to_fit(&mut self) -> Result<(), StoreError> {
        if Self::IS_ZST || self.cap == self.len {
            return Ok(());
        }

        if self.len == 0 {
            // SAFETY: cap > 0, so the block was allocated with this layout.
            unsafe {
                alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout());
            }
            self.ptr = NonNull::dangling();
            self.cap = 0;
            return Ok(());
        }

        let new_layout = Self::layout_for(self.len)?;
        // SAFETY: the block was allocated with `self.layout()`; the new size
        // is non-zero and was validated by `Layout::array`.
        let raw = unsafe {
            alloc::realloc(
                self.ptr.as_ptr().cast::<u8>(),
                self.layout(),
                new_layout.size(),
            )
        };
        self.ptr = NonNull::new(raw.cast::<T>()).ok_or(StoreError::AllocFailed {
            bytes: new_layout.size(),
        })?;
        self.cap = self.len;
        Ok(())
    }

    /// Moves every row into a `Vec`, consuming the store.
    pub fn into_vec(mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        // SAFETY: each live row is read exactly once; `len` is then zeroed so
        // Drop only releases the block.
        unsafe {
            for i in 0..self.len {
                out.push(ptr::read(self.ptr.as_ptr().add(i)));
            }
        }
        self.len = 0;
        out
    }

    // ---- Internal helpers ----

    fn layout_for(capacity: usize) -> Result<Layout, StoreError> {
        Layout::array::<T>(capacity).map_err(|_| StoreError::CapacityOverflow {
            requested: capacity,
        })
    }

    /// Layout of the current block. Only meaningful when `cap > 0` and `T`
    /// is not zero-sized.
    fn layout(&self) -> Layout {
        // SAFETY: the same size/align pair passed `Layout::array` when the
        // block was allocated.
        unsafe { Layout::from_size_align_unchecked(mem::size_of::<T>() * self.cap, mem::align_of::<T>()) }
    }

    /// Moves the rows into a block of exactly `new_cap` slots.
    fn reallocate(&mut self, new_cap: usize) -> Result<(), StoreError> {
        debug_assert!(!Self::IS_ZST && new_cap > self.cap);

        let new_layout = Self::layout_for(new_cap)?;
        // SAFETY: `new_layout` has a non-zero size. When cap > 0 the block
        // was allocated with `self.layout()`.
        let raw = unsafe {
            if self.cap == 0 {
                alloc::alloc(new_layout)
            } else {
                alloc::realloc(
                    self.ptr.as_ptr().cast::<u8>(),
                    self.layout(),
                    new_layout.size(),
                )
            }
        };

        let ptr = NonNull::new(raw.cast::<T>()).ok_or(StoreError::AllocFailed {
            bytes: new_layout.size(),
        })?;

        tracing::debug!(from = self.cap, to = new_cap, len = self.len, "row store grown");
        self.ptr = ptr;
        self.cap = new_cap;
        Ok(())
    }
}

impl<T> Drop for RowStore<T> {
    fn drop(&mut self) {
        self.clear();
        if !Self::IS_ZST && self.cap > 0 {
            // SAFETY: the block was allocated with this layout.
            unsafe {
                alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout());
            }
        }
    }
}

impl<T> Default for RowStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for RowStore<T> {
    /// Deep copy with the same growth policy and a capacity of `len`.
    ///
    /// # Panics
    ///
    /// Like `Vec::clone`: panics with "capacity overflow" when `len` rows do
    /// not fit in a layout, and calls [`alloc::handle_alloc_error`] when the
    /// allocator fails.
    fn clone(&self) -> Self {
        let mut out = Self::with_config(&self.config);
        match out.reserve(self.len) {
            Ok(()) => {}
            Err(StoreError::AllocFailed { .. }) => {
                // `reserve` only fails this way after `layout_for` succeeded.
                if let Ok(layout) = Self::layout_for(self.len) {
                    alloc::handle_alloc_error(layout);
                }
                panic!("capacity overflow");
            }
            Err(_) => panic!("capacity overflow"),
        }
        for row in self.iter() {
            // SAFETY: out.len < out.cap; `len` is bumped per row so a
            // panicking clone leaves only initialized rows behind.
            unsafe {
                ptr::write(out.ptr.as_ptr().add(out.len), row.clone());
            }
            out.len += 1;
        }
        out
    }
}

impl<T> Deref for RowStore<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for RowStore<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> Index<usize> for RowStore<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T> IndexMut<usize> for RowStore<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.as_mut_slice()[index]
    }
}

impl<'a, T> IntoIterator for &'a RowStore<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for RowStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for RowStore<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for RowStore<T> {}

impl<T: PartialOrd> PartialOrd for RowStore<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.as_slice().partial_cmp(other.as_slice())
    }
}

impl<T: Ord> Ord for RowStore<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl<T: Hash> Hash for RowStore<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}
