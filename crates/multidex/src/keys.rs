/// Key declarations: how a tuple of keys maps onto numbered key slots.
///
/// A table declares its keys as a tuple, `(Endpoint, IpAddr, String)` say.
/// Tuple field `i` is key slot `i + 1`; slot 0 is the row's value and is
/// never indexed. [`KeyAt`] gives typed, compile-time access to one slot and
/// [`KeySet`] gives the slot-number dispatch used when a whole row is
/// (re)indexed. Both are implemented here for tuples of 1 to 8 keys.
use keyindex::hash_key;
use std::hash::{BuildHasher, Hash};

/// A tuple of keys, addressed by runtime slot number (1-based).
pub trait KeySet {
    /// Number of declared keys (and of indices).
    const COUNT: usize;

    /// Hash of the key in `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not in `1..=COUNT`.
    fn hash_slot<S: BuildHasher>(&self, slot: usize, build: &S) -> u64;

    /// Whether the keys in `slot` of `self` and `other` are equal.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not in `1..=COUNT`.
    fn slot_eq(&self, other: &Self, slot: usize) -> bool;
}

/// Typed access to the key in slot `SLOT`.
pub trait KeyAt<const SLOT: usize>: KeySet {
    type Key: Hash + Eq;

    fn key(&self) -> &Self::Key;

    fn key_mut(&mut self) -> &mut Self::Key;
}

macro_rules! key_at {
    ($slot:literal, $field:tt, $Key:ident, [$($T:ident),+]) => {
        impl<$($T: Hash + Eq),+> KeyAt<$slot> for ($($T,)+) {
            type Key = $Key;

            #[inline]
            fn key(&self) -> &$Key {
                &self.$field
            }

            #[inline]
            fn key_mut(&mut self) -> &mut $Key {
                &mut self.$field
            }
        }
    };
}

macro_rules! key_tuple {
    ($count:literal; $all:tt; $($slot:literal => $field:tt : $T:ident),+) => {
        impl<$($T: Hash + Eq),+> KeySet for ($($T,)+) {
            const COUNT: usize = $count;

            fn hash_slot<S: BuildHasher>(&self, slot: usize, build: &S) -> u64 {
                match slot {
                    $($slot => hash_key(build, &self.$field),)+
                    _ => panic!("key slot {} out of range 1..={}", slot, $count),
                }
            }

            fn slot_eq(&self, other: &Self, slot: usize) -> bool {
                match slot {
                    $($slot => self.$field == other.$field,)+
                    _ => panic!("key slot {} out of range 1..={}", slot, $count),
                }
            }
        }

        $(key_at!($slot, $field, $T, $all);)+
    };
}

key_tuple!(1; [A]; 1 => 0: A);
key_tuple!(2; [A, B]; 1 => 0: A, 2 => 1: B);
key_tuple!(3; [A, B, C]; 1 => 0: A, 2 => 1: B, 3 => 2: C);
key_tuple!(4; [A, B, C, D]; 1 => 0: A, 2 => 1: B, 3 => 2: C, 4 => 3: D);
key_tuple!(5; [A, B, C, D, E]; 1 => 0: A, 2 => 1: B, 3 => 2: C, 4 => 3: D, 5 => 4: E);
key_tuple!(6; [A, B, C, D, E, F]; 1 => 0: A, 2 => 1: B, 3 => 2: C, 4 => 3: D, 5 => 4: E, 6 => 5: F);
key_tuple!(7; [A, B, C, D, E, F, G]; 1 => 0: A, 2 => 1: B, 3 => 2: C, 4 => 3: D, 5 => 4: E, 6 => 5: F, 7 => 6: G);
key_tuple!(8; [A, B, C, D, E, F, G, H]; 1 => 0: A, 2 => 1: B, 3 => 2: C, 4 => 3: D, 5 => 4: E, 6 => 5: F, 7 => 6: G, 8 => 7: H);
