use crate::MultiIndex;
use std::cell::Cell;
use std::hash::{Hash, Hasher};

pub const ID: usize = 1;
pub const NAME: usize = 2;
pub const GROUP: usize = 3;

/// (id, name, group) keyed table with a `u32` value.
pub type Table = MultiIndex<u32, (u32, String, u8)>;

/// Appends `n` rows: id `i`, name `row-i`, group `i % 3`, value `i * 10`.
pub fn filled(n: u32) -> Table {
    let mut table = Table::new();
    for i in 0..n {
        table
            .emplace_back(i * 10, (i, format!("row-{i}"), (i % 3) as u8))
            .unwrap();
    }
    table
}

pub fn name(s: &str) -> String {
    s.to_string()
}

thread_local! {
    static POISONED: Cell<bool> = const { Cell::new(false) };
}

/// Turns panicking [`Fragile`] hashing on or off for the current thread.
pub fn poison(on: bool) {
    POISONED.with(|flag| flag.set(on));
}

/// Key whose `Hash` panics while the thread is poisoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragile(pub u32);

impl Hash for Fragile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if POISONED.with(Cell::get) {
            panic!("poisoned hash of {:?}", self.0);
        }
        self.0.hash(state);
    }
}

/// Hasher that sends every key to the same bucket.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collide;

impl Hasher for Collide {
    fn finish(&self) -> u64 {
        0
    }

    fn write(&mut self, _bytes: &[u8]) {}
}

pub type CollideBuild = std::hash::BuildHasherDefault<Collide>;
