use super::helpers::*;
use crate::index_set::refuse;
use crate::*;
use anyhow::Result;
use keyindex::Violation;
use std::panic::{self, AssertUnwindSafe};

type FragileTable = MultiIndex<u32, (u32, Fragile, u32)>;

fn fragile(n: u32) -> FragileTable {
    let mut table = FragileTable::new();
    for i in 0..n {
        table.emplace_back(i, (i, Fragile(i), i * 100)).unwrap();
    }
    table
}

fn indexed_per_slot(table: &FragileTable) -> Vec<usize> {
    (1..=3)
        .map(|slot| table.indices().get(slot).map_or(0, KeyIndex::len))
        .collect()
}

#[test]
fn failing_second_index_rolls_back_push() -> Result<()> {
    let mut table = fragile(3);

    poison(true);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        table.emplace_back(77, (77, Fragile(77), 7700))
    }));
    poison(false);

    assert!(outcome.is_err());
    assert_eq!(table.len(), 3);
    assert_eq!(indexed_per_slot(&table), vec![3, 3, 3]);
    assert!(table.find::<1>(&77).is_none());
    assert!(table.find::<2>(&Fragile(77)).is_none());
    assert!(table.find::<3>(&7700).is_none());
    table.check_consistency()?;

    assert_eq!(table.emplace_back(77, (77, Fragile(77), 7700))?, 3);
    table.check_consistency()?;
    Ok(())
}

#[test]
fn insert_error_rolls_back_push() -> Result<()> {
    let mut table = fragile(3);

    refuse::insert_at(Some(2));
    let outcome = table.emplace_back(77, (77, Fragile(77), 7700));
    refuse::insert_at(None);

    assert!(matches!(outcome, Err(MultiIndexError::Index(_))));
    assert_eq!(table.len(), 3);
    assert_eq!(indexed_per_slot(&table), vec![3, 3, 3]);
    assert!(table.find::<1>(&77).is_none());
    assert!(table.find::<3>(&7700).is_none());
    assert!(table.find::<2>(&Fragile(77)).is_none());
    table.check_consistency()?;

    assert_eq!(table.emplace_back(77, (77, Fragile(77), 7700))?, 3);
    assert_eq!(table.position::<3>(&7700), Some(3));
    table.check_consistency()?;
    Ok(())
}

#[test]
fn insert_error_on_first_slot_leaves_nothing_behind() -> Result<()> {
    let mut table = filled(2);
    let before = table.indices().clone();

    refuse::insert_at(Some(ID));
    let outcome = table.emplace_back(5, (9, name("late"), 0));
    refuse::insert_at(None);

    assert!(outcome.is_err());
    assert_eq!(table.len(), 2);
    assert_eq!(table.indices(), &before);
    assert!(!table.contains::<NAME>(&name("late")));
    table.check_consistency()?;
    Ok(())
}

#[test]
fn failing_rehash_restores_earlier_indices() -> Result<()> {
    let mut table = fragile(5);
    assert_eq!(table.capacity(), 5);
    let before = table.indices().clone();

    // The sixth row forces growth, and growth rehashes every slot.
    poison(true);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        table.emplace_back(5, (5, Fragile(5), 500))
    }));
    poison(false);

    assert!(outcome.is_err());
    assert_eq!(table.len(), 5);
    assert_eq!(table.capacity(), 5);
    assert_eq!(table.indices(), &before);
    assert_eq!(table.bucket_count(1), Some(5));
    table.check_consistency()?;
    Ok(())
}

#[test]
fn failing_set_leaves_the_key_in_place() -> Result<()> {
    let mut table = fragile(4);
    let before = table.indices().clone();

    poison(true);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| table.set::<2>(1, Fragile(50))));
    poison(false);

    assert!(outcome.is_err());
    assert_eq!(*table[1].key::<2>(), Fragile(1));
    assert_eq!(table.indices(), &before);
    table.check_consistency()?;
    Ok(())
}

#[test]
fn oversized_reserve_changes_nothing() -> Result<()> {
    let mut table = filled(3);
    let before = table.indices().clone();

    let err = table.reserve(usize::MAX).unwrap_err();
    assert!(matches!(err, MultiIndexError::Index(_)), "got {err:?}");
    assert_eq!(table.capacity(), 5);
    assert_eq!(table.indices(), &before);
    assert_eq!(table.position::<NAME>(&name("row-1")), Some(1));
    table.check_consistency()?;
    Ok(())
}

#[test]
fn consistency_check_reports_a_missing_entry() {
    let mut table = filled(3);
    let hash = table.rows[0].keys().hash_slot(NAME, &table.hasher);
    assert!(table.indices.slot_mut(NAME).unlink(0, hash).is_some());

    assert_eq!(
        table.check_consistency().unwrap_err(),
        MultiIndexError::Inconsistent {
            slot: NAME,
            violation: Violation::CountMismatch { indexed: 2, rows: 3 },
        }
    );
}
