use super::helpers::*;
use crate::*;
use anyhow::Result;

// --------------------- Append and growth ---------------------

#[test]
fn push_back_returns_positions() -> Result<()> {
    let mut table = Table::new();
    assert_eq!(table.push_back(Row::new(7, (1, name("a"), 0)))?, 0);
    assert_eq!(table.emplace_back(8, (2, name("b"), 0))?, 1);
    assert_eq!(table.push_back((9, (3, name("c"), 1)).into())?, 2);
    assert_eq!(table.len(), 3);
    table.check_consistency()?;
    Ok(())
}

#[test]
fn growth_doubles_capacity_and_buckets() -> Result<()> {
    let mut table = Table::new();
    assert_eq!(table.capacity(), 0);

    let mut seen = Vec::new();
    for i in 0..21 {
        table.emplace_back(i, (i, format!("row-{i}"), 0))?;
        if seen.last() != Some(&table.capacity()) {
            seen.push(table.capacity());
        }
    }
    assert_eq!(seen, vec![5, 10, 20, 40]);
    assert_eq!(table.bucket_count(ID), Some(40));
    assert_eq!(table.bucket_count(NAME), Some(40));
    table.check_consistency()?;
    Ok(())
}

#[test]
fn growth_follows_the_config() -> Result<()> {
    let config = TableConfig {
        min_capacity: 3,
        growth_factor: 3,
        min_buckets: 7,
    };
    let mut table: MultiIndex<u32, (u32,)> = MultiIndex::with_config(config);
    assert_eq!(table.bucket_count(1), Some(7));

    for i in 0..4 {
        table.emplace_back(i, (i,))?;
    }
    assert_eq!(table.capacity(), 9);
    assert_eq!(table.bucket_count(1), Some(9));
    Ok(())
}

#[test]
fn keys_need_not_be_unique() -> Result<()> {
    let mut table = Table::new();
    for value in 0..4 {
        table.emplace_back(value, (1, name("same"), 2))?;
    }
    assert_eq!(table.count::<ID>(&1), 4);
    assert_eq!(table.count::<NAME>(&name("same")), 4);
    assert_eq!(table.equal_range::<GROUP>(&2).positions(), &[0, 1, 2, 3]);
    assert_eq!(table.position::<ID>(&1), Some(0));
    Ok(())
}

#[test]
fn reserve_grows_rows_and_buckets() -> Result<()> {
    let mut table = filled(3);
    table.reserve(50)?;
    assert!(table.capacity() >= 50);
    assert_eq!(table.bucket_count(ID), Some(50));
    assert_eq!(table.position::<NAME>(&name("row-2")), Some(2));
    table.check_consistency()?;

    // Smaller requests never shrink anything.
    table.reserve(4)?;
    assert!(table.capacity() >= 50);
    assert_eq!(table.bucket_count(ID), Some(50));
    Ok(())
}

#[test]
fn shrink_to_fit_keeps_bucket_counts() -> Result<()> {
    let mut table = filled(12);
    table.truncate(4);
    table.shrink_to_fit()?;
    assert_eq!(table.capacity(), 4);
    assert_eq!(table.bucket_count(ID), Some(20));
    assert_eq!(table.find::<ID>(&3).map(|r| r.value), Some(30));
    table.check_consistency()?;
    Ok(())
}

// --------------------- Re-keying ---------------------

#[test]
fn set_rekeys_one_slot() -> Result<()> {
    let mut table = filled(5);
    let old = table.set::<NAME>(1, name("renamed"))?;
    assert_eq!(old, "row-1");

    assert!(table.find::<NAME>(&name("row-1")).is_none());
    assert_eq!(table.position::<NAME>(&name("renamed")), Some(1));
    assert_eq!(table.position::<ID>(&1), Some(1));
    assert_eq!(*table[1].key::<NAME>(), "renamed");
    table.check_consistency()?;
    Ok(())
}

#[test]
fn set_moves_row_to_the_end_of_the_new_run() -> Result<()> {
    let mut table = filled(6);
    assert_eq!(table.equal_range::<GROUP>(&1).positions(), &[1, 4]);

    assert_eq!(table.set::<GROUP>(0, 1)?, 0);
    assert_eq!(table.equal_range::<GROUP>(&1).positions(), &[1, 4, 0]);
    assert_eq!(table.equal_range::<GROUP>(&0).positions(), &[3]);
    table.check_consistency()?;
    Ok(())
}

#[test]
fn set_within_one_bucket_keeps_runs_contiguous() -> Result<()> {
    let mut table: MultiIndex<u32, (u32, char), CollideBuild> =
        MultiIndex::with_hasher(CollideBuild::default());
    for (i, c) in ['a', 'b', 'a', 'c', 'b'].into_iter().enumerate() {
        table.emplace_back(i as u32, (i as u32, c))?;
    }
    assert_eq!(table.indices().get(2).unwrap().bucket(0), &[0, 2, 1, 4, 3]);

    table.set::<2>(0, 'b')?;
    assert_eq!(table.indices().get(2).unwrap().bucket(0), &[2, 1, 4, 0, 3]);
    table.set::<2>(3, 'a')?;
    assert_eq!(table.indices().get(2).unwrap().bucket(0), &[2, 3, 1, 4, 0]);
    table.check_consistency()?;
    Ok(())
}

#[test]
fn set_with_the_current_key_is_idempotent() -> Result<()> {
    let mut table = filled(6);
    let before = table.indices().clone();
    let range_before: Vec<usize> = table.equal_range::<GROUP>(&1).positions().to_vec();

    let old = table.set::<GROUP>(1, 1)?;
    assert_eq!(old, 1);
    assert_eq!(table.indices(), &before);
    assert!(table.contains::<GROUP>(&1));
    assert_eq!(table.equal_range::<GROUP>(&1).positions(), range_before.as_slice());
    Ok(())
}

#[test]
fn set_past_the_end_fails() {
    let mut table = filled(2);
    assert_eq!(
        table.set::<ID>(2, 9).unwrap_err(),
        MultiIndexError::OutOfRange { index: 2, len: 2 }
    );
    assert!(table.find::<ID>(&9).is_none());
}

#[test]
fn value_writes_touch_no_index() -> Result<()> {
    let mut table = filled(3);
    let before = table.indices().clone();

    assert_eq!(table.set_value(1, 99)?, 10);
    *table.value_mut(2).unwrap() += 1;
    assert_eq!(table[1].value, 99);
    assert_eq!(table[2].value, 21);
    assert_eq!(table.indices(), &before);
    assert!(table.value_mut(3).is_none());
    assert!(table.set_value(3, 0).is_err());
    Ok(())
}

// --------------------- Removal ---------------------

#[test]
fn erase_middle_row_round_trip() -> Result<()> {
    let mut table: MultiIndex<&str, (u32,)> = MultiIndex::new();
    for (i, v) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
        table.emplace_back(v, (i as u32 + 10,))?;
    }

    let removed = table.erase(2)?;
    assert_eq!(removed.value, "c");
    assert_eq!(table.count::<1>(&12), 0);
    for (key, value) in [(10, "a"), (11, "b"), (13, "d"), (14, "e")] {
        assert_eq!(table.find::<1>(&key).map(|r| r.value), Some(value));
    }
    assert_eq!(table.position::<1>(&13), Some(2));
    assert_eq!(table.position::<1>(&14), Some(3));
    table.check_consistency()?;
    Ok(())
}

#[test]
fn erase_past_the_end_fails() {
    let mut table = filled(3);
    assert_eq!(
        table.erase(3).unwrap_err(),
        MultiIndexError::OutOfRange { index: 3, len: 3 }
    );
    assert_eq!(table.len(), 3);
}

#[test]
fn erase_range_removes_a_block() -> Result<()> {
    let mut table = filled(6);
    let removed = table.erase_range(1..4)?;
    let ids: Vec<u32> = removed.iter().map(|r| *r.key::<ID>()).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    assert_eq!(table.len(), 3);
    assert_eq!(table.position::<ID>(&0), Some(0));
    assert_eq!(table.position::<ID>(&4), Some(1));
    assert_eq!(table.position::<ID>(&5), Some(2));
    assert_eq!(table.equal_range::<GROUP>(&1).positions(), &[1]);
    table.check_consistency()?;
    Ok(())
}

#[test]
fn erase_range_unlinks_only_the_erased_rows() -> Result<()> {
    let mut table = filled(9);
    let removed = table.erase_range(6..9)?;
    assert_eq!(removed.len(), 3);
    assert_eq!(table.len(), 6);
    for id in 0..6 {
        assert_eq!(table.position::<ID>(&id), Some(id as usize));
    }
    for id in 6..9 {
        assert!(table.find::<ID>(&id).is_none());
        assert!(!table.contains::<NAME>(&format!("row-{id}")));
    }

    table.erase_range(0..0)?;
    table.erase_range(2..3)?;
    assert_eq!(table.position::<ID>(&3), Some(2));
    table.check_consistency()?;
    Ok(())
}

#[test]
fn erase_range_validates_bounds() -> Result<()> {
    let mut table = filled(4);
    #[allow(clippy::reversed_empty_ranges)]
    let reversed = table.erase_range(3..2);
    assert_eq!(
        reversed.unwrap_err(),
        MultiIndexError::InvalidRange { start: 3, end: 2, len: 4 }
    );
    assert!(table.erase_range(2..5).is_err());
    assert!(table.erase_range(2..2)?.is_empty());
    assert_eq!(table.len(), 4);
    Ok(())
}

#[test]
fn pop_back_removes_the_last_row() -> Result<()> {
    let mut table = filled(3);
    let row = table.pop_back().unwrap();
    assert_eq!(*row.key::<ID>(), 2);
    assert!(table.find::<ID>(&2).is_none());
    assert_eq!(table.len(), 2);
    table.check_consistency()?;

    table.pop_back();
    table.pop_back();
    assert!(table.pop_back().is_none());
    table.check_consistency()?;
    Ok(())
}

#[test]
fn truncate_drops_the_tail() -> Result<()> {
    let mut table = filled(7);
    table.truncate(10);
    assert_eq!(table.len(), 7);

    table.truncate(2);
    assert_eq!(table.len(), 2);
    assert!(table.find::<ID>(&2).is_none());
    assert_eq!(table.count::<GROUP>(&0), 1);
    table.check_consistency()?;
    Ok(())
}

#[test]
fn clear_keeps_capacity_and_buckets() -> Result<()> {
    let mut table = filled(11);
    let capacity = table.capacity();
    let buckets = table.bucket_count(NAME);

    table.clear();
    assert!(table.is_empty());
    assert_eq!(table.capacity(), capacity);
    assert_eq!(table.bucket_count(NAME), buckets);
    assert!(table.find::<ID>(&0).is_none());
    table.check_consistency()?;

    table.emplace_back(1, (1, name("again"), 1))?;
    assert_eq!(table.position::<NAME>(&name("again")), Some(0));
    Ok(())
}

#[test]
fn len_counts_inserts_minus_erases() -> Result<()> {
    let mut table = filled(30);
    for _ in 0..7 {
        table.erase(3)?;
    }
    table.pop_back();
    table.erase_range(0..2)?;
    assert_eq!(table.len(), 30 - 7 - 1 - 2);
    table.check_consistency()?;
    Ok(())
}

// --------------------- Whole-table operations ---------------------

#[test]
fn swap_exchanges_contents() {
    let mut left = filled(2);
    let mut right = filled(5);
    left.swap(&mut right);
    assert_eq!(left.len(), 5);
    assert_eq!(right.len(), 2);
    assert_eq!(left.position::<ID>(&4), Some(4));
    assert!(right.find::<ID>(&4).is_none());
}

#[test]
fn into_rows_moves_rows_out_in_order() {
    let rows = filled(3).into_rows();
    let parts: Vec<(u32, u32)> = rows
        .into_iter()
        .map(Row::into_parts)
        .map(|(value, (id, _, _))| (value, id))
        .collect();
    assert_eq!(parts, vec![(0, 0), (10, 1), (20, 2)]);
}
