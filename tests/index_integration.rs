//! End-to-end scenarios spanning the resource manager, the ARC cache, and
//! the B+-Tree together, through the public `Index` facade.

use relindex::types::{Field, Kind, Rid};
use relindex::{Config, Index};
use tempfile::tempdir;

#[test]
fn reopen_after_many_inserts_preserves_order() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempdir().unwrap();
    let path = dir.path().join("orders.idx");

    {
        let index = Index::open(Config::new(&path, Kind::Int).unique(false).buffer_pool_size(8)).unwrap();
        for i in 0..2000i32 {
            index.insert(&Field::Int(i), Rid::from_parts(1, i as u32)).unwrap();
        }
        index.close().unwrap();
    }

    let index = Index::open(Config::new(&path, Kind::Int).unique(false).buffer_pool_size(64)).unwrap();
    let mut cursor = index.lookup_range(None, None, true, true).unwrap();
    let mut count = 0;
    let mut last = -1i32;
    while let Some(rid) = cursor.next().unwrap() {
        assert!(rid.tuple_index() as i32 > last);
        last = rid.tuple_index() as i32;
        count += 1;
    }
    assert_eq!(count, 2000);
}

#[test]
fn small_buffer_pool_still_completes_full_scan() {
    // Capacity far below the resident page count forces eviction and
    // write-back under concurrent pinning during the scan.
    let dir = tempdir().unwrap();
    let path = dir.path().join("small_pool.idx");
    let index = Index::open(Config::new(&path, Kind::Int).unique(true).buffer_pool_size(4)).unwrap();

    for i in 0..1000i32 {
        index.insert(&Field::Int(i), Rid::from_parts(0, i as u32)).unwrap();
    }

    let mut cursor = index.lookup_range(Some(&Field::Int(100)), Some(&Field::Int(200)), true, false).unwrap();
    let mut count = 0;
    while cursor.next().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 100);
}

#[test]
fn non_unique_duplicates_survive_a_flush_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dupes.idx");

    {
        let index = Index::open(Config::new(&path, Kind::Int).unique(false).buffer_pool_size(16)).unwrap();
        for i in 0..50u32 {
            index.insert(&Field::Int(9), Rid::from_parts(2, i)).unwrap();
        }
        index.flush().unwrap();
    }

    let index = Index::open(Config::new(&path, Kind::Int).unique(false).buffer_pool_size(16)).unwrap();
    let mut cursor = index.lookup(&Field::Int(9)).unwrap();
    let mut count = 0;
    while cursor.next().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 50);
}

#[test]
fn delete_is_visible_immediately_without_rebalance() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("deletes.idx");
    let index = Index::open(Config::new(&path, Kind::Int).unique(false).buffer_pool_size(16)).unwrap();

    for i in 0..30u32 {
        index.insert(&Field::Int(3), Rid::from_parts(0, i)).unwrap();
    }
    for i in 0..30u32 {
        assert!(index.delete(&Field::Int(3), Rid::from_parts(0, i)).unwrap());
    }

    let mut cursor = index.lookup(&Field::Int(3)).unwrap();
    assert_eq!(cursor.next().unwrap(), None);
}
