//! Compaction: logical contents must be untouched, dead versions must be
//! reclaimed, and failure must leave the original file alone.

use arbordb::Store;
use tempfile::TempDir;

#[test]
fn compaction_preserves_logical_contents() {
    let dir = TempDir::new().unwrap();
    let mut store = Store::open(dir.path().join("store.db")).unwrap();

    // An arbitrary history: inserts, overwrites, deletes.
    for i in 0..60u32 {
        store.set(format!("{i:03}").as_bytes(), format!("v{i}").as_bytes()).unwrap();
    }
    for i in (0..60u32).step_by(3) {
        store.remove(format!("{i:03}").as_bytes()).unwrap();
    }
    for i in (0..60u32).step_by(4) {
        store.set(format!("{i:03}").as_bytes(), b"rewritten").unwrap();
    }

    let before = store.to_map().unwrap().unwrap();
    store.compact().unwrap();
    let after = store.to_map().unwrap().unwrap();

    assert_eq!(before, after);
    assert_eq!(store.keys().unwrap().unwrap().len(), before.len());
}

#[test]
fn compaction_reclaims_dead_versions() {
    let dir = TempDir::new().unwrap();
    let mut store = Store::open(dir.path().join("store.db")).unwrap();

    for round in 0..20u32 {
        for i in 0..10u32 {
            store.set(format!("key{i}").as_bytes(), format!("round{round}").as_bytes()).unwrap();
        }
    }

    let before = store.file_size().unwrap();
    store.compact().unwrap();
    let after = store.file_size().unwrap();
    assert!(
        after < before / 2,
        "compaction should discard superseded versions ({before} -> {after} bytes)"
    );
    assert_eq!(store.get(b"key3").unwrap().unwrap(), b"round19");
}

#[test]
fn compaction_of_a_fresh_store_is_a_no_op_logically() {
    let dir = TempDir::new().unwrap();
    let mut store = Store::open(dir.path().join("store.db")).unwrap();
    store.compact().unwrap();
    assert!(store.to_map().unwrap().unwrap().is_empty());
}

#[test]
fn store_remains_writable_after_compaction() {
    let dir = TempDir::new().unwrap();
    let mut store = Store::open(dir.path().join("store.db")).unwrap();

    for i in 0..25u32 {
        store.set(format!("{i:02}").as_bytes(), b"before").unwrap();
    }
    store.compact().unwrap();

    store.set(b"fresh", b"after").unwrap();
    store.remove(b"00").unwrap();
    assert_eq!(store.get(b"fresh").unwrap().unwrap(), b"after");
    assert_eq!(store.get(b"00").unwrap(), None);
    assert_eq!(store.get(b"24").unwrap().unwrap(), b"before");
}

#[test]
fn compacted_contents_survive_a_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    let expected;
    {
        let mut store = Store::open(&path).unwrap();
        for i in 0..30u32 {
            store.set(format!("{i:02}").as_bytes(), format!("v{i}").as_bytes()).unwrap();
        }
        for i in 0..10u32 {
            store.remove(format!("{i:02}").as_bytes()).unwrap();
        }
        expected = store.to_map().unwrap().unwrap();
        store.compact().unwrap();
        store.close().unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert_eq!(store.to_map().unwrap().unwrap(), expected);
    assert!(!dir.path().join("store.db.compact").exists());
}

#[test]
fn repeated_compaction_is_stable() {
    let dir = TempDir::new().unwrap();
    let mut store = Store::open(dir.path().join("store.db")).unwrap();
    for i in 0..40u32 {
        store.set(format!("{i:02}").as_bytes(), b"v").unwrap();
    }

    store.compact().unwrap();
    let size_once = store.file_size().unwrap();
    store.compact().unwrap();
    let size_twice = store.file_size().unwrap();

    assert_eq!(size_once, size_twice, "a compacted file is already minimal");
    assert_eq!(store.keys().unwrap().unwrap().len(), 40);
}

#[test]
fn compaction_failure_leaves_the_original_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    std::fs::write(&path, vec![0u8; 256]).unwrap();

    // No recoverable root: the copy phase cannot even start.
    let mut store = Store::open(&path).unwrap();
    assert!(store.compact().is_err());
    assert_eq!(store.file_size().unwrap(), 256);
    assert!(!dir.path().join("store.db.compact").exists());
}
