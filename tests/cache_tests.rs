// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use exdate::cache::{CacheError, CacheStore, MAX_VALUE_LEN, SqliteCacheStore, TypedCache};
use rusqlite::Connection;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    exdate::db::init_schema(&mut conn).unwrap();
    conn
}

#[test]
fn oversized_value_round_trips_through_sqlite_store() {
    let conn = setup();
    let cache = TypedCache::new(SqliteCacheStore::new(&conn));

    let big = "0123456789".repeat(40_000); // 400 KB, several chunks
    cache.put_string("series", &big, Some(3600)).unwrap();

    let slots: i64 = conn
        .query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))
        .unwrap();
    assert!(slots > 3, "expected parent + chunks, got {}", slots);

    assert_eq!(
        cache.get_string("series").unwrap().as_deref(),
        Some(big.as_str())
    );
}

#[test]
fn remove_deletes_parent_and_chunks() {
    let conn = setup();
    let cache = TypedCache::new(SqliteCacheStore::new(&conn));

    cache
        .put_string("k", &"x".repeat(MAX_VALUE_LEN * 2 + 5), None)
        .unwrap();
    cache.remove("k").unwrap();

    let slots: i64 = conn
        .query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))
        .unwrap();
    assert_eq!(slots, 0);
}

#[test]
fn expired_entry_reads_as_absent() {
    let conn = setup();
    let cache = TypedCache::new(SqliteCacheStore::new(&conn));

    cache.put_string("stale", "v", Some(3600)).unwrap();
    conn.execute("UPDATE cache_entries SET expires_at = 1", [])
        .unwrap();

    assert_eq!(cache.get_string("stale").unwrap(), None);
    // The expired row is dropped by the read.
    let slots: i64 = conn
        .query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))
        .unwrap();
    assert_eq!(slots, 0);
}

#[test]
fn number_read_as_string_is_a_type_mismatch() {
    let conn = setup();
    let cache = TypedCache::new(SqliteCacheStore::new(&conn));

    cache.put_number("price", 3.41, Some(60)).unwrap();
    let err = cache.get_string("price").unwrap_err();
    assert!(matches!(err, CacheError::TypeMismatch { .. }));
    // The entry itself is intact for a correctly-typed read.
    assert_eq!(cache.get_number("price").unwrap(), Some(3.41));
}

#[test]
fn corrupt_descriptor_reads_as_miss_and_is_dropped() {
    let conn = setup();
    let cache = TypedCache::new(SqliteCacheStore::new(&conn));

    cache.put_string("k", "v", None).unwrap();
    conn.execute(
        "UPDATE cache_entries SET value='{truncated' WHERE key='k'",
        [],
    )
    .unwrap();

    assert_eq!(cache.get_string("k").unwrap(), None);
    let slots: i64 = conn
        .query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))
        .unwrap();
    assert_eq!(slots, 0);
}

#[test]
fn purge_expired_leaves_live_entries() {
    let conn = setup();
    let store = SqliteCacheStore::new(&conn);

    store.put_raw("live", "a", Some(3600)).unwrap();
    store.put_raw("dead", "b", Some(3600)).unwrap();
    conn.execute("UPDATE cache_entries SET expires_at=1 WHERE key='dead'", [])
        .unwrap();

    assert_eq!(store.purge_expired().unwrap(), 1);
    assert_eq!(store.get_raw("live").unwrap().as_deref(), Some("a"));
    assert_eq!(store.get_raw("dead").unwrap(), None);
}
