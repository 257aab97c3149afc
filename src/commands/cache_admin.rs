// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::cache::SqliteCacheStore;
use crate::utils::pretty_table;
use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("stats", _)) => stats(conn)?,
        Some(("purge", _)) => purge(conn)?,
        _ => {}
    }
    Ok(())
}

fn stats(conn: &Connection) -> Result<()> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;
    let expired: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
        [Utc::now().timestamp()],
        |r| r.get(0),
    )?;
    let chunks: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE key LIKE '$$$%'",
        [],
        |r| r.get(0),
    )?;
    let rows = vec![
        vec!["Entries".to_string(), total.to_string()],
        vec!["Expired".to_string(), expired.to_string()],
        vec!["Chunk slots".to_string(), chunks.to_string()],
    ];
    println!("{}", pretty_table(&["Metric", "Value"], rows));
    Ok(())
}

fn purge(conn: &Connection) -> Result<()> {
    let n = SqliteCacheStore::new(conn).purge_expired()?;
    println!("Purged {} expired cache entries", n);
    Ok(())
}
