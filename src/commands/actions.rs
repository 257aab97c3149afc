// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::cache::{SqliteCacheStore, TypedCache};
use crate::db::exchange_suffixes;
use crate::ledger;
use crate::market::MarketDataClient;
use crate::tracker;
use crate::utils::{pretty_table, today_local};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("check", _)) => check(conn)?,
        Some(("reset", _)) => reset(conn)?,
        Some(("status", _)) => status(conn)?,
        _ => {}
    }
    Ok(())
}

fn check(conn: &mut Connection) -> Result<()> {
    let suffixes = exchange_suffixes(conn)?;
    let today = today_local();

    // The client borrows the connection for its cache, so the check runs
    // against a second handle on the same database.
    let cache_conn = Connection::open(crate::db::db_path()?)?;
    let cache = TypedCache::new(SqliteCacheStore::new(&cache_conn));
    let client = MarketDataClient::new(cache, suffixes)?;

    let summary = tracker::run_daily_check(conn, &client, today)?;

    println!(
        "Checked {} securities: {} dividends, {} splits, {} skipped (no holdings)",
        summary.securities,
        summary.dividends_added,
        summary.splits_added,
        summary.skipped_zero_holdings
    );
    for (symbol, exchange, err) in &summary.failures {
        eprintln!(
            "warning: {} ({}) failed, will retry next run: {}",
            symbol, exchange, err
        );
    }
    Ok(())
}

fn reset(conn: &Connection) -> Result<()> {
    let n = tracker::reset_checked_state(conn)?;
    println!("Cleared {} checked entries", n);
    Ok(())
}

fn status(conn: &Connection) -> Result<()> {
    let today = today_local();
    let mut rows = Vec::new();
    for (symbol, exchange) in ledger::tracked_securities(conn)? {
        let held = ledger::units_held_before(conn, &symbol, &exchange, today)?;
        let state = tracker::check_state(conn, &symbol, &exchange)?;
        rows.push(vec![
            symbol,
            exchange,
            held.to_string(),
            state.to_string(),
        ]);
    }
    println!(
        "{}",
        pretty_table(&["Symbol", "Exchange", "Units Held", "State"], rows)
    );
    Ok(())
}
