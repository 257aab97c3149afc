// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::{pretty_table, today_local};
use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

pub fn handle(conn: &Connection) -> Result<()> {
    let mut rows = Vec::new();

    // 1) Split rows must carry a zero price; the pre-split value lives in
    //    the rewritten history.
    let mut stmt = conn.prepare(
        "SELECT date, symbol, exchange FROM ledger WHERE type='Split' AND price_per_unit<>'0'",
    )?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let (d, s, e): (String, String, String) = (r.get(0)?, r.get(1)?, r.get(2)?);
        rows.push(vec!["split_with_price".into(), format!("{} {} {}", d, s, e)]);
    }

    // 2) Only Split rows may carry a ratio other than 1.
    let mut stmt2 = conn.prepare(
        "SELECT date, type, symbol FROM ledger WHERE type<>'Split' AND split_ratio<>'1'",
    )?;
    let mut cur2 = stmt2.query([])?;
    while let Some(r) = cur2.next()? {
        let (d, t, s): (String, String, String) = (r.get(0)?, r.get(1)?, r.get(2)?);
        rows.push(vec!["ratio_on_non_split".into(), format!("{} {} {}", d, t, s)]);
    }

    // 3) Exchanges with no Yahoo code mapping query the bare symbol.
    let mut stmt3 = conn.prepare(
        "SELECT DISTINCT exchange FROM ledger WHERE exchange<>'-'
         EXCEPT SELECT code FROM exchange_codes",
    )?;
    let mut cur3 = stmt3.query([])?;
    while let Some(r) = cur3.next()? {
        let e: String = r.get(0)?;
        rows.push(vec!["unknown_exchange".into(), e]);
    }

    // 4) Negative stored units.
    let mut stmt4 = conn.prepare(
        "SELECT date, type, symbol FROM ledger WHERE CAST(units AS REAL) < 0",
    )?;
    let mut cur4 = stmt4.query([])?;
    while let Some(r) = cur4.next()? {
        let (d, t, s): (String, String, String) = (r.get(0)?, r.get(1)?, r.get(2)?);
        rows.push(vec!["negative_units".into(), format!("{} {} {}", d, t, s)]);
    }

    // 5) Checked-set rows from a previous day mean the daily reset never
    //    ran; they block today's reconciliation.
    let today = today_local().to_string();
    let mut stmt5 = conn.prepare(
        "SELECT kind, symbol, exchange, checked_on FROM action_checks WHERE checked_on<>?1",
    )?;
    let mut cur5 = stmt5.query([&today])?;
    while let Some(r) = cur5.next()? {
        let (k, s, e, on): (String, String, String, String) =
            (r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?);
        rows.push(vec!["stale_check".into(), format!("{} {} {} ({})", k, s, e, on)]);
    }

    // 6) Expired cache entries waiting for a purge.
    let expired: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
        [Utc::now().timestamp()],
        |r| r.get(0),
    )?;
    if expired > 0 {
        rows.push(vec![
            "expired_cache_entries".into(),
            format!("{} (run 'exdate cache purge')", expired),
        ]);
    }

    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
