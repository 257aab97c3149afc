// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("com.alphavelocity", "Exdate", "exdate"));

pub fn db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("exdate.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let mut conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS ledger(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        type TEXT NOT NULL CHECK(type IN ('Buy','Sell','CashIn','Div','Split')),
        symbol TEXT NOT NULL,
        exchange TEXT NOT NULL,
        units TEXT NOT NULL,
        price_per_unit TEXT NOT NULL,
        fees TEXT NOT NULL DEFAULT '0',
        split_ratio TEXT NOT NULL DEFAULT '1',
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_ledger_date ON ledger(date);
    CREATE INDEX IF NOT EXISTS idx_ledger_security ON ledger(symbol, exchange);

    -- Per-day checked-set: one row per (kind, security) reconciled today.
    CREATE TABLE IF NOT EXISTS action_checks(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL CHECK(kind IN ('div','split')),
        symbol TEXT NOT NULL,
        exchange TEXT NOT NULL,
        checked_on TEXT NOT NULL,
        UNIQUE(kind, symbol, exchange)
    );

    -- Cache backing store: string values, epoch-seconds expiry (NULL = no TTL).
    CREATE TABLE IF NOT EXISTS cache_entries(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        expires_at INTEGER
    );

    CREATE TABLE IF NOT EXISTS exchange_codes(
        code TEXT PRIMARY KEY,
        yahoo_suffix TEXT NOT NULL
    );
    "#,
    )?;
    seed_exchange_codes(conn)?;
    Ok(())
}

// Exchange code -> Yahoo symbol suffix. An empty suffix means the bare
// symbol is used as-is.
const EXCHANGE_SEED: &[(&str, &str)] = &[
    ("NASDAQ", ""),
    ("NYSE", ""),
    ("NYSEARCA", ""),
    ("NYSEAMERICAN", ""),
    ("AMEX", ""),
    ("ASX", "AX"),
    ("AMS", "AS"),
    ("BIT", "MI"),
    ("BME", "MC"),
    ("BOM", "BO"),
    ("EPA", "PA"),
    ("ETR", "DE"),
    ("FRA", "F"),
    ("HKG", "HK"),
    ("KOSDAQ", "KQ"),
    ("KRX", "KS"),
    ("LON", "L"),
    ("NSE", "NS"),
    ("NZE", "NZ"),
    ("SGX", "SI"),
    ("SHA", "SS"),
    ("SHE", "SZ"),
    ("STO", "ST"),
    ("SWX", "SW"),
    ("TPE", "TW"),
    ("TSE", "TO"),
    ("TYO", "T"),
    ("VIE", "VI"),
];

fn seed_exchange_codes(conn: &Connection) -> Result<()> {
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO exchange_codes(code, yahoo_suffix) VALUES (?1, ?2)")?;
    for (code, suffix) in EXCHANGE_SEED {
        stmt.execute([code, suffix])?;
    }
    Ok(())
}

pub fn exchange_suffixes(conn: &Connection) -> Result<std::collections::HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT code, yahoo_suffix FROM exchange_codes")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    let mut map = std::collections::HashMap::new();
    for row in rows {
        let (code, suffix) = row?;
        map.insert(code, suffix);
    }
    Ok(map)
}
