// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{LedgerRow, SplitRatio, TxnType};
use crate::utils::parse_date;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use std::str::FromStr;

pub struct NewEntry<'a> {
    pub date: NaiveDate,
    pub txn_type: TxnType,
    pub symbol: &'a str,
    pub exchange: &'a str,
    pub units: Decimal,
    pub price_per_unit: Decimal,
    pub fees: Decimal,
    pub split_ratio: SplitRatio,
}

pub fn append_entry(conn: &Connection, entry: &NewEntry<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO ledger(date, type, symbol, exchange, units, price_per_unit, fees, split_ratio)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.date.to_string(),
            entry.txn_type.as_str(),
            entry.symbol,
            entry.exchange,
            entry.units.to_string(),
            entry.price_per_unit.to_string(),
            entry.fees.to_string(),
            entry.split_ratio.to_string(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Record a dividend: one Div row for the units held before the ex-date,
/// priced at the per-unit amount, no fees, ratio 1.
pub fn append_dividend(
    conn: &Connection,
    symbol: &str,
    exchange: &str,
    date: NaiveDate,
    amount_per_unit: Decimal,
    units: Decimal,
) -> Result<i64> {
    append_entry(
        conn,
        &NewEntry {
            date,
            txn_type: TxnType::Div,
            symbol,
            exchange,
            units,
            price_per_unit: amount_per_unit,
            fees: Decimal::ZERO,
            split_ratio: SplitRatio::ONE,
        },
    )
}

/// Record a split and rewrite history so price*units stays consistent
/// with the post-split share count.
///
/// The Split row keeps the pre-split holding and a zero price; every row
/// for the same security dated strictly before is rescaled (units by
/// num/den, price by den/num). Append and rewrite commit in one
/// transaction, so a crash leaves either the untouched pre-split ledger
/// or the fully rewritten one, never a partial rewrite.
pub fn append_split_and_rewrite(
    conn: &mut Connection,
    symbol: &str,
    exchange: &str,
    date: NaiveDate,
    ratio: SplitRatio,
    pre_split_units: Decimal,
) -> Result<i64> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO ledger(date, type, symbol, exchange, units, price_per_unit, fees, split_ratio)
         VALUES (?1, 'Split', ?2, ?3, ?4, '0', '0', ?5)",
        params![
            date.to_string(),
            symbol,
            exchange,
            pre_split_units.to_string(),
            ratio.to_string(),
        ],
    )?;
    let split_id = tx.last_insert_rowid();

    // New values derive from the row's current values and the ratio, so
    // fees and type stay untouched and each row rescales independently.
    let rewrites = {
        let mut stmt = tx.prepare(
            "SELECT id, units, price_per_unit FROM ledger
             WHERE symbol=?1 AND exchange=?2 AND date<?3",
        )?;
        let rows = stmt.query_map(params![symbol, exchange, date.to_string()], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?;
        let mut rewrites = Vec::new();
        for row in rows {
            let (id, units_s, price_s) = row?;
            let units = Decimal::from_str_exact(&units_s)
                .with_context(|| format!("Invalid units '{}' in ledger row {}", units_s, id))?;
            let price = Decimal::from_str_exact(&price_s)
                .with_context(|| format!("Invalid price '{}' in ledger row {}", price_s, id))?;
            rewrites.push((
                id,
                ratio.apply_to_units(units),
                ratio.apply_to_price(price),
            ));
        }
        rewrites
    };

    {
        let mut update = tx.prepare(
            "UPDATE ledger SET units=?1, price_per_unit=?2 WHERE id=?3",
        )?;
        for (id, units, price) in rewrites {
            update.execute(params![units.to_string(), price.to_string(), id])?;
        }
    }

    tx.commit()?;
    Ok(split_id)
}

/// All rows for a security dated strictly before `before`, oldest first.
pub fn scan_matching(
    conn: &Connection,
    symbol: &str,
    exchange: &str,
    before: NaiveDate,
) -> Result<Vec<LedgerRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, type, symbol, exchange, units, price_per_unit, fees, split_ratio
         FROM ledger WHERE symbol=?1 AND exchange=?2 AND date<?3 ORDER BY date, id",
    )?;
    let rows = stmt.query_map(params![symbol, exchange, before.to_string()], row_values)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(decode_row(row?)?);
    }
    Ok(out)
}

pub fn all_rows(conn: &Connection) -> Result<Vec<LedgerRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, type, symbol, exchange, units, price_per_unit, fees, split_ratio
         FROM ledger ORDER BY date, id",
    )?;
    let rows = stmt.query_map([], row_values)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(decode_row(row?)?);
    }
    Ok(out)
}

type RawRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
);

fn row_values(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
        r.get(8)?,
    ))
}

fn decode_row(raw: RawRow) -> Result<LedgerRow> {
    let (id, date_s, type_s, symbol, exchange, units_s, price_s, fees_s, ratio_s) = raw;
    Ok(LedgerRow {
        id,
        date: parse_date(&date_s).with_context(|| format!("Ledger row {}", id))?,
        txn_type: TxnType::from_str(&type_s).with_context(|| format!("Ledger row {}", id))?,
        symbol,
        exchange,
        units: Decimal::from_str_exact(&units_s)
            .with_context(|| format!("Invalid units '{}' in ledger row {}", units_s, id))?,
        price_per_unit: Decimal::from_str_exact(&price_s)
            .with_context(|| format!("Invalid price '{}' in ledger row {}", price_s, id))?,
        fees: Decimal::from_str_exact(&fees_s)
            .with_context(|| format!("Invalid fees '{}' in ledger row {}", fees_s, id))?,
        split_ratio: SplitRatio::from_str(&ratio_s)
            .with_context(|| format!("Ledger row {}", id))?,
    })
}

/// Units held from rows dated strictly before `date`: buys add, sells
/// subtract. Div and Split rows never enter the sum (a Split row records
/// the pre-split holding, not a trade).
pub fn units_held_before(
    conn: &Connection,
    symbol: &str,
    exchange: &str,
    date: NaiveDate,
) -> Result<Decimal> {
    let mut stmt = conn.prepare(
        "SELECT type, units FROM ledger
         WHERE symbol=?1 AND exchange=?2 AND date<?3 AND type IN ('Buy','Sell')",
    )?;
    let rows = stmt.query_map(params![symbol, exchange, date.to_string()], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;
    let mut held = Decimal::ZERO;
    for row in rows {
        let (type_s, units_s) = row?;
        let units = Decimal::from_str_exact(&units_s)
            .with_context(|| format!("Invalid units '{}' for {} {}", units_s, symbol, exchange))?
            .abs();
        match type_s.as_str() {
            "Buy" => held += units,
            "Sell" => held -= units,
            _ => {}
        }
    }
    Ok(held)
}

/// Securities with trade activity, the population the daily check walks.
pub fn tracked_securities(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT symbol, exchange FROM ledger
         WHERE type IN ('Buy','Sell') ORDER BY symbol, exchange",
    )?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
