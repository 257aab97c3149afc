// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::{self, NewEntry};
use crate::models::{SplitRatio, TxnType};
use crate::utils::{maybe_print_json, parse_date, parse_decimal, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

/// Placeholder security for cash rows, matching no real symbol so split
/// rewrites never touch them.
const CASH_SYMBOL: &str = "$$$";
const CASH_EXCHANGE: &str = "-";

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("buy", sub)) => record_trade(conn, sub, TxnType::Buy)?,
        Some(("sell", sub)) => record_trade(conn, sub, TxnType::Sell)?,
        Some(("cash-in", sub)) => record_cash_in(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn record_trade(conn: &Connection, sub: &clap::ArgMatches, txn_type: TxnType) -> Result<()> {
    let date = parse_date(sub.get_one::<String>("date").unwrap().trim())?;
    let symbol = sub
        .get_one::<String>("symbol")
        .map(|s| s.trim().to_uppercase())
        .unwrap();
    let exchange = sub
        .get_one::<String>("exchange")
        .map(|s| s.trim().to_uppercase())
        .unwrap();
    let units = parse_decimal(sub.get_one::<String>("units").unwrap().trim())?.abs();
    let price = parse_decimal(sub.get_one::<String>("price").unwrap().trim())?;
    let fees = match sub.get_one::<String>("fees") {
        Some(raw) => parse_decimal(raw.trim())?,
        None => Decimal::ZERO,
    };

    // A buy consumes cash; pair it with a CashIn row covering the cost.
    if txn_type == TxnType::Buy {
        let cost = units * price + fees;
        ledger::append_entry(
            conn,
            &NewEntry {
                date,
                txn_type: TxnType::CashIn,
                symbol: CASH_SYMBOL,
                exchange: CASH_EXCHANGE,
                units: Decimal::ONE,
                price_per_unit: cost,
                fees: Decimal::ZERO,
                split_ratio: SplitRatio::ONE,
            },
        )?;
    }

    ledger::append_entry(
        conn,
        &NewEntry {
            date,
            txn_type,
            symbol: &symbol,
            exchange: &exchange,
            units,
            price_per_unit: price,
            fees,
            split_ratio: SplitRatio::ONE,
        },
    )?;
    println!(
        "Recorded {} {} x {} ({}) @ {} (fees {})",
        txn_type, units, symbol, exchange, price, fees
    );
    Ok(())
}

fn record_cash_in(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(sub.get_one::<String>("date").unwrap().trim())?;
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap().trim())?;
    ledger::append_entry(
        conn,
        &NewEntry {
            date,
            txn_type: TxnType::CashIn,
            symbol: CASH_SYMBOL,
            exchange: CASH_EXCHANGE,
            units: Decimal::ONE,
            price_per_unit: amount,
            fees: Decimal::ZERO,
            split_ratio: SplitRatio::ONE,
        },
    )?;
    println!("Recorded cash-in of {} on {}", amount, date);
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let data = query_rows(conn, sub)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.date.clone(),
                    r.r#type.clone(),
                    r.symbol.clone(),
                    r.exchange.clone(),
                    r.units.clone(),
                    r.price_per_unit.clone(),
                    r.fees.clone(),
                    r.split_ratio.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Date", "Type", "Symbol", "Exchange", "Units", "Price", "Fees", "Ratio"],
                rows,
            )
        );
    }
    Ok(())
}

#[derive(Serialize)]
pub struct LedgerListRow {
    pub date: String,
    pub r#type: String,
    pub symbol: String,
    pub exchange: String,
    pub units: String,
    pub price_per_unit: String,
    pub fees: String,
    pub split_ratio: String,
}

pub fn query_rows(conn: &Connection, sub: &clap::ArgMatches) -> Result<Vec<LedgerListRow>> {
    let mut sql = String::from(
        "SELECT date, type, symbol, exchange, units, price_per_unit, fees, split_ratio
         FROM ledger WHERE 1=1",
    );
    let mut params_vec: Vec<String> = Vec::new();

    if let Some(symbol) = sub.get_one::<String>("symbol") {
        sql.push_str(" AND symbol=?");
        params_vec.push(symbol.to_uppercase());
    }
    if let Some(exchange) = sub.get_one::<String>("exchange") {
        sql.push_str(" AND exchange=?");
        params_vec.push(exchange.to_uppercase());
    }
    if let Some(typ) = sub.get_one::<String>("type") {
        sql.push_str(" AND type=?");
        params_vec.push(typ.into());
    }
    sql.push_str(" ORDER BY date DESC, id DESC");
    if let Some(limit) = sub.get_one::<usize>("limit") {
        sql.push_str(" LIMIT ?");
        params_vec.push(limit.to_string());
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = if params_vec.is_empty() {
        stmt.query([])?
    } else {
        let params: Vec<&dyn rusqlite::ToSql> = params_vec
            .iter()
            .map(|s| s as &dyn rusqlite::ToSql)
            .collect();
        stmt.query(rusqlite::params_from_iter(params))?
    };

    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        data.push(LedgerListRow {
            date: r.get(0)?,
            r#type: r.get(1)?,
            symbol: r.get(2)?,
            exchange: r.get(3)?,
            units: r.get(4)?,
            price_per_unit: r.get(5)?,
            fees: r.get(6)?,
            split_ratio: r.get(7)?,
        });
    }
    Ok(data)
}
