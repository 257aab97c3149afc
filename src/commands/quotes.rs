// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::cache::{SqliteCacheStore, TypedCache};
use crate::db::exchange_suffixes;
use crate::market::MarketDataClient;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("snapshot", sub)) => snapshot(conn, sub)?,
        Some(("actions", sub)) => actions(conn, sub)?,
        Some(("prices", sub)) => prices(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn client(conn: &Connection) -> Result<MarketDataClient<SqliteCacheStore<'_>>> {
    let cache = TypedCache::new(SqliteCacheStore::new(conn));
    MarketDataClient::new(cache, exchange_suffixes(conn)?)
}

fn security_args(sub: &clap::ArgMatches) -> (String, String) {
    let symbol = sub
        .get_one::<String>("symbol")
        .map(|s| s.trim().to_uppercase())
        .unwrap();
    let exchange = sub
        .get_one::<String>("exchange")
        .map(|s| s.trim().to_uppercase())
        .unwrap();
    (symbol, exchange)
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{:.4}", x)).unwrap_or_else(|| "-".into())
}

fn snapshot(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (symbol, exchange) = security_args(sub);
    let snap = client(conn)?.snapshot(&symbol, &exchange)?;
    let rows = vec![
        vec!["Name".to_string(), snap.name.clone()],
        vec!["Price".to_string(), format!("{:.4}", snap.price)],
        vec!["Change".to_string(), fmt_opt(snap.price_change)],
        vec!["Change %".to_string(), fmt_opt(snap.percent_change)],
        vec![
            "Currency".to_string(),
            snap.currency.clone().unwrap_or_else(|| "-".into()),
        ],
        vec!["52w Low".to_string(), fmt_opt(snap.fifty_two_week_low)],
        vec!["52w High".to_string(), fmt_opt(snap.fifty_two_week_high)],
        vec!["50d Avg".to_string(), fmt_opt(snap.fifty_day_average)],
        vec!["200d Avg".to_string(), fmt_opt(snap.two_hundred_day_average)],
    ];
    println!("{}", pretty_table(&["Field", "Value"], rows));
    Ok(())
}

fn actions(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (symbol, exchange) = security_args(sub);
    let record = client(conn)?.corporate_actions(&symbol, &exchange)?;
    let annual = record
        .annual_dividend_total
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".into());
    let (div_date, div_amount) = match &record.last_dividend {
        Some(div) => (div.date.to_string(), div.amount.to_string()),
        None => ("-".into(), "-".into()),
    };
    let (split_date, split_ratio) = match &record.last_split {
        Some(split) => (split.date.to_string(), split.ratio.to_string()),
        None => ("-".into(), "-".into()),
    };
    let rows = vec![
        vec!["Annual dividend total".to_string(), annual],
        vec!["Last dividend date".to_string(), div_date],
        vec!["Last dividend amount".to_string(), div_amount],
        vec!["Last split date".to_string(), split_date],
        vec!["Last split ratio".to_string(), split_ratio],
    ];
    println!("{}", pretty_table(&["Field", "Value"], rows));
    Ok(())
}

fn prices(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (symbol, exchange) = security_args(sub);
    let closes = client(conn)?.closing_prices(&symbol, &exchange)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &closes)? {
        return Ok(());
    }
    if closes.is_empty() {
        println!("No closing prices for {} ({})", symbol, exchange);
        return Ok(());
    }
    let min = closes.iter().min().cloned().unwrap_or_default();
    let max = closes.iter().max().cloned().unwrap_or_default();
    let rows = vec![
        vec!["Sessions".to_string(), closes.len().to_string()],
        vec!["First".to_string(), closes[0].to_string()],
        vec![
            "Last".to_string(),
            closes[closes.len() - 1].to_string(),
        ],
        vec!["Low".to_string(), min.to_string()],
        vec!["High".to_string(), max.to_string()],
    ];
    println!("{}", pretty_table(&["Field", "Value"], rows));
    Ok(())
}
