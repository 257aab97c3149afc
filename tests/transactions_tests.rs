// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use exdate::{cli, commands::transactions};
use rusqlite::Connection;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    exdate::db::init_schema(&mut conn).unwrap();
    for i in 1..=3 {
        conn.execute(
            "INSERT INTO ledger(date, type, symbol, exchange, units, price_per_unit, fees, split_ratio)
             VALUES (?1, 'Buy', 'ES3', 'SGX', '100', '3.20', '0', '1')",
            rusqlite::params![format!("2025-01-0{}", i)],
        )
        .unwrap();
    }
    conn
}

fn list_matches(args: &[&str]) -> clap::ArgMatches {
    let matches = cli::build_cli().get_matches_from(args);
    let Some(("tx", tx_m)) = matches.subcommand() else {
        panic!("no tx subcommand");
    };
    let Some(("list", list_m)) = tx_m.subcommand() else {
        panic!("no list subcommand");
    };
    list_m.clone()
}

#[test]
fn list_limit_respected() {
    let conn = setup();
    let m = list_matches(&["exdate", "tx", "list", "--limit", "2"]);
    let rows = transactions::query_rows(&conn, &m).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date, "2025-01-03"); // newest first
}

#[test]
fn list_filters_by_symbol_and_type() {
    let conn = setup();
    conn.execute(
        "INSERT INTO ledger(date, type, symbol, exchange, units, price_per_unit, fees, split_ratio)
         VALUES ('2025-02-01', 'Div', 'ACME', 'NYSE', '50', '0.25', '0', '1')",
        [],
    )
    .unwrap();

    let m = list_matches(&["exdate", "tx", "list", "--symbol", "acme"]);
    let rows = transactions::query_rows(&conn, &m).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].symbol, "ACME");

    let m = list_matches(&["exdate", "tx", "list", "--type", "Buy"]);
    let rows = transactions::query_rows(&conn, &m).unwrap();
    assert_eq!(rows.len(), 3);
}

#[test]
fn buy_records_paired_cash_in_row() {
    let conn = setup();
    conn.execute("DELETE FROM ledger", []).unwrap();

    let matches = cli::build_cli().get_matches_from([
        "exdate", "tx", "buy", "--date", " 2025-03-01 ", "--symbol", " acme ", "--exchange",
        " nyse ", "--units", " 10 ", "--price", " 5.00 ", "--fees", " 1.25 ",
    ]);
    let Some(("tx", tx_m)) = matches.subcommand() else {
        panic!("no tx subcommand");
    };
    transactions::handle(&conn, tx_m).unwrap();

    let (cash_units, cash_amount): (String, String) = conn
        .query_row(
            "SELECT units, price_per_unit FROM ledger WHERE type='CashIn'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(cash_units, "1");
    assert_eq!(cash_amount, "51.25"); // 10 * 5.00 + 1.25

    let (sym, exch, date): (String, String, String) = conn
        .query_row(
            "SELECT symbol, exchange, date FROM ledger WHERE type='Buy'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap();
    assert_eq!(sym, "ACME"); // trimmed and uppercased
    assert_eq!(exch, "NYSE");
    assert_eq!(date, "2025-03-01");
}
