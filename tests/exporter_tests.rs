// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use exdate::{cli, commands::exporter};
use rusqlite::Connection;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    exdate::db::init_schema(&mut conn).unwrap();
    conn.execute(
        "INSERT INTO ledger(date, type, symbol, exchange, units, price_per_unit, fees, split_ratio)
         VALUES ('2025-01-02', 'Buy', 'ES3', 'SGX', '100', '3.20', '1.50', '1')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO ledger(date, type, symbol, exchange, units, price_per_unit, fees, split_ratio)
         VALUES ('2025-08-06', 'Split', 'ES3', 'SGX', '100', '0', '0', '1/7')",
        [],
    )
    .unwrap();
    conn
}

#[test]
fn csv_export_round_trips_rows() {
    let conn = setup();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("ledger.csv");

    let matches = cli::build_cli().get_matches_from([
        "exdate",
        "export",
        "ledger",
        "--format",
        "csv",
        "--out",
        out.to_str().unwrap(),
    ]);
    let Some(("export", sub)) = matches.subcommand() else {
        panic!("no export subcommand");
    };
    exporter::handle(&conn, sub).unwrap();

    let mut rdr = csv::Reader::from_path(&out).unwrap();
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][1], "Buy");
    assert_eq!(&rows[1][7], "1/7");
}

#[test]
fn json_export_writes_array() {
    let conn = setup();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("ledger.json");

    let matches = cli::build_cli().get_matches_from([
        "exdate",
        "export",
        "ledger",
        "--format",
        "json",
        "--out",
        out.to_str().unwrap(),
    ]);
    let Some(("export", sub)) = matches.subcommand() else {
        panic!("no export subcommand");
    };
    exporter::handle(&conn, sub).unwrap();

    let text = std::fs::read_to_string(&out).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    let arr = parsed.as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["symbol"], "ES3");
    assert_eq!(arr[1]["type"], "Split");
}
