// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use exdate::market::{ActionFeed, MarketError};
use exdate::models::{
    CheckState, CorporateActionRecord, DividendEvent, SplitEvent, SplitRatio,
};
use exdate::tracker;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    exdate::db::init_schema(&mut conn).unwrap();
    conn
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn insert_trade(conn: &Connection, d: &str, typ: &str, sym: &str, exch: &str, units: &str, price: &str) {
    conn.execute(
        "INSERT INTO ledger(date, type, symbol, exchange, units, price_per_unit, fees, split_ratio)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, '0', '1')",
        rusqlite::params![d, typ, sym, exch, units, price],
    )
    .unwrap();
}

fn ledger_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM ledger", [], |r| r.get(0))
        .unwrap()
}

#[derive(Default)]
struct StubFeed {
    records: HashMap<(String, String), CorporateActionRecord>,
    fail: HashSet<(String, String)>,
    calls: RefCell<usize>,
}

impl StubFeed {
    fn with_record(mut self, symbol: &str, exchange: &str, record: CorporateActionRecord) -> Self {
        self.records
            .insert((symbol.to_string(), exchange.to_string()), record);
        self
    }

    fn failing(mut self, symbol: &str, exchange: &str) -> Self {
        self.fail
            .insert((symbol.to_string(), exchange.to_string()));
        self
    }
}

impl ActionFeed for StubFeed {
    fn corporate_actions(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> Result<CorporateActionRecord, MarketError> {
        *self.calls.borrow_mut() += 1;
        let key = (symbol.to_string(), exchange.to_string());
        if self.fail.contains(&key) {
            return Err(MarketError::RemoteFetch {
                symbol: symbol.to_string(),
                exchange: exchange.to_string(),
                source: anyhow::anyhow!("connection refused"),
            });
        }
        Ok(self.records.get(&key).cloned().unwrap_or_default())
    }
}

fn dividend_today(today: &str, amount: &str) -> CorporateActionRecord {
    CorporateActionRecord {
        annual_dividend_total: Some(dec(amount)),
        last_dividend: Some(DividendEvent {
            date: date(today),
            amount: dec(amount),
        }),
        last_split: None,
    }
}

#[test]
fn dividend_with_todays_ex_date_appends_one_div_row() {
    let mut conn = setup();
    insert_trade(&conn, "2025-01-10", "Buy", "ES3", "SGX", "100", "3.20");
    let feed = StubFeed::default().with_record("ES3", "SGX", dividend_today("2025-08-06", "0.50"));

    let summary = tracker::run_daily_check(&mut conn, &feed, date("2025-08-06")).unwrap();
    assert_eq!(summary.dividends_added, 1);
    assert_eq!(summary.splits_added, 0);

    let (typ, units, price, fees, ratio): (String, String, String, String, String) = conn
        .query_row(
            "SELECT type, units, price_per_unit, fees, split_ratio FROM ledger WHERE type='Div'",
            [],
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                ))
            },
        )
        .unwrap();
    assert_eq!(typ, "Div");
    assert_eq!(Decimal::from_str(&units).unwrap(), dec("100"));
    assert_eq!(Decimal::from_str(&price).unwrap(), dec("0.50"));
    assert_eq!(Decimal::from_str(&fees).unwrap(), Decimal::ZERO);
    assert_eq!(ratio, "1");

    assert_eq!(
        tracker::check_state(&conn, "ES3", "SGX").unwrap(),
        CheckState::DividendChecked
    );
}

#[test]
fn second_run_same_day_appends_nothing() {
    let mut conn = setup();
    insert_trade(&conn, "2025-01-10", "Buy", "ES3", "SGX", "100", "3.20");
    let feed = StubFeed::default().with_record("ES3", "SGX", dividend_today("2025-08-06", "0.50"));

    let today = date("2025-08-06");
    tracker::run_daily_check(&mut conn, &feed, today).unwrap();
    let count_after_first = ledger_count(&conn);

    let summary = tracker::run_daily_check(&mut conn, &feed, today).unwrap();
    assert_eq!(summary.dividends_added, 0);
    assert_eq!(ledger_count(&conn), count_after_first);
}

#[test]
fn split_today_appends_and_rewrites_history() {
    let mut conn = setup();
    insert_trade(&conn, "2024-03-01", "Buy", "ACME", "NYSE", "700", "7.00");

    let record = CorporateActionRecord {
        annual_dividend_total: None,
        last_dividend: None,
        last_split: Some(SplitEvent {
            date: date("2025-08-06"),
            ratio: SplitRatio::from_str("1/7").unwrap(),
        }),
    };
    let feed = StubFeed::default().with_record("ACME", "NYSE", record);

    let summary = tracker::run_daily_check(&mut conn, &feed, date("2025-08-06")).unwrap();
    assert_eq!(summary.splits_added, 1);

    let (units, price): (String, String) = conn
        .query_row(
            "SELECT units, price_per_unit FROM ledger WHERE type='Buy'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(Decimal::from_str(&units).unwrap(), dec("100"));
    assert_eq!(Decimal::from_str(&price).unwrap(), dec("49.00"));

    // The Split row records the pre-split holding (700 before the ex-date).
    let split_units: String = conn
        .query_row("SELECT units FROM ledger WHERE type='Split'", [], |r| {
            r.get(0)
        })
        .unwrap();
    assert_eq!(Decimal::from_str(&split_units).unwrap(), dec("700"));

    assert_eq!(
        tracker::check_state(&conn, "ACME", "NYSE").unwrap(),
        CheckState::SplitChecked
    );
}

#[test]
fn zero_holdings_skip_without_marking_checked() {
    let mut conn = setup();
    insert_trade(&conn, "2025-01-10", "Buy", "GONE", "NYSE", "50", "10");
    insert_trade(&conn, "2025-02-10", "Sell", "GONE", "NYSE", "50", "12");
    let feed = StubFeed::default().with_record("GONE", "NYSE", dividend_today("2025-08-06", "1.00"));

    let summary = tracker::run_daily_check(&mut conn, &feed, date("2025-08-06")).unwrap();
    assert_eq!(summary.skipped_zero_holdings, 1);
    assert_eq!(summary.dividends_added, 0);
    assert_eq!(*feed.calls.borrow(), 0);
    assert_eq!(
        tracker::check_state(&conn, "GONE", "NYSE").unwrap(),
        CheckState::Unchecked
    );

    // A later buy makes it eligible again on the next run.
    insert_trade(&conn, "2025-08-01", "Buy", "GONE", "NYSE", "10", "11");
    let summary = tracker::run_daily_check(&mut conn, &feed, date("2025-08-06")).unwrap();
    assert_eq!(summary.dividends_added, 1);
}

#[test]
fn fetch_failure_isolated_and_retried_next_run() {
    let mut conn = setup();
    insert_trade(&conn, "2025-01-10", "Buy", "BAD", "NYSE", "10", "5");
    insert_trade(&conn, "2025-01-10", "Buy", "GOOD", "NYSE", "10", "5");

    let feed = StubFeed::default()
        .with_record("GOOD", "NYSE", dividend_today("2025-08-06", "0.25"))
        .failing("BAD", "NYSE");

    let today = date("2025-08-06");
    let summary = tracker::run_daily_check(&mut conn, &feed, today).unwrap();
    assert_eq!(summary.dividends_added, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0, "BAD");
    assert_eq!(
        tracker::check_state(&conn, "BAD", "NYSE").unwrap(),
        CheckState::Unchecked
    );

    // Provider recovers: the failed security is picked up, the checked one
    // is not re-appended.
    let recovered = StubFeed::default()
        .with_record("GOOD", "NYSE", dividend_today("2025-08-06", "0.25"))
        .with_record("BAD", "NYSE", dividend_today("2025-08-06", "0.10"));
    let summary = tracker::run_daily_check(&mut conn, &recovered, today).unwrap();
    assert_eq!(summary.dividends_added, 1);
    let div_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM ledger WHERE type='Div'", [], |r| {
            r.get(0)
        })
        .unwrap();
    assert_eq!(div_rows, 2);
}

#[test]
fn fully_checked_security_is_not_fetched() {
    let mut conn = setup();
    insert_trade(&conn, "2025-01-10", "Buy", "ES3", "SGX", "100", "3.20");
    for kind in ["div", "split"] {
        conn.execute(
            "INSERT INTO action_checks(kind, symbol, exchange, checked_on)
             VALUES (?1, 'ES3', 'SGX', '2025-08-06')",
            [kind],
        )
        .unwrap();
    }
    let feed = StubFeed::default().with_record("ES3", "SGX", dividend_today("2025-08-06", "0.50"));

    let summary = tracker::run_daily_check(&mut conn, &feed, date("2025-08-06")).unwrap();
    assert_eq!(*feed.calls.borrow(), 0);
    assert_eq!(summary.dividends_added, 0);
    assert_eq!(
        tracker::check_state(&conn, "ES3", "SGX").unwrap(),
        CheckState::BothChecked
    );
}

#[test]
fn event_dated_another_day_is_not_recorded() {
    let mut conn = setup();
    insert_trade(&conn, "2025-01-10", "Buy", "ES3", "SGX", "100", "3.20");
    let feed = StubFeed::default().with_record("ES3", "SGX", dividend_today("2025-08-05", "0.50"));

    let summary = tracker::run_daily_check(&mut conn, &feed, date("2025-08-06")).unwrap();
    assert_eq!(summary.dividends_added, 0);
    // No event recorded means no checked-set entry either; the record is
    // probed again (through the cache) on later runs today.
    assert_eq!(
        tracker::check_state(&conn, "ES3", "SGX").unwrap(),
        CheckState::Unchecked
    );
}

#[test]
fn reset_clears_checked_state() {
    let mut conn = setup();
    insert_trade(&conn, "2025-01-10", "Buy", "ES3", "SGX", "100", "3.20");
    let feed = StubFeed::default().with_record("ES3", "SGX", dividend_today("2025-08-06", "0.50"));
    tracker::run_daily_check(&mut conn, &feed, date("2025-08-06")).unwrap();
    assert_eq!(
        tracker::check_state(&conn, "ES3", "SGX").unwrap(),
        CheckState::DividendChecked
    );

    let cleared = tracker::reset_checked_state(&conn).unwrap();
    assert_eq!(cleared, 1);
    assert_eq!(
        tracker::check_state(&conn, "ES3", "SGX").unwrap(),
        CheckState::Unchecked
    );
}
