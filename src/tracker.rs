// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger;
use crate::market::ActionFeed;
use crate::models::CheckState;
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Dividend,
    Split,
}

impl CheckKind {
    fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Dividend => "div",
            CheckKind::Split => "split",
        }
    }
}

/// Outcome of one daily pass over the tracked securities.
#[derive(Debug, Default)]
pub struct DailyCheckSummary {
    pub securities: usize,
    pub dividends_added: usize,
    pub splits_added: usize,
    pub skipped_zero_holdings: usize,
    /// (symbol, exchange, error) for securities whose fetch failed; they
    /// stay unchecked and are retried on the next scheduled run.
    pub failures: Vec<(String, String, String)>,
}

/// Walk every tracked security once and reconcile dividend/split events
/// whose ex-date is `today`. Sequential, run-to-completion; a market
/// failure for one security never aborts the rest, a ledger-write
/// failure does.
pub fn run_daily_check<F: ActionFeed>(
    conn: &mut Connection,
    feed: &F,
    today: NaiveDate,
) -> Result<DailyCheckSummary> {
    let mut summary = DailyCheckSummary::default();
    let securities = ledger::tracked_securities(conn)?;
    summary.securities = securities.len();

    for (symbol, exchange) in securities {
        let pre_ex_div_units = ledger::units_held_before(conn, &symbol, &exchange, today)?;
        let pre_ex_split_units = pre_ex_div_units;

        // Nothing held, nothing to reconcile. Deliberately no checked-set
        // write: the security must stay re-checkable once a holding
        // appears again.
        if pre_ex_div_units <= Decimal::ZERO && pre_ex_split_units <= Decimal::ZERO {
            summary.skipped_zero_holdings += 1;
            continue;
        }

        // Pre-read membership doubles as the write lock: a security
        // checked by an earlier run today must not be re-appended.
        let div_lock = is_checked(conn, CheckKind::Dividend, &symbol, &exchange)?;
        let split_lock = is_checked(conn, CheckKind::Split, &symbol, &exchange)?;
        if div_lock && split_lock {
            continue;
        }

        // One fetch per security per run, shared by both checks.
        let record = match feed.corporate_actions(&symbol, &exchange) {
            Ok(record) => record,
            Err(err) => {
                summary
                    .failures
                    .push((symbol.clone(), exchange.clone(), err.to_string()));
                continue;
            }
        };

        let mut div_done = false;
        let mut split_done = false;

        if !div_lock {
            if let Some(div) = &record.last_dividend {
                if div.date == today && pre_ex_div_units > Decimal::ZERO {
                    ledger::append_dividend(
                        conn,
                        &symbol,
                        &exchange,
                        div.date,
                        div.amount,
                        pre_ex_div_units,
                    )?;
                    summary.dividends_added += 1;
                    div_done = true;
                }
            }
        }

        if !split_lock {
            if let Some(split) = &record.last_split {
                if split.date == today && pre_ex_split_units > Decimal::ZERO {
                    ledger::append_split_and_rewrite(
                        conn,
                        &symbol,
                        &exchange,
                        split.date,
                        split.ratio,
                        pre_ex_split_units,
                    )?;
                    summary.splits_added += 1;
                    split_done = true;
                }
            }
        }

        if div_done && !div_lock {
            mark_checked(conn, CheckKind::Dividend, &symbol, &exchange, today)?;
        }
        if split_done && !split_lock {
            mark_checked(conn, CheckKind::Split, &symbol, &exchange, today)?;
        }
    }

    Ok(summary)
}

pub fn is_checked(
    conn: &Connection,
    kind: CheckKind,
    symbol: &str,
    exchange: &str,
) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM action_checks WHERE kind=?1 AND symbol=?2 AND exchange=?3",
    )?;
    let found = stmt.exists(params![kind.as_str(), symbol, exchange])?;
    Ok(found)
}

fn mark_checked(
    conn: &Connection,
    kind: CheckKind,
    symbol: &str,
    exchange: &str,
    today: NaiveDate,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO action_checks(kind, symbol, exchange, checked_on)
         VALUES (?1, ?2, ?3, ?4)",
        params![kind.as_str(), symbol, exchange, today.to_string()],
    )?;
    Ok(())
}

/// Explicit daily state for one security.
pub fn check_state(conn: &Connection, symbol: &str, exchange: &str) -> Result<CheckState> {
    let div = is_checked(conn, CheckKind::Dividend, symbol, exchange)?;
    let split = is_checked(conn, CheckKind::Split, symbol, exchange)?;
    Ok(CheckState::from_flags(div, split))
}

/// Clear the checked-set; the external scheduler invokes this once at the
/// start of each calendar day.
pub fn reset_checked_state(conn: &Connection) -> Result<usize> {
    let n = conn.execute("DELETE FROM action_checks", [])?;
    Ok(n)
}
