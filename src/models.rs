// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnType {
    Buy,
    Sell,
    CashIn,
    Div,
    Split,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnType::Buy => "Buy",
            TxnType::Sell => "Sell",
            TxnType::CashIn => "CashIn",
            TxnType::Div => "Div",
            TxnType::Split => "Split",
        }
    }
}

impl FromStr for TxnType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Buy" => Ok(TxnType::Buy),
            "Sell" => Ok(TxnType::Sell),
            "CashIn" => Ok(TxnType::CashIn),
            "Div" => Ok(TxnType::Div),
            "Split" => Ok(TxnType::Split),
            other => Err(anyhow!("Unknown transaction type '{}'", other)),
        }
    }
}

impl fmt::Display for TxnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split ratio as the provider reports it: new shares per old share.
/// `1/7` is a 1-for-7 consolidation (7 old shares become 1 new one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRatio {
    pub numerator: u32,
    pub denominator: u32,
}

static RATIO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*[:/]\s*(\d+)\s*$").unwrap());

impl SplitRatio {
    pub fn new(numerator: u32, denominator: u32) -> Result<Self> {
        if numerator == 0 || denominator == 0 {
            return Err(anyhow!(
                "Invalid split ratio {}/{}: terms must be non-zero",
                numerator,
                denominator
            ));
        }
        Ok(SplitRatio {
            numerator,
            denominator,
        })
    }

    pub const ONE: SplitRatio = SplitRatio {
        numerator: 1,
        denominator: 1,
    };

    pub fn is_one(&self) -> bool {
        self.numerator == self.denominator
    }

    /// Units held before the split scale by num/den. Multiply before
    /// dividing so exact ratios stay exact in Decimal arithmetic.
    pub fn apply_to_units(&self, units: Decimal) -> Decimal {
        (units * Decimal::from(self.numerator) / Decimal::from(self.denominator)).normalize()
    }

    /// Prices before the split scale by den/num, the inverse of the unit
    /// adjustment, so units * price is unchanged per row.
    pub fn apply_to_price(&self, price: Decimal) -> Decimal {
        (price * Decimal::from(self.denominator) / Decimal::from(self.numerator)).normalize()
    }
}

impl FromStr for SplitRatio {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(caps) = RATIO_RE.captures(s) {
            let num: u32 = caps[1].parse()?;
            let den: u32 = caps[2].parse()?;
            return SplitRatio::new(num, den);
        }
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u32>() {
            return SplitRatio::new(n, 1);
        }
        Err(anyhow!("Invalid split ratio '{}', expected N/M, N:M or N", s))
    }
}

impl fmt::Display for SplitRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRow {
    pub id: i64,
    pub date: NaiveDate,
    pub txn_type: TxnType,
    pub symbol: String,
    pub exchange: String,
    pub units: Decimal,
    pub price_per_unit: Decimal,
    pub fees: Decimal,
    pub split_ratio: SplitRatio,
}

/// Quote fundamentals for one security. Immutable once fetched; cached
/// with a short TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub name: String,
    pub price: f64,
    pub price_change: Option<f64>,
    pub percent_change: Option<f64>,
    pub currency: Option<String>,
    pub fifty_two_week_low: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_day_average: Option<f64>,
    pub two_hundred_day_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendEvent {
    pub date: NaiveDate,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitEvent {
    pub date: NaiveDate,
    pub ratio: SplitRatio,
}

/// Corporate-action history for one security. `None` fields mean the
/// security has no such action on record, which is distinct from a cache
/// miss (not yet fetched).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorporateActionRecord {
    pub annual_dividend_total: Option<Decimal>,
    pub last_dividend: Option<DividendEvent>,
    pub last_split: Option<SplitEvent>,
}

/// Daily reconciliation state for one security, derived from checked-set
/// membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Unchecked,
    DividendChecked,
    SplitChecked,
    BothChecked,
}

impl CheckState {
    pub fn from_flags(div_checked: bool, split_checked: bool) -> Self {
        match (div_checked, split_checked) {
            (false, false) => CheckState::Unchecked,
            (true, false) => CheckState::DividendChecked,
            (false, true) => CheckState::SplitChecked,
            (true, true) => CheckState::BothChecked,
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckState::Unchecked => "Unchecked",
            CheckState::DividendChecked => "DividendChecked",
            CheckState::SplitChecked => "SplitChecked",
            CheckState::BothChecked => "BothChecked",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn split_ratio_parses_fraction_colon_and_integer() {
        assert_eq!(
            SplitRatio::from_str("1/7").unwrap(),
            SplitRatio::new(1, 7).unwrap()
        );
        assert_eq!(
            SplitRatio::from_str("4:1").unwrap(),
            SplitRatio::new(4, 1).unwrap()
        );
        assert_eq!(
            SplitRatio::from_str("7").unwrap(),
            SplitRatio::new(7, 1).unwrap()
        );
        assert!(SplitRatio::from_str("0/3").is_err());
        assert!(SplitRatio::from_str("x/y").is_err());
    }

    #[test]
    fn split_ratio_scales_units_and_price_inversely() {
        let ratio = SplitRatio::from_str("1/7").unwrap();
        let units = Decimal::from_str("700").unwrap();
        let price = Decimal::from_str("7.00").unwrap();
        assert_eq!(ratio.apply_to_units(units), Decimal::from_str("100").unwrap());
        assert_eq!(ratio.apply_to_price(price), Decimal::from_str("49").unwrap());
        // units * price is preserved
        assert_eq!(
            ratio.apply_to_units(units) * ratio.apply_to_price(price),
            units * price
        );
    }

    #[test]
    fn split_ratio_display_round_trips() {
        for s in ["1/7", "4", "3/2"] {
            let r = SplitRatio::from_str(s).unwrap();
            assert_eq!(SplitRatio::from_str(&r.to_string()).unwrap(), r);
        }
    }

    #[test]
    fn check_state_from_flags() {
        assert_eq!(CheckState::from_flags(false, false), CheckState::Unchecked);
        assert_eq!(
            CheckState::from_flags(true, false),
            CheckState::DividendChecked
        );
        assert_eq!(CheckState::from_flags(false, true), CheckState::SplitChecked);
        assert_eq!(CheckState::from_flags(true, true), CheckState::BothChecked);
    }
}
