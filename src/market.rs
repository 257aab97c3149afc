// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::cache::{CacheError, CacheStore, TypedCache};
use crate::models::{
    CorporateActionRecord, DividendEvent, MarketSnapshot, SplitEvent, SplitRatio,
};
use crate::utils::{epoch_to_local_date, http_client, local_midnight_epoch, today_local};
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Quote snapshots change intraday; keep them for an hour.
const SNAPSHOT_TTL_SECS: u64 = 3600;
/// Corporate actions change rarely; keep them for four hours.
const ACTIONS_TTL_SECS: u64 = 14400;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("No data found for {symbol} ({exchange}): {field}")]
    NoDataFound {
        symbol: String,
        exchange: String,
        field: &'static str,
    },
    #[error("Remote fetch failed for {symbol} ({exchange})")]
    RemoteFetch {
        symbol: String,
        exchange: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// The slice of the market client the daily tracker needs. Kept narrow so
/// tests can feed canned records.
pub trait ActionFeed {
    fn corporate_actions(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> Result<CorporateActionRecord, MarketError>;
}

pub fn snapshot_cache_key(symbol: &str, exchange: &str) -> String {
    format!(
        "{}{}YAHOOSIMPLE",
        symbol.to_uppercase(),
        exchange.to_uppercase()
    )
}

pub fn actions_cache_key(symbol: &str, exchange: &str) -> String {
    format!(
        "{}{}YAHOOADVANCED",
        symbol.to_uppercase(),
        exchange.to_uppercase()
    )
}

pub struct MarketDataClient<S: CacheStore> {
    http: reqwest::blocking::Client,
    cache: TypedCache<S>,
    suffixes: HashMap<String, String>,
}

impl<S: CacheStore> MarketDataClient<S> {
    pub fn new(cache: TypedCache<S>, suffixes: HashMap<String, String>) -> Result<Self> {
        Ok(MarketDataClient {
            http: http_client()?,
            cache,
            suffixes,
        })
    }

    /// Exchange code to Yahoo symbol. Unmapped exchanges query the bare
    /// symbol; `doctor` reports them.
    fn yahoo_symbol(&self, symbol: &str, exchange: &str) -> String {
        match self.suffixes.get(&exchange.to_uppercase()) {
            Some(suffix) if !suffix.is_empty() => format!("{}.{}", symbol, suffix),
            _ => symbol.to_string(),
        }
    }

    pub fn snapshot(&self, symbol: &str, exchange: &str) -> Result<MarketSnapshot, MarketError> {
        let key = snapshot_cache_key(symbol, exchange);
        if let Some(snap) = self.cache.get_object::<MarketSnapshot>(&key)? {
            return Ok(snap);
        }

        let url = format!(
            "https://query1.finance.yahoo.com/v7/finance/quote?symbols={}",
            self.yahoo_symbol(symbol, exchange)
        );
        let envelope: QuoteEnvelope = self.fetch_json(&url, symbol, exchange)?;
        let raw = envelope
            .quote_response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| MarketError::NoDataFound {
                symbol: symbol.to_string(),
                exchange: exchange.to_string(),
                field: "quote",
            })?;
        let snap = normalize_snapshot(raw, symbol, exchange)?;

        self.cache.put_object(&key, &snap, Some(SNAPSHOT_TTL_SECS))?;
        Ok(snap)
    }

    pub fn corporate_actions(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> Result<CorporateActionRecord, MarketError> {
        let key = actions_cache_key(symbol, exchange);
        if let Some(record) = self.cache.get_object::<CorporateActionRecord>(&key)? {
            return Ok(record);
        }

        let chart = self.fetch_chart(symbol, exchange)?;
        let record = normalize_actions(&chart, last_calendar_year());
        self.cache
            .put_object(&key, &record, Some(ACTIONS_TTL_SECS))?;
        Ok(record)
    }

    /// One year of daily closes, oldest first. Never cached: the payload
    /// is large and reuse is low. The corporate-action record parsed from
    /// the same response is cached as a side effect.
    pub fn closing_prices(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> Result<Vec<Decimal>, MarketError> {
        let chart = self.fetch_chart(symbol, exchange)?;

        let record = normalize_actions(&chart, last_calendar_year());
        let key = actions_cache_key(symbol, exchange);
        self.cache
            .put_object(&key, &record, Some(ACTIONS_TTL_SECS))?;

        Ok(normalize_closes(&chart))
    }

    fn fetch_chart(&self, symbol: &str, exchange: &str) -> Result<ChartResult, MarketError> {
        let start = NaiveDate::from_ymd_opt(last_calendar_year(), 1, 1)
            .map(local_midnight_epoch)
            .unwrap_or_default();
        let yahoo_symbol = self.yahoo_symbol(symbol, exchange);
        let url = format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{sym}?symbol={sym}&period1={start}&period2=9999999999&interval=1d&includePrePost=true&events=div%2Csplit",
            sym = yahoo_symbol,
            start = start
        );
        let envelope: ChartEnvelope = self.fetch_json(&url, symbol, exchange)?;
        envelope
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| MarketError::NoDataFound {
                symbol: symbol.to_string(),
                exchange: exchange.to_string(),
                field: "chart",
            })
    }

    fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        symbol: &str,
        exchange: &str,
    ) -> Result<T, MarketError> {
        let fail = |source: anyhow::Error| MarketError::RemoteFetch {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            source,
        };
        let resp = self
            .http
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(e.into()))?;
        resp.json::<T>().map_err(|e| fail(e.into()))
    }
}

impl<S: CacheStore> ActionFeed for MarketDataClient<S> {
    fn corporate_actions(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> Result<CorporateActionRecord, MarketError> {
        MarketDataClient::corporate_actions(self, symbol, exchange)
    }
}

fn last_calendar_year() -> i32 {
    today_local().year() - 1
}

// ---- Yahoo response schemas ----

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(rename = "quoteResponse")]
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    result: Vec<RawQuote>,
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    #[serde(rename = "longName")]
    long_name: Option<String>,
    #[serde(rename = "shortName")]
    short_name: Option<String>,
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "regularMarketChange")]
    regular_market_change: Option<f64>,
    #[serde(rename = "regularMarketChangePercent")]
    regular_market_change_percent: Option<f64>,
    currency: Option<String>,
    #[serde(rename = "fiftyTwoWeekLow")]
    fifty_two_week_low: Option<f64>,
    #[serde(rename = "fiftyTwoWeekHigh")]
    fifty_two_week_high: Option<f64>,
    #[serde(rename = "fiftyDayAverage")]
    fifty_day_average: Option<f64>,
    #[serde(rename = "twoHundredDayAverage")]
    two_hundred_day_average: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartPayload,
}

#[derive(Debug, Deserialize)]
struct ChartPayload {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    events: Option<ChartEvents>,
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Deserialize)]
struct ChartEvents {
    dividends: Option<HashMap<String, RawDividend>>,
    splits: Option<HashMap<String, RawSplit>>,
}

#[derive(Debug, Deserialize)]
struct RawDividend {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct RawSplit {
    date: i64,
    numerator: Option<f64>,
    denominator: Option<f64>,
    #[serde(rename = "splitRatio")]
    split_ratio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<RawQuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct RawQuoteBlock {
    close: Option<Vec<Option<f64>>>,
}

// ---- Normalization (provider schema -> typed records) ----

fn normalize_snapshot(
    raw: RawQuote,
    symbol: &str,
    exchange: &str,
) -> Result<MarketSnapshot, MarketError> {
    let no_data = |field: &'static str| MarketError::NoDataFound {
        symbol: symbol.to_string(),
        exchange: exchange.to_string(),
        field,
    };
    let name = raw
        .long_name
        .or(raw.short_name)
        .ok_or_else(|| no_data("name"))?;
    let price = raw.regular_market_price.ok_or_else(|| no_data("price"))?;
    Ok(MarketSnapshot {
        name,
        price,
        price_change: raw.regular_market_change,
        percent_change: raw.regular_market_change_percent,
        currency: raw.currency,
        fifty_two_week_low: raw.fifty_two_week_low,
        fifty_two_week_high: raw.fifty_two_week_high,
        fifty_day_average: raw.fifty_day_average,
        two_hundred_day_average: raw.two_hundred_day_average,
    })
}

fn normalize_actions(chart: &ChartResult, last_year: i32) -> CorporateActionRecord {
    let mut record = CorporateActionRecord::default();
    let Some(events) = &chart.events else {
        return record;
    };

    if let Some(dividends) = &events.dividends {
        // Scan in epoch order so the most-recent pick is deterministic;
        // a strictly-greater comparison keeps the first on a tie.
        let mut sorted: Vec<&RawDividend> = dividends.values().collect();
        sorted.sort_by_key(|d| d.date);

        let mut annual = Decimal::ZERO;
        let mut latest: Option<&RawDividend> = None;
        for div in sorted {
            let Some(date) = epoch_to_local_date(div.date) else {
                continue;
            };
            if latest.is_none_or(|best| div.date > best.date) {
                latest = Some(div);
            }
            if date.year() == last_year {
                annual += Decimal::from_f64(div.amount).unwrap_or(Decimal::ZERO);
            }
        }
        record.annual_dividend_total = Some(annual);
        record.last_dividend = latest.and_then(|div| {
            Some(DividendEvent {
                date: epoch_to_local_date(div.date)?,
                amount: Decimal::from_f64(div.amount)?,
            })
        });
    }

    if let Some(splits) = &events.splits {
        let mut sorted: Vec<&RawSplit> = splits.values().collect();
        sorted.sort_by_key(|s| s.date);

        let mut latest: Option<&RawSplit> = None;
        for split in sorted {
            if latest.is_none_or(|best| split.date > best.date) {
                latest = Some(split);
            }
        }
        record.last_split = latest.and_then(|split| {
            Some(SplitEvent {
                date: epoch_to_local_date(split.date)?,
                ratio: normalize_ratio(split)?,
            })
        });
    }

    record
}

fn normalize_ratio(split: &RawSplit) -> Option<SplitRatio> {
    if let (Some(num), Some(den)) = (split.numerator, split.denominator) {
        let num = num.round() as i64;
        let den = den.round() as i64;
        if num > 0 && den > 0 {
            return SplitRatio::new(num as u32, den as u32).ok();
        }
    }
    split
        .split_ratio
        .as_deref()
        .and_then(|s| SplitRatio::from_str(s).ok())
}

fn normalize_closes(chart: &ChartResult) -> Vec<Decimal> {
    chart
        .indicators
        .iter()
        .flat_map(|i| i.quote.iter())
        .flat_map(|q| q.close.iter().flatten())
        .flatten()
        .filter_map(|px| Decimal::from_f64(*px))
        .collect()
}
