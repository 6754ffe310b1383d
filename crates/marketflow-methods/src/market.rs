//! Market data provider seam and the in-memory sample implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::time::serialize_instant;

/// Candle aggregation interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleInterval {
    Minute,
    Hour,
    Day,
    Week,
}

impl CandleInterval {
    /// Member names in declaration order, as surfaced to the LLM.
    pub const MEMBERS: [&'static str; 4] = ["Minute", "Hour", "Day", "Week"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "minute" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            _ => None,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Minute => Duration::minutes(1),
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
            Self::Week => Duration::weeks(1),
        }
    }
}

/// One OHLCV candle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandlePoint {
    #[serde(serialize_with = "serialize_instant")]
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Market data access errors.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("unknown trading pair '{0}'")]
    UnknownPair(String),
    #[error("provider error: {0}")]
    Provider(String),
}

/// Source of price data for trading pairs.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Candle history for `pair`, oldest first.
    async fn price_history(
        &self,
        pair: &str,
        interval: CandleInterval,
        limit: usize,
    ) -> Result<Vec<CandlePoint>, MarketError>;

    /// Latest trade price for `pair`.
    async fn latest_price(&self, pair: &str) -> Result<f64, MarketError>;
}

/// Deterministic in-memory provider for demos and tests. Prices follow a
/// fixed oscillation around a per-pair base so runs are reproducible.
pub struct SampleMarketData {
    base_prices: HashMap<String, f64>,
}

impl SampleMarketData {
    pub fn new() -> Self {
        let mut base_prices = HashMap::new();
        base_prices.insert("BTCUSDT".to_string(), 64_000.0);
        base_prices.insert("ETHUSDT".to_string(), 3_200.0);
        base_prices.insert("SOLUSDT".to_string(), 150.0);
        Self { base_prices }
    }

    pub fn with_pair(mut self, pair: impl Into<String>, base_price: f64) -> Self {
        self.base_prices.insert(pair.into(), base_price);
        self
    }

    fn base_price(&self, pair: &str) -> Result<f64, MarketError> {
        self.base_prices
            .get(&pair.trim().to_ascii_uppercase())
            .copied()
            .ok_or_else(|| MarketError::UnknownPair(pair.to_string()))
    }
}

impl Default for SampleMarketData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for SampleMarketData {
    async fn price_history(
        &self,
        pair: &str,
        interval: CandleInterval,
        limit: usize,
    ) -> Result<Vec<CandlePoint>, MarketError> {
        let base = self.base_price(pair)?;
        let limit = limit.max(1);
        let end = Utc::now();
        let mut candles = Vec::with_capacity(limit);
        let mut previous_close = base;
        for index in 0..limit {
            let offset = (limit - index) as i32;
            let open_time = end - interval.duration() * offset;
            let wave = (index as f64 * 0.7).sin();
            let close = base * (1.0 + 0.02 * wave);
            let open = previous_close;
            let high = open.max(close) * 1.005;
            let low = open.min(close) * 0.995;
            candles.push(CandlePoint {
                open_time,
                open,
                high,
                low,
                close,
                volume: 1_000.0 + 50.0 * index as f64,
            });
            previous_close = close;
        }
        Ok(candles)
    }

    async fn latest_price(&self, pair: &str) -> Result<f64, MarketError> {
        Ok(self.base_price(pair)? * 1.001)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_history_has_requested_length_and_order() {
        tokio_test::block_on(async {
            let provider = SampleMarketData::new();
            let candles = provider
                .price_history("BTCUSDT", CandleInterval::Day, 5)
                .await
                .unwrap();
            assert_eq!(candles.len(), 5);
            assert!(candles.windows(2).all(|w| w[0].open_time < w[1].open_time));
            assert!(candles.iter().all(|c| c.low <= c.high));
        });
    }

    #[test]
    fn test_unknown_pair_is_rejected() {
        tokio_test::block_on(async {
            let provider = SampleMarketData::new();
            let result = provider.latest_price("DOGEMOON").await;
            assert!(matches!(result, Err(MarketError::UnknownPair(_))));
        });
    }

    #[test]
    fn test_pair_lookup_ignores_case_and_whitespace() {
        tokio_test::block_on(async {
            let provider = SampleMarketData::new();
            assert!(provider.latest_price(" btcusdt ").await.is_ok());
        });
    }
}
