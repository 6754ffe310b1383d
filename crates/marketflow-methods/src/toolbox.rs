//! Wires providers and the output recorder into a method catalog.
//!
//! Every domain operation the workflow generator may call is registered
//! here with its full descriptors. Adapters are defensive: arguments the
//! marshalling layer could not produce arrive as nulls and turn into short
//! host errors or documented defaults, never panics.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tracing::debug;

use marketflow_catalog::marshal;
use marketflow_catalog::{AslType, HostError, Method, MethodCatalog, OutputRecorder, TypeDef};

use crate::market::{CandleInterval, MarketDataProvider};
use crate::news::{NewsKind, NewsProvider};
use crate::time::{add_time, TimeUnit};

const DEFAULT_HISTORY_LIMIT: usize = 30;
const MAX_HISTORY_LIMIT: usize = 500;
const DEFAULT_NEWS_LIMIT: usize = 10;
const MAX_NEWS_LIMIT: usize = 50;

/// The domain toolbox: providers plus the shared output recorder.
pub struct AnalysisToolbox {
    market: Arc<dyn MarketDataProvider>,
    news: Arc<dyn NewsProvider>,
    recorder: Arc<OutputRecorder>,
}

impl AnalysisToolbox {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        news: Arc<dyn NewsProvider>,
        recorder: Arc<OutputRecorder>,
    ) -> Self {
        Self {
            market,
            news,
            recorder,
        }
    }

    pub fn recorder(&self) -> Arc<OutputRecorder> {
        self.recorder.clone()
    }

    /// Build the immutable catalog over this toolbox.
    pub fn build_catalog(&self) -> MethodCatalog {
        let builder = MethodCatalog::builder()
            .enumeration("TimeUnit", TimeUnit::MEMBERS)
            .enumeration("CandleInterval", CandleInterval::MEMBERS)
            .enumeration("NewsKind", NewsKind::MEMBERS)
            .composite(
                "CandlePoint",
                TypeDef::new()
                    .describe("One OHLCV candle")
                    .property_described("openTime", AslType::timestamp(), "Candle open time")
                    .property("open", AslType::number())
                    .property("high", AslType::number())
                    .property("low", AslType::number())
                    .property("close", AslType::number())
                    .property_described("volume", AslType::number(), "Base asset volume"),
            )
            .composite(
                "NewsArticle",
                TypeDef::new()
                    .describe("A market news item with community votes")
                    .property("title", AslType::string())
                    .property("source", AslType::string())
                    .property("publishedAt", AslType::timestamp())
                    .property("positiveVotes", AslType::number())
                    .property("negativeVotes", AslType::number())
                    .property("kind", AslType::enumeration("NewsKind")),
            );

        let market = self.market.clone();
        let builder = builder.method(
            Method::new("GetPriceHistory")
                .describe("Candle history for a trading pair, oldest first")
                .param_described("pair", AslType::string(), "Trading pair symbol, e.g. BTCUSDT")
                .param_described(
                    "interval",
                    AslType::enumeration("CandleInterval"),
                    "Candle aggregation interval",
                )
                .param_described("limit", AslType::number(), "Maximum number of candles")
                .returns(AslType::array(AslType::object("CandlePoint")))
                .handler(move |args| {
                    let market = market.clone();
                    async move {
                        let pair = required_text(&args, 0, "pair")?;
                        let interval = marshal::arg(&args, 1)
                            .as_str()
                            .and_then(CandleInterval::from_name)
                            .unwrap_or(CandleInterval::Day);
                        let limit = bounded_limit(&args, 2, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
                        let candles = market
                            .price_history(&pair, interval, limit)
                            .await
                            .map_err(|error| HostError::new(error.to_string()))?;
                        to_json(candles)
                    }
                }),
        );

        let market = self.market.clone();
        let builder = builder.method(
            Method::new("GetLatestPrice")
                .describe("Latest trade price for a trading pair")
                .param_described("pair", AslType::string(), "Trading pair symbol, e.g. BTCUSDT")
                .returns(AslType::number())
                .handler(move |args| {
                    let market = market.clone();
                    async move {
                        let pair = required_text(&args, 0, "pair")?;
                        let price = market
                            .latest_price(&pair)
                            .await
                            .map_err(|error| HostError::new(error.to_string()))?;
                        to_json(price)
                    }
                }),
        );

        let news = self.news.clone();
        let builder = builder.method(
            Method::new("GetNews")
                .describe("Recent news for a currency, newest first")
                .param_described("currency", AslType::string(), "Currency code, e.g. BTC")
                .param_described("limit", AslType::number(), "Maximum number of articles")
                .returns(AslType::array(AslType::object("NewsArticle")))
                .handler(move |args| {
                    let news = news.clone();
                    async move {
                        let currency = required_text(&args, 0, "currency")?;
                        let limit = bounded_limit(&args, 1, DEFAULT_NEWS_LIMIT, MAX_NEWS_LIMIT);
                        let articles: Vec<_> = news
                            .recent_news(&currency, limit)
                            .await
                            .take(limit)
                            .collect()
                            .await;
                        debug!(currency = %currency, count = articles.len(), "news drained");
                        to_json(articles)
                    }
                }),
        );

        let builder = builder.method(
            Method::new("AddTime")
                .describe("Shifts a timestamp by a signed number of time units")
                .param_described("date", AslType::timestamp(), "The base timestamp")
                .param_described("value", AslType::number(), "Signed amount of units to add")
                .param_described("timeUnit", AslType::enumeration("TimeUnit"), "Unit of the amount")
                .returns(AslType::timestamp())
                .handler(|args| async move {
                    let date = marshal::parse_timestamp(marshal::arg(&args, 0))
                        .ok_or_else(|| HostError::new("date is required"))?;
                    let value = marshal::as_number(marshal::arg(&args, 1))
                        .ok_or_else(|| HostError::new("value is required"))?;
                    let unit = marshal::arg(&args, 2)
                        .as_str()
                        .and_then(TimeUnit::from_name)
                        .ok_or_else(|| HostError::new("timeUnit is required"))?;
                    Ok(Value::String(marshal::render_timestamp(&add_time(
                        date, value, unit,
                    ))))
                }),
        );

        let builder = builder.method(
            Method::new("CurrentTime")
                .describe("The current UTC time")
                .returns(AslType::timestamp())
                .handler(|_args| async move {
                    Ok(Value::String(marshal::render_timestamp(&chrono::Utc::now())))
                }),
        );

        let recorder = self.recorder.clone();
        builder
            .method(
                Method::new("RecordOutput")
                    .describe(
                        "Saves a value under a category so it reaches the final answer. \
                         Call this for every piece of data the answer should mention.",
                    )
                    .param_described("category", AslType::string(), "Short label for the value")
                    .param_described(
                        "content",
                        AslType::object("Value").or_null(),
                        "Any collected value",
                    )
                    .returns(AslType::null())
                    .handler(move |args| {
                        let recorder = recorder.clone();
                        async move {
                            let category = marshal::arg(&args, 0)
                                .as_str()
                                .unwrap_or("Output")
                                .to_string();
                            let content = marshal::arg(&args, 1).clone();
                            recorder.record(category, content);
                            Ok(Value::Null)
                        }
                    }),
            )
            .build()
    }
}

fn required_text(args: &[Value], index: usize, name: &str) -> Result<String, HostError> {
    marshal::arg(args, index)
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| HostError::new(format!("{name} is required")))
}

fn bounded_limit(args: &[Value], index: usize, default: usize, max: usize) -> usize {
    marshal::as_number(marshal::arg(args, index))
        .map(|n| n as usize)
        .filter(|n| *n > 0)
        .unwrap_or(default)
        .min(max)
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, HostError> {
    serde_json::to_value(value).map_err(|error| HostError::new(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::SampleMarketData;
    use crate::news::SampleNews;
    use serde_json::json;

    fn toolbox() -> AnalysisToolbox {
        AnalysisToolbox::new(
            Arc::new(SampleMarketData::new()),
            Arc::new(SampleNews),
            Arc::new(OutputRecorder::new()),
        )
    }

    #[test]
    fn test_scalar_return_round_trips_through_json() {
        tokio_test::block_on(async {
            let catalog = toolbox().build_catalog();
            let price = catalog
                .invoke("GetLatestPrice", vec![json!("BTCUSDT")])
                .await
                .unwrap();
            assert!(price.as_f64().unwrap() > 0.0);
        });
    }

    #[test]
    fn test_sequence_of_composites_round_trips_with_wire_field_names() {
        tokio_test::block_on(async {
            let catalog = toolbox().build_catalog();
            let candles = catalog
                .invoke(
                    "GetPriceHistory",
                    vec![json!("BTCUSDT"), json!("day"), json!(3)],
                )
                .await
                .unwrap();
            let rows = candles.as_array().expect("sequence return");
            assert_eq!(rows.len(), 3);
            let first = &rows[0];
            assert!(first["openTime"].as_str().unwrap().ends_with('Z'));
            for field in ["open", "high", "low", "close", "volume"] {
                assert!(first[field].is_number(), "missing field {field}");
            }
        });
    }

    #[test]
    fn test_async_news_stream_is_drained_to_a_sequence() {
        tokio_test::block_on(async {
            let catalog = toolbox().build_catalog();
            let articles = catalog
                .invoke("GetNews", vec![json!("BTC"), json!(2)])
                .await
                .unwrap();
            let rows = articles.as_array().expect("sequence return");
            assert_eq!(rows.len(), 2);
            assert!(rows[0]["title"].as_str().unwrap().contains("BTC"));
            assert!(NewsKind::from_name(rows[0]["kind"].as_str().unwrap()).is_some());
        });
    }

    #[test]
    fn test_add_time_shifts_and_renders_wire_timestamps() {
        tokio_test::block_on(async {
            let catalog = toolbox().build_catalog();
            let shifted = catalog
                .invoke(
                    "AddTime",
                    vec![json!("2024-01-01T00:00:00Z"), json!(1), json!("Days")],
                )
                .await
                .unwrap();
            assert_eq!(shifted, json!("2024-01-02T00:00:00Z"));
        });
    }

    #[test]
    fn test_add_time_with_unparseable_date_is_a_defensive_error() {
        tokio_test::block_on(async {
            let catalog = toolbox().build_catalog();
            let result = catalog
                .invoke(
                    "AddTime",
                    vec![json!("not a date"), json!(1), json!("Days")],
                )
                .await;
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_record_output_appends_to_the_shared_recorder() {
        tokio_test::block_on(async {
            let toolbox = toolbox();
            let recorder = toolbox.recorder();
            let catalog = toolbox.build_catalog();
            catalog
                .invoke(
                    "RecordOutput",
                    vec![json!("Latest price"), json!({"pair": "BTCUSDT", "price": 64000})],
                )
                .await
                .unwrap();
            let entries = recorder.snapshot();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].category, "Latest price");
            assert_eq!(entries[0].content["pair"], json!("BTCUSDT"));
        });
    }

    #[test]
    fn test_current_time_returns_a_wire_timestamp() {
        tokio_test::block_on(async {
            let catalog = toolbox().build_catalog();
            let now = catalog.invoke("CurrentTime", vec![]).await.unwrap();
            assert!(marshal::parse_timestamp(&now).is_some());
        });
    }

    #[test]
    fn test_toolbox_metadata_is_idempotent_and_complete() {
        let toolbox = toolbox();
        let catalog = toolbox.build_catalog();
        let metadata = catalog.metadata();
        assert_eq!(metadata, toolbox.build_catalog().metadata());

        for method in [
            "AddTime",
            "CurrentTime",
            "GetLatestPrice",
            "GetNews",
            "GetPriceHistory",
            "RecordOutput",
        ] {
            assert!(
                metadata["Methods"].get(method).is_some(),
                "missing method {method}"
            );
        }
        assert_eq!(
            metadata["Methods"]["AddTime"]["Parameters"]["date"]["Format"],
            json!("yyyy-MM-ddTHH:mm:ssZ")
        );
        assert_eq!(
            metadata["Methods"]["GetPriceHistory"]["Return"],
            json!("array of object as CandlePoint")
        );
        assert_eq!(
            metadata["Enums"]["TimeUnit"],
            json!(["Seconds", "Minutes", "Hours", "Days", "Weeks"])
        );
        assert!(metadata["Types"]["CandlePoint"]["Properties"]["openTime"].is_object());
    }
}
