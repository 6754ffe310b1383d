//! # Marketflow Methods
//!
//! The domain method set workflows call: market data, news, and date
//! arithmetic, plus the `RecordOutput` side channel. Concrete exchange and
//! news backends live behind the provider traits; the in-memory samples
//! here exist for demos and tests.

pub mod market;
pub mod news;
pub mod time;
pub mod toolbox;

pub use market::{CandleInterval, CandlePoint, MarketDataProvider, MarketError, SampleMarketData};
pub use news::{NewsArticle, NewsKind, NewsProvider, SampleNews};
pub use time::{add_time, TimeUnit};
pub use toolbox::AnalysisToolbox;
