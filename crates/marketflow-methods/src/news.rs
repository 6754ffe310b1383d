//! News provider seam with async-stream draining semantics.
//!
//! Providers hand back a stream of articles; the catalog adapter drains it
//! fully into a sequence before marshalling. An unbounded stream therefore
//! never completes; providers must bound what they emit.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, BoxStream};
use serde::Serialize;

use crate::time::serialize_instant;

/// Editorial classification of a news item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NewsKind {
    News,
    Media,
    Analysis,
}

impl NewsKind {
    /// Member names in declaration order, as surfaced to the LLM.
    pub const MEMBERS: [&'static str; 3] = ["News", "Media", "Analysis"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "news" => Some(Self::News),
            "media" => Some(Self::Media),
            "analysis" => Some(Self::Analysis),
            _ => None,
        }
    }
}

/// A single news article with community vote counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub title: String,
    pub source: String,
    #[serde(serialize_with = "serialize_instant")]
    pub published_at: DateTime<Utc>,
    pub positive_votes: u32,
    pub negative_votes: u32,
    pub kind: NewsKind,
}

/// Source of recent market news for a currency.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Stream recent articles, newest first, at most `limit` of them.
    async fn recent_news(&self, currency: &str, limit: usize) -> BoxStream<'static, NewsArticle>;
}

/// Fabricated articles for demos and tests.
pub struct SampleNews;

#[async_trait]
impl NewsProvider for SampleNews {
    async fn recent_news(&self, currency: &str, limit: usize) -> BoxStream<'static, NewsArticle> {
        let currency = currency.trim().to_ascii_uppercase();
        let now = Utc::now();
        let headlines = [
            (
                format!("{currency} spot volumes climb as volatility returns"),
                "Chain Register",
                NewsKind::News,
                41,
                3,
            ),
            (
                format!("Analysts split on near-term {currency} direction"),
                "Ledger Week",
                NewsKind::Analysis,
                17,
                9,
            ),
            (
                format!("Podcast: what the {currency} derivatives market is pricing in"),
                "Block Signal",
                NewsKind::Media,
                8,
                1,
            ),
        ];
        let articles: Vec<NewsArticle> = headlines
            .into_iter()
            .enumerate()
            .take(limit)
            .map(|(index, (title, source, kind, up, down))| NewsArticle {
                title,
                source: source.to_string(),
                published_at: now - Duration::hours(3 * index as i64),
                positive_votes: up,
                negative_votes: down,
                kind,
            })
            .collect();
        Box::pin(stream::iter(articles))
    }
}
