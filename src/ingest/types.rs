// src/ingest/types.rs
use anyhow::Result;

/// One normalized unit of fetched content. Items are value objects: produced
/// by a parser, merged into a pool, never mutated afterwards.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    /// Identity key for dedup. May be empty (some walls/bridges omit links);
    /// empty links never participate in dedup.
    pub link: String,
    pub body: String,
    /// Unix seconds, UTC. `None` when the source gave no date or an
    /// unparsable one.
    pub published_at: Option<i64>,
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Fetch the newest items from this source. `Err` means "no data from
    /// this source right now" and is absorbed by the caller.
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>>;
    fn name(&self) -> &str;
}
