// src/aggregate.rs
//! The four-tier news lookup cascade.
//!
//! Tier A: the city's own regional feeds.
//! Tier B: guaranteed federal feeds with a widened recency window, tried
//!         only when Tier A produced an empty pool.
//! Tier C: the full general set (guaranteed endpoints first, then the long
//!         tail, chat bridges and VK walls).
//! Tier D: unconditional fallback — the head of the general pool without
//!         relevance filtering, labeled as not city-specific.
//!
//! Every source failure is absorbed where it happens; the only terminal
//! state is "every tier came back empty", which surfaces as an empty digest
//! for the caller to render as a try-later message.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use metrics::{counter, gauge};
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::catalog::{Catalog, City};
use crate::ingest::client::{build_feed_client, BridgeSource, RssSource};
use crate::ingest::types::{NewsItem, SourceProvider};
use crate::ingest::vk::VkWallSource;
use crate::ingest::{ensure_metrics_described, is_junk_title, merge_items};
use crate::relevance::filter_by_city;

/// Standard recency window. Regional feeds update slowly; a tight window
/// would starve the smaller cities.
pub const NEWS_DAYS_BACK: i64 = 14;
/// Widened window for the guaranteed-feeds retry in Tier B.
const FALLBACK_DAYS_BACK: i64 = 30;
/// The synchronous lookup path stops waiting on city tiers past this budget
/// and serves from whatever pool has accumulated.
pub const LOOKUP_BUDGET: Duration = Duration::from_secs(15);
/// Hard cap on a single lookup's pool.
const GENERAL_POOL_CAP: usize = 600;
/// Minimum size of the unconditional Tier D fallback.
const GENERAL_FALLBACK_MIN: usize = 8;

const CITY_FEED_ITEMS: usize = 30;
const GUARANTEED_FEED_ITEMS: usize = 40;
const GENERAL_FEED_ITEMS: usize = 120;
const BRIDGE_FEED_ITEMS: usize = 50;
const VK_WALL_POSTS: usize = 30;

/// What a lookup hands to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    /// `(title, link)` pairs, best first.
    pub items: Vec<(String, String)>,
    /// False when the items come from the general pool rather than a
    /// city-specific selection.
    pub locality_specific: bool,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Sources grouped by cascade tier. Built from the catalog in production,
/// from hand-rolled providers in tests.
pub struct TierSources {
    pub city: Vec<Box<dyn SourceProvider>>,
    pub guaranteed: Vec<Box<dyn SourceProvider>>,
    /// Full general set: guaranteed endpoints first, then everything else.
    pub general: Vec<Box<dyn SourceProvider>>,
}

#[derive(Default)]
struct Pool {
    items: Vec<NewsItem>,
    seen_links: HashSet<String>,
}

impl Pool {
    fn merge_batches(&mut self, batches: Vec<Vec<NewsItem>>, cutoff_ts: i64) {
        for batch in batches {
            if self.items.len() >= GENERAL_POOL_CAP {
                break;
            }
            merge_items(&mut self.items, batch, &mut self.seen_links, cutoff_ts);
        }
        self.items.truncate(GENERAL_POOL_CAP);
    }
}

/// Fetch every source of a tier concurrently. Batches come back in source
/// order, so the serial merge that follows keeps first-seen-wins
/// deterministic no matter which fetch finished first.
async fn fetch_tier(sources: &[Box<dyn SourceProvider>]) -> Vec<Vec<NewsItem>> {
    let fetches = sources.iter().map(|s| async move {
        match s.fetch_latest().await {
            Ok(items) => items,
            Err(e) => {
                counter!("digest_source_errors_total").increment(1);
                debug!(source = s.name(), error = ?e, "source yielded no data");
                Vec::new()
            }
        }
    });
    futures::future::join_all(fetches).await
}

fn cutoff(days_back: i64) -> i64 {
    Utc::now().timestamp() - days_back * 86_400
}

/// Relevance-filter the pool, then clean junk titles out of the result.
/// Filtering over-fetches so junk removal does not leave the digest short.
fn city_matches(
    pool: &[NewsItem],
    city: &City,
    limit: usize,
    junk: &[String],
) -> Vec<(String, String)> {
    let mut matches = filter_by_city(pool, city, limit * 2);
    matches.retain(|(title, _)| !is_junk_title(title, junk));
    matches.truncate(limit);
    matches
}

/// Tiers A–C. `Some` carries city matches; `None` means no city match
/// anywhere. Either way the pool keeps what was gathered, so the caller can
/// fall back to it.
async fn gather_city_tiers(
    sources: &TierSources,
    city: &City,
    limit: usize,
    junk: &[String],
    pool: &Mutex<Pool>,
) -> Option<Vec<(String, String)>> {
    // Tier A: the city's own feeds.
    let batches = fetch_tier(&sources.city).await;
    let pool_empty = {
        let mut p = pool.lock().await;
        p.merge_batches(batches, cutoff(NEWS_DAYS_BACK));
        let matches = city_matches(&p.items, city, limit, junk);
        if !matches.is_empty() {
            return Some(matches);
        }
        p.items.is_empty()
    };

    // Tier B: the regional feeds gave nothing at all — retry the guaranteed
    // set with a wider window before casting the big net.
    if pool_empty {
        let batches = fetch_tier(&sources.guaranteed).await;
        let mut p = pool.lock().await;
        p.merge_batches(batches, cutoff(FALLBACK_DAYS_BACK));
        let matches = city_matches(&p.items, city, limit, junk);
        if !matches.is_empty() {
            return Some(matches);
        }
    }

    // Tier C: the full general set.
    let batches = fetch_tier(&sources.general).await;
    let mut p = pool.lock().await;
    p.merge_batches(batches, cutoff(NEWS_DAYS_BACK));
    let matches = city_matches(&p.items, city, limit, junk);
    if !matches.is_empty() {
        return Some(matches);
    }
    None
}

/// Run the cascade against a prepared set of tier sources.
pub async fn run_cascade(
    sources: &TierSources,
    city: &City,
    limit: usize,
    junk: &[String],
    budget: Duration,
) -> Digest {
    ensure_metrics_described();
    counter!("digest_requests_total").increment(1);

    let pool = Mutex::new(Pool::default());
    let mut timed_out = false;
    match tokio::time::timeout(budget, gather_city_tiers(sources, city, limit, junk, &pool)).await
    {
        Ok(Some(items)) => {
            gauge!("digest_last_fetch_ts").set(Utc::now().timestamp() as f64);
            return Digest {
                items,
                locality_specific: true,
            };
        }
        Ok(None) => {}
        Err(_) => {
            timed_out = true;
            warn!(city = %city.slug, "news lookup budget exhausted, serving general fallback");
        }
    }

    // Tier D: no city match anywhere — serve the head of the general pool.
    counter!("digest_general_fallback_total").increment(1);
    let mut pool = pool.into_inner();
    if pool.items.is_empty() && timed_out {
        // The budget ran out before anything landed. One quick pass over the
        // guaranteed feeds so a slow lookup still answers with something.
        let batches = match tokio::time::timeout(budget, fetch_tier(&sources.guaranteed)).await {
            Ok(b) => b,
            Err(_) => Vec::new(),
        };
        pool.merge_batches(batches, cutoff(FALLBACK_DAYS_BACK));
    }
    let cap = limit.max(GENERAL_FALLBACK_MIN);
    let items: Vec<(String, String)> = pool
        .items
        .iter()
        .filter(|i| !is_junk_title(&i.title, junk))
        .take(cap)
        .map(|i| (i.title.clone(), i.link.clone()))
        .collect();
    if items.is_empty() {
        counter!("digest_empty_total").increment(1);
    }
    gauge!("digest_last_fetch_ts").set(Utc::now().timestamp() as f64);
    Digest {
        items,
        locality_specific: false,
    }
}

/// Catalog-driven front for the cascade: builds the tier sources for a city
/// and runs the lookup with the standard budget.
pub struct Aggregator {
    catalog: Arc<Catalog>,
    client: Client,
    vk_token: Option<String>,
}

impl Aggregator {
    pub fn new(catalog: Arc<Catalog>, vk_token: Option<String>) -> Result<Self> {
        Ok(Self {
            client: build_feed_client()?,
            catalog,
            vk_token: vk_token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn rss(&self, url: &str, max_items: usize) -> Box<dyn SourceProvider> {
        Box::new(RssSource::new(self.client.clone(), url, max_items))
    }

    fn tier_sources(&self, city: &City) -> TierSources {
        let city_sources = city
            .feeds
            .iter()
            .map(|u| self.rss(u, CITY_FEED_ITEMS))
            .collect();
        let guaranteed = self
            .catalog
            .guaranteed_feeds
            .iter()
            .map(|u| self.rss(u, GUARANTEED_FEED_ITEMS))
            .collect();

        // Guaranteed endpoints lead the general sweep; repeats are skipped so
        // a feed listed in both tables is fetched once.
        let mut seen_urls: HashSet<&str> = HashSet::new();
        let mut general: Vec<Box<dyn SourceProvider>> = Vec::new();
        for url in self
            .catalog
            .guaranteed_feeds
            .iter()
            .chain(self.catalog.general_feeds.iter())
        {
            if seen_urls.insert(url.as_str()) {
                general.push(self.rss(url, GENERAL_FEED_ITEMS));
            }
        }
        for url in &self.catalog.bridge_feeds {
            general.push(Box::new(BridgeSource::new(
                self.client.clone(),
                url,
                BRIDGE_FEED_ITEMS,
            )));
        }
        if let Some(token) = &self.vk_token {
            for gid in &self.catalog.vk_group_ids {
                general.push(Box::new(VkWallSource::new(
                    self.client.clone(),
                    *gid,
                    token.clone(),
                    VK_WALL_POSTS,
                )));
            }
        }

        TierSources {
            city: city_sources,
            guaranteed,
            general,
        }
    }

    /// City news lookup used by the consumer-facing surface.
    pub async fn city_digest(&self, city: &City, limit: usize) -> Digest {
        let sources = self.tier_sources(city);
        run_cascade(
            &sources,
            city,
            limit,
            &self.catalog.junk_title_markers,
            LOOKUP_BUDGET,
        )
        .await
    }
}
