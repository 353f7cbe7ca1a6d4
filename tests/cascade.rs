// tests/cascade.rs
//! The four-tier lookup under simulated source conditions: healthy regional
//! feeds, dead regional feeds, matches arriving only from the general sweep,
//! and the everything-is-down case.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use city_news_digest::catalog::City;
use city_news_digest::ingest::types::{NewsItem, SourceProvider};
use city_news_digest::{run_cascade, TierSources};

struct StaticSource {
    label: &'static str,
    items: Vec<NewsItem>,
}

#[async_trait]
impl SourceProvider for StaticSource {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        Ok(self.items.clone())
    }

    fn name(&self) -> &str {
        self.label
    }
}

/// A source that never answers, standing in for a timed-out endpoint.
struct FailingSource;

#[async_trait]
impl SourceProvider for FailingSource {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        Err(anyhow!("simulated timeout"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

struct SlowSource {
    delay: Duration,
}

#[async_trait]
impl SourceProvider for SlowSource {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![item("Казань: слишком поздно", "http://slow/1", None)])
    }

    fn name(&self) -> &str {
        "slow"
    }
}

fn item(title: &str, link: &str, ts: Option<i64>) -> NewsItem {
    NewsItem {
        title: title.to_string(),
        link: link.to_string(),
        body: String::new(),
        published_at: ts,
    }
}

fn kazan() -> City {
    City {
        slug: "kazan".into(),
        name: "Казань".into(),
        name_en: "Kazan".into(),
        lat: 55.8304,
        lon: 49.0661,
        aliases: vec!["в Казани".into(), "Казани".into(), "Татарстан".into()],
        timezone: "Europe/Moscow".into(),
        feeds: vec![],
    }
}

fn boxed(s: impl SourceProvider + 'static) -> Box<dyn SourceProvider> {
    Box::new(s)
}

const BUDGET: Duration = Duration::from_secs(5);
const JUNK: &[String] = &[];

#[tokio::test]
async fn regional_feeds_answer_the_lookup() {
    let sources = TierSources {
        city: vec![boxed(StaticSource {
            label: "kazan-feed",
            items: vec![
                item("В Казани открыли новый мост", "http://kzn/1", None),
                item("Курс доллара вырос", "http://kzn/2", None),
            ],
        })],
        guaranteed: vec![boxed(FailingSource)],
        general: vec![boxed(FailingSource)],
    };
    let digest = run_cascade(&sources, &kazan(), 5, JUNK, BUDGET).await;
    assert!(digest.locality_specific);
    assert_eq!(digest.items.len(), 1);
    assert_eq!(digest.items[0].1, "http://kzn/1");
}

#[tokio::test]
async fn empty_regional_pool_retries_guaranteed_with_wider_window() {
    // 20 days old: inside the widened fallback window, outside the standard
    // one. Only the wide-window retry can surface it.
    let twenty_days_ago = Utc::now().timestamp() - 20 * 86_400;
    let sources = TierSources {
        city: vec![boxed(FailingSource)],
        guaranteed: vec![boxed(StaticSource {
            label: "federal",
            items: vec![item(
                "Репортаж из Казани",
                "http://fed/1",
                Some(twenty_days_ago),
            )],
        })],
        general: vec![boxed(FailingSource)],
    };
    let digest = run_cascade(&sources, &kazan(), 5, JUNK, BUDGET).await;
    assert!(digest.locality_specific);
    assert_eq!(digest.items[0].1, "http://fed/1");
}

#[tokio::test]
async fn general_sweep_finds_the_city_when_regional_pool_misses() {
    let sources = TierSources {
        city: vec![boxed(StaticSource {
            label: "kazan-feed",
            items: vec![item("Ничего местного", "http://kzn/1", None)],
        })],
        guaranteed: vec![boxed(FailingSource)],
        general: vec![
            boxed(FailingSource),
            boxed(StaticSource {
                label: "tail",
                items: vec![item("Форум прошёл в Казани", "http://tail/1", None)],
            }),
        ],
    };
    let digest = run_cascade(&sources, &kazan(), 5, JUNK, BUDGET).await;
    assert!(digest.locality_specific);
    assert_eq!(digest.items, vec![("Форум прошёл в Казани".to_string(), "http://tail/1".to_string())]);
}

#[tokio::test]
async fn dead_city_sources_still_get_a_general_answer() {
    let general_items: Vec<NewsItem> = (0..12)
        .map(|i| item(&format!("Общая новость {i}"), &format!("http://gen/{i}"), None))
        .collect();
    let sources = TierSources {
        city: vec![boxed(FailingSource), boxed(FailingSource)],
        guaranteed: vec![boxed(FailingSource)],
        general: vec![boxed(StaticSource {
            label: "general",
            items: general_items,
        })],
    };
    // limit 3, but the unconditional fallback serves at least 8.
    let digest = run_cascade(&sources, &kazan(), 3, JUNK, BUDGET).await;
    assert!(!digest.locality_specific);
    assert_eq!(digest.items.len(), 8);
}

#[tokio::test]
async fn junk_titles_never_reach_the_fallback_digest() {
    let junk = vec!["показать все источники".to_string()];
    let sources = TierSources {
        city: vec![boxed(FailingSource)],
        guaranteed: vec![boxed(FailingSource)],
        general: vec![boxed(StaticSource {
            label: "general",
            items: vec![
                item("Показать все источники", "http://gen/0", None),
                item("Новость дня", "http://gen/1", None),
            ],
        })],
    };
    let digest = run_cascade(&sources, &kazan(), 5, &junk, BUDGET).await;
    assert!(!digest.locality_specific);
    assert_eq!(digest.items.len(), 1);
    assert_eq!(digest.items[0].1, "http://gen/1");
}

#[tokio::test]
async fn every_tier_down_yields_an_empty_digest() {
    let sources = TierSources {
        city: vec![boxed(FailingSource)],
        guaranteed: vec![boxed(FailingSource)],
        general: vec![boxed(FailingSource)],
    };
    let digest = run_cascade(&sources, &kazan(), 5, JUNK, BUDGET).await;
    assert!(digest.is_empty());
    assert!(!digest.locality_specific);
}

#[tokio::test]
async fn one_item_anywhere_means_a_non_empty_digest() {
    let sources = TierSources {
        city: vec![boxed(FailingSource)],
        guaranteed: vec![boxed(FailingSource)],
        general: vec![boxed(StaticSource {
            label: "lone",
            items: vec![item("Единственная новость", "http://lone/1", None)],
        })],
    };
    let digest = run_cascade(&sources, &kazan(), 5, JUNK, BUDGET).await;
    assert!(!digest.is_empty());
}

#[tokio::test]
async fn exhausted_budget_falls_back_instead_of_hanging() {
    let sources = TierSources {
        city: vec![boxed(SlowSource {
            delay: Duration::from_secs(60),
        })],
        guaranteed: vec![boxed(StaticSource {
            label: "federal",
            items: vec![item("Сводка федеральных новостей", "http://fed/1", None)],
        })],
        general: vec![],
    };
    let started = std::time::Instant::now();
    let digest = run_cascade(&sources, &kazan(), 5, JUNK, Duration::from_millis(200)).await;
    assert!(started.elapsed() < Duration::from_secs(30));
    assert!(!digest.locality_specific);
    assert_eq!(digest.items[0].1, "http://fed/1");
}
