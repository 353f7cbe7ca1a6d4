// src/ingest/mod.rs
pub mod client;
pub mod rss;
pub mod types;
pub mod vk;

use std::collections::HashSet;

use metrics::{counter, describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

use crate::ingest::types::NewsItem;

/// One-time metrics registration (so series show up wherever a recorder is
/// installed).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_items_merged_total", "Items accepted into a pool.");
        describe_counter!(
            "digest_items_dedup_total",
            "Items dropped as duplicates of an already-seen link."
        );
        describe_counter!(
            "digest_items_stale_total",
            "Items dropped for being older than the recency window."
        );
        describe_counter!(
            "digest_source_errors_total",
            "Source fetch/parse failures (absorbed)."
        );
        describe_counter!("digest_requests_total", "News lookups served.");
        describe_counter!(
            "digest_general_fallback_total",
            "Lookups answered from the general pool instead of city matches."
        );
        describe_counter!("digest_empty_total", "Lookups where every tier came back empty.");
        describe_gauge!("digest_last_fetch_ts", "Unix ts of the last completed lookup.");
    });
}

/// Strip HTML tags and entities, collapse whitespace. Used before substring
/// matching so markup never hides or fakes a keyword hit.
pub fn strip_html(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Streaming merge of one source's items into the shared pool.
///
/// Order-preserving, first-seen-wins: a link already in `seen_links` is
/// dropped no matter what the newcomer looks like. Items older than
/// `cutoff_ts` are dropped too, but an item without a timestamp is kept —
/// slow regional feeds often omit dates, and absence of a date is not
/// evidence of staleness.
pub fn merge_items(
    pool: &mut Vec<NewsItem>,
    new_items: Vec<NewsItem>,
    seen_links: &mut HashSet<String>,
    cutoff_ts: i64,
) {
    for item in new_items {
        if !item.link.is_empty() && seen_links.contains(&item.link) {
            counter!("digest_items_dedup_total").increment(1);
            continue;
        }
        if let Some(ts) = item.published_at {
            if ts < cutoff_ts {
                counter!("digest_items_stale_total").increment(1);
                continue;
            }
        }
        if !item.link.is_empty() {
            seen_links.insert(item.link.clone());
        }
        counter!("digest_items_merged_total").increment(1);
        pool.push(item);
    }
}

/// Navigation stubs and service strings some sources emit as "items".
/// Markers come from the catalog so new junk can be added without a release.
pub fn is_junk_title(title: &str, markers: &[String]) -> bool {
    let t = title.trim();
    if t.is_empty() {
        return true;
    }
    let lowered = t.to_lowercase();
    markers
        .iter()
        .any(|m| !m.is_empty() && lowered.contains(&m.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, link: &str, ts: Option<i64>) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            link: link.to_string(),
            body: String::new(),
            published_at: ts,
        }
    }

    #[test]
    fn first_seen_link_wins() {
        let mut pool = Vec::new();
        let mut seen = HashSet::new();
        merge_items(
            &mut pool,
            vec![
                item("A", "http://x/1", Some(100)),
                item("A dup", "http://x/1", Some(100)),
            ],
            &mut seen,
            0,
        );
        merge_items(&mut pool, vec![item("B", "http://x/2", Some(100))], &mut seen, 0);
        let titles: Vec<_> = pool.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn merging_same_payload_twice_is_idempotent() {
        let payload = vec![
            item("A", "http://x/1", Some(100)),
            item("B", "http://x/2", Some(100)),
        ];
        let mut pool = Vec::new();
        let mut seen = HashSet::new();
        merge_items(&mut pool, payload.clone(), &mut seen, 0);
        let once = pool.clone();
        merge_items(&mut pool, payload, &mut seen, 0);
        assert_eq!(pool, once);
    }

    #[test]
    fn stale_items_are_dropped_but_undated_kept() {
        let mut pool = Vec::new();
        let mut seen = HashSet::new();
        merge_items(
            &mut pool,
            vec![
                item("old", "http://x/1", Some(50)),
                item("fresh", "http://x/2", Some(200)),
                item("undated", "http://x/3", None),
            ],
            &mut seen,
            100,
        );
        let titles: Vec<_> = pool.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["fresh", "undated"]);
        assert!(pool.iter().all(|i| i.published_at.unwrap_or(i64::MAX) >= 100));
    }

    #[test]
    fn empty_links_never_dedup_each_other() {
        let mut pool = Vec::new();
        let mut seen = HashSet::new();
        merge_items(
            &mut pool,
            vec![item("one", "", None), item("two", "", None)],
            &mut seen,
            0,
        );
        assert_eq!(pool.len(), 2);
        assert!(seen.is_empty());
    }

    #[test]
    fn junk_titles_by_marker_and_emptiness() {
        let markers = vec!["показать все источники".to_string()];
        assert!(is_junk_title("", &markers));
        assert!(is_junk_title("   ", &markers));
        assert!(is_junk_title("Показать все источники", &markers));
        assert!(is_junk_title("…и Показать ВСЕ источники тут", &markers));
        assert!(!is_junk_title("Обычный заголовок", &markers));
    }

    #[test]
    fn strip_html_removes_tags_and_entities() {
        assert_eq!(strip_html("<p>Город&nbsp;N</p>"), "Город N");
        assert_eq!(strip_html("a <b>b</b>\n c"), "a b c");
        assert_eq!(strip_html(""), "");
    }
}
