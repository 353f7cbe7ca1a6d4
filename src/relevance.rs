// src/relevance.rs
//! City relevance gate: case-insensitive containment of a city's alias terms
//! in an item's title or HTML-stripped body.
//!
//! This is deliberately a yes/no gate, not a ranked score — the pool arrives
//! already ordered by source reliability, and the first match found in that
//! order is the best one to show.

use crate::catalog::City;
use crate::ingest::strip_html;
use crate::ingest::types::NewsItem;

/// All terms that count as "this item is about the city": the display name
/// plus the catalog aliases (region, declensions, short forms).
pub fn city_keywords(city: &City) -> Vec<String> {
    let mut out = Vec::with_capacity(1 + city.aliases.len());
    out.push(city.name.clone());
    out.extend(city.aliases.iter().cloned());
    out.retain(|k| !k.trim().is_empty());
    out
}

/// Select up to `limit` items mentioning the city, preserving pool order.
/// Returns `(title, link)` pairs; stops scanning as soon as `limit` matches
/// are collected so a large pool does not cost more than it has to.
pub fn filter_by_city(pool: &[NewsItem], city: &City, limit: usize) -> Vec<(String, String)> {
    if limit == 0 {
        return Vec::new();
    }
    let keywords: Vec<String> = city_keywords(city)
        .iter()
        .map(|k| k.to_lowercase())
        .collect();

    let mut out = Vec::new();
    for item in pool {
        let title = item.title.to_lowercase();
        let matched = keywords.iter().any(|kw| title.contains(kw)) || {
            let body = strip_html(&item.body).to_lowercase();
            keywords.iter().any(|kw| body.contains(kw))
        };
        if matched {
            out.push((item.title.clone(), item.link.clone()));
            if out.len() >= limit {
                break;
            }
        }
    }
    out
}
