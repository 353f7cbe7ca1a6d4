// src/catalog.rs
//! Static reference data: the city table (names, aliases, coordinates,
//! timezone, regional feeds), the shared feed lists, junk-title markers, and
//! the enumerated timezone choices offered to subscribers.
//!
//! Loaded once at startup from TOML and read-only afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CATALOG_PATH: &str = "config/cities.toml";
pub const ENV_CATALOG_PATH: &str = "CITY_CATALOG_PATH";

/// A named place with everything relevance matching and forecast rendering
/// need to know about it.
#[derive(Debug, Clone, Deserialize)]
pub struct City {
    pub slug: String,
    /// Display name, also the primary relevance keyword.
    pub name: String,
    #[serde(default)]
    pub name_en: String,
    pub lat: f64,
    pub lon: f64,
    /// Region names, declensions and short forms used for relevance matching
    /// in addition to `name`.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// IANA zone of the city itself (used to bucket forecast hours).
    pub timezone: String,
    /// Regional feeds for this city, most reliable first.
    #[serde(default)]
    pub feeds: Vec<String>,
}

/// One entry of the fixed timezone menu shown on subscribe. Keeping the menu
/// enumerated means an unresolvable zone can never enter the store.
#[derive(Debug, Clone, Deserialize)]
pub struct TimezoneChoice {
    pub label: String,
    pub zone: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub cities: Vec<City>,
    /// High-reliability federal feeds; always worth querying.
    #[serde(default)]
    pub guaranteed_feeds: Vec<String>,
    /// The long tail of general feeds (guaranteed ones are queried first).
    #[serde(default)]
    pub general_feeds: Vec<String>,
    /// RSS bridges in front of chat channels.
    #[serde(default)]
    pub bridge_feeds: Vec<String>,
    /// VK news group ids (fetched only when an access token is configured).
    #[serde(default)]
    pub vk_group_ids: Vec<i64>,
    /// Substrings that mark an "item" as navigation/boilerplate, not news.
    #[serde(default)]
    pub junk_title_markers: Vec<String>,
    #[serde(default)]
    pub reminder_timezones: Vec<TimezoneChoice>,
}

impl Catalog {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing city catalog")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading city catalog from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using `$CITY_CATALOG_PATH`, falling back to `config/cities.toml`.
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(ENV_CATALOG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CATALOG_PATH));
        Self::load(&path)
    }

    pub fn city(&self, slug: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.slug == slug)
    }

    /// Whether a zone is on the subscribe menu. With no menu configured,
    /// anything `chrono-tz` can resolve is accepted.
    pub fn is_allowed_timezone(&self, zone: &str) -> bool {
        if self.reminder_timezones.is_empty() {
            return zone.parse::<chrono_tz::Tz>().is_ok();
        }
        self.reminder_timezones.iter().any(|c| c.zone == zone)
    }
}
