// src/subscriptions.rs
//! Durable daily-digest subscriptions.
//!
//! One record per `(chat, city)` pair; putting a record for an existing pair
//! replaces it. The whole collection lives in one JSON file rewritten
//! atomically on every mutation — subscriber counts are small and a crash
//! loses at most the in-flight mutation.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

pub const DEFAULT_TIME_OF_DAY: &str = "08:00";
pub const DEFAULT_TIMEZONE: &str = "Europe/Moscow";

/// A subscriber's standing order: one digest per civil day for one city, at
/// `time_of_day` on the wall clock of `timezone`.
///
/// The serialized field names are the on-disk contract and must stay stable
/// across releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "subscriberId", default)]
    pub subscriber_id: i64,
    #[serde(rename = "chatId")]
    pub chat_id: i64,
    #[serde(rename = "localityId")]
    pub city_slug: String,
    #[serde(rename = "timeOfDay", default = "default_time_of_day")]
    pub time_of_day: String,
    #[serde(rename = "timezoneId", default = "default_timezone")]
    pub timezone: String,
}

fn default_time_of_day() -> String {
    DEFAULT_TIME_OF_DAY.to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    subscriptions: Vec<serde_json::Value>,
}

/// Normalize user-entered delivery time to `HH:MM`.
///
/// Lenient on purpose: `9:0` becomes `09:00`, out-of-range parts are clamped,
/// and anything unparsable falls back to the default instead of being
/// rejected.
pub fn normalize_time_of_day(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return DEFAULT_TIME_OF_DAY.to_string();
    }
    let mut parts = raw.split(':');
    let h: i64 = match parts.next().map(str::trim).and_then(|p| p.parse().ok()) {
        Some(h) => h,
        None => return DEFAULT_TIME_OF_DAY.to_string(),
    };
    let m: i64 = match parts.next() {
        Some(p) => match p.trim().parse() {
            Ok(m) => m,
            Err(_) => return DEFAULT_TIME_OF_DAY.to_string(),
        },
        None => 0,
    };
    let h = h.clamp(0, 23);
    let m = m.clamp(0, 59);
    format!("{h:02}:{m:02}")
}

/// JSON-file-backed store. All mutations are read-modify-write over the full
/// collection, serialized behind one lock.
pub struct SubscriptionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SubscriptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Create or replace the record for `(chat_id, city_slug)`.
    pub async fn put(&self, sub: Subscription) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut subs = self.load_lenient();
        subs.retain(|s| !(s.chat_id == sub.chat_id && s.city_slug == sub.city_slug));
        let mut sub = sub;
        sub.time_of_day = normalize_time_of_day(&sub.time_of_day);
        subs.push(sub);
        self.persist(&subs)
    }

    /// Remove the record for `(chat_id, city_slug)`. Returns whether a
    /// record existed.
    pub async fn remove(&self, chat_id: i64, city_slug: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut subs = self.load_lenient();
        let before = subs.len();
        subs.retain(|s| !(s.chat_id == chat_id && s.city_slug == city_slug));
        if subs.len() == before {
            return Ok(false);
        }
        self.persist(&subs)?;
        Ok(true)
    }

    pub async fn list_for_subscriber(&self, subscriber_id: i64) -> Vec<Subscription> {
        let _guard = self.lock.lock().await;
        self.load_lenient()
            .into_iter()
            .filter(|s| s.subscriber_id == subscriber_id)
            .collect()
    }

    pub async fn list_all(&self) -> Vec<Subscription> {
        let _guard = self.lock.lock().await;
        self.load_lenient()
    }

    /// `(chat_id, city_slug)` pairs whose subscriber's local wall clock reads
    /// exactly the stored delivery minute at `now`.
    ///
    /// A zone that fails to resolve skips only its own subscription; the
    /// remaining records are still evaluated.
    pub async fn due_at(&self, now: DateTime<Utc>) -> Vec<(i64, String)> {
        let subs = self.list_all().await;
        let mut due = Vec::new();
        for s in subs {
            let tz: Tz = match s.timezone.parse() {
                Ok(tz) => tz,
                Err(_) => {
                    warn!(
                        chat_id = s.chat_id,
                        city = %s.city_slug,
                        zone = %s.timezone,
                        "unresolvable timezone, skipping subscription this tick"
                    );
                    continue;
                }
            };
            let local_hhmm = now.with_timezone(&tz).format("%H:%M").to_string();
            if local_hhmm == normalize_time_of_day(&s.time_of_day) {
                due.push((s.chat_id, s.city_slug));
            }
        }
        due
    }

    /// Lenient load: a missing file is an empty store, an unreadable file is
    /// an empty store with a warning, and a malformed record is skipped
    /// without poisoning its neighbours.
    fn load_lenient(&self) -> Vec<Subscription> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = ?e, "reading subscription store");
                return Vec::new();
            }
        };
        let file: StoreFile = match serde_json::from_str(&content) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %self.path.display(), error = ?e, "subscription store unreadable");
                return Vec::new();
            }
        };
        let mut subs: Vec<Subscription> = Vec::with_capacity(file.subscriptions.len());
        for value in file.subscriptions {
            match serde_json::from_value::<Subscription>(value) {
                Ok(mut s) => {
                    s.time_of_day = normalize_time_of_day(&s.time_of_day);
                    // Later records win if a stale file carries duplicates.
                    subs.retain(|o| !(o.chat_id == s.chat_id && o.city_slug == s.city_slug));
                    subs.push(s);
                }
                Err(e) => warn!(error = ?e, "skipping malformed subscription record"),
            }
        }
        subs
    }

    /// Serialize the whole set to a temp file, then rename over the old one,
    /// so readers observe either the prior set or the full new one.
    fn persist(&self, subs: &[Subscription]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let values: Vec<serde_json::Value> = subs
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<_, _>>()
            .context("serializing subscriptions")?;
        let file = StoreFile {
            subscriptions: values,
        };
        let json = serde_json::to_string_pretty(&file).context("serializing subscription store")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}
