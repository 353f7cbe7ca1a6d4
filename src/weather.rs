// src/weather.rs
//! Weather collaborator: current conditions and a four-part daily outline
//! (night/morning/day/evening) per city, backed by the WeatherAPI.com
//! forecast endpoint. Any upstream problem turns into `None`; callers render
//! a try-later message instead of an error.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::catalog::City;

const WEATHERAPI_BASE_URL: &str = "https://api.weatherapi.com/v1";
const WEATHER_TIMEOUT_SECS: u64 = 15;
pub const ENV_WEATHERAPI_KEY: &str = "WEATHERAPI_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub code: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CurrentConditions {
    pub temp_c: f64,
    pub condition: Condition,
}

#[derive(Debug, Clone)]
pub struct OutlinePart {
    pub temp_c: f64,
    pub text: String,
}

/// Four slices of the coming day on the city's own clock. Parts the upstream
/// forecast did not cover stay `None`.
#[derive(Debug, Clone, Default)]
pub struct DailyOutline {
    pub night: Option<OutlinePart>,
    pub morning: Option<OutlinePart>,
    pub day: Option<OutlinePart>,
    pub evening: Option<OutlinePart>,
}

impl DailyOutline {
    pub fn is_empty(&self) -> bool {
        self.night.is_none()
            && self.morning.is_none()
            && self.day.is_none()
            && self.evening.is_none()
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, city: &City) -> Option<CurrentConditions>;
    async fn daily_outline(&self, city: &City) -> Option<DailyOutline>;
}

/* ----------------------------
WeatherAPI.com wire format
---------------------------- */

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    current: Option<ApiCurrent>,
    #[serde(default)]
    forecast: Option<ApiForecast>,
}

#[derive(Debug, Deserialize)]
struct ApiCurrent {
    temp_c: f64,
    #[serde(default)]
    condition: Condition,
}

#[derive(Debug, Deserialize)]
struct ApiForecast {
    #[serde(default)]
    forecastday: Vec<ApiForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ApiForecastDay {
    #[allow(dead_code)] // wire shape; hour slots carry their own date
    #[serde(default)]
    date: String,
    #[serde(default)]
    hour: Vec<ApiHour>,
}

#[derive(Debug, Deserialize)]
struct ApiHour {
    /// `"2025-06-02 09:00"` in the queried location's local time.
    #[serde(default)]
    time: String,
    temp_c: f64,
    #[serde(default)]
    condition: Condition,
}

/// Representative hour for each part of the day, city-local.
const OUTLINE_HOURS: [(u8, OutlineSlot); 4] = [
    (3, OutlineSlot::Night),
    (9, OutlineSlot::Morning),
    (15, OutlineSlot::Day),
    (21, OutlineSlot::Evening),
];

#[derive(Clone, Copy)]
enum OutlineSlot {
    Night,
    Morning,
    Day,
    Evening,
}

fn outline_from_days(days: &[ApiForecastDay], today: &str) -> DailyOutline {
    let mut outline = DailyOutline::default();
    for (hour, slot) in OUTLINE_HOURS {
        let exact = format!("{today} {hour:02}:00");
        let suffix = format!(" {hour:02}:00");
        let found = days
            .iter()
            .flat_map(|d| d.hour.iter())
            .find(|h| h.time == exact)
            .or_else(|| {
                days.iter()
                    .flat_map(|d| d.hour.iter())
                    .find(|h| h.time.ends_with(&suffix))
            });
        let part = found.map(|h| OutlinePart {
            temp_c: h.temp_c,
            text: h.condition.text.to_lowercase(),
        });
        match slot {
            OutlineSlot::Night => outline.night = part,
            OutlineSlot::Morning => outline.morning = part,
            OutlineSlot::Day => outline.day = part,
            OutlineSlot::Evening => outline.evening = part,
        }
    }
    outline
}

/// Emoji for a condition description (the API returns localized text, so
/// matching is substring-based).
pub fn condition_emoji(text: &str) -> &'static str {
    let t = text.to_lowercase();
    if t.contains("гроза") {
        "⛈️"
    } else if t.contains("снег") || t.contains("метель") {
        "❄️"
    } else if t.contains("дожд") || t.contains("ливень") || t.contains("морось") {
        "🌧️"
    } else if t.contains("туман") || t.contains("дымка") {
        "🌫️"
    } else if t.contains("пасмурн") {
        "☁️"
    } else if t.contains("облачн") {
        "⛅"
    } else if t.contains("ясно") || t.contains("солнеч") {
        "☀️"
    } else {
        "🌤️"
    }
}

pub struct WeatherApi {
    key: String,
    base_url: String,
    client: Client,
}

impl WeatherApi {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(WEATHER_TIMEOUT_SECS))
            .build()
            .context("building weather http client")?;
        Ok(Self {
            key: key.into(),
            base_url: WEATHERAPI_BASE_URL.to_string(),
            client,
        })
    }

    /// `Ok(None)` when no key is configured — the digest then renders its
    /// try-later text instead of calling out.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(ENV_WEATHERAPI_KEY) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(Self::new(key.trim().to_string())?)),
            _ => Ok(None),
        }
    }

    async fn forecast(&self, city: &City) -> Result<ForecastResponse> {
        let q = format!("{},{}", city.lat, city.lon);
        let resp = self
            .client
            .get(format!("{}/forecast.json", self.base_url))
            .query(&[
                ("key", self.key.as_str()),
                ("q", q.as_str()),
                ("days", "2"),
                ("lang", "ru"),
                ("aqi", "no"),
                ("alerts", "no"),
            ])
            .send()
            .await
            .with_context(|| format!("fetching forecast for {}", city.slug))?;
        if resp.status() != reqwest::StatusCode::OK {
            bail!("weather api answered {} for {}", resp.status(), city.slug);
        }
        resp.json()
            .await
            .with_context(|| format!("decoding forecast for {}", city.slug))
    }
}

#[async_trait]
impl WeatherProvider for WeatherApi {
    async fn current(&self, city: &City) -> Option<CurrentConditions> {
        match self.forecast(city).await {
            Ok(resp) => resp.current.map(|c| CurrentConditions {
                temp_c: c.temp_c,
                condition: c.condition,
            }),
            Err(e) => {
                debug!(city = %city.slug, error = ?e, "current conditions unavailable");
                None
            }
        }
    }

    async fn daily_outline(&self, city: &City) -> Option<DailyOutline> {
        let resp = match self.forecast(city).await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(city = %city.slug, error = ?e, "daily outline unavailable");
                return None;
            }
        };
        let days = resp.forecast.map(|f| f.forecastday).unwrap_or_default();
        if days.is_empty() {
            return None;
        }
        let tz: Tz = city.timezone.parse().unwrap_or(chrono_tz::Europe::Moscow);
        let today = chrono::Utc::now()
            .with_timezone(&tz)
            .format("%Y-%m-%d")
            .to_string();
        let outline = outline_from_days(&days, &today);
        if outline.is_empty() {
            None
        } else {
            Some(outline)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_picks_city_local_buckets() {
        let raw = r#"{
          "forecast": {"forecastday": [
            {"date": "2025-06-02", "hour": [
              {"time": "2025-06-02 03:00", "temp_c": -1.5, "condition": {"text": "Ясно", "code": 1000}},
              {"time": "2025-06-02 09:00", "temp_c": 5.0, "condition": {"text": "Облачно", "code": 1006}},
              {"time": "2025-06-02 15:00", "temp_c": 12.2, "condition": {"text": "Солнечно", "code": 1000}}
            ]},
            {"date": "2025-06-03", "hour": [
              {"time": "2025-06-03 21:00", "temp_c": 7.1, "condition": {"text": "Пасмурно", "code": 1009}}
            ]}
          ]}
        }"#;
        let resp: ForecastResponse = serde_json::from_str(raw).unwrap();
        let days = resp.forecast.unwrap().forecastday;
        let outline = outline_from_days(&days, "2025-06-02");
        assert_eq!(outline.night.as_ref().unwrap().text, "ясно");
        assert_eq!(outline.morning.as_ref().unwrap().temp_c, 5.0);
        assert_eq!(outline.day.as_ref().unwrap().temp_c, 12.2);
        // 21:00 is missing from today, the next day's slot fills in.
        assert_eq!(outline.evening.as_ref().unwrap().text, "пасмурно");
    }

    #[test]
    fn partial_forecast_keeps_remaining_parts() {
        let days = vec![ApiForecastDay {
            date: "2025-06-02".into(),
            hour: vec![ApiHour {
                time: "2025-06-02 09:00".into(),
                temp_c: 3.0,
                condition: Condition {
                    text: "Дождь".into(),
                    code: Some(1063),
                },
            }],
        }];
        let outline = outline_from_days(&days, "2025-06-02");
        assert!(outline.night.is_none());
        assert!(outline.morning.is_some());
        assert!(!outline.is_empty());
    }

    #[test]
    fn emoji_matches_condition_text() {
        assert_eq!(condition_emoji("Ясно"), "☀️");
        assert_eq!(condition_emoji("Небольшой дождь"), "🌧️");
        assert_eq!(condition_emoji("Умеренный снег"), "❄️");
        assert_eq!(condition_emoji("Пасмурно"), "☁️");
        assert_eq!(condition_emoji("что-то странное"), "🌤️");
    }
}
