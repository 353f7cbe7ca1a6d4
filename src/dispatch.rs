// src/dispatch.rs
//! Turns the scheduler's due list into deliveries: resolve the city, render
//! the daily forecast, hand it to the transport. One subscriber's failure
//! never touches the rest of the batch.

use std::sync::Arc;

use chrono_tz::Tz;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::catalog::{Catalog, City};
use crate::transport::DeliveryTransport;
use crate::weather::{condition_emoji, DailyOutline, OutlinePart, WeatherProvider};

const FORECAST_UNAVAILABLE: &str = "Не удалось загрузить прогноз. Попробуйте позже.";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("dispatch_sent_total", "Daily digests delivered.");
        describe_counter!(
            "dispatch_errors_total",
            "Delivery failures (isolated per subscriber)."
        );
        describe_counter!(
            "dispatch_skipped_total",
            "Due pairs skipped (unknown city slug)."
        );
    });
}

pub struct Dispatcher {
    catalog: Arc<Catalog>,
    weather: Arc<dyn WeatherProvider>,
    transport: Arc<dyn DeliveryTransport>,
}

impl Dispatcher {
    pub fn new(
        catalog: Arc<Catalog>,
        weather: Arc<dyn WeatherProvider>,
        transport: Arc<dyn DeliveryTransport>,
    ) -> Self {
        ensure_metrics_described();
        Self {
            catalog,
            weather,
            transport,
        }
    }

    /// Deliver to every due `(chat_id, city_slug)` pair in turn.
    pub async fn dispatch_due(&self, due: &[(i64, String)]) {
        for (chat_id, slug) in due {
            let Some(city) = self.catalog.city(slug) else {
                warn!(chat_id, city = %slug, "due subscription references unknown city");
                counter!("dispatch_skipped_total").increment(1);
                continue;
            };
            let text = self.render_daily_digest(city).await;
            match self.transport.send_text(*chat_id, &text).await {
                Ok(()) => {
                    counter!("dispatch_sent_total").increment(1);
                    info!(chat_id, city = %slug, "daily digest sent");
                }
                Err(e) => {
                    counter!("dispatch_errors_total").increment(1);
                    warn!(chat_id, city = %slug, error = ?e, "digest delivery failed");
                }
            }
        }
    }

    /// The forecast text for one city. Upstream trouble yields a static
    /// try-later message, never an error.
    pub async fn render_daily_digest(&self, city: &City) -> String {
        match self.weather.daily_outline(city).await {
            Some(outline) => render_outline(city, &outline),
            None => format!("{}: {}", city.name, FORECAST_UNAVAILABLE),
        }
    }
}

fn render_outline(city: &City, outline: &DailyOutline) -> String {
    let tz: Tz = city.timezone.parse().unwrap_or(chrono_tz::Europe::Moscow);
    let date = chrono::Utc::now()
        .with_timezone(&tz)
        .format("%d.%m.%Y")
        .to_string();

    let mut lines = vec![format!("Прогноз погоды · {} · {}", city.name, date), String::new()];
    for (label, part) in [
        ("🌙 Ночь", &outline.night),
        ("🌅 Утро", &outline.morning),
        ("☀️ День", &outline.day),
        ("🌆 Вечер", &outline.evening),
    ] {
        if let Some(p) = part {
            lines.push(format!("{label}: {} {}", format_temp(p.temp_c), describe(p)));
        }
    }
    lines.join("\n")
}

fn format_temp(temp_c: f64) -> String {
    let rounded = temp_c.round() as i64;
    if rounded > 0 {
        format!("+{rounded}°")
    } else {
        format!("{rounded}°")
    }
}

fn describe(part: &OutlinePart) -> String {
    if part.text.is_empty() {
        String::new()
    } else {
        format!("{} {}", condition_emoji(&part.text), part.text)
    }
}
