//! city-news-digest — Binary Entrypoint
//! Wires the city catalog, subscription store, weather provider and delivery
//! transport, then runs the reminder loop until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use city_news_digest::catalog::Catalog;
use city_news_digest::dispatch::Dispatcher;
use city_news_digest::scheduler::{spawn_reminder_loop, ReminderLoopCfg};
use city_news_digest::subscriptions::SubscriptionStore;
use city_news_digest::transport::{ConsoleTransport, DeliveryTransport};
use city_news_digest::weather::{WeatherApi, WeatherProvider};

const ENV_SUBSCRIPTIONS_PATH: &str = "SUBSCRIPTIONS_PATH";
const DEFAULT_SUBSCRIPTIONS_PATH: &str = "data/subscriptions.json";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Weather provider stand-in for runs without an API key: always
/// unavailable, so digests render their try-later text.
struct NoWeather;

#[async_trait::async_trait]
impl WeatherProvider for NoWeather {
    async fn current(
        &self,
        _city: &city_news_digest::catalog::City,
    ) -> Option<city_news_digest::weather::CurrentConditions> {
        None
    }

    async fn daily_outline(
        &self,
        _city: &city_news_digest::catalog::City,
    ) -> Option<city_news_digest::weather::DailyOutline> {
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let catalog = Arc::new(Catalog::load_default().context("loading city catalog")?);
    info!(cities = catalog.cities.len(), "city catalog loaded");

    let store_path = std::env::var(ENV_SUBSCRIPTIONS_PATH)
        .unwrap_or_else(|_| DEFAULT_SUBSCRIPTIONS_PATH.to_string());
    let store = Arc::new(SubscriptionStore::new(store_path));

    let weather: Arc<dyn WeatherProvider> = match WeatherApi::from_env()? {
        Some(api) => Arc::new(api),
        None => {
            warn!("WEATHERAPI_KEY not set, forecasts will render as unavailable");
            Arc::new(NoWeather)
        }
    };
    let transport: Arc<dyn DeliveryTransport> = Arc::new(ConsoleTransport);
    let dispatcher = Arc::new(Dispatcher::new(catalog.clone(), weather, transport));

    let loop_handle = spawn_reminder_loop(store, dispatcher, ReminderLoopCfg::default());
    info!("reminder loop running, Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    loop_handle.abort();
    info!("shutting down");
    Ok(())
}
