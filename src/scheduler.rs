// src/scheduler.rs
//! Minute tick for the daily digest. Every tick loads the subscription set,
//! asks it which subscribers' local wall clocks read their chosen minute
//! right now, and hands the due pairs to the dispatcher.
//!
//! The match is exact-minute equality, so a subscription fires at most once
//! per civil day. If the process is down during the matching minute, that
//! day's delivery is skipped — no catch-up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::info;

use crate::dispatch::Dispatcher;
use crate::subscriptions::SubscriptionStore;

#[derive(Clone, Copy, Debug)]
pub struct ReminderLoopCfg {
    /// Delay before the first tick, letting storage and network warm up.
    pub startup_grace: Duration,
    pub tick_interval: Duration,
}

impl Default for ReminderLoopCfg {
    fn default() -> Self {
        Self {
            startup_grace: Duration::from_secs(10),
            tick_interval: Duration::from_secs(60),
        }
    }
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("reminder_ticks_total", "Scheduler ticks evaluated.");
        describe_counter!("reminder_due_total", "Subscriptions found due across all ticks.");
        describe_gauge!("reminder_last_tick_ts", "Unix ts of the last completed tick.");
    });
}

/// Spawn the reminder loop. Ticks never overlap: dispatching of one tick's
/// due set completes before the next evaluation starts.
pub fn spawn_reminder_loop(
    store: Arc<SubscriptionStore>,
    dispatcher: Arc<Dispatcher>,
    cfg: ReminderLoopCfg,
) -> JoinHandle<()> {
    ensure_metrics_described();
    tokio::spawn(async move {
        tokio::time::sleep(cfg.startup_grace).await;
        let mut ticker = tokio::time::interval(cfg.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            let due = store.due_at(now).await;

            counter!("reminder_ticks_total").increment(1);
            gauge!("reminder_last_tick_ts").set(now.timestamp() as f64);

            if !due.is_empty() {
                counter!("reminder_due_total").increment(due.len() as u64);
                info!(due = due.len(), "dispatching daily digests");
                dispatcher.dispatch_due(&due).await;
            }
        }
    })
}
