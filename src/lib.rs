// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregate;
pub mod catalog;
pub mod dispatch;
pub mod ingest;
pub mod relevance;
pub mod scheduler;
pub mod subscriptions;
pub mod transport;
pub mod weather;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{run_cascade, Aggregator, Digest, TierSources};
pub use crate::catalog::{Catalog, City};
pub use crate::dispatch::Dispatcher;
pub use crate::scheduler::{spawn_reminder_loop, ReminderLoopCfg};
pub use crate::subscriptions::{Subscription, SubscriptionStore};
