//! Cache consumer for executing invalidation plans.
//!
//! Drains events from the queue, builds a plan, and deletes the affected
//! keys from both tiers. Each key is deleted in isolation so one failing
//! delete never blocks the rest of the batch.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use metrics::histogram;
use tracing::{info, instrument};
use uuid::Uuid;

use super::events::EventQueue;
use super::hybrid::HybridCache;
use super::planner::InvalidationPlan;

const METRIC_CACHE_CONSUME_MS: &str = "strati_cache_consume_ms";

/// Cache consumer that processes events and maintains cache consistency.
///
/// The consumer:
/// 1. Drains events from the queue
/// 2. Generates an invalidation plan from the events
/// 3. Executes the plan against both cache tiers
pub struct CacheConsumer {
    cache: Arc<HybridCache>,
    queue: Arc<EventQueue>,
    batch_limit: usize,
}

impl CacheConsumer {
    pub fn new(cache: Arc<HybridCache>, queue: Arc<EventQueue>, batch_limit: usize) -> Self {
        Self {
            cache,
            queue,
            batch_limit,
        }
    }

    /// Consume pending events and execute the plan.
    ///
    /// Returns true if any events were processed.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> bool {
        let consume_started_at = Instant::now();
        let events = self.queue.drain(self.batch_limit);
        if events.is_empty() {
            return false;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let plan = InvalidationPlan::from_events(events);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "Cache consumption starting"
        );

        if plan.clear_all {
            self.cache.clear_all().await;
        } else {
            // Isolated deletes; `delete` swallows its own storage errors,
            // so one failing key never blocks the rest of the batch.
            let keys: Vec<String> = plan.delete_keys.iter().map(|key| key.to_string()).collect();
            join_all(keys.iter().map(|key| self.cache.delete(key))).await;
        }

        info!(
            event_count,
            invalidated = plan.delete_keys.len(),
            cleared_all = plan.clear_all,
            "Cache consumption complete"
        );

        histogram!(METRIC_CACHE_CONSUME_MS)
            .record(consume_started_at.elapsed().as_secs_f64() * 1000.0);

        true
    }
}
