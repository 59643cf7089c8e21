//! Durable-ish event delivery: priority ordering, retry, dead-letter
//!
//! The queue fronts the bus for events that must not be silently dropped.
//! Items are delivered lowest-priority-value first, FIFO within a priority.
//! A delivery succeeds only when every subscribed handler succeeds (an
//! event with no subscribers is trivially delivered). Failed items are
//! retried with exponential backoff and moved to the dead-letter list once
//! the retry budget is exhausted.
//!
//! Claiming is atomic: a batch is removed from the pending map in a single
//! critical section, so two concurrent `process_batch` calls can never
//! deliver the same item twice.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::{AuditLogEntry, AuditLogStore};
use crate::types::{PlatformError, PlatformEvent};

use super::bus::EventBus;

/// Queue tuning knobs
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Failed delivery attempts before an item is dead-lettered
    pub max_retries: u32,

    /// First retry delay; doubles per attempt
    pub base_delay: Duration,

    /// Maximum items claimed per `process_batch` call
    pub batch_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            batch_size: 10,
        }
    }
}

/// Delivery state of a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueItemStatus {
    /// Waiting for delivery or backing off between attempts
    Pending,

    /// Retry budget exhausted; the item sits in the dead-letter list
    Failed,
}

/// One queued event with its delivery state
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// Unique item identifier
    pub id: String,

    /// The event to deliver
    pub event: PlatformEvent,

    /// Priority; lower values are delivered first
    pub priority: u8,

    /// Failed delivery attempts so far
    pub attempts: u32,

    /// Current delivery state
    pub status: QueueItemStatus,

    /// Handler failures from the most recent attempt
    pub last_error: Option<String>,

    /// When the item was enqueued
    pub enqueued_at: DateTime<Utc>,

    /// Earliest time the item may be (re)delivered
    pub next_attempt_at: DateTime<Utc>,

    seq: u64,
}

/// Outcome of one `process_batch` call
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Item ids delivered to every handler successfully
    pub delivered: Vec<String>,

    /// Item ids re-queued for a later attempt
    pub retried: Vec<String>,

    /// Item ids moved to the dead-letter list this batch
    pub dead_lettered: Vec<String>,
}

/// Priority queue delivering events through an [`EventBus`]
pub struct EventQueue {
    bus: Arc<EventBus>,
    audit: Arc<dyn AuditLogStore>,
    config: QueueConfig,
    // Keyed by (priority, insertion seq); BTreeMap iteration order is the
    // delivery order. Retries keep their original key so a retried item
    // does not jump the FIFO line within its priority.
    pending: Mutex<BTreeMap<(u8, u64), QueueItem>>,
    dead: Mutex<Vec<QueueItem>>,
    seq: AtomicU64,
}

impl EventQueue {
    /// Create a queue delivering through `bus` and auditing into `audit`
    pub fn new(bus: Arc<EventBus>, audit: Arc<dyn AuditLogStore>, config: QueueConfig) -> Self {
        Self {
            bus,
            audit,
            config,
            pending: Mutex::new(BTreeMap::new()),
            dead: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    fn pending_lock(&self) -> MutexGuard<'_, BTreeMap<(u8, u64), QueueItem>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dead_lock(&self) -> MutexGuard<'_, Vec<QueueItem>> {
        self.dead
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add an event to the queue, returning the new item's id
    pub fn enqueue(&self, event: PlatformEvent, priority: u8) -> String {
        let now = Utc::now();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let item = QueueItem {
            id: format!("qi_{}", Uuid::new_v4().simple()),
            event,
            priority,
            attempts: 0,
            status: QueueItemStatus::Pending,
            last_error: None,
            enqueued_at: now,
            next_attempt_at: now,
            seq,
        };
        let id = item.id.clone();
        info!(item_id = %id, event = item.event.name(), priority, "enqueued");
        self.pending_lock().insert((priority, seq), item);
        id
    }

    /// Items currently pending (including those backing off)
    pub fn len(&self) -> usize {
        self.pending_lock().len()
    }

    /// Whether no items are pending
    pub fn is_empty(&self) -> bool {
        self.pending_lock().is_empty()
    }

    /// Snapshot of the dead-letter list
    pub fn dead_letters(&self) -> Vec<QueueItem> {
        self.dead_lock().clone()
    }

    /// Deliver up to one batch of eligible items
    ///
    /// Claims at most `batch_size` items whose backoff has elapsed, in
    /// priority order, and delivers each through the bus. A failed item is
    /// re-queued with doubled delay, or dead-lettered once it has failed
    /// `max_retries` deliveries in total.
    pub async fn process_batch(&self) -> BatchReport {
        let now = Utc::now();
        let claimed: Vec<QueueItem> = {
            let mut pending = self.pending_lock();
            let keys: Vec<(u8, u64)> = pending
                .iter()
                .filter(|(_, item)| item.next_attempt_at <= now)
                .map(|(key, _)| *key)
                .take(self.config.batch_size)
                .collect();
            keys.into_iter()
                .filter_map(|key| pending.remove(&key))
                .collect()
        };

        let mut report = BatchReport::default();
        for mut item in claimed {
            let outcomes = self.bus.publish(&item.event).await;
            if outcomes.iter().all(|outcome| outcome.is_ok()) {
                self.record_delivery(&item);
                report.delivered.push(item.id);
                continue;
            }

            item.attempts += 1;
            item.last_error = Some(
                outcomes
                    .iter()
                    .filter_map(|outcome| {
                        outcome
                            .result
                            .as_ref()
                            .err()
                            .map(|error| format!("{}: {error}", outcome.handler))
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
            );
            if item.attempts >= self.config.max_retries {
                error!(
                    item_id = %item.id,
                    event = item.event.name(),
                    attempts = item.attempts,
                    last_error = item.last_error.as_deref().unwrap_or(""),
                    "retry budget exhausted, dead-lettering"
                );
                item.status = QueueItemStatus::Failed;
                report.dead_lettered.push(item.id.clone());
                self.dead_lock().push(item);
            } else {
                let delay = self.config.base_delay.as_millis() as i64
                    * 2i64.pow(item.attempts);
                item.next_attempt_at = Utc::now() + chrono::Duration::milliseconds(delay);
                warn!(
                    item_id = %item.id,
                    event = item.event.name(),
                    attempts = item.attempts,
                    delay_ms = delay,
                    "delivery failed, backing off"
                );
                report.retried.push(item.id.clone());
                self.pending_lock().insert((item.priority, item.seq), item);
            }
        }
        report
    }

    /// Drain the queue: process batches until nothing is eligible now
    ///
    /// Items backing off are left in place; call again after their delay.
    pub async fn drain_eligible(&self) -> BatchReport {
        let mut total = BatchReport::default();
        loop {
            let report = self.process_batch().await;
            let progressed = !report.delivered.is_empty()
                || !report.retried.is_empty()
                || !report.dead_lettered.is_empty();
            total.delivered.extend(report.delivered);
            total.retried.extend(report.retried);
            total.dead_lettered.extend(report.dead_lettered);
            if !progressed {
                return total;
            }
        }
    }

    fn record_delivery(&self, item: &QueueItem) {
        let payload = serde_json::to_value(&item.event).unwrap_or_else(|_| json!(null));
        let entry = AuditLogEntry::new("queue.delivered", payload).with_item_id(&item.id);
        if let Err(error) = self.audit.append(entry) {
            // Losing one audit entry must not fail or re-queue the delivery
            warn!(item_id = %item.id, %error, "audit append failed");
        }
        info!(item_id = %item.id, event = item.event.name(), "delivered");
    }
}
