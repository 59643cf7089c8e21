//! Fan-out event bus with isolated handler execution
//!
//! The bus is plain dependency-injected state: construct one, hand clones of
//! the `Arc` to whoever publishes or subscribes. There is no global
//! instance.
//!
//! Publishing never fails the publisher. Every subscribed handler runs in
//! its own task, so a slow, failing, or panicking handler cannot starve or
//! poison its siblings; the publisher gets one [`HandlerOutcome`] per
//! handler and decides for itself what a failure means.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, error};

use crate::types::{PlatformError, PlatformEvent};

/// Subscription cap per event name
///
/// Far above any legitimate handler count; hitting it means a registration
/// loop is leaking subscriptions.
const MAX_LISTENERS: usize = 50;

/// A handler invoked for every event published under a subscribed name
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handler name used in outcomes and logs
    fn name(&self) -> &str;

    /// Process one event
    ///
    /// # Errors
    ///
    /// A returned error is reported to the publisher as a failed
    /// [`HandlerOutcome`]; it never affects other handlers.
    async fn handle(&self, event: PlatformEvent) -> Result<(), PlatformError>;
}

/// Token returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// The per-handler result of one publication
#[derive(Debug)]
pub struct HandlerOutcome {
    /// Name of the handler that ran
    pub handler: String,

    /// What the handler returned; panics surface as [`PlatformError::HandlerFailed`]
    pub result: Result<(), PlatformError>,
}

impl HandlerOutcome {
    /// Whether the handler completed successfully
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Event name → subscribed handlers
#[derive(Default)]
pub struct EventBus {
    subscriptions: DashMap<String, Vec<(SubscriptionId, Arc<dyn EventHandler>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create a bus with no subscriptions
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler to an event name
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::ListenerLimit`] when the event already has
    /// the maximum number of subscribers.
    pub fn subscribe(
        &self,
        event_name: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionId, PlatformError> {
        let mut handlers = self
            .subscriptions
            .entry(event_name.to_string())
            .or_insert_with(Vec::new);
        if handlers.len() >= MAX_LISTENERS {
            return Err(PlatformError::listener_limit(event_name, MAX_LISTENERS));
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(event_name, handler = handler.name(), "subscribed");
        handlers.push((id, handler));
        Ok(id)
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, event_name: &str, id: SubscriptionId) -> bool {
        match self.subscriptions.get_mut(event_name) {
            Some(mut handlers) => {
                let before = handlers.len();
                handlers.retain(|(sub_id, _)| *sub_id != id);
                handlers.len() < before
            }
            None => false,
        }
    }

    /// Number of handlers subscribed to an event name
    pub fn subscriber_count(&self, event_name: &str) -> usize {
        self.subscriptions
            .get(event_name)
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }

    /// Deliver an event to every handler subscribed to its name
    ///
    /// Handlers run concurrently, each in its own task. The returned vector
    /// has one outcome per handler, in subscription order; an event with no
    /// subscribers returns an empty vector.
    pub async fn publish(&self, event: &PlatformEvent) -> Vec<HandlerOutcome> {
        let event_name = event.name();
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .subscriptions
            .get(event_name)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        let tasks = handlers.into_iter().map(|handler| {
            let name = handler.name().to_string();
            let event = event.clone();
            let task = tokio::spawn(async move { handler.handle(event).await });
            async move { (name, task.await) }
        });

        let mut outcomes = Vec::new();
        for (handler, joined) in futures::future::join_all(tasks).await {
            let result = match joined {
                Ok(result) => result,
                // A panicking handler is a bug, but it must not take the
                // bus down with it
                Err(join_error) => {
                    error!(event_name, handler, %join_error, "handler panicked");
                    Err(PlatformError::handler_failed(
                        event_name,
                        join_error.to_string(),
                    ))
                }
            };
            if let Err(error) = &result {
                error!(event_name, handler, %error, "handler failed");
            }
            outcomes.push(HandlerOutcome { handler, result });
        }
        outcomes
    }
}
