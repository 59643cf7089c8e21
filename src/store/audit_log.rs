//! Append-only audit trail of processed events
//!
//! Every event that finishes processing leaves one entry here, carrying the
//! actor context when the event had one. History queries are capped and
//! newest-first so the trail stays cheap to read under load.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::PlatformError;

use super::traits::AuditLogStore;

/// Maximum entries a history query returns
const HISTORY_LIMIT: usize = 100;

/// One processed-event record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    /// Unique entry identifier
    pub id: String,

    /// Dotted event name (`transaction.cleared`, `queue.delivered`, ...)
    pub event_name: String,

    /// The domain object the event concerns (transaction id, queue item id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,

    /// Acting user, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Source IP address, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Client user agent, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Serialized event payload
    pub payload: serde_json::Value,

    /// When the entry was recorded
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Create an entry for an event name and payload, recorded now
    pub fn new(event_name: impl Into<String>, payload: serde_json::Value) -> Self {
        AuditLogEntry {
            id: format!("aud_{}", Uuid::new_v4().simple()),
            event_name: event_name.into(),
            item_id: None,
            user_id: None,
            ip_address: None,
            user_agent: None,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Attach the id of the domain object this entry concerns
    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    /// Attach the acting user
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach the source IP address
    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    /// Attach the client user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Filters for history queries; unset fields match everything
///
/// Set fields combine with AND: an entry must satisfy every filter to be
/// returned.
#[derive(Debug, Clone, Default)]
pub struct AuditFilters {
    /// Match entries for this event name only
    pub event_name: Option<String>,

    /// Match entries for this acting user only
    pub user_id: Option<String>,

    /// Match entries recorded at or after this time
    pub since: Option<DateTime<Utc>>,
}

impl AuditFilters {
    fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(event_name) = &self.event_name {
            if &entry.event_name != event_name {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if entry.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.created_at < since {
                return false;
            }
        }
        true
    }
}

/// In-memory audit trail
///
/// Entries are kept in append order under a single mutex; appends are rare
/// compared to authorization traffic, so contention is not a concern here.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: std::sync::Mutex<Vec<AuditLogEntry>>,
}

impl InMemoryAuditLog {
    /// Create an empty audit log
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditLogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AuditLogStore for InMemoryAuditLog {
    fn append(&self, entry: AuditLogEntry) -> Result<(), PlatformError> {
        self.lock().push(entry);
        Ok(())
    }

    fn event_history(&self, filters: &AuditFilters) -> Result<Vec<AuditLogEntry>, PlatformError> {
        Ok(self
            .lock()
            .iter()
            .rev()
            .filter(|entry| filters.matches(entry))
            .take(HISTORY_LIMIT)
            .cloned()
            .collect())
    }
}
