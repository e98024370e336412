//! docdesk-notify: transient, auto-expiring user notifications.
//!
//! Every `publish` appends a [`Notification`] and schedules its removal on the
//! tokio runtime. Manual `dismiss` cancels the pending timer. Both paths go
//! through the same idempotent removal, so an expiry racing a dismissal never
//! removes twice or errors.
//!
//! Changes are also broadcast as [`NotificationEvent`]s for live views (the
//! web crate streams them over SSE).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use docdesk_common::{Notification, Severity};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Delay before a notification removes itself.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

const EVENT_CAPACITY: usize = 256;

/// Pushed to subscribers whenever the queue changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    Published(Notification),
    Removed { id: u64, reason: RemovalReason },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Expired,
    Dismissed,
}

/// Cloneable handle to the process-wide notification queue.
#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<Inner>,
}

struct Inner {
    next_id: AtomicU64,
    ttl: Duration,
    state: Mutex<QueueState>,
    events: broadcast::Sender<NotificationEvent>,
}

#[derive(Default)]
struct QueueState {
    entries: Vec<Notification>,
    timers: HashMap<u64, JoinHandle<()>>,
}

impl NotificationStore {
    pub fn new(ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(1),
                ttl,
                state: Mutex::new(QueueState::default()),
                events,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Append a notification and schedule its expiry. Returns the new id.
    ///
    /// Expiry needs a tokio runtime; outside one the entry stays until dismissed.
    pub fn publish(&self, message: impl Into<String>, severity: Severity) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let notification = Notification { id, message: message.into(), severity };
        debug!(id, severity = severity.as_str(), message = %notification.message, "notification published");

        // Events go out under the queue lock, so `Published` always precedes
        // the matching `Removed`.
        let mut state = self.inner.lock();
        state.entries.push(notification.clone());
        // No subscribers is fine.
        let _ = self.inner.events.send(NotificationEvent::Published(notification));

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let weak: Weak<Inner> = Arc::downgrade(&self.inner);
                let ttl = self.inner.ttl;
                let timer = runtime.spawn(async move {
                    tokio::time::sleep(ttl).await;
                    if let Some(inner) = weak.upgrade() {
                        inner.remove(id, RemovalReason::Expired);
                    }
                });
                state.timers.insert(id, timer);
            }
            Err(_) => warn!(id, "no tokio runtime, notification will not expire"),
        }
        id
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.publish(message, Severity::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.publish(message, Severity::Error)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.publish(message, Severity::Info)
    }

    /// Remove a notification and cancel its timer. Returns whether anything was
    /// removed; an unknown or already-expired id is a no-op.
    pub fn dismiss(&self, id: u64) -> bool {
        self.inner.remove(id, RemovalReason::Dismissed)
    }

    /// Current notifications in publish order.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.inner.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.inner.events.subscribe()
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64, reason: RemovalReason) -> bool {
        let mut state = self.lock();
        let timer = state.timers.remove(&id);
        if reason == RemovalReason::Dismissed {
            if let Some(timer) = timer {
                timer.abort();
            }
        }
        let Some(pos) = state.entries.iter().position(|n| n.id == id) else {
            return false;
        };
        state.entries.remove(pos);
        debug!(id, ?reason, "notification removed");
        let _ = self.events.send(NotificationEvent::Removed { id, reason });
        true
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
    }
}
