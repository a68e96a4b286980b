use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::api::{ApiError, ErrorSink};

pub const DEFAULT_DURATION: Duration = Duration::from_millis(4000);
const DEFAULT_MAX_NOTIFICATIONS: usize = 200;

/// Notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Info => write!(f, "info"),
            NotificationKind::Success => write!(f, "success"),
            NotificationKind::Warning => write!(f, "warning"),
            NotificationKind::Error => write!(f, "error"),
        }
    }
}

/// A transient user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Pushed(Notification),
    Removed(u64),
}

struct QueueInner {
    notifications: RwLock<VecDeque<Notification>>,
    next_id: AtomicU64,
    max_notifications: usize,
    default_duration: Duration,
    events: broadcast::Sender<NotificationEvent>,
}

/// Process-wide notification queue.
///
/// Cheap to clone; every clone shares the same contents. Only the queue
/// mutates its contents: callers push and dismiss by id.
#[derive(Clone)]
pub struct NotificationQueue {
    inner: Arc<QueueInner>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_NOTIFICATIONS, DEFAULT_DURATION)
    }

    pub fn with_limits(max_notifications: usize, default_duration: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(QueueInner {
                notifications: RwLock::new(VecDeque::new()),
                next_id: AtomicU64::new(1),
                max_notifications: max_notifications.max(1),
                default_duration,
                events,
            }),
        }
    }

    /// Push with the queue's default duration.
    pub fn push(&self, message: impl Into<String>, kind: NotificationKind) -> u64 {
        self.push_for(message, kind, self.inner.default_duration)
    }

    /// Push a notification that expires after `duration`. `Duration::ZERO`
    /// keeps it until removed explicitly.
    pub fn push_for(
        &self,
        message: impl Into<String>,
        kind: NotificationKind,
        duration: Duration,
    ) -> u64 {
        let notification = Notification {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            message: message.into(),
            kind,
            created_at: Utc::now(),
        };
        let id = notification.id;

        match kind {
            NotificationKind::Error => error!("{}", notification.message),
            NotificationKind::Warning => warn!("{}", notification.message),
            NotificationKind::Info | NotificationKind::Success => info!("{}", notification.message),
        }

        let mut evicted = Vec::new();
        {
            let mut notifications = self.inner.notifications.write();
            notifications.push_back(notification.clone());
            while notifications.len() > self.inner.max_notifications {
                if let Some(oldest) = notifications.pop_front() {
                    evicted.push(oldest.id);
                }
            }
        }
        for id in evicted {
            let _ = self.inner.events.send(NotificationEvent::Removed(id));
        }
        let _ = self.inner.events.send(NotificationEvent::Pushed(notification));

        if !duration.is_zero() {
            self.schedule_removal(id, duration);
        }
        id
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(message, NotificationKind::Info)
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.push(message, NotificationKind::Success)
    }

    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.push(message, NotificationKind::Warning)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(message, NotificationKind::Error)
    }

    /// Dismiss a notification. Removing an unknown id is a no-op.
    pub fn remove(&self, id: u64) -> bool {
        let removed = {
            let mut notifications = self.inner.notifications.write();
            match notifications.iter().position(|n| n.id == id) {
                Some(index) => notifications.remove(index).is_some(),
                None => false,
            }
        };
        if removed {
            let _ = self.inner.events.send(NotificationEvent::Removed(id));
        }
        removed
    }

    /// Current notifications, oldest first.
    pub fn list(&self) -> Vec<Notification> {
        self.inner.notifications.read().iter().cloned().collect()
    }

    pub fn get(&self, id: u64) -> Option<Notification> {
        self.inner.notifications.read().iter().find(|n| n.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.notifications.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.notifications.read().is_empty()
    }

    /// Remove and return everything currently queued.
    pub fn drain(&self) -> Vec<Notification> {
        let drained: Vec<Notification> = self.inner.notifications.write().drain(..).collect();
        for notification in &drained {
            let _ = self.inner.events.send(NotificationEvent::Removed(notification.id));
        }
        drained
    }

    pub fn clear(&self) {
        self.drain();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.inner.events.subscribe()
    }

    fn schedule_removal(&self, id: u64, duration: Duration) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime; notification {} will not expire", id);
                return;
            }
        };

        let queue: Weak<QueueInner> = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(inner) = queue.upgrade() {
                NotificationQueue { inner }.remove(id);
            }
        });
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Pushing an error already logs it at error level.
impl ErrorSink for NotificationQueue {
    fn report(&self, err: &ApiError) {
        self.error(err.reason());
    }
}
