//! UI event buffer: toasts and sound cues waiting for the dashboard to poll

use std::collections::VecDeque;
use std::sync::Mutex;

use alerting::{AlertError, AudioPlayer, Notifier, Toast};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Kind of UI event
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UiEventKind {
    Toast(Toast),
    Sound,
}

/// Event for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct UiEvent {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: UiEventKind,
}

struct Inner {
    events: VecDeque<UiEvent>,
    next_id: u64,
}

/// Bounded buffer of UI events; the dashboard plays sounds and shows toasts
pub struct NotificationHub {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::with_capacity(capacity),
                next_id: 1,
            }),
            capacity: capacity.max(1),
        }
    }

    fn push(&self, kind: UiEventKind) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let id = inner.next_id;
        inner.next_id += 1;
        while inner.events.len() >= self.capacity {
            inner.events.pop_front();
        }
        debug!("UI event {}: {:?}", id, kind);
        inner.events.push_back(UiEvent {
            id,
            timestamp: Utc::now(),
            kind,
        });
    }

    /// Events newer than `since` (by id), oldest first, at most `limit`
    pub fn events(&self, since: Option<u64>, limit: usize) -> Vec<UiEvent> {
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        let since = since.unwrap_or(0);
        let newer: Vec<_> = inner.events.iter().filter(|e| e.id > since).collect();
        let skip = newer.len().saturating_sub(limit);
        newer.into_iter().skip(skip).cloned().collect()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Notifier for NotificationHub {
    fn notify(&self, toast: &Toast) {
        self.push(UiEventKind::Toast(toast.clone()));
    }
}

impl AudioPlayer for NotificationHub {
    fn play_alert(&self) -> Result<(), AlertError> {
        self.push(UiEventKind::Sound);
        Ok(())
    }
}
