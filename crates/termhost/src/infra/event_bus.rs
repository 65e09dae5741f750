//! Channel fan-out for session events.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use termhost_common::mutex_lock_or_recover;
use tokio::sync::mpsc;
use tracing::trace;

use crate::domain::IoEvent;
use crate::domain::SessionId;
use crate::usecases::ports::EventSink;

pub type EventReceiver = mpsc::UnboundedReceiver<IoEvent>;
type EventSender = mpsc::UnboundedSender<IoEvent>;

#[derive(Default)]
struct Subscribers {
    by_session: HashMap<SessionId, Vec<EventSender>>,
    all: Vec<EventSender>,
}

/// Delivers every event to the subscribers of its session and to the
/// all-sessions subscribers. Receivers that were dropped are pruned on the
/// next emit.
#[derive(Default)]
pub struct IoEventBus {
    subscribers: Mutex<Subscribers>,
    emitted: AtomicU64,
    undelivered: AtomicU64,
}

impl IoEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, session_id: SessionId) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        mutex_lock_or_recover(&self.subscribers)
            .by_session
            .entry(session_id)
            .or_default()
            .push(tx);
        rx
    }

    pub fn subscribe_all(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        mutex_lock_or_recover(&self.subscribers).all.push(tx);
        rx
    }

    /// Drops every per-session subscriber of `session_id`; their receivers
    /// see the channel close.
    pub fn unsubscribe_session(&self, session_id: SessionId) {
        mutex_lock_or_recover(&self.subscribers)
            .by_session
            .remove(&session_id);
    }

    pub fn subscriber_count(&self) -> usize {
        let subscribers = mutex_lock_or_recover(&self.subscribers);
        subscribers.all.len() + subscribers.by_session.values().map(Vec::len).sum::<usize>()
    }

    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Events nobody was subscribed to.
    pub fn undelivered(&self) -> u64 {
        self.undelivered.load(Ordering::Relaxed)
    }
}

fn send_and_prune(senders: &mut Vec<EventSender>, event: &IoEvent) -> usize {
    senders.retain(|tx| tx.send(event.clone()).is_ok());
    senders.len()
}

impl EventSink for IoEventBus {
    fn emit(&self, event: IoEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        let session_id = event.session_id();
        let mut subscribers = mutex_lock_or_recover(&self.subscribers);

        let mut delivered = send_and_prune(&mut subscribers.all, &event);
        if let Some(senders) = subscribers.by_session.get_mut(&session_id) {
            delivered += send_and_prune(senders, &event);
            if senders.is_empty() {
                subscribers.by_session.remove(&session_id);
            }
        }

        if delivered == 0 {
            self.undelivered.fetch_add(1, Ordering::Relaxed);
            trace!(session = %session_id, kind = event.kind(), "Event had no subscribers");
        }
    }
}
