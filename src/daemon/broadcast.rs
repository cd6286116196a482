//! Event fan-out to attached observers.
//!
//! Each observer owns a bounded queue. Publishing is a non-blocking
//! `try_send` per observer: a full queue skips that observer for this event,
//! a closed queue detaches it. Nothing is queued for later or replayed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{TimerEvent, TimerSnapshot};

/// Identifier handed out by [`EventBroadcaster::subscribe`].
pub type SubscriberId = u64;

// ============================================================================
// Subscription
// ============================================================================

/// Receiving end of an observer attachment.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<TimerEvent>,
}

impl Subscription {
    /// Returns the subscriber id used for [`EventBroadcaster::unsubscribe`].
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next event. Returns `None` once detached.
    pub async fn recv(&mut self) -> Option<TimerEvent> {
        self.receiver.recv().await
    }

    /// Returns the next event if one is queued.
    pub fn try_recv(&mut self) -> Option<TimerEvent> {
        self.receiver.try_recv().ok()
    }
}

// ============================================================================
// EventBroadcaster
// ============================================================================

#[derive(Debug, Default)]
struct Subscribers {
    next_id: SubscriberId,
    senders: HashMap<SubscriberId, mpsc::Sender<TimerEvent>>,
}

/// Delivers timer events to a dynamic set of observers.
///
/// Cloning yields another handle to the same subscriber set.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    subscribers: Arc<Mutex<Subscribers>>,
    buffer: usize,
}

impl EventBroadcaster {
    /// Creates a broadcaster whose observers each buffer up to `buffer` events.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            buffer: buffer.max(1),
        }
    }

    /// Attaches a new observer.
    ///
    /// The observer receives only events published after this call; it
    /// should query the current state right after subscribing.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut subscribers = self.lock();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.senders.insert(id, tx);
        debug!(subscriber = id, "observer attached");

        Subscription { id, receiver: rx }
    }

    /// Detaches an observer. Returns false if it was not attached.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.lock().senders.remove(&id).is_some();
        if removed {
            debug!(subscriber = id, "observer detached");
        }
        removed
    }

    /// Returns the number of attached observers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().senders.len()
    }

    /// Pushes a full state snapshot to every observer.
    ///
    /// Returns the number of observers the event was queued for.
    pub fn publish(&self, snapshot: TimerSnapshot) -> usize {
        self.deliver(TimerEvent::StateChanged { snapshot })
    }

    /// Pushes the terminal finished event.
    pub fn publish_finished(&self) -> usize {
        self.deliver(TimerEvent::Finished)
    }

    /// Tells observers the session is gone.
    pub fn end_session(&self, session_id: Uuid) -> usize {
        self.deliver(TimerEvent::SessionEnded { session_id })
    }

    fn deliver(&self, event: TimerEvent) -> usize {
        let mut subscribers = self.lock();
        let mut delivered = 0;

        subscribers.senders.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!(subscriber = id, "observer queue full, event skipped");
                true
            }
            Err(TrySendError::Closed(_)) => {
                warn!(subscriber = id, "observer gone, detaching");
                false
            }
        });

        delivered
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(16)
    }
}
