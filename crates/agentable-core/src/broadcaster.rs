//! Event Broadcaster - record-then-deliver fan-out with replay
//!
//! `publish` appends the event to the run and pushes it to every live
//! subscriber while holding the run's lock. `subscribe` takes the same lock
//! to replay the recorded history into the new channel before registering
//! it, so a subscriber sees every event exactly once and in order no matter
//! when it connects.

use crate::error::{Error, Result};
use crate::event::RunEvent;
use crate::registry::{RunHandle, RunRegistry, Subscriber};
use crate::run::RunId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Publishes run events and manages subscriptions
pub struct EventBroadcaster {
    registry: Arc<RunRegistry>,
    next_subscriber: AtomicU64,
}

impl EventBroadcaster {
    /// Create a broadcaster over a registry
    #[must_use]
    pub fn new(registry: Arc<RunRegistry>) -> Self {
        Self {
            registry,
            next_subscriber: AtomicU64::new(1),
        }
    }

    /// The registry this broadcaster reads from
    #[must_use]
    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// Publish an event for a registered run
    pub fn publish(&self, run_id: &RunId, event: RunEvent) -> Result<()> {
        let handle = self
            .registry
            .handle(run_id)
            .ok_or(Error::RunNotFound(*run_id))?;
        self.publish_to(&handle, event)
    }

    /// Publish an event through a handle, whether or not it is still registered.
    ///
    /// Fails with `RunFinished` once a terminal event has been published;
    /// in that case nothing is recorded or delivered.
    pub fn publish_to(&self, handle: &RunHandle, event: RunEvent) -> Result<()> {
        let mut state = handle.lock();
        let terminal = event.is_terminal();
        state.run.record(event.clone())?;

        let before = state.subscribers.len();
        state
            .subscribers
            .retain(|subscriber| subscriber.tx.send(event.clone()).is_ok());
        let dropped = before - state.subscribers.len();
        if dropped > 0 {
            debug!(run_id = %handle.id(), dropped, "Dropped disconnected subscribers");
        }

        if terminal {
            // Closing the senders ends each subscription after it drains.
            state.subscribers.clear();
        }
        Ok(())
    }

    /// Subscribe to a registered run
    pub fn subscribe(&self, run_id: &RunId) -> Result<Subscription> {
        let handle = self
            .registry
            .handle(run_id)
            .ok_or(Error::RunNotFound(*run_id))?;
        Ok(self.subscribe_to(handle))
    }

    /// Subscribe through a handle: recorded events first, then live ones
    #[must_use]
    pub fn subscribe_to(&self, handle: Arc<RunHandle>) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut state = handle.lock();
            for event in &state.run.events {
                // rx is alive until this function returns
                let _ = tx.send(event.clone());
            }
            if !state.run.status.is_terminal() {
                state.subscribers.push(Subscriber { id, tx });
            }
        }

        debug!(run_id = %handle.id(), subscriber = id, "Subscriber attached");
        Subscription { id, handle, rx }
    }
}

/// Live subscription to one run; detaches itself when dropped
pub struct Subscription {
    id: u64,
    handle: Arc<RunHandle>,
    rx: mpsc::UnboundedReceiver<RunEvent>,
}

impl Subscription {
    /// Run this subscription follows
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.handle.id()
    }

    /// Next event; `None` once the run has finished and everything was read
    pub async fn recv(&mut self) -> Option<RunEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<RunEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.remove_subscriber(self.id);
    }
}
