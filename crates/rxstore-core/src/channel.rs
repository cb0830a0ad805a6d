//! The shared action channel
//!
//! One [`ActionChannel`] is created per composition root and cloned into
//! every store that takes part in it. Every observer and subscriber sees
//! actions in exactly the order they were dispatched.
//!
//! Observers (callbacks) are notified before stream subscribers. Stores fold
//! through an observer, which is what lets an effect reading the latest
//! state see the effect of the action it is reacting to.
//!
//! # Re-entrant dispatch
//!
//! Observers and anything they call (reducers, state listeners) may
//! dispatch. Such an action is queued and delivered by the outermost
//! `dispatch` on that thread once the current action has reached everyone.
//! A dispatch from another thread waits for the running delivery and
//! returns only after its own action has been delivered.

use crate::Action;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Stream of actions delivered to one subscriber
pub type ActionStream = UnboundedReceiver<Action>;

/// Handle identifying a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&Action) -> bool + Send>;

#[derive(Default)]
struct Inner {
    next_id: u64,
    observers: Vec<(ObserverId, Observer)>,
    subscribers: Vec<UnboundedSender<Action>>,
}

/// Actions waiting for delivery and the thread delivering them
#[derive(Default)]
struct Pending {
    actions: VecDeque<Action>,
    drainer: Option<ThreadId>,
}

#[derive(Default)]
struct Shared {
    inner: Mutex<Inner>,
    pending: Mutex<Pending>,
    /// Held by the draining thread for the whole drain
    turn: Mutex<()>,
}

/// Process-wide multicast bus of actions
///
/// Cloning is cheap and every clone refers to the same bus.
#[derive(Clone, Default)]
pub struct ActionChannel {
    shared: Arc<Shared>,
}

/// Clears the drainer mark even if an observer panics
struct DrainGuard<'a>(&'a Mutex<Pending>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().drainer = None;
    }
}

impl ActionChannel {
    /// Create a new, empty channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an action to every observer and subscriber
    ///
    /// Called from inside a delivery (an observer, a reducer, a state
    /// listener), the action is queued behind the current one and this call
    /// returns immediately.
    pub fn dispatch(&self, action: Action) {
        let me = thread::current().id();
        {
            let mut pending = self.shared.pending.lock();
            pending.actions.push_back(action);
            if pending.drainer == Some(me) {
                return;
            }
        }

        let _turn = self.shared.turn.lock();
        self.shared.pending.lock().drainer = Some(me);
        let _guard = DrainGuard(&self.shared.pending);
        loop {
            let next = self.shared.pending.lock().actions.pop_front();
            match next {
                Some(action) => self.deliver(&action),
                None => break,
            }
        }
    }

    fn deliver(&self, action: &Action) {
        let mut guard = self.shared.inner.lock();
        let inner = &mut *guard;
        inner.observers.retain_mut(|(_, observer)| observer(action));
        inner
            .subscribers
            .retain(|tx| tx.unbounded_send(action.clone()).is_ok());
    }

    /// Register a callback run synchronously for every dispatched action
    ///
    /// The callback stays registered until it returns `false` or is removed
    /// with [`ActionChannel::unobserve`]. It may dispatch, but must not
    /// register or remove observers on this channel.
    pub fn observe<F>(&self, observer: F) -> ObserverId
    where
        F: FnMut(&Action) -> bool + Send + 'static,
    {
        let mut inner = self.shared.inner.lock();
        let id = ObserverId(inner.next_id);
        inner.next_id += 1;
        inner.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer; returns whether it was still registered
    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut inner = self.shared.inner.lock();
        let before = inner.observers.len();
        inner.observers.retain(|(observer_id, _)| *observer_id != id);
        inner.observers.len() != before
    }

    /// Open a stream of every action dispatched from now on
    ///
    /// Dropping the stream unsubscribes it.
    pub fn subscribe(&self) -> ActionStream {
        let (tx, rx) = mpsc::unbounded();
        self.shared.inner.lock().subscribers.push(tx);
        rx
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.shared.inner.lock().observers.len()
    }

    /// Number of live stream subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.shared.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}
