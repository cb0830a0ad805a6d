//! Replay-last-value state streams
//!
//! A [`StateStream`] is a multicast stream that remembers the latest value it
//! published. New subscribers receive that value first and every later one
//! after it. Consecutive equal values are published only once.
//!
//! A stream ends in one of two ways: it completes (subscribers see the end of
//! their stream) or it faults, which is a completion caused by a reducer
//! panic and is reported by [`StateStream::is_faulted`].

use crate::error::{Error, Result};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;

/// Stream of states delivered to one subscriber
pub type StateSubscription<S> = UnboundedReceiver<S>;

/// Notification passed to stream listeners
#[derive(Debug)]
pub enum Signal<'a, S> {
    /// A new value was published
    Next(&'a S),
    /// The stream completed normally
    Completed,
    /// The stream was terminated by a fault
    Faulted,
}

type Listener<S> = Box<dyn FnMut(Signal<'_, S>) -> bool + Send>;

struct Inner<S> {
    latest: Option<S>,
    listeners: Vec<Listener<S>>,
    subscribers: Vec<UnboundedSender<S>>,
    completed: bool,
    faulted: bool,
}

/// Multicast stream of states with replay of the latest value
pub struct StateStream<S> {
    inner: Arc<Mutex<Inner<S>>>,
}

impl<S> Clone for StateStream<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> StateStream<S>
where
    S: Clone + PartialEq + Send + 'static,
{
    /// Create a stream that has not published anything yet
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                latest: None,
                listeners: Vec::new(),
                subscribers: Vec::new(),
                completed: false,
                faulted: false,
            })),
        }
    }

    /// Publish a value
    ///
    /// Returns `false` when the value equals the latest one or the stream has
    /// ended; nothing is delivered in either case.
    pub fn publish(&self, value: S) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.completed || inner.latest.as_ref() == Some(&value) {
            return false;
        }

        inner
            .listeners
            .retain_mut(|listener| listener(Signal::Next(&value)));
        inner
            .subscribers
            .retain(|tx| tx.unbounded_send(value.clone()).is_ok());
        inner.latest = Some(value);
        true
    }

    /// Get a copy of the latest published value
    pub fn latest(&self) -> Option<S> {
        self.inner.lock().latest.clone()
    }

    /// Subscribe as a stream: the latest value first, then every new one
    ///
    /// On an ended stream the subscription yields the latest value (if any)
    /// and then ends.
    pub fn subscribe(&self) -> StateSubscription<S> {
        let (tx, rx) = mpsc::unbounded();
        let mut inner = self.inner.lock();
        if let Some(latest) = &inner.latest {
            let _ = tx.unbounded_send(latest.clone());
        }
        if !inner.completed {
            inner.subscribers.push(tx);
        }
        rx
    }

    /// Register a callback, replaying the latest value to it first
    ///
    /// The callback runs under the stream lock and stays registered until it
    /// returns `false`. An ended stream immediately sends its terminal signal.
    /// It may dispatch on the action channel (the action is queued until the
    /// current one is delivered) but must not publish to this same stream.
    pub fn observe<F>(&self, listener: F)
    where
        F: FnMut(Signal<'_, S>) -> bool + Send + 'static,
    {
        let mut listener: Listener<S> = Box::new(listener);
        let mut inner = self.inner.lock();

        if let Some(latest) = &inner.latest {
            if !listener(Signal::Next(latest)) {
                return;
            }
        }
        if inner.completed {
            let signal = if inner.faulted {
                Signal::Faulted
            } else {
                Signal::Completed
            };
            listener(signal);
            return;
        }
        inner.listeners.push(listener);
    }

    /// Wait until a published value satisfies `predicate`
    ///
    /// The latest value is checked first.
    pub async fn wait_for<P>(&self, mut predicate: P) -> Result<S>
    where
        P: FnMut(&S) -> bool,
    {
        let mut states = self.subscribe();
        while let Some(state) = states.next().await {
            if predicate(&state) {
                return Ok(state);
            }
        }
        Err(Error::StreamClosed)
    }

    /// End the stream; subscribers see the end of their streams
    pub fn complete(&self) {
        self.finish(false);
    }

    /// End the stream because of a fault
    pub fn fault(&self) {
        self.finish(true);
    }

    pub fn is_completed(&self) -> bool {
        self.inner.lock().completed
    }

    pub fn is_faulted(&self) -> bool {
        self.inner.lock().faulted
    }

    /// Number of live subscribers and listeners
    pub fn observer_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len() + inner.listeners.len()
    }

    fn finish(&self, faulted: bool) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.completed {
            return;
        }
        inner.completed = true;
        inner.faulted = faulted;

        for mut listener in inner.listeners.drain(..) {
            let signal = if faulted {
                Signal::Faulted
            } else {
                Signal::Completed
            };
            listener(signal);
        }
        inner.subscribers.clear();
    }
}

impl<S> Default for StateStream<S>
where
    S: Clone + PartialEq + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
