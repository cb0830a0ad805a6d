//! The fold engine
//!
//! Turns the action channel, a reducer and an initial value into a
//! [`StateStream`]. The fold is installed as a channel observer, so it runs
//! exactly once per dispatched action no matter how many parties watch the
//! resulting stream, and state is computed eagerly whether or not anybody is
//! subscribed.
//!
//! # Reducer faults
//!
//! A reducer that panics terminates the fold for good: the panic is caught at
//! the fold boundary (it never unwinds into whoever dispatched), logged, the
//! observer detaches from the channel and the state stream is faulted. Every
//! current and future subscriber loses live updates. Reducers that can fail
//! on bad input should handle it themselves and return the previous state.

use crate::{Action, ActionChannel, ObserverId, StateStream};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, trace};

/// Builder for a fold over an action channel
pub struct Fold<S, R> {
    reducer: R,
    initial: S,
    label: String,
    trace_actions: bool,
}

impl<S, R> Fold<S, R>
where
    S: Clone + PartialEq + Send + 'static,
    R: Fn(S, &Action) -> S + Send + 'static,
{
    /// Create a fold of `reducer` starting from `initial`
    pub fn new(reducer: R, initial: S) -> Self {
        Self {
            reducer,
            initial,
            label: "store".to_string(),
            trace_actions: false,
        }
    }

    /// Set the label used in log events
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Log every folded action at trace level
    pub fn trace_actions(mut self, enabled: bool) -> Self {
        self.trace_actions = enabled;
        self
    }

    /// Install on `channel`, publishing into a fresh stream
    pub fn install(self, channel: &ActionChannel) -> FoldHandle<S> {
        self.install_into(channel, StateStream::new())
    }

    /// Install on `channel`, publishing into `state`
    pub fn install_into(self, channel: &ActionChannel, state: StateStream<S>) -> FoldHandle<S> {
        let Fold {
            reducer,
            initial,
            label,
            trace_actions,
        } = self;

        let stream = state.clone();
        let mut current = initial;
        let observer = channel.observe(move |action| {
            let folded = panic::catch_unwind(AssertUnwindSafe(|| reducer(current.clone(), action)));
            let next = match folded {
                Ok(next) => next,
                Err(payload) => {
                    error!(
                        store = %label,
                        action = %action.kind,
                        reason = panic_reason(payload.as_ref()),
                        "reducer panicked; state stream terminated"
                    );
                    stream.fault();
                    return false;
                }
            };

            let changed = stream.publish(next.clone());
            if trace_actions {
                trace!(store = %label, action = %action.kind, changed, "folded action");
            }
            current = next;
            true
        });

        FoldHandle {
            channel: channel.clone(),
            observer,
            state,
        }
    }
}

/// Build a state stream folding `reducer` over `channel` from `initial`
pub fn build_state_stream<S, R>(channel: &ActionChannel, reducer: R, initial: S) -> FoldHandle<S>
where
    S: Clone + PartialEq + Send + 'static,
    R: Fn(S, &Action) -> S + Send + 'static,
{
    Fold::new(reducer, initial).install(channel)
}

/// An installed fold
pub struct FoldHandle<S> {
    channel: ActionChannel,
    observer: ObserverId,
    state: StateStream<S>,
}

impl<S> FoldHandle<S>
where
    S: Clone + PartialEq + Send + 'static,
{
    /// The folded state stream
    pub fn state(&self) -> &StateStream<S> {
        &self.state
    }

    /// Stop folding; the stream keeps its latest value
    ///
    /// Returns whether the fold was still attached.
    pub fn detach(&self) -> bool {
        self.channel.unobserve(self.observer)
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
