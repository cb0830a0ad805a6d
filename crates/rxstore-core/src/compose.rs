//! Deriving state streams from other state streams
//!
//! Used to rebuild a store's visible state from its own folded state and the
//! states of other stores. Every derived stream is itself a [`StateStream`],
//! so it replays its latest value and suppresses consecutive duplicates.

use crate::state_stream::{Signal, StateStream};
use parking_lot::Mutex;
use std::sync::Arc;

impl<S> StateStream<S>
where
    S: Clone + PartialEq + Send + 'static,
{
    /// Project every value through `f`
    pub fn map<T, F>(&self, mut f: F) -> StateStream<T>
    where
        T: Clone + PartialEq + Send + 'static,
        F: FnMut(&S) -> T + Send + 'static,
    {
        let out = StateStream::new();
        let target = out.clone();
        self.observe(move |signal| {
            match signal {
                Signal::Next(value) => {
                    target.publish(f(value));
                }
                Signal::Completed => target.complete(),
                Signal::Faulted => target.fault(),
            }
            !target.is_completed()
        });
        out
    }

    /// Join with `other`, emitting `f(latest self, latest other)`
    ///
    /// Nothing is emitted until both inputs have a value. After that, every
    /// emission of either input produces one output. The output completes
    /// when both inputs have completed (or one completes before ever
    /// emitting) and faults as soon as either input faults.
    pub fn combine_latest<T, U, F>(&self, other: &StateStream<T>, f: F) -> StateStream<U>
    where
        T: Clone + PartialEq + Send + 'static,
        U: Clone + PartialEq + Send + 'static,
        F: FnMut(&S, &T) -> U + Send + 'static,
    {
        let out = StateStream::new();
        let join = Arc::new(Mutex::new(Join {
            left: None,
            right: None,
            left_done: false,
            right_done: false,
            project: f,
        }));

        {
            let join = join.clone();
            let target = out.clone();
            self.observe(move |signal| {
                let mut guard = join.lock();
                let j = &mut *guard;
                match signal {
                    Signal::Next(value) => {
                        j.left = Some(value.clone());
                        j.emit(&target);
                    }
                    Signal::Completed => {
                        j.left_done = true;
                        if j.right_done || j.left.is_none() {
                            target.complete();
                        }
                    }
                    Signal::Faulted => target.fault(),
                }
                !target.is_completed()
            });
        }

        let target = out.clone();
        other.observe(move |signal| {
            let mut guard = join.lock();
            let j = &mut *guard;
            match signal {
                Signal::Next(value) => {
                    j.right = Some(value.clone());
                    j.emit(&target);
                }
                Signal::Completed => {
                    j.right_done = true;
                    if j.left_done || j.right.is_none() {
                        target.complete();
                    }
                }
                Signal::Faulted => target.fault(),
            }
            !target.is_completed()
        });

        out
    }
}

struct Join<S, T, F> {
    left: Option<S>,
    right: Option<T>,
    left_done: bool,
    right_done: bool,
    project: F,
}

impl<S, T, U, F> Join<S, T, F>
where
    U: Clone + PartialEq + Send + 'static,
    F: FnMut(&S, &T) -> U,
{
    fn emit(&mut self, target: &StateStream<U>) {
        if let (Some(left), Some(right)) = (&self.left, &self.right) {
            target.publish((self.project)(left, right));
        }
    }
}

/// Join any number of streams of the same type into a stream of vectors
///
/// Same emission and completion rules as [`StateStream::combine_latest`].
/// An empty input list yields a stream that is already completed.
pub fn combine_latest_all<T>(inputs: Vec<StateStream<T>>) -> StateStream<Vec<T>>
where
    T: Clone + PartialEq + Send + 'static,
{
    let out = StateStream::new();
    if inputs.is_empty() {
        out.complete();
        return out;
    }

    let slots: Arc<Mutex<Vec<(Option<T>, bool)>>> =
        Arc::new(Mutex::new(vec![(None, false); inputs.len()]));

    for (index, input) in inputs.iter().enumerate() {
        let slots = slots.clone();
        let target = out.clone();
        input.observe(move |signal| {
            let mut slots = slots.lock();
            match signal {
                Signal::Next(value) => {
                    slots[index].0 = Some(value.clone());
                    let ready: Option<Vec<T>> =
                        slots.iter().map(|(value, _)| value.clone()).collect();
                    if let Some(values) = ready {
                        target.publish(values);
                    }
                }
                Signal::Completed => {
                    slots[index].1 = true;
                    let never_emitted = slots[index].0.is_none();
                    if never_emitted || slots.iter().all(|(_, done)| *done) {
                        target.complete();
                    }
                }
                Signal::Faulted => target.fault(),
            }
            !target.is_completed()
        });
    }

    out
}
