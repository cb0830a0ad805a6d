//! Stream operators for effect producers

use futures::future;
use futures::stream::{BoxStream, Stream};
use futures::StreamExt;
use rxstore_core::{Action, ActionType};
use std::future::Future;
use tracing::trace;

/// Filtering operators for streams of actions
pub trait ActionStreamExt: Stream<Item = Action> + Sized + Send + 'static {
    /// Keep only actions of the given kind
    fn of_type(self, kind: ActionType) -> BoxStream<'static, Action> {
        self.filter(move |action| future::ready(action.kind == kind))
            .boxed()
    }

    /// Keep only actions whose kind is one of `kinds`
    fn of_types(self, kinds: impl IntoIterator<Item = ActionType>) -> BoxStream<'static, Action> {
        let kinds: Vec<ActionType> = kinds.into_iter().collect();
        self.filter(move |action| future::ready(kinds.contains(&action.kind)))
            .boxed()
    }
}

impl<St> ActionStreamExt for St where St: Stream<Item = Action> + Sized + Send + 'static {}

/// Higher-order operators for any stream
pub trait SwitchMapExt: Stream + Sized + Send + 'static {
    /// Map each item to a future, keeping only the latest one in flight
    ///
    /// When an item arrives while the previous future is still pending, that
    /// future is dropped and its output never appears. When the source ends,
    /// the pending future (if any) still runs to completion.
    fn switch_map<F, Fut>(self, mut f: F) -> BoxStream<'static, Fut::Output>
    where
        Self::Item: Send,
        F: FnMut(Self::Item) -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send,
    {
        let mut source = self.boxed();
        let switched = async_stream::stream! {
            let mut pending: Option<std::pin::Pin<Box<Fut>>> = None;
            loop {
                let step = match pending.as_mut() {
                    Some(in_flight) => tokio::select! {
                        biased;
                        next = source.next() => Step::Next(next),
                        output = in_flight.as_mut() => Step::Ready(output),
                    },
                    None => Step::Next(source.next().await),
                };

                match step {
                    Step::Next(Some(item)) => {
                        if pending.is_some() {
                            trace!("switch_map: dropping superseded future");
                        }
                        pending = Some(Box::pin(f(item)));
                    }
                    Step::Next(None) => {
                        if let Some(in_flight) = pending.take() {
                            yield in_flight.await;
                        }
                        break;
                    }
                    Step::Ready(output) => {
                        pending = None;
                        yield output;
                    }
                }
            }
        };
        Box::pin(switched)
    }
}

impl<St> SwitchMapExt for St where St: Stream + Sized + Send + 'static {}

enum Step<I, O> {
    Next(Option<I>),
    Ready(O),
}
