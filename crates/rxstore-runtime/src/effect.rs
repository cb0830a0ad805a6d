//! Effect producers and the effect composer
//!
//! An effect producer is called once when its store initializes and returns
//! a stream of follow-up actions. The composer merges all of them and feeds
//! every emitted action back into the shared channel. Producers are
//! independent: one finishing does not stop the others, and no ordering is
//! imposed between them.

use futures::channel::mpsc::{self, UnboundedReceiver};
use futures::stream::{BoxStream, SelectAll};
use futures::StreamExt;
use parking_lot::Mutex;
use rxstore_core::{Action, ActionChannel, ActionStream, ObserverId, StateStream};
use tracing::debug;

/// A registered effect: builds the effect's action stream at `init`
pub type EffectProducer<S> = Box<dyn FnOnce(&EffectContext<S>) -> BoxStream<'static, Action> + Send>;

/// Actions paired with the store's folded state right after each one
pub type SampledActions<S> = UnboundedReceiver<(Action, S)>;

/// What an effect producer can observe
///
/// Producers should open their subscriptions while they run (not lazily
/// inside the returned stream) so that no action dispatched after `init`
/// is missed.
pub struct EffectContext<S> {
    channel: ActionChannel,
    state: StateStream<S>,
    /// Channel observers opened for producers; removed when the store stops
    observers: Mutex<Vec<ObserverId>>,
}

impl<S> EffectContext<S>
where
    S: Clone + PartialEq + Send + 'static,
{
    pub(crate) fn new(channel: ActionChannel, state: StateStream<S>) -> Self {
        Self {
            channel,
            state,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn take_observers(&self) -> Vec<ObserverId> {
        std::mem::take(&mut *self.observers.lock())
    }

    /// Subscribe to every action dispatched on the shared channel from now on
    pub fn actions(&self) -> ActionStream {
        self.channel.subscribe()
    }

    /// The store's own folded state stream
    pub fn state(&self) -> StateStream<S> {
        self.state.clone()
    }

    /// Subscribe to every action together with the state it produced
    ///
    /// The snapshot is taken synchronously during delivery, after the store
    /// has folded the action and before the next action is folded. Use this
    /// to combine an action with the state valid when it arrived.
    pub fn actions_with_state(&self) -> SampledActions<S> {
        let (tx, rx) = mpsc::unbounded();
        let state = self.state.clone();
        let id = self.channel.observe(move |action| match state.latest() {
            Some(current) => tx.unbounded_send((action.clone(), current)).is_ok(),
            None => !tx.is_closed(),
        });
        self.observers.lock().push(id);
        rx
    }

    /// A handle for reading the latest folded state later
    ///
    /// [`LatestState::get`] returns the state at the time it is called, which
    /// may already include actions dispatched after the one being handled.
    /// Per-action sampling needs [`EffectContext::actions_with_state`].
    pub fn latest(&self) -> LatestState<S> {
        LatestState {
            state: self.state.clone(),
        }
    }

    /// The latest folded state right now
    pub fn latest_state(&self) -> Option<S> {
        self.state.latest()
    }
}

/// Read access to a store's latest folded state
#[derive(Clone)]
pub struct LatestState<S> {
    state: StateStream<S>,
}

impl<S> LatestState<S>
where
    S: Clone + PartialEq + Send + 'static,
{
    pub fn get(&self) -> Option<S> {
        self.state.latest()
    }
}

/// Merges effect streams into one feedback loop
#[derive(Default)]
pub struct EffectComposer {
    merged: SelectAll<BoxStream<'static, Action>>,
}

impl EffectComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named effect stream
    pub fn add(&mut self, name: impl Into<String>, effect: BoxStream<'static, Action>) {
        let name = name.into();
        let tracked = async_stream::stream! {
            let mut effect = effect;
            while let Some(action) = effect.next().await {
                yield action;
            }
            debug!(effect = %name, "effect completed");
        };
        self.merged.push(Box::pin(tracked));
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    /// Dispatch every action any effect emits until all effects complete
    pub async fn run(mut self, channel: ActionChannel) {
        while let Some(action) = self.merged.next().await {
            channel.dispatch(action);
        }
        debug!("all effects completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use futures::FutureExt;
    use rxstore_core::ActionType;

    #[tokio::test]
    async fn test_composer_feeds_back_into_channel() {
        let channel = ActionChannel::new();
        let mut observed = channel.subscribe();

        let ping = ActionType::new("PING");
        let pong = ActionType::new("PONG");

        let mut composer = EffectComposer::new();
        composer.add(
            "finite",
            stream::iter(vec![Action::new(ping.clone())]).boxed(),
        );
        composer.add(
            "also-finite",
            stream::iter(vec![Action::new(pong.clone()), Action::new(pong.clone())]).boxed(),
        );
        assert_eq!(composer.len(), 2);

        composer.run(channel.clone()).await;

        let mut kinds = Vec::new();
        while let Ok(Some(action)) =
            tokio::time::timeout(std::time::Duration::from_millis(10), observed.next()).await
        {
            kinds.push(action.kind);
        }
        kinds.sort_by_key(|k| k.token());
        let mut expected = vec![ping, pong.clone(), pong];
        expected.sort_by_key(|k| k.token());
        assert_eq!(kinds, expected);
    }

    #[test]
    fn test_actions_paired_with_state_they_produced() {
        let channel = ActionChannel::new();
        let add = ActionType::new("ADD");
        let kind = add.clone();
        let fold = rxstore_core::build_state_stream(
            &channel,
            move |n: i64, action: &Action| if action.is(&kind) { n + 1 } else { n },
            0,
        );
        let context = EffectContext::new(channel.clone(), fold.state().clone());
        let mut sampled = context.actions_with_state();

        channel.dispatch(Action::new(add.clone()));
        channel.dispatch(Action::new(ActionType::new("OTHER")));
        channel.dispatch(Action::new(add.clone()));

        let counts: Vec<i64> = std::iter::from_fn(|| sampled.next().now_or_never().flatten())
            .map(|(_, n)| n)
            .collect();
        assert_eq!(counts, vec![1, 1, 2]);
        assert_eq!(context.take_observers().len(), 1);

        drop(sampled);
        channel.dispatch(Action::new(add));
        assert_eq!(channel.observer_count(), 1);
    }

    #[tokio::test]
    async fn test_one_effect_finishing_does_not_stop_others() {
        let channel = ActionChannel::new();
        let trigger = ActionType::new("TRIGGER");
        let echo = ActionType::new("ECHO");

        let mut composer = EffectComposer::new();
        composer.add("done-immediately", stream::empty().boxed());

        let echo_kind = echo.clone();
        let trigger_kind = trigger.clone();
        composer.add(
            "echo",
            channel
                .subscribe()
                .filter(move |a| futures::future::ready(a.is(&trigger_kind)))
                .map(move |_| Action::new(echo_kind.clone()))
                .boxed(),
        );

        let mut observed = channel.subscribe();
        let task = tokio::spawn(composer.run(channel.clone()));

        channel.dispatch(Action::new(trigger.clone()));
        assert_eq!(observed.next().await.map(|a| a.kind), Some(trigger));
        assert_eq!(observed.next().await.map(|a| a.kind), Some(echo));

        task.abort();
    }
}
