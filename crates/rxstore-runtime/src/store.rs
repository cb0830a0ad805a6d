//! Store - Lifecycle of one reactive store
//!
//! A [`Store`] is configured in two phases. Before `init` it collects
//! declarations: action types, effect producers and async links. `init`
//! then installs the fold, starts the merged effect pipeline on the current
//! tokio runtime and dispatches the store's initialization action. After
//! `init` the store only dispatches, exposes state and can be destroyed.
//!
//! ## Ordering
//!
//! Every effect subscription is opened before the initialization action is
//! dispatched, so effects observe it. The fold is eager: the post-init state
//! is available from [`Store::state`] right after `init` returns, even if
//! nobody was subscribed while it was computed.
//!
//! ```
//! use rxstore_core::{Action, ActionChannel};
//! use rxstore_runtime::{Store, StoreOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> rxstore_runtime::Result<()> {
//! let channel = ActionChannel::new();
//! let mut store: Store<i64> = Store::named(&channel, "counter");
//! let increase = store.register_action_type("INCREASE")?;
//!
//! let kind = increase.clone();
//! store.init(StoreOptions::new(0i64, move |count, action: &Action| {
//!     if action.is(&kind) { count + 1 } else { count }
//! }))?;
//!
//! store.dispatch(Action::new(increase));
//! assert_eq!(store.latest(), Some(1));
//! # Ok(())
//! # }
//! ```

use crate::config::StoreConfig;
use crate::effect::{EffectComposer, EffectContext};
use crate::error::{Error, Result};
use crate::link::{LinkConfig, LinkManager, Selectors};
use crate::registry::Registry;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use rxstore_core::{
    Action, ActionChannel, ActionType, AsyncActionType, Fold, FoldHandle, ObserverId, Signal, StateStream,
};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, trace, warn, Instrument};

/// Boxed reducer as stored in [`StoreOptions`]
pub type Reducer<S> = Box<dyn Fn(S, &Action) -> S + Send + Sync>;

/// Construction-time options consumed by [`Store::init`]
pub struct StoreOptions<S> {
    /// State before the initialization action is folded
    pub initial_state: S,
    /// Pure fold function
    pub reducer: Reducer<S>,
    /// Store-wide default selectors for linked operations
    pub selectors: Selectors,
}

impl<S> StoreOptions<S> {
    pub fn new<R>(initial_state: S, reducer: R) -> Self
    where
        R: Fn(S, &Action) -> S + Send + Sync + 'static,
    {
        Self {
            initial_state,
            reducer: Box::new(reducer),
            selectors: Selectors::default(),
        }
    }

    /// Set the store-wide default selectors
    pub fn with_selectors(mut self, selectors: Selectors) -> Self {
        self.selectors = selectors;
        self
    }
}

/// The parts of a store that exist only while it is live
struct Running<S>
where
    S: Clone + PartialEq + Send + 'static,
{
    fold: FoldHandle<S>,
    pipeline: JoinHandle<()>,
    /// Channel observers opened by effect producers
    samplers: Vec<ObserverId>,
}

/// One reactive store over a shared [`ActionChannel`]
pub struct Store<S>
where
    S: Clone + PartialEq + Send + 'static,
{
    config: StoreConfig,
    channel: ActionChannel,
    registry: Registry<S>,
    /// Links accepted so far; handed to the link manager at `init`
    links: Vec<LinkConfig<S>>,
    /// The folded state
    own: StateStream<S>,
    /// What observers see: `own`, unless replaced by [`Store::compose`]
    exposed: StateStream<S>,
    init_type: ActionType,
    initialized: bool,
    running: Mutex<Option<Running<S>>>,
}

impl<S> Store<S>
where
    S: Clone + PartialEq + Send + 'static,
{
    /// Create a store on `channel`
    pub fn new(channel: &ActionChannel, config: StoreConfig) -> Self {
        let own = StateStream::new();
        let init_type = ActionType::new(format!("{}/@@INIT", config.name));
        Self {
            registry: Registry::new(config.name.clone()),
            channel: channel.clone(),
            links: Vec::new(),
            exposed: own.clone(),
            own,
            init_type,
            initialized: false,
            running: Mutex::new(None),
            config,
        }
    }

    /// Create a store with default settings and the given name
    pub fn named(channel: &ActionChannel, name: impl Into<String>) -> Self {
        Self::new(channel, StoreConfig::named(name))
    }

    pub fn register_action_type(&mut self, name: &str) -> Result<ActionType> {
        Ok(self.registry.register_action_type(name)?)
    }

    pub fn register_async_action_type(&mut self, name: &str) -> Result<AsyncActionType> {
        Ok(self.registry.register_async_action_type(name)?)
    }

    /// Register an effect producer, called once at `init`
    pub fn register_effect<F>(&mut self, name: impl Into<String>, producer: F)
    where
        F: FnOnce(&EffectContext<S>) -> BoxStream<'static, Action> + Send + 'static,
    {
        self.registry.register_effect(name, producer);
    }

    /// Link an async action type to an operation
    ///
    /// A rejected link is logged and returned as [`Error::InvalidLink`]; the
    /// store keeps working without it.
    pub fn link(&mut self, link: LinkConfig<S>) -> Result<()> {
        if self.initialized {
            return Err(Error::AlreadyInitialized(self.config.name.clone()));
        }
        let owned = self.registry.owns(link.kind());
        if let Err(err) = LinkManager::validate(&self.config.name, &self.links, &link, owned) {
            warn!(store = %self.config.name, error = %err, "link rejected");
            return Err(err);
        }
        self.links.push(link);
        Ok(())
    }

    /// Start the store
    ///
    /// Must run inside a tokio runtime. A store can be initialized once.
    pub fn init(&mut self, options: StoreOptions<S>) -> Result<()> {
        if self.initialized {
            return Err(Error::AlreadyInitialized(self.config.name.clone()));
        }
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime(self.config.name.clone()))?;
        self.initialized = true;

        let StoreOptions {
            initial_state,
            reducer,
            selectors,
        } = options;

        let links = Arc::new(LinkManager::new(std::mem::take(&mut self.links), selectors));
        let fold = Fold::new(links.wrap_reducer(reducer), initial_state)
            .label(self.config.name.clone())
            .trace_actions(self.config.trace_actions)
            .install_into(&self.channel, self.own.clone());

        let context = EffectContext::new(self.channel.clone(), self.own.clone());
        let mut composer = EffectComposer::new();
        for (name, producer) in self.registry.take_effects() {
            composer.add(name, producer(&context));
        }
        for (name, effect) in links.effects(&self.channel) {
            composer.add(name, effect);
        }
        let samplers = context.take_observers();

        debug!(
            store = %self.config.name,
            effects = composer.len(),
            links = links.len(),
            "store initialized"
        );
        let span = info_span!("store", name = %self.config.name);
        let pipeline = runtime.spawn(composer.run(self.channel.clone()).instrument(span));

        // a faulted fold never recovers, so its effects stop with it
        let abort = pipeline.abort_handle();
        let name = self.config.name.clone();
        self.own.observe(move |signal| match signal {
            Signal::Next(_) => true,
            Signal::Completed => false,
            Signal::Faulted => {
                warn!(store = %name, "state stream faulted; effects stopped");
                abort.abort();
                false
            }
        });

        *self.running.lock() = Some(Running {
            fold,
            pipeline,
            samplers,
        });

        self.channel.dispatch(Action::new(self.init_type.clone()));
        Ok(())
    }

    /// Push an action into the shared channel
    pub fn dispatch(&self, action: Action) {
        trace!(store = %self.config.name, action = %action.kind, "dispatch");
        self.channel.dispatch(action);
    }

    /// The exposed state stream
    pub fn state(&self) -> StateStream<S> {
        self.exposed.clone()
    }

    /// The folded state stream, ignoring any composition
    pub fn own_state(&self) -> StateStream<S> {
        self.own.clone()
    }

    /// Latest exposed state
    pub fn latest(&self) -> Option<S> {
        self.exposed.latest()
    }

    /// Replace the exposed state stream with a function of the folded one
    ///
    /// ```
    /// use rxstore_core::ActionChannel;
    /// use rxstore_runtime::{Store, StoreOptions};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> rxstore_runtime::Result<()> {
    /// let channel = ActionChannel::new();
    /// let mut child: Store<i64> = Store::named(&channel, "child");
    /// child.init(StoreOptions::new(10i64, |age, _| age))?;
    ///
    /// let mut parent: Store<(i64, i64)> = Store::named(&channel, "parent");
    /// let child_age = child.state();
    /// parent.compose(move |own| own.combine_latest(&child_age, |(count, _), age| (*count, *age)));
    /// parent.init(StoreOptions::new((0i64, 0i64), |state, _| state))?;
    ///
    /// assert_eq!(parent.latest(), Some((0, 10)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn compose<F>(&mut self, build: F)
    where
        F: FnOnce(&StateStream<S>) -> StateStream<S>,
    {
        self.exposed = build(&self.own);
    }

    /// Stop folding and release the effect pipeline
    ///
    /// In-flight linked operations are dropped. A store whose reducer
    /// panicked has already lost its effects; `destroy` still detaches it.
    /// Calling it again, or before `init`, does nothing. The state stream
    /// keeps its latest value.
    pub fn destroy(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        running.pipeline.abort();
        running.fold.detach();
        for id in running.samplers {
            self.channel.unobserve(id);
        }
        debug!(store = %self.config.name, "store destroyed");
    }

    /// Whether the store is initialized and not destroyed
    pub fn is_live(&self) -> bool {
        self.running.lock().is_some()
    }

    /// The action type dispatched by `init`
    pub fn init_action_type(&self) -> &ActionType {
        &self.init_type
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }
}

impl<S> Drop for Store<S>
where
    S: Clone + PartialEq + Send + 'static,
{
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_ext::{ActionStreamExt, SwitchMapExt};
    use futures::{FutureExt, StreamExt};
    use rxstore_core::{AsyncState, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Counter {
        count: i64,
        fetch: AsyncState,
    }

    struct CounterTypes {
        increase: ActionType,
        double: ActionType,
        fetch: AsyncActionType,
    }

    /// Sleeps for the START payload in milliseconds; negative payloads fail
    async fn delayed(args: Option<Value>) -> std::result::Result<i64, String> {
        let millis = args.and_then(|v| v.as_int()).unwrap_or(0);
        sleep(Duration::from_millis(millis.unsigned_abs())).await;
        if millis < 0 {
            Err(format!("failed after {}ms", -millis))
        } else {
            Ok(millis)
        }
    }

    fn counter_store(channel: &ActionChannel, initial: i64) -> (Store<Counter>, CounterTypes) {
        let mut store: Store<Counter> = Store::named(channel, "counter");
        let types = CounterTypes {
            increase: store.register_action_type("INCREASE").unwrap(),
            double: store.register_action_type("DOUBLE_INCREASE").unwrap(),
            fetch: store.register_async_action_type("FETCH").unwrap(),
        };

        let (increase, double) = (types.increase.clone(), types.double.clone());
        store.register_effect("double", move |ctx| {
            ctx.actions_with_state()
                .filter(move |(action, _)| futures::future::ready(action.is(&double)))
                .map(move |(_, state)| Action::with_payload(increase.clone(), state.count))
                .boxed()
        });
        store
            .link(LinkConfig::new(types.fetch.clone(), |s: &mut Counter| &mut s.fetch, delayed))
            .unwrap();

        let increase = types.increase.clone();
        store
            .init(StoreOptions::new(
                Counter {
                    count: initial,
                    ..Counter::default()
                },
                move |mut state: Counter, action: &Action| {
                    if action.is(&increase) {
                        state.count += action.payload.as_ref().and_then(Value::as_int).unwrap_or(1);
                    }
                    state
                },
            ))
            .unwrap();
        (store, types)
    }

    async fn wait_for<S, P>(store: &Store<S>, predicate: P) -> S
    where
        S: Clone + PartialEq + Send + 'static,
        P: FnMut(&S) -> bool,
    {
        timeout(Duration::from_secs(5), store.state().wait_for(predicate))
            .await
            .expect("timed out waiting for state")
            .expect("state stream closed")
    }

    #[tokio::test]
    async fn test_init_state_available_immediately() {
        let channel = ActionChannel::new();
        let mut seen = channel.subscribe();
        let (store, _) = counter_store(&channel, 3);

        assert!(store.is_live());
        assert_eq!(store.latest().map(|s| s.count), Some(3));
        assert_eq!(seen.next().await.map(|a| a.kind), Some(store.init_action_type().clone()));
    }

    #[tokio::test]
    async fn test_fold_and_replay_latest() {
        let channel = ActionChannel::new();
        let (store, types) = counter_store(&channel, 0);

        for _ in 0..3 {
            store.dispatch(Action::new(types.increase.clone()));
        }

        let mut late = store.state().subscribe();
        assert_eq!(late.next().await.map(|s| s.count), Some(3));
        assert!(late.next().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_lifecycle_success() {
        let channel = ActionChannel::new();
        let (store, types) = counter_store(&channel, 0);

        store.dispatch(Action::with_payload(types.fetch.start().clone(), 10i64));
        let loading = store.latest().unwrap();
        assert_eq!(loading.fetch, AsyncState { loading: true, data: None, err: None });

        let done = wait_for(&store, |s| s.fetch.is_success()).await;
        assert_eq!(done.fetch, AsyncState::with_data(Value::Int(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_lifecycle_failure_clears_data() {
        let channel = ActionChannel::new();
        let (store, types) = counter_store(&channel, 0);

        store.dispatch(Action::with_payload(types.fetch.start().clone(), 5i64));
        wait_for(&store, |s| s.fetch.is_success()).await;

        store.dispatch(Action::with_payload(types.fetch.start().clone(), -5i64));
        assert_eq!(store.latest().unwrap().fetch.data, Some(Value::Int(5)));

        let failed = wait_for(&store, |s| s.fetch.is_failure()).await;
        assert_eq!(
            failed.fetch,
            AsyncState {
                loading: false,
                data: None,
                err: Some(Value::from("failed after 5ms")),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_start_never_reaches_state() {
        let channel = ActionChannel::new();
        let (store, types) = counter_store(&channel, 0);
        let mut ends = channel.subscribe().of_type(types.fetch.end().clone());

        store.dispatch(Action::with_payload(types.fetch.start().clone(), 50i64));
        sleep(Duration::from_millis(5)).await;
        store.dispatch(Action::with_payload(types.fetch.start().clone(), 10i64));

        let done = wait_for(&store, |s| s.fetch.is_success()).await;
        assert_eq!(done.fetch.data, Some(Value::Int(10)));

        sleep(Duration::from_millis(100)).await;
        assert_eq!(ends.next().await.and_then(|a| a.payload), Some(Value::Int(10)));
        assert!(ends.next().now_or_never().is_none());
        assert_eq!(store.latest().unwrap().fetch.data, Some(Value::Int(10)));
    }

    #[tokio::test]
    async fn test_effect_feedback_uses_latest_state() {
        let channel = ActionChannel::new();
        let (store, types) = counter_store(&channel, 5);

        store.dispatch(Action::new(types.double.clone()));
        let doubled = wait_for(&store, |s| s.count == 10).await;
        assert_eq!(doubled.count, 10);
    }

    #[tokio::test]
    async fn test_effect_samples_state_when_action_arrives() {
        let channel = ActionChannel::new();
        let (store, types) = counter_store(&channel, 5);

        // both are folded before the effect task runs
        store.dispatch(Action::new(types.double.clone()));
        store.dispatch(Action::with_payload(types.increase.clone(), 1i64));
        assert_eq!(store.latest().map(|s| s.count), Some(6));

        let settled = wait_for(&store, |s| s.count != 6).await;
        assert_eq!(settled.count, 11);
    }

    #[tokio::test]
    async fn test_state_listener_can_dispatch() {
        let channel = ActionChannel::new();
        let (store, types) = counter_store(&channel, 0);
        let logged = Arc::new(Mutex::new(Vec::new()));
        let log = logged.clone();
        store.state().observe(move |signal| {
            if let Signal::Next(state) = signal {
                log.lock().push(state.count);
            }
            true
        });

        let (increase, sink) = (types.increase.clone(), channel.clone());
        store.state().observe(move |signal| {
            if let Signal::Next(state) = signal {
                if state.count == 1 {
                    sink.dispatch(Action::with_payload(increase.clone(), 10i64));
                }
            }
            true
        });

        store.dispatch(Action::new(types.increase.clone()));
        assert_eq!(store.latest().map(|s| s.count), Some(11));
        assert_eq!(*logged.lock(), vec![0, 1, 11]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_effect_with_switch_map() {
        let channel = ActionChannel::new();
        let mut store: Store<i64> = Store::named(&channel, "delayed");
        let add = store.register_action_type("ADD").unwrap();
        let add_later = store.register_action_type("ADD_LATER").unwrap();

        let kind = add.clone();
        store.register_effect("add-later", move |ctx| {
            ctx.actions()
                .of_type(add_later.clone())
                .switch_map(move |_| {
                    let kind = kind.clone();
                    async move {
                        sleep(Duration::from_millis(20)).await;
                        Action::new(kind)
                    }
                })
                .boxed()
        });
        let kind = add.clone();
        store
            .init(StoreOptions::new(0i64, move |n, action: &Action| {
                if action.is(&kind) {
                    n + 1
                } else {
                    n
                }
            }))
            .unwrap();

        let trigger = store.registry().action_type("ADD_LATER").unwrap().clone();
        store.dispatch(Action::new(trigger.clone()));
        store.dispatch(Action::new(trigger));

        assert_eq!(wait_for(&store, |n| *n == 1).await, 1);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(store.latest(), Some(1));
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Child {
        age: i64,
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Parent {
        count: i64,
        child: Child,
    }

    #[tokio::test]
    async fn test_parent_embeds_child_state() {
        let channel = ActionChannel::new();

        let mut child: Store<Child> = Store::named(&channel, "child");
        let change_age = child.register_action_type("CHANGE_AGE").unwrap();
        let kind = change_age.clone();
        child
            .init(StoreOptions::new(Child { age: 10 }, move |state: Child, action: &Action| {
                match (action.is(&kind), action.payload.as_ref().and_then(Value::as_int)) {
                    (true, Some(age)) => Child { age },
                    _ => state,
                }
            }))
            .unwrap();

        let parent_folds = Arc::new(AtomicUsize::new(0));
        let mut parent: Store<Parent> = Store::named(&channel, "parent");
        let child_state = child.state();
        parent.compose(move |own| {
            own.combine_latest(&child_state, |parent: &Parent, child: &Child| Parent {
                child: child.clone(),
                ..parent.clone()
            })
        });
        let folds = parent_folds.clone();
        parent
            .init(StoreOptions::new(Parent::default(), move |state: Parent, _: &Action| {
                folds.fetch_add(1, Ordering::SeqCst);
                state
            }))
            .unwrap();
        assert_eq!(parent.latest().map(|p| p.child.age), Some(10));

        child.dispatch(Action::with_payload(change_age, 20i64));

        let exposed = parent.latest().unwrap();
        assert_eq!(exposed.child.age, 20);
        assert_eq!(exposed.count, 0);
        // the parent's own folded state never learns about the child
        assert_eq!(parent.own_state().latest(), Some(Parent::default()));
        assert!(parent_folds.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selector_precedence_across_links() {
        #[derive(Debug, Clone, PartialEq, Default)]
        struct Slices {
            own: AsyncState,
            shared: AsyncState,
            raw: AsyncState,
        }

        let channel = ActionChannel::new();
        let mut store: Store<Slices> = Store::named(&channel, "selectors");
        let own = store.register_async_action_type("OWN").unwrap();
        let shared = store.register_async_action_type("SHARED").unwrap();
        let raw = store.register_async_action_type("RAW").unwrap();

        store
            .link(
                LinkConfig::new(own.clone(), |s: &mut Slices| &mut s.own, |_| async {
                    Ok::<_, Value>(1i64)
                })
                .data_selector(|v| Value::String(format!("link:{}", v))),
            )
            .unwrap();
        store
            .link(LinkConfig::new(shared.clone(), |s: &mut Slices| &mut s.shared, |_| async {
                Ok::<_, Value>(2i64)
            }))
            .unwrap();
        store
            .link(LinkConfig::new(raw.clone(), |s: &mut Slices| &mut s.raw, |_| async {
                Err::<Value, _>(3i64)
            }))
            .unwrap();

        let defaults = Selectors::new().data(|v| Value::String(format!("default:{}", v)));
        store
            .init(StoreOptions::new(Slices::default(), |s, _| s).with_selectors(defaults))
            .unwrap();

        for kind in [&own, &shared, &raw] {
            store.dispatch(Action::new(kind.start().clone()));
        }

        let settled = wait_for(&store, |s| {
            s.own.is_success() && s.shared.is_success() && s.raw.is_failure()
        })
        .await;
        assert_eq!(settled.own.data, Some(Value::from("link:1")));
        assert_eq!(settled.shared.data, Some(Value::from("default:2")));
        assert_eq!(settled.raw.err, Some(Value::Int(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_err_selector_precedence_across_links() {
        #[derive(Debug, Clone, PartialEq, Default)]
        struct Slices {
            own: AsyncState,
            shared: AsyncState,
            raw: AsyncState,
        }

        let channel = ActionChannel::new();
        let mut store: Store<Slices> = Store::named(&channel, "err-selectors");
        let own = store.register_async_action_type("OWN").unwrap();
        let shared = store.register_async_action_type("SHARED").unwrap();
        let raw = store.register_async_action_type("RAW").unwrap();

        store
            .link(
                LinkConfig::new(own.clone(), |s: &mut Slices| &mut s.own, |_| async {
                    Err::<Value, _>(1i64)
                })
                .err_selector(|v| Value::String(format!("link:{}", v))),
            )
            .unwrap();
        store
            .link(LinkConfig::new(shared.clone(), |s: &mut Slices| &mut s.shared, |_| async {
                Err::<Value, _>(2i64)
            }))
            .unwrap();
        store
            .link(LinkConfig::new(raw.clone(), |s: &mut Slices| &mut s.raw, |_| async {
                Ok::<_, Value>(3i64)
            }))
            .unwrap();

        let defaults = Selectors::new().err(|v| Value::String(format!("default:{}", v)));
        store
            .init(StoreOptions::new(Slices::default(), |s, _| s).with_selectors(defaults))
            .unwrap();

        for kind in [&own, &shared, &raw] {
            store.dispatch(Action::new(kind.start().clone()));
        }

        let settled = wait_for(&store, |s| {
            s.own.is_failure() && s.shared.is_failure() && s.raw.is_success()
        })
        .await;
        assert_eq!(settled.own.err, Some(Value::from("link:1")));
        assert_eq!(settled.shared.err, Some(Value::from("default:2")));
        assert_eq!(settled.raw.data, Some(Value::Int(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_selector_returning_null_keeps_raw_value() {
        let channel = ActionChannel::new();
        let mut store: Store<AsyncState> = Store::named(&channel, "fallback");
        let get = store.register_async_action_type("GET").unwrap();
        store
            .link(
                LinkConfig::new(get.clone(), |s: &mut AsyncState| s, |_| async { Ok::<_, Value>(42i64) })
                    .data_selector(|v| v.get("missing").cloned().unwrap_or(Value::Null)),
            )
            .unwrap();
        store.init(StoreOptions::new(AsyncState::new(), |s, _| s)).unwrap();

        store.dispatch(Action::new(get.start().clone()));
        let done = wait_for(&store, AsyncState::is_success).await;
        assert_eq!(done, AsyncState::with_data(Value::Int(42)));
    }

    #[tokio::test]
    async fn test_invalid_link_is_inert() {
        let channel = ActionChannel::new();
        let mut store: Store<AsyncState> = Store::named(&channel, "strict");
        let foreign = AsyncActionType::new("elsewhere/FETCH");

        let rejected = store.link(LinkConfig::new(foreign.clone(), |s: &mut AsyncState| s, |_| async {
            Ok::<_, Value>(Value::Null)
        }));
        assert!(matches!(rejected, Err(Error::InvalidLink { .. })));

        store.init(StoreOptions::new(AsyncState::new(), |s, _| s)).unwrap();
        store.dispatch(Action::new(foreign.start().clone()));
        assert_eq!(store.latest(), Some(AsyncState::new()));
    }

    #[tokio::test]
    async fn test_reducer_panic_is_local_to_store() {
        let channel = ActionChannel::new();
        let mut fragile: Store<i64> = Store::named(&channel, "fragile");
        let boom = fragile.register_action_type("BOOM").unwrap();
        let kind = boom.clone();
        fragile
            .init(StoreOptions::new(0i64, move |n, action: &Action| {
                if action.is(&kind) {
                    panic!("boom");
                }
                n
            }))
            .unwrap();

        let (healthy, types) = counter_store(&channel, 0);

        fragile.dispatch(Action::new(boom));
        healthy.dispatch(Action::new(types.increase.clone()));

        assert!(fragile.state().is_faulted());
        assert_eq!(healthy.latest().map(|s| s.count), Some(1));
    }

    #[tokio::test]
    async fn test_reducer_panic_stops_effects() {
        let channel = ActionChannel::new();
        let mut fragile: Store<i64> = Store::named(&channel, "fragile");
        let boom = fragile.register_action_type("BOOM").unwrap();
        let ping = fragile.register_action_type("PING").unwrap();
        let pong = fragile.register_action_type("PONG").unwrap();

        let (trigger, reply) = (ping.clone(), pong.clone());
        fragile.register_effect("echo", move |ctx| {
            ctx.actions()
                .of_type(trigger)
                .map(move |_| Action::new(reply.clone()))
                .boxed()
        });
        let kind = boom.clone();
        fragile
            .init(StoreOptions::new(0i64, move |n, action: &Action| {
                if action.is(&kind) {
                    panic!("boom");
                }
                n
            }))
            .unwrap();

        let mut pongs = channel.subscribe().of_type(pong);
        fragile.dispatch(Action::new(ping.clone()));
        assert!(timeout(Duration::from_secs(1), pongs.next()).await.is_ok());

        fragile.dispatch(Action::new(boom));
        tokio::task::yield_now().await;
        fragile.dispatch(Action::new(ping));
        assert!(timeout(Duration::from_millis(50), pongs.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent_and_stops_folding() {
        let channel = ActionChannel::new();
        let (store, types) = counter_store(&channel, 0);
        store.dispatch(Action::new(types.increase.clone()));

        store.destroy();
        store.destroy();
        assert!(!store.is_live());

        store.dispatch(Action::new(types.increase.clone()));
        assert_eq!(store.latest().map(|s| s.count), Some(1));
        assert_eq!(channel.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_init_twice_rejected() {
        let channel = ActionChannel::new();
        let (mut store, _) = counter_store(&channel, 0);

        let again = store.init(StoreOptions::new(Counter::default(), |s, _| s));
        assert!(matches!(again, Err(Error::AlreadyInitialized(name)) if name == "counter"));

        let late_link = store.link(LinkConfig::new(AsyncActionType::new("X"), |s: &mut Counter| &mut s.fetch, delayed));
        assert!(matches!(late_link, Err(Error::AlreadyInitialized(_))));
    }

    #[test]
    fn test_init_outside_runtime() {
        let channel = ActionChannel::new();
        let mut store: Store<i64> = Store::named(&channel, "orphan");

        let result = store.init(StoreOptions::new(0, |n, _| n));
        assert!(matches!(result, Err(Error::NoRuntime(_))));
        assert!(!store.is_live());
    }

    #[tokio::test]
    async fn test_drop_detaches_fold() {
        let channel = ActionChannel::new();
        {
            let _store = counter_store(&channel, 0);
            // the fold and the "double" effect's sampler
            assert_eq!(channel.observer_count(), 2);
        }
        assert_eq!(channel.observer_count(), 0);
    }
}
