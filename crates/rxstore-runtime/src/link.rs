//! Async-link manager
//!
//! A link ties an [`AsyncActionType`] to an asynchronous operation and to the
//! [`AsyncState`] slice of the store's state that tracks it. For every link
//! the manager does two things:
//!
//! 1. It wraps the store's reducer so that START, END and ERR actions update
//!    the slice before the store's own reducer sees them.
//! 2. It contributes one effect that runs the operation for each START and
//!    emits END with the result or ERR with the failure. A START that arrives
//!    while a previous run is pending drops that run: only the latest one
//!    can ever reach state.

use crate::error::{Error, Result};
use crate::stream_ext::{ActionStreamExt, SwitchMapExt};
use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream};
use futures::{FutureExt, StreamExt};
use rxstore_core::{Action, ActionChannel, AsyncActionType, AsyncState, Phase, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Transforms a raw result or failure before it is stored
pub type Selector = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// The operation behind a link: START payload in, one outcome out
pub type Operation =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, std::result::Result<Value, Value>> + Send + Sync>;

/// Selects the slice of `S` a link maintains
pub type StateKey<S> = fn(&mut S) -> &mut AsyncState;

/// Data and error selectors
///
/// Used both per link and as store-wide defaults. Resolution order is the
/// link's own selector, then the store default, then the raw value. A
/// selector returning `Value::Null` leaves the raw value in place.
#[derive(Clone, Default)]
pub struct Selectors {
    pub data: Option<Selector>,
    pub err: Option<Selector>,
}

impl Selectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, selector: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.data = Some(Arc::new(selector));
        self
    }

    pub fn err(mut self, selector: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.err = Some(Arc::new(selector));
        self
    }
}

/// Registration of one linked async operation
pub struct LinkConfig<S> {
    kind: AsyncActionType,
    state_key: StateKey<S>,
    operation: Operation,
    selectors: Selectors,
}

impl<S> LinkConfig<S> {
    /// Link `kind` to a future-returning operation
    ///
    /// The operation receives the START payload. `Ok` becomes an END action
    /// and `Err` an ERR action, each carrying the raw value.
    pub fn new<F, Fut, R, E>(kind: AsyncActionType, state_key: StateKey<S>, operation: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
        R: Into<Value> + 'static,
        E: Into<Value> + 'static,
    {
        let operation: Operation = Arc::new(move |args: Option<Value>| {
            let pending = operation(args);
            async move {
                let outcome: std::result::Result<Value, Value> =
                    pending.await.map(Into::into).map_err(Into::into);
                outcome
            }
            .boxed()
        });
        Self {
            kind,
            state_key,
            operation,
            selectors: Selectors::default(),
        }
    }

    /// Link `kind` to a stream-returning operation
    ///
    /// Only the first item counts. A stream that ends without producing
    /// anything is treated as a failure carrying `Value::Null`.
    pub fn from_stream<F, St, R, E>(kind: AsyncActionType, state_key: StateKey<S>, operation: F) -> Self
    where
        F: Fn(Option<Value>) -> St + Send + Sync + 'static,
        St: Stream<Item = std::result::Result<R, E>> + Send + 'static,
        R: Into<Value> + 'static,
        E: Into<Value> + 'static,
    {
        Self::new(kind, state_key, move |args| {
            let outcomes = operation(args);
            async move {
                let outcome: std::result::Result<Value, Value> = match Box::pin(outcomes).next().await {
                    Some(Ok(data)) => Ok(data.into()),
                    Some(Err(err)) => Err(err.into()),
                    None => Err(Value::Null),
                };
                outcome
            }
        })
    }

    /// Override the data selector for this link
    pub fn data_selector(mut self, selector: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.selectors.data = Some(Arc::new(selector));
        self
    }

    /// Override the error selector for this link
    pub fn err_selector(mut self, selector: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.selectors.err = Some(Arc::new(selector));
        self
    }

    pub fn kind(&self) -> &AsyncActionType {
        &self.kind
    }
}

/// The fixed set of links of one store
pub struct LinkManager<S> {
    links: Vec<LinkConfig<S>>,
    defaults: Selectors,
}

impl<S> LinkManager<S>
where
    S: Send + 'static,
{
    pub fn new(links: Vec<LinkConfig<S>>, defaults: Selectors) -> Self {
        Self { links, defaults }
    }

    /// Check a link before it joins `existing`
    ///
    /// `owned` tells whether the triple was minted by the store's registry.
    pub fn validate(
        store: &str,
        existing: &[LinkConfig<S>],
        link: &LinkConfig<S>,
        owned: bool,
    ) -> Result<()> {
        let name = link.kind.name();
        if let Err(err) = link.kind.validate() {
            return Err(Error::invalid_link(store, name, err.to_string()));
        }
        if !owned {
            return Err(Error::invalid_link(
                store,
                name,
                "async action type was not registered with this store",
            ));
        }
        if existing.iter().any(|other| other.kind == link.kind) {
            return Err(Error::invalid_link(store, name, "async action type is already linked"));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Apply lifecycle actions to their slices, then run `reducer`
    pub fn wrap_reducer<R>(self: &Arc<Self>, reducer: R) -> impl Fn(S, &Action) -> S + Send + 'static
    where
        R: Fn(S, &Action) -> S + Send + 'static,
    {
        let manager = self.clone();
        move |mut state: S, action: &Action| {
            manager.fold_lifecycle(&mut state, action);
            reducer(state, action)
        }
    }

    /// One effect stream per link, subscribed to `channel` immediately
    pub fn effects(&self, channel: &ActionChannel) -> Vec<(String, BoxStream<'static, Action>)> {
        self.links
            .iter()
            .map(|link| {
                let name = format!("link:{}", link.kind.name());
                (name, link_effect(link, channel))
            })
            .collect()
    }

    fn fold_lifecycle(&self, state: &mut S, action: &Action) {
        for link in &self.links {
            let Some(phase) = link.kind.phase(&action.kind) else {
                continue;
            };
            let slot = (link.state_key)(state);
            match phase {
                Phase::Start => slot.begin(),
                Phase::End => {
                    let select = link.selectors.data.as_ref().or(self.defaults.data.as_ref());
                    slot.succeed(apply(select, action.payload_or_null()));
                }
                Phase::Err => {
                    let select = link.selectors.err.as_ref().or(self.defaults.err.as_ref());
                    slot.fail(apply(select, action.payload_or_null()));
                }
            }
        }
    }
}

/// `select(raw)`, or `raw` itself when there is no selector or it yields null
fn apply(selector: Option<&Selector>, raw: Value) -> Value {
    let Some(select) = selector else {
        return raw;
    };
    match select(raw.clone()) {
        Value::Null => raw,
        selected => selected,
    }
}

fn link_effect<S>(link: &LinkConfig<S>, channel: &ActionChannel) -> BoxStream<'static, Action> {
    let kind = link.kind.clone();
    let operation = link.operation.clone();
    channel
        .subscribe()
        .of_type(kind.start().clone())
        .switch_map(move |start| {
            let kind = kind.clone();
            debug!(link = %kind, "starting linked operation");
            let outcome = operation(start.payload);
            async move {
                match outcome.await {
                    Ok(data) => Action::with_payload(kind.end().clone(), data),
                    Err(err) => {
                        debug!(link = %kind, error = %err, "linked operation failed");
                        Action::with_payload(kind.err().clone(), err)
                    }
                }
            }
        })
}
