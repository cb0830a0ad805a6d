//! Counter Demo
//!
//! Two stores on one action channel:
//! - a counter with a synchronous effect (double the count using the state
//!   the triggering action produced), a delayed effect built on `switch_map`, and a linked async
//!   service that fills an `AsyncState` slice
//! - a household that embeds a person store's state through composition
//!
//! Run with `RUST_LOG=debug` to see store lifecycle events.

use futures::StreamExt;
use rxstore_core::{Action, ActionChannel, ActionType, AsyncActionType, AsyncState, Signal, Value};
use rxstore_runtime::{
    ActionStreamExt, LinkConfig, Selectors, Store, StoreConfig, StoreOptions, SwitchMapExt,
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Default)]
struct CounterState {
    count: i64,
    lucky: AsyncState,
}

#[derive(Debug, Clone, PartialEq)]
struct Person {
    name: String,
    age: i64,
}

#[derive(Debug, Clone, PartialEq)]
struct Household {
    address: String,
    person: Option<Person>,
}

struct CounterActions {
    increase: ActionType,
    double_increase: ActionType,
    double_later: ActionType,
    lucky: AsyncActionType,
}

/// Pretend remote service: answers after a short delay
async fn lucky_number(args: Option<Value>) -> Result<i64, String> {
    let seed = args.and_then(|v| v.as_int()).unwrap_or(1);
    tokio::time::sleep(Duration::from_millis(30)).await;
    if seed < 0 {
        Err(format!("no luck for seed {}", seed))
    } else {
        Ok(seed * 7)
    }
}

fn counter_store(channel: &ActionChannel) -> rxstore_runtime::Result<(Store<CounterState>, CounterActions)> {
    let config = StoreConfig::from_ron(r#"(name: "counter", trace_actions: true)"#)?;
    let mut store: Store<CounterState> = Store::new(channel, config);
    let actions = CounterActions {
        increase: store.register_action_type("INCREASE")?,
        double_increase: store.register_action_type("DOUBLE_INCREASE")?,
        double_later: store.register_action_type("DOUBLE_LATER")?,
        lucky: store.register_async_action_type("LUCKY")?,
    };

    // DOUBLE_INCREASE -> INCREASE by the count right after DOUBLE_INCREASE was folded
    let (trigger, increase) = (actions.double_increase.clone(), actions.increase.clone());
    store.register_effect("double", move |ctx| {
        ctx.actions_with_state()
            .filter(move |(action, _)| futures::future::ready(action.is(&trigger)))
            .map(move |(_, state)| Action::with_payload(increase.clone(), state.count))
            .boxed()
    });

    // DOUBLE_LATER -> DOUBLE_INCREASE after a delay; repeated requests restart the wait
    let (trigger, double) = (actions.double_later.clone(), actions.double_increase.clone());
    store.register_effect("double-later", move |ctx| {
        ctx.actions()
            .of_type(trigger)
            .switch_map(move |_| {
                let double = double.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Action::new(double)
                }
            })
            .boxed()
    });

    store.link(LinkConfig::new(
        actions.lucky.clone(),
        |s: &mut CounterState| &mut s.lucky,
        lucky_number,
    ))?;

    let increase = actions.increase.clone();
    let options = StoreOptions::new(CounterState::default(), move |mut state: CounterState, action: &Action| {
        if action.is(&increase) {
            state.count += action.payload.as_ref().and_then(Value::as_int).unwrap_or(1);
        }
        state
    })
    .with_selectors(Selectors::new().err(|e| Value::String(format!("service error: {}", e))));
    store.init(options)?;

    Ok((store, actions))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== rxstore Counter Demo ===\n");

    let channel = ActionChannel::new();

    // Counter: effects and a linked service
    let (counter, actions) = counter_store(&channel)?;
    counter.state().observe(|signal| {
        if let Signal::Next(state) = signal {
            println!("  counter -> count={} lucky={:?}", state.count, state.lucky);
        }
        true
    });

    counter.dispatch(Action::new(actions.increase.clone()));
    counter.dispatch(Action::with_payload(actions.increase.clone(), 2i64));
    counter.dispatch(Action::new(actions.double_increase.clone()));
    let state = counter.state().wait_for(|s| s.count == 6).await?;
    info!(count = state.count, "doubled");

    counter.dispatch(Action::new(actions.double_later.clone()));
    counter.dispatch(Action::new(actions.double_later.clone()));
    let state = counter.state().wait_for(|s| s.count == 12).await?;
    info!(count = state.count, "doubled once after delay");

    counter.dispatch(Action::with_payload(actions.lucky.start().clone(), 6i64));
    let state = counter.state().wait_for(|s| s.lucky.is_success()).await?;
    info!(lucky = ?state.lucky.data, "service answered");

    counter.dispatch(Action::with_payload(actions.lucky.start().clone(), -1i64));
    let state = counter.state().wait_for(|s| s.lucky.is_failure()).await?;
    info!(err = ?state.lucky.err, "service failed");

    // Household embeds the person store's state
    println!("\n--- Composition ---");
    let mut person: Store<Person> = Store::named(&channel, "person");
    let change_age = person.register_action_type("CHANGE_AGE")?;
    let kind = change_age.clone();
    person.init(StoreOptions::new(
        Person {
            name: "Ada".to_string(),
            age: 10,
        },
        move |state: Person, action: &Action| match action.payload.as_ref().and_then(Value::as_int) {
            Some(age) if action.is(&kind) => Person { age, ..state },
            _ => state,
        },
    ))?;

    let mut household: Store<Household> = Store::named(&channel, "household");
    let person_state = person.state();
    household.compose(move |own| {
        own.combine_latest(&person_state, |house: &Household, person: &Person| Household {
            person: Some(person.clone()),
            ..house.clone()
        })
    });
    household.init(StoreOptions::new(
        Household {
            address: "12 Elm Street".to_string(),
            person: None,
        },
        |state, _| state,
    ))?;
    println!("  household -> {:?}", household.latest());

    person.dispatch(Action::with_payload(change_age, 20i64));
    println!("  household -> {:?}", household.latest());

    household.destroy();
    person.destroy();
    counter.destroy();
    info!(live = counter.is_live(), "stores destroyed");

    println!("\n=== Demo Complete ===");
    Ok(())
}
