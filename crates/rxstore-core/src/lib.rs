//! rxstore Core - Actions, channels and folded state streams
//!
//! This crate provides the runtime-agnostic half of rxstore:
//! - Opaque action identifiers (`ActionType`, `AsyncActionType`)
//! - Dynamic payloads (`Value`, `ValueMap`) and actions (`Action`)
//! - The shared, multicast `ActionChannel`
//! - Replay-last-value `StateStream`s and their composition
//! - The fold engine that turns actions into state
//! - The `AsyncState` slice maintained for linked async operations
//!
//! ## Data Flow
//!
//! ```text
//! dispatch(action) ──▶ ActionChannel ──▶ Fold (reducer) ──▶ StateStream ──▶ observers
//!                          │
//!                          └──▶ subscribers (effects, async links) ──▶ dispatch(...)
//! ```
//!
//! Driving effects and async operations needs an executor; that half lives
//! in `rxstore-runtime`.
//!
//! ## Example
//!
//! ```
//! use rxstore_core::{build_state_stream, Action, ActionChannel, ActionType};
//!
//! let channel = ActionChannel::new();
//! let increase = ActionType::new("INCREASE");
//!
//! let kind = increase.clone();
//! let fold = build_state_stream(
//!     &channel,
//!     move |count: i64, action: &Action| if action.is(&kind) { count + 1 } else { count },
//!     0,
//! );
//!
//! channel.dispatch(Action::new(increase.clone()));
//! channel.dispatch(Action::new(increase));
//! assert_eq!(fold.state().latest(), Some(2));
//! ```

mod action;
mod async_state;
mod channel;
mod compose;
mod error;
pub mod fold;
mod identity;
mod state_stream;
mod value;

pub use action::Action;
pub use async_state::AsyncState;
pub use channel::{ActionChannel, ActionStream, ObserverId};
pub use compose::combine_latest_all;
pub use error::{Error, Result};
pub use fold::{build_state_stream, Fold, FoldHandle};
pub use identity::{ActionType, AsyncActionType, Phase};
pub use state_stream::{Signal, StateStream, StateSubscription};
pub use value::{Value, ValueMap};
