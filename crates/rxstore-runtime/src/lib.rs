//! rxstore Runtime - Tokio-driven reactive stores
//!
//! This crate turns the building blocks of `rxstore-core` into running
//! stores: it owns the per-store registry of action types and effects, links
//! async action types to operations and drives everything on tokio.
//!
//! ## Architecture
//!
//! ```text
//! Store
//!  │
//!  ├── Registry ← action types, async action types, effect producers
//!  │
//!  ├── Fold (reducer wrapped by LinkManager) ──▶ StateStream ──▶ compose ──▶ state()
//!  │
//!  └── pipeline task
//!       └── EffectComposer (select_all)
//!            ├── registered effects
//!            └── one switch_map effect per link
//!                 └── dispatch(...) back into the ActionChannel
//! ```
//!
//! ## Key Components
//!
//! - [`Store`]: lifecycle (`init`, `dispatch`, `state`, `destroy`) of one store
//! - [`Registry`]: per-store identifiers and effect producers
//! - [`LinkConfig`] / [`LinkManager`]: START/END/ERR handling for async operations
//! - [`EffectComposer`]: merges effect streams into one feedback loop
//! - [`ActionStreamExt`] / [`SwitchMapExt`]: stream operators for effects
//! - [`StoreConfig`]: naming and diagnostics, loadable from RON

mod config;
mod effect;
mod error;
pub mod link;
mod registry;
mod store;
pub mod stream_ext;

pub use config::StoreConfig;
pub use effect::{EffectComposer, EffectContext, EffectProducer, LatestState, SampledActions};
pub use error::{Error, Result};
pub use link::{LinkConfig, LinkManager, Operation, Selector, Selectors, StateKey};
pub use registry::Registry;
pub use store::{Reducer, Store, StoreOptions};
pub use stream_ext::{ActionStreamExt, SwitchMapExt};
