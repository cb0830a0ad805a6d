//! Identifier registry
//!
//! Each store owns one [`Registry`]: the table of action types, async action
//! types and effect producers it declares. The table is filled in before
//! `init` and consulted once when the store starts. Identifiers are minted
//! per registration, so the same name registered by two stores yields two
//! different types.

use crate::effect::{EffectContext, EffectProducer};
use futures::stream::BoxStream;
use indexmap::IndexMap;
use rxstore_core::{Action, ActionType, AsyncActionType, Error, Result};

/// Declarations of one store
pub struct Registry<S> {
    store: String,
    types: IndexMap<String, ActionType>,
    async_types: IndexMap<String, AsyncActionType>,
    effects: Vec<(String, EffectProducer<S>)>,
}

impl<S> Registry<S> {
    /// Create an empty registry for the named store
    pub fn new(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            types: IndexMap::new(),
            async_types: IndexMap::new(),
            effects: Vec::new(),
        }
    }

    /// Register a plain action type
    ///
    /// Names are unique per store across plain and async types.
    pub fn register_action_type(&mut self, name: &str) -> Result<ActionType> {
        self.ensure_unused(name)?;
        let kind = ActionType::new(format!("{}/{}", self.store, name));
        self.types.insert(name.to_string(), kind.clone());
        Ok(kind)
    }

    /// Register an async action type (a START/END/ERR triple)
    pub fn register_async_action_type(&mut self, name: &str) -> Result<AsyncActionType> {
        self.ensure_unused(name)?;
        let kind = AsyncActionType::new(format!("{}/{}", self.store, name));
        self.async_types.insert(name.to_string(), kind.clone());
        Ok(kind)
    }

    /// Register an effect producer
    pub fn register_effect<F>(&mut self, name: impl Into<String>, producer: F)
    where
        F: FnOnce(&EffectContext<S>) -> BoxStream<'static, Action> + Send + 'static,
    {
        self.effects.push((name.into(), Box::new(producer)));
    }

    /// Look up a plain action type by the name it was registered under
    pub fn action_type(&self, name: &str) -> Option<&ActionType> {
        self.types.get(name)
    }

    /// Look up an async action type by the name it was registered under
    pub fn async_action_type(&self, name: &str) -> Option<&AsyncActionType> {
        self.async_types.get(name)
    }

    /// Check whether `kind` was minted by this registry
    pub fn owns(&self, kind: &AsyncActionType) -> bool {
        self.async_types.values().any(|registered| registered == kind)
    }

    /// Number of registered effect producers
    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub(crate) fn take_effects(&mut self) -> Vec<(String, EffectProducer<S>)> {
        std::mem::take(&mut self.effects)
    }

    fn ensure_unused(&self, name: &str) -> Result<()> {
        if self.types.contains_key(name) || self.async_types.contains_key(name) {
            return Err(Error::DuplicateActionType(format!("{}/{}", self.store, name)));
        }
        Ok(())
    }
}
