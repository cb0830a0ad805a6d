//! Identity tokens for action types

use crate::error::{Error, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of fresh tokens, shared by every registry in the process
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a kind of action
///
/// Each call to [`ActionType::new`] mints a new token, so two types created
/// from the same name never compare equal. Equality and hashing look at the
/// token only; the name is a label for logs and debugging.
#[derive(Clone)]
pub struct ActionType {
    token: u64,
    name: Arc<str>,
}

impl ActionType {
    /// Mint a new action type
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
        }
    }

    /// Get the label this type was minted with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the raw token
    pub fn token(&self) -> u64 {
        self.token
    }
}

impl PartialEq for ActionType {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl Eq for ActionType {}

impl Hash for ActionType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.token.hash(state);
    }
}

impl fmt::Debug for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionType({}#{})", self.name, self.token)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Phase of an asynchronous operation's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The operation was requested
    Start,
    /// The operation produced a result
    End,
    /// The operation failed
    Err,
}

/// The START/END/ERR triple identifying one asynchronous operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AsyncActionType {
    name: Arc<str>,
    start: ActionType,
    end: ActionType,
    err: ActionType,
}

impl AsyncActionType {
    /// Mint a fresh triple, labelled `name/START`, `name/END` and `name/ERR`
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        Self {
            start: ActionType::new(format!("{}/START", name)),
            end: ActionType::new(format!("{}/END", name)),
            err: ActionType::new(format!("{}/ERR", name)),
            name,
        }
    }

    /// Assemble a triple from existing tokens
    ///
    /// Nothing is checked here; call [`AsyncActionType::validate`] before
    /// relying on the triple.
    pub fn from_parts(
        name: impl Into<Arc<str>>,
        start: ActionType,
        end: ActionType,
        err: ActionType,
    ) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            err,
        }
    }

    /// Check that the three tokens are pairwise distinct
    pub fn validate(&self) -> Result<()> {
        if self.start == self.end || self.start == self.err || self.end == self.err {
            return Err(Error::MalformedAsyncType(self.name.to_string()));
        }
        Ok(())
    }

    /// Get the label shared by the triple
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> &ActionType {
        &self.start
    }

    pub fn end(&self) -> &ActionType {
        &self.end
    }

    pub fn err(&self) -> &ActionType {
        &self.err
    }

    /// Which phase of this operation `kind` denotes, if any
    pub fn phase(&self, kind: &ActionType) -> Option<Phase> {
        if *kind == self.start {
            Some(Phase::Start)
        } else if *kind == self.end {
            Some(Phase::End)
        } else if *kind == self.err {
            Some(Phase::Err)
        } else {
            None
        }
    }
}

impl fmt::Display for AsyncActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
