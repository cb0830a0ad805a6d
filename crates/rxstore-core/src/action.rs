//! Actions: the only input to state change

use crate::{ActionType, AsyncActionType, Value};

/// A discrete typed event with an optional payload
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// What kind of action this is
    pub kind: ActionType,
    /// Optional payload
    pub payload: Option<Value>,
}

impl Action {
    /// Create an action without a payload
    pub fn new(kind: ActionType) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    /// Create an action carrying `payload`
    pub fn with_payload(kind: ActionType, payload: impl Into<Value>) -> Self {
        Self {
            kind,
            payload: Some(payload.into()),
        }
    }

    /// Check whether this action is of the given kind
    pub fn is(&self, kind: &ActionType) -> bool {
        self.kind == *kind
    }

    /// Check whether this action is any phase of the given async operation
    pub fn is_lifecycle_of(&self, kind: &AsyncActionType) -> bool {
        kind.phase(&self.kind).is_some()
    }

    /// Get the payload, or `Value::Null` when there is none
    pub fn payload_or_null(&self) -> Value {
        self.payload.clone().unwrap_or_default()
    }
}

impl From<ActionType> for Action {
    fn from(kind: ActionType) -> Self {
        Action::new(kind)
    }
}
