//! Per-operation status slice

use crate::Value;
use serde::{Deserialize, Serialize};

/// Status of one linked asynchronous operation
///
/// Starts idle: not loading, no data, no error. A START sets `loading` and
/// clears `err` while keeping `data`; an END stores the result; an ERR
/// stores the failure and clears `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncState<T = Value> {
    pub loading: bool,
    pub data: Option<T>,
    pub err: Option<Value>,
}

impl<T> AsyncState<T> {
    /// Create an idle slice with no data
    pub fn new() -> Self {
        Self {
            loading: false,
            data: None,
            err: None,
        }
    }

    /// Create an idle slice seeded with `data`
    pub fn with_data(data: T) -> Self {
        Self {
            loading: false,
            data: Some(data),
            err: None,
        }
    }

    /// Mark the operation as in flight
    pub fn begin(&mut self) {
        self.loading = true;
        self.err = None;
    }

    /// Record a successful result
    pub fn succeed(&mut self, data: T) {
        self.loading = false;
        self.data = Some(data);
        self.err = None;
    }

    /// Record a failure
    pub fn fail(&mut self, err: Value) {
        self.loading = false;
        self.data = None;
        self.err = Some(err);
    }

    pub fn is_idle(&self) -> bool {
        !self.loading && self.data.is_none() && self.err.is_none()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_success(&self) -> bool {
        !self.loading && self.err.is_none() && self.data.is_some()
    }

    pub fn is_failure(&self) -> bool {
        !self.loading && self.err.is_some()
    }
}

impl<T> Default for AsyncState<T> {
    fn default() -> Self {
        Self::new()
    }
}
