//! Error types for rxstore-runtime

use thiserror::Error;

/// Result type for rxstore-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or starting a store
#[derive(Debug, Error)]
pub enum Error {
    /// `init` was called on a store that is already live
    #[error("store {0} is already initialized")]
    AlreadyInitialized(String),

    /// `init` was called outside a tokio runtime
    #[error("store {0} must be initialized from within a tokio runtime")]
    NoRuntime(String),

    /// A link registration was rejected; the link is inert
    #[error("invalid link {link} on store {store}: {reason}")]
    InvalidLink {
        store: String,
        link: String,
        reason: String,
    },

    /// Store configuration could not be parsed
    #[error("config error: {0}")]
    Config(#[from] ron::error::SpannedError),

    /// Core error
    #[error("core error: {0}")]
    Core(#[from] rxstore_core::Error),
}

impl Error {
    pub(crate) fn invalid_link(
        store: impl Into<String>,
        link: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidLink {
            store: store.into(),
            link: link.into(),
            reason: reason.into(),
        }
    }
}

// Errors cross task boundaries with the store that raised them.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
