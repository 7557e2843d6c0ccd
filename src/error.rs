//! Error taxonomy for the viewer core
//!
//! Nothing here is recoverable in place. Every variant is fatal: the caller
//! logs it, releases what was acquired and exits non-zero.

use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

/// Errors raised by the window manager, layout and event loop
#[derive(Debug, Error)]
pub enum WmError {
    /// The display-server connection could not be established or was lost
    #[error("display connection error: {0}")]
    Connection(String),

    /// A surface, cursor or player could not be created
    #[error("failed to create resource: {0}")]
    ResourceCreation(String),

    /// The configuration cannot be applied (e.g. manual layout count mismatch)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The event loop hit an unexpected failure
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<ConnectError> for WmError {
    fn from(err: ConnectError) -> Self {
        WmError::Connection(err.to_string())
    }
}

impl From<ConnectionError> for WmError {
    fn from(err: ConnectionError) -> Self {
        WmError::Connection(err.to_string())
    }
}

impl From<ReplyError> for WmError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::ConnectionError(e) => e.into(),
            ReplyError::X11Error(e) => WmError::ResourceCreation(format!("{:?}", e)),
        }
    }
}

impl From<ReplyOrIdError> for WmError {
    fn from(err: ReplyOrIdError) -> Self {
        match err {
            ReplyOrIdError::ConnectionError(e) => e.into(),
            ReplyOrIdError::IdsExhausted => {
                WmError::ResourceCreation("X11 resource ids exhausted".into())
            }
            ReplyOrIdError::X11Error(e) => WmError::ResourceCreation(format!("{:?}", e)),
        }
    }
}

/// Errors raised by a Player backend
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The player process could not be started
    #[error("failed to spawn player `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// A command could not be delivered over the player's IPC socket
    #[error("player ipc failed: {0}")]
    Ipc(#[from] std::io::Error),

    /// The player did not open its IPC socket in time
    #[error("player did not become ready within {0} ms")]
    Timeout(u64),
}

impl From<PlayerError> for WmError {
    fn from(err: PlayerError) -> Self {
        WmError::ResourceCreation(err.to_string())
    }
}

pub type WmResult<T> = std::result::Result<T, WmError>;
