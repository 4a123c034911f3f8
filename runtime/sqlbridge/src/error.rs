///
/// Bridge error types.
///
/// Engine failures keep their status code and the engine's own message;
/// everything the bridge rejects before reaching the engine gets its own
/// variant. Aborting a query from a row callable is not an error and never
/// shows up here.
///

use sqlbridge_core::{CallError, EngineError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("attempt to access a closed database")]
    InvalidState,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("error registering custom function '{name}': {source}")]
    Registration { name: String, source: EngineError },

    #[error("row callback failed: {0}")]
    Callback(CallError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("database is executing a statement and cannot be closed")]
    InUse,

    #[error("configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// The engine error behind this failure, if any.
    pub fn engine(&self) -> Option<&EngineError> {
        match self {
            BridgeError::Engine(e) => Some(e),
            BridgeError::Registration { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Resolve a rusqlite failure through the exception taxonomy.
pub(crate) fn engine_error(e: rusqlite::Error) -> EngineError {
    match e {
        rusqlite::Error::SqliteFailure(err, message) => {
            let message = message.unwrap_or_else(|| err.to_string());
            EngineError::new(err.extended_code, message)
        }
        // Prepare-time failures carry the statement text and offset; only the
        // engine's own message is kept.
        rusqlite::Error::SqlInputError { error, msg, .. } => {
            EngineError::new(error.extended_code, msg)
        }
        other => EngineError::generic(other.to_string()),
    }
}

impl From<rusqlite::Error> for BridgeError {
    fn from(e: rusqlite::Error) -> Self {
        BridgeError::Engine(engine_error(e))
    }
}
