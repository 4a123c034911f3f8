//!
//! Host Callable Primitives
//!
//! Row callables answer each row with a `Flow`. Returning `Flow::Abort`
//! asks the engine to stop producing rows; the execution then finishes
//! normally instead of raising.
//!
//! Every host callable reports failure through `CallError`. The type is
//! `Send + Sync` so a failure inside a SQL function can travel back
//! through the engine as a user-function error.
//!

use thiserror::Error;

/// Answer of a row callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Continue,
    Abort,
}

impl From<()> for Flow {
    fn from(_: ()) -> Self {
        Flow::Continue
    }
}

impl From<bool> for Flow {
    /// `true` keeps the execution going.
    fn from(keep_going: bool) -> Self {
        if keep_going { Flow::Continue } else { Flow::Abort }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallError {
    pub message: String,
}

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error for an argument that does not have the expected type.
    pub fn type_mismatch(position: usize, expected: &str, found: &str) -> Self {
        Self::new(format!(
            "argument {} expected {}, found {}",
            position, expected, found
        ))
    }
}
