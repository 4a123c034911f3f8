///
/// sqlbridge - SQLite Callback Bridge
///
/// Lets host code drive an embedded SQLite engine through callbacks and
/// lets the engine call host code back while a statement runs.
///
/// Architecture:
/// - `Database` owns exactly one engine connection. Closing is idempotent;
///   every accessor on a closed handle fails with `BridgeError::InvalidState`.
/// - `Database::exec` runs SQL and hands each produced row to a host
///   callable as a `Row`, in engine order, with no buffering. Returning
///   `Flow::Abort` stops row delivery; the call still succeeds.
/// - When the `show_datatypes` connection pragma is on, rows carry the
///   declared column types and, if the handle asks for it, every non-null
///   cell is passed through the handle's `TypeTranslator`.
/// - Host closures registered as scalar or aggregate SQL functions run
///   synchronously inside statement evaluation. Aggregates get one
///   accumulator per engine evaluation context.
/// - Engine status codes resolve through the exception taxonomy in
///   `sqlbridge-core`.
///
/// Everything is single threaded and blocking. A handle may be used again
/// from inside its own row callbacks; callers serialize access otherwise.
///

pub mod config;
pub mod database;
pub mod error;
pub mod exec;
pub mod function;
pub mod pragma;
pub mod row;
pub mod translate;
mod convert;

pub use config::{BridgeConfig, DatabaseSection, RowsSection};
pub use database::{engine_version, is_statement_complete, Database, OpenMode};
pub use error::{BridgeError, Result};
pub use exec::ExecStatus;
pub use function::{AggregateContext, ScalarContext};
pub use pragma::SHOW_DATATYPES;
pub use row::{Cells, ColumnTypes, Row, RowMode};
pub use translate::{DefaultTranslator, TypeTranslator};

pub use rusqlite::InterruptHandle;
pub use sqlbridge_core::{
    CallError, EngineError, ExceptionKind, Flow, Key, Value, ValueMap,
};

/// Text encoding used by the engine for every string crossing the bridge.
pub const ENCODING: &str = "UTF-8";

/// Version of this bridge crate.
pub const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");
