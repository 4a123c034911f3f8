///
/// Database handle.
///
/// Wraps exactly one engine connection. The connection slot is either
/// filled (open) or empty (closed) and never refilled once emptied, so a
/// closed handle stays closed. Every operation that needs the connection
/// fails with `BridgeError::InvalidState` on a closed handle instead of
/// reaching the engine.
///
/// Handle preferences (row representation, type translation, translator)
/// use interior mutability so row callbacks can adjust them, or run more
/// SQL on the same handle, while `exec` is still on the stack.
///

use std::cell::{Cell, Ref, RefCell};
use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;

use rusqlite::{Connection, InterruptHandle, OpenFlags};
use serde::{Deserialize, Serialize};
use sqlbridge_core::{CallError, Flow, Value};
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::exec::{self, CallbackContext, ExecStatus};
use crate::function::{self, AggregateContext, ScalarContext};
use crate::pragma::{self, SHOW_DATATYPES};
use crate::row::{Row, RowMode};
use crate::translate::{DefaultTranslator, TypeTranslator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpenMode {
    #[default]
    ReadWriteCreate,
    ReadWrite,
    ReadOnly,
}

impl OpenMode {
    fn flags(self) -> OpenFlags {
        let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match self {
            OpenMode::ReadWriteCreate => {
                base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
            OpenMode::ReadWrite => base | OpenFlags::SQLITE_OPEN_READ_WRITE,
            OpenMode::ReadOnly => base | OpenFlags::SQLITE_OPEN_READ_ONLY,
        }
    }
}

pub struct Database {
    conn: RefCell<Option<Connection>>,
    path: String,
    bridge_pragmas: bool,
    row_mode: Cell<RowMode>,
    type_translation: Cell<bool>,
    translator: RefCell<Arc<dyn TypeTranslator>>,
}

impl Database {
    /// Open (or create, per `mode`) the database at `path`.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(path, mode.flags())?;
        Ok(Self::from_connection(conn, path.display().to_string()))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn, ":memory:".to_string()))
    }

    /// Open the database a configuration describes and apply its row
    /// preferences and `show_datatypes` setting.
    pub fn open_with_config(config: &BridgeConfig) -> Result<Self> {
        let db = Self::open(&config.database.path, config.database.mode)?;
        db.set_row_mode(config.rows.representation);
        db.set_type_translation(config.rows.type_translation);
        if config.rows.show_datatypes {
            db.set_pragma(SHOW_DATATYPES, true)?;
        }
        Ok(db)
    }

    fn from_connection(conn: Connection, path: String) -> Self {
        let bridge_pragmas = match pragma::install(&conn) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path, error = %e, "bridge pragmas unavailable");
                false
            }
        };
        debug!(path = %path, "opened database");

        Self {
            conn: RefCell::new(Some(conn)),
            path,
            bridge_pragmas,
            row_mode: Cell::new(RowMode::default()),
            type_translation: Cell::new(false),
            translator: RefCell::new(Arc::new(DefaultTranslator)),
        }
    }

    fn connection(&self) -> Result<Ref<'_, Connection>> {
        Ref::filter_map(self.conn.borrow(), Option::as_ref).map_err(|_| BridgeError::InvalidState)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.try_borrow().map_or(true, |c| c.is_some())
    }

    /// Close the handle. Closing a closed handle does nothing.
    ///
    /// Fails with `BridgeError::InUse` when called from inside a callback
    /// of this handle's own `exec`. If the engine refuses to close, the
    /// handle stays open and the engine error is returned.
    pub fn close(&self) -> Result<()> {
        let mut slot = self.conn.try_borrow_mut().map_err(|_| BridgeError::InUse)?;
        let Some(conn) = slot.take() else {
            return Ok(());
        };

        match conn.close() {
            Ok(()) => {
                debug!(path = %self.path, "closed database");
                Ok(())
            }
            Err((conn, e)) => {
                warn!(path = %self.path, error = %e, "close failed, connection retained");
                *slot = Some(conn);
                Err(e.into())
            }
        }
    }

    /// Run `sql`, calling `on_row` once per produced row.
    ///
    /// `cookie` is handed to every row as `Row::argument`. Returning
    /// `Flow::Abort` from `on_row` stops row delivery and skips the
    /// remaining statements; the call still succeeds with
    /// `ExecStatus::Aborted`.
    pub fn exec<F>(&self, sql: &str, mut on_row: F, cookie: Value) -> Result<ExecStatus>
    where
        F: FnMut(Row) -> std::result::Result<Flow, CallError>,
    {
        let conn = self.connection()?;
        if sql.trim().is_empty() {
            return Err(BridgeError::InvalidArgument("empty SQL".to_string()));
        }

        let report_types = pragma::enabled(&conn, SHOW_DATATYPES, self.bridge_pragmas)?;
        let translator = (report_types && self.type_translation.get())
            .then(|| Arc::clone(&*self.translator.borrow()));

        let cx = CallbackContext {
            argument: Arc::new(cookie),
            mode: self.row_mode.get(),
            report_types,
            translator,
        };
        debug!(
            report_types,
            translate = cx.translator.is_some(),
            mode = ?cx.mode,
            "exec"
        );

        exec::run(&conn, sql, &cx, &mut on_row)
    }

    /// Run `sql` for its side effects, ignoring any rows.
    pub fn execute_batch(&self, sql: &str) -> Result<ExecStatus> {
        self.exec(sql, |_| Ok(Flow::Continue), Value::Null)
    }

    /// Key of the most recently inserted row.
    pub fn last_inserted_key(&self) -> Result<i64> {
        Ok(self.connection()?.last_insert_rowid())
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE.
    pub fn affected_row_count(&self) -> Result<i64> {
        Ok(self.connection()?.changes() as i64)
    }

    /// Ask the running `exec`, if any, to stop at its next step.
    pub fn interrupt(&self) -> Result<()> {
        self.connection()?.get_interrupt_handle().interrupt();
        Ok(())
    }

    /// Handle that can interrupt this connection from another thread.
    pub fn interrupt_handle(&self) -> Result<InterruptHandle> {
        Ok(self.connection()?.get_interrupt_handle())
    }

    /// Whether the connection has pragma `name` turned on.
    pub fn pragma_enabled(&self, name: &str) -> Result<bool> {
        pragma::enabled(&*self.connection()?, name, self.bridge_pragmas)
    }

    /// Turn a bridge pragma such as `show_datatypes` on or off.
    ///
    /// The setting is stored by a statement on this connection, so it
    /// updates `affected_row_count`.
    pub fn set_pragma(&self, name: &str, on: bool) -> Result<()> {
        let conn = self.connection()?;
        if !self.bridge_pragmas {
            return Err(BridgeError::InvalidArgument(format!(
                "bridge pragmas are unavailable on {}",
                self.path
            )));
        }
        pragma::set(&conn, name, on)
    }

    pub fn row_mode(&self) -> RowMode {
        self.row_mode.get()
    }

    pub fn set_row_mode(&self, mode: RowMode) {
        self.row_mode.set(mode);
    }

    pub fn type_translation(&self) -> bool {
        self.type_translation.get()
    }

    /// Only takes effect while `show_datatypes` is on.
    pub fn set_type_translation(&self, enabled: bool) {
        self.type_translation.set(enabled);
    }

    pub fn set_type_translator(&self, translator: Arc<dyn TypeTranslator>) {
        *self.translator.borrow_mut() = translator;
    }

    /// Register `callable` as the SQL function `name` taking `arity`
    /// arguments (-1 for any number).
    pub fn register_scalar_function<F>(
        &self,
        name: &str,
        arity: i32,
        callable: F,
        cookie: Value,
    ) -> Result<()>
    where
        F: FnMut(&ScalarContext<'_>, &[Value]) -> std::result::Result<Value, CallError>
            + Send
            + 'static,
    {
        function::register_scalar(&*self.connection()?, name, arity, callable, cookie)
    }

    /// Register `step` and `finalize` as the SQL aggregate `name`.
    pub fn register_aggregate_function<S, Z>(
        &self,
        name: &str,
        arity: i32,
        step: S,
        finalize: Z,
        cookie: Value,
    ) -> Result<()>
    where
        S: FnMut(&mut AggregateContext<'_>, &[Value]) -> std::result::Result<(), CallError>
            + Send
            + 'static,
        Z: FnMut(&mut AggregateContext<'_>) -> std::result::Result<Value, CallError>
            + Send
            + 'static,
    {
        function::register_aggregate(&*self.connection()?, name, arity, step, finalize, cookie)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("row_mode", &self.row_mode.get())
            .field("type_translation", &self.type_translation.get())
            .finish()
    }
}

/// Whether `sql` ends in a complete statement. Needs no open handle.
pub fn is_statement_complete(sql: &str) -> bool {
    let Ok(sql) = CString::new(sql) else {
        return false;
    };
    unsafe { rusqlite::ffi::sqlite3_complete(sql.as_ptr()) != 0 }
}

/// Version string of the linked engine.
pub fn engine_version() -> &'static str {
    rusqlite::version()
}
