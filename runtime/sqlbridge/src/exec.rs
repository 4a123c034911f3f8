///
/// Row callback adapter.
///
/// Runs every statement of a SQL string in order and hands each produced
/// row to the host callable the moment the engine steps onto it. Column
/// names and declared types are captured on a statement's first row and
/// shared by the rows after it.
///
/// Outcomes:
/// - every statement ran: `ExecStatus::Completed`
/// - the callable answered `Flow::Abort`, or the engine reported an abort:
///   `ExecStatus::Aborted`
/// - the handle was interrupted: `ExecStatus::Interrupted`
/// - any other engine status: `BridgeError::Engine`
/// - the callable failed: `BridgeError::Callback`
///
/// None of the early exits run the remaining statements.
///

use std::sync::Arc;

use rusqlite::{Batch, Connection, Statement};
use sqlbridge_core::{CallError, Flow, Key, Value};
use tracing::{debug, trace};

use crate::convert::raw_text;
use crate::error::{engine_error, BridgeError, Result};
use crate::row::{ColumnTypes, Row, RowMode, UNDECLARED_TYPE};
use crate::translate::TypeTranslator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Completed,
    Aborted,
    Interrupted,
}

impl ExecStatus {
    /// Whether every statement ran to completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecStatus::Completed)
    }
}

/// Per-call state shared by every row of one `exec`.
pub(crate) struct CallbackContext {
    pub argument: Arc<Value>,
    pub mode: RowMode,
    pub report_types: bool,
    pub translator: Option<Arc<dyn TypeTranslator>>,
}

/// Column metadata captured from the first row of a statement.
struct ColumnCache {
    fields: Arc<[String]>,
    types: Option<Arc<ColumnTypes>>,
}

impl ColumnCache {
    fn capture(stmt: &Statement<'_>, report_types: bool) -> Self {
        let fields: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let types = report_types.then(|| {
            let mut types = ColumnTypes::with_capacity(fields.len() * 2);
            for (i, column) in stmt.columns().iter().enumerate() {
                let declared = column.decl_type().unwrap_or(UNDECLARED_TYPE).to_string();
                types.insert(Key::Name(fields[i].clone()), declared.clone());
                types.insert(Key::Index(i), declared);
            }
            Arc::new(types)
        });

        Self { fields, types }
    }

    fn declared_type(&self, index: usize) -> &str {
        self.types
            .as_ref()
            .and_then(|t| t.get(&Key::Index(index)))
            .map(String::as_str)
            .unwrap_or(UNDECLARED_TYPE)
    }
}

pub(crate) fn run<F>(
    conn: &Connection,
    sql: &str,
    cx: &CallbackContext,
    on_row: &mut F,
) -> Result<ExecStatus>
where
    F: FnMut(Row) -> std::result::Result<Flow, CallError>,
{
    let mut batch = Batch::new(conn, sql);
    let mut delivered = 0usize;

    loop {
        let mut stmt = match batch.next() {
            Ok(Some(stmt)) => stmt,
            Ok(None) => break,
            Err(e) => return terminal(e, delivered),
        };

        match run_statement(&mut stmt, cx, on_row, &mut delivered) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Abort) => {
                debug!(rows = delivered, "exec aborted by row callback");
                return Ok(ExecStatus::Aborted);
            }
            Err(StepError::Engine(e)) => return terminal(e, delivered),
            Err(StepError::Callback(e)) => return Err(BridgeError::Callback(e)),
        }
    }

    debug!(rows = delivered, "exec completed");
    Ok(ExecStatus::Completed)
}

enum StepError {
    Engine(rusqlite::Error),
    Callback(CallError),
}

fn run_statement<F>(
    stmt: &mut Statement<'_>,
    cx: &CallbackContext,
    on_row: &mut F,
    delivered: &mut usize,
) -> std::result::Result<Flow, StepError>
where
    F: FnMut(Row) -> std::result::Result<Flow, CallError>,
{
    let mut columns: Option<ColumnCache> = None;
    let mut rows = stmt.raw_query();

    while let Some(row) = rows.next().map_err(StepError::Engine)? {
        let cache = columns
            .get_or_insert_with(|| ColumnCache::capture(row.as_ref(), cx.report_types));

        let mut values = Vec::with_capacity(cache.fields.len());
        for i in 0..cache.fields.len() {
            let mut value = raw_text(row.get_ref(i).map_err(StepError::Engine)?);
            if let Some(translator) = &cx.translator {
                if !value.is_null() {
                    value = translator.translate(cache.declared_type(i), value);
                }
            }
            values.push(value);
        }

        let row = Row::new(
            cx.mode,
            Arc::clone(&cache.fields),
            values,
            Arc::clone(&cx.argument),
            cache.types.clone(),
        );

        *delivered += 1;
        trace!(row = *delivered, "delivering row");
        if on_row(row).map_err(StepError::Callback)? == Flow::Abort {
            return Ok(Flow::Abort);
        }
    }

    Ok(Flow::Continue)
}

fn terminal(e: rusqlite::Error, delivered: usize) -> Result<ExecStatus> {
    let err = engine_error(e);
    if err.is_interrupt() {
        debug!(rows = delivered, "exec interrupted");
        Ok(ExecStatus::Interrupted)
    } else if err.is_abort() {
        debug!(rows = delivered, "exec aborted by engine");
        Ok(ExecStatus::Aborted)
    } else {
        Err(BridgeError::Engine(err))
    }
}
