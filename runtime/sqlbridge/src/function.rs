///
/// Custom SQL function and aggregate dispatch.
///
/// Host closures registered here are called by the engine in the middle of
/// statement evaluation, on the caller's thread, before the engine moves on.
/// Each call receives an invocation context followed by the SQL arguments;
/// SQL NULL arguments arrive as `Value::Null`.
///
/// Return values go back into the engine's result slot: text, integers and
/// floats pass through, anything else leaves the result NULL. A closure
/// failure becomes a user-function error and fails the statement.
///
/// Aggregates keep one `AggregateState` per engine evaluation context, so
/// each group (and each query) starts from an empty accumulator.
///

use std::sync::{Mutex, MutexGuard, TryLockError};

use rusqlite::functions::{Aggregate, Context, FunctionFlags};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use sqlbridge_core::{CallError, Value, ValueMap};
use tracing::{debug, trace};

use crate::convert::{to_engine, typed};
use crate::error::{engine_error, BridgeError, Result};

/// Invocation context handed to scalar functions.
pub struct ScalarContext<'a> {
    argument: &'a Value,
}

impl ScalarContext<'_> {
    /// The cookie given at registration.
    pub fn argument(&self) -> &Value {
        self.argument
    }
}

/// Accumulator state of one aggregate evaluation.
#[derive(Debug, Default)]
pub struct AggregateState {
    rows_seen: i64,
    accumulator: ValueMap,
}

/// Invocation context handed to aggregate step and finalize closures.
pub struct AggregateContext<'a> {
    argument: &'a Value,
    state: &'a mut AggregateState,
}

impl AggregateContext<'_> {
    /// The cookie given at registration.
    pub fn argument(&self) -> &Value {
        self.argument
    }

    /// Number of rows stepped so far, the current one included.
    pub fn rows_seen(&self) -> i64 {
        self.state.rows_seen
    }

    pub fn accumulator(&mut self) -> &mut ValueMap {
        &mut self.state.accumulator
    }
}

pub(crate) fn register_scalar<F>(
    conn: &Connection,
    name: &str,
    arity: i32,
    callable: F,
    cookie: Value,
) -> Result<()>
where
    F: FnMut(&ScalarContext<'_>, &[Value]) -> std::result::Result<Value, CallError> + Send + 'static,
{
    let callable = Mutex::new(callable);
    let fn_name = name.to_string();

    conn.create_scalar_function(name, arity, FunctionFlags::SQLITE_UTF8, move |ctx| {
        let args = arguments(ctx);
        trace!(function = %fn_name, args = args.len(), "calling scalar function");
        let mut callable = lock(&callable, &fn_name)?;
        let scalar = ScalarContext { argument: &cookie };
        let result = (*callable)(&scalar, &args).map_err(user_error)?;
        Ok(to_engine(result))
    })
    .map_err(|e| registration_error(name, e))?;

    debug!(function = name, arity, "registered scalar function");
    Ok(())
}

pub(crate) fn register_aggregate<S, Z>(
    conn: &Connection,
    name: &str,
    arity: i32,
    step: S,
    finalize: Z,
    cookie: Value,
) -> Result<()>
where
    S: FnMut(&mut AggregateContext<'_>, &[Value]) -> std::result::Result<(), CallError> + Send + 'static,
    Z: FnMut(&mut AggregateContext<'_>) -> std::result::Result<Value, CallError> + Send + 'static,
{
    let aggregate = HostAggregate {
        name: name.to_string(),
        step: Mutex::new(step),
        finalize: Mutex::new(finalize),
        cookie,
    };

    conn.create_aggregate_function(name, arity, FunctionFlags::SQLITE_UTF8, aggregate)
        .map_err(|e| registration_error(name, e))?;

    debug!(function = name, arity, "registered aggregate function");
    Ok(())
}

struct HostAggregate<S, Z> {
    name: String,
    step: Mutex<S>,
    finalize: Mutex<Z>,
    cookie: Value,
}

impl<S, Z> Aggregate<AggregateState, SqlValue> for HostAggregate<S, Z>
where
    S: FnMut(&mut AggregateContext<'_>, &[Value]) -> std::result::Result<(), CallError> + Send + 'static,
    Z: FnMut(&mut AggregateContext<'_>) -> std::result::Result<Value, CallError> + Send + 'static,
{
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<AggregateState> {
        Ok(AggregateState::default())
    }

    fn step(&self, ctx: &mut Context<'_>, state: &mut AggregateState) -> rusqlite::Result<()> {
        let args = arguments(ctx);
        state.rows_seen += 1;
        trace!(function = %self.name, row = state.rows_seen, "stepping aggregate");

        let mut step = lock(&self.step, &self.name)?;
        let mut context = AggregateContext {
            argument: &self.cookie,
            state,
        };
        (*step)(&mut context, &args).map_err(user_error)
    }

    fn finalize(
        &self,
        _: &mut Context<'_>,
        state: Option<AggregateState>,
    ) -> rusqlite::Result<SqlValue> {
        let mut state = state.unwrap_or_default();
        trace!(function = %self.name, rows = state.rows_seen, "finalizing aggregate");

        let mut finalize = lock(&self.finalize, &self.name)?;
        let mut context = AggregateContext {
            argument: &self.cookie,
            state: &mut state,
        };
        let result = (*finalize)(&mut context).map_err(user_error)?;
        Ok(to_engine(result))
    }
}

fn arguments(ctx: &Context<'_>) -> Vec<Value> {
    (0..ctx.len()).map(|i| typed(ctx.get_raw(i))).collect()
}

// A closure that re-enters itself through nested SQL would deadlock on
// its own mutex; report it as a function error instead.
fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> rusqlite::Result<MutexGuard<'a, T>> {
    match mutex.try_lock() {
        Ok(guard) => Ok(guard),
        Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => Err(user_error(CallError::new(format!(
            "function '{}' is already running",
            name
        )))),
    }
}

fn user_error(e: CallError) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(Box::new(e))
}

fn registration_error(name: &str, e: rusqlite::Error) -> BridgeError {
    BridgeError::Registration {
        name: name.to_string(),
        source: engine_error(e),
    }
}
