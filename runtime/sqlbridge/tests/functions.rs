///
/// # Integration Tests for custom functions and aggregates
///
/// Scalar dispatch and result coercion, aggregate accumulators, per-group
/// and per-query isolation, and failures raised by host closures.
///

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sqlbridge::{
    BridgeError, CallError, Database, ExceptionKind, Flow, Key, Row, Value,
};

fn seeded() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.execute_batch("CREATE TABLE t(a INTEGER, g TEXT); INSERT INTO t VALUES(1, 'x'), (2, 'x'), (3, 'y')")
        .unwrap();
    db
}

fn query(db: &Database, sql: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    db.exec(
        sql,
        |row| {
            rows.push(row);
            Ok(Flow::Continue)
        },
        Value::Null,
    )
    .unwrap();
    rows
}

fn register_sum2(db: &Database) {
    db.register_aggregate_function(
        "sum2",
        1,
        |ctx, args| {
            let value = args[0].as_i64().unwrap_or_default();
            let entry = ctx
                .accumulator()
                .entry(Key::from("sum"))
                .or_insert(Value::Integer(0));
            *entry = Value::Integer(entry.as_i64().unwrap_or_default() + value);
            Ok(())
        },
        |ctx| {
            Ok(ctx
                .accumulator()
                .get(&Key::from("sum"))
                .cloned()
                .unwrap_or(Value::Integer(0)))
        },
        Value::Null,
    )
    .unwrap();
}

#[test]
fn test_scalar_function_doubles_value() {
    let db = seeded();
    db.register_scalar_function(
        "double",
        1,
        |_, args| match args[0].as_i64() {
            Some(x) => Ok(Value::Integer(x * 2)),
            None => Err(CallError::type_mismatch(0, "int", args[0].type_name())),
        },
        Value::Null,
    )
    .unwrap();

    let rows = query(&db, "SELECT double(a) AS d FROM t WHERE a = 3");
    assert_eq!(rows[0].get("d"), Some(&Value::from("6")));

    let rows = query(&db, "SELECT typeof(double(a)) AS ty FROM t LIMIT 1");
    assert_eq!(rows[0].get("ty"), Some(&Value::from("integer")));
}

#[test]
fn test_scalar_arguments_and_cookie() {
    let db = Database::open_in_memory().unwrap();
    db.register_scalar_function(
        "describe",
        -1,
        |ctx, args| {
            let kinds: Vec<&str> = args.iter().map(Value::type_name).collect();
            Ok(Value::Text(format!("{}:{}", ctx.argument(), kinds.join(","))))
        },
        Value::from("tag"),
    )
    .unwrap();

    let rows = query(&db, "SELECT describe(1, 2.5, 'x', NULL, x'00') AS d");
    assert_eq!(
        rows[0].get("d"),
        Some(&Value::from("tag:int,float,string,null,bytes"))
    );
}

#[test]
fn test_result_coercion() {
    let db = Database::open_in_memory().unwrap();
    db.register_scalar_function("as_text", 0, |_, _| Ok(Value::from("hi")), Value::Null)
        .unwrap();
    db.register_scalar_function("as_real", 0, |_, _| Ok(Value::Float(1.5)), Value::Null)
        .unwrap();
    db.register_scalar_function("as_bool", 0, |_, _| Ok(Value::Bool(true)), Value::Null)
        .unwrap();
    db.register_scalar_function("as_array", 0, |_, _| Ok(Value::Array(vec![])), Value::Null)
        .unwrap();

    let rows = query(
        &db,
        "SELECT typeof(as_text()) AS t, typeof(as_real()) AS r,
                typeof(as_bool()) AS b, typeof(as_array()) AS a, as_real() AS rv",
    );
    let row = &rows[0];
    assert_eq!(row.get("t"), Some(&Value::from("text")));
    assert_eq!(row.get("r"), Some(&Value::from("real")));
    assert_eq!(row.get("b"), Some(&Value::from("null")));
    assert_eq!(row.get("a"), Some(&Value::from("null")));
    assert_eq!(row.get("rv"), Some(&Value::from("1.5")));
}

#[test]
fn test_scalar_failure_surfaces_as_engine_error() {
    let db = seeded();
    db.register_scalar_function(
        "fail",
        1,
        |_, _| Err(CallError::new("host function failed")),
        Value::Null,
    )
    .unwrap();

    let err = db
        .exec("SELECT fail(a) FROM t", |_| Ok(Flow::Continue), Value::Null)
        .unwrap_err();
    let engine = err.engine().expect("expected an engine error");
    assert_eq!(engine.kind, ExceptionKind::Sql);
    assert_eq!(engine.message, "host function failed");
}

#[test]
fn test_wrong_arity_is_an_engine_error() {
    let db = seeded();
    db.register_scalar_function("one", 1, |_, args| Ok(args[0].clone()), Value::Null)
        .unwrap();
    let err = db.execute_batch("SELECT one(1, 2)").unwrap_err();
    let engine = err.engine().expect("expected an engine error");
    assert_eq!(engine.kind, ExceptionKind::Sql);
    assert_eq!(engine.message, "wrong number of arguments to function one()");
}

#[test]
fn test_invalid_registration_is_rejected() {
    let db = Database::open_in_memory().unwrap();
    let err = db
        .register_scalar_function("bad", -2, |_, _| Ok(Value::Null), Value::Null)
        .unwrap_err();
    let BridgeError::Registration { name, source } = err else {
        panic!("expected a registration error");
    };
    assert_eq!(name, "bad");
    assert_eq!(source.kind, ExceptionKind::Misuse);
}

#[test]
fn test_aggregate_sums_rows() {
    let db = seeded();
    register_sum2(&db);

    let rows = query(&db, "SELECT sum2(a) AS s FROM t");
    assert_eq!(rows[0].get("s"), Some(&Value::from("6")));
}

#[test]
fn test_aggregate_state_is_per_query() {
    let db = seeded();
    register_sum2(&db);

    for _ in 0..3 {
        let rows = query(&db, "SELECT sum2(a) AS s FROM t");
        assert_eq!(rows[0].get("s"), Some(&Value::from("6")));
    }
}

#[test]
fn test_aggregate_state_is_per_group() {
    let db = seeded();
    register_sum2(&db);

    let rows = query(&db, "SELECT g, sum2(a) AS s FROM t GROUP BY g ORDER BY g");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("s"), Some(&Value::from("3")));
    assert_eq!(rows[1].get("s"), Some(&Value::from("3")));

    let rows = query(&db, "SELECT sum2(a) AS s1, sum2(a * 10) AS s2 FROM t");
    assert_eq!(rows[0].get("s1"), Some(&Value::from("6")));
    assert_eq!(rows[0].get("s2"), Some(&Value::from("60")));
}

#[test]
fn test_aggregate_rows_seen_and_empty_input() {
    let db = seeded();
    let finalized = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finalized);

    db.register_aggregate_function(
        "seen",
        1,
        |ctx, _| {
            let n = ctx.rows_seen();
            ctx.accumulator().insert(Key::from("last"), Value::Integer(n));
            Ok(())
        },
        move |ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert!(ctx.accumulator().len() <= 1);
            Ok(Value::Integer(ctx.rows_seen()))
        },
        Value::Null,
    )
    .unwrap();

    let rows = query(&db, "SELECT seen(a) AS n FROM t");
    assert_eq!(rows[0].get("n"), Some(&Value::from("3")));
    assert_eq!(finalized.load(Ordering::SeqCst), 1);

    let rows = query(&db, "SELECT seen(a) AS n FROM t WHERE a > 100");
    assert_eq!(rows[0].get("n"), Some(&Value::from("0")));
    assert_eq!(finalized.load(Ordering::SeqCst), 2);
}

#[test]
fn test_aggregate_step_failure() {
    let db = seeded();
    db.register_aggregate_function(
        "picky",
        1,
        |_, args| {
            if args[0].as_i64() == Some(2) {
                Err(CallError::new("two is not allowed"))
            } else {
                Ok(())
            }
        },
        |_| Ok(Value::Null),
        Value::Null,
    )
    .unwrap();

    let err = db.execute_batch("SELECT picky(a) FROM t").unwrap_err();
    let engine = err.engine().expect("expected an engine error");
    assert_eq!(engine.message, "two is not allowed");
}

#[test]
fn test_functions_can_own_another_handle() {
    let db = seeded();
    let lookup = Database::open_in_memory().unwrap();
    lookup
        .execute_batch("CREATE TABLE names(id, name); INSERT INTO names VALUES(1, 'one'), (2, 'two')")
        .unwrap();

    db.register_scalar_function(
        "name_of",
        1,
        move |_, args| {
            let id = args[0].as_i64().unwrap_or_default();
            let mut found = Value::Null;
            lookup
                .exec(
                    &format!("SELECT name FROM names WHERE id = {}", id),
                    |row| {
                        found = row.get("name").cloned().unwrap_or_default();
                        Ok(Flow::Abort)
                    },
                    Value::Null,
                )
                .map_err(|e| CallError::new(e.to_string()))?;
            Ok(found)
        },
        Value::Null,
    )
    .unwrap();

    let rows = query(&db, "SELECT name_of(a) AS n FROM t ORDER BY a");
    let names: Vec<_> = rows.iter().map(|r| r.get("n").cloned()).collect();
    assert_eq!(
        names,
        vec![Some(Value::from("one")), Some(Value::from("two")), Some(Value::Null)]
    );
}
