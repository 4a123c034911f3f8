///
/// Structured row values handed to row callables.
///
/// A row knows its field names, the cookie passed to `exec`, and, when the
/// connection reports declared types, the column type map. Field names and
/// types are captured once per statement and shared by every row of it.
///
/// Two representations exist:
/// - Array: cells in column order
/// - Map: every cell stored under its column name and its zero-based index
///

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sqlbridge_core::{Key, Value, ValueMap};

/// Declared column types, keyed by column name and by index.
pub type ColumnTypes = IndexMap<Key, String>;

/// Type reported for columns without a declared type.
pub const UNDECLARED_TYPE: &str = "STRING";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowMode {
    Array,
    #[default]
    Map,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cells {
    Array(Vec<Value>),
    Map(ValueMap),
}

#[derive(Debug, Clone)]
pub struct Row {
    cells: Cells,
    fields: Arc<[String]>,
    argument: Arc<Value>,
    column_types: Option<Arc<ColumnTypes>>,
}

impl Row {
    pub(crate) fn new(
        mode: RowMode,
        fields: Arc<[String]>,
        values: Vec<Value>,
        argument: Arc<Value>,
        column_types: Option<Arc<ColumnTypes>>,
    ) -> Self {
        let cells = match mode {
            RowMode::Array => Cells::Array(values),
            RowMode::Map => {
                let mut map = ValueMap::with_capacity(values.len() * 2);
                for (i, value) in values.into_iter().enumerate() {
                    map.insert(Key::Name(fields[i].clone()), value.clone());
                    map.insert(Key::Index(i), value);
                }
                Cells::Map(map)
            }
        };
        Self {
            cells,
            fields,
            argument,
            column_types,
        }
    }

    /// Column names in engine order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// The cookie passed to `exec`.
    pub fn argument(&self) -> &Value {
        &self.argument
    }

    /// Declared column types; present only when the connection reports them.
    pub fn column_types(&self) -> Option<&ColumnTypes> {
        self.column_types.as_deref()
    }

    pub fn cells(&self) -> &Cells {
        &self.cells
    }

    pub fn mode(&self) -> RowMode {
        match self.cells {
            Cells::Array(_) => RowMode::Array,
            Cells::Map(_) => RowMode::Map,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look a cell up by column name or index, in either representation.
    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        let key = key.into();
        match &self.cells {
            Cells::Map(map) => map.get(&key),
            Cells::Array(values) => {
                let index = match key {
                    Key::Index(i) => i,
                    Key::Name(name) => self.fields.iter().position(|f| *f == name)?,
                };
                values.get(index)
            }
        }
    }

    /// Cells in column order.
    pub fn values(&self) -> Vec<&Value> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }

    /// The row as a host value: an array or a map, per the row's mode.
    pub fn into_value(self) -> Value {
        match self.cells {
            Cells::Array(values) => Value::Array(values),
            Cells::Map(map) => Value::Map(map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Arc<[String]> {
        Arc::from(vec!["a".to_string(), "b".to_string()])
    }

    fn cells() -> Vec<Value> {
        vec![Value::from("1"), Value::Null]
    }

    #[test]
    fn test_map_rows_store_each_cell_twice() {
        let row = Row::new(RowMode::Map, fields(), cells(), Arc::new(Value::Null), None);
        let Cells::Map(map) = row.cells() else {
            panic!("expected map cells");
        };
        assert_eq!(map.len(), 4);
        assert_eq!(row.get("a"), row.get(0usize));
        assert_eq!(row.get("b"), Some(&Value::Null));
        assert_eq!(row.get(1usize), Some(&Value::Null));
    }

    #[test]
    fn test_array_rows_resolve_names() {
        let row = Row::new(
            RowMode::Array,
            fields(),
            cells(),
            Arc::new(Value::from("cookie")),
            None,
        );
        assert_eq!(row.mode(), RowMode::Array);
        assert_eq!(row.get("a"), Some(&Value::from("1")));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.argument(), &Value::from("cookie"));
        assert!(row.column_types().is_none());
    }

    #[test]
    fn test_values_follow_column_order() {
        let row = Row::new(RowMode::Map, fields(), cells(), Arc::new(Value::Null), None);
        assert_eq!(row.values(), vec![&Value::from("1"), &Value::Null]);
        assert_eq!(row.fields(), &["a".to_string(), "b".to_string()]);
    }
}
