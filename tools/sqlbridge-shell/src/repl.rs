///
/// Line-oriented shell state.
///
/// Input lines are buffered until the engine considers the text a complete
/// statement, then run in one `exec`. Lines starting with `.` are shell
/// commands and are only recognized between statements.
///

use std::io::Write;

use sqlbridge::{
    is_statement_complete, BridgeError, CallError, Database, Flow, Key, Result, Row, RowMode, Value,
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotCommand {
    Quit,
    Fields,
    Unknown(String),
}

impl DotCommand {
    fn parse(line: &str) -> Self {
        match line.split_whitespace().next().unwrap_or_default() {
            ".quit" | ".exit" => DotCommand::Quit,
            ".fields" => DotCommand::Fields,
            other => DotCommand::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Pending,
    Statement(String),
    Command(DotCommand),
}

#[derive(Debug, Default)]
pub struct StatementBuffer {
    pending: String,
}

impl StatementBuffer {
    pub fn push(&mut self, line: &str) -> Input {
        if self.pending.is_empty() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return Input::Pending;
            }
            if trimmed.starts_with('.') {
                return Input::Command(DotCommand::parse(trimmed));
            }
        }

        self.pending.push_str(line);
        self.pending.push('\n');
        if is_statement_complete(&self.pending) {
            Input::Statement(std::mem::take(&mut self.pending))
        } else {
            Input::Pending
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

pub struct Shell<'a, W: Write> {
    db: &'a Database,
    out: W,
    buffer: StatementBuffer,
    show_fields: bool,
}

impl<'a, W: Write> Shell<'a, W> {
    pub fn new(db: &'a Database, out: W) -> Self {
        Self {
            db,
            out,
            buffer: StatementBuffer::default(),
            show_fields: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Handle one input line. Returns false once the session should end.
    pub fn feed(&mut self, line: &str) -> Result<bool> {
        match self.buffer.push(line) {
            Input::Pending => Ok(true),
            Input::Statement(sql) => self.run(&sql).map(|_| true),
            Input::Command(DotCommand::Quit) => Ok(false),
            Input::Command(DotCommand::Fields) => {
                self.show_fields = !self.show_fields;
                debug!(show_fields = self.show_fields, "toggled field header");
                Ok(true)
            }
            Input::Command(DotCommand::Unknown(name)) => {
                eprintln!("Error: unknown command {}", name);
                Ok(true)
            }
        }
    }

    /// Run `sql` and print every row it produces.
    pub fn run(&mut self, sql: &str) -> Result<()> {
        let show_fields = self.show_fields;
        let out = &mut self.out;
        let mut header: Option<Vec<String>> = None;

        let status = self.db.exec(
            sql,
            |row| {
                if show_fields && header.as_deref() != Some(row.fields()) {
                    writeln!(out, "{}", serde_json::Value::from(row.fields().to_vec()))
                        .map_err(io_error)?;
                    if let Some(types) = row.column_types() {
                        let types: Vec<String> =
                            (0..row.len()).filter_map(|i| types.get(&Key::Index(i)).cloned()).collect();
                        writeln!(out, "{}", serde_json::Value::from(types)).map_err(io_error)?;
                    }
                    header = Some(row.fields().to_vec());
                }
                writeln!(out, "{}", render(&row)).map_err(io_error)?;
                Ok(Flow::Continue)
            },
            Value::Null,
        )?;
        debug!(?status, "statement finished");
        self.out.flush().map_err(|e| BridgeError::Callback(io_error(e)))
    }
}

/// One JSON line per row: an object keyed by field name in map mode, an
/// array in array mode.
pub fn render(row: &Row) -> serde_json::Value {
    let values = row.values().into_iter().map(to_json);
    match row.mode() {
        RowMode::Array => serde_json::Value::Array(values.collect()),
        RowMode::Map => serde_json::Value::Object(row.fields().iter().cloned().zip(values).collect()),
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn io_error(e: std::io::Error) -> CallError {
    CallError::new(format!("could not write row: {}", e))
}
