//!
//! Engine Exception Taxonomy
//!
//! Maps engine status codes to exception kinds. The table is built once,
//! on first lookup, and is read-only afterwards.
//!
//! Status codes:
//! - 0: OK (never raises)
//! - 1..=23: one exception kind per code (SQL .. Authorization)
//! - anything else: the generic `DatabaseException`
//!
//! Extended result codes carry the primary code in their low 8 bits, so
//! lookups reduce them before consulting the table.
//!

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use thiserror::Error;

pub const STATUS_OK: i32 = 0;
pub const STATUS_ABORT: i32 = 4;
pub const STATUS_INTERRUPT: i32 = 9;

/// Code used for failures that did not come with an engine status.
pub const STATUS_UNKNOWN: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    Generic,
    Sql,
    Internal,
    Permissions,
    Abort,
    Busy,
    Locked,
    OutOfMemory,
    ReadOnly,
    Interrupt,
    IoError,
    Corrupt,
    NotFound,
    Full,
    CantOpen,
    Protocol,
    Empty,
    SchemaChanged,
    TooBig,
    Constraint,
    Mismatch,
    Misuse,
    UnsupportedOsFeature,
    Authorization,
}

const TAXONOMY: &[(i32, ExceptionKind, &str)] = &[
    (1, ExceptionKind::Sql, "SQLException"),
    (2, ExceptionKind::Internal, "InternalException"),
    (3, ExceptionKind::Permissions, "PermissionsException"),
    (4, ExceptionKind::Abort, "AbortException"),
    (5, ExceptionKind::Busy, "BusyException"),
    (6, ExceptionKind::Locked, "LockedException"),
    (7, ExceptionKind::OutOfMemory, "OutOfMemoryException"),
    (8, ExceptionKind::ReadOnly, "ReadOnlyException"),
    (9, ExceptionKind::Interrupt, "InterruptException"),
    (10, ExceptionKind::IoError, "IOErrorException"),
    (11, ExceptionKind::Corrupt, "CorruptException"),
    (12, ExceptionKind::NotFound, "NotFoundException"),
    (13, ExceptionKind::Full, "FullException"),
    (14, ExceptionKind::CantOpen, "CantOpenException"),
    (15, ExceptionKind::Protocol, "ProtocolException"),
    (16, ExceptionKind::Empty, "EmptyException"),
    (17, ExceptionKind::SchemaChanged, "SchemaChangedException"),
    (18, ExceptionKind::TooBig, "TooBigException"),
    (19, ExceptionKind::Constraint, "ConstraintException"),
    (20, ExceptionKind::Mismatch, "MismatchException"),
    (21, ExceptionKind::Misuse, "MisuseException"),
    (22, ExceptionKind::UnsupportedOsFeature, "UnsupportedOSFeatureException"),
    (23, ExceptionKind::Authorization, "AuthorizationException"),
];

const GENERIC_NAME: &str = "DatabaseException";

struct Registry {
    by_code: HashMap<i32, ExceptionKind>,
    names: HashMap<ExceptionKind, &'static str>,
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let mut by_code = HashMap::with_capacity(TAXONOMY.len());
    let mut names = HashMap::with_capacity(TAXONOMY.len() + 1);
    for &(code, kind, name) in TAXONOMY {
        by_code.insert(code, kind);
        names.insert(kind, name);
    }
    names.insert(ExceptionKind::Generic, GENERIC_NAME);
    Registry { by_code, names }
});

/// Reduce an extended result code to its primary code.
pub fn primary_code(code: i32) -> i32 {
    if code <= 0 { code } else { code & 0xff }
}

impl ExceptionKind {
    /// Resolve a status code. Non-positive and unmapped codes are generic.
    pub fn from_code(code: i32) -> Self {
        if code <= 0 {
            return ExceptionKind::Generic;
        }
        REGISTRY
            .by_code
            .get(&primary_code(code))
            .copied()
            .unwrap_or(ExceptionKind::Generic)
    }

    pub fn name(&self) -> &'static str {
        REGISTRY.names.get(self).copied().unwrap_or(GENERIC_NAME)
    }

    pub fn all() -> impl Iterator<Item = ExceptionKind> {
        TAXONOMY.iter().map(|&(_, kind, _)| kind)
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An engine failure resolved through the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    pub kind: ExceptionKind,
    pub code: i32,
    pub extended_code: i32,
    pub message: String,
}

impl EngineError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            kind: ExceptionKind::from_code(code),
            code: primary_code(code),
            extended_code: code,
            message: message.into(),
        }
    }

    /// Error for a failure that carries no engine status.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(STATUS_UNKNOWN, message)
    }

    /// Turn a raw status into a result. `STATUS_OK` never raises.
    pub fn check(code: i32, message: impl Into<String>) -> Result<(), EngineError> {
        if code == STATUS_OK {
            Ok(())
        } else {
            Err(Self::new(code, message))
        }
    }

    pub fn is_abort(&self) -> bool {
        self.kind == ExceptionKind::Abort
    }

    pub fn is_interrupt(&self) -> bool {
        self.kind == ExceptionKind::Interrupt
    }
}
