//!
//! sqlbridge-core - Core Host Types
//!
//! This crate provides the types shared by the bridge crate and its tools:
//!
//! - `Value`, `Key` and `ValueMap` for structured host values
//! - `Flow`, the token a row callable returns to keep going or abort
//! - `CallError` for failures raised by host callables
//! - `ExceptionKind` and `EngineError`, the engine status code taxonomy
//!
//! Nothing in here touches the engine itself; the status code table is
//! plain data so it can be shared by any code that reports engine errors.
//!

pub mod callable;
pub mod exception;
pub mod value;

pub use callable::*;
pub use exception::*;
pub use value::*;
