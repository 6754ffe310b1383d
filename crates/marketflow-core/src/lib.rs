//! # Marketflow Core
//!
//! Deterministic core of the marketflow runtime: the ASL-style state machine
//! interpreter and the data plumbing underneath it.
//!
//! This crate contains:
//! - the dotted-path engine over the JSON value model
//! - the ASL definition data model and its static validation
//! - the interpreter (Pass/Task/Choice/Wait/Succeed/Fail/Map/Parallel)
//! - the `MethodRegistry` seam the interpreter invokes domain methods through
//!
//! This crate does NOT care about:
//! - which methods exist or how they are described to an LLM
//! - where definitions come from
//! - how results are rendered for a user

pub mod definition;
pub mod error;
pub mod interpreter;
pub mod path;
pub mod registry;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::definition::{
        CatchClause, ChoiceRule, ChoiceState, DefinitionError, FailState, MapState, ParallelState,
        PassState, RetryPolicy, State, StateMachine, SucceedState, TaskState, WaitState,
    };
    pub use crate::error::InterpreterError;
    pub use crate::interpreter::{Interpreter, LAMBDA_INVOKE_RESOURCE};
    pub use crate::path::{
        apply_path, get_by_path, merge_values, place_by_path, split_path, PathError,
    };
    pub use crate::registry::{InvokeError, MethodRegistry};
}

// Re-export key types at crate root
pub use definition::{DefinitionError, State, StateMachine};
pub use error::InterpreterError;
pub use interpreter::{Interpreter, LAMBDA_INVOKE_RESOURCE};
pub use path::PathError;
pub use registry::{InvokeError, MethodRegistry};
