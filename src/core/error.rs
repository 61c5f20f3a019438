// This module defines error types for the back end using the thiserror crate for idiomatic
// Rust error handling. CompileError is the main error enum covering every failure the core
// can report: precondition violations found while analysing or translating the AST
// (unbound variables and functions, missing field slots, break outside a loop, unknown
// levels, a valueless statement where a condition was needed), calling-convention violations, instruction-selection misses, unsupported call
// arguments, unknown architecture identifiers and malformed pattern tables. None of these
// are user-facing "your program is wrong" errors; they all indicate a bug in a stage or a
// gap in a pattern table. Each variant converts into a Diagnostic triple (position, message,
// detail) that the surrounding error reporter renders. CompileResult<T> is the alias used
// throughout the crate.

//! Error types for the back end.
//!
//! Using thiserror for more idiomatic error handling.

use crate::ast::Pos;
use thiserror::Error;

/// Main error type for every compilation stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("undeclared variable `{name}`")]
    UnboundVariable { name: String, pos: Pos },

    #[error("undeclared function `{name}`")]
    UnboundFunction { name: String, pos: Pos },

    #[error("field `{field}` has no resolved slot")]
    MissingFieldSlot { field: String, pos: Pos },

    #[error("break outside of a loop")]
    BreakOutsideLoop { pos: Pos },

    #[error("unknown level {level}")]
    UnknownLevel { level: usize },

    #[error("statement used as a condition: {stm}")]
    StatementAsCondition { stm: String },

    #[error("calling convention violation: {reason}")]
    CallingConvention { reason: String },

    #[error("no pattern matches {shape}")]
    NoPattern { shape: String },

    #[error("unsupported call argument: {kind}")]
    UnsupportedArgument { kind: String },

    #[error("unknown architecture `{name}`")]
    UnknownArchitecture { name: String },

    #[error("malformed pattern table: {reason}")]
    PatternTable { reason: String },
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// The `(position, message, detail)` triple handed to the error reporter.
///
/// Errors that are not tied to a source location carry `Pos::default()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub pos: Pos,
    pub message: String,
    pub detail: String,
}

impl CompileError {
    /// Source position of the failure, when the failing stage knew one.
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Self::UnboundVariable { pos, .. }
            | Self::UnboundFunction { pos, .. }
            | Self::MissingFieldSlot { pos, .. }
            | Self::BreakOutsideLoop { pos } => Some(*pos),
            _ => None,
        }
    }

    /// Short category name used as the diagnostic message.
    fn category(&self) -> &'static str {
        match self {
            Self::UnboundVariable { .. }
            | Self::UnboundFunction { .. }
            | Self::MissingFieldSlot { .. }
            | Self::BreakOutsideLoop { .. }
            | Self::UnknownLevel { .. }
            | Self::StatementAsCondition { .. } => "internal error",
            Self::CallingConvention { .. } => "calling convention error",
            Self::NoPattern { .. } => "instruction selection error",
            Self::UnsupportedArgument { .. } => "call lowering error",
            Self::UnknownArchitecture { .. } => "configuration error",
            Self::PatternTable { .. } => "pattern table error",
        }
    }

    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            pos: self.pos().unwrap_or_default(),
            message: self.category().to_string(),
            detail: self.to_string(),
        }
    }
}
