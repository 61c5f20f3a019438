//! Tiger back end: escape analysis, frames, IR lowering and instruction selection.
//!
//! The crate takes a type-checked Tiger AST and produces, per procedure,
//! a canonical IR statement list and a list of abstract instructions over
//! unbounded virtual registers. Register allocation and final assembly
//! emission happen downstream.
//!
//! # Primary Usage
//!
//! ```ignore
//! use tiger_backend::ast::build::*;
//! use tiger_backend::{CompilationSession, Config};
//!
//! let mut session = CompilationSession::new(Config::new("arm64")?)?;
//! let mut program = call("print", vec![string("hello\n")]);
//! let unit = session.compile(&mut program)?;
//! print!("{}", unit.listing(session.names()));
//! ```
//!
//! # Architecture
//!
//! - [`escape`] - marks variables referenced from nested functions
//! - [`frame`] - activation records and the calling-convention trait
//! - [`translate`] - AST to IR lowering with levels and static links
//! - [`ir`] - tree IR and canonicalisation
//! - [`codegen`] - maximal-munch selection over declarative pattern tables
//! - [`x64`], [`arm64`], [`i386`] - target conventions and pattern tables
//! - [`core`] - errors, temps and labels, the compilation session

pub mod arm64;
pub mod ast;
pub mod codegen;
pub mod config;
pub mod core;
pub mod escape;
pub mod frame;
pub mod i386;
pub mod ir;
pub mod target;
pub mod translate;
pub mod x64;

pub use crate::core::{
    // Errors
    CompileError, CompileResult, Diagnostic,
    // Temps and labels
    Label, Temp, TempAuthority, TempMap,
    // Session management
    CompilationSession, CompiledProc, CompiledString, CompiledUnit, SessionStats,
};
pub use config::{Arch, Config};
pub use frame::{Access, CallingConvention, Frame};
pub use target::Target;
