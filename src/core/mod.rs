// This module serves as the central hub for the back end's core infrastructure, shared by
// every stage and every target architecture. It exports and organizes three subsystems:
// error handling (the CompileError enum and the diagnostic triple handed to the error
// reporter), the temp/label authority (fresh virtual registers, fresh and named labels, and
// the layered name maps used to print them), and session management (the compilation
// session that owns the authority and the selected target, runs the stages in order and
// gathers statistics). Nothing here is process-global: every session, and every test, owns
// its own authority.

//! Core back-end infrastructure.
//!
//! # Key Components
//!
//! ## Errors (`error`)
//! - `CompileError` with one variant per failure kind
//! - `Diagnostic` triples for the error reporter
//!
//! ## Temps and labels (`temp`)
//! - `TempAuthority` issuing fresh temps and labels
//! - `TempMap` name layers
//!
//! ## Session Management (`session`)
//! - Stage driver producing a `CompiledUnit`
//! - Compilation statistics

pub mod error;
pub mod session;
pub mod temp;

pub use error::{CompileError, CompileResult, Diagnostic};

pub use session::{CompilationSession, CompiledProc, CompiledString, CompiledUnit, SessionStats};

pub use temp::{Label, Temp, TempAuthority, TempMap};
