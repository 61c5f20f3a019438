//! x86-64 target.
//!
//! This module contains all x86-64 specific code:
//! - System V calling convention
//! - Instruction patterns for the selector

pub mod calling_convention;
pub mod patterns;

pub use calling_convention::{SysV, SYSV_REGISTERS};
pub use patterns::X64_ISA;
