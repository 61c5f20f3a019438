//! Instruction selection.
//!
//! - [`patterns`]: shape/template tables and the matcher
//! - [`select`]: the maximal-munch driver and call-argument lowering
//! - [`instr`]: selected instructions with symbolic operands

pub mod instr;
pub mod patterns;
pub mod select;

pub use instr::{InstrKind, Instruction};
pub use patterns::{InstructionSet, Pattern, Shape, Template};
pub use select::Codegen;
