// This module holds the ARM64/AArch64 target: the AAPCS64 calling convention (X0-X7 for
// arguments, X0 for the result, X19-X28 callee-saved, X29 as frame pointer and X30 as the
// link register clobbered by every call) and the instruction patterns the selector uses to
// cover canonical IR with A64 instructions. The module mirrors x64/ so that both targets are
// assembled into a Target the same way.

//! ARM64/AArch64 target.

pub mod calling_convention;
pub mod patterns;

pub use calling_convention::{Aapcs64, AAPCS64_REGISTERS};
pub use patterns::ARM64_ISA;
