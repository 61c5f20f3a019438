// This module implements the System V AMD64 calling convention for x86-64 Linux/Unix systems
// as seen by the back end. The first six word-sized arguments (the static link counts as the
// first) arrive in RDI, RSI, RDX, RCX, R8 and R9; further arguments are pushed by the caller
// and are found above the return address at RBP+16, RBP+24 and so on. Results come back in
// RAX. RBX and R12-R15 survive calls and are preserved by the callee; RAX, RCX, RDX, RSI,
// RDI and R8-R11 are clobbered by every call. RBP is the frame pointer and RSP the stack
// pointer, so neither is ever handed to the register allocator. The outgoing argument area
// at the bottom of every frame is a fixed number of words wide, which bounds the number of
// stack-passed arguments any call or function may have.

//! System V x86-64 calling convention.

use crate::core::error::CompileResult;
use crate::core::temp::TempAuthority;
use crate::frame::{CallingConvention, MachineRegisters, RegisterSpec};

/// System V x86-64 register roles.
pub static SYSV_REGISTERS: RegisterSpec = RegisterSpec {
    names: &[
        "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12",
        "r13", "r14", "r15",
    ],
    frame_pointer: "rbp",
    stack_pointer: "rsp",
    return_value: "rax",
    arguments: &["rdi", "rsi", "rdx", "rcx", "r8", "r9"],
    caller_saved: &["rax", "rcx", "rdx", "rsi", "rdi", "r8", "r9", "r10", "r11"],
    callee_saved: &["rbx", "r12", "r13", "r14", "r15"],
};

/// System V x86-64 calling convention.
#[derive(Debug, Clone)]
pub struct SysV {
    registers: MachineRegisters,
}

impl SysV {
    /// Words reserved for stack-passed arguments.
    pub const OUTGOING_SLOTS: usize = 32;

    pub fn new(temps: &mut TempAuthority) -> CompileResult<Self> {
        Ok(Self {
            registers: MachineRegisters::issue(&SYSV_REGISTERS, temps)?,
        })
    }
}

impl CallingConvention for SysV {
    fn name(&self) -> &'static str {
        "x64"
    }

    fn word_size(&self) -> i64 {
        8
    }

    fn registers(&self) -> &MachineRegisters {
        &self.registers
    }

    fn outgoing_slots(&self) -> usize {
        Self::OUTGOING_SLOTS
    }
}
