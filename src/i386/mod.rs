// This module holds the 32-bit x86 target using the cdecl convention: every argument,
// the static link included, is pushed on the stack by the caller and found at EBP+8,
// EBP+12 and so on inside the callee. EAX carries the result, EAX/ECX/EDX are clobbered by
// calls and EBX/ESI/EDI are preserved by the callee. With no argument registers, no formal
// ever occupies a register on entry and the entry view shift is empty.

//! 32-bit x86 target (cdecl).

pub mod patterns;

use crate::core::error::CompileResult;
use crate::core::temp::TempAuthority;
use crate::frame::{CallingConvention, MachineRegisters, RegisterSpec};

pub use patterns::I386_ISA;

pub static CDECL_REGISTERS: RegisterSpec = RegisterSpec {
    names: &["eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi"],
    frame_pointer: "ebp",
    stack_pointer: "esp",
    return_value: "eax",
    arguments: &[],
    caller_saved: &["eax", "ecx", "edx"],
    callee_saved: &["ebx", "esi", "edi"],
};

#[derive(Debug, Clone)]
pub struct Cdecl {
    registers: MachineRegisters,
}

impl Cdecl {
    pub const OUTGOING_SLOTS: usize = 64;

    pub fn new(temps: &mut TempAuthority) -> CompileResult<Self> {
        Ok(Self {
            registers: MachineRegisters::issue(&CDECL_REGISTERS, temps)?,
        })
    }
}

impl CallingConvention for Cdecl {
    fn name(&self) -> &'static str {
        "i386"
    }

    fn word_size(&self) -> i64 {
        4
    }

    fn registers(&self) -> &MachineRegisters {
        &self.registers
    }

    fn outgoing_slots(&self) -> usize {
        Self::OUTGOING_SLOTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::temp::Label;
    use crate::frame::Access;
    use crate::ir::Stm;

    #[test]
    fn test_every_formal_arrives_on_the_stack() {
        let mut temps = TempAuthority::new();
        let cc = Cdecl::new(&mut temps).unwrap();
        let frame = cc
            .create_frame(&mut temps, Label::named("f"), &[true, false, false])
            .unwrap();
        assert_eq!(
            frame.formals(),
            &[Access::InFrame(8), Access::InFrame(12), Access::InFrame(16)]
        );
        assert_eq!(frame.registers_used(), 0);
        assert_eq!(frame.locals_size(), 0);
    }

    #[test]
    fn test_entry_only_saves_callee_saved() {
        let mut temps = TempAuthority::new();
        let cc = Cdecl::new(&mut temps).unwrap();
        let frame = cc
            .create_frame(&mut temps, Label::named("g"), &[true, true])
            .unwrap();
        let body = cc.proc_entry_exit1(&mut temps, &frame, Stm::nop());
        let stms = crate::ir::canon::linearize(body, &mut temps);
        // three saves and three restores, no view shift
        assert_eq!(stms.len(), 6);
    }
}
