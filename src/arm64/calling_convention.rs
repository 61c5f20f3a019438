//! AAPCS64 calling convention.
//!
//! X0-X7 carry the first eight arguments and X0 the result. X19-X28 are
//! callee-saved; X0-X17 and the link register X30 are clobbered by a call.
//! X29 is the frame pointer. X18 is the platform register and is never used.

use crate::core::error::CompileResult;
use crate::core::temp::TempAuthority;
use crate::frame::{CallingConvention, MachineRegisters, RegisterSpec};

pub static AAPCS64_REGISTERS: RegisterSpec = RegisterSpec {
    names: &[
        "x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x9", "x10", "x11", "x12", "x13",
        "x14", "x15", "x16", "x17", "x18", "x19", "x20", "x21", "x22", "x23", "x24", "x25", "x26",
        "x27", "x28", "x29", "x30", "sp",
    ],
    frame_pointer: "x29",
    stack_pointer: "sp",
    return_value: "x0",
    arguments: &["x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7"],
    caller_saved: &[
        "x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x9", "x10", "x11", "x12", "x13",
        "x14", "x15", "x16", "x17", "x30",
    ],
    callee_saved: &[
        "x19", "x20", "x21", "x22", "x23", "x24", "x25", "x26", "x27", "x28",
    ],
};

#[derive(Debug, Clone)]
pub struct Aapcs64 {
    registers: MachineRegisters,
}

impl Aapcs64 {
    pub const OUTGOING_SLOTS: usize = 32;

    pub fn new(temps: &mut TempAuthority) -> CompileResult<Self> {
        Ok(Self {
            registers: MachineRegisters::issue(&AAPCS64_REGISTERS, temps)?,
        })
    }
}

impl CallingConvention for Aapcs64 {
    fn name(&self) -> &'static str {
        "arm64"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::temp::Label;
    use crate::frame::Access;

    #[test]
    fn test_eight_register_formals() {
        let mut temps = TempAuthority::new();
        let cc = Aapcs64::new(&mut temps).unwrap();
        // static link plus nine user formals
        let frame = cc
            .create_frame(&mut temps, Label::named("f"), &[false; 10])
            .unwrap();
        assert_eq!(frame.registers_used(), 8);
        assert_eq!(frame.formals()[0], Access::InFrame(16));
        assert_eq!(temps.names().name(frame.incoming()[1].unwrap()), "x0");
        assert_eq!(temps.names().name(frame.incoming()[8].unwrap()), "x7");
        assert_eq!(frame.formals()[9], Access::InFrame(24));
    }

    #[test]
    fn test_link_register_is_clobbered_by_calls() {
        let mut temps = TempAuthority::new();
        let cc = Aapcs64::new(&mut temps).unwrap();
        let lr = cc.register("x30").unwrap();
        assert!(cc.caller_saved().contains(&lr));
        assert!(!cc.callee_saved().contains(&lr));
        assert_eq!(temps.names().name(cc.frame_pointer()), "x29");
    }
}
