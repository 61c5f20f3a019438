//! Architecture selection.

use crate::arm64::{Aapcs64, ARM64_ISA};
use crate::codegen::InstructionSet;
use crate::config::Arch;
use crate::core::error::CompileResult;
use crate::core::temp::TempAuthority;
use crate::frame::CallingConvention;
use crate::i386::{Cdecl, I386_ISA};
use crate::x64::{SysV, X64_ISA};

/// A calling convention paired with the instruction set it is used with.
pub struct Target {
    pub convention: Box<dyn CallingConvention>,
    pub isa: &'static InstructionSet,
}

impl Target {
    pub fn convention(&self) -> &dyn CallingConvention {
        self.convention.as_ref()
    }
}

impl Arch {
    /// Build the target, issuing its machine registers from `temps`.
    pub fn target(self, temps: &mut TempAuthority) -> CompileResult<Target> {
        let target = match self {
            Arch::X64 => Target {
                convention: Box::new(SysV::new(temps)?),
                isa: &X64_ISA,
            },
            Arch::Arm64 => Target {
                convention: Box::new(Aapcs64::new(temps)?),
                isa: &ARM64_ISA,
            },
            Arch::I386 => Target {
                convention: Box::new(Cdecl::new(temps)?),
                isa: &I386_ISA,
            },
        };
        log::debug!(
            "target {}: {} registers, word size {}",
            self,
            target.convention.registers().all().count(),
            target.convention.word_size()
        );
        Ok(target)
    }
}
