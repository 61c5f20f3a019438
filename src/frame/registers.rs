//! Physical register tables.
//!
//! Each target describes its machine registers once as a static
//! [`RegisterSpec`]. Issuing the spec against a [`TempAuthority`] turns every
//! register into a named temp in the authority's global name layer, so that
//! physical and virtual registers share one namespace for the allocator.

use crate::core::error::{CompileError, CompileResult};
use crate::core::temp::{Temp, TempAuthority};

/// Static description of a target's registers and their roles.
#[derive(Debug)]
pub struct RegisterSpec {
    /// Every register, in encoding order.
    pub names: &'static [&'static str],
    pub frame_pointer: &'static str,
    pub stack_pointer: &'static str,
    pub return_value: &'static str,
    /// Registers receiving the leading arguments, in order.
    pub arguments: &'static [&'static str],
    pub caller_saved: &'static [&'static str],
    pub callee_saved: &'static [&'static str],
}

/// A [`RegisterSpec`] with every register issued as a temp.
#[derive(Debug, Clone)]
pub struct MachineRegisters {
    all: Vec<(&'static str, Temp)>,
    frame_pointer: Temp,
    stack_pointer: Temp,
    return_value: Temp,
    arguments: Vec<Temp>,
    caller_saved: Vec<Temp>,
    callee_saved: Vec<Temp>,
}

impl MachineRegisters {
    pub fn issue(spec: &RegisterSpec, temps: &mut TempAuthority) -> CompileResult<Self> {
        let all: Vec<(&'static str, Temp)> = spec
            .names
            .iter()
            .map(|&name| (name, temps.named_temp(name)))
            .collect();

        let find = |name: &str| -> CompileResult<Temp> {
            all.iter()
                .find(|(n, _)| *n == name)
                .map(|(_, t)| *t)
                .ok_or_else(|| CompileError::CallingConvention {
                    reason: format!("register `{}` is not in the register table", name),
                })
        };
        let find_all = |names: &[&str]| -> CompileResult<Vec<Temp>> {
            names.iter().map(|name| find(name)).collect()
        };

        Ok(Self {
            frame_pointer: find(spec.frame_pointer)?,
            stack_pointer: find(spec.stack_pointer)?,
            return_value: find(spec.return_value)?,
            arguments: find_all(spec.arguments)?,
            caller_saved: find_all(spec.caller_saved)?,
            callee_saved: find_all(spec.callee_saved)?,
            all,
        })
    }

    pub fn lookup(&self, name: &str) -> Option<Temp> {
        self.all.iter().find(|(n, _)| *n == name).map(|(_, t)| *t)
    }

    pub fn all(&self) -> impl Iterator<Item = Temp> + '_ {
        self.all.iter().map(|(_, t)| *t)
    }

    pub fn frame_pointer(&self) -> Temp {
        self.frame_pointer
    }

    pub fn stack_pointer(&self) -> Temp {
        self.stack_pointer
    }

    pub fn return_value(&self) -> Temp {
        self.return_value
    }

    pub fn arguments(&self) -> &[Temp] {
        &self.arguments
    }

    pub fn caller_saved(&self) -> &[Temp] {
        &self.caller_saved
    }

    pub fn callee_saved(&self) -> &[Temp] {
        &self.callee_saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TOY: RegisterSpec = RegisterSpec {
        names: &["r0", "r1", "r2", "fp", "sp"],
        frame_pointer: "fp",
        stack_pointer: "sp",
        return_value: "r0",
        arguments: &["r0", "r1"],
        caller_saved: &["r0", "r1"],
        callee_saved: &["r2"],
    };

    #[test]
    fn test_issue_names_every_register() {
        let mut temps = TempAuthority::new();
        let regs = MachineRegisters::issue(&TOY, &mut temps).unwrap();
        assert_eq!(regs.all().count(), 5);
        assert_eq!(temps.names().lookup(regs.frame_pointer()), Some("fp"));
        assert_eq!(regs.arguments().len(), 2);
        assert_eq!(regs.lookup("r2"), Some(regs.callee_saved()[0]));
        assert_eq!(regs.lookup("r9"), None);
    }

    #[test]
    fn test_unknown_role_register_is_rejected() {
        static BROKEN: RegisterSpec = RegisterSpec {
            names: &["r0", "fp", "sp"],
            frame_pointer: "fp",
            stack_pointer: "sp",
            return_value: "rax",
            arguments: &[],
            caller_saved: &[],
            callee_saved: &[],
        };
        let mut temps = TempAuthority::new();
        let err = MachineRegisters::issue(&BROKEN, &mut temps).unwrap_err();
        assert!(matches!(err, CompileError::CallingConvention { .. }));
    }
}
